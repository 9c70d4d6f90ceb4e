//! In-memory repository for tests and local runs

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

use crate::repository::{
    CommentRecord, ConversationRecord, PostRecord, Repository, UserRecord,
};

/// DashMap-backed [`Repository`]
///
/// An optional latency is applied to every lookup, which makes deadline
/// behaviour observable in tests.
#[derive(Default)]
pub struct InMemoryRepository {
    users: DashMap<i32, UserRecord>,
    posts: DashMap<i32, PostRecord>,
    comments: DashMap<i32, CommentRecord>,
    conversations: DashMap<i32, ConversationRecord>,
    /// (follower_id, followed_id) -> accepted
    follows: DashMap<(i32, i32), bool>,
    latency: Option<Duration>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.users.insert(user.id, user);
    }

    pub fn insert_post(&self, post: PostRecord) {
        self.posts.insert(post.id, post);
    }

    pub fn insert_comment(&self, comment: CommentRecord) {
        self.comments.insert(comment.id, comment);
    }

    pub fn insert_conversation(&self, conversation: ConversationRecord) {
        self.conversations.insert(conversation.id, conversation);
    }

    /// Record a follow request; `accepted = false` leaves it pending
    pub fn follow(&self, follower_id: i32, followed_id: i32, accepted: bool) {
        self.follows.insert((follower_id, followed_id), accepted);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user_by_id(&self, id: i32) -> Result<Option<UserRecord>> {
        self.delay().await;
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn get_user_by_name(&self, username: &str) -> Result<Option<UserRecord>> {
        self.delay().await;
        Ok(self
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.clone()))
    }

    async fn get_post_by_guid(&self, guid: &str) -> Result<Option<PostRecord>> {
        self.delay().await;
        Ok(self
            .posts
            .iter()
            .find(|p| p.guid == guid)
            .map(|p| p.clone()))
    }

    async fn get_post_by_id(&self, id: i32) -> Result<Option<PostRecord>> {
        self.delay().await;
        Ok(self.posts.get(&id).map(|p| p.clone()))
    }

    async fn get_comment_by_id(&self, id: i32) -> Result<Option<CommentRecord>> {
        self.delay().await;
        Ok(self.comments.get(&id).map(|c| c.clone()))
    }

    async fn get_conversation_by_id(&self, id: i32) -> Result<Option<ConversationRecord>> {
        self.delay().await;
        Ok(self.conversations.get(&id).map(|c| c.clone()))
    }

    async fn following_usernames(&self, user_id: i32) -> Result<Vec<String>> {
        self.delay().await;

        let followed: Vec<i32> = self
            .follows
            .iter()
            .filter(|entry| entry.key().0 == user_id && *entry.value())
            .map(|entry| entry.key().1)
            .collect();

        let mut usernames: Vec<String> = followed
            .into_iter()
            .filter_map(|id| self.users.get(&id).map(|u| u.username.clone()))
            .collect();
        usernames.sort();

        Ok(usernames)
    }
}
