//! Repository collaborator
//!
//! The read side the ownership resolver and login depend on. Lookups return
//! `Ok(None)` for a missing row; `Err` is reserved for I/O failures.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub hash_pass: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PostRecord {
    pub id: i32,
    pub guid: String,
    pub author_id: i32,
    pub is_public: bool,
    pub is_active: bool,
}

impl PostRecord {
    /// Readable by anyone: flagged public and not disabled
    pub fn is_visible(&self) -> bool {
        self.is_public && self.is_active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CommentRecord {
    pub id: i32,
    pub post_guid: String,
    pub author_id: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ConversationRecord {
    pub id: i32,
    pub user1_id: i32,
    pub user2_id: i32,
}

/// Typed lookups keyed by entity
///
/// Implementations must be cheap to share (`Arc<dyn Repository>`) and safe
/// to call from concurrent calls.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_user_by_id(&self, id: i32) -> Result<Option<UserRecord>>;

    async fn get_user_by_name(&self, username: &str) -> Result<Option<UserRecord>>;

    async fn get_post_by_guid(&self, guid: &str) -> Result<Option<PostRecord>>;

    async fn get_post_by_id(&self, id: i32) -> Result<Option<PostRecord>>;

    async fn get_comment_by_id(&self, id: i32) -> Result<Option<CommentRecord>>;

    async fn get_conversation_by_id(&self, id: i32) -> Result<Option<ConversationRecord>>;

    /// Usernames `user_id` follows, accepted follows only
    async fn following_usernames(&self, user_id: i32) -> Result<Vec<String>>;
}

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Repository connection pool ready"
        );

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn get_user_by_id(&self, id: i32) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, hash_pass, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_name(&self, username: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, hash_pass, is_active
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_post_by_guid(&self, guid: &str) -> Result<Option<PostRecord>> {
        let post = sqlx::query_as::<_, PostRecord>(
            r#"
            SELECT id, guid, author_id, is_public, is_active
            FROM posts
            WHERE guid = $1
            "#,
        )
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn get_post_by_id(&self, id: i32) -> Result<Option<PostRecord>> {
        let post = sqlx::query_as::<_, PostRecord>(
            r#"
            SELECT id, guid, author_id, is_public, is_active
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn get_comment_by_id(&self, id: i32) -> Result<Option<CommentRecord>> {
        let comment = sqlx::query_as::<_, CommentRecord>(
            r#"
            SELECT id, post_guid, author_id, is_active
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn get_conversation_by_id(&self, id: i32) -> Result<Option<ConversationRecord>> {
        let conversation = sqlx::query_as::<_, ConversationRecord>(
            r#"
            SELECT id, user1_id, user2_id
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn following_usernames(&self, user_id: i32) -> Result<Vec<String>> {
        let usernames: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT u.username
            FROM follows f
            JOIN users u ON u.id = f.followed_id
            WHERE f.follower_id = $1 AND f.status = 1
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(usernames)
    }
}
