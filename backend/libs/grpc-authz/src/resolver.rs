//! Ownership / visibility resolution
//!
//! Every hop is one repository lookup. Chains run sequentially and stop at
//! the first missing row; there is no retry and no partial result.

use grpc_jwt_propagation::JwtClaims;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::introspect::{ConversationKey, PostKey, ResourceRef, Target, UserKey};
use crate::repository::{PostRecord, Repository};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    /// The resource has no owner to compare against
    #[error("resource has no owner")]
    Unowned,

    #[error("repository lookup failed: {0}")]
    Repository(#[from] anyhow::Error),
}

impl ResolveError {
    fn not_found(kind: &'static str, key: impl ToString) -> Self {
        ResolveError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

/// Whose resource a target is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    User(String),
    /// Both participants of a conversation own it
    Participants(String, String),
}

impl Owner {
    pub fn includes(&self, username: &str) -> bool {
        match self {
            Owner::User(owner) => owner == username,
            Owner::Participants(a, b) => a == username || b == username,
        }
    }

    /// True if the caller is an owner or follows one
    pub fn admits_follower_or_self(&self, claims: &JwtClaims) -> bool {
        match self {
            Owner::User(owner) => claims.is_self_or_followed(owner),
            Owner::Participants(a, b) => {
                claims.is_self_or_followed(a) || claims.is_self_or_followed(b)
            }
        }
    }
}

#[derive(Clone)]
pub struct OwnershipResolver {
    repository: Arc<dyn Repository>,
}

impl OwnershipResolver {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub async fn resolve_owner(&self, target: &Target) -> Result<Owner, ResolveError> {
        let resource = match target {
            Target::Username(username) => return Ok(Owner::User(username.clone())),
            Target::Resource(resource) => resource,
        };

        let owner = match resource {
            ResourceRef::User(key) => Owner::User(self.username_of(key).await?),
            ResourceRef::Post(key) => {
                let post = self.post(key).await?;
                Owner::User(self.username_by_id(post.author_id).await?)
            }
            ResourceRef::Comment(id) => {
                let comment = self
                    .repository
                    .get_comment_by_id(*id)
                    .await?
                    .ok_or_else(|| ResolveError::not_found("comment", id))?;
                Owner::User(self.username_by_id(comment.author_id).await?)
            }
            ResourceRef::CommentPost(id) => {
                let post = self.parent_post(*id).await?;
                Owner::User(self.username_by_id(post.author_id).await?)
            }
            ResourceRef::Conversation(ConversationKey::Id(id)) => {
                let conversation = self
                    .repository
                    .get_conversation_by_id(*id)
                    .await?
                    .ok_or_else(|| ResolveError::not_found("conversation", id))?;
                Owner::Participants(
                    self.username_by_id(conversation.user1_id).await?,
                    self.username_by_id(conversation.user2_id).await?,
                )
            }
            ResourceRef::Conversation(ConversationKey::Between(user1, user2)) => {
                Owner::Participants(
                    self.username_by_id(*user1).await?,
                    self.username_by_id(*user2).await?,
                )
            }
            ResourceRef::Directory => return Err(ResolveError::Unowned),
        };

        debug!(?target, ?owner, "Resolved owner");

        Ok(owner)
    }

    /// Visibility of a target
    ///
    /// Posts are public when flagged public and active, comments follow
    /// their parent post, user profiles are public while the account is
    /// active and the directory is always public. Everything else is private.
    pub async fn is_public(&self, target: &Target) -> Result<bool, ResolveError> {
        let resource = match target {
            Target::Username(_) => return Ok(false),
            Target::Resource(resource) => resource,
        };

        match resource {
            ResourceRef::Directory => Ok(true),
            ResourceRef::User(key) => {
                let user = match key {
                    UserKey::Id(id) => self
                        .repository
                        .get_user_by_id(*id)
                        .await?
                        .ok_or_else(|| ResolveError::not_found("user", id))?,
                    UserKey::Name(name) => self
                        .repository
                        .get_user_by_name(name)
                        .await?
                        .ok_or_else(|| ResolveError::not_found("user", name))?,
                };
                Ok(user.is_active)
            }
            ResourceRef::Post(key) => Ok(self.post(key).await?.is_visible()),
            ResourceRef::Comment(id) | ResourceRef::CommentPost(id) => {
                Ok(self.parent_post(*id).await?.is_visible())
            }
            ResourceRef::Conversation(_) => Ok(false),
        }
    }

    async fn username_of(&self, key: &UserKey) -> Result<String, ResolveError> {
        match key {
            UserKey::Id(id) => self.username_by_id(*id).await,
            UserKey::Name(name) => {
                let user = self
                    .repository
                    .get_user_by_name(name)
                    .await?
                    .ok_or_else(|| ResolveError::not_found("user", name))?;
                Ok(user.username)
            }
        }
    }

    async fn username_by_id(&self, id: i32) -> Result<String, ResolveError> {
        let user = self
            .repository
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| ResolveError::not_found("user", id))?;
        Ok(user.username)
    }

    async fn post(&self, key: &PostKey) -> Result<PostRecord, ResolveError> {
        match key {
            PostKey::Guid(guid) => self
                .repository
                .get_post_by_guid(guid)
                .await?
                .ok_or_else(|| ResolveError::not_found("post", guid)),
            PostKey::Id(id) => self
                .repository
                .get_post_by_id(*id)
                .await?
                .ok_or_else(|| ResolveError::not_found("post", id)),
        }
    }

    /// comment -> parent post
    async fn parent_post(&self, comment_id: i32) -> Result<PostRecord, ResolveError> {
        let comment = self
            .repository
            .get_comment_by_id(comment_id)
            .await?
            .ok_or_else(|| ResolveError::not_found("comment", comment_id))?;

        self.post(&PostKey::Guid(comment.post_guid)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use crate::repository::{CommentRecord, ConversationRecord, UserRecord};
    use std::collections::BTreeSet;

    fn user(id: i32, username: &str, is_active: bool) -> UserRecord {
        UserRecord {
            id,
            username: username.to_string(),
            email: format!("{}@lenic.test", username),
            hash_pass: String::new(),
            is_active,
        }
    }

    fn fixture() -> OwnershipResolver {
        let repo = InMemoryRepository::new();
        repo.insert_user(user(1, "alice", true));
        repo.insert_user(user(2, "bob", true));
        repo.insert_user(user(3, "carol", false));
        repo.insert_post(PostRecord {
            id: 10,
            guid: "bob-public".into(),
            author_id: 2,
            is_public: true,
            is_active: true,
        });
        repo.insert_post(PostRecord {
            id: 11,
            guid: "bob-private".into(),
            author_id: 2,
            is_public: false,
            is_active: true,
        });
        repo.insert_comment(CommentRecord {
            id: 100,
            post_guid: "bob-private".into(),
            author_id: 1,
            is_active: true,
        });
        repo.insert_comment(CommentRecord {
            id: 101,
            post_guid: "deleted-post".into(),
            author_id: 1,
            is_active: true,
        });
        repo.insert_conversation(ConversationRecord {
            id: 7,
            user1_id: 1,
            user2_id: 2,
        });
        OwnershipResolver::new(Arc::new(repo))
    }

    fn resource(r: ResourceRef) -> Target {
        Target::Resource(r)
    }

    #[tokio::test]
    async fn test_direct_username_needs_no_lookup() {
        let resolver = fixture();
        let owner = resolver
            .resolve_owner(&Target::Username("nobody".into()))
            .await
            .unwrap();
        assert_eq!(owner, Owner::User("nobody".into()));
    }

    #[tokio::test]
    async fn test_post_owner_by_guid_and_id() {
        let resolver = fixture();

        let by_guid = resolver
            .resolve_owner(&resource(ResourceRef::Post(PostKey::Guid("bob-public".into()))))
            .await
            .unwrap();
        let by_id = resolver
            .resolve_owner(&resource(ResourceRef::Post(PostKey::Id(11))))
            .await
            .unwrap();

        assert_eq!(by_guid, Owner::User("bob".into()));
        assert_eq!(by_id, Owner::User("bob".into()));
    }

    #[tokio::test]
    async fn test_comment_owner_vs_parent_post_owner() {
        let resolver = fixture();

        let comment_author = resolver
            .resolve_owner(&resource(ResourceRef::Comment(100)))
            .await
            .unwrap();
        let post_author = resolver
            .resolve_owner(&resource(ResourceRef::CommentPost(100)))
            .await
            .unwrap();

        assert_eq!(comment_author, Owner::User("alice".into()));
        assert_eq!(post_author, Owner::User("bob".into()));
    }

    #[tokio::test]
    async fn test_broken_chain_fails() {
        let resolver = fixture();

        let missing_comment = resolver
            .resolve_owner(&resource(ResourceRef::CommentPost(999)))
            .await;
        assert!(matches!(
            missing_comment,
            Err(ResolveError::NotFound { kind: "comment", .. })
        ));

        let missing_post = resolver
            .resolve_owner(&resource(ResourceRef::CommentPost(101)))
            .await;
        assert!(matches!(
            missing_post,
            Err(ResolveError::NotFound { kind: "post", .. })
        ));
    }

    #[tokio::test]
    async fn test_conversation_participants() {
        let resolver = fixture();

        let owner = resolver
            .resolve_owner(&resource(ResourceRef::Conversation(ConversationKey::Id(7))))
            .await
            .unwrap();
        assert_eq!(owner, Owner::Participants("alice".into(), "bob".into()));
        assert!(owner.includes("alice"));
        assert!(owner.includes("bob"));
        assert!(!owner.includes("carol"));

        let pending = resolver
            .resolve_owner(&resource(ResourceRef::Conversation(
                ConversationKey::Between(2, 3),
            )))
            .await
            .unwrap();
        assert!(pending.includes("carol"));
    }

    #[tokio::test]
    async fn test_visibility() {
        let resolver = fixture();

        let public = resolver
            .is_public(&resource(ResourceRef::Post(PostKey::Guid("bob-public".into()))))
            .await
            .unwrap();
        let private = resolver
            .is_public(&resource(ResourceRef::Post(PostKey::Id(11))))
            .await
            .unwrap();
        let comment_on_private = resolver
            .is_public(&resource(ResourceRef::CommentPost(100)))
            .await
            .unwrap();
        let inactive_profile = resolver
            .is_public(&resource(ResourceRef::User(UserKey::Name("carol".into()))))
            .await
            .unwrap();
        let directory = resolver
            .is_public(&resource(ResourceRef::Directory))
            .await
            .unwrap();

        assert!(public);
        assert!(!private);
        assert!(!comment_on_private);
        assert!(!inactive_profile);
        assert!(directory);
    }

    #[tokio::test]
    async fn test_visibility_of_missing_resource_is_an_error() {
        let resolver = fixture();
        let result = resolver
            .is_public(&resource(ResourceRef::Post(PostKey::Guid("nope".into()))))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_directory_has_no_owner() {
        let resolver = fixture();
        let result = resolver.resolve_owner(&resource(ResourceRef::Directory)).await;
        assert!(matches!(result, Err(ResolveError::Unowned)));
    }

    #[test]
    fn test_owner_admits_followers() {
        let claims = JwtClaims {
            username: "alice".into(),
            following: BTreeSet::from(["bob".to_string()]),
            iat: 0,
            exp: 0,
        };

        assert!(Owner::User("alice".into()).admits_follower_or_self(&claims));
        assert!(Owner::User("bob".into()).admits_follower_or_self(&claims));
        assert!(!Owner::User("carol".into()).admits_follower_or_self(&claims));
        assert!(Owner::Participants("carol".into(), "bob".into()).admits_follower_or_self(&claims));
    }
}
