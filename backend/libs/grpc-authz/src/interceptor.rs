//! Authorization interceptor
//!
//! Per-call decision, evaluated from scratch for every call:
//!
//! 1. `Open` operation: allow, no token needed
//! 2. Validate the bearer token, else `Unauthenticated`
//! 3. Classify the path, unknown paths are denied
//! 4. Read and decode the first request message, extract its target
//! 5. `PublicOverride`: allow if the target is public, else continue as
//!    `FollowerOrSelf`
//! 6. `SelfOnly`: the resolved owner must include the caller
//! 7. `FollowerOrSelf`: the owner is the caller or in the following snapshot
//!
//! Steps 4 to 7 are bounded by the call deadline.

use bytes::Bytes;
use crypto_core::JwtKeys;
use grpc_jwt_propagation::{JwtClaims, JwtServerInterceptor};
use http::HeaderMap;
use http_body::Body;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{AuthzError, AuthzResult};
use crate::introspect::{Condition, LenicRequest, Target};
use crate::policy::{AccessTier, Operation};
use crate::replay::ReplayBody;
use crate::repository::Repository;
use crate::resolver::OwnershipResolver;

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(2000);

/// The call-authorization engine
///
/// Holds no per-call state; clones share the key material and repository.
#[derive(Clone)]
pub struct Authorizer {
    validator: JwtServerInterceptor,
    resolver: OwnershipResolver,
    resolve_timeout: Duration,
}

impl Authorizer {
    pub fn new(keys: Arc<JwtKeys>, repository: Arc<dyn Repository>) -> Self {
        Self {
            validator: JwtServerInterceptor::new(keys),
            resolver: OwnershipResolver::new(repository),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// Upper bound on target resolution when the client sent no tighter deadline
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn resolve_timeout(&self) -> Duration {
        self.resolve_timeout
    }

    /// Decide one call
    ///
    /// Returns the caller's claims on allow (`None` for open operations).
    /// The first message is read through `body` and stays buffered there for
    /// the handler.
    pub async fn authorize_call<B>(
        &self,
        path: &str,
        headers: &HeaderMap,
        body: &mut ReplayBody<B>,
        call_timeout: Option<Duration>,
    ) -> AuthzResult<Option<JwtClaims>>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: std::fmt::Display,
    {
        let operation = Operation::from_path(path);

        if let Some(op) = operation {
            if op.is_open() {
                debug!(method = %path, "Open operation, no token required");
                return Ok(None);
            }
        }

        let claims = self.validator.validate_headers(headers).map_err(|e| {
            warn!(method = %path, reason = %e, "Call denied: unauthenticated");
            AuthzError::from(e)
        })?;

        let Some(operation) = operation else {
            error!(
                method = %path,
                username = %claims.username,
                "Method has no access tier, denying"
            );
            return Err(AuthzError::UnknownMethod(path.to_string()));
        };

        let bound = call_timeout.map_or(self.resolve_timeout, |t| t.min(self.resolve_timeout));

        let decision = async {
            let payload = body.first_message().await?;
            self.authorize_message(operation, &claims, &payload).await
        };

        let result = match tokio::time::timeout(bound, decision).await {
            Ok(result) => result,
            Err(_) => Err(AuthzError::DeadlineExceeded),
        };

        match result {
            Ok(()) => {
                debug!(method = %path, username = %claims.username, "Call allowed");
                Ok(Some(claims))
            }
            Err(e) => {
                warn!(
                    method = %path,
                    username = %claims.username,
                    reason = %e,
                    "Call denied"
                );
                Err(e)
            }
        }
    }

    /// Decode a request payload (without gRPC framing) and decide it
    pub async fn authorize_message(
        &self,
        operation: Operation,
        claims: &JwtClaims,
        payload: &[u8],
    ) -> AuthzResult<()> {
        if operation.is_open() {
            return Ok(());
        }

        let request = operation.decode(payload)?;
        self.authorize(operation, claims, &request).await
    }

    /// Decide an authenticated call on an already decoded request
    pub async fn authorize(
        &self,
        operation: Operation,
        claims: &JwtClaims,
        request: &LenicRequest,
    ) -> AuthzResult<()> {
        let tier = operation.tier();
        if tier == AccessTier::Open {
            return Ok(());
        }

        let target = request.target()?;
        let conditions = request.conditions()?;

        let permitted = match tier {
            AccessTier::Open => true,
            AccessTier::SelfOnly => self
                .resolver
                .resolve_owner(&target)
                .await?
                .includes(&claims.username),
            AccessTier::FollowerOrSelf => self
                .resolver
                .resolve_owner(&target)
                .await?
                .admits_follower_or_self(claims),
            AccessTier::PublicOverride => self.readable(&target, claims).await?,
        };

        if !permitted {
            return Err(AuthzError::NotPermitted {
                tier,
                username: claims.username.clone(),
            });
        }

        for condition in &conditions {
            let satisfied = match condition {
                Condition::ActingAs(actor) => self
                    .resolver
                    .resolve_owner(actor)
                    .await?
                    .includes(&claims.username),
                Condition::Reads(resource) => self.readable(resource, claims).await?,
            };

            if !satisfied {
                debug!(?condition, "Request condition not met");
                return Err(AuthzError::NotPermitted {
                    tier,
                    username: claims.username.clone(),
                });
            }
        }

        Ok(())
    }

    /// Public, or owned by the caller or someone they follow
    async fn readable(&self, target: &Target, claims: &JwtClaims) -> AuthzResult<bool> {
        if self.resolver.is_public(target).await? {
            debug!(?target, "Public resource");
            return Ok(true);
        }

        Ok(self
            .resolver
            .resolve_owner(target)
            .await?
            .admits_follower_or_self(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use crate::pb;
    use crate::repository::{CommentRecord, ConversationRecord, PostRecord, UserRecord};
    use std::collections::BTreeSet;

    const SECRET: &[u8] = b"authorizer-unit-test-secret-32-bytes!!";

    fn user(id: i32, username: &str) -> UserRecord {
        UserRecord {
            id,
            username: username.to_string(),
            email: format!("{}@lenic.test", username),
            hash_pass: String::new(),
            is_active: true,
        }
    }

    fn authorizer() -> Authorizer {
        let repo = InMemoryRepository::new();
        repo.insert_user(user(1, "alice"));
        repo.insert_user(user(2, "bob"));
        repo.insert_user(user(3, "carol"));
        repo.insert_post(PostRecord {
            id: 20,
            guid: "carol-private".into(),
            author_id: 3,
            is_public: false,
            is_active: true,
        });
        repo.insert_post(PostRecord {
            id: 21,
            guid: "bob-private".into(),
            author_id: 2,
            is_public: false,
            is_active: true,
        });
        repo.insert_comment(CommentRecord {
            id: 30,
            post_guid: "bob-private".into(),
            author_id: 3,
            is_active: true,
        });
        repo.insert_conversation(ConversationRecord {
            id: 40,
            user1_id: 2,
            user2_id: 1,
        });

        let keys = Arc::new(JwtKeys::from_secret(SECRET).unwrap());
        Authorizer::new(keys, Arc::new(repo))
    }

    fn claims(username: &str, following: &[&str]) -> JwtClaims {
        JwtClaims {
            username: username.to_string(),
            following: following.iter().map(|f| f.to_string()).collect::<BTreeSet<_>>(),
            iat: 0,
            exp: 0,
        }
    }

    #[tokio::test]
    async fn test_self_only() {
        let authz = authorizer();
        let request = LenicRequest::DeleteUser(pb::DeleteUserRequest {
            username: "alice".into(),
        });

        assert!(authz
            .authorize(Operation::DeleteUser, &claims("alice", &[]), &request)
            .await
            .is_ok());

        let denied = authz
            .authorize(Operation::DeleteUser, &claims("bob", &[]), &request)
            .await;
        assert!(matches!(denied, Err(AuthzError::NotPermitted { .. })));
    }

    #[tokio::test]
    async fn test_self_only_ignores_following() {
        let authz = authorizer();
        let request = LenicRequest::DeletePost(pb::DeletePostRequest {
            uuid: "bob-private".into(),
        });

        let result = authz
            .authorize(Operation::DeletePost, &claims("alice", &["bob"]), &request)
            .await;
        assert!(matches!(result, Err(AuthzError::NotPermitted { .. })));
    }

    #[tokio::test]
    async fn test_conversation_second_participant() {
        let authz = authorizer();
        let request = LenicRequest::ReadConversation(pb::ReadConversationRequest { id: 40 });

        assert!(authz
            .authorize(Operation::ReadConversation, &claims("alice", &[]), &request)
            .await
            .is_ok());
        assert!(authz
            .authorize(Operation::ReadConversation, &claims("bob", &[]), &request)
            .await
            .is_ok());
        assert!(authz
            .authorize(Operation::ReadConversation, &claims("carol", &["alice"]), &request)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_public_override_falls_back_to_followers() {
        let authz = authorizer();
        let request = LenicRequest::GetPost(pb::GetPostRequest {
            uuid: "carol-private".into(),
        });

        assert!(authz
            .authorize(Operation::GetPost, &claims("alice", &["carol"]), &request)
            .await
            .is_ok());
        assert!(authz
            .authorize(Operation::GetPost, &claims("alice", &["bob"]), &request)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_comment_rating_follows_the_post_author() {
        let authz = authorizer();
        let request = LenicRequest::RateComment(pb::CommentRating {
            comment_id: 30,
            user_id: 1,
        });

        // Comment written by carol on bob's private post
        assert!(authz
            .authorize(Operation::RateCommentUp, &claims("alice", &["bob"]), &request)
            .await
            .is_ok());
        assert!(authz
            .authorize(Operation::RateCommentUp, &claims("alice", &["carol"]), &request)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_resource_denies() {
        let authz = authorizer();
        let request = LenicRequest::RateComment(pb::CommentRating {
            comment_id: 404,
            user_id: 1,
        });

        let result = authz
            .authorize(Operation::RateCommentDown, &claims("alice", &["bob"]), &request)
            .await;
        assert!(matches!(result, Err(AuthzError::Resolution(_))));
    }

    #[tokio::test]
    async fn test_comment_needs_a_readable_post() {
        let authz = authorizer();
        let comment = |guid: &str| {
            LenicRequest::CreateComment(pb::Comment {
                post_guid: guid.into(),
                author_id: 1,
                content: "nice".into(),
                ..Default::default()
            })
        };
        let alice = claims("alice", &[]);

        let private = authz
            .authorize(Operation::CreateComment, &alice, &comment("carol-private"))
            .await;
        assert!(matches!(private, Err(AuthzError::NotPermitted { .. })));

        let missing = authz
            .authorize(Operation::CreateComment, &alice, &comment("no-such-post"))
            .await;
        assert!(matches!(missing, Err(AuthzError::Resolution(_))));

        assert!(authz
            .authorize(
                Operation::CreateComment,
                &claims("alice", &["carol"]),
                &comment("carol-private")
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_acting_user_must_be_the_caller() {
        let authz = authorizer();

        let as_bob = LenicRequest::SendDm(pb::Dm {
            conversation_id: 40,
            sender_id: 2,
            content: "hi".into(),
            ..Default::default()
        });
        let result = authz
            .authorize(Operation::SendDM, &claims("alice", &[]), &as_bob)
            .await;
        assert!(matches!(result, Err(AuthzError::NotPermitted { .. })));
        assert!(authz
            .authorize(Operation::SendDM, &claims("bob", &[]), &as_bob)
            .await
            .is_ok());

        // Public override on the comment does not cover rating as someone else
        let rate_as_carol = LenicRequest::RateComment(pb::CommentRating {
            comment_id: 30,
            user_id: 3,
        });
        let result = authz
            .authorize(Operation::RateCommentUp, &claims("alice", &["bob"]), &rate_as_carol)
            .await;
        assert!(matches!(result, Err(AuthzError::NotPermitted { .. })));
    }

    #[tokio::test]
    async fn test_open_operation_needs_no_target() {
        let authz = authorizer();
        let result = authz
            .authorize_message(Operation::CreateUser, &claims("alice", &[]), &[])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_payload_denies() {
        let authz = authorizer();
        let result = authz
            .authorize_message(Operation::GetPost, &claims("alice", &[]), &[0x0a, 0xff])
            .await;
        assert!(matches!(result, Err(AuthzError::Unresolvable(_))));
    }
}
