//! Session issuance
//!
//! Login is an open operation: it verifies a password and mints the token
//! every other call is authorized against. The token carries the caller's
//! following list as of now; follow-graph changes made later are seen at
//! the next login.

use crypto_core::{hash_password, verify_password, JwtKeys};
use once_cell::sync::Lazy;
use std::sync::Arc;
use thiserror::Error;
use tonic::Status;
use tracing::{error, info, warn};

use crate::pb::{LoginRequest, LoginResponse};
use crate::repository::Repository;

/// Checked on the unknown-user path so both failures cost one Argon2 run
static UNKNOWN_USER_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("lenic-unknown-user").ok());

#[derive(Debug, Error)]
pub enum LoginError {
    /// Unknown user and wrong password are indistinguishable
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("login failed: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LoginError> for Status {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InvalidCredentials => Status::unauthenticated("invalid credentials"),
            LoginError::Internal(_) => Status::internal("login failed"),
        }
    }
}

#[derive(Clone)]
pub struct LoginService {
    repository: Arc<dyn Repository>,
    keys: Arc<JwtKeys>,
}

impl LoginService {
    pub fn new(repository: Arc<dyn Repository>, keys: Arc<JwtKeys>) -> Self {
        Lazy::force(&UNKNOWN_USER_HASH);
        Self { repository, keys }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, LoginError> {
        let user = match self.repository.get_user_by_name(&request.username).await? {
            Some(user) => user,
            None => {
                if let Some(hash) = UNKNOWN_USER_HASH.as_deref() {
                    let _ = verify_password(&request.password, hash);
                }
                warn!(username = %request.username, "Login for unknown user");
                return Err(LoginError::InvalidCredentials);
            }
        };

        if !verify_password(&request.password, &user.hash_pass)? {
            warn!(username = %user.username, "Login with wrong password");
            return Err(LoginError::InvalidCredentials);
        }

        let following = self.repository.following_usernames(user.id).await?;

        let token = self
            .keys
            .issue(&user.username, &following)
            .map_err(|e| {
                error!(username = %user.username, "Failed to issue token: {}", e);
                LoginError::Internal(e)
            })?;

        info!(
            username = %user.username,
            following = following.len(),
            "Session issued"
        );

        Ok(LoginResponse { token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use crate::repository::UserRecord;
    use crypto_core::hash_password;

    const SECRET: &[u8] = b"login-service-unit-test-secret-32b!";

    fn service() -> (LoginService, Arc<JwtKeys>) {
        let repo = InMemoryRepository::new();
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            repo.insert_user(UserRecord {
                id,
                username: name.to_string(),
                email: format!("{}@lenic.test", name),
                hash_pass: hash_password("correct horse").unwrap(),
                is_active: true,
            });
        }
        repo.follow(1, 2, true);
        repo.follow(1, 3, false);

        let keys = Arc::new(JwtKeys::from_secret(SECRET).unwrap());
        (LoginService::new(Arc::new(repo), keys.clone()), keys)
    }

    fn request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_embeds_following_snapshot() {
        let (service, keys) = service();

        let response = service.login(&request("alice", "correct horse")).await.unwrap();
        let claims = keys.verify(&response.token).unwrap().claims;

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.following, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let (service, _) = service();

        let wrong = service.login(&request("alice", "battery staple")).await.unwrap_err();
        let unknown = service.login(&request("mallory", "correct horse")).await.unwrap_err();

        assert!(matches!(wrong, LoginError::InvalidCredentials));
        assert!(matches!(unknown, LoginError::InvalidCredentials));
        assert_eq!(Status::from(wrong).message(), Status::from(unknown).message());
    }

    #[tokio::test]
    async fn test_unknown_user_still_runs_password_check() {
        let (service, _) = service();

        let err = service.login(&request("mallory", "lenic-unknown-user")).await.unwrap_err();
        assert!(matches!(err, LoginError::InvalidCredentials));

        let hash = UNKNOWN_USER_HASH.as_deref().expect("fallback hash is built");
        assert!(hash.starts_with("$argon2id$"));
        assert!(!verify_password("correct horse", hash).unwrap());
    }
}
