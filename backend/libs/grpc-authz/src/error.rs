/// Error types for the authorization layer
use grpc_jwt_propagation::TokenError;
use thiserror::Error;
use tonic::Status;

use crate::introspect::IntrospectError;
use crate::policy::AccessTier;
use crate::replay::ReplayError;
use crate::resolver::ResolveError;

/// Message returned with every `PERMISSION_DENIED`, whatever the reason
pub const ACCESS_DENIED: &str = "access denied";

/// Why a call was not allowed
///
/// The `Display` text is the internal reason and goes to the server log
/// only; callers get the coarse status from `From<AuthzError> for Status`.
#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] TokenError),

    /// Path with no catalogue entry; a deployment defect, never allowed
    #[error("no access tier for method {0}")]
    UnknownMethod(String),

    #[error("request unresolvable: {0}")]
    Unresolvable(#[from] IntrospectError),

    #[error("ownership resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    #[error("request message unreadable: {0}")]
    Stream(#[from] ReplayError),

    #[error("{tier:?} check failed for {username}")]
    NotPermitted { tier: AccessTier, username: String },

    #[error("authorization deadline exceeded")]
    DeadlineExceeded,
}

impl From<AuthzError> for Status {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated(e) => e.into(),
            AuthzError::DeadlineExceeded => Status::deadline_exceeded("authorization timed out"),
            AuthzError::Stream(ReplayError::Transport(_)) => {
                Status::cancelled("request stream closed")
            }
            AuthzError::UnknownMethod(_)
            | AuthzError::Unresolvable(_)
            | AuthzError::Resolution(_)
            | AuthzError::Stream(_)
            | AuthzError::NotPermitted { .. } => Status::permission_denied(ACCESS_DENIED),
        }
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;
