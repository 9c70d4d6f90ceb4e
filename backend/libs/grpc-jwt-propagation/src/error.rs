//! Token validation failures

use thiserror::Error;
use tonic::Status;

/// Why a call could not be authenticated
///
/// Every variant is fatal to the call; there are no soft failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The `authorization` metadata entry could not be read as text
    #[error("authorization metadata is unreadable")]
    MissingMetadata,

    #[error("missing authorization token")]
    MissingToken,

    /// Bad signature, expired or malformed
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl From<TokenError> for Status {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingMetadata => Status::unauthenticated("Invalid authorization header"),
            TokenError::MissingToken => Status::unauthenticated("Missing authorization token"),
            // Verification details stay in the server log
            TokenError::InvalidToken(_) => Status::unauthenticated("Invalid token"),
        }
    }
}
