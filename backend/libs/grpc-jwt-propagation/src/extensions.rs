//! Request Extension Trait for JWT Claims Access
//!
//! Handlers behind the authorization layer read the caller's identity from
//! request extensions instead of decoding the token a second time.

use crate::JwtClaims;
use tonic::{Request, Status};

/// Extension trait for accessing JWT claims from gRPC requests
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_jwt_propagation::JwtClaimsExt;
/// use tonic::{Request, Response, Status};
///
/// async fn send_dm(request: Request<()>) -> Result<Response<()>, Status> {
///     let claims = request.jwt_claims()?;
///     tracing::info!(sender = %claims.username, "sending direct message");
///     Ok(Response::new(()))
/// }
/// ```
pub trait JwtClaimsExt {
    /// Extract JWT claims from request extensions
    ///
    /// ## Errors
    ///
    /// Returns `Status::unauthenticated` if no validated claims were stored
    /// for this call (open operation, or no authorization layer attached).
    fn jwt_claims(&self) -> Result<&JwtClaims, Status>;

    /// Require that `username` names the authenticated caller
    ///
    /// ## Errors
    ///
    /// - `Status::unauthenticated` if no JWT claims found
    /// - `Status::permission_denied` if the caller is someone else
    fn require_self(&self, username: &str) -> Result<&JwtClaims, Status>;

    /// Require that `username` is the caller or in the caller's following snapshot
    fn require_self_or_followed(&self, username: &str) -> Result<&JwtClaims, Status>;
}

impl<T> JwtClaimsExt for Request<T> {
    fn jwt_claims(&self) -> Result<&JwtClaims, Status> {
        self.extensions()
            .get::<JwtClaims>()
            .ok_or_else(|| Status::unauthenticated("No JWT claims found for this call"))
    }

    fn require_self(&self, username: &str) -> Result<&JwtClaims, Status> {
        let claims = self.jwt_claims()?;

        if !claims.is_self(username) {
            return Err(Status::permission_denied("access denied"));
        }

        Ok(claims)
    }

    fn require_self_or_followed(&self, username: &str) -> Result<&JwtClaims, Status> {
        let claims = self.jwt_claims()?;

        if !claims.is_self_or_followed(username) {
            return Err(Status::permission_denied("access denied"));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn claims(username: &str, following: &[&str]) -> JwtClaims {
        JwtClaims {
            username: username.to_string(),
            following: following.iter().map(|f| f.to_string()).collect::<BTreeSet<_>>(),
            iat: 0,
            exp: 0,
        }
    }

    fn request_with(claims: JwtClaims) -> Request<()> {
        let mut request = Request::new(());
        request.extensions_mut().insert(claims);
        request
    }

    #[test]
    fn test_jwt_claims_missing() {
        let request = Request::new(());
        let status = request.jwt_claims().unwrap_err();

        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert!(status.message().contains("No JWT claims found"));
    }

    #[test]
    fn test_jwt_claims_present() {
        let request = request_with(claims("alice", &[]));
        assert_eq!(request.jwt_claims().unwrap().username, "alice");
    }

    #[test]
    fn test_require_self() {
        let request = request_with(claims("alice", &["bob"]));

        assert!(request.require_self("alice").is_ok());
        let status = request.require_self("bob").unwrap_err();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
    }

    #[test]
    fn test_require_self_or_followed() {
        let request = request_with(claims("alice", &["bob"]));

        assert!(request.require_self_or_followed("alice").is_ok());
        assert!(request.require_self_or_followed("bob").is_ok());
        let status = request.require_self_or_followed("carol").unwrap_err();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
    }
}
