//! Server-side token validation
//!
//! Reads the bearer credential from incoming call metadata, verifies it and
//! produces [`JwtClaims`].

use crate::claims::JwtClaims;
use crate::error::TokenError;
use crypto_core::JwtKeys;
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::{debug, warn};

/// Metadata key carrying the credential
pub const AUTHORIZATION_HEADER: &str = "authorization";

const BEARER_PREFIX: &str = "Bearer ";

/// Validates bearer tokens against injected key material
///
/// Validation is a pure function of the header value and the keys: no I/O
/// and no shared mutable state, so one validator serves every call.
///
/// It also implements [`Interceptor`] for services whose methods only need
/// an authenticated caller: the validated claims are stored in request
/// extensions for handler access.
///
/// ## Usage
///
/// ```rust,no_run
/// use crypto_core::JwtKeys;
/// use grpc_jwt_propagation::JwtServerInterceptor;
/// use std::sync::Arc;
///
/// # fn example() -> anyhow::Result<()> {
/// let keys = Arc::new(JwtKeys::from_secret(std::env::var("JWT_SECRET")?.as_bytes())?);
/// let validator = JwtServerInterceptor::new(keys);
/// // let service = MyServiceServer::with_interceptor(MyService, validator);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JwtServerInterceptor {
    keys: Arc<JwtKeys>,
}

impl JwtServerInterceptor {
    pub fn new(keys: Arc<JwtKeys>) -> Self {
        Self { keys }
    }

    /// Validate the credential carried in tonic metadata
    pub fn validate_metadata(&self, metadata: &MetadataMap) -> Result<JwtClaims, TokenError> {
        let value = metadata
            .get(AUTHORIZATION_HEADER)
            .ok_or_else(|| {
                debug!("Missing authorization header");
                TokenError::MissingToken
            })?
            .to_str()
            .map_err(|e| {
                warn!("Invalid authorization header encoding: {}", e);
                TokenError::MissingMetadata
            })?;

        self.validate_value(value)
    }

    /// Validate the credential carried in raw HTTP/2 headers
    pub fn validate_headers(&self, headers: &http::HeaderMap) -> Result<JwtClaims, TokenError> {
        let value = headers
            .get(AUTHORIZATION_HEADER)
            .ok_or_else(|| {
                debug!("Missing authorization header");
                TokenError::MissingToken
            })?
            .to_str()
            .map_err(|e| {
                warn!("Invalid authorization header encoding: {}", e);
                TokenError::MissingMetadata
            })?;

        self.validate_value(value)
    }

    /// Validate an `authorization` value
    ///
    /// The `"Bearer "` prefix is optional; a bare token is accepted as is.
    pub fn validate_value(&self, auth_value: &str) -> Result<JwtClaims, TokenError> {
        let token = auth_value
            .strip_prefix(BEARER_PREFIX)
            .unwrap_or(auth_value)
            .trim();

        if token.is_empty() {
            debug!("Empty authorization token");
            return Err(TokenError::MissingToken);
        }

        let token_data = self.keys.verify(token).map_err(|e| {
            warn!("JWT validation failed: {}", e);
            TokenError::InvalidToken(e.to_string())
        })?;

        let claims = JwtClaims::from_validated_claims(&token_data.claims).map_err(|e| {
            warn!("Failed to parse JWT claims: {}", e);
            TokenError::InvalidToken(e.to_string())
        })?;

        debug!(username = %claims.username, "JWT validated successfully");

        Ok(claims)
    }
}

impl Interceptor for JwtServerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let claims = self.validate_metadata(request.metadata())?;

        request.extensions_mut().insert(claims);

        Ok(request)
    }
}
