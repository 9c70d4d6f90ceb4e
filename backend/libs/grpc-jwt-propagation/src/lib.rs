//! Caller Authentication for the Lenic gRPC API
//!
//! This library turns the bearer credential on an incoming call into
//! validated [`JwtClaims`] and makes those claims available to handlers.
//!
//! ## Core Components
//!
//! - **JwtClaims**: decoded identity plus the caller's following snapshot
//! - **JwtServerInterceptor**: the token validator; also usable directly as a
//!   tonic `Interceptor` for services that only need authentication
//! - **JwtClaimsExt**: request extension trait for reading claims in handlers
//! - **TokenError**: `MissingMetadata`, `MissingToken`, `InvalidToken`
//!
//! ## Security Guarantees
//!
//! - Tokens are verified with the injected shared secret (HS256 only)
//! - Expiration checked automatically
//! - No token = `Status::unauthenticated`
//! - Invalid token = `Status::unauthenticated`
//! - Verification details are logged, never returned to the caller

mod claims;
mod error;
mod extensions;
mod server;

pub use claims::JwtClaims;
pub use error::TokenError;
pub use extensions::JwtClaimsExt;
pub use server::{JwtServerInterceptor, AUTHORIZATION_HEADER};

// Re-export tonic Status for convenience
pub use tonic::Status;
