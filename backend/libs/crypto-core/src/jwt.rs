/// Session token issuance and validation for the Lenic API
///
/// Tokens are HS256-signed with a shared secret that is injected at
/// construction time through [`JwtKeys`]. Nothing here reads process-wide
/// state: every service that issues or validates tokens owns its keys.
///
/// ## Following snapshot
///
/// A token carries the usernames its subject followed at login time.
/// Authorization decisions read that snapshot instead of querying the follow
/// graph on every call, so a follow or unfollow only becomes visible to the
/// policy once the caller logs in again. The staleness window is bounded by
/// the token lifetime (see [`JwtKeys::with_ttl`]).
///
/// ## Usage
///
/// ```rust
/// use crypto_core::jwt::JwtKeys;
///
/// let keys = JwtKeys::from_secret(b"0123456789abcdef0123456789abcdef").unwrap();
/// let token = keys.issue("alice", &["bob".to_string()]).unwrap();
/// let data = keys.verify(&token).unwrap();
/// assert_eq!(data.claims.sub, "alice");
/// ```
use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_TOKEN_EXPIRY_SECS: i64 = 3600;

/// Shared secrets shorter than this are rejected (256 bits)
pub const MIN_SECRET_LENGTH: usize = 32;

/// Clock skew tolerated when checking `exp`
const VALIDATION_LEEWAY_SECS: u64 = 30;

/// Lenic tokens are always HS256
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

// ============================================================================
// Data Structures
// ============================================================================

/// Claims embedded in every Lenic session token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Usernames the subject followed when the token was issued
    #[serde(default)]
    pub following: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

// ============================================================================
// Key Material
// ============================================================================

/// Signing and verification keys derived from one shared secret
///
/// Immutable after construction; share it behind an `Arc`.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys")
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    /// Build keys from a shared secret
    ///
    /// ## Errors
    ///
    /// Returns error if the secret is shorter than [`MIN_SECRET_LENGTH`] bytes.
    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(anyhow!(
                "JWT secret must be at least {MIN_SECRET_LENGTH} bytes (got {})",
                secret.len()
            ));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(DEFAULT_TOKEN_EXPIRY_SECS),
        })
    }

    /// Override the token validity window (defaults to one hour)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // ========================================================================
    // Token Generation
    // ========================================================================

    /// Issue a token for `username` carrying a snapshot of `following`
    pub fn issue(&self, username: &str, following: &[String]) -> Result<String> {
        let now = Utc::now();
        let expiry = now + self.ttl;

        let claims = Claims {
            sub: username.to_string(),
            following: following.to_vec(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| anyhow!("Failed to issue token: {e}"))
    }

    // ========================================================================
    // Token Validation
    // ========================================================================

    /// Validate and decode a token
    ///
    /// ## Arguments
    ///
    /// * `token` - JWT string (without "Bearer " prefix)
    ///
    /// ## Errors
    ///
    /// Returns error if the signature does not match, the token is expired
    /// or the token is malformed. Callers must treat every error the same
    /// way: the token is unusable.
    pub fn verify(&self, token: &str) -> Result<TokenData<Claims>> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = VALIDATION_LEEWAY_SECS;

        decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| anyhow!("Token validation failed: {e}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
