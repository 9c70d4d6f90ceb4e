//! Caller identity decoded from a validated session token
//!
//! `JwtClaims` is what the authorization layer reasons about and what it
//! stores in request extensions for handlers once a call is allowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Claims extracted from a validated token
///
/// Immutable once decoded and scoped to a single call.
///
/// ## Design Notes
///
/// - `following` is the snapshot taken when the token was issued. It is
///   never re-queried per call, so follow-graph changes take effect at the
///   caller's next login (at most one token lifetime later).
/// - Fields are public for direct access (no getter boilerplate)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Username of the caller (`sub` claim)
    pub username: String,

    /// Usernames the caller followed at token issuance
    pub following: BTreeSet<String>,

    /// Issued at timestamp (Unix timestamp)
    pub iat: i64,

    /// Expiration timestamp (Unix timestamp)
    pub exp: i64,
}

impl JwtClaims {
    /// Create JwtClaims from crypto-core's validated Claims
    ///
    /// This is the bridge between the token validation layer and the
    /// authorization layer.
    ///
    /// ## Errors
    ///
    /// Returns error if the `sub` claim is empty
    pub fn from_validated_claims(claims: &crypto_core::Claims) -> Result<Self, anyhow::Error> {
        if claims.sub.trim().is_empty() {
            anyhow::bail!("Token subject is empty");
        }

        Ok(Self {
            username: claims.sub.clone(),
            following: claims.following.iter().cloned().collect(),
            iat: claims.iat,
            exp: claims.exp,
        })
    }

    /// True if `username` names the caller
    pub fn is_self(&self, username: &str) -> bool {
        self.username == username
    }

    /// True if `username` was in the caller's following snapshot
    pub fn follows(&self, username: &str) -> bool {
        self.following.contains(username)
    }

    /// True if `username` is the caller or someone the caller follows
    pub fn is_self_or_followed(&self, username: &str) -> bool {
        self.is_self(username) || self.follows(username)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
