//! Identity primitives shared by the Lenic API
//!
//! - [`jwt`]: session tokens carrying the caller's username and a snapshot
//!   of the usernames they follow
//! - [`hash`]: Argon2id password hashing

pub mod hash;
pub mod jwt;

pub use hash::{hash_password, verify_password};
pub use jwt::{Claims, JwtKeys};
