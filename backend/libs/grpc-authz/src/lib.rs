//! Call Authorization for the Lenic gRPC API
//!
//! Sits between the transport and every handler and decides, per call,
//! whether the caller may proceed.
//!
//! ## Components
//!
//! - **policy**: `Operation` catalogue and its access tiers
//! - **introspect**: decodes a request and extracts the addressed target
//! - **resolver**: ownership and visibility through repository lookups
//! - **replay**: `ReplayBody`, reads the first message once and replays it
//! - **interceptor**: `Authorizer`, the decision engine
//! - **layer**: `AuthzLayer`, the tower integration point
//! - **login**: password check and session token issuance
//!
//! ## Usage
//!
//! ```rust,no_run
//! use grpc_authz::{AuthzConfig, AuthzLayer, Authorizer, PgRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AuthzConfig::from_env()?;
//! let keys = Arc::new(config.jwt_keys()?);
//! let database = config
//!     .database
//!     .as_ref()
//!     .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;
//! let repository = Arc::new(PgRepository::connect(database).await?);
//!
//! let layer = AuthzLayer::from_config(Authorizer::new(keys, repository), &config);
//! // tonic::transport::Server::builder().layer(layer).add_service(..)
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod interceptor;
pub mod introspect;
pub mod layer;
pub mod login;
pub mod memory;
pub mod pb;
pub mod policy;
pub mod replay;
pub mod repository;
pub mod resolver;

pub use config::{AuthzConfig, ConfigError, DatabaseConfig};
pub use error::{AuthzError, AuthzResult, ACCESS_DENIED};
pub use interceptor::Authorizer;
pub use introspect::{Condition, IntrospectError, LenicRequest, ResourceRef, Target};
pub use layer::{AuthzLayer, AuthzService};
pub use login::{LoginError, LoginService};
pub use memory::InMemoryRepository;
pub use policy::{AccessTier, CallShape, Operation};
pub use replay::{encode_grpc_frame, ReplayBody, ReplayError};
pub use repository::{PgRepository, Repository};
pub use resolver::{OwnershipResolver, Owner, ResolveError};

// Handlers read the caller through this
pub use grpc_jwt_propagation::{JwtClaims, JwtClaimsExt};
