//! # Slap Cache
//!
//! Route-scoped response caching over Redis.
//!
//! This crate provides:
//! - Cache key derivation from a route's rule, a per-call spec, the query
//!   string and the `fields` header
//! - Read (with sliding expiration), write and group invalidation paths
//! - Group tracking: every key written under a rule is recorded in a set named
//!   after the rule, so the whole group can be removed at once
//! - Global options with validation, and lazily validated per-route settings
//! - An axum extractor binding the operations to the current request
//!
//! # Example
//!
//! ```ignore
//! use slap_cache::{Slap, SlapOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = SlapOptions::from_env().unwrap();
//!     let cache = Slap::connect(options).await.unwrap();
//!
//!     let app = Router::new()
//!         .route(
//!             "/users",
//!             get(list_users).layer(Extension(RoutePlugins::with_slap(SlapSettings::rule("users-cache")))),
//!         )
//!         .route(
//!             "/user-clear",
//!             post(clear_users).layer(Extension(RoutePlugins::with_slap(SlapSettings::clear_one("users-cache")))),
//!         )
//!         .with_state(cache);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod keys;
pub mod memory;
pub mod redis;
pub mod route;
pub mod store;

pub use crate::cache::Slap;
pub use crate::config::{DEFAULT_EXPIRE_SECONDS, DEFAULT_REDIS_URL, SlapOptions};
pub use crate::context::{FIELDS_HEADER, QueryParams, RequestContext};
pub use crate::error::{CacheError, Result};
pub use crate::extract::RequestCache;
pub use crate::keys::derive_key;
pub use crate::memory::MemoryStore;
pub use crate::redis::RedisStore;
pub use crate::route::{ClearTarget, RoutePlugins, SlapSettings};
pub use crate::store::CacheStore;
