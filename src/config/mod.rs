//! Configuration for the demo API.
//!
//! Values are read from environment variables, with `.env` loaded by
//! `dotenvy` at startup. Cache options live in `slap_cache::SlapOptions`.
//!
//! - [`database`]: PostgreSQL pool initialization
//! - [`server`]: listen address

pub mod database;
pub mod server;
