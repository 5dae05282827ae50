//! # Slap CLI
//!
//! Operator commands for the slap cache: derive the key a request would use,
//! list the keys tracked under a group, and invalidate groups.
//!
//! ## Usage
//!
//! ```ignore
//! use slap_cli::commands::{clear_groups, derive};
//!
//! let key = derive("users-cache", None, &["search=username_1".into()], None)?;
//! let removed = clear_groups(&cache, &["users-cache".into()]).await?;
//! ```

pub mod commands;
