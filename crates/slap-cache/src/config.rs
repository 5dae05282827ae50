//! Global cache options.
//!
//! Options are validated once, when the cache is initialized. An invalid set
//! of options is fatal: [`crate::Slap`] refuses to build from it.

use std::env;

use redis::IntoConnectionInfo;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{CacheError, Result};

/// Store used when no `url` is configured.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Time-to-live applied when neither the route nor the options set one.
pub const DEFAULT_EXPIRE_SECONDS: u64 = 300;

/// Global options for the cache.
///
/// # Environment Variables
///
/// - `SLAP_REDIS_URL` (fallback `REDIS_URL`): store connection string
/// - `SLAP_EXPIRE_IN`: default TTL in seconds
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SlapOptions {
    /// Redis connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_redis_url"))]
    pub url: Option<String>,

    /// Default time-to-live for cached responses in seconds. `0` falls back
    /// to [`DEFAULT_EXPIRE_SECONDS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_in: Option<u64>,
}

impl SlapOptions {
    /// Load and validate options from environment variables.
    ///
    /// Unparseable values are errors rather than silent defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`SlapOptions::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("SLAP_REDIS_URL").or_else(|| lookup("REDIS_URL"));
        let expire_in = match lookup("SLAP_EXPIRE_IN") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                CacheError::invalid(format!(
                    "invalid options: SLAP_EXPIRE_IN must be a non-negative integer, got {raw:?}"
                ))
            })?),
            None => None,
        };

        let options = Self { url, expire_in };
        options.ensure_valid()?;
        Ok(options)
    }

    /// Parse options from a JSON object. Unknown keys are rejected.
    pub fn from_json(raw: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(raw)
            .map_err(|e| CacheError::invalid(format!("invalid options: {e}")))?;
        options.ensure_valid()?;
        Ok(options)
    }

    /// Run the option schema, mapping violations to [`CacheError::Invalid`].
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()
            .map_err(|errors| CacheError::invalid(format!("invalid options: {}", format_errors(&errors))))
    }

    pub fn redis_url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_REDIS_URL)
    }

    /// TTL used for routes without their own `expire`.
    pub fn default_expire(&self) -> u64 {
        match self.expire_in {
            Some(seconds) if seconds > 0 => seconds,
            _ => DEFAULT_EXPIRE_SECONDS,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_expire_in(mut self, seconds: u64) -> Self {
        self.expire_in = Some(seconds);
        self
    }
}

fn validate_redis_url(url: &str) -> std::result::Result<(), ValidationError> {
    if url.trim().is_empty() {
        return Err(ValidationError::new("url").with_message("url must not be empty".into()));
    }

    url.into_connection_info().map(|_| ()).map_err(|_| {
        ValidationError::new("url").with_message("url is not a valid Redis connection string".into())
    })
}

/// Joins field validation messages, naming the field when a rule has none.
pub fn format_errors(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|msg| msg.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"))
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}
