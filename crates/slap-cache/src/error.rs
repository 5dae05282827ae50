//! Error type shared by every cache operation.

/// Error type for cache operations.
///
/// A cache miss is never an error: reads return `Ok(None)` instead.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The plugin options or the route's cache settings are unusable.
    #[error("{0}")]
    Invalid(String),

    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    /// Failure reported by a store that is not backed by Redis.
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Name under which configuration errors are reported.
    pub const INVALID_NAME: &'static str = "slapInvalidError";

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Returns `true` for configuration errors, as opposed to store failures.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_displays_bare_message() {
        let err = CacheError::invalid("slap not configured for GET /users");
        assert!(err.is_invalid());
        assert_eq!(err.to_string(), "slap not configured for GET /users");
    }

    #[test]
    fn test_backend_is_not_invalid() {
        assert!(!CacheError::Backend("down".into()).is_invalid());
    }
}
