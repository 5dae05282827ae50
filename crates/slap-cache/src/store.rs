//! Key-value store abstraction used by the cache.

use std::future::Future;

use crate::error::Result;

/// Operations the cache needs from its key-value store.
///
/// TTLs are in seconds. Operations on absent keys are no-ops, never errors.
pub trait CacheStore: Clone + Send + Sync + 'static {
    /// Stores `value` at `key`, expiring after `ttl_secs`.
    fn set_with_expiry(
        &self,
        key: &str,
        ttl_secs: u64,
        value: String,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Resets the expiry of `key`. No-op when the key is gone.
    fn expire(&self, key: &str, ttl_secs: u64) -> impl Future<Output = Result<()>> + Send;

    fn add_to_set(&self, set: &str, member: &str) -> impl Future<Output = Result<()>> + Send;

    fn members_of(&self, set: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Deletes every key in `keys`, ignoring absent ones.
    fn delete_many(&self, keys: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// Stores `value` at `key` and records `key` as a member of `set`.
    ///
    /// The provided implementation issues both operations concurrently and
    /// waits for both. It is not atomic: one may succeed while the other
    /// fails, and the registration error is reported first. Stores able to
    /// batch commands override it.
    fn set_tracked(
        &self,
        set: &str,
        key: &str,
        ttl_secs: u64,
        value: String,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            let (registered, stored) = tokio::join!(
                self.add_to_set(set, key),
                self.set_with_expiry(key, ttl_secs, value)
            );
            registered?;
            stored
        }
    }
}
