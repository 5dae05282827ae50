//! In-process cache store.
//!
//! Mirrors the Redis semantics the cache relies on (expiring strings, sets,
//! idempotent deletes) for tests and single-process deployments. Expiry is
//! measured with [`tokio::time::Instant`], so paused test time applies.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::store::CacheStore;

#[derive(Debug)]
enum Slot {
    Value { data: String, expires_at: Instant },
    Set(BTreeSet<String>),
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self, Slot::Value { expires_at, .. } if *expires_at <= now)
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::Backend(format!(
        "WRONGTYPE operation against key {key:?} holding the wrong kind of value"
    ))
}

fn invalid_expire() -> CacheError {
    CacheError::Backend("invalid expire time".into())
}

/// Cache store kept in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of a stored value, `None` when absent or a set.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        purge(&mut slots, key, now);

        match slots.get(key) {
            Some(Slot::Value { expires_at, .. }) => Some(expires_at.saturating_duration_since(now)),
            _ => None,
        }
    }

    /// Whether `key` currently holds a live value or set.
    pub async fn contains(&self, key: &str) -> bool {
        let mut slots = self.slots.lock().await;
        purge(&mut slots, key, Instant::now());
        slots.contains_key(key)
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        slots.retain(|_, slot| !slot.is_expired(now));
        slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Deadline `ttl_secs` after `now`, or an error when it cannot be represented.
fn deadline(now: Instant, ttl_secs: u64) -> Result<Instant> {
    now.checked_add(Duration::from_secs(ttl_secs))
        .ok_or_else(invalid_expire)
}

fn purge(slots: &mut HashMap<String, Slot>, key: &str, now: Instant) {
    if slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
        slots.remove(key);
    }
}

fn store_value(slots: &mut HashMap<String, Slot>, key: &str, ttl_secs: u64, value: String) -> Result<()> {
    if ttl_secs == 0 {
        return Err(invalid_expire());
    }

    let expires_at = deadline(Instant::now(), ttl_secs)?;
    slots.insert(key.to_owned(), Slot::Value { data: value, expires_at });
    Ok(())
}

fn add_member(slots: &mut HashMap<String, Slot>, set: &str, member: &str) -> Result<()> {
    purge(slots, set, Instant::now());

    match slots
        .entry(set.to_owned())
        .or_insert_with(|| Slot::Set(BTreeSet::new()))
    {
        Slot::Set(members) => {
            members.insert(member.to_owned());
            Ok(())
        }
        Slot::Value { .. } => Err(wrong_type(set)),
    }
}

impl CacheStore for MemoryStore {
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: String) -> Result<()> {
        let mut slots = self.slots.lock().await;
        store_value(&mut slots, key, ttl_secs, value)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut slots = self.slots.lock().await;
        purge(&mut slots, key, Instant::now());

        match slots.get(key) {
            Some(Slot::Value { data, .. }) => Ok(Some(data.clone())),
            Some(Slot::Set(_)) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        purge(&mut slots, key, now);

        if ttl_secs == 0 {
            slots.remove(key);
            return Ok(());
        }

        if let Some(Slot::Value { expires_at, .. }) = slots.get_mut(key) {
            *expires_at = deadline(now, ttl_secs)?;
        }

        Ok(())
    }

    async fn add_to_set(&self, set: &str, member: &str) -> Result<()> {
        let mut slots = self.slots.lock().await;
        add_member(&mut slots, set, member)
    }

    async fn members_of(&self, set: &str) -> Result<Vec<String>> {
        let mut slots = self.slots.lock().await;
        purge(&mut slots, set, Instant::now());

        match slots.get(set) {
            Some(Slot::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Slot::Value { .. }) => Err(wrong_type(set)),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let deleted = keys.iter().filter(|key| slots.remove(key.as_str()).is_some()).count();

        debug!(cache.deleted = %deleted, "Keys deleted");

        Ok(())
    }

    /// Registers and stores under a single lock.
    async fn set_tracked(&self, set: &str, key: &str, ttl_secs: u64, value: String) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();
        purge(&mut slots, set, now);

        if ttl_secs == 0 {
            return Err(invalid_expire());
        }
        deadline(now, ttl_secs)?;
        if matches!(slots.get(set), Some(Slot::Value { .. })) {
            return Err(wrong_type(set));
        }

        add_member(&mut slots, set, key)?;
        store_value(&mut slots, key, ttl_secs, value)
    }
}
