//! Redis-backed cache store.

use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::store::CacheStore;

/// Redis store sharing one multiplexed, self-reconnecting connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Opens a connection to Redis.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self { conn })
    }
}

fn seconds(ttl_secs: u64) -> i64 {
    i64::try_from(ttl_secs).unwrap_or(i64::MAX)
}

impl CacheStore for RedisStore {
    #[instrument(skip(self, value), fields(cache.operation = "SETEX"))]
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: String) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "GET"))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    #[instrument(skip(self), fields(cache.operation = "EXPIRE"))]
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, seconds(ttl_secs)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "SADD"))]
    async fn add_to_set(&self, set: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(set, member).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "SMEMBERS"))]
    async fn members_of(&self, set: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers::<_, Vec<String>>(set).await?)
    }

    #[instrument(skip(self, keys), fields(cache.operation = "DEL", cache.batch = keys.len()))]
    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let deleted: u64 = conn.del(keys).await?;

        debug!(cache.deleted = %deleted, "Keys deleted");

        Ok(())
    }

    /// Registers and stores in one `MULTI`/`EXEC` transaction.
    ///
    /// The transaction isolates the pair from other clients but has no
    /// rollback: if `SADD` fails at execution (for example `WRONGTYPE` on a
    /// non-set group key) the `SETEX` still runs and the error is returned.
    #[instrument(skip(self, value), fields(cache.operation = "MULTI"))]
    async fn set_tracked(&self, set: &str, key: &str, ttl_secs: u64, value: String) -> Result<()> {
        let mut conn = self.conn.clone();

        let (_added, ()): (u64, ()) = redis::pipe()
            .atomic()
            .sadd(set, key)
            .set_ex(key, value, ttl_secs)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}
