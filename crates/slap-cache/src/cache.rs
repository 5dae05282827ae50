//! Read, write and invalidation paths.

use std::sync::Arc;

use futures::future::try_join_all;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, instrument, warn};

use crate::config::SlapOptions;
use crate::context::RequestContext;
use crate::error::{CacheError, Result};
use crate::keys::derive_key;
use crate::redis::RedisStore;
use crate::route::{ClearTarget, RoutePlugins, resolve};
use crate::store::CacheStore;

/// Handle to an initialized cache.
///
/// Cheap to clone; every clone shares the same store connection. Build it once
/// at startup with [`Slap::connect`] (or [`Slap::with_store`]) and hand it to
/// request handlers through application state.
#[derive(Clone, Debug)]
pub struct Slap<S = RedisStore> {
    store: S,
    options: Arc<SlapOptions>,
}

impl Slap<RedisStore> {
    /// Validates `options` and connects to the configured Redis server.
    ///
    /// # Errors
    ///
    /// `CacheError::Invalid` for invalid options, `CacheError::Connection`
    /// when Redis cannot be reached.
    pub async fn connect(options: SlapOptions) -> Result<Self> {
        options.ensure_valid()?;
        let store = RedisStore::connect(options.redis_url()).await?;

        info!(
            cache.default_ttl_secs = options.default_expire(),
            "Cache store connected"
        );

        Ok(Self {
            store,
            options: Arc::new(options),
        })
    }
}

impl<S: CacheStore> Slap<S> {
    /// Builds a cache on top of an already opened store.
    pub fn with_store(store: S, options: SlapOptions) -> Result<Self> {
        options.ensure_valid()?;

        Ok(Self {
            store,
            options: Arc::new(options),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &SlapOptions {
        &self.options
    }

    /// Ends this handle by dropping it.
    ///
    /// Dropping is the whole close: the Redis `ConnectionManager` has no
    /// explicit shutdown and its connection ends when the last clone of the
    /// store goes away. Other clones of this handle keep working.
    pub async fn close(self) {
        info!("Cache store released");
    }

    /// Looks up the cached response for a request.
    ///
    /// A hit resets the entry's TTL. An entry that cannot be deserialized into
    /// `T` is reported and treated as a miss, so the caller overwrites it.
    #[instrument(skip_all, fields(cache.route = %ctx.route_label()))]
    pub async fn get_cache<T>(
        &self,
        plugins: Option<&RoutePlugins>,
        ctx: &RequestContext,
        spec: Option<&str>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let settings = resolve(plugins, ctx)?;
        let rule = settings.rule_for(ctx)?;
        let key = derive_key(rule, spec, ctx)?;
        let expire = settings.expire_or(self.options.default_expire());

        let Some(raw) = self.store.get(&key).await? else {
            debug!(cache.key = %key, "Cache miss");
            counter!("slap_cache_misses_total", "rule" => rule.to_owned()).increment(1);
            return Ok(None);
        };

        self.store.expire(&key, expire).await?;

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(cache.key = %key, cache.ttl_secs = expire, "Cache hit");
                counter!("slap_cache_hits_total", "rule" => rule.to_owned()).increment(1);
                Ok(Some(value))
            }
            Err(e) => {
                warn!(cache.key = %key, error = %e, "Failed to deserialize cached value");
                counter!("slap_cache_misses_total", "rule" => rule.to_owned()).increment(1);
                Ok(None)
            }
        }
    }

    /// Stores a response and records its key in the rule's group.
    #[instrument(skip_all, fields(cache.route = %ctx.route_label()))]
    pub async fn add_cache<T>(
        &self,
        plugins: Option<&RoutePlugins>,
        ctx: &RequestContext,
        data: &T,
        spec: Option<&str>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let settings = resolve(plugins, ctx)?;
        let rule = settings.rule_for(ctx)?;
        let key = derive_key(rule, spec, ctx)?;
        let expire = settings.expire_or(self.options.default_expire());
        let value = serde_json::to_string(data)?;

        self.store.set_tracked(rule, &key, expire, value).await?;

        debug!(cache.key = %key, cache.rule = %rule, cache.ttl_secs = expire, "Cache set");
        counter!("slap_cache_writes_total", "rule" => rule.to_owned()).increment(1);

        Ok(())
    }

    /// Invalidates the groups named by the route's `clear` setting.
    ///
    /// Returns the size of the deletion batch.
    #[instrument(skip_all, fields(cache.route = %ctx.route_label()))]
    pub async fn clear_cache(
        &self,
        plugins: Option<&RoutePlugins>,
        ctx: &RequestContext,
    ) -> Result<usize> {
        let settings = resolve(plugins, ctx)?;
        let target = settings.clear_for(ctx)?;

        self.clear_groups(target).await
    }

    /// Deletes every key recorded under the target groups, and the groups.
    pub async fn clear_groups(&self, target: &ClearTarget) -> Result<usize> {
        if !target.is_informed() {
            return Err(CacheError::invalid("slap (clear) not informed"));
        }

        let batch = self.invalidation_batch(target).await?;
        self.store.delete_many(&batch).await?;

        for name in target.names() {
            counter!("slap_cache_clears_total", "rule" => name.to_owned()).increment(1);
        }
        debug!(cache.groups = ?target.names(), cache.batch = batch.len(), "Cache cleared");

        Ok(batch.len())
    }

    /// Expands the target groups into one deletion batch: every member,
    /// followed by the group names themselves.
    ///
    /// Group lookups of a list run concurrently; if any fails the whole
    /// expansion fails with that error.
    pub async fn invalidation_batch(&self, target: &ClearTarget) -> Result<Vec<String>> {
        match target {
            ClearTarget::One(name) => {
                let mut batch = self.store.members_of(name).await?;
                batch.push(name.clone());
                Ok(batch)
            }
            ClearTarget::Many(names) => {
                let lookups = names.iter().map(|name| self.store.members_of(name));
                let members = try_join_all(lookups).await?;

                let mut batch: Vec<String> = members.into_iter().flatten().collect();
                batch.extend(names.iter().cloned());
                Ok(batch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::QueryParams;
    use crate::memory::MemoryStore;
    use crate::route::SlapSettings;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: i32,
        username: String,
    }

    fn users() -> Vec<User> {
        vec![
            User {
                id: 1,
                username: "username_1".into(),
            },
            User {
                id: 2,
                username: "username_2".into(),
            },
        ]
    }

    fn slap() -> Slap<MemoryStore> {
        Slap::with_store(MemoryStore::new(), SlapOptions::default().with_expire_in(500)).unwrap()
    }

    fn rule(rule: &str) -> RoutePlugins {
        RoutePlugins::with_slap(SlapSettings::rule(rule))
    }

    fn get(path: &str) -> RequestContext {
        RequestContext::new("GET", path)
    }

    /// Store whose every operation fails, to prove no operation was attempted.
    #[derive(Clone)]
    struct UnreachableStore;

    impl CacheStore for UnreachableStore {
        async fn set_with_expiry(&self, _: &str, _: u64, _: String) -> Result<()> {
            Err(CacheError::Backend("unreachable".into()))
        }
        async fn get(&self, _: &str) -> Result<Option<String>> {
            Err(CacheError::Backend("unreachable".into()))
        }
        async fn expire(&self, _: &str, _: u64) -> Result<()> {
            Err(CacheError::Backend("unreachable".into()))
        }
        async fn add_to_set(&self, _: &str, _: &str) -> Result<()> {
            Err(CacheError::Backend("unreachable".into()))
        }
        async fn members_of(&self, _: &str) -> Result<Vec<String>> {
            Err(CacheError::Backend("unreachable".into()))
        }
        async fn delete_many(&self, _: &[String]) -> Result<()> {
            Err(CacheError::Backend("unreachable".into()))
        }
    }

    /// Memory store failing group operations on one set name.
    #[derive(Clone, Default)]
    struct FlakyGroups {
        inner: MemoryStore,
        broken: &'static str,
    }

    impl CacheStore for FlakyGroups {
        async fn set_with_expiry(&self, key: &str, ttl: u64, value: String) -> Result<()> {
            self.inner.set_with_expiry(key, ttl, value).await
        }
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }
        async fn expire(&self, key: &str, ttl: u64) -> Result<()> {
            self.inner.expire(key, ttl).await
        }
        async fn add_to_set(&self, set: &str, member: &str) -> Result<()> {
            if set == self.broken {
                return Err(CacheError::Backend(format!("cannot add to {set}")));
            }
            self.inner.add_to_set(set, member).await
        }
        async fn members_of(&self, set: &str) -> Result<Vec<String>> {
            if set == self.broken {
                return Err(CacheError::Backend(format!("cannot read {set}")));
            }
            self.inner.members_of(set).await
        }
        async fn delete_many(&self, keys: &[String]) -> Result<()> {
            self.inner.delete_many(keys).await
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let slap = slap();
        let plugins = rule("users-cache");
        let ctx = get("/users");

        slap.add_cache(Some(&plugins), &ctx, &users(), None).await.unwrap();

        let cached: Option<Vec<User>> = slap.get_cache(Some(&plugins), &ctx, None).await.unwrap();
        assert_eq!(cached, Some(users()));
        assert_eq!(
            slap.store().members_of("users-cache").await.unwrap(),
            vec!["users-cache&default"]
        );
    }

    #[tokio::test]
    async fn test_miss_is_not_an_error() {
        let slap = slap();
        let cached: Option<Vec<User>> = slap
            .get_cache(Some(&rule("users-cache")), &get("/users"), None)
            .await
            .unwrap();
        assert_eq!(cached, None);
    }

    #[tokio::test]
    async fn test_spec_and_query_select_distinct_entries() {
        let slap = slap();
        let by_id = rule("users-cache-id");
        let list = rule("users-cache");
        let search = get("/users").with_query(QueryParams::parse("search=username_1"));

        slap.add_cache(Some(&by_id), &get("/user/{id}"), &users()[0], Some("1"))
            .await
            .unwrap();
        slap.add_cache(Some(&list), &search, &users()[..1], None)
            .await
            .unwrap();

        let store = slap.store();
        assert!(store.contains("users-cache-id&1").await);
        assert!(store.contains("users-cache&search=username_1").await);
        assert!(!store.contains("users-cache&default").await);

        let one: Option<User> = slap
            .get_cache(Some(&by_id), &get("/user/{id}"), Some("1"))
            .await
            .unwrap();
        assert_eq!(one, Some(users()[0].clone()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_use_default_expire() {
        let slap = slap();
        slap.add_cache(Some(&rule("users-cache")), &get("/users"), &users(), None)
            .await
            .unwrap();

        assert_eq!(
            slap.store().ttl("users-cache&default").await,
            Some(Duration::from_secs(500))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_expire_overrides_default() {
        let slap = slap();
        let plugins = RoutePlugins::with_slap(SlapSettings::rule("users-cache").with_expire(30));
        slap.add_cache(Some(&plugins), &get("/users"), &users(), None)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        let cached: Option<Vec<User>> = slap.get_cache(Some(&plugins), &get("/users"), None).await.unwrap();
        assert_eq!(cached, None);
    }

    #[tokio::test]
    async fn test_close_leaves_other_handles_usable() {
        let slap = slap();
        let other = slap.clone();
        slap.close().await;

        other
            .add_cache(Some(&rule("users-cache")), &get("/users"), &users(), None)
            .await
            .unwrap();
        assert!(other.store().contains("users-cache&default").await);
    }

    #[tokio::test]
    async fn test_oversized_expire_is_a_store_error() {
        let options = SlapOptions::from_lookup(|name| {
            (name == "SLAP_EXPIRE_IN").then(|| u64::MAX.to_string())
        })
        .unwrap();
        let slap = Slap::with_store(MemoryStore::new(), options).unwrap();

        let result = slap
            .add_cache(Some(&rule("users-cache")), &get("/users"), &users(), None)
            .await;

        assert!(matches!(result, Err(CacheError::Backend(_))));
        assert!(slap.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_slides_expiry() {
        let slap = slap();
        let plugins = rule("users-cache");
        let ctx = get("/users");
        slap.add_cache(Some(&plugins), &ctx, &users(), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(400)).await;
        let _: Option<Vec<User>> = slap.get_cache(Some(&plugins), &ctx, None).await.unwrap();
        assert_eq!(
            slap.store().ttl("users-cache&default").await,
            Some(Duration::from_secs(500))
        );

        tokio::time::advance(Duration::from_secs(400)).await;
        let cached: Option<Vec<User>> = slap.get_cache(Some(&plugins), &ctx, None).await.unwrap();
        assert_eq!(cached, Some(users()));
    }

    #[tokio::test]
    async fn test_undecodable_entry_reads_as_miss() {
        let slap = slap();
        slap.store()
            .set_with_expiry("users-cache&default", 60, "not json".into())
            .await
            .unwrap();

        let cached: Option<Vec<User>> = slap
            .get_cache(Some(&rule("users-cache")), &get("/users"), None)
            .await
            .unwrap();
        assert_eq!(cached, None);
    }

    #[tokio::test]
    async fn test_clear_single_group() {
        let slap = slap();
        let plugins = rule("users-cache");
        let search = get("/users").with_query(QueryParams::parse("search=username_1"));

        slap.add_cache(Some(&plugins), &get("/users"), &users(), None).await.unwrap();
        slap.add_cache(Some(&plugins), &search, &users(), None).await.unwrap();

        let clear = RoutePlugins::with_slap(SlapSettings::clear_one("users-cache"));
        let removed = slap.clear_cache(Some(&clear), &get("/users")).await.unwrap();

        assert_eq!(removed, 3);
        assert!(slap.store().is_empty().await);

        let cached: Option<Vec<User>> = slap.get_cache(Some(&plugins), &search, None).await.unwrap();
        assert_eq!(cached, None);
    }

    #[tokio::test]
    async fn test_clear_many_groups_in_one_batch() {
        let slap = slap();
        slap.add_cache(Some(&rule("users-cache")), &get("/users"), &users(), None)
            .await
            .unwrap();
        slap.add_cache(Some(&rule("users-cache-id")), &get("/user/{id}"), &users()[0], Some("1"))
            .await
            .unwrap();
        slap.add_cache(Some(&rule("posts-cache")), &get("/posts"), &Vec::<User>::new(), None)
            .await
            .unwrap();

        let target = ClearTarget::Many(vec!["users-cache".into(), "users-cache-id".into()]);
        let batch = slap.invalidation_batch(&target).await.unwrap();
        assert_eq!(
            batch,
            vec![
                "users-cache&default",
                "users-cache-id&1",
                "users-cache",
                "users-cache-id"
            ]
        );

        let clear = RoutePlugins::with_slap(SlapSettings::clear_many(["users-cache", "users-cache-id"]));
        slap.clear_cache(Some(&clear), &RequestContext::new("POST", "/user-clear"))
            .await
            .unwrap();

        let store = slap.store();
        assert!(!store.contains("users-cache&default").await);
        assert!(!store.contains("users-cache-id&1").await);
        assert!(!store.contains("users-cache").await);
        assert!(store.contains("posts-cache&default").await);
    }

    #[tokio::test]
    async fn test_clear_of_unknown_group_deletes_marker_only() {
        let slap = slap();
        let removed = slap.clear_groups(&ClearTarget::from("never-written")).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_failed_group_lookup_aborts_clear() {
        let store = FlakyGroups {
            inner: MemoryStore::new(),
            broken: "users-cache-id",
        };
        let slap = Slap::with_store(store, SlapOptions::default()).unwrap();
        slap.add_cache(Some(&rule("users-cache")), &get("/users"), &users(), None)
            .await
            .unwrap();

        let clear = RoutePlugins::with_slap(SlapSettings::clear_many(["users-cache", "users-cache-id"]));
        let err = slap.clear_cache(Some(&clear), &get("/users")).await.unwrap_err();

        assert!(matches!(err, CacheError::Backend(_)));
        assert!(slap.store().inner.contains("users-cache&default").await);
        assert!(slap.store().inner.contains("users-cache").await);
    }

    #[tokio::test]
    async fn test_default_tracked_write_is_not_atomic() {
        let store = FlakyGroups {
            inner: MemoryStore::new(),
            broken: "users-cache",
        };
        let slap = Slap::with_store(store, SlapOptions::default()).unwrap();

        let err = slap
            .add_cache(Some(&rule("users-cache")), &get("/users"), &users(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Backend(_)));
        // the value write is issued independently of the failed registration
        assert!(slap.store().inner.contains("users-cache&default").await);
    }

    #[tokio::test]
    async fn test_configuration_errors_precede_store_access() {
        let slap = Slap::with_store(UnreachableStore, SlapOptions::default()).unwrap();
        let ctx = get("/users-error-rule");
        let empty = RoutePlugins::with_slap(SlapSettings::default());

        let read = slap.get_cache::<Vec<User>>(Some(&empty), &ctx, None).await.unwrap_err();
        assert_eq!(read.to_string(), "slap (rule) not informed for GET /users-error-rule");

        let write = slap.add_cache(None, &ctx, &users(), None).await.unwrap_err();
        assert_eq!(write.to_string(), "plugin slap not configured for GET /users-error-rule");

        let clear = slap.clear_cache(Some(&empty), &ctx).await.unwrap_err();
        assert_eq!(clear.to_string(), "slap (clear) not informed for GET /users-error-rule");
    }

    #[tokio::test]
    async fn test_empty_clear_list_is_invalid() {
        let slap = slap();
        let err = slap
            .clear_groups(&ClearTarget::Many(Vec::new()))
            .await
            .unwrap_err();
        assert!(err.is_invalid());
    }

    #[test]
    fn test_invalid_options_are_refused() {
        let options = SlapOptions::default().with_url("");
        let err = Slap::with_store(MemoryStore::new(), options).unwrap_err();
        assert!(err.is_invalid());
    }
}
