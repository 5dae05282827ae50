use axum::extract::FromRef;
use slap_cache::{CacheStore, RedisStore, Slap};
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct AppState<S = RedisStore> {
    pub db: PgPool,
    pub cache: Slap<S>,
}

impl<S: CacheStore> AppState<S> {
    pub fn new(db: PgPool, cache: Slap<S>) -> Self {
        Self { db, cache }
    }
}

impl<S: CacheStore> FromRef<AppState<S>> for Slap<S> {
    fn from_ref(state: &AppState<S>) -> Self {
        state.cache.clone()
    }
}
