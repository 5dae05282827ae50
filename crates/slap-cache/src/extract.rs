//! Request-bound access to the cache for axum handlers.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use serde::{Serialize, de::DeserializeOwned};

use crate::cache::Slap;
use crate::context::RequestContext;
use crate::error::Result;
use crate::redis::RedisStore;
use crate::route::RoutePlugins;
use crate::store::CacheStore;

/// Cache operations bound to the current request and route.
///
/// Extracting never fails. A route without usable cache settings only fails
/// when one of the operations is called.
///
/// ```ignore
/// async fn list_users(cache: RequestCache, State(db): State<PgPool>) -> Result<Json<Vec<User>>, AppError> {
///     if let Some(users) = cache.get_cache(None).await? {
///         return Ok(Json(users));
///     }
///     let users = load_users(&db).await?;
///     cache.add_cache(&users, None).await?;
///     Ok(Json(users))
/// }
/// ```
#[derive(Clone, Debug)]
pub struct RequestCache<S = RedisStore> {
    slap: Slap<S>,
    plugins: Option<RoutePlugins>,
    context: RequestContext,
}

impl<S: CacheStore> RequestCache<S> {
    pub fn new(slap: Slap<S>, plugins: Option<RoutePlugins>, context: RequestContext) -> Self {
        Self {
            slap,
            plugins,
            context,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn plugins(&self) -> Option<&RoutePlugins> {
        self.plugins.as_ref()
    }

    /// See [`Slap::get_cache`].
    pub async fn get_cache<T>(&self, spec: Option<&str>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.slap
            .get_cache(self.plugins.as_ref(), &self.context, spec)
            .await
    }

    /// See [`Slap::add_cache`].
    pub async fn add_cache<T>(&self, data: &T, spec: Option<&str>) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.slap
            .add_cache(self.plugins.as_ref(), &self.context, data, spec)
            .await
    }

    /// See [`Slap::clear_cache`].
    pub async fn clear_cache(&self) -> Result<usize> {
        self.slap
            .clear_cache(self.plugins.as_ref(), &self.context)
            .await
    }
}

impl<St, S> FromRequestParts<St> for RequestCache<S>
where
    S: CacheStore,
    Slap<S>: FromRef<St>,
    St: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self {
            slap: Slap::from_ref(state),
            plugins: parts.extensions.get::<RoutePlugins>().cloned(),
            context: RequestContext::from_parts(parts),
        })
    }
}
