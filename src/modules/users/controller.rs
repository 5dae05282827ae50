use crate::modules::users::model::{User, UserSearch};
use crate::modules::users::service::UserService;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::validator::ValidatedQuery;
use axum::{
    Json,
    extract::{Path, State},
};
use slap_cache::{CacheStore, RequestCache};
use tracing::{instrument, warn};

/// List users, optionally filtered by `?search=<username>`.
///
/// Served from the cache when the same query was answered before.
#[instrument(skip(state, cache))]
pub async fn get_users<S: CacheStore>(
    State(state): State<AppState<S>>,
    cache: RequestCache<S>,
    ValidatedQuery(query): ValidatedQuery<UserSearch>,
) -> Result<Json<Vec<User>>, AppError> {
    if let Some(users) = cache.get_cache::<Vec<User>>(None).await? {
        return Ok(Json(users));
    }

    let users = UserService::get_users(&state.db, query.search.as_deref()).await?;

    if let Err(e) = cache.add_cache(&users, None).await {
        warn!(error = %e, "Failed to cache users");
    }

    Ok(Json(users))
}

/// Fetch one user by id. Answers `null` when no such user exists.
///
/// Only found users are cached, and a stored `null` counts as a miss, so a
/// user created later under the same id is served right away.
#[instrument(skip(state, cache))]
pub async fn get_user<S: CacheStore>(
    State(state): State<AppState<S>>,
    cache: RequestCache<S>,
    Path(id): Path<i32>,
) -> Result<Json<Option<User>>, AppError> {
    let spec = id.to_string();

    if let Some(Some(user)) = cache.get_cache::<Option<User>>(Some(&spec)).await? {
        return Ok(Json(Some(user)));
    }

    let Some(user) = UserService::get_user(&state.db, id).await? else {
        return Ok(Json(None));
    };

    if let Err(e) = cache.add_cache(&user, Some(&spec)).await {
        warn!(error = %e, user_id = id, "Failed to cache user");
    }

    Ok(Json(Some(user)))
}

/// Invalidate every cached user response.
#[instrument(skip(cache))]
pub async fn clear_users<S: CacheStore>(cache: RequestCache<S>) -> Result<(), AppError> {
    cache.clear_cache().await?;
    Ok(())
}
