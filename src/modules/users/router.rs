use crate::modules::users::controller::{clear_users, get_user, get_users};
use crate::state::AppState;
use axum::{
    Extension, Router,
    routing::{get, post},
};
use slap_cache::{CacheStore, RoutePlugins, SlapSettings};

pub const USERS_RULE: &str = "users-cache";
pub const USER_BY_ID_RULE: &str = "users-cache-id";

pub fn init_users_router<S: CacheStore>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/users",
            get(get_users::<S>).layer(Extension(RoutePlugins::with_slap(SlapSettings::rule(
                USERS_RULE,
            )))),
        )
        .route(
            "/user/{id}",
            get(get_user::<S>).layer(Extension(RoutePlugins::with_slap(SlapSettings::rule(
                USER_BY_ID_RULE,
            )))),
        )
        .route(
            "/user-clear",
            post(clear_users::<S>).layer(Extension(RoutePlugins::with_slap(
                SlapSettings::clear_many([USERS_RULE, USER_BY_ID_RULE]),
            ))),
        )
}
