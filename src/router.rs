use crate::logging::logging_middleware;
use crate::metrics::metrics_middleware;
use crate::modules::users::router::init_users_router;
use crate::state::AppState;
use axum::{Json, Router, middleware, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use slap_cache::CacheStore;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn init_router<S: CacheStore>(state: AppState<S>, metrics: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new()
        .merge(init_users_router::<S>())
        .route("/health", get(health));

    if let Some(handle) = metrics {
        router = router.route("/metrics", get(move || async move { handle.render() }));
    }

    router
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}
