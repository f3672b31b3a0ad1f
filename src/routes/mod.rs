//! HTTP routes of the blog API.
//!
//! - `tags`, `articles`, `users`: the `/api/v1` resources
//! - `upload`: `POST /c/upload/file`; stored files are served under `/c/static`
//! - `health`: liveness, readiness, metrics and version
//! - `extract`: request extractors that validate before a handler runs

pub mod articles;
pub mod extract;
pub mod health;
pub mod tags;
pub mod upload;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::middleware;
use crate::state::AppState;

/// Builds the full application router over `state`.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();
    let body_limit = cfg.server.body_limit_mb * 1024 * 1024;
    let static_files = ServeDir::new(&cfg.upload.save_path);

    let api = Router::new()
        .route("/user/{id}", get(users::get_user))
        .route("/tag", get(tags::list_tags).post(tags::create_tag))
        .route("/tag/{id}", get(tags::get_tag).put(tags::update_tag).delete(tags::delete_tag))
        .route("/article", get(articles::list_articles).post(articles::create_article))
        .route(
            "/article/{id}",
            get(articles::get_article).put(articles::update_article).delete(articles::delete_article),
        );

    let app = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .nest("/api/v1", api)
        .route("/c/upload/file", post(upload::upload_file))
        .nest_service("/c/static", static_files)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(body_limit, middleware::validation::screen_request_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware));

    // Permissive CORS only for local development against a separately served frontend.
    if cfg!(debug_assertions) {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Read-through cache lookup that feeds the hit/miss counters.
///
/// Returns `None` on a miss; counters are untouched when no cache is configured.
pub(crate) async fn read_cached<T: DeserializeOwned>(state: &AppState, key: &str) -> Option<T> {
    state.data.cache()?;
    let value = state.data.cache_get::<T>(key).await;
    state.metrics.record_cache(value.is_some());
    value
}
