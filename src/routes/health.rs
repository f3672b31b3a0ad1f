use std::time::Duration;

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

const READY_TIMEOUT: Duration = Duration::from_secs(5);

// Liveness: the process answers.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness: the database answers and, when configured, the cache does too.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(state.data.db());
    match tokio::time::timeout(READY_TIMEOUT, query).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: database: {}", e)).into_response(),
        Err(_) => return (StatusCode::SERVICE_UNAVAILABLE, "not ready: database timeout").into_response(),
    }

    if let Some(cache) = state.data.cache() {
        match tokio::time::timeout(READY_TIMEOUT, cache.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: cache: {}", e)).into_response(),
            Err(_) => return (StatusCode::SERVICE_UNAVAILABLE, "not ready: cache timeout").into_response(),
        }
    }

    (StatusCode::OK, "ready").into_response()
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let body = format!(
        "# HELP blog_tags_written Tag create/update/delete operations\n# TYPE blog_tags_written counter\nblog_tags_written {}\n\
# HELP blog_articles_written Article create/update/delete operations\n# TYPE blog_articles_written counter\nblog_articles_written {}\n\
# HELP blog_uploads Files uploaded\n# TYPE blog_uploads counter\nblog_uploads {}\n\
# HELP blog_upload_bytes Bytes uploaded\n# TYPE blog_upload_bytes counter\nblog_upload_bytes {}\n\
# HELP blog_cache_hits Read-through cache hits\n# TYPE blog_cache_hits counter\nblog_cache_hits {}\n\
# HELP blog_cache_misses Read-through cache misses\n# TYPE blog_cache_misses counter\nblog_cache_misses {}\n\
# HELP blog_uptime_seconds Uptime seconds\n# TYPE blog_uptime_seconds gauge\nblog_uptime_seconds {}\n",
        m.tags_written,
        m.articles_written,
        m.uploads,
        m.upload_bytes,
        m.cache_hits,
        m.cache_misses,
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
