use std::path::Path;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::data::Data;
use crate::db::{self, MigrateOptions};
use crate::routes;
use crate::state::AppState;

/// A router over a fresh SQLite file and memory cache; dropping it removes the files.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub fn test_config(dir: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.database.source = format!("sqlite://{}", dir.join("blog.db").display());
    cfg.database.max_connections = 4;
    cfg.log.dir = dir.join("logs").display().to_string();
    cfg.upload.save_path = dir.join("uploads").display().to_string();
    cfg.upload.server_url = "http://blog.test/c/static/".to_string();
    cfg
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Like [`setup_test_app`], with `adjust` applied to the config first.
pub async fn setup_test_app_with(adjust: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    adjust(&mut cfg);
    let (data, _release) = Data::new(&cfg).await.unwrap();
    db::migrate(data.db(), MigrateOptions::default()).await.unwrap();

    let state = AppState::new(data, cfg);
    let app = routes::router(state.clone());
    TestApp { app, state, dir }
}

/// Sends `req` through `app`; usable from spawned tasks holding a router clone.
pub async fn send_to(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        send_to(self.app.clone(), req).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().method(Method::DELETE).uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(Method::POST, uri, &body)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(Method::PUT, uri, &body)).await
    }

    /// Creates a tag named `name` and returns its id.
    pub async fn create_tag(&self, name: &str) -> i64 {
        let (status, body) = self
            .post_json(
                "/api/v1/tag",
                serde_json::json!({ "name": name, "created_by": "alice", "updated_by": "alice" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql).fetch_one(self.state.data.db()).await.unwrap()
    }
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// `(field, code)` pairs of a `VALIDATION_ERROR` body.
pub fn field_errors(body: &Value) -> Vec<(String, String)> {
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR", "{}", body);
    body["error"]["details"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| (f["field"].as_str().unwrap().to_string(), f["code"].as_str().unwrap().to_string()))
        .collect()
}
