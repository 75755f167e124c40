mod common;

use appkit::Bootstrap;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use common::test_config;
use serde_json::Value;
use tower::ServiceExt;

async fn call(router: Router, uri: &str) -> (StatusCode, Value) {
    let resp = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn router() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let built = Bootstrap::new(test_config(dir.path()))
        .routes(|state| {
            let name = state.app.name().to_string();
            Router::new().route(
                "/hello",
                get(move || {
                    let name = name.clone();
                    async move { format!("hello from {name}") }
                }),
            )
        })
        .build()
        .await
        .unwrap();
    (built.router, dir)
}

#[tokio::test]
async fn health_needs_no_database() {
    let (router, _dir) = router().await;
    let (status, body) = call(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn version_reports_package() {
    let (router, _dir) = router().await;
    let (status, body) = call(router, "/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "appkit");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn info_reports_application_name() {
    let (router, _dir) = router().await;
    let (status, body) = call(router, "/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["app"], "testapp");
    assert!(body["models"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn registered_routes_are_merged() {
    let (router, _dir) = router().await;
    let resp = router
        .oneshot(Request::builder().uri("/hello").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello from testapp");
}

#[tokio::test]
async fn ready_is_degraded_without_database() {
    let (router, _dir) = router().await;
    let (status, body) = call(router, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "unavailable");
}

#[tokio::test]
async fn migration_status_surfaces_database_error() {
    let (router, _dir) = router().await;
    let (status, body) = call(router, "/migrations").await;
    assert!(status.is_server_error());
    assert!(body["error"]["code"].is_string());
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (router, _dir) = router().await;
    let (status, _) = call(router, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
