//! Control API routes exercised in-process.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{registry_with, ScriptedProber};
use pingops::api::create_router;
use pingops::Registry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> (Arc<Registry>, Router) {
    let registry = Arc::new(registry_with(ScriptedProber::new(), Duration::from_millis(50)));
    (Arc::clone(&registry), create_router(registry))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn register_returns_created_then_ok() {
    let (registry, app) = app();
    let body = serde_json::json!({ "address": "10.0.0.1", "label": "core-sw" });

    let (status, text) = call(&app, "POST", "/api/monitors", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let record: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(record["status"], "UNKNOWN");
    assert_eq!(record["target"]["label"], "core-sw");

    let (status, _) = call(&app, "POST", "/api/monitors", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn invalid_address_is_bad_request() {
    let (registry, app) = app();
    let (status, text) =
        call(&app, "POST", "/api/monitors", Some(serde_json::json!({ "address": "not a host" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.contains("invalid target"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn snapshot_lists_registered_targets() {
    let (registry, app) = app();
    registry.register("10.0.0.1", Some("core-sw")).unwrap();
    registry.register("10.0.0.2", None).unwrap();

    let (status, text) = call(&app, "GET", "/api/snapshot", None).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(snapshot["entries"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["entries"][0]["address"], "10.0.0.1");
    assert_eq!(snapshot["entries"][1]["status"], "UNKNOWN");
}

#[tokio::test]
async fn start_stop_and_delete_by_address() {
    let (registry, app) = app();
    registry.register("10.0.0.1", None).unwrap();

    let (status, _) = call(&app, "POST", "/api/monitors/10.0.0.1/start", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(registry.get("10.0.0.1").unwrap().running);

    let (status, _) = call(&app, "POST", "/api/monitors/10.0.0.1/stop", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!registry.get("10.0.0.1").unwrap().running);

    let (status, _) = call(&app, "POST", "/api/monitors/10.9.9.9/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "DELETE", "/api/monitors/10.0.0.1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "DELETE", "/api/monitors/10.0.0.1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn broadcast_commands_report_counts() {
    let (registry, app) = app();
    registry.register("10.0.0.1", None).unwrap();
    registry.register("10.0.0.2", None).unwrap();

    let (_, text) = call(&app, "POST", "/api/start-all", None).await;
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap()["started"], 2);

    let (_, text) = call(&app, "POST", "/api/stop-all", None).await;
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap()["stopped"], 2);
}

#[tokio::test]
async fn export_csv_and_empty_export() {
    let (registry, app) = app();

    let (status, text) = call(&app, "GET", "/api/export", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(text.contains("no results to export"));

    registry.register("10.0.0.1", Some("core-sw")).unwrap();
    let (status, text) = call(&app, "GET", "/api/export?format=csv", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Name,IP Address,Status\ncore-sw,10.0.0.1,UNKNOWN\n");
}

#[tokio::test]
async fn unsupported_export_format_is_bad_request() {
    let (registry, app) = app();
    registry.register("10.0.0.1", None).unwrap();

    let (status, text) = call(&app, "GET", "/api/export?format=xlsx", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.contains("unsupported export format"));
}
