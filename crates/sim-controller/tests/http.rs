use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use sim_controller::{router, SimCluster};
use tower::ServiceExt;

async fn call(app: axum::Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn stage_and_apply_over_http() {
    let cluster = Arc::new(SimCluster::seeded(2));
    let id = cluster.node_ids().await[0].to_string();
    let app = router(cluster.clone());

    let (status, layout) = call(
        app.clone(),
        Method::POST,
        "/v2/UpdateClusterLayout",
        Some(json!({
            "parameters": { "zoneRedundancy": { "atLeast": 1 } },
            "roles": [{ "id": id, "zone": "eu", "capacity": 2_000_000_000_000u64, "tags": ["ssd"] }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(layout["stagedRoleChanges"][0]["zone"], "eu");

    // The wire carries the version being created.
    let (status, result) = call(
        app.clone(),
        Method::POST,
        "/v2/ApplyClusterLayout",
        Some(json!({ "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["layout"]["version"], 1);
    assert!(result["message"].as_array().is_some_and(|lines| !lines.is_empty()));

    let (_, status) = call(app, Method::GET, "/v2/GetClusterStatus", None).await;
    assert_eq!(status["layoutVersion"], 1);
}

#[tokio::test]
async fn stale_apply_returns_conflict_body() {
    let cluster = Arc::new(SimCluster::seeded(1));
    let app = router(cluster);

    let (status, body) = call(
        app,
        Method::POST,
        "/v2/ApplyClusterLayout",
        Some(json!({ "version": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "InvalidLayoutVersion");
    assert!(body["message"].as_str().unwrap().contains("layout version"));
}

#[tokio::test]
async fn removal_is_staged_with_remove_flag() {
    let cluster = Arc::new(SimCluster::seeded(1));
    let id = cluster.node_ids().await[0].to_string();
    let app = router(cluster);

    let (status, layout) = call(
        app,
        Method::POST,
        "/v2/UpdateClusterLayout",
        Some(json!({ "parameters": null, "roles": [{ "id": id, "remove": true }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(layout["stagedRoleChanges"][0]["remove"], true);
}

#[tokio::test]
async fn assignment_with_remove_false_is_staged_as_assignment() {
    let cluster = Arc::new(SimCluster::seeded(1));
    let id = cluster.node_ids().await[0].clone();
    let app = router(cluster.clone());

    let (status, _) = call(
        app,
        Method::POST,
        "/v2/UpdateClusterLayout",
        Some(json!({
            "parameters": null,
            "roles": [{ "id": id.to_string(), "remove": false, "zone": "eu", "capacity": 1000, "tags": [] }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let layout = cluster.snapshot().await;
    assert_eq!(layout.staged_role_changes.len(), 1);
    let staged = &layout.staged_role_changes[0];
    assert!(!staged.remove);
    assert_eq!(staged.zone.as_deref(), Some("eu"));
}

#[tokio::test]
async fn connect_reports_per_peer_results() {
    let app = router(Arc::new(SimCluster::new()));

    let (status, results) = call(
        app,
        Method::POST,
        "/v2/ConnectClusterNodes",
        Some(json!(["abc@10.0.0.1:3901", "nope"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);
    assert!(results[1]["error"].is_string());
}
