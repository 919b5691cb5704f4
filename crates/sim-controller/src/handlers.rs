use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{ApiError, LayoutVersion, LayoutVersionBody, UpdateLayoutBody};
use serde_json::json;
use tracing::{error, info};

use crate::SimCluster;

pub type AppState = Arc<SimCluster>;

/// Error body in the controller's shape: `{"code": .., "message": ..}`.
fn error_response(err: ApiError) -> Response {
    let status = err
        .status()
        .and_then(|status| StatusCode::from_u16(status).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let code = match &err {
        ApiError::Conflict { .. } => "InvalidLayoutVersion",
        ApiError::Server { .. } if status == StatusCode::BAD_REQUEST => "BadRequest",
        _ => "InternalError",
    };
    error!(status = status.as_u16(), message = %err.message(), "request rejected");
    (status, Json(json!({ "code": code, "message": err.message() }))).into_response()
}

/// The wire carries the version the controller will move to; the cluster
/// checks the version the staged changes were computed against.
fn staged_against(body: LayoutVersionBody) -> Result<LayoutVersion, ApiError> {
    body.version
        .get()
        .checked_sub(1)
        .map(LayoutVersion)
        .ok_or_else(|| ApiError::server(400, "invalid layout version 0"))
}

fn respond<T: serde::Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /v2/GetClusterStatus
pub async fn get_cluster_status(State(sim): State<AppState>) -> Response {
    respond(Ok(sim.status().await))
}

/// GET /v2/GetClusterLayout
pub async fn get_cluster_layout(State(sim): State<AppState>) -> Response {
    respond(Ok(sim.snapshot().await))
}

/// POST /v2/UpdateClusterLayout
pub async fn update_cluster_layout(
    State(sim): State<AppState>,
    Json(body): Json<UpdateLayoutBody>,
) -> Response {
    info!(roles = body.roles.len(), parameters = body.parameters.is_some(), "UpdateClusterLayout");
    respond(sim.update(body).await)
}

/// POST /v2/ApplyClusterLayout
pub async fn apply_cluster_layout(
    State(sim): State<AppState>,
    Json(body): Json<LayoutVersionBody>,
) -> Response {
    info!(version = body.version.get(), "ApplyClusterLayout");
    match staged_against(body) {
        Ok(version) => respond(sim.apply(version).await),
        Err(err) => error_response(err),
    }
}

/// POST /v2/RevertClusterLayout
pub async fn revert_cluster_layout(
    State(sim): State<AppState>,
    Json(body): Json<LayoutVersionBody>,
) -> Response {
    info!(version = body.version.get(), "RevertClusterLayout");
    match staged_against(body) {
        Ok(version) => respond(sim.revert(version).await),
        Err(err) => error_response(err),
    }
}

/// POST /v2/ConnectClusterNodes
pub async fn connect_cluster_nodes(
    State(sim): State<AppState>,
    Json(peers): Json<Vec<String>>,
) -> Response {
    info!(peers = peers.len(), "ConnectClusterNodes");
    respond(sim.connect(peers).await)
}
