use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{handlers::*, SimCluster};

/// Admin API routes backed by `cluster`.
pub fn router(cluster: Arc<SimCluster>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v2/GetClusterStatus", get(get_cluster_status))
        .route("/v2/GetClusterLayout", get(get_cluster_layout))
        .route("/v2/UpdateClusterLayout", post(update_cluster_layout))
        .route("/v2/ApplyClusterLayout", post(apply_cluster_layout))
        .route("/v2/RevertClusterLayout", post(revert_cluster_layout))
        .route("/v2/ConnectClusterNodes", post(connect_cluster_nodes))
        .with_state(cluster)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Simulated controller served on a background task. The task is aborted
/// when the server is dropped.
pub struct SimServer {
    cluster: Arc<SimCluster>,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl SimServer {
    /// Bind `addr` (port 0 picks a free port) and start serving.
    pub async fn bind(cluster: Arc<SimCluster>, addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind sim controller listener")?;
        let local_addr = listener.local_addr()?;
        let app = router(cluster.clone());

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = %e, "sim controller stopped");
            }
        });

        info!(addr = %local_addr, "sim controller listening");
        Ok(Self {
            cluster,
            local_addr,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL for an admin client.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn cluster(&self) -> &Arc<SimCluster> {
        &self.cluster
    }

    /// Serve in the foreground until ctrl-c.
    pub async fn run(cluster: Arc<SimCluster>, addr: impl ToSocketAddrs) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind sim controller listener")?;
        info!(addr = %listener.local_addr()?, "sim controller listening");

        axum::serve(listener, router(cluster))
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for ctrl-c");
                    futures::future::pending::<()>().await;
                }
            })
            .await?;
        info!("sim controller shut down");
        Ok(())
    }
}

impl Drop for SimServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
