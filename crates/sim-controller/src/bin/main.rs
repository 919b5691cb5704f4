//! Standalone simulated cluster controller.
//!
//! Serves the `/v2` admin endpoints from memory so `layoutctl` can be driven
//! without a real cluster.
//!
//! # Environment Variables
//!
//! - `SIM_LISTEN_ADDR`: listen address (default: "127.0.0.1:3903")
//! - `SIM_NODE_COUNT`: number of unassigned nodes to start with (default: 3)
//! - `RUST_LOG`: log filter (default: "info")
//!
//! # Example
//!
//! ```bash
//! SIM_NODE_COUNT=5 sim-controller
//! ```

use std::env;
use std::sync::Arc;

use anyhow::Result;
use sim_controller::{SimCluster, SimServer};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug)]
struct SimConfig {
    listen_addr: String,
    node_count: usize,
}

impl SimConfig {
    fn from_env() -> Self {
        Self {
            listen_addr: env::var("SIM_LISTEN_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3903".to_string()),
            node_count: env::var("SIM_NODE_COUNT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(3),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SimConfig::from_env();
    info!(?config, "configuration loaded from environment");

    let cluster = Arc::new(SimCluster::seeded(config.node_count));
    match SimServer::run(cluster, config.listen_addr.as_str()).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "sim controller failed");
            Err(e)
        }
    }
}
