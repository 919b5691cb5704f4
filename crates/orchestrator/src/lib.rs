//! Apply/revert orchestration for cluster layout changes.
//!
//! [`LayoutOrchestrator`] is the only component that mutates the cluster. It:
//! - caches cluster status and layout, refetching them after every acknowledged mutation
//! - admits at most one mutation per layout version at a time
//! - rejects mutations against a layout version it already knows to be stale
//!
//! Failed mutations leave staged edits and the open edit session untouched so
//! the operator can retry.

use common::{AdminApi, ApiError, ClusterLayout, ClusterStatus, LayoutVersion, NodeId};
use layout_engine::{LayoutTransaction, LayoutTransactionBuilder, StagingStore, TopologyView};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub mod error;
mod flight;

pub use error::{ErrorKind, LayoutError, Result};
pub use flight::{FlightPhase, MutationKind};

use flight::FlightRegistry;

/// What an accepted mutation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub kind: MutationKind,
    /// Layout version the mutation was submitted against.
    pub version: LayoutVersion,
    /// Whether the post-mutation refetch succeeded. When it did not, the
    /// caches stay cold and the next read fetches again.
    pub refreshed: bool,
    /// Layout version after the refetch, if it succeeded.
    pub current_version: Option<LayoutVersion>,
    /// Controller messages, e.g. the apply summary.
    pub messages: Vec<String>,
}

#[derive(Debug, Default)]
struct ClusterCache {
    status: Option<ClusterStatus>,
    layout: Option<ClusterLayout>,
    /// Bumped on every invalidation so that fetches started earlier do not
    /// repopulate the cache with pre-mutation state.
    epoch: u64,
}

#[derive(Debug, Clone, Copy)]
enum Invalidate {
    Status,
    All,
}

pub struct LayoutOrchestrator<A> {
    api: A,
    cache: RwLock<ClusterCache>,
    flights: FlightRegistry,
}

impl<A: AdminApi> LayoutOrchestrator<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            cache: RwLock::new(ClusterCache::default()),
            flights: FlightRegistry::default(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch status and layout concurrently and replace both caches.
    pub async fn refresh(&self) -> Result<TopologyView> {
        let epoch = self.cache.read().await.epoch;
        let (status, layout) =
            futures::try_join!(self.api.cluster_status(), self.api.cluster_layout())?;

        let mut cache = self.cache.write().await;
        if cache.epoch == epoch {
            cache.status = Some(status.clone());
            cache.layout = Some(layout.clone());
            debug!(
                version = %layout.version,
                nodes = status.nodes.len(),
                staged = layout.staged_role_changes.len(),
                "cluster caches refreshed"
            );
        } else {
            debug!("discarding refresh that raced an invalidation");
        }
        Ok(TopologyView::new(Some(status), layout))
    }

    /// Cached cluster status, fetched on a cold cache.
    pub async fn status(&self) -> Result<ClusterStatus> {
        let (cached, epoch) = {
            let cache = self.cache.read().await;
            (cache.status.clone(), cache.epoch)
        };
        if let Some(status) = cached {
            return Ok(status);
        }

        let status = self.api.cluster_status().await?;
        let mut cache = self.cache.write().await;
        if cache.epoch == epoch {
            cache.status = Some(status.clone());
        }
        Ok(status)
    }

    /// Cached layout, fetched on a cold cache.
    pub async fn layout(&self) -> Result<ClusterLayout> {
        let (cached, epoch) = {
            let cache = self.cache.read().await;
            (cache.layout.clone(), cache.epoch)
        };
        if let Some(layout) = cached {
            return Ok(layout);
        }

        let layout = self.api.cluster_layout().await?;
        let mut cache = self.cache.write().await;
        if cache.epoch == epoch {
            cache.layout = Some(layout.clone());
        }
        Ok(layout)
    }

    /// Merged view over the cached status and layout.
    pub async fn topology(&self) -> Result<TopologyView> {
        let (status, layout) = futures::try_join!(self.status(), self.layout())?;
        Ok(TopologyView::new(Some(status), layout))
    }

    pub fn phase(&self, version: LayoutVersion) -> FlightPhase {
        self.flights.phase(version)
    }

    /// Stage the role changes of `transaction` against its base version.
    pub async fn submit(&self, transaction: LayoutTransaction) -> Result<MutationOutcome> {
        let version = transaction.base_version();
        let _flight = self.flights.acquire(version, MutationKind::Stage)?;
        self.ensure_current(version).await?;

        info!(
            version = %version,
            roles = transaction.body().roles.len(),
            parameters = transaction.body().parameters.is_some(),
            "staging layout changes"
        );
        self.api
            .update_layout(transaction.into_body())
            .await
            .map_err(|err| rejected(MutationKind::Stage, version, err))?;

        Ok(self.settle(MutationKind::Stage, version, Vec::new()).await)
    }

    /// Build and stage the open edit session against the layout version it
    /// was seeded from. The session is closed only when the controller
    /// accepts the change.
    pub async fn submit_session(&self, store: &mut StagingStore) -> Result<MutationOutcome> {
        let edit = store.target().ok_or(LayoutError::NoSession)?;
        // Warms the cache so a session seeded from an older view fails the stale check.
        let current = self.layout().await?.version;
        let version = store.base_version().unwrap_or(current);
        let transaction = LayoutTransactionBuilder::new(version).build(edit)?;

        let outcome = self.submit(transaction).await?;
        store.close();
        Ok(outcome)
    }

    /// Stage the removal of `node_id` against the current layout version.
    pub async fn stage_removal(&self, node_id: &NodeId) -> Result<MutationOutcome> {
        let version = self.layout().await?.version;
        let transaction = LayoutTransactionBuilder::new(version).build_removal(node_id)?;
        self.submit(transaction).await
    }

    /// Commit every change staged against `version`.
    pub async fn apply(&self, version: LayoutVersion) -> Result<MutationOutcome> {
        let _flight = self.flights.acquire(version, MutationKind::Apply)?;
        self.ensure_current(version).await?;

        info!(version = %version, "applying staged layout");
        let result = self
            .api
            .apply_layout(version)
            .await
            .map_err(|err| rejected(MutationKind::Apply, version, err))?;

        Ok(self.settle(MutationKind::Apply, version, result.message).await)
    }

    /// Discard every change staged against `version`.
    pub async fn revert(&self, version: LayoutVersion) -> Result<MutationOutcome> {
        let _flight = self.flights.acquire(version, MutationKind::Revert)?;
        self.ensure_current(version).await?;

        info!(version = %version, "reverting staged layout");
        self.api
            .revert_layout(version)
            .await
            .map_err(|err| rejected(MutationKind::Revert, version, err))?;

        Ok(self.settle(MutationKind::Revert, version, Vec::new()).await)
    }

    /// Ask the controller to connect to `peer` (`<node id>@<addr>`). Only the
    /// status cache is affected.
    pub async fn connect_node(&self, peer: &str) -> Result<()> {
        info!(peer = %peer, "connecting cluster node");
        let results = self.api.connect_nodes(vec![peer.to_string()]).await?;

        let failure = match results.into_iter().next() {
            Some(result) if result.success => None,
            Some(result) => Some(
                result
                    .error
                    .unwrap_or_else(|| "connection refused".to_string()),
            ),
            None => Some("controller returned no result".to_string()),
        };
        if let Some(message) = failure {
            warn!(peer = %peer, error = %message, "node connection failed");
            return Err(LayoutError::Connect {
                peer: peer.to_string(),
                message,
            });
        }

        self.invalidate(Invalidate::Status).await;
        if let Err(err) = self.status().await {
            warn!(error = %err, "status refetch after connect failed");
        }
        Ok(())
    }

    async fn ensure_current(&self, requested: LayoutVersion) -> Result<()> {
        let current = self
            .cache
            .read()
            .await
            .layout
            .as_ref()
            .map(|layout| layout.version);
        match current {
            Some(current) if current != requested => {
                warn!(requested = %requested, current = %current, "rejecting stale layout mutation");
                Err(LayoutError::StaleVersion { requested, current })
            }
            _ => Ok(()),
        }
    }

    async fn invalidate(&self, scope: Invalidate) {
        let mut cache = self.cache.write().await;
        cache.epoch += 1;
        cache.status = None;
        if let Invalidate::All = scope {
            cache.layout = None;
        }
        debug!(?scope, epoch = cache.epoch, "cluster caches invalidated");
    }

    /// Post-acknowledgement bookkeeping: invalidate, then refetch.
    async fn settle(
        &self,
        kind: MutationKind,
        version: LayoutVersion,
        messages: Vec<String>,
    ) -> MutationOutcome {
        self.invalidate(Invalidate::All).await;
        let current_version = match self.refresh().await {
            Ok(view) => Some(view.version()),
            Err(err) => {
                warn!(kind = %kind, error = %err, "refetch after mutation failed, caches left cold");
                None
            }
        };

        info!(
            kind = %kind,
            version = %version,
            current = ?current_version.map(|v| v.get()),
            "layout mutation accepted"
        );
        MutationOutcome {
            kind,
            version,
            refreshed: current_version.is_some(),
            current_version,
            messages,
        }
    }
}

fn rejected(kind: MutationKind, version: LayoutVersion, err: ApiError) -> LayoutError {
    warn!(
        kind = %kind,
        version = %version,
        status = ?err.status(),
        error = %err.message(),
        "controller rejected layout mutation"
    );
    LayoutError::Api(err)
}
