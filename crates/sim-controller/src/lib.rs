//! In-memory cluster controller for tests and local demos.
//!
//! [`SimCluster`] keeps nodes, the committed layout and the staged delta, and
//! enforces the controller's optimistic version check on apply and revert. It
//! implements [`AdminApi`] directly and is served over HTTP by [`SimServer`].

use std::collections::VecDeque;

use common::{
    AdminApi, ApiError, ApiResult, ApplyLayoutResult, ClusterLayout, ClusterStatus,
    ConnectNodeResult, LayoutVersion, Node, NodeCapacity, NodeId, NodeRoleChange,
    NodeRoleSummary, Role, RolePatch, StagedChange, StagedRoleChange, UpdateLayoutBody,
    ZoneRedundancy,
};
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub mod handlers;
pub mod server;

pub use server::{router, SimServer};

#[derive(Debug)]
struct SimState {
    nodes: Vec<Node>,
    layout: ClusterLayout,
    failures: VecDeque<ApiError>,
}

/// Simulated controller state.
#[derive(Debug)]
pub struct SimCluster {
    state: RwLock<SimState>,
}

impl Default for SimCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCluster {
    /// Empty cluster at layout version 0.
    pub fn new() -> Self {
        Self::with_layout(Vec::new(), ClusterLayout::empty(LayoutVersion(0)))
    }

    pub fn with_layout(nodes: Vec<Node>, layout: ClusterLayout) -> Self {
        Self {
            state: RwLock::new(SimState {
                nodes,
                layout,
                failures: VecDeque::new(),
            }),
        }
    }

    /// `count` live, unassigned nodes with deterministic 64-hex-digit ids.
    pub fn seeded(count: usize) -> Self {
        let nodes = (0..count).map(|i| sim_node(i + 1)).collect();
        Self::with_layout(nodes, ClusterLayout::empty(LayoutVersion(0)))
    }

    pub async fn version(&self) -> LayoutVersion {
        self.state.read().await.layout.version
    }

    pub async fn node_ids(&self) -> Vec<NodeId> {
        self.state
            .read()
            .await
            .nodes
            .iter()
            .map(|node| node.id.clone())
            .collect()
    }

    pub async fn add_node(&self, node: Node) {
        let mut state = self.state.write().await;
        if !state.nodes.iter().any(|existing| existing.id == node.id) {
            state.nodes.push(node);
        }
    }

    /// Make the next mutating call fail with `error` before touching state.
    pub async fn fail_next(&self, error: ApiError) {
        self.state.write().await.failures.push_back(error);
    }

    pub async fn snapshot(&self) -> ClusterLayout {
        self.state.read().await.layout.clone()
    }

    pub async fn status(&self) -> ClusterStatus {
        let state = self.state.read().await;
        let nodes = state
            .nodes
            .iter()
            .map(|node| {
                let mut node = node.clone();
                node.role = state.layout.role(&node.id).map(|role| NodeRoleSummary {
                    zone: role.zone.clone(),
                    capacity: role.capacity,
                    tags: role.tags.clone(),
                });
                node
            })
            .collect();
        ClusterStatus {
            layout_version: state.layout.version,
            nodes,
            known_nodes: Vec::new(),
        }
    }

    pub async fn update(&self, body: UpdateLayoutBody) -> ApiResult<ClusterLayout> {
        let mut state = self.state.write().await;
        take_failure(&mut state)?;

        if let Some(parameters) = body.parameters {
            if parameters.zone_redundancy == ZoneRedundancy::AtLeast(0) {
                return Err(ApiError::server(400, "zone redundancy must be at least 1"));
            }
        }
        for change in &body.roles {
            if let NodeRoleChange::Assign { id, zone, .. } = change {
                if zone.trim().is_empty() {
                    return Err(ApiError::server(
                        400,
                        format!("node {} needs a non-empty zone", id.short()),
                    ));
                }
            }
        }

        let layout = &mut state.layout;
        for change in body.roles {
            let staged = match change {
                NodeRoleChange::Remove { id, .. } => StagedRoleChange::removal(id),
                NodeRoleChange::Assign {
                    id,
                    zone,
                    capacity,
                    tags,
                } => StagedRoleChange::patch(
                    id,
                    RolePatch {
                        zone: Some(zone),
                        capacity: Some(capacity),
                        tags: Some(tags),
                    },
                ),
            };
            debug!(node_id = %staged.id.short(), remove = staged.remove, "staging role change");
            match layout
                .staged_role_changes
                .iter_mut()
                .find(|existing| existing.id == staged.id)
            {
                Some(existing) => *existing = staged,
                None => layout.staged_role_changes.push(staged),
            }
        }
        if body.parameters.is_some() {
            layout.staged_parameters = body.parameters;
        }

        info!(
            version = %layout.version,
            staged = layout.staged_role_changes.len(),
            "layout changes staged"
        );
        Ok(layout.clone())
    }

    /// Commit the staged delta computed against `version`.
    pub async fn apply(&self, version: LayoutVersion) -> ApiResult<ApplyLayoutResult> {
        let mut state = self.state.write().await;
        take_failure(&mut state)?;
        check_version(&state.layout, version)?;

        let layout = &mut state.layout;
        let mut message = Vec::new();
        let staged: Vec<StagedRoleChange> = std::mem::take(&mut layout.staged_role_changes);
        for change in staged {
            match change.change() {
                StagedChange::Removed => {
                    layout.roles.retain(|role| role.id != change.id);
                    message.push(format!("node {}: role removed", change.id.short()));
                }
                StagedChange::Modified(patch) => {
                    commit_patch(&mut layout.roles, &change.id, patch);
                    message.push(format!("node {}: role updated", change.id.short()));
                }
                StagedChange::Unchanged => {}
            }
        }
        if let Some(parameters) = layout.staged_parameters.take() {
            message.push(format!("zone redundancy: {}", parameters.zone_redundancy));
            layout.parameters = Some(parameters);
        }
        layout.version = layout.version.next();
        message.push(format!("new layout version: {}", layout.version.get()));

        info!(version = %layout.version, roles = layout.roles.len(), "layout applied");
        Ok(ApplyLayoutResult {
            message,
            layout: layout.clone(),
        })
    }

    /// Drop the staged delta computed against `version`.
    pub async fn revert(&self, version: LayoutVersion) -> ApiResult<ClusterLayout> {
        let mut state = self.state.write().await;
        take_failure(&mut state)?;
        check_version(&state.layout, version)?;

        let layout = &mut state.layout;
        let dropped = layout.staged_role_changes.len();
        layout.staged_role_changes.clear();
        layout.staged_parameters = None;

        info!(version = %layout.version, dropped, "staged layout changes reverted");
        Ok(layout.clone())
    }

    /// Register peers given as `<node id>@<addr>`.
    pub async fn connect(&self, peers: Vec<String>) -> ApiResult<Vec<ConnectNodeResult>> {
        let mut state = self.state.write().await;
        take_failure(&mut state)?;

        let results = peers
            .iter()
            .map(|peer| match peer.split_once('@') {
                Some((id, addr)) if !id.is_empty() && !addr.is_empty() => {
                    let id = NodeId::from(id);
                    if !state.nodes.iter().any(|node| node.id == id) {
                        let mut node = sim_node(0);
                        node.id = id;
                        node.addr = addr.to_string();
                        node.hostname = addr.split(':').next().unwrap_or(addr).to_string();
                        state.nodes.push(node);
                    }
                    debug!(peer = %peer, "peer connected");
                    ConnectNodeResult {
                        success: true,
                        error: None,
                    }
                }
                _ => {
                    warn!(peer = %peer, "malformed peer address");
                    ConnectNodeResult {
                        success: false,
                        error: Some(format!("invalid peer `{}`: expected <node id>@<addr>", peer)),
                    }
                }
            })
            .collect();
        Ok(results)
    }
}

fn take_failure(state: &mut SimState) -> ApiResult<()> {
    match state.failures.pop_front() {
        Some(error) => {
            warn!(error = %error, "injected failure");
            Err(error)
        }
        None => Ok(()),
    }
}

fn check_version(layout: &ClusterLayout, requested: LayoutVersion) -> ApiResult<()> {
    if layout.version != requested {
        warn!(requested = %requested, current = %layout.version, "layout version mismatch");
        return Err(ApiError::conflict(
            409,
            format!(
                "invalid layout version: staged changes are against {}, requested {}",
                layout.version, requested
            ),
        ));
    }
    Ok(())
}

fn commit_patch(roles: &mut Vec<Role>, id: &NodeId, patch: RolePatch) {
    match roles.iter_mut().find(|role| &role.id == id) {
        Some(role) => {
            if let Some(zone) = patch.zone {
                role.zone = zone;
            }
            if let Some(capacity) = patch.capacity {
                role.capacity = capacity;
            }
            if let Some(tags) = patch.tags {
                role.tags = tags;
            }
        }
        None => roles.push(Role {
            id: id.clone(),
            zone: patch.zone.unwrap_or_default(),
            capacity: patch.capacity.unwrap_or(NodeCapacity::Gateway),
            tags: patch.tags.unwrap_or_default(),
        }),
    }
}

fn sim_node(index: usize) -> Node {
    Node {
        id: NodeId::new(format!("{:064x}", index)),
        addr: format!("10.0.0.{}:3901", index),
        hostname: format!("sim-{}", index),
        is_up: true,
        last_seen_secs_ago: None,
        role: None,
        draining: false,
        data_partition: None,
        metadata_partition: None,
    }
}

impl AdminApi for SimCluster {
    fn cluster_status(&self) -> BoxFuture<'_, ApiResult<ClusterStatus>> {
        async move { Ok(self.status().await) }.boxed()
    }

    fn cluster_layout(&self) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        async move { Ok(self.snapshot().await) }.boxed()
    }

    fn update_layout(&self, body: UpdateLayoutBody) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        self.update(body).boxed()
    }

    fn apply_layout(&self, version: LayoutVersion) -> BoxFuture<'_, ApiResult<ApplyLayoutResult>> {
        self.apply(version).boxed()
    }

    fn revert_layout(&self, version: LayoutVersion) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        self.revert(version).boxed()
    }

    fn connect_nodes(
        &self,
        peers: Vec<String>,
    ) -> BoxFuture<'_, ApiResult<Vec<ConnectNodeResult>>> {
        self.connect(peers).boxed()
    }
}
