//! Merged view of the committed layout and the staged delta.

use std::collections::HashSet;

use common::{
    ClusterLayout, ClusterStatus, LayoutVersion, NodeCapacity, NodeId, Role, StagedChange,
    ZoneRedundancy,
};

use crate::builder::NodeEdit;
use crate::capacity::Capacity;

/// Effective role of a node once staged fields are laid over committed ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveRole {
    pub id: NodeId,
    pub zone: String,
    /// `None` only when a staged patch for an unassigned node omits capacity.
    pub capacity: Option<NodeCapacity>,
    pub tags: Vec<String>,
    /// Whether any field comes from a staged change.
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeView {
    Assigned(EffectiveRole),
    /// Staged for removal; the committed role is kept for display.
    Removing { committed: Option<Role> },
}

/// Counts of staged work waiting for apply or revert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagedSummary {
    pub assignments: usize,
    pub removals: usize,
    pub parameters_changed: bool,
}

impl StagedSummary {
    pub fn is_empty(&self) -> bool {
        self.assignments == 0 && self.removals == 0 && !self.parameters_changed
    }
}

/// Snapshot combining cluster status (optional) with a layout.
#[derive(Debug, Clone)]
pub struct TopologyView {
    status: Option<ClusterStatus>,
    layout: ClusterLayout,
}

impl TopologyView {
    pub fn new(status: Option<ClusterStatus>, layout: ClusterLayout) -> Self {
        Self { status, layout }
    }

    pub fn version(&self) -> LayoutVersion {
        self.layout.version
    }

    pub fn layout(&self) -> &ClusterLayout {
        &self.layout
    }

    pub fn status(&self) -> Option<&ClusterStatus> {
        self.status.as_ref()
    }

    /// Merged view of one node, or `None` for a node with neither a committed
    /// role nor a staged change (an unassigned node).
    pub fn node_view(&self, id: &NodeId) -> Option<NodeView> {
        let committed = self.layout.role(id);
        match self.layout.staged_change(id) {
            StagedChange::Removed => Some(NodeView::Removing {
                committed: committed.cloned(),
            }),
            StagedChange::Modified(patch) => Some(NodeView::Assigned(EffectiveRole {
                id: id.clone(),
                zone: patch
                    .zone
                    .or_else(|| committed.map(|role| role.zone.clone()))
                    .unwrap_or_default(),
                capacity: patch.capacity.or_else(|| committed.map(|role| role.capacity)),
                tags: patch
                    .tags
                    .or_else(|| committed.map(|role| role.tags.clone()))
                    .unwrap_or_default(),
                pending: true,
            })),
            StagedChange::Unchanged => committed.map(|role| {
                NodeView::Assigned(EffectiveRole {
                    id: role.id.clone(),
                    zone: role.zone.clone(),
                    capacity: Some(role.capacity),
                    tags: role.tags.clone(),
                    pending: false,
                })
            }),
        }
    }

    /// Redundancy the cluster will use after apply: staged, else committed,
    /// else the default.
    pub fn redundancy(&self) -> ZoneRedundancy {
        self.layout
            .staged_parameters
            .or(self.layout.parameters)
            .map(|params| params.zone_redundancy)
            .unwrap_or_default()
    }

    /// Pre-filled edit for `id`. Unassigned and removing nodes get fresh
    /// defaults; every seed carries the cluster's current redundancy.
    pub fn edit_seed(&self, id: &NodeId) -> NodeEdit {
        let mut seed = NodeEdit::new(id.clone());
        seed.redundancy = self.redundancy();

        if let Some(NodeView::Assigned(role)) = self.node_view(id) {
            seed.zone = role.zone;
            seed.tags = role.tags;
            if let Some(capacity) = role.capacity {
                let (capacity, is_gateway) = Capacity::parse(capacity);
                seed.capacity = capacity;
                seed.is_gateway = is_gateway;
            }
        }
        seed
    }

    /// Distinct zones across the merged view, in first-seen order.
    pub fn zone_catalog(&self) -> Vec<String> {
        let mut catalog = Catalog::default();
        for id in self.node_ids() {
            if let Some(zone) = self.zone_of(id) {
                catalog.push(zone);
            }
        }
        catalog.into_vec()
    }

    /// Distinct tags across the merged view, in first-seen order.
    pub fn tag_catalog(&self) -> Vec<String> {
        let mut catalog = Catalog::default();
        for id in self.node_ids() {
            if let Some(tags) = self.tags_of(id) {
                for tag in tags {
                    catalog.push(tag);
                }
            }
        }
        catalog.into_vec()
    }

    /// Staged changes with per-node last-write-wins, in first-seen order.
    pub fn pending_changes(&self) -> Vec<(NodeId, StagedChange)> {
        let mut seen = HashSet::new();
        self.layout
            .staged_role_changes
            .iter()
            .filter(|change| seen.insert(&change.id))
            .map(|change| (change.id.clone(), self.layout.staged_change(&change.id)))
            .collect()
    }

    pub fn summary(&self) -> StagedSummary {
        let mut summary = StagedSummary {
            parameters_changed: self.layout.staged_parameters.is_some(),
            ..StagedSummary::default()
        };
        for (_, change) in self.pending_changes() {
            match change {
                StagedChange::Removed => summary.removals += 1,
                StagedChange::Modified(_) => summary.assignments += 1,
                StagedChange::Unchanged => {}
            }
        }
        summary
    }

    /// Every node id known to either source: status members first, then
    /// committed roles, then staged changes.
    fn node_ids(&self) -> Vec<&NodeId> {
        let members = self.status.iter().flat_map(|status| status.members());
        let mut seen = HashSet::new();
        members
            .map(|node| &node.id)
            .chain(self.layout.roles.iter().map(|role| &role.id))
            .chain(self.layout.staged_role_changes.iter().map(|change| &change.id))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    fn zone_of(&self, id: &NodeId) -> Option<&str> {
        let staged = self
            .layout
            .staged_role_changes
            .iter()
            .rev()
            .find(|change| &change.id == id)
            .filter(|change| !change.remove)
            .and_then(|change| change.zone.as_deref());
        staged
            .or_else(|| self.layout.role(id).map(|role| role.zone.as_str()))
            .or_else(|| self.reported_role(id).map(|role| role.zone.as_str()))
    }

    fn tags_of(&self, id: &NodeId) -> Option<&[String]> {
        let staged = self
            .layout
            .staged_role_changes
            .iter()
            .rev()
            .find(|change| &change.id == id)
            .filter(|change| !change.remove)
            .and_then(|change| change.tags.as_deref());
        staged
            .or_else(|| self.layout.role(id).map(|role| role.tags.as_slice()))
            .or_else(|| self.reported_role(id).map(|role| role.tags.as_slice()))
    }

    fn reported_role(&self, id: &NodeId) -> Option<&common::NodeRoleSummary> {
        self.status
            .as_ref()
            .and_then(|status| status.node(id))
            .and_then(|node| node.role.as_ref())
    }
}

/// Order-preserving set of non-empty strings.
#[derive(Default)]
struct Catalog {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl Catalog {
    fn push(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() || self.seen.contains(value) {
            return;
        }
        self.seen.insert(value.to_string());
        self.items.push(value.to_string());
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}
