use serde::{Deserialize, Deserializer, Serialize};

use crate::{LayoutParameters, LayoutVersion, NodeCapacity, NodeId};

/// Committed assignment of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: NodeId,
    pub zone: String,
    pub capacity: NodeCapacity,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Staged role change in its wire form.
///
/// An absent `capacity` key leaves the committed capacity in place, while
/// `capacity: null` stages the node as a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedRoleChange {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remove: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_capacity",
        skip_serializing_if = "Option::is_none"
    )]
    pub capacity: Option<NodeCapacity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

fn present_capacity<'de, D>(deserializer: D) -> Result<Option<NodeCapacity>, D::Error>
where
    D: Deserializer<'de>,
{
    NodeCapacity::deserialize(deserializer).map(Some)
}

impl StagedRoleChange {
    pub fn removal(id: NodeId) -> Self {
        Self {
            id,
            remove: true,
            zone: None,
            capacity: None,
            tags: None,
        }
    }

    pub fn patch(id: NodeId, patch: RolePatch) -> Self {
        Self {
            id,
            remove: false,
            zone: patch.zone,
            capacity: patch.capacity,
            tags: patch.tags,
        }
    }

    pub fn change(&self) -> StagedChange {
        if self.remove {
            return StagedChange::Removed;
        }
        StagedChange::Modified(RolePatch {
            zone: self.zone.clone(),
            capacity: self.capacity,
            tags: self.tags.clone(),
        })
    }
}

/// Fields overridden by a staged modification. `None` means "not staged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePatch {
    pub zone: Option<String>,
    pub capacity: Option<NodeCapacity>,
    pub tags: Option<Vec<String>>,
}

impl RolePatch {
    pub fn is_empty(&self) -> bool {
        self.zone.is_none() && self.capacity.is_none() && self.tags.is_none()
    }
}

/// Pending state of one node relative to the committed layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedChange {
    Unchanged,
    Modified(RolePatch),
    Removed,
}

/// Committed roles plus the staged delta, at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLayout {
    pub version: LayoutVersion,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub staged_role_changes: Vec<StagedRoleChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<LayoutParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_parameters: Option<LayoutParameters>,
}

impl ClusterLayout {
    pub fn empty(version: LayoutVersion) -> Self {
        Self {
            version,
            roles: Vec::new(),
            staged_role_changes: Vec::new(),
            parameters: None,
            staged_parameters: None,
        }
    }

    pub fn role(&self, id: &NodeId) -> Option<&Role> {
        self.roles.iter().find(|role| &role.id == id)
    }

    /// Staged change for a node. Later entries win when an id repeats.
    pub fn staged_change(&self, id: &NodeId) -> StagedChange {
        self.staged_role_changes
            .iter()
            .rev()
            .find(|change| &change.id == id)
            .map(StagedRoleChange::change)
            .unwrap_or(StagedChange::Unchanged)
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged_role_changes.is_empty() || self.staged_parameters.is_some()
    }
}
