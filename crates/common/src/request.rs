use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{ClusterLayout, LayoutParameters, LayoutVersion, NodeCapacity, NodeId};

/// The `remove: true` flag of a removal entry. `false` does not decode, so an
/// entry carrying `remove: false` is read as an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveFlag;

impl Serialize for RemoveFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> Deserialize<'de> for RemoveFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Ok(RemoveFlag)
        } else {
            Err(de::Error::custom("`remove` must be true on a removal entry"))
        }
    }
}

/// One entry of an `UpdateClusterLayout` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRoleChange {
    Remove {
        id: NodeId,
        remove: RemoveFlag,
    },
    Assign {
        id: NodeId,
        zone: String,
        capacity: NodeCapacity,
        tags: Vec<String>,
    },
}

impl NodeRoleChange {
    pub fn remove(id: NodeId) -> Self {
        NodeRoleChange::Remove {
            id,
            remove: RemoveFlag,
        }
    }

    pub fn assign(id: NodeId, zone: String, capacity: NodeCapacity, tags: Vec<String>) -> Self {
        NodeRoleChange::Assign {
            id,
            zone,
            capacity,
            tags,
        }
    }

    pub fn id(&self) -> &NodeId {
        match self {
            NodeRoleChange::Remove { id, .. } | NodeRoleChange::Assign { id, .. } => id,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, NodeRoleChange::Remove { .. })
    }
}

/// Body of `UpdateClusterLayout`. `parameters` serializes as `null` when the
/// redundancy policy is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLayoutBody {
    #[serde(default)]
    pub parameters: Option<LayoutParameters>,
    #[serde(default)]
    pub roles: Vec<NodeRoleChange>,
}

/// Body of `ApplyClusterLayout` / `RevertClusterLayout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutVersionBody {
    pub version: LayoutVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyLayoutResult {
    #[serde(default)]
    pub message: Vec<String>,
    pub layout: ClusterLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectNodeResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}
