use serde::{Deserialize, Serialize};

pub mod error;
pub mod layout;
pub mod policy;
pub mod request;
pub mod traits;

pub use error::{ApiError, ParseRedundancyError};
pub use layout::{ClusterLayout, Role, RolePatch, StagedChange, StagedRoleChange};
pub use policy::{LayoutParameters, ZoneRedundancy};
pub use request::{
    ApplyLayoutResult, ConnectNodeResult, LayoutVersionBody, NodeRoleChange, RemoveFlag,
    UpdateLayoutBody,
};
pub use traits::{AdminApi, ApiResult};

/// Opaque node identifier as reported by the cluster controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Shortened form used in operator-facing tables.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(16)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic layout version owned by the controller.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LayoutVersion(pub u64);

impl LayoutVersion {
    pub fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The version the controller assigns once the staged changes are committed.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for LayoutVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Storage capacity of a node role.
///
/// `Gateway` and `Storage(0)` are distinct: a gateway holds no data at all, a
/// zero-capacity storage node is merely degenerate. On the wire a gateway is
/// `null` and a storage node is its byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum NodeCapacity {
    Gateway,
    Storage(u64),
}

impl NodeCapacity {
    pub fn is_gateway(&self) -> bool {
        matches!(self, NodeCapacity::Gateway)
    }

    pub fn bytes(&self) -> Option<u64> {
        match self {
            NodeCapacity::Gateway => None,
            NodeCapacity::Storage(bytes) => Some(*bytes),
        }
    }
}

impl From<Option<u64>> for NodeCapacity {
    fn from(bytes: Option<u64>) -> Self {
        match bytes {
            Some(bytes) => NodeCapacity::Storage(bytes),
            None => NodeCapacity::Gateway,
        }
    }
}

impl From<NodeCapacity> for Option<u64> {
    fn from(capacity: NodeCapacity) -> Self {
        capacity.bytes()
    }
}

/// Free/total bytes of a partition on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPartition {
    pub available: u64,
    pub total: u64,
}

impl DataPartition {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// Fraction of the partition in use, `0.0` for an empty partition.
    pub fn usage_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used() as f64 / self.total as f64
    }
}

/// Role as reported inline by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRoleSummary {
    pub zone: String,
    pub capacity: NodeCapacity,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Read-only snapshot of a cluster member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub hostname: String,
    pub is_up: bool,
    #[serde(default)]
    pub last_seen_secs_ago: Option<u64>,
    #[serde(default)]
    pub role: Option<NodeRoleSummary>,
    #[serde(default)]
    pub draining: bool,
    #[serde(default)]
    pub data_partition: Option<DataPartition>,
    #[serde(default)]
    pub metadata_partition: Option<DataPartition>,
}

/// Cluster status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub layout_version: LayoutVersion,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub known_nodes: Vec<Node>,
}

impl ClusterStatus {
    /// Nodes to display: the live member list, or the known-node list when the
    /// controller reports no members.
    pub fn members(&self) -> &[Node] {
        if self.nodes.is_empty() {
            &self.known_nodes
        } else {
            &self.nodes
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.members().iter().find(|node| &node.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_wire_format() {
        let gateway = serde_json::to_string(&NodeCapacity::Gateway).unwrap();
        assert_eq!(gateway, "null");

        let storage: NodeCapacity = serde_json::from_str("2000000000000").unwrap();
        assert_eq!(storage, NodeCapacity::Storage(2_000_000_000_000));

        let zero: NodeCapacity = serde_json::from_str("0").unwrap();
        assert_eq!(zero, NodeCapacity::Storage(0));
        assert!(!zero.is_gateway());
    }

    #[test]
    fn test_status_members_fall_back_to_known_nodes() {
        let json = r#"{
            "layoutVersion": 3,
            "knownNodes": [
                {"id": "a1", "addr": "10.0.0.1:3901", "hostname": "a", "isUp": false, "lastSeenSecsAgo": 42}
            ]
        }"#;
        let status: ClusterStatus = serde_json::from_str(json).unwrap();

        assert_eq!(status.layout_version, LayoutVersion(3));
        assert_eq!(status.members().len(), 1);
        assert_eq!(status.members()[0].last_seen_secs_ago, Some(42));
        assert!(status.node(&NodeId::from("a1")).is_some());
    }

    #[test]
    fn test_partition_usage() {
        let partition = DataPartition {
            available: 250,
            total: 1000,
        };
        assert_eq!(partition.used(), 750);
        assert!((partition.usage_ratio() - 0.75).abs() < f64::EPSILON);

        let empty = DataPartition {
            available: 0,
            total: 0,
        };
        assert_eq!(empty.usage_ratio(), 0.0);
    }

    #[test]
    fn test_node_id_short_form() {
        let id = NodeId::from("563e1ac825ee3323aa441e72c26d1030d6d4414aeb3dd25287c531e7fc2bc95d");
        assert_eq!(id.short(), "563e1ac825ee3323");
        assert_eq!(NodeId::from("abc").short(), "abc");
    }
}
