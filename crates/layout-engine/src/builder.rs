//! Layout transaction builder.
//!
//! Turns validated operator edits into `UpdateClusterLayout` bodies tied to the
//! layout version they were computed against. Nothing here touches the network.

use std::collections::HashSet;

use common::{
    LayoutParameters, LayoutVersion, NodeCapacity, NodeId, NodeRoleChange, UpdateLayoutBody,
    ZoneRedundancy,
};
use tracing::debug;

use crate::capacity::Capacity;
use crate::error::{BatchVersionMismatch, ValidationError, ValidationErrors};
use crate::view::TopologyView;

/// Operator edit for a single node, as held by an open edit session.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEdit {
    pub node_id: NodeId,
    pub zone: String,
    pub capacity: Capacity,
    pub is_gateway: bool,
    pub tags: Vec<String>,
    pub redundancy: ZoneRedundancy,
}

impl NodeEdit {
    /// Defaults for a brand-new assignment: no zone, `1 GB`, storage node,
    /// no tags, at least one zone of redundancy.
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            zone: String::new(),
            capacity: Capacity::default(),
            is_gateway: false,
            tags: Vec::new(),
            redundancy: ZoneRedundancy::default(),
        }
    }

    /// Check every field and return the resolved capacity. All failing fields
    /// are reported together.
    pub fn validate(&self) -> Result<NodeCapacity, ValidationErrors> {
        let mut errors = Vec::new();

        if self.node_id.is_empty() {
            errors.push(ValidationError::EmptyNodeId);
        }
        if self.zone.trim().is_empty() {
            errors.push(ValidationError::EmptyZone);
        }
        let capacity = match self.capacity.resolve(self.is_gateway) {
            Ok(capacity) => Some(capacity),
            Err(err) => {
                errors.push(err.into());
                None
            }
        };
        if let ZoneRedundancy::AtLeast(n) = self.redundancy {
            if n < 1 {
                errors.push(ValidationError::RedundancyBelowOne(n));
            }
        }

        match capacity {
            Some(capacity) if errors.is_empty() => Ok(capacity),
            _ => Err(ValidationErrors::new(errors)),
        }
    }

    /// Tags with whitespace trimmed, empties and duplicates removed.
    pub fn normalized_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty() && seen.insert(*tag))
            .map(str::to_string)
            .collect()
    }
}

/// Request body plus the layout version it is meaningful against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutTransaction {
    base_version: LayoutVersion,
    body: UpdateLayoutBody,
}

impl LayoutTransaction {
    pub fn base_version(&self) -> LayoutVersion {
        self.base_version
    }

    pub fn body(&self) -> &UpdateLayoutBody {
        &self.body
    }

    pub fn into_body(self) -> UpdateLayoutBody {
        self.body
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.body.roles.iter().map(NodeRoleChange::id)
    }

    pub fn is_removal_only(&self) -> bool {
        self.body.parameters.is_none() && self.body.roles.iter().all(NodeRoleChange::is_removal)
    }
}

/// Builds single-node transactions against one layout version.
#[derive(Debug, Clone, Copy)]
pub struct LayoutTransactionBuilder {
    base_version: LayoutVersion,
}

impl LayoutTransactionBuilder {
    pub fn new(base_version: LayoutVersion) -> Self {
        Self { base_version }
    }

    pub fn for_view(view: &TopologyView) -> Self {
        Self::new(view.version())
    }

    pub fn base_version(&self) -> LayoutVersion {
        self.base_version
    }

    /// Assignment of one node, carrying the edit's redundancy policy.
    pub fn build(&self, edit: &NodeEdit) -> Result<LayoutTransaction, ValidationErrors> {
        let capacity = edit.validate()?;
        let change = NodeRoleChange::assign(
            edit.node_id.clone(),
            edit.zone.trim().to_string(),
            capacity,
            edit.normalized_tags(),
        );

        debug!(
            node_id = %edit.node_id,
            zone = %edit.zone.trim(),
            capacity = ?capacity,
            redundancy = %edit.redundancy,
            base_version = %self.base_version,
            "built layout assignment"
        );

        Ok(LayoutTransaction {
            base_version: self.base_version,
            body: UpdateLayoutBody {
                parameters: Some(LayoutParameters::new(edit.redundancy)),
                roles: vec![change],
            },
        })
    }

    /// Removal of one node. Layout parameters are left untouched.
    pub fn build_removal(&self, node_id: &NodeId) -> Result<LayoutTransaction, ValidationErrors> {
        if node_id.is_empty() {
            return Err(ValidationError::EmptyNodeId.into());
        }

        debug!(node_id = %node_id, base_version = %self.base_version, "built layout removal");

        Ok(LayoutTransaction {
            base_version: self.base_version,
            body: UpdateLayoutBody {
                parameters: None,
                roles: vec![NodeRoleChange::remove(node_id.clone())],
            },
        })
    }
}

/// Several transactions against the same version folded into one request.
/// A later change for a node replaces an earlier one; the last non-null
/// parameters win.
#[derive(Debug, Clone)]
pub struct LayoutBatch {
    base_version: LayoutVersion,
    parameters: Option<LayoutParameters>,
    roles: Vec<NodeRoleChange>,
}

impl LayoutBatch {
    pub fn new(base_version: LayoutVersion) -> Self {
        Self {
            base_version,
            parameters: None,
            roles: Vec::new(),
        }
    }

    pub fn push(&mut self, transaction: LayoutTransaction) -> Result<(), BatchVersionMismatch> {
        if transaction.base_version != self.base_version {
            return Err(BatchVersionMismatch {
                expected: self.base_version,
                found: transaction.base_version,
            });
        }

        let body = transaction.into_body();
        if body.parameters.is_some() {
            self.parameters = body.parameters;
        }
        for change in body.roles {
            match self.roles.iter_mut().find(|existing| existing.id() == change.id()) {
                Some(existing) => *existing = change,
                None => self.roles.push(change),
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.parameters.is_none()
    }

    /// The combined transaction, or `None` when nothing was batched.
    pub fn finish(self) -> Option<LayoutTransaction> {
        if self.is_empty() {
            return None;
        }
        Some(LayoutTransaction {
            base_version: self.base_version,
            body: UpdateLayoutBody {
                parameters: self.parameters,
                roles: self.roles,
            },
        })
    }
}
