//! Edit-session state for the node assignment dialog.

use common::{LayoutVersion, NodeId};
use tracing::debug;

use crate::builder::NodeEdit;
use crate::view::TopologyView;

/// Where the seed of an edit session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Pre-filled from the merged view of an assigned node.
    Existing,
    /// Fresh defaults for a node without a role.
    New,
}

#[derive(Debug, Clone, PartialEq)]
struct EditSession {
    edit: NodeEdit,
    origin: SessionOrigin,
    base_version: Option<LayoutVersion>,
}

/// Owned staging context holding at most one open edit session.
///
/// Opening a session while another is open replaces it. Closing discards the
/// edit with no other effect. Sessions seeded from a view remember the layout
/// version of that view; the edit must be submitted against it.
#[derive(Debug, Clone, Default)]
pub struct StagingStore {
    session: Option<EditSession>,
}

impl StagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session on `edit`, returning the edit it replaced, if any.
    /// The session is not tied to a layout version.
    pub fn open(&mut self, edit: NodeEdit, origin: SessionOrigin) -> Option<NodeEdit> {
        self.replace(EditSession {
            edit,
            origin,
            base_version: None,
        })
    }

    fn replace(&mut self, session: EditSession) -> Option<NodeEdit> {
        debug!(
            node_id = %session.edit.node_id,
            origin = ?session.origin,
            base_version = ?session.base_version,
            "opening edit session"
        );
        let replaced = self.session.replace(session);
        replaced.map(|session| {
            debug!(node_id = %session.edit.node_id, "replaced open edit session");
            session.edit
        })
    }

    /// Open a session for `id` seeded from the merged view.
    pub fn open_for_node(&mut self, view: &TopologyView, id: &NodeId) -> Option<NodeEdit> {
        let origin = match view.node_view(id) {
            Some(crate::view::NodeView::Assigned(_)) => SessionOrigin::Existing,
            _ => SessionOrigin::New,
        };
        self.replace(EditSession {
            edit: view.edit_seed(id),
            origin,
            base_version: Some(view.version()),
        })
    }

    /// Open a session with fresh defaults for a node that has no role yet.
    pub fn open_new(&mut self, view: &TopologyView, id: NodeId) -> Option<NodeEdit> {
        self.replace(EditSession {
            edit: NodeEdit::new(id),
            origin: SessionOrigin::New,
            base_version: Some(view.version()),
        })
    }

    /// Close the session, handing back the discarded edit.
    pub fn close(&mut self) -> Option<NodeEdit> {
        let closed = self.session.take().map(|session| session.edit);
        if let Some(edit) = &closed {
            debug!(node_id = %edit.node_id, "closed edit session");
        }
        closed
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn target(&self) -> Option<&NodeEdit> {
        self.session.as_ref().map(|session| &session.edit)
    }

    pub fn target_mut(&mut self) -> Option<&mut NodeEdit> {
        self.session.as_mut().map(|session| &mut session.edit)
    }

    pub fn origin(&self) -> Option<SessionOrigin> {
        self.session.as_ref().map(|session| session.origin)
    }

    /// Layout version the open edit was computed against.
    pub fn base_version(&self) -> Option<LayoutVersion> {
        self.session.as_ref().and_then(|session| session.base_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{Capacity, CapacityUnit};
    use common::{ClusterLayout, NodeCapacity, Role, ZoneRedundancy};
    use tracing_test::traced_test;

    fn view_with_role() -> TopologyView {
        let mut layout = ClusterLayout::empty(LayoutVersion(2));
        layout.roles.push(Role {
            id: NodeId::from("n1"),
            zone: "eu".into(),
            capacity: NodeCapacity::Storage(3_000_000_000_000),
            tags: vec!["ssd".into()],
        });
        TopologyView::new(None, layout)
    }

    #[test]
    fn starts_closed() {
        let store = StagingStore::new();
        assert!(!store.is_open());
        assert!(store.target().is_none());
        assert!(store.origin().is_none());
        assert!(store.base_version().is_none());
    }

    #[test]
    fn new_session_uses_defaults() {
        let mut store = StagingStore::new();
        assert!(store.open_new(&view_with_role(), NodeId::from("n5")).is_none());

        let edit = store.target().unwrap();
        assert!(edit.zone.is_empty());
        assert_eq!(edit.capacity, Capacity::new(1.0, CapacityUnit::GB));
        assert!(!edit.is_gateway);
        assert!(edit.tags.is_empty());
        assert_eq!(edit.redundancy, ZoneRedundancy::AtLeast(1));
        assert_eq!(store.origin(), Some(SessionOrigin::New));
    }

    #[test]
    fn existing_node_is_prefilled() {
        let mut store = StagingStore::new();
        store.open_for_node(&view_with_role(), &NodeId::from("n1"));

        let edit = store.target().unwrap();
        assert_eq!(edit.zone, "eu");
        assert_eq!(edit.capacity, Capacity::new(3.0, CapacityUnit::TB));
        assert_eq!(edit.tags, vec!["ssd".to_string()]);
        assert_eq!(store.origin(), Some(SessionOrigin::Existing));
        assert_eq!(store.base_version(), Some(LayoutVersion(2)));
    }

    #[test]
    fn detached_edit_has_no_base_version() {
        let mut store = StagingStore::new();
        store.open(NodeEdit::new(NodeId::from("n9")), SessionOrigin::New);
        assert!(store.is_open());
        assert!(store.base_version().is_none());
    }

    #[test]
    fn unknown_node_opens_as_new() {
        let mut store = StagingStore::new();
        store.open_for_node(&view_with_role(), &NodeId::from("stranger"));
        assert_eq!(store.origin(), Some(SessionOrigin::New));
    }

    #[traced_test]
    #[test]
    fn opening_replaces_the_open_session() {
        let mut store = StagingStore::new();
        store.open_new(&view_with_role(), NodeId::from("a"));
        store.target_mut().unwrap().zone = "eu".into();

        let replaced = store.open_new(&view_with_role(), NodeId::from("b")).unwrap();
        assert_eq!(replaced.node_id, NodeId::from("a"));
        assert_eq!(replaced.zone, "eu");
        assert_eq!(store.target().unwrap().node_id, NodeId::from("b"));
        assert!(logs_contain("replaced open edit session"));
    }

    #[test]
    fn close_discards_the_edit() {
        let mut store = StagingStore::new();
        store.open_new(&view_with_role(), NodeId::from("a"));

        let closed = store.close().unwrap();
        assert_eq!(closed.node_id, NodeId::from("a"));
        assert!(!store.is_open());
        assert!(store.close().is_none());
    }
}
