//! Client-side cluster layout planning.
//!
//! - [`capacity`]: operator capacities to controller byte counts and back
//! - [`view`]: committed layout merged with staged changes, zone/tag catalogs
//! - [`builder`]: validated `UpdateClusterLayout` transactions per layout version
//! - [`staging`]: the single open edit session
//!
//! Everything in this crate is synchronous and free of I/O; submitting the
//! transactions is the orchestrator's job.

pub mod builder;
pub mod capacity;
pub mod error;
pub mod staging;
pub mod view;

pub use builder::{LayoutBatch, LayoutTransaction, LayoutTransactionBuilder, NodeEdit};
pub use capacity::{format_bytes, Capacity, CapacityUnit, Magnitude};
pub use error::{BatchVersionMismatch, CapacityError, EditField, ValidationError, ValidationErrors};
pub use staging::{SessionOrigin, StagingStore};
pub use view::{EffectiveRole, NodeView, StagedSummary, TopologyView};
