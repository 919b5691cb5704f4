//! Single-flight bookkeeping for layout mutations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use common::LayoutVersion;
use tracing::{debug, warn};

use crate::error::LayoutError;

/// Mutations that act on a layout version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Stage role changes (`UpdateClusterLayout`).
    Stage,
    Apply,
    Revert,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationKind::Stage => write!(f, "stage"),
            MutationKind::Apply => write!(f, "apply"),
            MutationKind::Revert => write!(f, "revert"),
        }
    }
}

/// Where a layout version stands in the submit lifecycle.
///
/// Acceptance and rejection are reported through the mutation's result; once
/// it resolves the version is `Idle` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    Idle,
    Submitting(MutationKind),
}

#[derive(Debug, Default)]
pub(crate) struct FlightRegistry {
    slots: Mutex<HashMap<LayoutVersion, MutationKind>>,
}

impl FlightRegistry {
    fn slots(&self) -> MutexGuard<'_, HashMap<LayoutVersion, MutationKind>> {
        // Slots are plain data; a panic elsewhere cannot leave them torn.
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `version` for `kind`, or fail if any mutation already holds it.
    pub(crate) fn acquire(
        &self,
        version: LayoutVersion,
        kind: MutationKind,
    ) -> Result<FlightGuard<'_>, LayoutError> {
        let mut slots = self.slots();
        if let Some(&held) = slots.get(&version) {
            warn!(
                version = %version,
                requested = %kind,
                in_flight = %held,
                "rejecting concurrent layout mutation"
            );
            return Err(LayoutError::InFlight {
                version,
                kind: held,
            });
        }
        slots.insert(version, kind);
        debug!(version = %version, kind = %kind, "mutation in flight");
        Ok(FlightGuard {
            registry: self,
            version,
        })
    }

    pub(crate) fn phase(&self, version: LayoutVersion) -> FlightPhase {
        match self.slots().get(&version) {
            Some(&kind) => FlightPhase::Submitting(kind),
            None => FlightPhase::Idle,
        }
    }

    fn release(&self, version: LayoutVersion) {
        if let Some(kind) = self.slots().remove(&version) {
            debug!(version = %version, kind = %kind, "mutation settled");
        }
    }
}

/// Holds a version's slot until dropped, including when the submitting
/// future is cancelled.
pub(crate) struct FlightGuard<'a> {
    registry: &'a FlightRegistry,
    version: LayoutVersion,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(self.version);
    }
}
