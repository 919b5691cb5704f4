use common::LayoutVersion;
use thiserror::Error;

use crate::capacity::CapacityUnit;

/// Errors produced while converting operator-entered capacities.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapacityError {
    /// Storage nodes need a strictly positive capacity.
    #[error("capacity must be greater than zero, got {magnitude}")]
    NonPositive { magnitude: f64 },

    #[error("capacity must be a finite number")]
    NotFinite,

    /// The magnitude is positive but resolves to less than one byte.
    #[error("capacity {magnitude} {unit} is smaller than one byte")]
    BelowOneByte { magnitude: f64, unit: CapacityUnit },

    #[error("capacity {magnitude} {unit} does not fit in 64 bits")]
    Overflow { magnitude: f64, unit: CapacityUnit },

    #[error("unknown capacity unit `{unit}` (expected one of B, KB, MB, GB, TB, PB)")]
    UnknownUnit { unit: String },

    #[error("invalid capacity `{input}`")]
    InvalidMagnitude { input: String },
}

/// Operator-facing field an edit error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    NodeId,
    Zone,
    Capacity,
    Redundancy,
}

/// A single rejected field of a node edit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("node id must not be empty")]
    EmptyNodeId,

    #[error("zone must not be empty")]
    EmptyZone,

    #[error("invalid capacity: {0}")]
    Capacity(#[from] CapacityError),

    #[error("zone redundancy must require at least 1 zone, got {0}")]
    RedundancyBelowOne(u32),
}

impl ValidationError {
    pub fn field(&self) -> EditField {
        match self {
            ValidationError::EmptyNodeId => EditField::NodeId,
            ValidationError::EmptyZone => EditField::Zone,
            ValidationError::Capacity(_) => EditField::Capacity,
            ValidationError::RedundancyBelowOne(_) => EditField::Redundancy,
        }
    }
}

/// Every field rejected by a single validation pass, in field order.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid layout edit: {}", summarize(.0))]
pub struct ValidationErrors(Vec<ValidationError>);

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// The error reported for `field`, if any; used for inline field messages.
    pub fn for_field(&self, field: EditField) -> Option<&ValidationError> {
        self.0.iter().find(|err| err.field() == field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        Self(vec![err])
    }
}

/// A transaction computed against another layout version was added to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot batch a change computed against {found} into a batch for {expected}")]
pub struct BatchVersionMismatch {
    pub expected: LayoutVersion,
    pub found: LayoutVersion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_render_every_field() {
        let errors = ValidationErrors::new(vec![
            ValidationError::EmptyZone,
            ValidationError::RedundancyBelowOne(0),
        ]);

        let msg = errors.to_string();
        assert!(msg.contains("zone must not be empty"));
        assert!(msg.contains("at least 1 zone, got 0"));
        assert_eq!(
            errors.for_field(EditField::Redundancy),
            Some(&ValidationError::RedundancyBelowOne(0))
        );
        assert!(errors.for_field(EditField::Capacity).is_none());
    }

    #[test]
    fn capacity_error_maps_to_capacity_field() {
        let err: ValidationError = CapacityError::NonPositive { magnitude: -1.0 }.into();
        assert_eq!(err.field(), EditField::Capacity);
        assert!(err.to_string().contains("greater than zero"));
    }
}
