use common::{ApiError, LayoutVersion};
use layout_engine::ValidationErrors;
use thiserror::Error;

use crate::flight::MutationKind;

/// Coarse classification of a [`LayoutError`] for operator-facing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any network call.
    Validation,
    /// The layout moved on since the edits were computed.
    Conflict,
    /// The controller could not be reached or answered garbage.
    Transport,
    /// The controller refused for another reason.
    Server,
    /// The caller violated the orchestrator's protocol.
    State,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transport => "transport",
            ErrorKind::Server => "server",
            ErrorKind::State => "state",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid layout edit: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("{kind} against layout {version} is already in flight")]
    InFlight {
        version: LayoutVersion,
        kind: MutationKind,
    },

    #[error("layout {requested} is stale, the cluster is at {current}; refresh and retry")]
    StaleVersion {
        requested: LayoutVersion,
        current: LayoutVersion,
    },

    #[error("no edit session is open")]
    NoSession,

    #[error("failed to connect to {peer}: {message}")]
    Connect { peer: String, message: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl LayoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LayoutError::Invalid(_) => ErrorKind::Validation,
            LayoutError::InFlight { .. } | LayoutError::NoSession => ErrorKind::State,
            LayoutError::StaleVersion { .. } => ErrorKind::Conflict,
            LayoutError::Connect { .. } => ErrorKind::Server,
            LayoutError::Api(err) => match err {
                ApiError::Conflict { .. } => ErrorKind::Conflict,
                ApiError::Server { .. } => ErrorKind::Server,
                ApiError::Transport { .. } | ApiError::Decode { .. } => ErrorKind::Transport,
            },
        }
    }

    /// Message for the operator. Controller messages are passed through as-is.
    pub fn message(&self) -> String {
        match self {
            LayoutError::Api(err) => err.message().to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

pub type Result<T> = std::result::Result<T, LayoutError>;
