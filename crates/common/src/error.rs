use thiserror::Error;

/// Failures reported by the cluster admin API, or on the way to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The controller rejected the request against a stale layout version.
    #[error("layout version conflict (HTTP {status}): {message}")]
    Conflict { status: u16, message: String },

    /// Any other non-success response.
    #[error("controller error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// A success response whose payload did not match the expected shape.
    #[error("unexpected response payload: {message}")]
    Decode { message: String },
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
        }
    }

    pub fn conflict(status: u16, message: impl Into<String>) -> Self {
        ApiError::Conflict {
            status,
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        ApiError::Server {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ApiError::Decode {
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response.
    ///
    /// The message is the JSON body's `message` field when present, otherwise
    /// the raw body text, otherwise `HTTP <status>`.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| format!("HTTP {}", status));

        let mentions_version = message.to_ascii_lowercase().contains("version");
        if status == 409 || (status == 400 && mentions_version) {
            ApiError::Conflict { status, message }
        } else {
            ApiError::Server { status, message }
        }
    }

    /// Message as produced by the controller, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Transport { message }
            | ApiError::Conflict { message, .. }
            | ApiError::Server { message, .. }
            | ApiError::Decode { message } => message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Conflict { status, .. } | ApiError::Server { status, .. } => Some(*status),
            ApiError::Transport { .. } | ApiError::Decode { .. } => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }
}

/// Input that is neither `maximum` nor a zone count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid zone redundancy `{input}`: expected `maximum` or a zone count")]
pub struct ParseRedundancyError {
    pub input: String,
}
