//! Error types for sshdesk.

use thiserror::Error;

use crate::{ConnectionId, SessionId};

/// Legacy marker some transports embed in a plain error message to signal that
/// the remote asked for (different) credentials.
///
/// Format: `"<anything>AUTH_REQUIRED:<human readable detail>"`.
pub const AUTH_REQUIRED_MARKER: &str = "AUTH_REQUIRED:";

/// Fallback detail used when an auth-required failure carries no text.
const DEFAULT_AUTH_DETAIL: &str = "authentication required";

/// Main error type for sshdesk operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Connection not found
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a transport operation.
///
/// `AuthRequired` is the recoverable case: the UI should prompt for new
/// credentials and retry. Everything else is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote rejected or requested credentials
    #[error("Authentication required: {detail}")]
    AuthRequired {
        /// Human-readable detail (prompt text, rejected method, ...)
        detail: String,
    },

    /// Network, handshake or remote failure
    #[error("{detail}")]
    Failed {
        /// Human-readable detail
        detail: String,
    },

    /// The transport has shut down and accepts no more calls
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// Create an auth-required error.
    pub fn auth_required(detail: impl Into<String>) -> Self {
        Self::AuthRequired {
            detail: detail.into(),
        }
    }

    /// Create a generic failure.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed {
            detail: detail.into(),
        }
    }

    /// Classify a plain message, recognising the legacy [`AUTH_REQUIRED_MARKER`].
    pub fn from_message(message: &str) -> Self {
        match strip_auth_marker(message) {
            Some(detail) => Self::AuthRequired { detail },
            None => Self::Failed {
                detail: message.trim().to_string(),
            },
        }
    }

    /// Whether this failure asks for different credentials.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired { .. })
    }

    /// Cleaned, user-facing text of this failure (never contains the marker).
    pub fn detail(&self) -> String {
        match self {
            Self::AuthRequired { detail } => {
                // Detail may itself come from a marker-tagged string.
                strip_auth_marker(detail).unwrap_or_else(|| detail.clone())
            }
            Self::Failed { detail } => detail.clone(),
            Self::Closed => "transport closed".to_string(),
        }
    }
}

/// If `message` embeds the auth-required marker, return the cleaned detail
/// following it.
pub fn strip_auth_marker(message: &str) -> Option<String> {
    let index = message.find(AUTH_REQUIRED_MARKER)?;
    let detail = message[index + AUTH_REQUIRED_MARKER.len()..].trim();
    if detail.is_empty() {
        Some(DEFAULT_AUTH_DETAIL.to_string())
    } else {
        Some(detail.to_string())
    }
}
