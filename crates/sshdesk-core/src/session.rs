//! Session types for remote terminal session management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::strip_auth_marker;
use crate::{ConnectionId, TransportError};

/// Unique identifier for a session.
///
/// Generated client-side before the remote open completes, so the UI can show
/// a placeholder tab immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Open or auth retry in flight
    Connecting,
    /// Remote session established
    Connected,
    /// Remote side went away after a successful open
    Disconnected,
    /// Open or retry failed; stays visible until retried or closed
    Failed,
}

impl SessionStatus {
    /// Lowercase name, as used on the wire and in notices.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of tab a session backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Interactive remote shell
    Terminal,
    /// Auxiliary process/network monitor tab (no remote channel of its own)
    Monitor,
}

/// Detail attached to the last status transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StatusReason {
    /// The remote wants different credentials; the UI should prompt
    AuthRequired(String),
    /// Any other human-readable detail
    Message(String),
}

impl StatusReason {
    /// Classify a plain reason string, stripping the legacy auth marker.
    pub fn from_message(message: &str) -> Self {
        match strip_auth_marker(message) {
            Some(detail) => Self::AuthRequired(detail),
            None => Self::Message(message.trim().to_string()),
        }
    }

    /// Whether the reason asks for new credentials.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired(_))
    }

    /// Cleaned text of the reason.
    pub fn text(&self) -> &str {
        match self {
            Self::AuthRequired(detail) | Self::Message(detail) => detail,
        }
    }
}

impl From<&TransportError> for StatusReason {
    fn from(err: &TransportError) -> Self {
        if err.is_auth_required() {
            Self::AuthRequired(err.detail())
        } else {
            Self::Message(err.detail())
        }
    }
}

impl std::fmt::Display for StatusReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// One logical terminal/process channel bound to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier (immutable for the session's lifetime)
    pub id: SessionId,
    /// Owning connection
    pub connection_id: ConnectionId,
    /// Human-readable tab label, e.g. `prod@10.0.0.1 #3`
    pub title: String,
    /// Tab kind
    pub kind: SessionKind,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Detail attached to the last status transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StatusReason>,
    /// Whether a reconnect attempt is meaningful
    pub reconnectable: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a terminal session placeholder in `connecting` state.
    pub fn connecting(
        id: SessionId,
        connection_id: ConnectionId,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id,
            connection_id,
            title: title.into(),
            kind: SessionKind::Terminal,
            status: SessionStatus::Connecting,
            reason: None,
            reconnectable: true,
            created_at: Utc::now(),
        }
    }

    /// Create a monitor tab. Monitor tabs are always connected and never reconnect.
    pub fn monitor(id: SessionId, connection_id: ConnectionId, title: impl Into<String>) -> Self {
        Self {
            id,
            connection_id,
            title: title.into(),
            kind: SessionKind::Monitor,
            status: SessionStatus::Connected,
            reason: None,
            reconnectable: false,
            created_at: Utc::now(),
        }
    }

    /// Whether this session backs a remote terminal channel.
    pub fn is_terminal(&self) -> bool {
        self.kind == SessionKind::Terminal
    }

    /// Whether the last transition asked for new credentials.
    pub fn auth_required(&self) -> bool {
        self.reason
            .as_ref()
            .map(StatusReason::is_auth_required)
            .unwrap_or(false)
    }
}
