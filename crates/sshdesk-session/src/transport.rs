//! Transport trait: the abstract open/close/resize/write capability the
//! lifecycle core drives, plus its status push stream.
//!
//! Implementations wrap the actual SSH/SFTP protocol stack (production) or a
//! scripted stand-in (testing).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use sshdesk_core::{
    AuthOverride, ConnectionId, Dimensions, SessionId, SessionStatus, TransportError,
};

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Parameters of a remote session open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Connection to open against
    pub connection_id: ConnectionId,
    /// Client-generated id the remote session is bound to
    pub session_id: SessionId,
    /// Credentials supplied on an auth retry
    pub auth_override: Option<AuthOverride>,
    /// Initial terminal size
    pub dimensions: Dimensions,
    /// TERM to request for the remote PTY; `None` leaves it to the transport
    pub term: Option<String>,
}

/// What the transport reports back from a successful open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedSession {
    /// Authoritative title, if the remote supplies one
    #[serde(default)]
    pub title: Option<String>,
    /// Status after the open (normally `connected`)
    pub status: SessionStatus,
}

impl OpenedSession {
    /// A plain successful open.
    pub fn connected() -> Self {
        Self {
            title: None,
            status: SessionStatus::Connected,
        }
    }

    /// Successful open with a remote-supplied title.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            status: SessionStatus::Connected,
        }
    }
}

/// Status change pushed by the transport outside any local call.
///
/// `reason` is raw transport text and may embed the legacy auth marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Affected session
    pub session_id: SessionId,
    /// New status
    pub status: SessionStatus,
    /// Raw detail
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusEvent {
    /// Create a status event.
    pub fn new(session_id: SessionId, status: SessionStatus, reason: Option<String>) -> Self {
        Self {
            session_id,
            status,
            reason,
        }
    }
}

/// Remote session capability consumed by the lifecycle controller.
///
/// Implementations must be thread-safe (Send + Sync); the controller calls
/// them from spawned tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open (or re-authenticate) the remote session bound to `request.session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AuthRequired`] when the remote wants different
    /// credentials, any other variant for terminal failures.
    async fn open(&self, request: OpenRequest) -> TransportResult<OpenedSession>;

    /// Close a remote session. Callers treat this as best-effort.
    async fn close(&self, session_id: SessionId) -> TransportResult<()>;

    /// Resize a remote terminal.
    async fn resize(&self, session_id: SessionId, dimensions: Dimensions) -> TransportResult<()>;

    /// Write input bytes to a remote terminal.
    async fn write(&self, session_id: SessionId, data: &[u8]) -> TransportResult<()>;

    /// Subscribe to pushed status events. Dropping the receiver unsubscribes.
    fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent>;
}
