//! Simulated transport for the headless driver.
//!
//! Behaves like a remote SSH backend without touching the network: opens
//! answer after a fixed latency, password connections demand credentials, and
//! hosts under `.invalid` are unreachable.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use sshdesk_core::{
    AuthMethod, AuthOverride, Connection, Dimensions, SessionId, SessionStatus, TransportError,
};
use sshdesk_session::{
    ConnectionDirectory, OpenRequest, OpenedSession, StatusEvent, Transport, TransportResult,
};

/// Domain whose hosts never answer.
const UNREACHABLE_SUFFIX: &str = ".invalid";

/// In-process stand-in for the SSH backend.
pub struct SimulatedTransport {
    connections: Arc<dyn ConnectionDirectory>,
    latency: Duration,
    open_sessions: Mutex<HashSet<SessionId>>,
    status_tx: broadcast::Sender<StatusEvent>,
}

impl SimulatedTransport {
    /// Create a transport that answers opens after `latency`.
    pub fn new(connections: Arc<dyn ConnectionDirectory>, latency: Duration) -> Self {
        let (status_tx, _) = broadcast::channel(64);
        Self {
            connections,
            latency,
            open_sessions: Mutex::new(HashSet::new()),
            status_tx,
        }
    }

    /// Whether a remote session is currently open.
    pub fn is_open(&self, session_id: &SessionId) -> bool {
        self.open_sessions.lock().contains(session_id)
    }

    /// Drop a remote session as if the server went away, pushing a
    /// `disconnected` status.
    pub fn disconnect(&self, session_id: SessionId, reason: &str) {
        if !self.open_sessions.lock().remove(&session_id) {
            return;
        }
        info!("Simulated disconnect: id={}, reason='{}'", session_id, reason);
        let event = StatusEvent::new(
            session_id,
            SessionStatus::Disconnected,
            Some(reason.to_string()),
        );
        // No subscriber simply means no bridge is running.
        let _ = self.status_tx.send(event);
    }

    fn authenticate(connection: &Connection, auth: Option<&AuthOverride>) -> TransportResult<()> {
        if connection.auth != AuthMethod::Password {
            return Ok(());
        }
        let supplied = auth
            .and_then(|auth| auth.password.as_deref())
            .map(|password| !password.is_empty())
            .unwrap_or(false);
        if supplied {
            return Ok(());
        }

        let user = auth
            .and_then(|auth| auth.username.as_deref())
            .or(connection.username.as_deref());
        let target = match user {
            Some(user) => format!("{user}@{}", connection.host),
            None => connection.host.clone(),
        };
        Err(TransportError::auth_required(format!("Password for {target}")))
    }

    fn require_open(&self, session_id: &SessionId) -> TransportResult<()> {
        if self.is_open(session_id) {
            Ok(())
        } else {
            Err(TransportError::failed(format!("session {session_id} is not open")))
        }
    }
}

impl std::fmt::Debug for SimulatedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedTransport")
            .field("latency", &self.latency)
            .field("open_sessions", &self.open_sessions.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn open(&self, request: OpenRequest) -> TransportResult<OpenedSession> {
        tokio::time::sleep(self.latency).await;

        let connection = self.connections.get(&request.connection_id).ok_or_else(|| {
            TransportError::failed(format!("unknown connection '{}'", request.connection_id))
        })?;
        if connection.host.ends_with(UNREACHABLE_SUFFIX) {
            return Err(TransportError::failed(format!(
                "{}: no route to host",
                connection.host
            )));
        }
        Self::authenticate(&connection, request.auth_override.as_ref())?;

        self.open_sessions.lock().insert(request.session_id);
        debug!(
            "Simulated open: id={}, host={}:{}, {}x{}, term={}",
            request.session_id,
            connection.host,
            connection.port,
            request.dimensions.rows,
            request.dimensions.cols,
            request.term.as_deref().unwrap_or("default")
        );
        Ok(OpenedSession::connected())
    }

    async fn close(&self, session_id: SessionId) -> TransportResult<()> {
        let was_open = self.open_sessions.lock().remove(&session_id);
        debug!("Simulated close: id={}, was_open={}", session_id, was_open);
        Ok(())
    }

    async fn resize(&self, session_id: SessionId, dimensions: Dimensions) -> TransportResult<()> {
        self.require_open(&session_id)?;
        debug!(
            "Simulated resize: id={}, {}x{}",
            session_id, dimensions.rows, dimensions.cols
        );
        Ok(())
    }

    async fn write(&self, session_id: SessionId, data: &[u8]) -> TransportResult<()> {
        self.require_open(&session_id)?;
        debug!("Simulated write: id={}, {} byte(s)", session_id, data.len());
        Ok(())
    }

    fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }
}
