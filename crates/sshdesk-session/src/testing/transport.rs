//! Scripted transport: every open is parked until the test answers it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};

use sshdesk_core::{Dimensions, SessionId, TransportError};

use crate::transport::{OpenRequest, OpenedSession, StatusEvent, Transport, TransportResult};

/// How long the `next_*` helpers wait before giving up.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// An open call waiting for the test to answer it.
#[derive(Debug)]
pub struct PendingOpen {
    /// What the controller asked for
    pub request: OpenRequest,
    responder: oneshot::Sender<TransportResult<OpenedSession>>,
}

impl PendingOpen {
    /// Answer the open.
    pub fn respond(self, result: TransportResult<OpenedSession>) {
        // The controller side may have timed out and dropped the receiver.
        let _ = self.responder.send(result);
    }

    /// Answer with a plain successful open.
    pub fn succeed(self) {
        self.respond(Ok(OpenedSession::connected()));
    }

    /// Answer with a failure.
    pub fn fail(self, err: TransportError) {
        self.respond(Err(err));
    }
}

/// Transport driven step by step from a test.
#[derive(Debug)]
pub struct ScriptedTransport {
    opens_tx: mpsc::UnboundedSender<PendingOpen>,
    opens_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PendingOpen>>,
    closes_tx: mpsc::UnboundedSender<SessionId>,
    closes_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SessionId>>,
    status_tx: broadcast::Sender<StatusEvent>,
    open_calls: AtomicUsize,
    fail_close: AtomicBool,
    writes: Mutex<Vec<(SessionId, Vec<u8>)>>,
    resizes: Mutex<Vec<(SessionId, Dimensions)>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Create a transport with no pending calls.
    pub fn new() -> Self {
        let (opens_tx, opens_rx) = mpsc::unbounded_channel();
        let (closes_tx, closes_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = broadcast::channel(64);
        Self {
            opens_tx,
            opens_rx: tokio::sync::Mutex::new(opens_rx),
            closes_tx,
            closes_rx: tokio::sync::Mutex::new(closes_rx),
            status_tx,
            open_calls: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
            resizes: Mutex::new(Vec::new()),
        }
    }

    /// Wait for the next open call (up to a few seconds).
    pub async fn next_open(&self) -> Option<PendingOpen> {
        let mut opens = self.opens_rx.lock().await;
        tokio::time::timeout(WAIT_LIMIT, opens.recv())
            .await
            .ok()
            .flatten()
    }

    /// Wait for the next close call (up to a few seconds).
    pub async fn next_close(&self) -> Option<SessionId> {
        let mut closes = self.closes_rx.lock().await;
        tokio::time::timeout(WAIT_LIMIT, closes.recv())
            .await
            .ok()
            .flatten()
    }

    /// Take an already-issued close call without waiting.
    pub fn try_next_close(&self) -> Option<SessionId> {
        self.closes_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Push a status event to subscribers. Returns how many received it.
    pub fn push_status(&self, event: StatusEvent) -> usize {
        self.status_tx.send(event).unwrap_or(0)
    }

    /// Number of open calls received.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Make close calls fail (they are still recorded).
    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Writes received so far.
    pub fn writes(&self) -> Vec<(SessionId, Vec<u8>)> {
        self.writes.lock().clone()
    }

    /// Resizes received so far.
    pub fn resizes(&self) -> Vec<(SessionId, Dimensions)> {
        self.resizes.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: OpenRequest) -> TransportResult<OpenedSession> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let (responder, answer) = oneshot::channel();
        self.opens_tx
            .send(PendingOpen { request, responder })
            .map_err(|_| TransportError::Closed)?;
        answer.await.unwrap_or(Err(TransportError::Closed))
    }

    async fn close(&self, session_id: SessionId) -> TransportResult<()> {
        let _ = self.closes_tx.send(session_id);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::failed("close failed"));
        }
        Ok(())
    }

    async fn resize(&self, session_id: SessionId, dimensions: Dimensions) -> TransportResult<()> {
        self.resizes.lock().push((session_id, dimensions));
        Ok(())
    }

    async fn write(&self, session_id: SessionId, data: &[u8]) -> TransportResult<()> {
        self.writes.lock().push((session_id, data.to_vec()));
        Ok(())
    }

    fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }
}
