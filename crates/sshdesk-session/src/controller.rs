//! Session lifecycle controller.
//!
//! Orchestrates open, auth retry, close and reconnect on top of the registry,
//! the generation tracker and the concurrency guards. Every asynchronous
//! result is checked against the generation it started with before it may
//! touch the registry.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sshdesk_core::{
    AuthOverride, ClientConfig, ConnectionId, Dimensions, Error, Result, Session, SessionId,
    SessionStatus, StatusReason, TransportError,
};

use crate::attempt::Attempt;
use crate::bridge::{self, EventDisposition};
use crate::connections::ConnectionDirectory;
use crate::context::SessionContext;
use crate::generation::Staleness;
use crate::notice::{Notice, Notifier, TracingNotifier};
use crate::title;
use crate::transport::{OpenRequest, OpenedSession, StatusEvent, Transport, TransportResult};

/// Reason returned when retrying a session that no longer exists.
pub const REASON_SESSION_GONE: &str = "session no longer exists";
/// Reason returned when the owning connection already has a connect in flight.
pub const REASON_CONNECTION_BUSY: &str = "connection busy";
/// Reason returned when a retry finished after its session was closed.
pub const REASON_SESSION_CLOSED: &str = "session closed";
/// Reason returned when a retry finished after a newer attempt started.
pub const REASON_SUPERSEDED: &str = "superseded by a newer attempt";
/// Reason returned when retrying a session that is not a terminal.
pub const REASON_NOT_TERMINAL: &str = "not a terminal session";
/// Failure detail used when an open exceeds the configured timeout.
pub const REASON_TIMED_OUT: &str = "connection timed out";

/// Shared handle to an in-flight session open. Concurrent callers for the
/// same connection receive clones of the same handle.
pub type OpenFuture = Shared<BoxFuture<'static, Option<Session>>>;

/// Shared handle to an in-flight auth retry.
pub type RetryFuture = Shared<BoxFuture<'static, RetryOutcome>>;

type RefreshFuture = Shared<BoxFuture<'static, ()>>;

/// Result of an auth retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RetryOutcome {
    /// The session is connected again
    Connected,
    /// The retry did not connect the session
    Rejected {
        /// The remote wants different credentials; prompt again
        auth_required: bool,
        /// Cleaned, user-facing reason
        reason: String,
    },
}

impl RetryOutcome {
    /// Whether the retry connected the session.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Connected)
    }

    fn rejected(auth_required: bool, reason: impl Into<String>) -> Self {
        Self::Rejected {
            auth_required,
            reason: reason.into(),
        }
    }

    fn stale(staleness: Staleness) -> Self {
        match staleness {
            Staleness::Cancelled => Self::rejected(false, REASON_SESSION_CLOSED),
            Staleness::Superseded => Self::rejected(false, REASON_SUPERSEDED),
        }
    }
}

/// Configuration for the session controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Terminal size sent with every open
    pub dimensions: Dimensions,

    /// Upper bound for a single open/retry transport call
    pub open_timeout: Option<Duration>,

    /// TERM sent with every open
    pub term: Option<String>,
}

impl From<&ClientConfig> for ControllerConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            dimensions: config.terminal.dimensions(),
            open_timeout: config.client.open_timeout(),
            term: config.terminal.term(),
        }
    }
}

/// Point-in-time view of the lifecycle state for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Sessions in display order
    pub sessions: Vec<Session>,
    /// Focused session
    pub active_session_id: Option<SessionId>,
    /// Focused connection
    pub active_connection_id: Option<ConnectionId>,
    /// Connections with a connect in flight
    pub connecting_ids: Vec<ConnectionId>,
}

struct Inner {
    context: Mutex<SessionContext>,
    transport: Arc<dyn Transport>,
    connections: Arc<dyn ConnectionDirectory>,
    notifier: Arc<dyn Notifier>,
    config: ControllerConfig,
    refresh: Mutex<Option<RefreshFuture>>,
}

/// Lifecycle controller for remote terminal sessions.
///
/// Cheap to clone; clones share state. Operations that start asynchronous
/// work spawn onto the current Tokio runtime and must be called from within
/// one.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Create a controller with the tracing notifier and default configuration.
    pub fn new(transport: Arc<dyn Transport>, connections: Arc<dyn ConnectionDirectory>) -> Self {
        Self::with_config(
            transport,
            connections,
            Arc::new(TracingNotifier),
            ControllerConfig::default(),
        )
    }

    /// Create a controller with a custom notifier and configuration.
    pub fn with_config(
        transport: Arc<dyn Transport>,
        connections: Arc<dyn ConnectionDirectory>,
        notifier: Arc<dyn Notifier>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                context: Mutex::new(SessionContext::default()),
                transport,
                connections,
                notifier,
                config,
                refresh: Mutex::new(None),
            }),
        }
    }

    /// The transport this controller drives.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.inner.transport)
    }

    /// Open a new terminal session against a connection.
    ///
    /// The `connecting` placeholder is inserted and focused before this
    /// returns; the returned handle resolves once the transport answers. A
    /// second call while an open for the same connection is pending returns the
    /// same handle. Resolves to `None` when the connection is busy, the open
    /// failed, or the session was closed before the open finished.
    pub fn start_session(&self, connection_id: &ConnectionId) -> OpenFuture {
        let mut context = self.inner.context.lock();

        if let Some(pending) = context.opens.get(connection_id) {
            debug!("Joining in-flight open: connection={}", connection_id);
            return pending;
        }
        if !context.connecting.begin(connection_id) {
            debug!("Connect already in flight: connection={}", connection_id);
            return ready(None);
        }

        let connection = self.inner.connections.get(connection_id);
        let base = title::base_title(connection.as_ref());
        let sequence = context.sequences.claim(connection_id);
        let placeholder = Session::connecting(
            SessionId::new(),
            connection_id.clone(),
            title::compose(&base, sequence),
        );
        info!(
            "Starting session: id={}, connection={}, title='{}'",
            placeholder.id, connection_id, placeholder.title
        );

        let attempt = Attempt::begin(&mut context, placeholder);
        let request = OpenRequest {
            connection_id: connection_id.clone(),
            session_id: attempt.session_id,
            auth_override: None,
            dimensions: self.inner.config.dimensions,
            term: self.inner.config.term.clone(),
        };

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            controller.run_open(attempt, base, sequence, request).await
        });
        let pending = shared(handle, None);
        context.opens.insert(connection_id.clone(), pending.clone());
        pending
    }

    async fn run_open(
        self,
        attempt: Attempt,
        base: String,
        sequence: u32,
        request: OpenRequest,
    ) -> Option<Session> {
        let result = self.call_open(request).await;
        let succeeded = result.is_ok();

        let (settled, notice) = {
            let mut context = self.inner.context.lock();
            let settled = match result {
                Ok(opened) => attempt.settle(&mut context, |context| {
                    let title = title::merge(&base, opened.title.as_deref(), sequence);
                    (Some(commit(context, &attempt, &opened, title)), None::<Notice>)
                }),
                Err(err) => attempt.settle(&mut context, |context| {
                    (None, fail(context, &attempt.session_id, &err))
                }),
            };
            attempt.finish(&mut context);
            context.opens.remove(&attempt.connection_id);

            match settled {
                Ok((session, notice)) => (Ok(session), notice),
                Err(staleness) => (Err(staleness), None),
            }
        };
        self.emit(notice);

        match settled {
            Ok(Some(session)) => {
                info!(
                    "Session connected: id={}, title='{}'",
                    session.id, session.title
                );
                self.refresh_connections();
                Some(session)
            }
            Ok(None) => None,
            Err(staleness) => {
                self.discard_stale(&attempt, staleness, succeeded);
                None
            }
        }
    }

    /// Retry authentication on an existing session with new credentials.
    ///
    /// Keeps the session id and title. A second call for the same session
    /// while one is pending returns the same handle.
    pub fn retry_session_auth(&self, session_id: &SessionId, auth: AuthOverride) -> RetryFuture {
        let mut context = self.inner.context.lock();

        if let Some(pending) = context.retries.get(session_id) {
            debug!("Joining in-flight auth retry: id={}", session_id);
            return pending;
        }
        let Some(existing) = context.registry.get(session_id).cloned() else {
            return ready(RetryOutcome::rejected(false, REASON_SESSION_GONE));
        };
        if !existing.is_terminal() {
            return ready(RetryOutcome::rejected(false, REASON_NOT_TERMINAL));
        }
        if !context.connecting.begin(&existing.connection_id) {
            debug!(
                "Auth retry rejected, connection busy: id={}, connection={}",
                session_id, existing.connection_id
            );
            return ready(RetryOutcome::rejected(false, REASON_CONNECTION_BUSY));
        }
        info!(
            "Retrying authentication: id={}, connection={}",
            session_id, existing.connection_id
        );

        let mut tentative = existing;
        tentative.status = SessionStatus::Connecting;
        tentative.reason = None;
        let preserved_title = tentative.title.clone();
        let attempt = Attempt::begin(&mut context, tentative);
        let request = OpenRequest {
            connection_id: attempt.connection_id.clone(),
            session_id: attempt.session_id,
            auth_override: Some(auth),
            dimensions: self.inner.config.dimensions,
            term: self.inner.config.term.clone(),
        };

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            controller.run_retry(attempt, preserved_title, request).await
        });
        let pending = shared(handle, RetryOutcome::rejected(false, REASON_SESSION_CLOSED));
        context.retries.insert(*session_id, pending.clone());
        pending
    }

    async fn run_retry(
        self,
        attempt: Attempt,
        preserved_title: String,
        request: OpenRequest,
    ) -> RetryOutcome {
        let result = self.call_open(request).await;
        let succeeded = result.is_ok();

        let (outcome, notice) = {
            let mut context = self.inner.context.lock();
            let settled = match result {
                Ok(opened) => attempt.settle(&mut context, |context| {
                    commit(context, &attempt, &opened, preserved_title);
                    (RetryOutcome::Connected, None::<Notice>)
                }),
                Err(err) => attempt.settle(&mut context, |context| {
                    let notice = fail(context, &attempt.session_id, &err);
                    (
                        RetryOutcome::rejected(err.is_auth_required(), err.detail()),
                        notice,
                    )
                }),
            };
            attempt.finish(&mut context);
            context.retries.remove(&attempt.session_id);

            match settled {
                Ok(settled) => settled,
                Err(staleness) => {
                    drop(context);
                    self.discard_stale(&attempt, staleness, succeeded);
                    (RetryOutcome::stale(staleness), None)
                }
            }
        };
        self.emit(notice);
        outcome
    }

    /// Close a session. Always succeeds from the caller's point of view; the
    /// remote close is best-effort and runs in the background.
    ///
    /// Returns whether a session was removed.
    pub fn close_session(&self, session_id: &SessionId) -> bool {
        let removed = {
            let mut context = self.inner.context.lock();
            detach(&mut context, session_id)
        };

        match removed {
            Some(session) => {
                info!("Closed session: id={}, title='{}'", session.id, session.title);
                if session.is_terminal() {
                    self.spawn_remote_close(session.id);
                }
                true
            }
            None => {
                debug!("Close ignored, unknown session: id={}", session_id);
                false
            }
        }
    }

    /// Discard a session and open a fresh one on the same connection.
    ///
    /// Returns `None` when the session is unknown or not reconnectable.
    pub fn reconnect_session(&self, session_id: &SessionId) -> Option<OpenFuture> {
        let connection_id = {
            let mut context = self.inner.context.lock();
            let session = context.registry.get(session_id)?;
            if !session.reconnectable {
                debug!("Session is not reconnectable: id={}", session_id);
                return None;
            }
            let connection_id = session.connection_id.clone();
            detach(&mut context, session_id);
            connection_id
        };

        info!(
            "Reconnecting: old_id={}, connection={}",
            session_id, connection_id
        );
        self.spawn_remote_close(*session_id);
        Some(self.start_session(&connection_id))
    }

    /// Close every session of a connection. Returns how many were removed.
    pub fn close_connection(&self, connection_id: &ConnectionId) -> usize {
        let removed = {
            let mut context = self.inner.context.lock();
            let ids = context.registry.ids_for_connection(connection_id);
            let pending: Vec<bool> = ids.iter().map(|id| is_pending(&context, id)).collect();
            for id in &ids {
                context.generations.cancel(*id);
            }
            let removed = context.registry.remove_all_for_connection(connection_id);
            for (id, pending) in ids.iter().zip(pending) {
                if !pending {
                    context.generations.forget(id);
                }
                context.announcer.forget(id);
            }
            removed
        };

        info!(
            "Closed {} session(s) for connection={}",
            removed.len(),
            connection_id
        );
        for session in removed.iter().filter(|session| session.is_terminal()) {
            self.spawn_remote_close(session.id);
        }
        removed.len()
    }

    /// Focus a connection; clears the active session if it belongs elsewhere.
    pub fn activate_connection(&self, connection_id: &ConnectionId) {
        let mut context = self.inner.context.lock();
        let registry = &mut context.registry;
        registry.set_active_connection(Some(connection_id.clone()));

        let mismatched = match registry.active_session() {
            Some(active) => registry
                .get(&active)
                .map(|session| &session.connection_id != connection_id)
                .unwrap_or(true),
            None => false,
        };
        if mismatched {
            registry.set_active_session(None);
        }
    }

    /// Focus a session (and its connection).
    pub fn activate_session(&self, session_id: &SessionId) -> bool {
        let mut context = self.inner.context.lock();
        let Some(connection_id) = context
            .registry
            .get(session_id)
            .map(|session| session.connection_id.clone())
        else {
            return false;
        };
        context.registry.set_active_session(Some(*session_id));
        context.registry.set_active_connection(Some(connection_id));
        true
    }

    /// Open a monitor tab for a connection. Monitor tabs never touch the transport.
    pub fn open_monitor(&self, connection_id: &ConnectionId) -> Session {
        let connection = self.inner.connections.get(connection_id);
        let base = title::base_title(connection.as_ref());
        let session = Session::monitor(
            SessionId::new(),
            connection_id.clone(),
            title::monitor(&base),
        );

        let mut context = self.inner.context.lock();
        context.registry.upsert(session.clone());
        context.registry.set_active_session(Some(session.id));
        context
            .registry
            .set_active_connection(Some(connection_id.clone()));
        debug!("Opened monitor tab: id={}, title='{}'", session.id, session.title);
        session
    }

    /// Rename a session tab.
    pub fn rename_session(&self, session_id: &SessionId, title: impl Into<String>) {
        self.inner.context.lock().registry.rename(session_id, title);
    }

    /// Move a session tab to just before another.
    pub fn reorder_sessions(&self, source_id: &SessionId, target_id: &SessionId) {
        self.inner
            .context
            .lock()
            .registry
            .reorder(source_id, target_id);
    }

    /// Forward input to a remote terminal.
    pub async fn write(&self, session_id: &SessionId, data: &[u8]) -> Result<()> {
        self.require_terminal(session_id)?;
        self.inner.transport.write(*session_id, data).await?;
        Ok(())
    }

    /// Resize a remote terminal.
    pub async fn resize(&self, session_id: &SessionId, dimensions: Dimensions) -> Result<()> {
        if !dimensions.is_valid() {
            return Err(Error::InvalidInput(format!(
                "invalid dimensions {}x{}",
                dimensions.rows, dimensions.cols
            )));
        }
        self.require_terminal(session_id)?;
        self.inner.transport.resize(*session_id, dimensions).await?;
        Ok(())
    }

    /// Reconcile a pushed status event into the registry.
    pub fn handle_status_event(&self, event: &StatusEvent) -> EventDisposition {
        let (disposition, notice) = {
            let mut context = self.inner.context.lock();
            bridge::reconcile(&mut context, event)
        };
        self.emit(notice);
        disposition
    }

    /// Close every session and wait for the best-effort remote closes.
    pub async fn shutdown(&self) {
        let removed: Vec<Session> = {
            let mut context = self.inner.context.lock();
            let ids: Vec<SessionId> = context
                .registry
                .sessions()
                .iter()
                .map(|session| session.id)
                .collect();
            ids.iter()
                .filter_map(|id| detach(&mut context, id))
                .collect()
        };

        info!("Shutting down: closing {} session(s)", removed.len());
        let closes = removed
            .iter()
            .filter(|session| session.is_terminal())
            .map(|session| close_remote(self.transport(), session.id));
        future::join_all(closes).await;
    }

    /// Reload the connection list in the background; callers that arrive
    /// while a refresh is running share it instead of starting another.
    pub fn refresh_connections(&self) -> Shared<BoxFuture<'static, ()>> {
        let (refresh, created) = self.refresh_handle();
        if created {
            tokio::spawn(refresh.clone());
        }
        refresh
    }

    /// A copy of one session record.
    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.inner.context.lock().registry.get(session_id).cloned()
    }

    /// All sessions in display order.
    pub fn sessions(&self) -> Vec<Session> {
        self.inner.context.lock().registry.sessions().to_vec()
    }

    /// Connections with a connect in flight (for disabling connect buttons).
    pub fn connecting_ids(&self) -> Vec<ConnectionId> {
        self.inner.context.lock().connecting.ids()
    }

    /// Focused session.
    pub fn active_session_id(&self) -> Option<SessionId> {
        self.inner.context.lock().registry.active_session()
    }

    /// Focused connection.
    pub fn active_connection_id(&self) -> Option<ConnectionId> {
        self.inner.context.lock().registry.active_connection().cloned()
    }

    /// Full view of the lifecycle state.
    pub fn snapshot(&self) -> Snapshot {
        let context = self.inner.context.lock();
        Snapshot {
            sessions: context.registry.sessions().to_vec(),
            active_session_id: context.registry.active_session(),
            active_connection_id: context.registry.active_connection().cloned(),
            connecting_ids: context.connecting.ids(),
        }
    }

    /// Number of sessions with tracked generation state.
    pub fn tracked_generations(&self) -> usize {
        self.inner.context.lock().generations.tracked()
    }

    async fn call_open(&self, request: OpenRequest) -> TransportResult<OpenedSession> {
        let session_id = request.session_id;
        let open = self.inner.transport.open(request);
        let Some(limit) = self.inner.config.open_timeout else {
            return open.await;
        };

        match tokio::time::timeout(limit, open).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Open timed out after {:?}: id={}", limit, session_id);
                self.spawn_remote_close(session_id);
                Err(TransportError::failed(REASON_TIMED_OUT))
            }
        }
    }

    fn discard_stale(&self, attempt: &Attempt, staleness: Staleness, succeeded: bool) {
        debug!(
            "Discarding stale result: id={}, generation={}, {:?}",
            attempt.session_id, attempt.generation, staleness
        );
        // A superseded attempt shares its id with the live one; only a
        // cancelled slot leaves an orphan behind.
        if succeeded && staleness == Staleness::Cancelled {
            self.spawn_remote_close(attempt.session_id);
        }
    }

    fn require_terminal(&self, session_id: &SessionId) -> Result<()> {
        let context = self.inner.context.lock();
        match context.registry.get(session_id) {
            Some(session) if session.is_terminal() => Ok(()),
            Some(_) => Err(Error::InvalidInput(format!(
                "session {session_id} is not a terminal"
            ))),
            None => Err(Error::SessionNotFound(*session_id)),
        }
    }

    fn emit(&self, notice: Option<Notice>) {
        if let Some(notice) = notice {
            self.inner.notifier.notify(notice);
        }
    }

    fn spawn_remote_close(&self, session_id: SessionId) {
        tokio::spawn(close_remote(self.transport(), session_id));
    }

    fn refresh_handle(&self) -> (RefreshFuture, bool) {
        let mut slot = self.inner.refresh.lock();
        if let Some(pending) = slot.as_ref() {
            return (pending.clone(), false);
        }

        let inner = Arc::clone(&self.inner);
        let refresh = async move {
            if let Err(e) = inner.connections.refresh().await {
                warn!("Connection list refresh failed: {}", e);
            }
            *inner.refresh.lock() = None;
        }
        .boxed()
        .shared();
        *slot = Some(refresh.clone());
        (refresh, true)
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Store the committed session and focus it.
fn commit(
    context: &mut SessionContext,
    attempt: &Attempt,
    opened: &OpenedSession,
    title: String,
) -> Session {
    let mut session = context
        .registry
        .get(&attempt.session_id)
        .cloned()
        .unwrap_or_else(|| {
            Session::connecting(attempt.session_id, attempt.connection_id.clone(), "")
        });
    session.title = title;
    session.status = opened.status;
    session.reason = None;

    context.announcer.observe(&session);
    context.registry.upsert(session.clone());
    context.registry.set_active_session(Some(session.id));
    context
        .registry
        .set_active_connection(Some(session.connection_id.clone()));
    session
}

/// Mark the session failed with the cleaned reason.
fn fail(
    context: &mut SessionContext,
    session_id: &SessionId,
    err: &TransportError,
) -> Option<Notice> {
    if err.is_auth_required() {
        debug!("Authentication required: id={}, {}", session_id, err.detail());
    } else {
        warn!("Session open failed: id={}, {}", session_id, err.detail());
    }
    context.registry.set_status(
        session_id,
        SessionStatus::Failed,
        Some(StatusReason::from(err)),
    );
    let session = context.registry.get(session_id)?;
    context.announcer.observe(session)
}

/// Whether an open or retry may still complete for the session.
fn is_pending(context: &SessionContext, session_id: &SessionId) -> bool {
    context.attempting.contains(session_id)
}

/// Synchronous half of a close: cancel, remove, and forget unless a late
/// result could still arrive.
fn detach(context: &mut SessionContext, session_id: &SessionId) -> Option<Session> {
    if !context.registry.contains(session_id) {
        return None;
    }
    let pending = is_pending(context, session_id);

    context.generations.cancel(*session_id);
    let removed = context.registry.remove(session_id);
    if !pending {
        context.generations.forget(session_id);
    }
    context.announcer.forget(session_id);
    removed
}

async fn close_remote(transport: Arc<dyn Transport>, session_id: SessionId) {
    if let Err(e) = transport.close(session_id).await {
        warn!("Best-effort close failed: id={}, error={}", session_id, e);
    }
}

fn ready<T: Clone + Send + 'static>(value: T) -> Shared<BoxFuture<'static, T>> {
    future::ready(value).boxed().shared()
}

fn shared<T: Clone + Send + 'static>(
    handle: JoinHandle<T>,
    fallback: T,
) -> Shared<BoxFuture<'static, T>> {
    async move {
        match handle.await {
            Ok(value) => value,
            Err(e) => {
                error!("Lifecycle task failed: {}", e);
                fallback
            }
        }
    }
    .boxed()
    .shared()
}
