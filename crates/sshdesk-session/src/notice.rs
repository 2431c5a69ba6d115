//! User-visible notices (toasts) and their de-duplication.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use sshdesk_core::{Session, SessionId, SessionStatus};

use crate::registry::SessionRegistry;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational (remote disconnect)
    Info,
    /// Failure the user should see
    Error,
}

/// A one-time user-facing message about a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Session the notice is about
    pub session_id: SessionId,
    /// Session title at the time of the notice
    pub title: String,
    /// Status that triggered it
    pub status: SessionStatus,
    /// Severity
    pub level: NoticeLevel,
    /// Message text
    pub message: String,
}

/// Sink for user-visible notices.
pub trait Notifier: Send + Sync {
    /// Deliver a notice.
    fn notify(&self, notice: Notice);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => warn!(
                "Session notice: id={}, title='{}', {}",
                notice.session_id, notice.title, notice.message
            ),
            NoticeLevel::Info => info!(
                "Session notice: id={}, title='{}', {}",
                notice.session_id, notice.title, notice.message
            ),
        }
    }
}

/// Notifier that forwards notices over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(notice);
    }
}

/// Tracks the last announced `{status, reason}` per session so repeated
/// identical transitions produce a single notice.
#[derive(Debug, Default)]
pub struct Announcer {
    last: HashMap<SessionId, String>,
}

impl Announcer {
    /// Create an empty announcer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the session's current state; returns a notice if this is a new
    /// user-visible transition.
    ///
    /// Auth-required failures are an expected interactive flow and never
    /// produce a notice.
    pub fn observe(&mut self, session: &Session) -> Option<Notice> {
        let key = announce_key(session);
        if self.last.get(&session.id) == Some(&key) {
            return None;
        }
        self.last.insert(session.id, key);

        let reason = session.reason.as_ref().map(|reason| reason.text().to_string());
        let (level, message) = match session.status {
            SessionStatus::Failed if !session.auth_required() => (
                NoticeLevel::Error,
                reason.unwrap_or_else(|| "connection failed".to_string()),
            ),
            SessionStatus::Disconnected => (
                NoticeLevel::Info,
                match reason {
                    Some(reason) => format!("disconnected: {reason}"),
                    None => "disconnected".to_string(),
                },
            ),
            _ => return None,
        };

        Some(Notice {
            session_id: session.id,
            title: session.title.clone(),
            status: session.status,
            level,
            message,
        })
    }

    /// Drop the entry for a session.
    pub fn forget(&mut self, session_id: &SessionId) {
        self.last.remove(session_id);
    }

    /// Drop entries for sessions no longer in the registry.
    pub fn prune(&mut self, registry: &SessionRegistry) {
        self.last.retain(|session_id, _| registry.contains(session_id));
    }

    /// Number of tracked sessions.
    pub fn tracked(&self) -> usize {
        self.last.len()
    }
}

fn announce_key(session: &Session) -> String {
    match &session.reason {
        Some(reason) if reason.is_auth_required() => {
            format!("{}|auth|{}", session.status, reason.text())
        }
        Some(reason) => format!("{}|msg|{}", session.status, reason.text()),
        None => format!("{}|", session.status),
    }
}
