//! Status event bridge: applies transport status pushes to the registry.
//!
//! Remote sessions can fail or disconnect at any time (TCP reset, server
//! reboot), independently of any local call. The bridge subscribes once to the
//! transport's push stream and reconciles each event.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use sshdesk_core::StatusReason;

use crate::context::SessionContext;
use crate::controller::SessionController;
use crate::notice::Notice;
use crate::transport::StatusEvent;

/// What happened to a pushed status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Status stored in the registry
    Applied,
    /// Session id not in the registry
    UnknownSession,
    /// A close raced ahead of the event
    Cancelled,
}

/// Apply one event to the lifecycle state, returning a notice for new
/// user-visible transitions.
pub(crate) fn reconcile(
    context: &mut SessionContext,
    event: &StatusEvent,
) -> (EventDisposition, Option<Notice>) {
    context.announcer.prune(&context.registry);

    if !context.registry.contains(&event.session_id) {
        debug!("Ignoring status for unknown session: id={}", event.session_id);
        return (EventDisposition::UnknownSession, None);
    }
    if context.generations.is_cancelled(&event.session_id) {
        debug!("Ignoring status for cancelled session: id={}", event.session_id);
        return (EventDisposition::Cancelled, None);
    }

    let reason = event.reason.as_deref().map(StatusReason::from_message);
    context
        .registry
        .set_status(&event.session_id, event.status, reason);

    let notice = context
        .registry
        .get(&event.session_id)
        .and_then(|session| context.announcer.observe(session));
    (EventDisposition::Applied, notice)
}

/// Running subscription to the transport's status stream.
///
/// Dropping the bridge unsubscribes.
#[derive(Debug)]
pub struct StatusBridge {
    task: JoinHandle<()>,
}

impl StatusBridge {
    /// Subscribe to the controller's transport and start reconciling events.
    ///
    /// The subscription is taken before this returns, so events pushed
    /// afterwards are never missed.
    pub fn spawn(controller: &SessionController) -> Self {
        let mut events = controller.transport().subscribe_status();
        let controller = controller.clone();

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        controller.handle_status_event(&event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Status bridge lagged, skipped {} event(s)", skipped);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Status stream closed");
                        break;
                    }
                }
            }
        });

        Self { task }
    }

    /// Whether the subscription is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for StatusBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::Attempt;
    use sshdesk_core::{ConnectionId, Session, SessionId, SessionStatus};

    fn context_with_session() -> (SessionContext, SessionId) {
        let mut context = SessionContext::default();
        let session = Session::connecting(SessionId::new(), ConnectionId::from("prod"), "prod #1");
        let id = session.id;
        Attempt::begin(&mut context, session);
        (context, id)
    }

    #[test]
    fn test_unknown_session_ignored() {
        let mut context = SessionContext::default();
        let event = StatusEvent::new(SessionId::new(), SessionStatus::Failed, None);
        let (disposition, notice) = reconcile(&mut context, &event);
        assert_eq!(disposition, EventDisposition::UnknownSession);
        assert!(notice.is_none());
    }

    #[test]
    fn test_cancelled_session_ignored() {
        let (mut context, id) = context_with_session();
        context.generations.cancel(id);

        let event = StatusEvent::new(id, SessionStatus::Connected, None);
        let (disposition, _) = reconcile(&mut context, &event);

        assert_eq!(disposition, EventDisposition::Cancelled);
        assert_eq!(
            context.registry.get(&id).unwrap().status,
            SessionStatus::Connecting
        );
    }

    #[test]
    fn test_auth_marker_stripped_without_notice() {
        let (mut context, id) = context_with_session();
        let event = StatusEvent::new(
            id,
            SessionStatus::Failed,
            Some("AUTH_REQUIRED:Password for root@10.0.0.1".to_string()),
        );

        let (disposition, notice) = reconcile(&mut context, &event);

        assert_eq!(disposition, EventDisposition::Applied);
        assert!(notice.is_none());
        let session = context.registry.get(&id).unwrap();
        assert!(session.auth_required());
        assert_eq!(
            session.reason.as_ref().unwrap().text(),
            "Password for root@10.0.0.1"
        );
    }

    #[test]
    fn test_repeated_event_notifies_once() {
        let (mut context, id) = context_with_session();
        let event = StatusEvent::new(
            id,
            SessionStatus::Disconnected,
            Some("connection reset by peer".to_string()),
        );

        let (_, first) = reconcile(&mut context, &event);
        let (_, second) = reconcile(&mut context, &event);

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_prunes_announcements_for_removed_sessions() {
        let (mut context, id) = context_with_session();
        let event = StatusEvent::new(id, SessionStatus::Failed, Some("boom".to_string()));
        reconcile(&mut context, &event);
        assert_eq!(context.announcer.tracked(), 1);

        context.registry.remove(&id);
        reconcile(
            &mut context,
            &StatusEvent::new(SessionId::new(), SessionStatus::Failed, None),
        );
        assert_eq!(context.announcer.tracked(), 0);
    }
}
