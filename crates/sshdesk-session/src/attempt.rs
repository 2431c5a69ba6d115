//! Two-phase attempts: tentative apply now, commit or revert once the
//! transport answers.

use sshdesk_core::{ConnectionId, Session, SessionId};

use crate::context::SessionContext;
use crate::generation::Staleness;

/// One asynchronous open/retry on a session slot, tagged with the generation
/// it started at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attempt {
    pub session_id: SessionId,
    pub connection_id: ConnectionId,
    pub generation: u64,
}

impl Attempt {
    /// Tentative phase: start a new generation for the slot, store the
    /// optimistic record and focus it.
    ///
    /// The caller must already hold the connect guard for the connection.
    pub fn begin(context: &mut SessionContext, tentative: Session) -> Self {
        let generation = context.generations.next_generation(tentative.id);
        let attempt = Self {
            session_id: tentative.id,
            connection_id: tentative.connection_id.clone(),
            generation,
        };

        context.attempting.insert(attempt.session_id);
        context.announcer.observe(&tentative);
        context.registry.upsert(tentative);
        context
            .registry
            .set_active_connection(Some(attempt.connection_id.clone()));
        context.registry.set_active_session(Some(attempt.session_id));

        attempt
    }

    /// Commit phase: run `apply` only if this attempt still owns its slot.
    pub fn settle<T>(
        &self,
        context: &mut SessionContext,
        apply: impl FnOnce(&mut SessionContext) -> T,
    ) -> Result<T, Staleness> {
        match context
            .generations
            .staleness(&self.session_id, self.generation)
        {
            Some(staleness) => Err(staleness),
            None => Ok(apply(context)),
        }
    }

    /// Release the connect guard and, if the session was removed meanwhile,
    /// drop its generation state.
    pub fn finish(&self, context: &mut SessionContext) {
        context.connecting.end(&self.connection_id);
        context.attempting.remove(&self.session_id);
        if !context.registry.contains(&self.session_id) {
            context.generations.forget(&self.session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshdesk_core::SessionStatus;

    fn placeholder() -> Session {
        Session::connecting(SessionId::new(), ConnectionId::from("prod"), "prod #1")
    }

    #[test]
    fn test_begin_applies_tentative_state() {
        let mut context = SessionContext::default();
        let session = placeholder();
        let attempt = Attempt::begin(&mut context, session.clone());

        assert_eq!(attempt.generation, 1);
        assert!(context.attempting.contains(&session.id));
        assert!(context.registry.contains(&session.id));
        assert_eq!(context.registry.active_session(), Some(session.id));
        assert_eq!(
            context.registry.active_connection(),
            Some(&ConnectionId::from("prod"))
        );
    }

    #[test]
    fn test_settle_runs_when_current() {
        let mut context = SessionContext::default();
        let attempt = Attempt::begin(&mut context, placeholder());

        let applied = attempt.settle(&mut context, |context| {
            context.registry.set_status(&attempt.session_id, SessionStatus::Connected, None);
            42
        });

        assert_eq!(applied, Ok(42));
        assert_eq!(
            context.registry.get(&attempt.session_id).unwrap().status,
            SessionStatus::Connected
        );
    }

    #[test]
    fn test_settle_rejects_cancelled_and_superseded() {
        let mut context = SessionContext::default();
        let session = placeholder();
        let first = Attempt::begin(&mut context, session.clone());
        let second = Attempt::begin(&mut context, session.clone());

        assert_eq!(first.settle(&mut context, |_| ()), Err(Staleness::Superseded));

        context.generations.cancel(session.id);
        assert_eq!(second.settle(&mut context, |_| ()), Err(Staleness::Cancelled));
    }

    #[test]
    fn test_finish_forgets_removed_slot() {
        let mut context = SessionContext::default();
        let session = placeholder();
        context.connecting.begin(&session.connection_id);
        let attempt = Attempt::begin(&mut context, session.clone());

        context.generations.cancel(session.id);
        context.registry.remove(&session.id);
        attempt.finish(&mut context);

        assert!(!context.connecting.contains(&session.connection_id));
        assert!(context.attempting.is_empty());
        assert_eq!(context.generations.tracked(), 0);
    }

    #[test]
    fn test_finish_keeps_live_slot() {
        let mut context = SessionContext::default();
        let session = placeholder();
        context.connecting.begin(&session.connection_id);
        let attempt = Attempt::begin(&mut context, session);

        attempt.finish(&mut context);
        assert_eq!(context.generations.tracked(), 1);
    }
}
