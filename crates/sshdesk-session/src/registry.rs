//! Session registry: the authoritative in-memory list of sessions plus the
//! UI focus pointers.
//!
//! Pure state container. Every operation on an absent id is a silent no-op.

use sshdesk_core::{ConnectionId, Session, SessionId, SessionStatus, StatusReason};

/// Ordered store of session records and the active session/connection pointers.
#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    active_session: Option<SessionId>,
    active_connection: Option<ConnectionId>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session at the end, or replace an existing one in place.
    pub fn upsert(&mut self, session: Session) {
        match self.position(&session.id) {
            Some(index) => self.sessions[index] = session,
            None => self.sessions.push(session),
        }
    }

    /// Update status and reason of a session.
    pub fn set_status(
        &mut self,
        session_id: &SessionId,
        status: SessionStatus,
        reason: Option<StatusReason>,
    ) {
        if let Some(session) = self.get_mut(session_id) {
            session.status = status;
            session.reason = reason;
        }
    }

    /// Remove a session, reconciling the active pointers.
    pub fn remove(&mut self, session_id: &SessionId) -> Option<Session> {
        let index = self.position(session_id)?;
        let removed = self.sessions.remove(index);
        self.reconcile_active(std::slice::from_ref(&removed));
        Some(removed)
    }

    /// Remove every session owned by a connection, reconciling the active
    /// pointers once.
    pub fn remove_all_for_connection(&mut self, connection_id: &ConnectionId) -> Vec<Session> {
        let (removed, kept): (Vec<Session>, Vec<Session>) = std::mem::take(&mut self.sessions)
            .into_iter()
            .partition(|session| &session.connection_id == connection_id);
        self.sessions = kept;
        if !removed.is_empty() {
            self.reconcile_active(&removed);
        }
        removed
    }

    /// Move `source_id` to immediately before `target_id`.
    pub fn reorder(&mut self, source_id: &SessionId, target_id: &SessionId) {
        if source_id == target_id {
            return;
        }
        let (Some(source), Some(_)) = (self.position(source_id), self.position(target_id)) else {
            return;
        };
        let moved = self.sessions.remove(source);
        // Target index shifts left by one when the source sat before it.
        let target = self.position(target_id).unwrap_or(self.sessions.len());
        self.sessions.insert(target, moved);
    }

    /// Overwrite a session's title.
    pub fn rename(&mut self, session_id: &SessionId, title: impl Into<String>) {
        if let Some(session) = self.get_mut(session_id) {
            session.title = title.into();
        }
    }

    /// Set the active session pointer.
    pub fn set_active_session(&mut self, session_id: Option<SessionId>) {
        self.active_session = session_id;
    }

    /// Set the active connection pointer.
    pub fn set_active_connection(&mut self, connection_id: Option<ConnectionId>) {
        self.active_connection = connection_id;
    }

    /// Active session pointer.
    pub fn active_session(&self) -> Option<SessionId> {
        self.active_session
    }

    /// Active connection pointer.
    pub fn active_connection(&self) -> Option<&ConnectionId> {
        self.active_connection.as_ref()
    }

    /// Look up a session.
    pub fn get(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| &session.id == session_id)
    }

    /// Whether a session id is present.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.position(session_id).is_some()
    }

    /// All sessions in display order.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Ids of every session owned by a connection, in display order.
    pub fn ids_for_connection(&self, connection_id: &ConnectionId) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|session| &session.connection_id == connection_id)
            .map(|session| session.id)
            .collect()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn position(&self, session_id: &SessionId) -> Option<usize> {
        self.sessions
            .iter()
            .position(|session| &session.id == session_id)
    }

    fn get_mut(&mut self, session_id: &SessionId) -> Option<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|session| &session.id == session_id)
    }

    fn reconcile_active(&mut self, removed: &[Session]) {
        if let Some(active) = self.active_session {
            if removed.iter().any(|session| session.id == active) {
                self.active_session = self.sessions.last().map(|session| session.id);
            }
        }

        if let Some(active) = &self.active_connection {
            let touched = removed.iter().any(|session| &session.connection_id == active);
            let remaining = self
                .sessions
                .iter()
                .any(|session| &session.connection_id == active);
            if touched && !remaining {
                self.active_connection = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(connection: &str, title: &str) -> Session {
        Session::connecting(SessionId::new(), ConnectionId::from(connection), title)
    }

    fn titles(registry: &SessionRegistry) -> Vec<&str> {
        registry.sessions().iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn test_upsert_appends_and_replaces_in_place() {
        let mut registry = SessionRegistry::new();
        let a = session("c1", "a");
        let b = session("c1", "b");
        registry.upsert(a.clone());
        registry.upsert(b);

        let mut renamed = a.clone();
        renamed.title = "a2".to_string();
        registry.upsert(renamed);

        assert_eq!(titles(&registry), vec!["a2", "b"]);
    }

    #[test]
    fn test_set_status_updates_status_and_reason() {
        let mut registry = SessionRegistry::new();
        let s = session("c1", "a");
        registry.upsert(s.clone());

        registry.set_status(
            &s.id,
            SessionStatus::Failed,
            Some(StatusReason::Message("refused".to_string())),
        );
        let stored = registry.get(&s.id).unwrap();
        assert_eq!(stored.status, SessionStatus::Failed);
        assert_eq!(stored.reason.as_ref().unwrap().text(), "refused");
        assert_eq!(stored.title, "a");
    }

    #[test]
    fn test_absent_ids_are_noops() {
        let mut registry = SessionRegistry::new();
        let ghost = SessionId::new();
        registry.set_status(&ghost, SessionStatus::Connected, None);
        registry.rename(&ghost, "x");
        registry.reorder(&ghost, &SessionId::new());
        assert!(registry.remove(&ghost).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_active_falls_back_to_last() {
        let mut registry = SessionRegistry::new();
        let a = session("c1", "a");
        let b = session("c2", "b");
        let c = session("c2", "c");
        registry.upsert(a.clone());
        registry.upsert(b.clone());
        registry.upsert(c.clone());
        registry.set_active_session(Some(c.id));
        registry.set_active_connection(Some(c.connection_id.clone()));

        registry.remove(&c.id);

        assert_eq!(registry.active_session(), Some(b.id));
        // b still belongs to c2
        assert_eq!(registry.active_connection(), Some(&ConnectionId::from("c2")));
    }

    #[test]
    fn test_remove_last_of_connection_clears_active_connection() {
        let mut registry = SessionRegistry::new();
        let a = session("c1", "a");
        let b = session("c2", "b");
        registry.upsert(a.clone());
        registry.upsert(b.clone());
        registry.set_active_session(Some(b.id));
        registry.set_active_connection(Some(b.connection_id.clone()));

        registry.remove(&b.id);

        assert_eq!(registry.active_session(), Some(a.id));
        assert_eq!(registry.active_connection(), None);
    }

    #[test]
    fn test_remove_inactive_keeps_pointers() {
        let mut registry = SessionRegistry::new();
        let a = session("c1", "a");
        let b = session("c2", "b");
        registry.upsert(a.clone());
        registry.upsert(b.clone());
        registry.set_active_session(Some(a.id));
        registry.set_active_connection(Some(a.connection_id.clone()));

        registry.remove(&b.id);

        assert_eq!(registry.active_session(), Some(a.id));
        assert_eq!(registry.active_connection(), Some(&ConnectionId::from("c1")));
    }

    #[test]
    fn test_remove_all_for_connection() {
        let mut registry = SessionRegistry::new();
        let a = session("c1", "a");
        let b = session("c2", "b");
        let c = session("c2", "c");
        registry.upsert(a.clone());
        registry.upsert(b.clone());
        registry.upsert(c.clone());
        registry.set_active_session(Some(b.id));
        registry.set_active_connection(Some(ConnectionId::from("c2")));

        let removed = registry.remove_all_for_connection(&ConnectionId::from("c2"));

        assert_eq!(removed.len(), 2);
        assert_eq!(titles(&registry), vec!["a"]);
        assert_eq!(registry.active_session(), Some(a.id));
        assert_eq!(registry.active_connection(), None);
    }

    #[test]
    fn test_remove_everything_clears_active_session() {
        let mut registry = SessionRegistry::new();
        let a = session("c1", "a");
        registry.upsert(a.clone());
        registry.set_active_session(Some(a.id));

        registry.remove(&a.id);
        assert_eq!(registry.active_session(), None);
    }

    #[test]
    fn test_reorder_moves_before_target() {
        let mut registry = SessionRegistry::new();
        let a = session("c1", "a");
        let b = session("c1", "b");
        let c = session("c1", "c");
        let d = session("c1", "d");
        for s in [&a, &b, &c, &d] {
            registry.upsert(s.clone());
        }

        registry.reorder(&d.id, &b.id);
        assert_eq!(titles(&registry), vec!["a", "d", "b", "c"]);

        registry.reorder(&a.id, &c.id);
        assert_eq!(titles(&registry), vec!["d", "b", "a", "c"]);

        registry.reorder(&c.id, &c.id);
        assert_eq!(titles(&registry), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_rename() {
        let mut registry = SessionRegistry::new();
        let a = session("c1", "a");
        registry.upsert(a.clone());
        registry.rename(&a.id, "renamed");
        assert_eq!(registry.get(&a.id).unwrap().title, "renamed");
    }
}
