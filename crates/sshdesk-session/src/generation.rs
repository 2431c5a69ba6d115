//! Generation tracking for asynchronous session attempts.
//!
//! Every open or auth retry captures the generation it started with. Before
//! applying its result it checks that the generation is still current; a close
//! or a newer attempt bumps the counter and so invalidates older results.

use std::collections::{HashMap, HashSet};

use sshdesk_core::SessionId;

/// Why a captured generation no longer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// The slot was cancelled (session closed) after the attempt started
    Cancelled,
    /// A newer attempt started on the same slot
    Superseded,
}

/// Per-session monotonic counters plus the set of cancelled slots.
#[derive(Debug, Default)]
pub struct GenerationTracker {
    generations: HashMap<SessionId, u64>,
    cancelled: HashSet<SessionId>,
}

impl GenerationTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new attempt: bump and return the generation, un-cancelling the slot.
    pub fn next_generation(&mut self, session_id: SessionId) -> u64 {
        self.cancelled.remove(&session_id);
        self.bump(session_id)
    }

    /// Invalidate whatever attempt is in flight and mark the slot cancelled.
    pub fn cancel(&mut self, session_id: SessionId) {
        self.bump(session_id);
        self.cancelled.insert(session_id);
    }

    /// Whether a result captured at `generation` may still be applied.
    pub fn is_current(&self, session_id: &SessionId, generation: u64) -> bool {
        self.staleness(session_id, generation).is_none()
    }

    /// `None` when current, otherwise why the generation is stale.
    pub fn staleness(&self, session_id: &SessionId, generation: u64) -> Option<Staleness> {
        if self.cancelled.contains(session_id) {
            Some(Staleness::Cancelled)
        } else if self.current(session_id) != generation {
            Some(Staleness::Superseded)
        } else {
            None
        }
    }

    /// Latest generation for a slot; untracked slots are at generation 0.
    pub fn current(&self, session_id: &SessionId) -> u64 {
        self.generations.get(session_id).copied().unwrap_or(0)
    }

    /// Whether the slot's latest bump was a cancellation.
    pub fn is_cancelled(&self, session_id: &SessionId) -> bool {
        self.cancelled.contains(session_id)
    }

    /// Drop all state for a slot that has been fully torn down.
    pub fn forget(&mut self, session_id: &SessionId) {
        self.generations.remove(session_id);
        self.cancelled.remove(session_id);
    }

    /// Number of slots with tracked state.
    pub fn tracked(&self) -> usize {
        self.generations.len()
    }

    fn bump(&mut self, session_id: SessionId) -> u64 {
        let generation = self.generations.entry(session_id).or_insert(0);
        *generation += 1;
        *generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_slot_is_generation_zero() {
        let tracker = GenerationTracker::new();
        let id = SessionId::new();
        assert_eq!(tracker.current(&id), 0);
        assert!(tracker.is_current(&id, 0));
        assert!(!tracker.is_current(&id, 1));
    }

    #[test]
    fn test_next_generation_is_monotonic() {
        let mut tracker = GenerationTracker::new();
        let id = SessionId::new();
        assert_eq!(tracker.next_generation(id), 1);
        assert_eq!(tracker.next_generation(id), 2);
        assert!(tracker.is_current(&id, 2));
        assert_eq!(tracker.staleness(&id, 1), Some(Staleness::Superseded));
    }

    #[test]
    fn test_cancel_invalidates_in_flight_attempt() {
        let mut tracker = GenerationTracker::new();
        let id = SessionId::new();
        let generation = tracker.next_generation(id);

        tracker.cancel(id);

        assert!(!tracker.is_current(&id, generation));
        assert_eq!(tracker.staleness(&id, generation), Some(Staleness::Cancelled));
        // Even the bumped generation is not current while cancelled.
        assert!(!tracker.is_current(&id, tracker.current(&id)));
    }

    #[test]
    fn test_new_attempt_clears_cancellation() {
        let mut tracker = GenerationTracker::new();
        let id = SessionId::new();
        tracker.next_generation(id);
        tracker.cancel(id);

        let generation = tracker.next_generation(id);
        assert_eq!(generation, 3);
        assert!(!tracker.is_cancelled(&id));
        assert!(tracker.is_current(&id, generation));
    }

    #[test]
    fn test_forget_drops_state() {
        let mut tracker = GenerationTracker::new();
        let id = SessionId::new();
        tracker.next_generation(id);
        tracker.cancel(id);
        assert_eq!(tracker.tracked(), 1);

        tracker.forget(&id);
        assert_eq!(tracker.tracked(), 0);
        assert!(!tracker.is_cancelled(&id));
        assert_eq!(tracker.current(&id), 0);
    }

    #[test]
    fn test_slots_are_independent() {
        let mut tracker = GenerationTracker::new();
        let a = SessionId::new();
        let b = SessionId::new();
        let ga = tracker.next_generation(a);
        let gb = tracker.next_generation(b);
        tracker.cancel(a);
        assert!(!tracker.is_current(&a, ga));
        assert!(tracker.is_current(&b, gb));
    }
}
