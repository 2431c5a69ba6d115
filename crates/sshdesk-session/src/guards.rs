//! Concurrency guards: the per-connection connect guard and the in-flight
//! coalescing maps.
//!
//! The guard decides whether a new flow may start at all; the in-flight maps
//! let a duplicate request join the flow that is already running.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use sshdesk_core::ConnectionId;

/// Set of connections with a connect (open or auth retry) in flight.
#[derive(Debug, Default)]
pub struct ConnectGuard {
    connecting: BTreeSet<ConnectionId>,
}

impl ConnectGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the connection. Returns `false` if it is already claimed.
    pub fn begin(&mut self, connection_id: &ConnectionId) -> bool {
        self.connecting.insert(connection_id.clone())
    }

    /// Release the connection.
    pub fn end(&mut self, connection_id: &ConnectionId) {
        self.connecting.remove(connection_id);
    }

    /// Whether a connect is in flight for the connection.
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connecting.contains(connection_id)
    }

    /// Connections currently connecting, sorted.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connecting.iter().cloned().collect()
    }
}

/// Map from key to the shared result of the operation running for it.
#[derive(Debug)]
pub struct InFlight<K, F> {
    pending: HashMap<K, F>,
}

impl<K, F> Default for InFlight<K, F> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, F: Clone> InFlight<K, F> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the operation running for `key`, if any.
    pub fn get(&self, key: &K) -> Option<F> {
        self.pending.get(key).cloned()
    }

    /// Register the operation running for `key`.
    pub fn insert(&mut self, key: K, pending: F) {
        self.pending.insert(key, pending);
    }

    /// Drop the entry once the operation has settled.
    pub fn remove(&mut self, key: &K) {
        self.pending.remove(key);
    }

    /// Whether an operation is running for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of running operations.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is running.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
