//! Connection directory with an observable, pausable refresh.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use sshdesk_core::{Connection, ConnectionId, Result};

use crate::connections::{ConnectionDirectory, StaticConnections};

/// Static connections plus a refresh counter and gate.
#[derive(Debug)]
pub struct ScriptedDirectory {
    connections: StaticConnections,
    refreshes: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl ScriptedDirectory {
    /// Create a directory whose refreshes complete immediately.
    pub fn new(connections: impl IntoIterator<Item = Connection>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            connections: StaticConnections::new(connections),
            refreshes: AtomicUsize::new(0),
            gate,
        }
    }

    /// Make refreshes block until [`release_refreshes`](Self::release_refreshes).
    pub fn hold_refreshes(&self) {
        self.gate.send_replace(false);
    }

    /// Let blocked and future refreshes complete.
    pub fn release_refreshes(&self) {
        self.gate.send_replace(true);
    }

    /// Number of refreshes started.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionDirectory for ScriptedDirectory {
    fn get(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections.get(connection_id)
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut open = self.gate.subscribe();
        // Sender lives as long as self, so this only fails on teardown.
        let _ = open.wait_for(|open| *open).await;
        Ok(())
    }
}
