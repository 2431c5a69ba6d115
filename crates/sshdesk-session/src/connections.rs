//! Read access to saved connections.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use sshdesk_core::{Connection, ConnectionId, Result};

/// Connection lookup owned by the connection-management subsystem.
#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
    /// Look up a connection by id.
    fn get(&self, connection_id: &ConnectionId) -> Option<Connection>;

    /// Reload the connection list. A successful connect can reveal metadata
    /// changes (host keys, resolved names), so the controller calls this after
    /// each open.
    async fn refresh(&self) -> Result<()>;
}

/// In-memory directory, typically filled from the YAML config.
#[derive(Debug, Default)]
pub struct StaticConnections {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl StaticConnections {
    /// Create a directory holding `connections`.
    pub fn new(connections: impl IntoIterator<Item = Connection>) -> Self {
        let connections = connections
            .into_iter()
            .map(|connection| (connection.id.clone(), connection))
            .collect();
        Self {
            connections: RwLock::new(connections),
        }
    }

    /// Add or replace a connection.
    pub fn insert(&self, connection: Connection) {
        self.connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Remove a connection.
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections.write().remove(connection_id)
    }

    /// All connection ids, sorted.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ConnectionDirectory for StaticConnections {
    fn get(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections.read().get(connection_id).cloned()
    }

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}
