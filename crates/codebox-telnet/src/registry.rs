//! Registry of open telnet connections.

use crate::client::{CommandOptions, TelnetClient, DEFAULT_QUIET_PERIOD};
use crate::error::{Result, TelnetError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// How long to wait for a login banner after connecting.
const BANNER_TIMEOUT: Duration = Duration::from_secs(3);

/// Unique identifier for a telnet connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new random connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a connection ID from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public description of an open connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub host: String,
    pub port: u16,
    pub connected_at: DateTime<Utc>,
    pub commands_sent: u64,
}

struct Connection {
    host: String,
    port: u16,
    connected_at: DateTime<Utc>,
    commands_sent: AtomicU64,
    /// Serialises commands so two exchanges never interleave on the wire.
    client: Mutex<TelnetClient>,
}

impl Connection {
    fn info(&self, id: ConnectionId) -> ConnectionInfo {
        ConnectionInfo {
            connection_id: id.to_string(),
            host: self.host.clone(),
            port: self.port,
            connected_at: self.connected_at,
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
        }
    }
}

/// Manages multiple telnet connections.
///
/// Safe to share across tasks. The registry lock is only held to look up or
/// insert entries, never across network I/O.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    /// Maximum number of open connections (0 = unlimited).
    max_connections: usize,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    async fn check_limit(&self) -> Result<()> {
        if self.max_connections > 0 && self.connections.read().await.len() >= self.max_connections {
            return Err(TelnetError::LimitReached(self.max_connections));
        }
        Ok(())
    }

    /// Open a connection and return its ID with the initial banner.
    ///
    /// The banner is whatever the server sends before going quiet; servers
    /// that wait for input produce an empty banner.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<(ConnectionId, String)> {
        self.check_limit().await?;

        let mut client = TelnetClient::connect(host, port, connect_timeout).await?;
        let banner = match client
            .read_available(DEFAULT_QUIET_PERIOD, BANNER_TIMEOUT)
            .await
        {
            Ok(text) => text,
            Err(TelnetError::Closed) => return Err(TelnetError::Closed),
            Err(e) => {
                tracing::debug!(error = %e, "No banner received");
                String::new()
            }
        };

        let id = ConnectionId::new();
        let connection = Arc::new(Connection {
            host: host.to_string(),
            port,
            connected_at: Utc::now(),
            commands_sent: AtomicU64::new(0),
            client: Mutex::new(client),
        });

        {
            let mut connections = self.connections.write().await;
            // Re-check under the write lock; the connect above ran unlocked.
            if self.max_connections > 0 && connections.len() >= self.max_connections {
                drop(connections);
                if let Err(e) = connection.client.lock().await.close().await {
                    tracing::warn!(connection_id = %id, error = %e, "Error while closing telnet connection");
                }
                return Err(TelnetError::LimitReached(self.max_connections));
            }
            connections.insert(id, connection);
        }

        tracing::info!(connection_id = %id, host = %host, port, "Telnet connection registered");
        Ok((id, banner))
    }

    async fn get(&self, id: ConnectionId) -> Result<Arc<Connection>> {
        self.connections
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(TelnetError::NotFound(id))
    }

    /// Send a command on a connection and return its output.
    ///
    /// A connection found closed by the peer is removed from the registry.
    pub async fn send_command(
        &self,
        id: ConnectionId,
        command: &str,
        opts: CommandOptions,
    ) -> Result<String> {
        let connection = self.get(id).await?;
        let result = {
            let mut client = connection.client.lock().await;
            let result = client.send_command(command, &opts).await;
            if client.is_closed() {
                drop(client);
                self.connections.write().await.remove(&id);
                tracing::info!(connection_id = %id, "Telnet connection closed by peer, removed");
            }
            result
        };
        connection.commands_sent.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Close and forget a connection.
    pub async fn disconnect(&self, id: ConnectionId) -> Result<()> {
        let connection = self
            .connections
            .write()
            .await
            .remove(&id)
            .ok_or(TelnetError::NotFound(id))?;

        if let Err(e) = connection.client.lock().await.close().await {
            tracing::warn!(connection_id = %id, error = %e, "Error while closing telnet connection");
        }
        tracing::info!(connection_id = %id, "Telnet connection closed");
        Ok(())
    }

    /// Close every connection. Returns how many were open.
    pub async fn disconnect_all(&self) -> usize {
        let connections = std::mem::take(&mut *self.connections.write().await);
        let count = connections.len();

        for (id, connection) in connections {
            if let Err(e) = connection.client.lock().await.close().await {
                tracing::warn!(connection_id = %id, error = %e, "Error while closing telnet connection");
            }
        }

        tracing::info!(count, "All telnet connections closed");
        count
    }

    /// Describe all open connections, oldest first.
    pub async fn list(&self) -> Vec<ConnectionInfo> {
        let connections = self.connections.read().await;
        let mut infos: Vec<ConnectionInfo> = connections
            .iter()
            .map(|(id, connection)| connection.info(*id))
            .collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }

    /// Number of open connections.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_parse() {
        let id = ConnectionId::new();
        assert_eq!(ConnectionId::parse(&id.to_string()), Some(id));
        assert_eq!(ConnectionId::parse("not-a-uuid"), None);
    }

    #[tokio::test]
    async fn test_registry_empty() {
        let registry = ConnectionRegistry::new(4);
        assert_eq!(registry.count().await, 0);
        assert!(registry.list().await.is_empty());
        assert_eq!(registry.disconnect_all().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        let registry = ConnectionRegistry::new(4);
        let id = ConnectionId::new();
        assert!(matches!(
            registry.disconnect(id).await,
            Err(TelnetError::NotFound(_))
        ));
        assert!(matches!(
            registry
                .send_command(id, "ls", CommandOptions::default())
                .await,
            Err(TelnetError::NotFound(_))
        ));
    }
}
