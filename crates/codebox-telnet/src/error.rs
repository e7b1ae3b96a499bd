//! Error types for codebox-telnet.

use crate::ConnectionId;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for telnet operations.
pub type Result<T> = std::result::Result<T, TelnetError>;

/// Errors that can occur while talking to a telnet server.
#[derive(Debug, Error)]
pub enum TelnetError {
    /// TCP connection could not be established
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialed
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Operation did not complete in time
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Peer closed the connection
    #[error("connection closed by peer")]
    Closed,

    /// Unknown connection id
    #[error("connection not found: {0}")]
    NotFound(ConnectionId),

    /// Registry is full
    #[error("max telnet connection limit reached ({0})")]
    LimitReached(usize),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
