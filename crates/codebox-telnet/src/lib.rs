//! # codebox-telnet
//!
//! Telnet client layer for the codebox MCP server.
//!
//! The crate is split into three layers:
//!
//! - [`protocol`]: RFC 854 constants, a streaming IAC parser and the
//!   option negotiation policy (accept server echo / suppress-go-ahead,
//!   refuse everything else).
//! - [`TelnetClient`]: an async client over any `AsyncRead + AsyncWrite`
//!   stream (TCP in production, mock IO in tests).
//! - [`ConnectionRegistry`]: named, shareable connections used by the MCP
//!   tools (`connect`, `send_command`, `disconnect`, `list_connections`).
//!
//! ## Quick Start
//!
//! ```ignore
//! use codebox_telnet::{CommandOptions, ConnectionRegistry};
//! use std::time::Duration;
//!
//! # async fn example() -> codebox_telnet::Result<()> {
//! let registry = ConnectionRegistry::new(8);
//! let (id, banner) = registry
//!     .connect("towel.blinkenlights.nl", 23, Duration::from_secs(5))
//!     .await?;
//! println!("{banner}");
//!
//! let output = registry
//!     .send_command(id, "help", CommandOptions::default())
//!     .await?;
//! println!("{output}");
//!
//! registry.disconnect(id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! There is no terminal emulation: bytes in, text out.

mod client;
mod error;
pub mod protocol;
mod registry;

pub use client::{CommandOptions, TelnetClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_QUIET_PERIOD};
pub use error::{Result, TelnetError};
pub use registry::{ConnectionId, ConnectionInfo, ConnectionRegistry};
