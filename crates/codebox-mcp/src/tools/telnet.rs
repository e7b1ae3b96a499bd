//! Telnet tools. Connections are made from the server host, not from a sandbox.

use crate::config::MAX_COMMAND_LENGTH;
use crate::server::{CodeboxServer, ToolArgs};
use crate::types::*;
use codebox_telnet::{CommandOptions, ConnectionId, DEFAULT_CONNECT_TIMEOUT};
use rmcp::model::CallToolResult;
use std::time::Duration;

/// Upper bound for caller-supplied timeouts.
const MAX_TIMEOUT_SECS: u64 = 600;

fn timeout_from(secs: Option<u64>, default: Duration) -> Duration {
    match secs {
        Some(0) | None => default,
        Some(s) => Duration::from_secs(s.min(MAX_TIMEOUT_SECS)),
    }
}

fn parse_connection_id(id: &str) -> Result<ConnectionId, CallToolResult> {
    ConnectionId::parse(id)
        .ok_or_else(|| CodeboxServer::error_result(format!("No connection found with ID: {id}")))
}

impl CodeboxServer {
    pub(crate) async fn handle_telnet_connect(&self, args: ToolArgs) -> CallToolResult {
        let params: TelnetConnectParams = match Self::parse_params(args, "host") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let host = params.host.trim();
        if host.is_empty() {
            return Self::error_result("host must not be empty");
        }
        let timeout = timeout_from(params.timeout_secs, DEFAULT_CONNECT_TIMEOUT);

        tracing::info!(host = %host, port = params.port, "Opening telnet connection");

        match self.telnet.connect(host, params.port, timeout).await {
            Ok((id, banner)) => Self::json_result(&TelnetConnectResult {
                connection_id: id.to_string(),
                host: host.to_string(),
                port: params.port,
                banner,
            }),
            Err(e) => {
                tracing::warn!(host = %host, port = params.port, error = %e, "Telnet connect failed");
                Self::error_result(format!("Failed to connect to {host}:{}: {e}", params.port))
            }
        }
    }

    pub(crate) async fn handle_telnet_send_command(&self, args: ToolArgs) -> CallToolResult {
        let params: TelnetCommandParams =
            match Self::parse_params(args, "connection_id, command") {
                Ok(p) => p,
                Err(e) => return e,
            };

        if let Err(e) = Self::validate_size(&params.command, MAX_COMMAND_LENGTH, "command") {
            return e;
        }

        let id = match parse_connection_id(&params.connection_id) {
            Ok(id) => id,
            Err(e) => return e,
        };

        let defaults = CommandOptions::default();
        let opts = CommandOptions {
            expect: params.expect.filter(|e| !e.is_empty()),
            timeout: timeout_from(params.timeout_secs, defaults.timeout),
            quiet: defaults.quiet,
        };

        tracing::info!(
            connection_id = %id,
            command = %Self::truncate_for_log(&params.command, 100),
            "Sending telnet command"
        );

        match self.telnet.send_command(id, &params.command, opts).await {
            Ok(output) => Self::json_result(&TelnetCommandResult {
                connection_id: params.connection_id,
                output,
            }),
            Err(e) => Self::error_result(format!("Error sending command: {e}")),
        }
    }

    pub(crate) async fn handle_telnet_disconnect(&self, args: ToolArgs) -> CallToolResult {
        let params: TelnetDisconnectParams = match Self::parse_params(args, "connection_id") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let id = match parse_connection_id(&params.connection_id) {
            Ok(id) => id,
            Err(e) => return e,
        };

        match self.telnet.disconnect(id).await {
            Ok(()) => Self::json_result(&serde_json::json!({
                "connection_id": params.connection_id,
                "message": "Disconnected",
            })),
            Err(e) => Self::error_result(format!("Error disconnecting: {e}")),
        }
    }

    pub(crate) async fn handle_telnet_list_connections(&self) -> CallToolResult {
        let connections = self.telnet.list().await;
        Self::json_result(&TelnetListResult {
            count: connections.len(),
            connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_from() {
        let default = Duration::from_secs(10);
        assert_eq!(timeout_from(None, default), default);
        assert_eq!(timeout_from(Some(0), default), default);
        assert_eq!(timeout_from(Some(3), default), Duration::from_secs(3));
        assert_eq!(
            timeout_from(Some(u64::MAX), default),
            Duration::from_secs(MAX_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_bad_connection_id() {
        assert!(parse_connection_id("not-a-uuid").is_err());
        assert!(parse_connection_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
    }
}
