//! Sandbox administration tools.

use crate::server::{CodeboxServer, ToolArgs};
use crate::types::*;
use codebox_core::SessionId;
use rmcp::model::CallToolResult;

impl CodeboxServer {
    pub(crate) async fn handle_create_sandbox(&self, args: ToolArgs) -> CallToolResult {
        let params: CreateSandboxParams = match Self::parse_optional_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let requested = match params.session_id.as_deref().map(SessionId::parse).transpose() {
            Ok(id) => id,
            Err(e) => return Self::error_result(e.to_string()),
        };

        tracing::info!(session_id = ?requested, "Creating sandbox");

        match self.manager.create(requested).await {
            Ok(id) => Self::json_result(&CreateSandboxResult {
                session_id: id.to_string(),
                interpreter: self.manager.config().interpreter.kind.to_string(),
                message: format!("Sandbox created with session ID: {id}"),
            }),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create sandbox");
                Self::error_result(format!("Failed to create sandbox: {e}"))
            }
        }
    }

    pub(crate) async fn handle_close_sandbox(&self, args: ToolArgs) -> CallToolResult {
        let params: CloseSandboxParams = match Self::parse_params(args, "session_id") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        match self.manager.close(sandbox.id()).await {
            Ok(()) => {
                tracing::info!(session_id = %params.session_id, "Closed sandbox");
                Self::json_result(&CloseSandboxResult {
                    session_id: params.session_id,
                    message: "Sandbox closed successfully".into(),
                })
            }
            Err(e) => {
                tracing::error!(session_id = %params.session_id, error = %e, "Failed to close sandbox");
                Self::error_result(format!("Failed to close sandbox: {e}"))
            }
        }
    }

    pub(crate) async fn handle_get_sandbox_status(&self, args: ToolArgs) -> CallToolResult {
        let params: SandboxStatusParams = match Self::parse_optional_params(args) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match params.session_id {
            Some(session_id) => {
                let sandbox = match self.sandbox(&session_id).await {
                    Ok(s) => s,
                    Err(e) => return e,
                };
                Self::json_result(&sandbox.summary().await)
            }
            None => {
                let sandboxes = self.manager.list().await;
                Self::json_result(&SandboxListResult {
                    count: sandboxes.len(),
                    sandboxes,
                })
            }
        }
    }
}
