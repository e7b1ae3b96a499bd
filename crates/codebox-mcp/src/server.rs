//! CodeboxServer - MCP server that exposes sandboxes and telnet as tools.
//!
//! This module implements `ServerHandler` manually: the tool list is built
//! from schemars schemas and calls are dispatched by name to the handlers
//! in [`crate::tools`].

use crate::config::CodeboxConfig;
use crate::types::*;

use codebox_core::{ManagerConfig, Sandbox, SandboxManager, SessionId};
use codebox_telnet::ConnectionRegistry;
use rmcp::{
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData,
};
use schemars::schema_for;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Raw tool arguments as received from the client.
pub(crate) type ToolArgs = Option<serde_json::Map<String, serde_json::Value>>;

/// MCP server for codebox sandbox and telnet operations.
#[derive(Clone)]
pub struct CodeboxServer {
    /// Sandboxes by session
    pub(crate) manager: Arc<SandboxManager>,

    /// Open telnet connections
    pub(crate) telnet: Arc<ConnectionRegistry>,

    /// Configuration
    config: CodeboxConfig,
}

impl CodeboxServer {
    /// Create a new CodeboxServer with the given configuration.
    pub fn new(config: CodeboxConfig) -> Self {
        let manager_config = ManagerConfig::new(config.interpreter_config())
            .with_max_sandboxes(config.max_sandboxes);

        Self {
            manager: Arc::new(SandboxManager::new(manager_config)),
            telnet: Arc::new(ConnectionRegistry::new(config.max_telnet_connections)),
            config,
        }
    }

    /// Get a reference to the sandbox manager.
    pub fn manager(&self) -> &SandboxManager {
        &self.manager
    }

    /// Get a reference to the telnet connection registry.
    pub fn telnet(&self) -> &ConnectionRegistry {
        &self.telnet
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &CodeboxConfig {
        &self.config
    }

    /// Close every sandbox and drop every telnet connection.
    pub async fn shutdown(&self) {
        let sandboxes = self.manager.close_all().await;
        let connections = self.telnet.disconnect_all().await;
        tracing::info!(sandboxes, connections, "Released all sessions");
    }

    /// Look up the sandbox of a session.
    ///
    /// Malformed ids cannot name a sandbox, so they get the same message
    /// as unknown ones.
    pub(crate) async fn sandbox(&self, session_id: &str) -> Result<Arc<Sandbox>, CallToolResult> {
        let not_found = || {
            Self::error_result(format!(
                "No sandbox found with session ID: {session_id}. Create a sandbox first."
            ))
        };
        let id = SessionId::parse(session_id).map_err(|_| not_found())?;
        self.manager.get(&id).await.map_err(|_| not_found())
    }

    /// Deserialize tool arguments, naming the required fields on failure.
    pub(crate) fn parse_params<T: DeserializeOwned>(
        args: ToolArgs,
        required: &str,
    ) -> Result<T, CallToolResult> {
        match args
            .map(|a| serde_json::from_value(serde_json::Value::Object(a)))
            .transpose()
        {
            Ok(Some(p)) => Ok(p),
            Ok(None) => Err(Self::error_result(format!(
                "Missing required parameters: {required}"
            ))),
            Err(e) => Err(Self::error_result(format!(
                "Invalid parameters (required: {required}): {e}"
            ))),
        }
    }

    /// Parse arguments of a tool whose parameters are all optional.
    ///
    /// No arguments means the defaults; arguments that do not deserialize are
    /// an error rather than silently ignored.
    pub(crate) fn parse_optional_params<T: DeserializeOwned + Default>(
        args: ToolArgs,
    ) -> Result<T, CallToolResult> {
        match args {
            None => Ok(T::default()),
            Some(a) => serde_json::from_value(serde_json::Value::Object(a))
                .map_err(|e| Self::error_result(format!("Invalid parameters: {e}"))),
        }
    }

    /// Truncate sensitive content for logging.
    pub(crate) fn truncate_for_log(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            return s.to_string();
        }
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... ({} bytes total)", &s[..end], s.len())
    }

    /// Validate input size.
    pub(crate) fn validate_size(
        content: &str,
        max_bytes: usize,
        field_name: &str,
    ) -> Result<(), CallToolResult> {
        if content.len() > max_bytes {
            Err(Self::error_result(format!(
                "{} exceeds maximum size ({} bytes > {} bytes)",
                field_name,
                content.len(),
                max_bytes
            )))
        } else {
            Ok(())
        }
    }

    /// Helper to create success result with JSON content
    pub(crate) fn json_result<T: serde::Serialize>(data: &T) -> CallToolResult {
        match serde_json::to_string_pretty(data) {
            Ok(json) => CallToolResult::success(vec![Content::text(json)]),
            Err(e) => CallToolResult::error(vec![Content::text(format!(
                "JSON serialization error: {e}"
            ))]),
        }
    }

    /// Helper to create error result
    pub(crate) fn error_result(message: impl Into<String>) -> CallToolResult {
        CallToolResult::error(vec![Content::text(message.into())])
    }

    /// Convert schemars RootSchema to rmcp JsonObject
    fn schema_to_json_object<T: schemars::JsonSchema>(
    ) -> Arc<serde_json::Map<String, serde_json::Value>> {
        let schema = schema_for!(T);
        let json = serde_json::to_value(&schema.schema).unwrap_or_else(|_| serde_json::json!({}));
        match json {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        }
    }

    /// Create an empty schema for tools with no parameters
    fn empty_schema() -> Arc<serde_json::Map<String, serde_json::Value>> {
        let mut map = serde_json::Map::new();
        map.insert("type".into(), serde_json::json!("object"));
        map.insert("properties".into(), serde_json::json!({}));
        Arc::new(map)
    }

    /// Run a tool by name.
    pub async fn dispatch(&self, name: &str, args: ToolArgs) -> CallToolResult {
        match name {
            // Sandbox administration
            "create_sandbox" => self.handle_create_sandbox(args).await,
            "close_sandbox" => self.handle_close_sandbox(args).await,
            "get_sandbox_status" => self.handle_get_sandbox_status(args).await,
            // Code execution
            "execute_code" => self.handle_execute_code(args).await,
            "install_package" => self.handle_install_package(args).await,
            "create_run_close" => self.handle_create_run_close(args).await,
            // Files
            "list_files" => self.handle_list_files(args).await,
            "read_file" => self.handle_read_file(args).await,
            "write_file" => self.handle_write_file(args).await,
            "upload_file" => self.handle_upload_file(args).await,
            "delete_file" => self.handle_delete_file(args).await,
            "get_file_metadata" => self.handle_get_file_metadata(args).await,
            // Telnet
            "connect" => self.handle_telnet_connect(args).await,
            "send_command" => self.handle_telnet_send_command(args).await,
            "disconnect" => self.handle_telnet_disconnect(args).await,
            "list_connections" => self.handle_telnet_list_connections().await,
            // Charts
            "generate_line_chart" => self.handle_line_chart(args).await,
            "generate_bar_chart" => self.handle_bar_chart(args).await,
            "generate_scatter_plot" => self.handle_scatter_plot(args).await,
            "generate_heatmap" => self.handle_heatmap(args).await,
            "generate_interactive_chart" => self.handle_interactive_chart(args).await,
            _ => Self::error_result(format!("Unknown tool: {name}")),
        }
    }

    /// Build the list of available tools
    pub fn tools() -> Vec<Tool> {
        vec![
            Tool::new(
                "create_sandbox",
                "Create a new code sandbox. Returns the session_id used by every other sandbox tool.",
                Self::schema_to_json_object::<CreateSandboxParams>(),
            ),
            Tool::new(
                "close_sandbox",
                "Close a sandbox and release its resources.",
                Self::schema_to_json_object::<CloseSandboxParams>(),
            ),
            Tool::new(
                "get_sandbox_status",
                "Report the status of one sandbox, or of all sandboxes when session_id is omitted.",
                Self::schema_to_json_object::<SandboxStatusParams>(),
            ),
            Tool::new(
                "execute_code",
                "Execute code in a sandbox (python, javascript, typescript, r, java, bash). \
                 Returns stdout, stderr, errors and rich outputs such as images.",
                Self::schema_to_json_object::<ExecuteCodeParams>(),
            ),
            Tool::new(
                "install_package",
                "Install a Python package in a sandbox with pip.",
                Self::schema_to_json_object::<InstallPackageParams>(),
            ),
            Tool::new(
                "create_run_close",
                "Run code in a temporary sandbox that is closed afterwards.",
                Self::schema_to_json_object::<CreateRunCloseParams>(),
            ),
            Tool::new(
                "list_files",
                "List files in a sandbox directory.",
                Self::schema_to_json_object::<ListFilesParams>(),
            ),
            Tool::new(
                "read_file",
                "Read a text file from a sandbox.",
                Self::schema_to_json_object::<FilePathParams>(),
            ),
            Tool::new(
                "write_file",
                "Write a text file in a sandbox.",
                Self::schema_to_json_object::<WriteFileParams>(),
            ),
            Tool::new(
                "upload_file",
                "Create a file named file_name inside destination_path.",
                Self::schema_to_json_object::<UploadFileParams>(),
            ),
            Tool::new(
                "delete_file",
                "Delete a file or directory in a sandbox.",
                Self::schema_to_json_object::<FilePathParams>(),
            ),
            Tool::new(
                "get_file_metadata",
                "Get size, type, permissions and modification time of a file in a sandbox.",
                Self::schema_to_json_object::<FilePathParams>(),
            ),
            Tool::new(
                "connect",
                "Open a telnet connection. Returns a connection_id and the server banner.",
                Self::schema_to_json_object::<TelnetConnectParams>(),
            ),
            Tool::new(
                "send_command",
                "Send a line on a telnet connection and return the output.",
                Self::schema_to_json_object::<TelnetCommandParams>(),
            ),
            Tool::new(
                "disconnect",
                "Close a telnet connection.",
                Self::schema_to_json_object::<TelnetDisconnectParams>(),
            ),
            Tool::new(
                "list_connections",
                "List open telnet connections.",
                Self::empty_schema(),
            ),
            Tool::new(
                "generate_line_chart",
                "Render a line chart (PNG) from one or more series.",
                Self::schema_to_json_object::<SeriesChartParams>(),
            ),
            Tool::new(
                "generate_bar_chart",
                "Render a bar chart (PNG) from labelled values.",
                Self::schema_to_json_object::<BarChartParams>(),
            ),
            Tool::new(
                "generate_scatter_plot",
                "Render a scatter plot (PNG) from one or more series.",
                Self::schema_to_json_object::<SeriesChartParams>(),
            ),
            Tool::new(
                "generate_heatmap",
                "Render a heatmap (PNG) from a grid of values.",
                Self::schema_to_json_object::<HeatmapParams>(),
            ),
            Tool::new(
                "generate_interactive_chart",
                "Render an interactive plotly chart as HTML.",
                Self::schema_to_json_object::<InteractiveChartParams>(),
            ),
        ]
    }
}

// ============================================================================
// ServerHandler Implementation
// ============================================================================

impl ServerHandler for CodeboxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Codebox MCP Server - Run code in sandboxes and talk to telnet hosts. \
                 Use create_sandbox to get a session_id, then execute_code, the file tools \
                 and the chart tools with it. Call close_sandbox when done, or use \
                 create_run_close for one-off runs. Use connect, send_command and disconnect \
                 for telnet sessions."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        tracing::debug!(tool = %request.name, "Tool call");
        Ok(self.dispatch(request.name.as_ref(), request.arguments).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(CodeboxServer::truncate_for_log("short", 10), "short");
        let long = "a".repeat(50);
        assert_eq!(
            CodeboxServer::truncate_for_log(&long, 10),
            "aaaaaaaaaa... (50 bytes total)"
        );
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // 'é' is two bytes; cutting at 3 would split the second one.
        let text = "éééé";
        let truncated = CodeboxServer::truncate_for_log(text, 3);
        assert!(truncated.starts_with("é..."));
    }

    #[test]
    fn test_validate_size() {
        assert!(CodeboxServer::validate_size("abc", 3, "code").is_ok());
        assert!(CodeboxServer::validate_size("abcd", 3, "code").is_err());
    }

    #[test]
    fn test_parse_params() {
        let args = serde_json::json!({"session_id": "s1"});
        let params: CloseSandboxParams =
            CodeboxServer::parse_params(args.as_object().cloned(), "session_id").unwrap();
        assert_eq!(params.session_id, "s1");

        assert!(CodeboxServer::parse_params::<CloseSandboxParams>(None, "session_id").is_err());
        let wrong = serde_json::json!({"other": 1});
        assert!(
            CodeboxServer::parse_params::<CloseSandboxParams>(wrong.as_object().cloned(), "session_id")
                .is_err()
        );
    }

    #[test]
    fn test_parse_optional_params() {
        let params: SandboxStatusParams = CodeboxServer::parse_optional_params(None).unwrap();
        assert!(params.session_id.is_none());

        let args = serde_json::json!({"session_id": "s1"});
        let params: SandboxStatusParams =
            CodeboxServer::parse_optional_params(args.as_object().cloned()).unwrap();
        assert_eq!(params.session_id.as_deref(), Some("s1"));

        let wrong = serde_json::json!({"session_id": 42});
        assert!(
            CodeboxServer::parse_optional_params::<SandboxStatusParams>(wrong.as_object().cloned())
                .is_err()
        );
    }

    #[test]
    fn test_build_tools_list() {
        let tools = CodeboxServer::tools();
        assert_eq!(tools.len(), 21);
        assert!(tools.iter().any(|t| t.name.as_ref() == "create_sandbox"));
        assert!(tools.iter().any(|t| t.name.as_ref() == "send_command"));
        assert!(tools.iter().any(|t| t.name.as_ref() == "generate_heatmap"));
    }
}
