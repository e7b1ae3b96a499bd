//! Tool parameter and response types for MCP tools.
//!
//! These types use serde for serialization and schemars for automatic
//! JSON Schema generation required by MCP.

use codebox_core::{Artifact, ChartKind, ExecutionError, FileEntry, SandboxSummary};
use codebox_telnet::ConnectionInfo;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_language() -> String {
    "python".into()
}

fn default_root() -> String {
    "/".into()
}

fn default_telnet_port() -> u16 {
    23
}

fn default_plot_style() -> String {
    "line".into()
}

// ============================================================================
// Sandbox Administration
// ============================================================================

/// Parameters for creating a new sandbox.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct CreateSandboxParams {
    /// Session ID for the new sandbox (generated if omitted).
    /// Letters, digits, `-`, `_` and `.`, at most 128 characters.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Result of creating a sandbox.
#[derive(Debug, Serialize)]
pub struct CreateSandboxResult {
    pub session_id: String,
    pub interpreter: String,
    pub message: String,
}

/// Parameters for closing a sandbox.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CloseSandboxParams {
    /// Session ID of the sandbox to close.
    pub session_id: String,
}

/// Result of closing a sandbox.
#[derive(Debug, Serialize)]
pub struct CloseSandboxResult {
    pub session_id: String,
    pub message: String,
}

/// Parameters for querying sandbox status.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SandboxStatusParams {
    /// Session ID to report on. Omit to list every sandbox.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Status of every sandbox.
#[derive(Debug, Serialize)]
pub struct SandboxListResult {
    pub count: usize,
    pub sandboxes: Vec<SandboxSummary>,
}

// ============================================================================
// Code Execution
// ============================================================================

/// Parameters for executing code in a session.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteCodeParams {
    /// Session ID of the sandbox to execute in.
    pub session_id: String,

    /// Code to execute.
    pub code: String,

    /// Language (python, javascript, typescript, r, java, bash, sh).
    #[serde(default = "default_language")]
    pub language: String,
}

/// Parameters for installing a package.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct InstallPackageParams {
    /// Session ID of the sandbox.
    pub session_id: String,

    /// pip requirement, e.g. `pandas` or `numpy>=1.26`.
    pub package_name: String,
}

/// Parameters for a one-shot execution in a throwaway sandbox.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateRunCloseParams {
    /// Code to execute.
    pub code: String,

    /// Language (python, javascript, typescript, r, java, bash, sh).
    #[serde(default = "default_language")]
    pub language: String,
}

/// Response from code execution.
#[derive(Debug, Serialize)]
pub struct ExecResponse {
    /// Exit code (0 = success).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    /// Rich outputs other than images (images are returned as image content).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

/// Result of a package installation.
#[derive(Debug, Serialize)]
pub struct InstallPackageResult {
    pub package_name: String,
    pub message: String,
    pub output: String,
}

// ============================================================================
// File Operations
// ============================================================================

/// Parameters for listing a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListFilesParams {
    /// Session ID of the sandbox.
    pub session_id: String,

    /// Directory to list (default: `/`).
    #[serde(default = "default_root")]
    pub path: String,
}

/// Result of listing a directory.
#[derive(Debug, Serialize)]
pub struct ListFilesResult {
    pub path: String,
    pub files: Vec<FileEntry>,
}

/// Parameters naming one file (read, delete, metadata).
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FilePathParams {
    /// Session ID of the sandbox.
    pub session_id: String,

    /// Absolute path of the file.
    pub file_path: String,
}

/// Result of reading a file.
#[derive(Debug, Serialize)]
pub struct ReadFileResult {
    pub path: String,
    pub content: String,
}

/// Parameters for writing a file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    /// Session ID of the sandbox.
    pub session_id: String,

    /// Absolute path of the file (parent directories are created).
    pub file_path: String,

    /// Content to write.
    pub content: String,
}

/// Parameters for uploading a file into a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UploadFileParams {
    /// Session ID of the sandbox.
    pub session_id: String,

    /// Name of the file to create (no `/`).
    pub file_name: String,

    /// Content of the file.
    pub file_content: String,

    /// Target directory (default: `/`).
    #[serde(default = "default_root")]
    pub destination_path: String,
}

/// Result of a file mutation.
#[derive(Debug, Serialize)]
pub struct FileOpResult {
    pub path: String,
    pub message: String,
}

// ============================================================================
// Telnet
// ============================================================================

/// Parameters for opening a telnet connection.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TelnetConnectParams {
    /// Host name or IP address.
    pub host: String,

    /// TCP port (default: 23).
    #[serde(default = "default_telnet_port")]
    pub port: u16,

    /// Connect timeout in seconds (default: 10).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Result of opening a telnet connection.
#[derive(Debug, Serialize)]
pub struct TelnetConnectResult {
    pub connection_id: String,
    pub host: String,
    pub port: u16,
    /// Text the server sent before going quiet.
    pub banner: String,
}

/// Parameters for sending a telnet command.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TelnetCommandParams {
    /// Connection returned by `connect`.
    pub connection_id: String,

    /// Line to send (CRLF is appended).
    pub command: String,

    /// Upper bound for collecting output in seconds (default: 30).
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Stop reading once this text appears, typically the prompt.
    #[serde(default)]
    pub expect: Option<String>,
}

/// Output of a telnet command.
#[derive(Debug, Serialize)]
pub struct TelnetCommandResult {
    pub connection_id: String,
    pub output: String,
}

/// Parameters for closing a telnet connection.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TelnetDisconnectParams {
    /// Connection to close.
    pub connection_id: String,
}

/// Open telnet connections.
#[derive(Debug, Serialize)]
pub struct TelnetListResult {
    pub count: usize,
    pub connections: Vec<ConnectionInfo>,
}

// ============================================================================
// Charts
// ============================================================================

/// One (x, y) series.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SeriesParam {
    /// Legend label.
    #[serde(default)]
    pub name: Option<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Parameters for line charts and scatter plots.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SeriesChartParams {
    /// Session ID of the sandbox that renders the chart.
    pub session_id: String,
    pub title: String,
    pub series: Vec<SeriesParam>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
}

/// Parameters for bar charts.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BarChartParams {
    /// Session ID of the sandbox that renders the chart.
    pub session_id: String,
    pub title: String,
    /// Category names, one per bar.
    pub labels: Vec<String>,
    /// Bar heights, one per label.
    pub values: Vec<f64>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
}

/// Parameters for heatmaps.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HeatmapParams {
    /// Session ID of the sandbox that renders the chart.
    pub session_id: String,
    pub title: String,
    /// Grid values, row by row; all rows must have the same length.
    pub data: Vec<Vec<f64>>,
    #[serde(default)]
    pub x_labels: Option<Vec<String>>,
    #[serde(default)]
    pub y_labels: Option<Vec<String>>,
}

/// Parameters for interactive (HTML) charts.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct InteractiveChartParams {
    /// Session ID of the sandbox that renders the chart.
    pub session_id: String,
    pub title: String,
    pub series: Vec<SeriesParam>,
    /// Trace style: line, bar or scatter (default: line).
    #[serde(default = "default_plot_style")]
    pub chart_type: String,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
}

/// Summary returned next to a rendered chart.
#[derive(Debug, Serialize)]
pub struct ChartResult {
    pub chart: ChartKind,
    pub title: String,
    pub mime_type: String,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_defaults_to_python() {
        let params: ExecuteCodeParams =
            serde_json::from_value(json!({"session_id": "s", "code": "print(1)"})).unwrap();
        assert_eq!(params.language, "python");
    }

    #[test]
    fn test_file_defaults() {
        let params: ListFilesParams = serde_json::from_value(json!({"session_id": "s"})).unwrap();
        assert_eq!(params.path, "/");

        let params: UploadFileParams = serde_json::from_value(json!({
            "session_id": "s",
            "file_name": "a.txt",
            "file_content": "x"
        }))
        .unwrap();
        assert_eq!(params.destination_path, "/");
    }

    #[test]
    fn test_telnet_port_default() {
        let params: TelnetConnectParams =
            serde_json::from_value(json!({"host": "router.lan"})).unwrap();
        assert_eq!(params.port, 23);
        assert!(params.timeout_secs.is_none());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        assert!(serde_json::from_value::<WriteFileParams>(json!({
            "session_id": "s",
            "file_path": "/a"
        }))
        .is_err());
    }

    #[test]
    fn test_schema_marks_required_fields() {
        let schema = serde_json::to_value(schemars::schema_for!(ExecuteCodeParams)).unwrap();
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("session_id")));
        assert!(required.contains(&json!("code")));
        assert!(!required.contains(&json!("language")));
    }
}
