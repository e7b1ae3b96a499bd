//! # codebox-mcp
//!
//! MCP server exposing code sandboxes and a telnet client to AI agents.
//!
//! ## Tools
//!
//! | Group | Tools |
//! |-------|-------|
//! | Sandbox administration | `create_sandbox`, `close_sandbox`, `get_sandbox_status` |
//! | Code execution | `execute_code`, `install_package`, `create_run_close` |
//! | Files | `list_files`, `read_file`, `write_file`, `upload_file`, `delete_file`, `get_file_metadata` |
//! | Telnet | `connect`, `send_command`, `disconnect`, `list_connections` |
//! | Charts | `generate_line_chart`, `generate_bar_chart`, `generate_scatter_plot`, `generate_heatmap`, `generate_interactive_chart` |
//!
//! Sandboxes are addressed by `session_id`, telnet connections by
//! `connection_id`. Tool failures are returned as MCP error results.
//!
//! ## Usage
//!
//! ```bash
//! # stdio (Claude Desktop, Cursor, ...)
//! E2B_API_KEY=e2b_... codebox-mcp
//!
//! # streamable HTTP on 127.0.0.1:8080
//! CODEBOX_TRANSPORT=http codebox-mcp
//!
//! # no e2b account: run code as host processes
//! INTERPRETER_TYPE=local codebox-mcp
//! ```

mod config;
pub mod http;
mod server;
mod tools;
mod types;

pub use config::{
    CodeboxConfig, ConfigError, TransportMode, MAX_COMMAND_LENGTH, MAX_INPUT_SIZE_BYTES,
};
pub use server::CodeboxServer;
pub use types::*;
