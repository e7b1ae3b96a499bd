//! The interpreter seam: traits every execution backend implements and the
//! value types they exchange.

use crate::config::{InterpreterConfig, InterpreterKind};
use crate::e2b::E2bInterpreter;
use crate::error::{CoreError, Result};
use crate::local::LocalInterpreter;
use crate::sandbox::SessionId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages a sandbox may be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    R,
    Java,
    Bash,
    Sh,
}

impl Language {
    /// Parse a language name or common alias (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Self::Python),
            "javascript" | "js" | "node" => Ok(Self::JavaScript),
            "typescript" | "ts" => Ok(Self::TypeScript),
            "r" => Ok(Self::R),
            "java" => Ok(Self::Java),
            "bash" => Ok(Self::Bash),
            "sh" | "shell" => Ok(Self::Sh),
            _ => Err(CoreError::UnknownLanguage(s.to_string())),
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::R => "r",
            Self::Java => "java",
            Self::Bash => "bash",
            Self::Sh => "sh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by the executed code itself (not by the transport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Exception class, e.g. `ZeroDivisionError`.
    pub name: String,
    /// Exception message.
    pub value: String,
    /// Formatted traceback.
    pub traceback: String,
}

/// Rich output produced by an execution (plots, HTML, JSON...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Text data; binary formats are base64 encoded.
    pub data: String,
}

/// Result from code or command execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecResult {
    /// Process exit code (-1 if the process couldn't be started).
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Error raised by the code, if any.
    pub error: Option<ExecutionError>,
    /// Rich results.
    pub artifacts: Vec<Artifact>,
}

impl ExecResult {
    /// Check if the execution succeeded (exit code 0, no error).
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }

    /// A result describing a failure to start.
    pub(crate) fn failed_to_start(message: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            stderr: message.into(),
            ..Default::default()
        }
    }
}

/// File entry from directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File or directory name.
    pub name: String,
    /// Absolute path inside the sandbox.
    pub path: String,
    /// True if this is a directory.
    pub is_dir: bool,
    /// File size in bytes (0 for directories).
    pub size: u64,
}

/// Metadata for a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    /// Last modification time (RFC 3339).
    pub modified: Option<String>,
    /// Permission bits, e.g. `-rw-r--r--` or `644`.
    pub permissions: Option<String>,
}

/// File operations inside a sandbox. All paths are sandbox-absolute.
#[async_trait]
pub trait FileInterface: Send + Sync {
    /// List files in the path.
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>>;

    /// Read file content.
    async fn read(&self, path: &str) -> Result<String>;

    /// Write content to a file, creating parent directories.
    async fn write(&self, path: &str, content: &str) -> Result<()>;

    /// Delete a file.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Get metadata for a file.
    async fn stat(&self, path: &str) -> Result<FileMetadata>;
}

/// A code execution backend bound to one sandbox.
#[async_trait]
pub trait CodeInterpreter: Send + Sync {
    /// Backend kind.
    fn kind(&self) -> InterpreterKind;

    /// Backend-side identifier of the sandbox, if it has one.
    fn remote_id(&self) -> Option<String>;

    /// Run a snippet of code.
    async fn run_code(&self, code: &str, language: Language) -> Result<ExecResult>;

    /// Run a shell command.
    async fn run_command(&self, command: &str) -> Result<ExecResult>;

    /// File operations on this sandbox.
    fn files(&self) -> &dyn FileInterface;

    /// Whether the sandbox still answers.
    async fn is_alive(&self) -> bool;

    /// Release the sandbox. Calling it twice is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Create an interpreter of the configured kind for `session_id`.
pub async fn create_interpreter(
    config: &InterpreterConfig,
    session_id: &SessionId,
) -> Result<Box<dyn CodeInterpreter>> {
    tracing::debug!(session_id = %session_id, interpreter = %config.kind, "Creating interpreter");
    match config.kind {
        InterpreterKind::E2b => Ok(Box::new(E2bInterpreter::create(config, session_id).await?)),
        InterpreterKind::Local => Ok(Box::new(LocalInterpreter::create(config, session_id).await?)),
    }
}
