//! Sandbox type - a live interpreter bound to a session.

use crate::config::InterpreterKind;
use crate::error::CoreError;
use crate::interpreter::{CodeInterpreter, ExecResult, FileInterface, Language};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Maximum length of a session id.
const MAX_SESSION_ID_LEN: usize = 128;

/// Caller-visible identifier for a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a caller-supplied session ID.
    ///
    /// Accepts 1 to 128 characters from `[A-Za-z0-9_.-]`.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let valid = !s.is_empty()
            && s.len() <= MAX_SESSION_ID_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && s != "."
            && s != "..";
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(CoreError::InvalidSessionId(s.to_string()))
        }
    }

    /// Get the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Observed state of a registered sandbox.
///
/// Closed sandboxes leave the registry, so they have no status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    /// Sandbox answers requests.
    Running,
    /// Sandbox is registered but did not answer the liveness probe.
    Unreachable,
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Status report for one sandbox.
#[derive(Debug, Clone, Serialize)]
pub struct SandboxSummary {
    pub session_id: String,
    pub interpreter: String,
    pub status: SandboxStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Backend-side identifier (e2b sandbox id or local directory).
    pub remote_id: Option<String>,
}

/// A live sandbox owned by the [`SandboxManager`](crate::SandboxManager).
///
/// Every operation records the time of last activity, which status
/// reports expose.
pub struct Sandbox {
    id: SessionId,
    interpreter: Box<dyn CodeInterpreter>,
    created_at: DateTime<Utc>,
    last_activity_ms: AtomicI64,
}

impl Sandbox {
    pub(crate) fn new(id: SessionId, interpreter: Box<dyn CodeInterpreter>) -> Self {
        let now = Utc::now();
        Self {
            id,
            interpreter,
            created_at: now,
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    /// Get the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Get the backend kind.
    pub fn kind(&self) -> InterpreterKind {
        self.interpreter.kind()
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the time of the last operation.
    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity_ms.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Run code in the given language.
    pub async fn run_code(&self, code: &str, language: Language) -> Result<ExecResult, CoreError> {
        self.touch();
        let start = std::time::Instant::now();
        tracing::debug!(session_id = %self.id, %language, code_len = code.len(), "Executing code");
        let result = self.interpreter.run_code(code, language).await;
        if let Ok(ref r) = result {
            tracing::debug!(
                session_id = %self.id,
                exit_code = r.exit_code,
                stdout_len = r.stdout.len(),
                stderr_len = r.stderr.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Code execution completed"
            );
        }
        result
    }

    /// Run a shell command.
    pub async fn run_command(&self, command: &str) -> Result<ExecResult, CoreError> {
        self.touch();
        tracing::debug!(session_id = %self.id, command_len = command.len(), "Executing command");
        self.interpreter.run_command(command).await
    }

    /// File operations on this sandbox.
    pub fn files(&self) -> &dyn FileInterface {
        self.touch();
        self.interpreter.files()
    }

    /// Probe the backend.
    pub async fn is_alive(&self) -> bool {
        self.interpreter.is_alive().await
    }

    /// Build a status report, probing the backend.
    pub async fn summary(&self) -> SandboxSummary {
        let status = if self.is_alive().await {
            SandboxStatus::Running
        } else {
            SandboxStatus::Unreachable
        };
        SandboxSummary {
            session_id: self.id.to_string(),
            interpreter: self.kind().to_string(),
            status,
            created_at: self.created_at,
            last_activity: self.last_activity(),
            remote_id: self.interpreter.remote_id(),
        }
    }

    /// Release the backend sandbox.
    pub async fn close(&self) -> Result<(), CoreError> {
        let start = std::time::Instant::now();
        tracing::info!(session_id = %self.id, "Closing sandbox");
        self.interpreter.close().await?;
        tracing::info!(
            session_id = %self.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sandbox closed"
        );
        Ok(())
    }
}
