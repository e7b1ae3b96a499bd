//! Configuration for the MCP server.
//!
//! Configuration is loaded from environment variables (optionally seeded
//! from a `.env` file by the binary) with sensible defaults.

use codebox_core::{InterpreterConfig, InterpreterKind};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Maximum size for code/content input in bytes (10 MB).
pub const MAX_INPUT_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Maximum command length in bytes.
pub const MAX_COMMAND_LENGTH: usize = 1024 * 1024; // 1 MB

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Stdio only (for local AI tools like Claude Desktop)
    #[default]
    Stdio,
    /// Streamable HTTP only (for remote AI agents)
    Http,
    /// Both stdio and HTTP
    Both,
}

impl TransportMode {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "http" | "sse" | "remote" => Some(Self::Http),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// Check if stdio transport should be enabled.
    pub fn stdio_enabled(&self) -> bool {
        matches!(self, Self::Stdio | Self::Both)
    }

    /// Check if HTTP transport should be enabled.
    pub fn http_enabled(&self) -> bool {
        matches!(self, Self::Http | Self::Both)
    }
}

/// Configuration for the codebox MCP server.
#[derive(Clone)]
pub struct CodeboxConfig {
    /// Execution backend (default: e2b).
    pub interpreter: InterpreterKind,

    /// e2b API key.
    pub e2b_api_key: Option<String>,

    /// e2b domain.
    pub e2b_domain: String,

    /// e2b sandbox template.
    pub e2b_template: String,

    /// Lifetime of a remote sandbox.
    pub sandbox_timeout: Duration,

    /// Timeout for sandbox API requests.
    pub request_timeout: Duration,

    /// Maximum duration of one code execution.
    pub exec_timeout: Duration,

    /// Parent directory of local sandboxes.
    pub local_root: PathBuf,

    /// Maximum concurrent sandboxes (0 = unlimited).
    pub max_sandboxes: usize,

    /// Maximum open telnet connections (0 = unlimited).
    pub max_telnet_connections: usize,

    /// Transport mode (default: stdio).
    pub transport_mode: TransportMode,

    /// HTTP server bind address.
    pub http_addr: SocketAddr,
}

impl fmt::Debug for CodeboxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeboxConfig")
            .field("interpreter", &self.interpreter)
            .field("e2b_api_key", &self.e2b_api_key.as_ref().map(|_| "<redacted>"))
            .field("e2b_domain", &self.e2b_domain)
            .field("e2b_template", &self.e2b_template)
            .field("sandbox_timeout", &self.sandbox_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("exec_timeout", &self.exec_timeout)
            .field("local_root", &self.local_root)
            .field("max_sandboxes", &self.max_sandboxes)
            .field("max_telnet_connections", &self.max_telnet_connections)
            .field("transport_mode", &self.transport_mode)
            .field("http_addr", &self.http_addr)
            .finish()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown INTERPRETER_TYPE '{0}' (expected e2b or local)")]
    UnknownInterpreter(String),

    #[error("unknown CODEBOX_TRANSPORT '{0}' (expected stdio, http or both)")]
    UnknownTransport(String),

    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("E2B_API_KEY is required for the e2b interpreter")]
    MissingApiKey,
}

impl Default for CodeboxConfig {
    fn default() -> Self {
        Self {
            interpreter: InterpreterKind::E2b,
            e2b_api_key: None,
            e2b_domain: "e2b.app".into(),
            e2b_template: "code-interpreter-v1".into(),
            sandbox_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(60),
            exec_timeout: Duration::from_secs(120),
            local_root: std::env::temp_dir().join("codebox"),
            max_sandboxes: 20,
            max_telnet_connections: 16,
            transport_mode: TransportMode::Stdio,
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        _ => Ok(default),
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs = parse_var(lookup, var, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            var,
            value: "0".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

impl CodeboxConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `INTERPRETER_TYPE` | `e2b` (e2b, local) |
    /// | `E2B_API_KEY` | unset |
    /// | `E2B_DOMAIN` | `e2b.app` |
    /// | `E2B_TEMPLATE` | `code-interpreter-v1` |
    /// | `CODEBOX_SANDBOX_TIMEOUT_SECS` | `300` |
    /// | `CODEBOX_REQUEST_TIMEOUT_SECS` | `60` |
    /// | `CODEBOX_EXEC_TIMEOUT_SECS` | `120` |
    /// | `CODEBOX_LOCAL_ROOT` | `$TMPDIR/codebox` |
    /// | `CODEBOX_MAX_SANDBOXES` | `20` |
    /// | `CODEBOX_MAX_TELNET_CONNECTIONS` | `16` |
    /// | `CODEBOX_TRANSPORT` | `stdio` (stdio, http, both) |
    /// | `CODEBOX_HTTP_HOST` | `127.0.0.1` |
    /// | `CODEBOX_HTTP_PORT` | `8080` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let default = Self::default();

        let interpreter = match lookup("INTERPRETER_TYPE") {
            Some(v) if !v.trim().is_empty() => {
                InterpreterKind::parse(&v).ok_or(ConfigError::UnknownInterpreter(v))?
            }
            _ => default.interpreter,
        };

        let transport_mode = match lookup("CODEBOX_TRANSPORT") {
            Some(v) if !v.trim().is_empty() => {
                TransportMode::parse(&v).ok_or(ConfigError::UnknownTransport(v))?
            }
            _ => default.transport_mode,
        };

        let http_host: IpAddr = parse_var(&lookup, "CODEBOX_HTTP_HOST", default.http_addr.ip())?;
        let http_port: u16 = parse_var(&lookup, "CODEBOX_HTTP_PORT", default.http_addr.port())?;

        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        Ok(Self {
            interpreter,
            e2b_api_key: non_empty("E2B_API_KEY"),
            e2b_domain: non_empty("E2B_DOMAIN").unwrap_or(default.e2b_domain),
            e2b_template: non_empty("E2B_TEMPLATE").unwrap_or(default.e2b_template),
            sandbox_timeout: parse_secs(
                &lookup,
                "CODEBOX_SANDBOX_TIMEOUT_SECS",
                default.sandbox_timeout,
            )?,
            request_timeout: parse_secs(
                &lookup,
                "CODEBOX_REQUEST_TIMEOUT_SECS",
                default.request_timeout,
            )?,
            exec_timeout: parse_secs(&lookup, "CODEBOX_EXEC_TIMEOUT_SECS", default.exec_timeout)?,
            local_root: non_empty("CODEBOX_LOCAL_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.local_root),
            max_sandboxes: parse_var(&lookup, "CODEBOX_MAX_SANDBOXES", default.max_sandboxes)?,
            max_telnet_connections: parse_var(
                &lookup,
                "CODEBOX_MAX_TELNET_CONNECTIONS",
                default.max_telnet_connections,
            )?,
            transport_mode,
            http_addr: SocketAddr::new(http_host, http_port),
        })
    }

    /// Interpreter settings handed to the sandbox manager.
    ///
    /// Not validated here: a missing API key surfaces when a sandbox is
    /// created, so the server can still start and serve telnet tools.
    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            kind: self.interpreter,
            api_key: self.e2b_api_key.clone(),
            domain: self.e2b_domain.clone(),
            template: self.e2b_template.clone(),
            sandbox_timeout: self.sandbox_timeout,
            request_timeout: self.request_timeout,
            exec_timeout: self.exec_timeout,
            local_root: self.local_root.clone(),
        }
    }

    /// Check that the selected backend can create sandboxes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interpreter == InterpreterKind::E2b && self.e2b_api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    /// Validate configuration but only log warnings instead of failing.
    ///
    /// The telnet tools work without a sandbox backend, so a missing key
    /// is not fatal.
    pub fn validate_warn(&self) {
        match self.validate() {
            Ok(()) if self.interpreter == InterpreterKind::E2b => {
                tracing::info!("E2B API key found in environment");
            }
            Ok(()) => {}
            Err(e) => tracing::warn!("{e}; sandbox creation will fail"),
        }
        if self.interpreter == InterpreterKind::Local {
            tracing::warn!(
                local_root = %self.local_root.display(),
                "Local interpreter runs code as host processes without isolation"
            );
        }
    }
}
