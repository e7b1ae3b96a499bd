//! Interpreter configuration types.

use crate::error::CoreError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Which backend executes code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpreterKind {
    /// Hosted e2b code-interpreter sandbox.
    #[default]
    E2b,
    /// Scratch directory and host processes.
    Local,
}

impl InterpreterKind {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "e2b" => Some(Self::E2b),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    /// Name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E2b => "e2b",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for InterpreterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration shared by all sandboxes a manager creates.
#[derive(Clone)]
pub struct InterpreterConfig {
    /// Backend to use.
    pub kind: InterpreterKind,
    /// e2b API key (required for the e2b backend).
    pub api_key: Option<String>,
    /// e2b domain (default: `e2b.app`).
    pub domain: String,
    /// e2b sandbox template (default: `code-interpreter-v1`).
    pub template: String,
    /// Lifetime of a remote sandbox before e2b reclaims it.
    pub sandbox_timeout: Duration,
    /// Timeout for control-plane and file API requests.
    pub request_timeout: Duration,
    /// Maximum time a single code execution may take.
    pub exec_timeout: Duration,
    /// Parent directory for local sandboxes.
    pub local_root: PathBuf,
}

impl fmt::Debug for InterpreterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("domain", &self.domain)
            .field("template", &self.template)
            .field("sandbox_timeout", &self.sandbox_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("exec_timeout", &self.exec_timeout)
            .field("local_root", &self.local_root)
            .finish()
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            kind: InterpreterKind::E2b,
            api_key: None,
            domain: "e2b.app".into(),
            template: "code-interpreter-v1".into(),
            sandbox_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(60),
            exec_timeout: Duration::from_secs(120),
            local_root: std::env::temp_dir().join("codebox"),
        }
    }
}

impl InterpreterConfig {
    /// Create a new config builder.
    pub fn builder() -> InterpreterConfigBuilder {
        InterpreterConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.kind == InterpreterKind::E2b
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(CoreError::MissingApiKey);
        }
        if self.domain.trim().is_empty() {
            return Err(CoreError::Config("domain must not be empty".into()));
        }
        if self.template.trim().is_empty() {
            return Err(CoreError::Config("template must not be empty".into()));
        }
        if self.sandbox_timeout.is_zero() {
            return Err(CoreError::Config("sandbox_timeout must be > 0".into()));
        }
        if self.exec_timeout.is_zero() {
            return Err(CoreError::Config("exec_timeout must be > 0".into()));
        }
        if self.kind == InterpreterKind::Local && self.local_root.as_os_str().is_empty() {
            return Err(CoreError::Config("local_root is required".into()));
        }
        Ok(())
    }
}

/// Builder for InterpreterConfig.
#[derive(Debug, Default)]
pub struct InterpreterConfigBuilder {
    config: InterpreterConfig,
}

impl InterpreterConfigBuilder {
    /// Set the backend.
    pub fn kind(mut self, kind: InterpreterKind) -> Self {
        self.config.kind = kind;
        self
    }

    /// Set the e2b API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the e2b domain.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.config.domain = domain.into();
        self
    }

    /// Set the e2b template.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.config.template = template.into();
        self
    }

    /// Set the remote sandbox lifetime.
    pub fn sandbox_timeout(mut self, timeout: Duration) -> Self {
        self.config.sandbox_timeout = timeout;
        self
    }

    /// Set the API request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the per-execution timeout.
    pub fn exec_timeout(mut self, timeout: Duration) -> Self {
        self.config.exec_timeout = timeout;
        self
    }

    /// Set the parent directory for local sandboxes.
    pub fn local_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.local_root = path.into();
        self
    }

    /// Build the configuration, validating all required fields.
    pub fn build(self) -> Result<InterpreterConfig, CoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = InterpreterConfig::default();
        assert_eq!(config.kind, InterpreterKind::E2b);
        assert_eq!(config.domain, "e2b.app");
        assert_eq!(config.template, "code-interpreter-v1");
        assert_eq!(config.sandbox_timeout, Duration::from_secs(300));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(InterpreterKind::parse("e2b"), Some(InterpreterKind::E2b));
        assert_eq!(InterpreterKind::parse(" E2B "), Some(InterpreterKind::E2b));
        assert_eq!(InterpreterKind::parse("Local"), Some(InterpreterKind::Local));
        assert_eq!(InterpreterKind::parse("docker"), None);
    }

    #[test]
    fn test_e2b_requires_api_key() {
        let result = InterpreterConfig::builder().kind(InterpreterKind::E2b).build();
        assert!(matches!(result, Err(CoreError::MissingApiKey)));

        let result = InterpreterConfig::builder()
            .kind(InterpreterKind::E2b)
            .api_key("   ")
            .build();
        assert!(matches!(result, Err(CoreError::MissingApiKey)));
    }

    #[test]
    fn test_local_does_not_need_api_key() {
        let config = InterpreterConfig::builder()
            .kind(InterpreterKind::Local)
            .local_root("/tmp/codebox-test")
            .exec_timeout(Duration::from_secs(5))
            .build()
            .expect("should build successfully");
        assert_eq!(config.local_root, PathBuf::from("/tmp/codebox-test"));
        assert_eq!(config.exec_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = InterpreterConfig::builder()
            .kind(InterpreterKind::Local)
            .exec_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = InterpreterConfig::builder()
            .api_key("e2b_secret_value")
            .build()
            .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("e2b_secret_value"));
        assert!(debug.contains("<redacted>"));
    }
}
