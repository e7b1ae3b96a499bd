//! Sandbox manager for lifecycle management of multiple sandboxes.

use crate::config::InterpreterConfig;
use crate::error::CoreError;
use crate::interpreter::{create_interpreter, ExecResult, Language};
use crate::sandbox::{Sandbox, SandboxSummary, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration for SandboxManager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Backend settings used for every new sandbox.
    pub interpreter: InterpreterConfig,
    /// Maximum number of concurrent sandboxes (default: 20, 0 = unlimited).
    pub max_sandboxes: usize,
}

impl ManagerConfig {
    /// Create a new manager configuration.
    pub fn new(interpreter: InterpreterConfig) -> Self {
        Self {
            interpreter,
            max_sandboxes: 20,
        }
    }

    /// Set the sandbox limit.
    pub fn with_max_sandboxes(mut self, max: usize) -> Self {
        self.max_sandboxes = max;
        self
    }
}

/// Manages the sandboxes of all sessions.
///
/// Sandboxes are stored as `Arc<Sandbox>`: lookups clone the handle and
/// release the registry lock before any backend I/O, so a slow execution
/// in one session never blocks another session.
pub struct SandboxManager {
    sandboxes: RwLock<HashMap<SessionId, Arc<Sandbox>>>,
    config: ManagerConfig,
}

impl SandboxManager {
    /// Create a new sandbox manager.
    pub fn new(config: ManagerConfig) -> Self {
        tracing::info!(
            interpreter = %config.interpreter.kind,
            max_sandboxes = config.max_sandboxes,
            "Creating sandbox manager"
        );
        Self {
            sandboxes: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn check_capacity(&self, current: usize) -> Result<(), CoreError> {
        if self.config.max_sandboxes > 0 && current >= self.config.max_sandboxes {
            return Err(CoreError::LimitReached(self.config.max_sandboxes));
        }
        Ok(())
    }

    /// Create a sandbox under `session_id`, or under a fresh id if `None`.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the id is taken, `LimitReached` when the registry
    /// is full, or any backend error from creating the interpreter.
    pub async fn create(&self, session_id: Option<SessionId>) -> Result<SessionId, CoreError> {
        let id = session_id.unwrap_or_default();

        {
            let sandboxes = self.sandboxes.read().await;
            if sandboxes.contains_key(&id) {
                return Err(CoreError::AlreadyExists(id));
            }
            self.check_capacity(sandboxes.len())?;
        }

        let interpreter = create_interpreter(&self.config.interpreter, &id).await?;
        let sandbox = Arc::new(Sandbox::new(id.clone(), interpreter));

        // Another caller may have won the race while the backend was starting.
        let rejected = {
            let mut sandboxes = self.sandboxes.write().await;
            if sandboxes.contains_key(&id) {
                Some(CoreError::AlreadyExists(id.clone()))
            } else if let Err(e) = self.check_capacity(sandboxes.len()) {
                Some(e)
            } else {
                sandboxes.insert(id.clone(), Arc::clone(&sandbox));
                None
            }
        };

        if let Some(err) = rejected {
            if let Err(e) = sandbox.close().await {
                tracing::warn!(session_id = %id, error = %e, "Failed to close rejected sandbox");
            }
            return Err(err);
        }

        tracing::info!(session_id = %id, interpreter = %sandbox.kind(), "Sandbox registered");
        Ok(id)
    }

    /// Look up a sandbox.
    pub async fn get(&self, id: &SessionId) -> Result<Arc<Sandbox>, CoreError> {
        let sandboxes = self.sandboxes.read().await;
        sandboxes
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(id.clone()))
    }

    /// Check if a sandbox exists.
    pub async fn exists(&self, id: &SessionId) -> bool {
        self.sandboxes.read().await.contains_key(id)
    }

    /// Close a sandbox.
    ///
    /// The sandbox leaves the registry even when the backend fails to
    /// release it; the error is still returned.
    pub async fn close(&self, id: &SessionId) -> Result<(), CoreError> {
        let sandbox = {
            let mut sandboxes = self.sandboxes.write().await;
            sandboxes
                .remove(id)
                .ok_or_else(|| CoreError::NotFound(id.clone()))?
        };
        sandbox.close().await
    }

    /// Close all sandboxes, returning how many were registered.
    ///
    /// This is useful for cleanup during shutdown. Errors during individual
    /// sandbox closing are logged but do not stop the process.
    pub async fn close_all(&self) -> usize {
        let sandboxes = {
            let mut guard = self.sandboxes.write().await;
            std::mem::take(&mut *guard)
        };

        let count = sandboxes.len();
        if count > 0 {
            tracing::info!(count, "Closing all sandboxes");
        }

        for (id, sandbox) in sandboxes {
            if let Err(e) = sandbox.close().await {
                tracing::error!(session_id = %id, error = %e, "Failed to close sandbox");
            }
        }

        count
    }

    /// Status report for one sandbox (probes the backend).
    pub async fn status(&self, id: &SessionId) -> Result<SandboxSummary, CoreError> {
        let sandbox = self.get(id).await?;
        Ok(sandbox.summary().await)
    }

    /// Status reports for all sandboxes, oldest first.
    pub async fn list(&self) -> Vec<SandboxSummary> {
        let sandboxes: Vec<Arc<Sandbox>> = self.sandboxes.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(sandboxes.len());
        for sandbox in sandboxes {
            summaries.push(sandbox.summary().await);
        }
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        summaries
    }

    /// Get the number of active sandboxes.
    pub async fn count(&self) -> usize {
        self.sandboxes.read().await.len()
    }

    /// Run code in a throwaway sandbox that never enters the registry.
    ///
    /// The sandbox is closed whether or not the execution succeeds.
    pub async fn run_ephemeral(
        &self,
        code: &str,
        language: Language,
    ) -> Result<ExecResult, CoreError> {
        let id = SessionId::new();
        tracing::debug!(session_id = %id, %language, "Creating ephemeral sandbox");

        let interpreter = create_interpreter(&self.config.interpreter, &id).await?;
        let sandbox = Sandbox::new(id.clone(), interpreter);

        let result = sandbox.run_code(code, language).await;
        if let Err(e) = sandbox.close().await {
            tracing::warn!(session_id = %id, error = %e, "Failed to close ephemeral sandbox");
        }
        result
    }
}
