//! Local backend: a scratch directory per sandbox and host processes.
//!
//! Useful for development and tests without e2b credentials. Code runs
//! with the privileges of the server process.

mod exec;
mod fs;

use crate::config::{InterpreterConfig, InterpreterKind};
use crate::error::{CoreError, Result};
use crate::interpreter::{CodeInterpreter, ExecResult, FileInterface, Language};
use crate::sandbox::SessionId;
use async_trait::async_trait;
use fs::LocalFiles;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Interpreter that runs code as child processes inside a scratch directory.
pub struct LocalInterpreter {
    root: PathBuf,
    files: LocalFiles,
    exec_timeout: Duration,
    closed: AtomicBool,
}

impl LocalInterpreter {
    /// Create the scratch directory `{local_root}/{session}-{suffix}`.
    pub async fn create(config: &InterpreterConfig, session_id: &SessionId) -> Result<Self> {
        let suffix = Uuid::new_v4().simple().to_string();
        let root = config
            .local_root
            .join(format!("{}-{}", session_id, &suffix[..8]));

        tokio::fs::create_dir_all(&root).await?;
        // Canonical root so that displayed paths and prefix checks agree.
        let root = tokio::fs::canonicalize(&root).await?;

        tracing::info!(session_id = %session_id, root = %root.display(), "Created local sandbox");

        Ok(Self {
            files: LocalFiles::new(root.clone()),
            root,
            exec_timeout: config.exec_timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Host directory backing this sandbox.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CodeInterpreter for LocalInterpreter {
    fn kind(&self) -> InterpreterKind {
        InterpreterKind::Local
    }

    fn remote_id(&self) -> Option<String> {
        Some(self.root.display().to_string())
    }

    async fn run_code(&self, code: &str, language: Language) -> Result<ExecResult> {
        self.ensure_open()?;
        let (program, flag) =
            exec::program_for(language).ok_or_else(|| CoreError::UnsupportedLanguage {
                language: language.to_string(),
                interpreter: InterpreterKind::Local,
            })?;
        Ok(exec::run(program, flag, code, &self.root, self.exec_timeout).await)
    }

    async fn run_command(&self, command: &str) -> Result<ExecResult> {
        self.ensure_open()?;
        Ok(exec::run("sh", "-c", command, &self.root, self.exec_timeout).await)
    }

    fn files(&self) -> &dyn FileInterface {
        &self.files
    }

    async fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && tokio::fs::metadata(&self.root).await.is_ok()
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(root = %self.root.display(), "Removed local sandbox directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path) -> InterpreterConfig {
        InterpreterConfig::builder()
            .kind(InterpreterKind::Local)
            .local_root(root)
            .exec_timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId::parse("local-test").unwrap();
        let interp = LocalInterpreter::create(&config(dir.path()), &session)
            .await
            .unwrap();

        assert!(interp.root().exists());
        assert!(interp
            .root()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("local-test-"));
        assert!(interp.is_alive().await);

        interp.close().await.unwrap();
        assert!(!interp.root().exists());
        assert!(!interp.is_alive().await);
        // second close is a no-op
        interp.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_command_sees_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let interp = LocalInterpreter::create(&config(dir.path()), &SessionId::new())
            .await
            .unwrap();

        interp.files().write("/data/in.txt", "payload").await.unwrap();
        let result = interp.run_command("cat data/in.txt").await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "payload");
        interp.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let dir = tempfile::tempdir().unwrap();
        let interp = LocalInterpreter::create(&config(dir.path()), &SessionId::new())
            .await
            .unwrap();

        let err = interp.run_code("1", Language::Java).await.unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedLanguage { .. }));
        interp.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let dir = tempfile::tempdir().unwrap();
        let interp = LocalInterpreter::create(&config(dir.path()), &SessionId::new())
            .await
            .unwrap();
        interp.close().await.unwrap();

        assert!(matches!(
            interp.run_command("true").await,
            Err(CoreError::Closed)
        ));
    }
}
