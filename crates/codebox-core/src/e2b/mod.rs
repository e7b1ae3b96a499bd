//! e2b backend: hosted code-interpreter sandboxes reached over HTTPS.
//!
//! A sandbox is created through the control plane and then addressed
//! directly on two ports: the Jupyter server runs code, envd serves files.

mod api;
mod execution;
mod filesystem;

use crate::config::{InterpreterConfig, InterpreterKind};
use crate::error::{CoreError, Result};
use crate::interpreter::{
    CodeInterpreter, ExecResult, FileEntry, FileInterface, FileMetadata, Language,
};
use crate::sandbox::SessionId;
use api::{check_status, send_error, ControlPlane, ENVD_PORT, ENVD_USER, JUPYTER_PORT};
use async_trait::async_trait;
use execution::{parse_execution, ExecuteRequest};
use filesystem::{
    ListDirRequest, ListDirResponse, PathRequest, StatResponse, FILESYSTEM_SERVICE,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Total time to wait for envd after the sandbox was created.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between readiness probes.
const RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Timeout for a single liveness probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated requests against one port of a running sandbox.
#[derive(Clone)]
struct SandboxHost {
    http: reqwest::Client,
    sandbox_id: String,
    domain: String,
    access_token: Option<String>,
}

impl SandboxHost {
    fn request(&self, method: Method, port: u16, path: &str) -> RequestBuilder {
        let url = api::sandbox_url(port, &self.sandbox_id, &self.domain, path);
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.header("X-Access-Token", token),
            None => builder,
        }
    }

    fn envd(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, ENVD_PORT, path)
            .basic_auth(ENVD_USER, None::<&str>)
    }

    async fn health(&self) -> bool {
        match self
            .envd(Method::GET, "/health")
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::trace!(sandbox_id = %self.sandbox_id, error = %e, "Health probe failed");
                false
            }
        }
    }
}

/// File operations through envd.
pub(crate) struct E2bFiles {
    host: SandboxHost,
    request_timeout: Duration,
}

impl E2bFiles {
    /// Unary Connect-RPC call with JSON encoding.
    async fn rpc<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: &P) -> Result<R> {
        let path = format!("{FILESYSTEM_SERVICE}/{method}");
        tracing::debug!(sandbox_id = %self.host.sandbox_id, method = %method, "Sending filesystem RPC");

        let response = self
            .host
            .envd(Method::POST, &path)
            .header("Connect-Protocol-Version", "1")
            .json(params)
            .send()
            .await
            .map_err(|e| send_error(e, self.request_timeout))?;

        Ok(check_status(response).await?.json::<R>().await?)
    }
}

#[async_trait]
impl FileInterface for E2bFiles {
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let response: ListDirResponse = self
            .rpc("ListDir", &ListDirRequest { path, depth: 1 })
            .await?;
        let mut entries: Vec<FileEntry> = response.entries.into_iter().map(Into::into).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let response = self
            .host
            .envd(Method::GET, "/files")
            .query(&[("path", path), ("username", ENVD_USER)])
            .send()
            .await
            .map_err(|e| send_error(e, self.request_timeout))?;

        let bytes = check_status(response).await?.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let part = Part::bytes(content.as_bytes().to_vec()).file_name(file_name);
        let form = Form::new().part("file", part);

        let response = self
            .host
            .envd(Method::POST, "/files")
            .query(&[("path", path), ("username", ENVD_USER)])
            .multipart(form)
            .send()
            .await
            .map_err(|e| send_error(e, self.request_timeout))?;

        check_status(response).await?;
        tracing::debug!(sandbox_id = %self.host.sandbox_id, path = %path, bytes = content.len(), "File written");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let _: serde_json::Value = self.rpc("Remove", &PathRequest { path }).await?;
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<FileMetadata> {
        let response: StatResponse = self.rpc("Stat", &PathRequest { path }).await?;
        Ok(response.entry.into())
    }
}

/// A sandbox on the hosted e2b service.
pub struct E2bInterpreter {
    control: ControlPlane,
    host: SandboxHost,
    files: E2bFiles,
    exec_timeout: Duration,
    closed: AtomicBool,
}

impl E2bInterpreter {
    /// Create a sandbox from the configured template and wait until envd answers.
    pub async fn create(config: &InterpreterConfig, session_id: &SessionId) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(CoreError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let control = ControlPlane::new(
            http.clone(),
            config.domain.clone(),
            api_key,
            config.request_timeout,
        );

        let start = std::time::Instant::now();
        let info = control
            .create_sandbox(&config.template, config.sandbox_timeout, session_id.as_str())
            .await?;

        let host = SandboxHost {
            http,
            sandbox_id: info.sandbox_id.clone(),
            domain: info.domain.unwrap_or_else(|| config.domain.clone()),
            access_token: info.envd_access_token,
        };

        let interpreter = Self {
            control,
            files: E2bFiles {
                host: host.clone(),
                request_timeout: config.request_timeout,
            },
            host,
            exec_timeout: config.exec_timeout,
            closed: AtomicBool::new(false),
        };

        if let Err(e) = interpreter.wait_ready().await {
            // Do not leak a sandbox we never handed out.
            if let Err(kill_err) = interpreter.close().await {
                tracing::warn!(sandbox_id = %info.sandbox_id, error = %kill_err, "Failed to kill unready sandbox");
            }
            return Err(e);
        }

        tracing::info!(
            session_id = %session_id,
            sandbox_id = %info.sandbox_id,
            template = %config.template,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Created e2b sandbox"
        );
        Ok(interpreter)
    }

    /// Identifier assigned by e2b.
    pub fn sandbox_id(&self) -> &str {
        &self.host.sandbox_id
    }

    async fn wait_ready(&self) -> Result<()> {
        let start = std::time::Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self.host.health().await {
                tracing::debug!(
                    sandbox_id = %self.host.sandbox_id,
                    attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Sandbox ready"
                );
                return Ok(());
            }
            if start.elapsed() >= READY_TIMEOUT {
                tracing::warn!(sandbox_id = %self.host.sandbox_id, attempts, "Sandbox readiness timeout");
                return Err(CoreError::Timeout(READY_TIMEOUT));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
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
impl CodeInterpreter for E2bInterpreter {
    fn kind(&self) -> InterpreterKind {
        InterpreterKind::E2b
    }

    fn remote_id(&self) -> Option<String> {
        Some(self.host.sandbox_id.clone())
    }

    async fn run_code(&self, code: &str, language: Language) -> Result<ExecResult> {
        self.ensure_open()?;
        let response = self
            .host
            .request(Method::POST, JUPYTER_PORT, "/execute")
            .timeout(self.exec_timeout)
            .json(&ExecuteRequest::new(code, language))
            .send()
            .await
            .map_err(|e| send_error(e, self.exec_timeout))?;

        let body = check_status(response)
            .await?
            .text()
            .await
            .map_err(|e| send_error(e, self.exec_timeout))?;
        Ok(parse_execution(&body))
    }

    async fn run_command(&self, command: &str) -> Result<ExecResult> {
        self.run_code(command, Language::Bash).await
    }

    fn files(&self) -> &dyn FileInterface {
        &self.files
    }

    async fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.host.health().await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let existed = self.control.kill_sandbox(&self.host.sandbox_id).await?;
        if !existed {
            tracing::debug!(sandbox_id = %self.host.sandbox_id, "Sandbox was already gone");
        }
        Ok(())
    }
}
