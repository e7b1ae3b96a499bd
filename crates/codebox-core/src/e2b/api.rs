//! e2b control plane and sandbox host addressing.

use crate::error::{CoreError, Result};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Port of the Jupyter execution server inside the sandbox.
pub(crate) const JUPYTER_PORT: u16 = 49999;

/// Port of envd, the in-sandbox file and process daemon.
pub(crate) const ENVD_PORT: u16 = 49983;

/// Sandbox user that owns files written through envd.
pub(crate) const ENVD_USER: &str = "user";

/// Longest error body kept in an [`CoreError::Api`] message.
const MAX_ERROR_BODY: usize = 512;

/// Control plane base URL.
pub(crate) fn api_url(domain: &str, path: &str) -> String {
    format!("https://api.{domain}{path}")
}

/// URL of a port exposed by a running sandbox.
pub(crate) fn sandbox_url(port: u16, sandbox_id: &str, domain: &str, path: &str) -> String {
    format!("https://{port}-{sandbox_id}.{domain}{path}")
}

#[derive(Debug, Serialize)]
struct CreateSandboxRequest<'a> {
    #[serde(rename = "templateID")]
    template_id: &'a str,
    timeout: u64,
    metadata: HashMap<&'a str, &'a str>,
}

/// Sandbox returned by `POST /sandboxes`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SandboxInfo {
    #[serde(rename = "sandboxID")]
    pub sandbox_id: String,
    #[serde(rename = "clientID", default)]
    pub client_id: Option<String>,
    #[serde(rename = "envdVersion", default)]
    pub envd_version: Option<String>,
    #[serde(rename = "envdAccessToken", default)]
    pub envd_access_token: Option<String>,
    /// Domain the sandbox is served from, when it differs from the API's.
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Turn a non-success response into [`CoreError::Api`].
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ErrorBody {
            code: Some(code), ..
        }) => code.to_string(),
        _ if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        _ => truncate(body.trim(), MAX_ERROR_BODY),
    };

    Err(CoreError::Api {
        status: status.as_u16(),
        message,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Map a transport failure, reporting timeouts as [`CoreError::Timeout`].
pub(crate) fn send_error(e: reqwest::Error, limit: Duration) -> CoreError {
    if e.is_timeout() {
        CoreError::Timeout(limit)
    } else {
        CoreError::Http(e)
    }
}

/// Client for `https://api.{domain}`.
#[derive(Clone)]
pub(crate) struct ControlPlane {
    http: reqwest::Client,
    domain: String,
    api_key: String,
    request_timeout: Duration,
}

impl ControlPlane {
    pub(crate) fn new(
        http: reqwest::Client,
        domain: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            domain: domain.into(),
            api_key: api_key.into(),
            request_timeout,
        }
    }

    /// Start a sandbox from `template` that e2b reclaims after `lifetime`.
    pub(crate) async fn create_sandbox(
        &self,
        template: &str,
        lifetime: Duration,
        session_id: &str,
    ) -> Result<SandboxInfo> {
        let body = CreateSandboxRequest {
            template_id: template,
            timeout: lifetime.as_secs().max(1),
            metadata: HashMap::from([("session_id", session_id)]),
        };

        let response = self
            .http
            .post(api_url(&self.domain, "/sandboxes"))
            .header("X-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.request_timeout))?;

        let info = check_status(response).await?.json::<SandboxInfo>().await?;
        tracing::debug!(
            sandbox_id = %info.sandbox_id,
            client_id = ?info.client_id,
            envd_version = ?info.envd_version,
            "Sandbox created by control plane"
        );
        Ok(info)
    }

    /// Kill a sandbox. Returns `false` if it was already gone.
    pub(crate) async fn kill_sandbox(&self, sandbox_id: &str) -> Result<bool> {
        let response = self
            .http
            .delete(api_url(&self.domain, &format!("/sandboxes/{sandbox_id}")))
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| send_error(e, self.request_timeout))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        assert_eq!(api_url("e2b.app", "/sandboxes"), "https://api.e2b.app/sandboxes");
        assert_eq!(
            sandbox_url(JUPYTER_PORT, "abc123", "e2b.app", "/execute"),
            "https://49999-abc123.e2b.app/execute"
        );
        assert_eq!(
            sandbox_url(ENVD_PORT, "abc123", "e2b.dev", "/health"),
            "https://49983-abc123.e2b.dev/health"
        );
    }

    #[test]
    fn test_create_request_shape() {
        let body = CreateSandboxRequest {
            template_id: "code-interpreter-v1",
            timeout: 300,
            metadata: HashMap::from([("session_id", "s1")]),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["templateID"], "code-interpreter-v1");
        assert_eq!(json["timeout"], 300);
        assert_eq!(json["metadata"]["session_id"], "s1");
    }

    #[test]
    fn test_sandbox_info_decoding() {
        let info: SandboxInfo = serde_json::from_str(
            r#"{"sandboxID":"i1","clientID":"c1","envdVersion":"0.2.0","templateID":"t","alias":"code-interpreter-v1"}"#,
        )
        .unwrap();
        assert_eq!(info.sandbox_id, "i1");
        assert_eq!(info.envd_version.as_deref(), Some("0.2.0"));
        assert!(info.envd_access_token.is_none());
        assert!(info.domain.is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
