//! Code execution tools.

use crate::config::{MAX_COMMAND_LENGTH, MAX_INPUT_SIZE_BYTES};
use crate::server::{CodeboxServer, ToolArgs};
use crate::types::*;
use codebox_core::{ExecResult, Language};
use rmcp::model::{CallToolResult, Content};

/// Longest accepted pip requirement.
const MAX_REQUIREMENT_LEN: usize = 200;

/// Check a pip requirement such as `numpy>=1.26` or `requests[socks]`.
///
/// The requirement ends up in a shell command, so only characters that occur in
/// requirement specifiers are allowed.
fn validate_requirement(requirement: &str) -> Result<(), String> {
    if requirement.is_empty() {
        return Err("Package name must not be empty".into());
    }
    if requirement.len() > MAX_REQUIREMENT_LEN {
        return Err(format!(
            "Package name exceeds {MAX_REQUIREMENT_LEN} characters"
        ));
    }
    if requirement.starts_with('-') {
        return Err(format!("Invalid package name '{requirement}': options are not allowed"));
    }
    if let Some(c) = requirement
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || "._-[]<>=!~,".contains(*c)))
    {
        return Err(format!("Invalid package name '{requirement}': character {c:?} is not allowed"));
    }
    Ok(())
}

/// Image artifacts become MCP image content; everything else stays in the JSON.
fn exec_result(result: ExecResult) -> CallToolResult {
    let (images, artifacts): (Vec<_>, Vec<_>) = result
        .artifacts
        .into_iter()
        .partition(|a| matches!(a.mime_type.as_str(), "image/png" | "image/jpeg"));

    let response = ExecResponse {
        exit_code: result.exit_code,
        stdout: result.stdout,
        stderr: result.stderr,
        error: result.error,
        artifacts,
    };

    let mut output = CodeboxServer::json_result(&response);
    if output.is_error != Some(true) {
        output.content.extend(
            images
                .into_iter()
                .map(|image| Content::image(image.data, image.mime_type)),
        );
    }
    output
}

impl CodeboxServer {
    pub(crate) async fn handle_execute_code(&self, args: ToolArgs) -> CallToolResult {
        let params: ExecuteCodeParams = match Self::parse_params(args, "session_id, code") {
            Ok(p) => p,
            Err(e) => return e,
        };

        if let Err(e) = Self::validate_size(&params.code, MAX_INPUT_SIZE_BYTES, "code") {
            return e;
        }

        let language = match Language::parse(&params.language) {
            Ok(l) => l,
            Err(e) => return Self::error_result(e.to_string()),
        };

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        // Log with truncated content for security
        tracing::info!(
            session_id = %params.session_id,
            %language,
            code = %Self::truncate_for_log(&params.code, 100),
            "Executing code"
        );

        match sandbox.run_code(&params.code, language).await {
            Ok(result) => exec_result(result),
            Err(e) => {
                tracing::error!(session_id = %params.session_id, error = %e, "Execution failed");
                Self::error_result(format!("Error executing code: {e}"))
            }
        }
    }

    pub(crate) async fn handle_install_package(&self, args: ToolArgs) -> CallToolResult {
        let params: InstallPackageParams =
            match Self::parse_params(args, "session_id, package_name") {
                Ok(p) => p,
                Err(e) => return e,
            };

        let requirement = params.package_name.trim();
        if let Err(e) = validate_requirement(requirement) {
            return Self::error_result(e);
        }

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        tracing::info!(session_id = %params.session_id, package = %requirement, "Installing package");

        // Single quotes keep `<` and `>` away from the shell.
        let command = format!("pip install --quiet --disable-pip-version-check '{requirement}'");
        if let Err(e) = Self::validate_size(&command, MAX_COMMAND_LENGTH, "command") {
            return e;
        }

        match sandbox.run_command(&command).await {
            Ok(result) if result.success() => Self::json_result(&InstallPackageResult {
                package_name: requirement.to_string(),
                message: format!("Successfully installed {requirement}"),
                output: result.stdout,
            }),
            Ok(result) => {
                let detail = match result.error {
                    Some(err) => format!("{}: {}", err.name, err.value),
                    None => result.stderr,
                };
                tracing::warn!(session_id = %params.session_id, package = %requirement, "pip install failed");
                Self::error_result(format!("Failed to install {requirement}: {}", detail.trim()))
            }
            Err(e) => Self::error_result(format!("Failed to install {requirement}: {e}")),
        }
    }

    pub(crate) async fn handle_create_run_close(&self, args: ToolArgs) -> CallToolResult {
        let params: CreateRunCloseParams = match Self::parse_params(args, "code") {
            Ok(p) => p,
            Err(e) => return e,
        };

        if let Err(e) = Self::validate_size(&params.code, MAX_INPUT_SIZE_BYTES, "code") {
            return e;
        }

        let language = match Language::parse(&params.language) {
            Ok(l) => l,
            Err(e) => return Self::error_result(e.to_string()),
        };

        tracing::info!(
            %language,
            code = %Self::truncate_for_log(&params.code, 100),
            "Running code in temporary sandbox"
        );

        match self.manager.run_ephemeral(&params.code, language).await {
            Ok(result) => exec_result(result),
            Err(e) => {
                tracing::error!(error = %e, "Temporary sandbox run failed");
                Self::error_result(format!("Error in create_run_close: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebox_core::Artifact;

    #[test]
    fn test_requirement_accepts_specifiers() {
        for requirement in ["pandas", "numpy>=1.26", "requests[socks]", "scipy==1.11.4", "a~=1.0,!=1.2"] {
            assert!(validate_requirement(requirement).is_ok(), "{requirement}");
        }
    }

    #[test]
    fn test_requirement_rejects_shell() {
        for requirement in ["", "pandas; rm -rf /", "x && y", "$(id)", "`id`", "a b", "--index-url", "a'b"] {
            assert!(validate_requirement(requirement).is_err(), "{requirement}");
        }
    }

    #[test]
    fn test_images_become_image_content() {
        let result = ExecResult {
            stdout: "done\n".into(),
            artifacts: vec![
                Artifact {
                    mime_type: "image/png".into(),
                    data: "iVBORw0KGgo=".into(),
                },
                Artifact {
                    mime_type: "text/html".into(),
                    data: "<b>hi</b>".into(),
                },
            ],
            ..Default::default()
        };

        let value = serde_json::to_value(exec_result(result)).unwrap();
        let content = value["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[1]["type"], "image");
        assert_eq!(content[1]["mimeType"], "image/png");

        let body: serde_json::Value =
            serde_json::from_str(content[0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["stdout"], "done\n");
        assert_eq!(body["artifacts"].as_array().unwrap().len(), 1);
        assert_eq!(body["artifacts"][0]["mime_type"], "text/html");
    }
}
