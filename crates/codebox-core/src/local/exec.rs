//! Process execution for the local backend.

use crate::interpreter::{ExecResult, Language};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum output size in bytes (1 MB) kept per stream.
/// Pipes are read through a bounded buffer; bytes past the cap are discarded.
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Exit code reported when an execution is killed for running too long.
pub(crate) const TIMEOUT_EXIT_CODE: i32 = 124;

/// Read at most `cap` bytes from a pipe, then drain the rest.
///
/// Returns the kept bytes and whether anything was discarded. Draining keeps
/// the child from blocking on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(
    reader: Option<R>,
    cap: usize,
) -> std::io::Result<(Vec<u8>, bool)> {
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };
    let mut kept = Vec::new();
    (&mut reader).take(cap as u64).read_to_end(&mut kept).await?;
    let discarded = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok((kept, discarded > 0))
}

/// Decode captured output, dropping a multi-byte character cut by the cap.
pub(crate) fn decode_output(mut bytes: Vec<u8>, truncated: bool) -> String {
    if truncated {
        if let Err(e) = std::str::from_utf8(&bytes) {
            if e.error_len().is_none() {
                bytes.truncate(e.valid_up_to());
            }
        }
    }
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        text.push_str("\n... [output truncated]");
    }
    text
}

/// Interpreter program and flag for a language, if the host can run it.
pub(crate) fn program_for(language: Language) -> Option<(&'static str, &'static str)> {
    match language {
        Language::Python => Some(("python3", "-c")),
        Language::JavaScript => Some(("node", "-e")),
        Language::Bash => Some(("bash", "-c")),
        Language::Sh => Some(("sh", "-c")),
        Language::TypeScript | Language::R | Language::Java => None,
    }
}

/// Run `program flag source` inside `cwd`, killing it after `limit`.
///
/// Output is truncated to 1MB per stream.
pub(crate) async fn run(
    program: &str,
    flag: &str,
    source: &str,
    cwd: &Path,
    limit: Duration,
) -> ExecResult {
    run_capped(program, flag, source, cwd, limit, MAX_OUTPUT_SIZE).await
}

async fn run_capped(
    program: &str,
    flag: &str,
    source: &str,
    cwd: &Path,
    limit: Duration,
    max_output: usize,
) -> ExecResult {
    tracing::debug!(program = %program, cwd = %cwd.display(), "Spawning process");

    let child = Command::new(program)
        .arg(flag)
        .arg(source)
        .current_dir(cwd)
        .env("HOME", cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match child {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, program = %program, "Failed to spawn process");
            return ExecResult::failed_to_start(format!("failed to execute {program}: {e}"));
        }
    };

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let collect = async {
        tokio::try_join!(
            read_capped(stdout_pipe, max_output),
            read_capped(stderr_pipe, max_output),
            child.wait(),
        )
    };

    // On timeout the child is dropped with the function, which kills it.
    match tokio::time::timeout(limit, collect).await {
        Ok(Ok(((out, out_truncated), (err, err_truncated), status))) => {
            let exit_code = status.code().unwrap_or(-1);
            let stdout = decode_output(out, out_truncated);
            let stderr = decode_output(err, err_truncated);
            tracing::debug!(
                exit_code,
                stdout_len = stdout.len(),
                stderr_len = stderr.len(),
                "Process completed"
            );
            tracing::trace!(stdout = %stdout, stderr = %stderr, "Process output");
            ExecResult {
                exit_code,
                stdout,
                stderr,
                ..Default::default()
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, program = %program, "Failed to collect process output");
            ExecResult::failed_to_start(format!("failed to execute {program}: {e}"))
        }
        Err(_) => {
            tracing::warn!(program = %program, timeout_ms = limit.as_millis() as u64, "Process timed out");
            ExecResult {
                exit_code: TIMEOUT_EXIT_CODE,
                stderr: format!("execution timed out after {limit:?}"),
                ..Default::default()
            }
        }
    }
}
