//! Decoding of the Jupyter `/execute` event stream.
//!
//! The server answers with one JSON object per line. Output events are
//! folded into a single [`ExecResult`] in arrival order.

use crate::interpreter::{Artifact, ExecResult, ExecutionError, Language};
use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /execute`.
#[derive(Debug, Serialize)]
pub(crate) struct ExecuteRequest<'a> {
    pub code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'static str>,
}

impl<'a> ExecuteRequest<'a> {
    pub(crate) fn new(code: &'a str, language: Language) -> Self {
        Self {
            code,
            language: kernel_language(language),
        }
    }
}

/// Kernel name for a language; `None` selects the default Python context.
pub(crate) fn kernel_language(language: Language) -> Option<&'static str> {
    match language {
        Language::Python => None,
        Language::JavaScript => Some("js"),
        Language::TypeScript => Some("ts"),
        Language::R => Some("r"),
        Language::Java => Some("java"),
        Language::Bash | Language::Sh => Some("bash"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ExecEvent {
    Stdout {
        #[serde(default)]
        text: String,
    },
    Stderr {
        #[serde(default)]
        text: String,
    },
    Result(ResultEvent),
    Error {
        #[serde(default)]
        name: String,
        #[serde(default)]
        value: String,
        #[serde(default, deserialize_with = "traceback_text")]
        traceback: String,
    },
    NumberOfExecutions {
        #[serde(default)]
        execution_count: u64,
    },
    EndOfExecution,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct ResultEvent {
    text: Option<String>,
    html: Option<String>,
    markdown: Option<String>,
    svg: Option<String>,
    png: Option<String>,
    jpeg: Option<String>,
    pdf: Option<String>,
    latex: Option<String>,
    json: Option<serde_json::Value>,
    javascript: Option<String>,
}

impl ResultEvent {
    fn into_artifacts(self) -> Vec<Artifact> {
        let json = self.json.map(|v| v.to_string());
        [
            ("text/plain", self.text),
            ("text/html", self.html),
            ("text/markdown", self.markdown),
            ("image/svg+xml", self.svg),
            ("image/png", self.png),
            ("image/jpeg", self.jpeg),
            ("application/pdf", self.pdf),
            ("text/latex", self.latex),
            ("application/json", json),
            ("application/javascript", self.javascript),
        ]
        .into_iter()
        .filter_map(|(mime_type, data)| {
            data.map(|data| Artifact {
                mime_type: mime_type.to_string(),
                data,
            })
        })
        .collect()
    }
}

/// Tracebacks arrive either as one string or as a list of lines.
fn traceback_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Traceback {
        Text(String),
        Lines(Vec<String>),
    }

    Ok(match Option::<Traceback>::deserialize(deserializer)? {
        Some(Traceback::Text(text)) => text,
        Some(Traceback::Lines(lines)) => lines.join("\n"),
        None => String::new(),
    })
}

/// Fold an NDJSON event stream into an [`ExecResult`].
pub(crate) fn parse_execution(body: &str) -> ExecResult {
    let mut result = ExecResult::default();

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let event: ExecEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, line_len = line.len(), "Skipping undecodable execution event");
                continue;
            }
        };

        match event {
            ExecEvent::Stdout { text } => result.stdout.push_str(&text),
            ExecEvent::Stderr { text } => result.stderr.push_str(&text),
            ExecEvent::Result(r) => result.artifacts.extend(r.into_artifacts()),
            ExecEvent::Error {
                name,
                value,
                traceback,
            } => {
                result.exit_code = 1;
                result.error = Some(ExecutionError {
                    name,
                    value,
                    traceback,
                });
            }
            ExecEvent::NumberOfExecutions { execution_count } => {
                tracing::trace!(execution_count, "Execution counter");
            }
            ExecEvent::EndOfExecution => {}
            ExecEvent::Unknown => tracing::trace!(line = %line, "Ignoring unknown execution event"),
        }
    }

    result
}
