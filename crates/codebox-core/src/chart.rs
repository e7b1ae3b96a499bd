//! Chart generation inside a sandbox.
//!
//! A [`ChartRequest`] is turned into a self-contained Python script that
//! renders with matplotlib (static charts) or plotly (interactive charts).
//! User data travels as a JSON string literal decoded with `json.loads`, so
//! titles and labels are never spliced into code. The script prints the
//! rendered file base64-encoded between two markers, which
//! [`extract_chart_payload`] recovers from stdout.

use crate::error::{CoreError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Marker printed before the encoded chart.
pub const PAYLOAD_BEGIN: &str = "CHART_BEGIN";
/// Marker printed after the encoded chart.
pub const PAYLOAD_END: &str = "CHART_END";

/// Longest accepted title or axis label.
const MAX_LABEL_LEN: usize = 200;

/// Most data points accepted in one chart.
const MAX_POINTS: usize = 100_000;

/// Chart families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Heatmap,
    Interactive,
}

impl ChartKind {
    fn noun(&self) -> &'static str {
        match self {
            Self::Line => "line chart",
            Self::Bar => "bar chart",
            Self::Scatter => "scatter plot",
            Self::Heatmap => "heatmap",
            Self::Interactive => "interactive chart",
        }
    }
}

/// Trace style of an interactive chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotStyle {
    #[default]
    Line,
    Bar,
    Scatter,
}

impl PlotStyle {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Scatter => "scatter",
        }
    }
}

/// One named (x, y) series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: Option<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Data behind a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartData {
    /// Numeric series (line, scatter, interactive).
    Series(Vec<Series>),
    /// Labelled values (bar).
    Categories { labels: Vec<String>, values: Vec<f64> },
    /// Rectangular grid (heatmap).
    Matrix {
        rows: Vec<Vec<f64>>,
        #[serde(default)]
        x_labels: Option<Vec<String>>,
        #[serde(default)]
        y_labels: Option<Vec<String>>,
    },
}

/// A chart to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub title: String,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
    pub data: ChartData,
    /// Only used by interactive charts.
    #[serde(default)]
    pub style: PlotStyle,
}

/// Generated script and where its output lands.
#[derive(Debug, Clone)]
pub struct ChartScript {
    /// Python source.
    pub code: String,
    /// File the script renders to inside the sandbox.
    pub output_path: String,
    /// MIME type of the rendered file.
    pub mime_type: &'static str,
}

impl ChartScript {
    /// Recover the rendered chart from the script's stdout.
    pub fn extract(&self, stdout: &str) -> Result<ChartImage> {
        extract_chart_payload(stdout, self.mime_type)
    }
}

/// A rendered chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartImage {
    pub mime_type: String,
    /// Base64 of the rendered file.
    pub data: String,
    /// Decoded size in bytes.
    pub size: usize,
}

impl ChartImage {
    /// Decoded content as text, for HTML output.
    pub fn text(&self) -> Option<String> {
        let bytes = STANDARD.decode(&self.data).ok()?;
        String::from_utf8(bytes).ok()
    }
}

fn invalid(msg: impl Into<String>) -> CoreError {
    CoreError::InvalidChart(msg.into())
}

fn check_label(field: &str, value: &str) -> Result<()> {
    if value.len() > MAX_LABEL_LEN {
        return Err(invalid(format!("{field} is longer than {MAX_LABEL_LEN} bytes")));
    }
    Ok(())
}

fn check_finite(field: &str, values: &[f64]) -> Result<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(invalid(format!("{field} contains NaN or infinite values")));
    }
    Ok(())
}

impl ChartRequest {
    /// Check that the data fits the chart kind.
    pub fn validate(&self) -> Result<()> {
        check_label("title", &self.title)?;
        if let Some(label) = &self.x_label {
            check_label("x_label", label)?;
        }
        if let Some(label) = &self.y_label {
            check_label("y_label", label)?;
        }

        match (&self.kind, &self.data) {
            (ChartKind::Line | ChartKind::Scatter | ChartKind::Interactive, ChartData::Series(series)) => {
                if series.is_empty() {
                    return Err(invalid("at least one data series is required"));
                }
                let mut points = 0;
                for (i, s) in series.iter().enumerate() {
                    if s.x.is_empty() {
                        return Err(invalid(format!("series {i} has no points")));
                    }
                    if s.x.len() != s.y.len() {
                        return Err(invalid(format!(
                            "series {i}: x has {} values but y has {}",
                            s.x.len(),
                            s.y.len()
                        )));
                    }
                    check_finite(&format!("series {i}"), &s.x)?;
                    check_finite(&format!("series {i}"), &s.y)?;
                    if let Some(name) = &s.name {
                        check_label("series name", name)?;
                    }
                    points += s.x.len();
                }
                if points > MAX_POINTS {
                    return Err(invalid(format!("too many points ({points} > {MAX_POINTS})")));
                }
            }
            (ChartKind::Bar, ChartData::Categories { labels, values }) => {
                if labels.is_empty() {
                    return Err(invalid("at least one category is required"));
                }
                if labels.len() != values.len() {
                    return Err(invalid(format!(
                        "{} labels but {} values",
                        labels.len(),
                        values.len()
                    )));
                }
                if values.len() > MAX_POINTS {
                    return Err(invalid(format!("too many categories ({})", values.len())));
                }
                check_finite("values", values)?;
            }
            (
                ChartKind::Heatmap,
                ChartData::Matrix {
                    rows,
                    x_labels,
                    y_labels,
                },
            ) => {
                let width = rows.first().map(Vec::len).unwrap_or(0);
                if width == 0 {
                    return Err(invalid("heatmap needs at least one non-empty row"));
                }
                if let Some(i) = rows.iter().position(|r| r.len() != width) {
                    return Err(invalid(format!(
                        "row {i} has {} values, expected {width}",
                        rows[i].len()
                    )));
                }
                if rows.len() * width > MAX_POINTS {
                    return Err(invalid("heatmap is too large"));
                }
                for row in rows {
                    check_finite("heatmap", row)?;
                }
                if x_labels.as_ref().is_some_and(|l| l.len() != width) {
                    return Err(invalid(format!("x_labels must have {width} entries")));
                }
                if y_labels.as_ref().is_some_and(|l| l.len() != rows.len()) {
                    return Err(invalid(format!("y_labels must have {} entries", rows.len())));
                }
            }
            (kind, _) => {
                return Err(invalid(format!(
                    "data shape does not match a {}",
                    kind.noun()
                )))
            }
        }
        Ok(())
    }

    /// Validate and build the rendering script.
    pub fn script(&self) -> Result<ChartScript> {
        self.validate()?;

        let (ext, mime_type) = match self.kind {
            ChartKind::Interactive => ("html", "text/html"),
            _ => ("png", "image/png"),
        };
        let output_path = format!("/tmp/chart_{}.{ext}", Uuid::new_v4().simple());

        let data = serde_json::to_string(&self.payload())?;
        let data_literal = serde_json::to_string(&data)?;
        let path_literal = serde_json::to_string(&output_path)?;

        let body = match self.kind {
            ChartKind::Interactive => PLOTLY_BODY,
            ChartKind::Line => MATPLOTLIB_LINE,
            ChartKind::Scatter => MATPLOTLIB_SCATTER,
            ChartKind::Bar => MATPLOTLIB_BAR,
            ChartKind::Heatmap => MATPLOTLIB_HEATMAP,
        };
        let (render, footer) = match self.kind {
            ChartKind::Interactive => (PLOTLY_HEADER, ""),
            _ => (MATPLOTLIB_HEADER, MATPLOTLIB_FOOTER),
        };

        let code = format!(
            "import base64\nimport json\nimport os\n\
             CHART = json.loads({data_literal})\n\
             OUTPUT = {path_literal}\n\
             {render}{body}{footer}\
             with open(OUTPUT, \"rb\") as f:\n    \
                 encoded = base64.b64encode(f.read()).decode(\"ascii\")\n\
             os.remove(OUTPUT)\n\
             print(\"{PAYLOAD_BEGIN}\" + encoded + \"{PAYLOAD_END}\")\n"
        );

        Ok(ChartScript {
            code,
            output_path,
            mime_type,
        })
    }

    fn payload(&self) -> serde_json::Value {
        let mut data = json!({
            "title": self.title,
            "x_label": self.x_label.clone().unwrap_or_default(),
            "y_label": self.y_label.clone().unwrap_or_default(),
            "style": self.style.as_str(),
        });
        match &self.data {
            ChartData::Series(series) => {
                data["series"] = json!(series);
            }
            ChartData::Categories { labels, values } => {
                data["labels"] = json!(labels);
                data["values"] = json!(values);
            }
            ChartData::Matrix {
                rows,
                x_labels,
                y_labels,
            } => {
                data["rows"] = json!(rows);
                data["x_labels"] = json!(x_labels);
                data["y_labels"] = json!(y_labels);
            }
        }
        data
    }
}

const MATPLOTLIB_HEADER: &str = "\
import matplotlib
matplotlib.use(\"Agg\")
import matplotlib.pyplot as plt
fig, ax = plt.subplots(figsize=(10, 6))
ax.set_title(CHART[\"title\"])
if CHART[\"x_label\"]:
    ax.set_xlabel(CHART[\"x_label\"])
if CHART[\"y_label\"]:
    ax.set_ylabel(CHART[\"y_label\"])
";

const MATPLOTLIB_FOOTER: &str = "\
fig.tight_layout()
fig.savefig(OUTPUT, dpi=100)
plt.close(fig)
";

const MATPLOTLIB_LINE: &str = "\
for s in CHART[\"series\"]:
    ax.plot(s[\"x\"], s[\"y\"], label=s.get(\"name\"))
if any(s.get(\"name\") for s in CHART[\"series\"]):
    ax.legend()
ax.grid(True, alpha=0.3)
";

const MATPLOTLIB_SCATTER: &str = "\
for s in CHART[\"series\"]:
    ax.scatter(s[\"x\"], s[\"y\"], label=s.get(\"name\"), alpha=0.7)
if any(s.get(\"name\") for s in CHART[\"series\"]):
    ax.legend()
";

const MATPLOTLIB_BAR: &str = "\
ax.bar(range(len(CHART[\"values\"])), CHART[\"values\"])
ax.set_xticks(range(len(CHART[\"labels\"])))
ax.set_xticklabels(CHART[\"labels\"], rotation=45 if len(CHART[\"labels\"]) > 8 else 0, ha=\"right\" if len(CHART[\"labels\"]) > 8 else \"center\")
";

const MATPLOTLIB_HEATMAP: &str = "\
image = ax.imshow(CHART[\"rows\"], cmap=\"viridis\", aspect=\"auto\")
fig.colorbar(image, ax=ax)
if CHART[\"x_labels\"]:
    ax.set_xticks(range(len(CHART[\"x_labels\"])))
    ax.set_xticklabels(CHART[\"x_labels\"], rotation=45, ha=\"right\")
if CHART[\"y_labels\"]:
    ax.set_yticks(range(len(CHART[\"y_labels\"])))
    ax.set_yticklabels(CHART[\"y_labels\"])
";

const PLOTLY_HEADER: &str = "\
import plotly.graph_objects as go
fig = go.Figure()
";

const PLOTLY_BODY: &str = "\
for s in CHART[\"series\"]:
    if CHART[\"style\"] == \"bar\":
        fig.add_trace(go.Bar(x=s[\"x\"], y=s[\"y\"], name=s.get(\"name\")))
    elif CHART[\"style\"] == \"scatter\":
        fig.add_trace(go.Scatter(x=s[\"x\"], y=s[\"y\"], mode=\"markers\", name=s.get(\"name\")))
    else:
        fig.add_trace(go.Scatter(x=s[\"x\"], y=s[\"y\"], mode=\"lines\", name=s.get(\"name\")))
fig.update_layout(title=CHART[\"title\"], xaxis_title=CHART[\"x_label\"], yaxis_title=CHART[\"y_label\"])
fig.write_html(OUTPUT, include_plotlyjs=\"cdn\")
";

/// Find the marker-delimited base64 payload in `stdout` and check it decodes.
pub fn extract_chart_payload(stdout: &str, mime_type: &str) -> Result<ChartImage> {
    let start = stdout
        .rfind(PAYLOAD_BEGIN)
        .ok_or_else(|| invalid("chart script produced no output"))?
        + PAYLOAD_BEGIN.len();
    let len = stdout[start..]
        .find(PAYLOAD_END)
        .ok_or_else(|| invalid("chart output is truncated"))?;

    let data: String = stdout[start..start + len]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let decoded = STANDARD
        .decode(&data)
        .map_err(|e| invalid(format!("chart output is not valid base64: {e}")))?;
    if decoded.is_empty() {
        return Err(invalid("chart output is empty"));
    }

    Ok(ChartImage {
        mime_type: mime_type.to_string(),
        data,
        size: decoded.len(),
    })
}
