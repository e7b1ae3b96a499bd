//! Chart tools: build a plotting script, run it in the session sandbox and
//! return the rendered image (PNG) or page (HTML).

use crate::server::{CodeboxServer, ToolArgs};
use crate::types::*;
use codebox_core::{ChartData, ChartKind, ChartRequest, Language, PlotStyle, Series};
use rmcp::model::{CallToolResult, Content};

fn to_series(series: Vec<SeriesParam>) -> ChartData {
    ChartData::Series(
        series
            .into_iter()
            .map(|s| Series {
                name: s.name,
                x: s.x,
                y: s.y,
            })
            .collect(),
    )
}

fn parse_style(s: &str) -> Option<PlotStyle> {
    match s.trim().to_lowercase().as_str() {
        "line" => Some(PlotStyle::Line),
        "bar" => Some(PlotStyle::Bar),
        "scatter" => Some(PlotStyle::Scatter),
        _ => None,
    }
}

fn series_request(kind: ChartKind, params: SeriesChartParams) -> (String, ChartRequest) {
    let request = ChartRequest {
        kind,
        title: params.title,
        x_label: params.x_label,
        y_label: params.y_label,
        data: to_series(params.series),
        style: PlotStyle::default(),
    };
    (params.session_id, request)
}

impl CodeboxServer {
    /// Render a chart in the session's sandbox.
    async fn render_chart(&self, session_id: &str, request: ChartRequest) -> CallToolResult {
        let script = match request.script() {
            Ok(s) => s,
            Err(e) => return Self::error_result(e.to_string()),
        };

        let sandbox = match self.sandbox(session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        tracing::info!(session_id = %session_id, kind = ?request.kind, "Rendering chart");

        let result = match sandbox.run_code(&script.code, Language::Python).await {
            Ok(r) => r,
            Err(e) => return Self::error_result(format!("Error generating chart: {e}")),
        };
        if !result.success() {
            let detail = match result.error {
                Some(err) => format!("{}: {}", err.name, err.value),
                None => result.stderr,
            };
            tracing::warn!(session_id = %session_id, "Chart script failed");
            return Self::error_result(format!("Error generating chart: {}", detail.trim()));
        }

        let image = match script.extract(&result.stdout) {
            Ok(i) => i,
            Err(e) => return Self::error_result(format!("Error generating chart: {e}")),
        };

        let summary = ChartResult {
            chart: request.kind,
            title: request.title,
            mime_type: image.mime_type.clone(),
            size: image.size,
        };
        let mut output = Self::json_result(&summary);
        if output.is_error == Some(true) {
            return output;
        }

        let content = if image.mime_type == "text/html" {
            match image.text() {
                Some(html) => Content::text(html),
                None => return Self::error_result("Chart page is not valid UTF-8"),
            }
        } else {
            Content::image(image.data, image.mime_type)
        };
        output.content.push(content);
        output
    }

    pub(crate) async fn handle_line_chart(&self, args: ToolArgs) -> CallToolResult {
        let params: SeriesChartParams = match Self::parse_params(args, "session_id, title, series")
        {
            Ok(p) => p,
            Err(e) => return e,
        };
        let (session_id, request) = series_request(ChartKind::Line, params);
        self.render_chart(&session_id, request).await
    }

    pub(crate) async fn handle_scatter_plot(&self, args: ToolArgs) -> CallToolResult {
        let params: SeriesChartParams = match Self::parse_params(args, "session_id, title, series")
        {
            Ok(p) => p,
            Err(e) => return e,
        };
        let (session_id, request) = series_request(ChartKind::Scatter, params);
        self.render_chart(&session_id, request).await
    }

    pub(crate) async fn handle_bar_chart(&self, args: ToolArgs) -> CallToolResult {
        let params: BarChartParams =
            match Self::parse_params(args, "session_id, title, labels, values") {
                Ok(p) => p,
                Err(e) => return e,
            };
        let request = ChartRequest {
            kind: ChartKind::Bar,
            title: params.title,
            x_label: params.x_label,
            y_label: params.y_label,
            data: ChartData::Categories {
                labels: params.labels,
                values: params.values,
            },
            style: PlotStyle::default(),
        };
        self.render_chart(&params.session_id, request).await
    }

    pub(crate) async fn handle_heatmap(&self, args: ToolArgs) -> CallToolResult {
        let params: HeatmapParams = match Self::parse_params(args, "session_id, title, data") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let request = ChartRequest {
            kind: ChartKind::Heatmap,
            title: params.title,
            x_label: None,
            y_label: None,
            data: ChartData::Matrix {
                rows: params.data,
                x_labels: params.x_labels,
                y_labels: params.y_labels,
            },
            style: PlotStyle::default(),
        };
        self.render_chart(&params.session_id, request).await
    }

    pub(crate) async fn handle_interactive_chart(&self, args: ToolArgs) -> CallToolResult {
        let params: InteractiveChartParams =
            match Self::parse_params(args, "session_id, title, series") {
                Ok(p) => p,
                Err(e) => return e,
            };
        let Some(style) = parse_style(&params.chart_type) else {
            return Self::error_result(format!(
                "Unsupported chart_type '{}' (expected line, bar or scatter)",
                params.chart_type
            ));
        };
        let request = ChartRequest {
            kind: ChartKind::Interactive,
            title: params.title,
            x_label: params.x_label,
            y_label: params.y_label,
            data: to_series(params.series),
            style,
        };
        self.render_chart(&params.session_id, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_style() {
        assert_eq!(parse_style("Line"), Some(PlotStyle::Line));
        assert_eq!(parse_style("scatter"), Some(PlotStyle::Scatter));
        assert_eq!(parse_style("pie"), None);
    }

    #[test]
    fn test_series_request() {
        let params = SeriesChartParams {
            session_id: "s".into(),
            title: "t".into(),
            series: vec![SeriesParam {
                name: Some("a".into()),
                x: vec![1.0, 2.0],
                y: vec![3.0, 4.0],
            }],
            x_label: None,
            y_label: Some("y".into()),
        };
        let (session_id, request) = series_request(ChartKind::Scatter, params);
        assert_eq!(session_id, "s");
        assert_eq!(request.kind, ChartKind::Scatter);
        assert!(request.validate().is_ok());
    }
}
