use std::io::Write as _;
use std::sync::Arc;

use crowdwatch_core::{ChartField, ChartView, Error, MonitorView, StatusFields, TestRunStatus};
use serde::Serialize;

use super::OutputFormatter;
use crate::watch_config::WatchConfig;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _cfg: &WatchConfig) {}

    fn view(&self) -> Arc<dyn MonitorView> {
        Arc::new(JsonView)
    }

    fn print_outcome(&self, status: Option<&TestRunStatus>) {
        if status.is_none() {
            emit_json_line(&JsonLine::Interrupted);
        }
    }
}

struct JsonView;

impl MonitorView for JsonView {
    fn chart(&self, chart: ChartView, status: StatusFields) {
        emit_json_line(&build_chart_line(&chart, status));
    }

    fn summary(&self, html: String) {
        emit_json_line(&JsonLine::Summary { html });
    }

    fn logs(&self, html: String) {
        emit_json_line(&JsonLine::Logs { html });
    }

    fn cycle_failed(&self, err: &Error) {
        emit_json_line(&build_error_line(err));
    }

    fn finished(&self, status: &TestRunStatus) {
        emit_json_line(&JsonLine::Finished {
            status: status.clone(),
            completion_code: status.completion_code(),
        });
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum JsonLine {
    Chart(Box<JsonChartLine>),
    Summary {
        html: String,
    },
    Logs {
        html: String,
    },
    Error {
        error_kind: String,
        /// Set when the request never got an HTTP answer.
        transport: Option<String>,
        message: String,
    },
    Finished {
        status: TestRunStatus,
        completion_code: Option<u8>,
    },
    Interrupted,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonChartLine {
    pub status: TestRunStatus,
    pub started: String,
    pub finished: String,
    pub progress: String,

    pub title: String,
    pub unit: String,
    pub samples: usize,
    pub visible_from: usize,

    pub latest_passed: Option<f64>,
    pub latest_failed: Option<f64>,
    pub latest_incomplete: Option<f64>,
}

fn build_chart_line(chart: &ChartView, status: StatusFields) -> JsonLine {
    JsonLine::Chart(Box::new(JsonChartLine {
        status: status.status,
        started: status.started,
        finished: status.finished,
        progress: status.progress,

        title: chart.title.clone(),
        unit: chart.value_axis_title.clone(),
        samples: chart.categories.len(),
        visible_from: chart.window.start,

        latest_passed: chart.latest(ChartField::Passed),
        latest_failed: chart.latest(ChartField::Failed),
        latest_incomplete: chart.latest(ChartField::Incomplete),
    }))
}

fn build_error_line(err: &Error) -> JsonLine {
    JsonLine::Error {
        error_kind: err.kind().to_string(),
        transport: err.transport_kind().map(|k| k.to_string()),
        message: err.to_string(),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crowdwatch_core::{MetricSample, YAxis, chart};

    #[test]
    fn chart_line_is_tagged_and_flat() {
        let samples: Vec<MetricSample> = (0..3)
            .map(|i| MetricSample {
                timestamp: i,
                failed: 0.0,
                passed: i as f64 * 2.0,
                incomplete: 1.0,
            })
            .collect();
        let view = chart::render(&samples, &ChartField::ALL, YAxis::Avgl);
        let status = StatusFields {
            status: TestRunStatus::InProgress,
            progress: "30%".to_string(),
            ..StatusFields::default()
        };

        let v = serde_json::to_value(build_chart_line(&view, status)).unwrap();
        assert_eq!(v["kind"], "chart");
        assert_eq!(v["status"], "IN PROGRESS");
        assert_eq!(v["unit"], "milliseconds");
        assert_eq!(v["samples"], 3);
        assert_eq!(v["latest_passed"], 4.0);
    }

    #[test]
    fn error_line_keeps_the_kind_tag() {
        let malformed = Error::InvalidConfig("master url has no host".to_string());
        let v = serde_json::to_value(build_error_line(&malformed)).unwrap();
        assert_eq!(v["kind"], "error");
        assert_eq!(v["error_kind"], "invalid_config");
        assert!(v["transport"].is_null());
        assert!(v["message"].as_str().unwrap().contains("master url has no host"));
    }

    #[tokio::test]
    async fn error_line_reports_transport_failures() {
        let client = crowdwatch_core::MonitorClient::new("http://127.0.0.1:9").unwrap();
        let err = client.test_info("42").await.unwrap_err();

        let v = serde_json::to_value(build_error_line(&err)).unwrap();
        assert_eq!(v["kind"], "error");
        assert_eq!(v["error_kind"], "network");
        assert_eq!(v["transport"], "connect");
    }

    #[test]
    fn finished_line_carries_completion_code() {
        let v = serde_json::to_value(JsonLine::Finished {
            status: TestRunStatus::Cancelled,
            completion_code: TestRunStatus::Cancelled.completion_code(),
        })
        .unwrap();
        assert_eq!(
            v,
            serde_json::json!({"kind": "finished", "status": "CANCELLED", "completion_code": 3})
        );
    }
}
