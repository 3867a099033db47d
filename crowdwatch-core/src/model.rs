use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Name of the aggregated target (all workers, served by the master).
pub const TOTAL: &str = "total";

/// Port the workers' monitoring endpoints listen on unless configured otherwise.
pub const DEFAULT_WEB_PORT: u16 = 8080;

/// Metric plotted on the value axis.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum YAxis {
    /// Operations per second, composite and atomic alike.
    #[default]
    Ops,
    /// Atomic operations per second.
    Aops,
    /// Average latency of atomic operations.
    Avgl,
    /// Average duration of composite operations.
    Avgd,
}

impl YAxis {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Ops => "Operations per second",
            Self::Aops => "Atomic operations per second",
            Self::Avgl => "Average latency of atomic operations",
            Self::Avgd => "Average duration of operations",
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Avgl | Self::Avgd => "milliseconds",
            Self::Ops | Self::Aops => "op/sec",
        }
    }
}

/// Which host's metrics are shown: the aggregate over all workers or a single worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Target {
    #[default]
    Total,
    Worker(String),
}

impl Target {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(TOTAL) {
            Self::Total
        } else {
            Self::Worker(raw.to_string())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Total => TOTAL,
            Self::Worker(host) => host,
        }
    }

    #[must_use]
    pub fn worker_host(&self) -> Option<&str> {
        match self {
            Self::Total => None,
            Self::Worker(host) => Some(host),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for Target {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<Target> for String {
    fn from(value: Target) -> Self {
        value.as_str().to_string()
    }
}

/// Parameters of one poll cycle. Sourced fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub test_run_id: String,

    #[serde(default)]
    pub target: Target,

    #[serde(default = "default_web_port")]
    pub web_port: u16,

    #[serde(default)]
    pub y_axis: YAxis,

    /// Selected action labels, in selection order, without duplicates.
    #[serde(default)]
    pub actions: Vec<String>,
}

fn default_web_port() -> u16 {
    DEFAULT_WEB_PORT
}

impl PollConfig {
    pub fn new(test_run_id: impl Into<String>) -> Self {
        Self {
            test_run_id: test_run_id.into(),
            target: Target::Total,
            web_port: DEFAULT_WEB_PORT,
            y_axis: YAxis::default(),
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_web_port(mut self, web_port: u16) -> Self {
        self.web_port = web_port;
        self
    }

    #[must_use]
    pub fn with_y_axis(mut self, y_axis: YAxis) -> Self {
        self.y_axis = y_axis;
        self
    }

    #[must_use]
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_actions(actions);
        self
    }

    pub fn set_actions<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.clear();
        for action in actions {
            let action: String = action.into();
            let action = action.trim();
            if !action.is_empty() && !self.actions.iter().any(|a| a == action) {
                self.actions.push(action.to_string());
            }
        }
    }

    /// Comma-joined action selection, as the backend expects it.
    #[must_use]
    pub fn actions_param(&self) -> String {
        self.actions.join(",")
    }
}

/// One chart point: counts (or averages, depending on the y-axis) per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Seconds elapsed since the test run started.
    #[serde(deserialize_with = "de_lenient_i64")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub failed: f64,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub passed: f64,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub incomplete: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TestRunStatus {
    /// Empty status: the run hasn't reported yet.
    #[default]
    Unknown,
    /// Unrecognised status text, kept verbatim for display.
    Other(String),
    InProgress,
    Finished,
    Aborted,
    Cancelled,
}

impl TestRunStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" => Self::Unknown,
            "IN PROGRESS" => Self::InProgress,
            "FINISHED" => Self::Finished,
            "ABORTED" => Self::Aborted,
            "CANCELLED" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unknown => "",
            Self::Other(raw) => raw,
            Self::InProgress => "IN PROGRESS",
            Self::Finished => "FINISHED",
            Self::Aborted => "ABORTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted | Self::Cancelled)
    }

    /// Status code stored by the master's persistence endpoint.
    #[must_use]
    pub fn completion_code(&self) -> Option<u8> {
        match self {
            Self::Finished => Some(2),
            Self::Aborted | Self::Cancelled => Some(3),
            Self::Unknown | Self::Other(_) | Self::InProgress => None,
        }
    }
}

impl fmt::Display for TestRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TestRunStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TestRunStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Self::parse(&s)).unwrap_or_default())
    }
}

/// A timestamp-ish field that the backend sends either as a number or as text
/// (`"(not finished)"`, `"42%"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stamp {
    Number(f64),
    Text(String),
}

impl Default for Stamp {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Stamp {
    /// Seconds since the Unix epoch, if the value is numeric.
    #[must_use]
    pub fn as_seconds(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v).filter(|v| v.is_finite()),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Raw `_get_chartdata` body: samples live under a key named after the requested target.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartPayload {
    #[serde(default)]
    pub status: TestRunStatus,
    #[serde(default)]
    pub started: Option<Stamp>,
    #[serde(default)]
    pub finished: Option<Stamp>,
    #[serde(default)]
    pub progress: Option<Stamp>,
    #[serde(flatten)]
    pub series: serde_json::Map<String, serde_json::Value>,
}

/// Validated chart data for one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub samples: Vec<MetricSample>,
    pub status: TestRunStatus,
    pub started: Stamp,
    pub finished: Stamp,
    pub progress: Stamp,
}

impl ChartData {
    pub fn from_payload(mut payload: ChartPayload, target: &Target) -> Result<Self, String> {
        let raw = payload
            .series
            .remove(target.as_str())
            .ok_or_else(|| format!("missing `{target}` series"))?;
        let samples: Vec<MetricSample> = match raw {
            serde_json::Value::Null => Vec::new(),
            other => serde_json::from_value(other)
                .map_err(|err| format!("invalid `{target}` series: {err}"))?,
        };

        Ok(Self {
            samples,
            status: payload.status,
            started: payload.started.unwrap_or_default(),
            finished: payload.finished.unwrap_or_default(),
            progress: payload.progress.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(deserialize_with = "de_lenient_u64")]
    pub count: u64,
    /// HTTP status code, or a sentinel such as `None` for incomplete requests.
    #[serde(default, deserialize_with = "de_code")]
    pub code: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Logs {
    #[serde(default)]
    pub testrun: String,
    #[serde(default)]
    pub monitor: String,
}

/// Log tails from one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBundle {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub logs: Logs,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub test_run_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateAck {
    #[serde(default)]
    pub test_run_title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Pushed to the master once a run reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionNotice {
    pub test_run_title: String,
    pub completed: Stamp,
    pub status: u8,
}

impl CompletionNotice {
    /// `None` unless `status` is terminal.
    pub fn for_status(test_run_id: &str, finished: &Stamp, status: &TestRunStatus) -> Option<Self> {
        let code = status.completion_code()?;
        Some(Self {
            test_run_title: test_run_id.to_string(),
            completed: finished.clone(),
            status: code,
        })
    }
}

fn de_lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(0.0),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got `{s}`"))),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

fn de_lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let v = de_lenient_f64(deserializer)?;
    if v.is_finite() {
        Ok(v.trunc() as i64)
    } else {
        Err(serde::de::Error::custom("expected a finite number"))
    }
}

fn de_lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let v = de_lenient_f64(deserializer)?;
    if v.is_finite() && v >= 0.0 {
        Ok(v.trunc() as u64)
    } else {
        Err(serde::de::Error::custom("expected a non-negative number"))
    }
}

fn de_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok("None".to_string()),
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a response code, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn y_axis_parses_and_picks_unit() {
        assert_eq!("avgl".parse::<YAxis>().unwrap(), YAxis::Avgl);
        assert_eq!(YAxis::Avgl.unit(), "milliseconds");
        assert_eq!(YAxis::Avgd.unit(), "milliseconds");
        assert_eq!(YAxis::Ops.unit(), "op/sec");
        assert_eq!(YAxis::Aops.unit(), "op/sec");
        assert!("bogus".parse::<YAxis>().is_err());
    }

    #[test]
    fn target_total_is_case_insensitive_and_default() {
        assert_eq!(Target::new("total"), Target::Total);
        assert_eq!(Target::new(" TOTAL "), Target::Total);
        assert_eq!(Target::new(""), Target::Total);
        assert_eq!(
            Target::new("10.0.0.7"),
            Target::Worker("10.0.0.7".to_string())
        );
        assert_eq!(Target::new("10.0.0.7").worker_host(), Some("10.0.0.7"));
    }

    #[test]
    fn poll_config_dedups_actions_in_selection_order() {
        let cfg = PollConfig::new("run-1").with_actions(["ActionB", "ActionA", "ActionB", " "]);
        assert_eq!(cfg.actions, vec!["ActionB", "ActionA"]);
        assert_eq!(cfg.actions_param(), "ActionB,ActionA");
    }

    #[test]
    fn status_mapping_matches_persistence_codes() {
        assert_eq!(TestRunStatus::parse("FINISHED").completion_code(), Some(2));
        assert_eq!(TestRunStatus::parse("ABORTED").completion_code(), Some(3));
        assert_eq!(TestRunStatus::parse("CANCELLED").completion_code(), Some(3));
        assert_eq!(TestRunStatus::parse("IN PROGRESS").completion_code(), None);
        assert_eq!(TestRunStatus::parse("").completion_code(), None);
        assert_eq!(TestRunStatus::parse("COMPLETED").completion_code(), None);
        assert!(!TestRunStatus::parse("COMPLETED").is_terminal());
        assert_eq!(TestRunStatus::parse("COMPLETED").to_string(), "COMPLETED");
    }

    #[test]
    fn chart_payload_accepts_string_timestamps_and_text_stamps() {
        let body = r#"{
            "total": [
                {"timestamp": "3", "failed": 1, "passed": 10, "incomplete": 0},
                {"timestamp": 4, "failed": 0, "passed": "12", "incomplete": null}
            ],
            "status": "IN PROGRESS",
            "started": 1000,
            "finished": "",
            "progress": "42%"
        }"#;
        let payload: ChartPayload = serde_json::from_str(body).unwrap();
        let data = ChartData::from_payload(payload, &Target::Total).unwrap();

        assert_eq!(data.samples.len(), 2);
        assert_eq!(data.samples[0].timestamp, 3);
        assert_eq!(data.samples[1].passed, 12.0);
        assert_eq!(data.samples[1].incomplete, 0.0);
        assert_eq!(data.status, TestRunStatus::InProgress);
        assert_eq!(data.started, Stamp::Number(1000.0));
        assert!(data.finished.is_empty());
        assert_eq!(data.progress.to_string(), "42%");
    }

    #[test]
    fn chart_payload_without_target_series_is_rejected() {
        let payload: ChartPayload =
            serde_json::from_str(r#"{"10.0.0.7": [], "status": "FINISHED"}"#).unwrap();
        let err = ChartData::from_payload(payload, &Target::Total).unwrap_err();
        assert!(err.contains("total"), "{err}");
    }

    #[test]
    fn summary_row_code_may_be_number_string_or_null() {
        let rows: Vec<SummaryRow> = serde_json::from_str(
            r#"[
                {"count": 5, "code": 200, "reason": "OK"},
                {"count": "2", "code": "404", "reason": "Not Found"},
                {"count": 1, "code": null, "reason": "Incompleted (still running or aborted)"}
            ]"#,
        )
        .unwrap();
        assert_eq!(rows[0].code, "200");
        assert_eq!(rows[1].count, 2);
        assert_eq!(rows[2].code, "None");
    }

    #[test]
    fn completion_notice_only_for_terminal_status() {
        let finished = Stamp::Number(1_700_000_000.0);
        let notice =
            CompletionNotice::for_status("run-1", &finished, &TestRunStatus::Cancelled).unwrap();
        assert_eq!(notice.status, 3);
        assert_eq!(notice.completed.to_string(), "1700000000");
        assert!(
            CompletionNotice::for_status("run-1", &finished, &TestRunStatus::InProgress).is_none()
        );
    }
}
