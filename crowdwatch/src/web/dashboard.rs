use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Context as _;
use askama::Template;
use crowdwatch_core::{
    ChartView, ConfigSource, Error, InfoToggle, MonitorView, PollConfig, StatusFields,
    TestRunStatus, YAxis,
};
use serde::Serialize;
use strum::IntoEnumIterator as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Served by the web UI: refreshes itself and offers the selection form.
    Live,
    /// Written to disk once the watch ends.
    Offline,
}

/// Latest rendered panels of the watched run.
pub struct Dashboard {
    config: Arc<dyn ConfigSource>,
    info: Arc<InfoToggle>,
    refresh: Duration,
    state: RwLock<DashboardState>,
}

#[derive(Debug, Clone, Default, Serialize)]
struct DashboardState {
    cycles_rendered: u64,
    chart: Option<ChartView>,
    status: StatusFields,
    summary_html: String,
    logs_html: String,
    last_error: Option<String>,
    finished: Option<TestRunStatus>,
}

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    selection: PollConfig,
    info_html: String,
    #[serde(flatten)]
    state: &'a DashboardState,
}

impl Dashboard {
    pub fn new(config: Arc<dyn ConfigSource>, info: Arc<InfoToggle>, refresh: Duration) -> Self {
        Self {
            config,
            info,
            refresh,
            state: RwLock::new(DashboardState::default()),
        }
    }

    pub fn snapshot_json(&self) -> String {
        let selection = self.config.poll_config();
        let info_html = self.info.content(&selection.test_run_id);
        let state = self.read();
        serde_json::to_string(&Snapshot {
            selection,
            info_html,
            state: &state,
        })
        .unwrap_or_else(|_| "{}".to_string())
    }

    pub fn render_html(&self, mode: RenderMode) -> anyhow::Result<String> {
        let selection = self.config.poll_config();
        let info_html = self.info.content(&selection.test_run_id);
        let snapshot_json = self.snapshot_json().replace("</script", "<\\/script");
        let state = self.read();

        let live = mode == RenderMode::Live && state.finished.is_none();
        let refresh_secs = live.then(|| self.refresh.as_secs().max(1));

        let y_axes = YAxis::iter()
            .map(|y| YAxisOption {
                value: y.into(),
                title: y.title(),
                selected: y == selection.y_axis,
            })
            .collect();

        let actions = selection.actions_param();
        let chart_svg = state
            .chart
            .as_ref()
            .map(ChartView::to_svg)
            .unwrap_or_default();

        let tpl = DashboardTemplate {
            test_run_id: &selection.test_run_id,
            target: selection.target.as_str(),
            actions: &actions,
            y_axes,
            interactive: mode == RenderMode::Live,
            refresh_secs,
            status: &state.status,
            chart_svg: &chart_svg,
            summary_html: &state.summary_html,
            logs_html: &state.logs_html,
            info_html: &info_html,
            last_error: state.last_error.as_deref(),
            snapshot_json: &snapshot_json,
        };
        tpl.render().context("render dashboard html")
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DashboardState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DashboardState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MonitorView for Dashboard {
    fn chart(&self, chart: ChartView, status: StatusFields) {
        let mut st = self.write();
        st.cycles_rendered += 1;
        st.chart = Some(chart);
        st.status = status;
        st.last_error = None;
    }

    fn summary(&self, html: String) {
        self.write().summary_html = html;
    }

    fn logs(&self, html: String) {
        self.write().logs_html = html;
    }

    fn cycle_failed(&self, err: &Error) {
        self.write().last_error = Some(err.to_string());
    }

    fn finished(&self, status: &TestRunStatus) {
        self.write().finished = Some(status.clone());
    }
}

struct YAxisOption {
    value: &'static str,
    title: &'static str,
    selected: bool,
}

#[derive(askama::Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate<'a> {
    test_run_id: &'a str,
    target: &'a str,
    actions: &'a str,
    y_axes: Vec<YAxisOption>,
    interactive: bool,
    refresh_secs: Option<u64>,
    status: &'a StatusFields,
    chart_svg: &'a str,
    summary_html: &'a str,
    logs_html: &'a str,
    info_html: &'a str,
    last_error: Option<&'a str>,
    snapshot_json: &'a str,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crowdwatch_core::{ChartField, MetricSample, MonitorClient, chart};

    fn dashboard() -> Dashboard {
        let client = MonitorClient::new("http://127.0.0.1:9").unwrap();
        Dashboard::new(
            Arc::new(PollConfig::new("42").with_y_axis(YAxis::Avgd)),
            Arc::new(InfoToggle::new(client)),
            Duration::from_secs(5),
        )
    }

    fn samples(n: i64) -> Vec<MetricSample> {
        (0..n)
            .map(|i| MetricSample {
                timestamp: i,
                failed: 1.0,
                passed: 2.0,
                incomplete: 0.0,
            })
            .collect()
    }

    #[test]
    fn live_page_refreshes_until_finished() {
        let d = dashboard();
        d.chart(
            chart::render(&samples(3), &ChartField::ALL, YAxis::Avgd),
            StatusFields {
                status: TestRunStatus::InProgress,
                progress: "30%".to_string(),
                ..StatusFields::default()
            },
        );
        d.summary("<table class=\"summary\"></table>".to_string());

        let html = d.render_html(RenderMode::Live).unwrap();
        assert!(html.contains(r#"<meta http-equiv="refresh" content="5">"#));
        assert!(html.contains("<polyline"));
        assert!(html.contains("<table class=\"summary\"></table>"));
        assert!(html.contains(r#"<option value="avgd" selected>"#));
        assert!(html.contains(r#"action="/select""#));

        d.finished(&TestRunStatus::Finished);
        let html = d.render_html(RenderMode::Live).unwrap();
        assert!(!html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn offline_page_embeds_snapshot_without_controls() {
        let d = dashboard();
        d.logs("<p>a</script>b</p>".to_string());
        let html = d.render_html(RenderMode::Offline).unwrap();

        assert!(html.contains(r#"id="crowdwatchSnapshot""#));
        assert!(!html.contains(r#"action="/select""#));
        assert!(!html.contains("http-equiv=\"refresh\""));
        assert!(html.contains("<\\/script"));
    }

    #[test]
    fn snapshot_reports_selection_and_errors() {
        let d = dashboard();
        d.cycle_failed(&Error::InvalidConfig("boom".to_string()));
        let v: serde_json::Value = serde_json::from_str(&d.snapshot_json()).unwrap();

        assert_eq!(v["selection"]["test_run_id"], "42");
        assert_eq!(v["selection"]["y_axis"], "avgd");
        assert_eq!(v["selection"]["target"], "total");
        assert_eq!(v["cycles_rendered"], 0);
        assert!(v["last_error"].as_str().unwrap().contains("boom"));
        assert!(v["chart"].is_null());
    }
}
