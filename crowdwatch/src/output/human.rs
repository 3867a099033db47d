use std::sync::{Arc, Mutex};

use crowdwatch_core::{ChartField, ChartView, Error, MonitorView, StatusFields, TestRunStatus};

mod format;
mod progress;

use format::format_metric;
use progress::HumanProgress;

use super::OutputFormatter;
use crate::watch_config::WatchConfig;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
    view: Arc<HumanView>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        let progress = Arc::new(HumanProgress::new());
        Self {
            view: Arc::new(HumanView {
                progress: progress.clone(),
                last: Mutex::new(None),
            }),
            progress,
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, cfg: &WatchConfig) {
        println!("master: {}", cfg.master);
        println!(
            "test run: {} target={} y_axis={} actions={} interval={}",
            cfg.poll.test_run_id,
            cfg.poll.target,
            cfg.poll.y_axis,
            if cfg.poll.actions.is_empty() {
                "-".to_string()
            } else {
                cfg.poll.actions_param()
            },
            humantime::format_duration(cfg.interval)
        );
        println!();
    }

    fn view(&self) -> Arc<dyn MonitorView> {
        self.view.clone()
    }

    fn print_outcome(&self, status: Option<&TestRunStatus>) {
        self.progress.finish();

        match status {
            Some(status) => println!("status: {status}"),
            None => println!("status: (watch interrupted)"),
        }

        let last = self
            .view
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(fields) = last {
            println!("started: {}", fields.started);
            println!("finished: {}", fields.finished);
            println!("progress: {}", fields.progress);
        }
    }
}

struct HumanView {
    progress: Arc<HumanProgress>,
    last: Mutex<Option<StatusFields>>,
}

impl MonitorView for HumanView {
    fn chart(&self, chart: ChartView, status: StatusFields) {
        let latest = |field: ChartField| {
            chart
                .latest(field)
                .map_or_else(|| "-".to_string(), |v| format_metric(v, &chart.value_axis_title))
        };
        let message = format!(
            "{} {} passed={} failed={} incomplete={} samples={}",
            status.status,
            status.progress,
            latest(ChartField::Passed),
            latest(ChartField::Failed),
            latest(ChartField::Incomplete),
            chart.categories.len()
        );
        self.progress.update(&chart.title, message);

        *self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(status);
    }

    // Summary and log panels are HTML; they are shown by the dashboard.
    fn summary(&self, _html: String) {}

    fn logs(&self, _html: String) {}

    fn cycle_failed(&self, err: &Error) {
        self.progress
            .println(&format!("poll failed ({}): {err}", err.kind()));
    }
}
