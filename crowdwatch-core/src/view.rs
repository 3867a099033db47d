use std::sync::{Arc, RwLock};

use crate::chart::ChartView;
use crate::error::Error;
use crate::model::{PollConfig, TestRunStatus};
use crate::status::StatusFields;

/// Where a poll cycle's results go. Stale results are filtered before they get here.
pub trait MonitorView: Send + Sync {
    fn chart(&self, chart: ChartView, status: StatusFields);

    fn summary(&self, html: String);

    fn logs(&self, html: String);

    /// A fetch failed; the previous render stays as it is.
    fn cycle_failed(&self, _err: &Error) {}

    /// Called once, when the run reaches a terminal status.
    fn finished(&self, _status: &TestRunStatus) {}
}

/// Forwards every update to each inner view in order.
#[derive(Default)]
pub struct FanOut {
    views: Vec<Arc<dyn MonitorView>>,
}

impl FanOut {
    pub fn new(views: Vec<Arc<dyn MonitorView>>) -> Self {
        Self { views }
    }

    pub fn push(&mut self, view: Arc<dyn MonitorView>) {
        self.views.push(view);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl MonitorView for FanOut {
    fn chart(&self, chart: ChartView, status: StatusFields) {
        for v in &self.views {
            v.chart(chart.clone(), status.clone());
        }
    }

    fn summary(&self, html: String) {
        for v in &self.views {
            v.summary(html.clone());
        }
    }

    fn logs(&self, html: String) {
        for v in &self.views {
            v.logs(html.clone());
        }
    }

    fn cycle_failed(&self, err: &Error) {
        for v in &self.views {
            v.cycle_failed(err);
        }
    }

    fn finished(&self, status: &TestRunStatus) {
        for v in &self.views {
            v.finished(status);
        }
    }
}

/// Supplies the poll parameters for each cycle (the UI-binding layer).
pub trait ConfigSource: Send + Sync {
    fn poll_config(&self) -> PollConfig;
}

impl ConfigSource for PollConfig {
    fn poll_config(&self) -> PollConfig {
        self.clone()
    }
}

/// A selection that can be changed while polling runs (target, metric, actions).
#[derive(Debug)]
pub struct SharedConfig {
    inner: RwLock<PollConfig>,
}

impl SharedConfig {
    pub fn new(cfg: PollConfig) -> Self {
        Self {
            inner: RwLock::new(cfg),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut PollConfig)) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}

impl ConfigSource for SharedConfig {
    fn poll_config(&self) -> PollConfig {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Target, YAxis};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        summaries: Mutex<Vec<String>>,
        finished: Mutex<Vec<TestRunStatus>>,
    }

    impl MonitorView for Recorder {
        fn chart(&self, _chart: ChartView, _status: StatusFields) {}

        fn summary(&self, html: String) {
            self.summaries
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(html);
        }

        fn logs(&self, _html: String) {}

        fn finished(&self, status: &TestRunStatus) {
            self.finished
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(status.clone());
        }
    }

    #[test]
    fn fan_out_forwards_to_every_view() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let fan = FanOut::new(vec![
            a.clone() as Arc<dyn MonitorView>,
            b.clone() as Arc<dyn MonitorView>,
        ]);

        fan.summary("<table></table>".to_string());
        fan.finished(&TestRunStatus::Aborted);

        for r in [&a, &b] {
            assert_eq!(
                *r.summaries.lock().unwrap_or_else(|p| p.into_inner()),
                vec!["<table></table>".to_string()]
            );
            assert_eq!(
                *r.finished.lock().unwrap_or_else(|p| p.into_inner()),
                vec![TestRunStatus::Aborted]
            );
        }
    }

    #[test]
    fn shared_config_updates_are_seen_by_next_cycle() {
        let shared = SharedConfig::new(PollConfig::new("run-1"));
        assert_eq!(shared.poll_config().y_axis, YAxis::Ops);

        shared.update(|cfg| {
            cfg.y_axis = YAxis::Avgd;
            cfg.target = Target::new("10.0.0.8");
        });

        let cfg = shared.poll_config();
        assert_eq!(cfg.y_axis, YAxis::Avgd);
        assert_eq!(cfg.target.as_str(), "10.0.0.8");
        assert_eq!(cfg.test_run_id, "run-1");
    }
}
