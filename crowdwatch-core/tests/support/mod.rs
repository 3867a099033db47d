#![allow(dead_code)]

use std::sync::Mutex;

use crowdwatch_core::{ChartView, Error, ErrorKind, MonitorView, StatusFields, TestRunStatus};

/// Keeps everything the poller hands to a view.
#[derive(Default)]
pub struct Recorder {
    pub charts: Mutex<Vec<(ChartView, StatusFields)>>,
    pub summaries: Mutex<Vec<String>>,
    pub logs: Mutex<Vec<String>>,
    pub failures: Mutex<Vec<ErrorKind>>,
    pub finished: Mutex<Vec<TestRunStatus>>,
}

fn snapshot<T: Clone>(m: &Mutex<Vec<T>>) -> Vec<T> {
    m.lock().unwrap_or_else(|p| p.into_inner()).clone()
}

impl Recorder {
    pub fn charts(&self) -> Vec<(ChartView, StatusFields)> {
        snapshot(&self.charts)
    }

    pub fn summaries(&self) -> Vec<String> {
        snapshot(&self.summaries)
    }

    pub fn log_renders(&self) -> Vec<String> {
        snapshot(&self.logs)
    }

    pub fn failures(&self) -> Vec<ErrorKind> {
        snapshot(&self.failures)
    }

    pub fn terminal_statuses(&self) -> Vec<TestRunStatus> {
        snapshot(&self.finished)
    }
}

impl MonitorView for Recorder {
    fn chart(&self, chart: ChartView, status: StatusFields) {
        self.charts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((chart, status));
    }

    fn summary(&self, html: String) {
        self.summaries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(html);
    }

    fn logs(&self, html: String) {
        self.logs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(html);
    }

    fn cycle_failed(&self, err: &Error) {
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(err.kind());
    }

    fn finished(&self, status: &TestRunStatus) {
        self.finished
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(status.clone());
    }
}
