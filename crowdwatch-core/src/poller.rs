//! Periodic fetch-and-render of one test run.
//!
//! Every tick spawns an independent cycle; a slow response never delays the next tick.
//! Cycles are numbered, and a panel is only updated by a cycle at least as new as the one
//! that last updated it, so a late response can't overwrite a fresher render.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::chart::{self, ChartField};
use crate::client::MonitorClient;
use crate::error::Error;
use crate::model::{ChartData, CompletionNotice, PollConfig, TestRunStatus};
use crate::render::{render_logs, render_summary};
use crate::status::StatusFields;
use crate::view::{ConfigSource, MonitorView};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

const MIN_INTERVAL: Duration = Duration::from_millis(10);

pub struct Poller {
    shared: Arc<Shared>,
}

impl Poller {
    pub fn new(
        client: MonitorClient,
        config: Arc<dyn ConfigSource>,
        view: Arc<dyn MonitorView>,
    ) -> Self {
        let (outcome, _rx) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                client,
                config,
                view,
                next_seq: AtomicU64::new(0),
                chart_fresh: Freshness::default(),
                summary_fresh: Freshness::default(),
                logs_fresh: Freshness::default(),
                terminal: AtomicBool::new(false),
                timer: Mutex::new(None),
                outcome,
                notice: Mutex::new(None),
            }),
        }
    }

    /// Run a cycle now and then every `interval`. Replaces a running timer.
    /// Does nothing once the run has reached a terminal status.
    pub fn start(&self, interval: Duration) {
        if self.is_terminal() {
            return;
        }

        let interval = interval.max(MIN_INTERVAL);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel_rx => break,
                    _ = ticker.tick() => {
                        if shared.terminal.load(Ordering::Acquire) {
                            break;
                        }
                        shared.spawn_cycle();
                    }
                }
            }
        });

        let previous = self.shared.lock_timer().replace(Timer {
            cancel: cancel_tx,
            task,
        });
        if let Some(previous) = previous {
            previous.stop();
        }
        tracing::debug!(?interval, "polling started");
    }

    /// Stop scheduling cycles. In-flight requests are left to finish.
    pub fn cancel(&self) {
        if let Some(timer) = self.shared.take_timer() {
            timer.stop();
            tracing::debug!("polling cancelled");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared
            .lock_timer()
            .as_ref()
            .is_some_and(|t| !t.task.is_finished())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.shared.terminal.load(Ordering::Acquire)
    }

    /// Out-of-band cycle, e.g. after the selection changed.
    pub fn refresh(&self) {
        if !self.is_terminal() {
            self.shared.spawn_cycle();
        }
    }

    /// Run one cycle inline. Returns the reported status, or `None` if the chart fetch failed.
    pub async fn poll_once(&self) -> Option<TestRunStatus> {
        let seq = self.shared.next_cycle();
        self.shared.clone().run_cycle(seq).await
    }

    #[must_use]
    pub fn cycles_started(&self) -> u64 {
        self.shared.next_seq.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TestRunStatus>> {
        self.shared.outcome.subscribe()
    }

    /// Resolves with the terminal status once a cycle observes it.
    pub async fn wait_terminal(&self) -> Option<TestRunStatus> {
        let mut rx = self.subscribe();
        let status = rx.wait_for(Option::is_some).await.ok()?.clone();
        status
    }

    /// Wait for the completion notice (if one was sent). Its outcome is not reported.
    pub async fn flush(&self) {
        let task = self
            .shared
            .notice
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Timer {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Timer {
    fn stop(self) {
        let _ = self.cancel.send(());
    }
}

/// Newest cycle that has updated a panel.
#[derive(Debug, Default)]
struct Freshness(AtomicU64);

impl Freshness {
    fn claim(&self, seq: u64) -> bool {
        self.0.fetch_max(seq, Ordering::AcqRel) <= seq
    }
}

struct Shared {
    client: MonitorClient,
    config: Arc<dyn ConfigSource>,
    view: Arc<dyn MonitorView>,
    next_seq: AtomicU64,
    chart_fresh: Freshness,
    summary_fresh: Freshness,
    logs_fresh: Freshness,
    terminal: AtomicBool,
    timer: Mutex<Option<Timer>>,
    outcome: watch::Sender<Option<TestRunStatus>>,
    notice: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<Timer>> {
        self.timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_timer(&self) -> Option<Timer> {
        self.lock_timer().take()
    }

    fn next_cycle(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn spawn_cycle(self: &Arc<Self>) {
        let seq = self.next_cycle();
        let shared = self.clone();
        tokio::spawn(async move {
            let _ = shared.run_cycle(seq).await;
        });
    }

    async fn run_cycle(self: Arc<Self>, seq: u64) -> Option<TestRunStatus> {
        let cfg = self.config.poll_config();

        let data = match self.client.chart_data(&cfg).await {
            Ok(data) => data,
            Err(err) => {
                self.skip(seq, &err);
                return None;
            }
        };
        let status = data.status.clone();

        if self.chart_fresh.claim(seq) {
            let view = chart::render(&data.samples, &ChartField::ALL, cfg.y_axis);
            self.view.chart(view, StatusFields::from_chart(&data));
        } else {
            tracing::debug!(seq, "dropping stale chart response");
        }

        if status.is_terminal() {
            self.finish(&cfg, &data);
        }

        match self.client.summary(&cfg).await {
            Ok(rows) => {
                if self.summary_fresh.claim(seq) {
                    self.view.summary(render_summary(&rows));
                }
            }
            Err(err) => {
                self.skip(seq, &err);
                return Some(status);
            }
        }

        match self.client.logs(&cfg).await {
            Ok(bundles) => {
                if self.logs_fresh.claim(seq) {
                    self.view.logs(render_logs(&bundles));
                }
            }
            Err(err) => self.skip(seq, &err),
        }

        Some(status)
    }

    fn skip(&self, seq: u64, err: &Error) {
        tracing::warn!(seq, kind = %err.kind(), "poll cycle skipped: {err}");
        self.view.cycle_failed(err);
    }

    fn finish(&self, cfg: &PollConfig, data: &ChartData) {
        let already = self.terminal.swap(true, Ordering::AcqRel);
        if let Some(timer) = self.take_timer() {
            timer.stop();
        }
        if already {
            return;
        }

        tracing::info!(
            test_run_id = %cfg.test_run_id,
            status = %data.status,
            "test run ended, polling stopped"
        );

        // The notice task is stored before the outcome is published so `flush` always sees it.
        if let Some(notice) =
            CompletionNotice::for_status(&cfg.test_run_id, &data.finished, &data.status)
        {
            let client = self.client.clone();
            let task = tokio::spawn(async move {
                match client.notify_completion(&notice).await {
                    Ok(ack) => tracing::debug!(
                        message = ack.message.as_deref().unwrap_or_default(),
                        "completion notice stored"
                    ),
                    Err(err) => tracing::debug!("completion notice dropped: {err}"),
                }
            });
            *self
                .notice
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(task);
        }

        self.view.finished(&data.status);
        self.outcome.send_replace(Some(data.status.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_rejects_older_cycles() {
        let f = Freshness::default();
        assert!(f.claim(1));
        assert!(f.claim(3));
        assert!(!f.claim(2));
        assert!(f.claim(3));
        assert!(f.claim(4));
        assert!(!f.claim(1));
    }
}
