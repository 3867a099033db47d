//! A scripted stand-in for the load-test master (and its workers' monitoring endpoints).
//!
//! Each chart poll advances the script by one step; after `polls_until_terminal` in-progress
//! answers the run reports its final status.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_CHART_DATA: &str = "/_get_chartdata";
pub const PATH_SUMMARY: &str = "/_get_summary";
pub const PATH_LOGS: &str = "/_get_logs";
pub const PATH_TEST_INFO: &str = "/_test_info";
pub const PATH_TEST_UPDATE: &str = "/_test_update";

pub const RUN_STARTED: i64 = 1_709_802_301;
pub const RUN_FINISHED: i64 = 1_709_802_400;

/// How the fake run evolves across chart polls.
#[derive(Debug, Clone)]
pub struct RunScript {
    pub test_run_id: String,
    pub polls_until_terminal: u64,
    pub final_status: String,
    pub description: Option<String>,
    /// The first N chart polls answer with a body that isn't JSON.
    pub malformed_polls: u64,
    /// Delay before every chart answer.
    pub chart_delay: Duration,
}

impl Default for RunScript {
    fn default() -> Self {
        Self {
            test_run_id: "42".to_string(),
            polls_until_terminal: 2,
            final_status: "FINISHED".to_string(),
            description: Some("ramp to 50 users".to_string()),
            malformed_polls: 0,
            chart_delay: Duration::ZERO,
        }
    }
}

impl RunScript {
    pub fn finishing_with(mut self, status: &str) -> Self {
        self.final_status = status.to_string();
        self
    }

    pub fn after_polls(mut self, polls: u64) -> Self {
        self.polls_until_terminal = polls;
        self
    }

    pub fn with_malformed_polls(mut self, polls: u64) -> Self {
        self.malformed_polls = polls;
        self
    }

    pub fn without_description(mut self) -> Self {
        self.description = None;
        self
    }

    pub fn with_chart_delay(mut self, delay: Duration) -> Self {
        self.chart_delay = delay;
        self
    }
}

/// A completion notice as received on `_test_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedNotice {
    pub test_run_title: String,
    pub completed: String,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    chart_requests: Arc<AtomicU64>,
    summary_requests: Arc<AtomicU64>,
    logs_requests: Arc<AtomicU64>,
    info_requests: Arc<AtomicU64>,
    chart_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    notices: Arc<Mutex<Vec<RecordedNotice>>>,
}

impl TestServerStats {
    /// Returns the zero-based index of this chart poll.
    fn record_chart(&self, query: HashMap<String, String>) -> u64 {
        lock(&self.chart_queries).push(query);
        self.chart_requests.fetch_add(1, Ordering::Relaxed)
    }

    fn inc_summary_requests(&self) {
        self.summary_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_logs_requests(&self) {
        self.logs_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_info_requests(&self) {
        self.info_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn record_notice(&self, notice: RecordedNotice) {
        lock(&self.notices).push(notice);
    }

    pub fn chart_requests(&self) -> u64 {
        self.chart_requests.load(Ordering::Relaxed)
    }

    pub fn summary_requests(&self) -> u64 {
        self.summary_requests.load(Ordering::Relaxed)
    }

    pub fn logs_requests(&self) -> u64 {
        self.logs_requests.load(Ordering::Relaxed)
    }

    pub fn info_requests(&self) -> u64 {
        self.info_requests.load(Ordering::Relaxed)
    }

    pub fn last_chart_query(&self) -> Option<HashMap<String, String>> {
        lock(&self.chart_queries).last().cloned()
    }

    pub fn notices(&self) -> Vec<RecordedNotice> {
        lock(&self.notices).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
struct Backend {
    script: Arc<RunScript>,
    stats: TestServerStats,
}

type Params = Query<HashMap<String, String>>;

/// Answers `callback(<json>);` when a callback is requested, plain JSON otherwise.
fn padded(params: &HashMap<String, String>, body: &Value) -> Response {
    match params.get("callback").filter(|c| !c.is_empty()) {
        Some(callback) => (
            [(header::CONTENT_TYPE, "application/javascript")],
            format!("{callback}({body});"),
        )
            .into_response(),
        None => (
            [(header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response(),
    }
}

fn samples(count: u64) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "timestamp": (RUN_STARTED + i as i64 * 5).to_string(),
                "failed": i % 2,
                "passed": i * 10,
                "incomplete": 1,
            })
        })
        .collect()
}

async fn handle_chart_data(State(backend): State<Backend>, Query(params): Params) -> Response {
    let poll = backend.stats.record_chart(params.clone());
    let script = &backend.script;
    if !script.chart_delay.is_zero() {
        sleep(script.chart_delay).await;
    }

    if poll < script.malformed_polls {
        return (StatusCode::OK, "<html>proxy error</html>").into_response();
    }

    let step = poll - script.malformed_polls;
    let terminal = step >= script.polls_until_terminal;
    let target = params
        .get("slave")
        .cloned()
        .unwrap_or_else(|| "total".to_string());

    let (status, finished, progress) = if terminal {
        (
            script.final_status.clone(),
            RUN_FINISHED.to_string(),
            "100%".to_string(),
        )
    } else {
        (
            "IN PROGRESS".to_string(),
            "(not finished)".to_string(),
            format!("{}%", step * 10),
        )
    };
    let mut body = json!({
        "status": status,
        "started": RUN_STARTED.to_string(),
        "finished": finished,
        "progress": progress,
    });
    body[target] = Value::Array(samples(step + 1));

    padded(&params, &body)
}

async fn handle_summary(State(backend): State<Backend>, Query(params): Params) -> Response {
    backend.stats.inc_summary_requests();
    let body = json!([
        { "count": 120, "code": 200, "reason": "OK" },
        { "count": 3, "code": null, "reason": "Incompleted (still running or aborted)" },
    ]);
    padded(&params, &body)
}

async fn handle_logs(State(backend): State<Backend>, Query(params): Params) -> Response {
    backend.stats.inc_logs_requests();
    let body = json!([{
        "host": "127.0.0.1:8080",
        "logs": {
            "testrun": "started\\nusers=50\\n",
            "monitor": "agent up",
        },
    }]);
    padded(&params, &body)
}

async fn handle_test_info(State(backend): State<Backend>, Query(params): Params) -> Response {
    backend.stats.inc_info_requests();
    let trid = params.get("trid").cloned().unwrap_or_default();
    let description = if trid == backend.script.test_run_id {
        backend.script.description.clone()
    } else {
        None
    };
    let body = json!({
        "id": 1,
        "test_run_id": trid,
        "description": description,
    });
    padded(&params, &body)
}

async fn handle_test_update(State(backend): State<Backend>, Query(params): Params) -> Response {
    let notice = RecordedNotice {
        test_run_title: params.get("test_run_title").cloned().unwrap_or_default(),
        completed: params.get("completed").cloned().unwrap_or_default(),
        status: params.get("status").cloned().unwrap_or_default(),
    };
    let body = json!({
        "test_run_title": notice.test_run_title,
        "message": "Test run updated",
    });
    backend.stats.record_notice(notice);
    padded(&params, &body)
}

pub fn router(script: RunScript, stats: TestServerStats) -> Router {
    let backend = Backend {
        script: Arc::new(script),
        stats,
    };
    Router::new()
        .route(PATH_CHART_DATA, get(handle_chart_data))
        .route(PATH_SUMMARY, get(handle_summary))
        .route(PATH_LOGS, get(handle_logs))
        .route(PATH_TEST_INFO, get(handle_test_info))
        .route(PATH_TEST_UPDATE, get(handle_test_update))
        .with_state(backend)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(RunScript::default()).await
    }

    pub async fn start_with(script: RunScript) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(script, stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
