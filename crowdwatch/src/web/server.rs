use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use crowdwatch_core::{ConfigSource as _, InfoToggle, Poller, SharedConfig, Target, YAxis};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::dashboard::{Dashboard, RenderMode};

#[derive(Debug, Clone, Copy)]
pub struct WebUiConfig {
    pub bind_addr: SocketAddr,
}

/// Everything the handlers read or steer.
#[derive(Clone)]
pub struct WebControls {
    pub dashboard: Arc<Dashboard>,
    pub config: Arc<SharedConfig>,
    pub poller: Arc<Poller>,
    pub info: Arc<InfoToggle>,
}

#[derive(Debug)]
pub struct WebUi {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl WebUi {
    pub async fn start(cfg: WebUiConfig, controls: WebControls) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(cfg.bind_addr)
            .await
            .with_context(|| format!("failed to bind web ui: {}", cfg.bind_addr))?;
        let addr = listener
            .local_addr()
            .context("failed to resolve web ui address")?;

        let app = router(controls);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let _ = self.task.await;
    }
}

fn router(controls: WebControls) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/snapshot.json", get(snapshot))
        .route("/select", get(select))
        .route("/info/{trid}", get(info))
        .with_state(controls)
}

async fn index(State(controls): State<WebControls>) -> Response {
    match controls.dashboard.render_html(RenderMode::Live) {
        Ok(html) => Html(html).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")).into_response(),
    }
}

async fn snapshot(State(controls): State<WebControls>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        controls.dashboard.snapshot_json(),
    )
}

#[derive(Debug, Deserialize)]
struct SelectParams {
    slave: Option<String>,
    y_axis: Option<String>,
    actions: Option<String>,
}

/// Change the selection and poll right away instead of waiting for the next tick.
async fn select(
    State(controls): State<WebControls>,
    Query(params): Query<SelectParams>,
) -> Response {
    let y_axis = match params
        .y_axis
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<YAxis>)
        .transpose()
    {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid y_axis").into_response(),
    };

    controls.config.update(|cfg| {
        if let Some(slave) = &params.slave {
            cfg.target = Target::new(slave);
        }
        if let Some(y_axis) = y_axis {
            cfg.y_axis = y_axis;
        }
        if let Some(actions) = &params.actions {
            cfg.set_actions(actions.split(','));
        }
    });
    controls.poller.refresh();

    Redirect::to("/").into_response()
}

/// Only the watched run has an info block on the page.
async fn info(State(controls): State<WebControls>, Path(trid): Path<String>) -> Response {
    if trid != controls.config.poll_config().test_run_id {
        return (StatusCode::NOT_FOUND, "not the watched test run").into_response();
    }
    match controls.info.toggle(&trid).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => (StatusCode::BAD_GATEWAY, err.to_string()).into_response(),
    }
}
