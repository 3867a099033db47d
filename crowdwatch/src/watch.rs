use anyhow::Context as _;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use crowdwatch_core::{
    ConfigSource, FanOut, InfoToggle, MonitorClient, MonitorView, Poller, SharedConfig,
    TestRunStatus,
};

use crate::cli::WatchArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;
use crate::watch_config::{self, WatchConfig, WatchConfigYaml};
use crate::web::{Dashboard, RenderMode, WebControls, WebUi, WebUiConfig};

pub async fn watch(args: WatchArgs) -> Result<ExitCode, RunError> {
    let file = match &args.config {
        Some(path) => watch_config::load(path)
            .await
            .map_err(RunError::InvalidInput)?,
        None => WatchConfigYaml::default(),
    };
    let cfg = watch_config::resolve(&args, file).map_err(RunError::InvalidInput)?;

    if !args.dashboard && (args.dashboard_port.is_some() || args.dashboard_bind.is_some()) {
        return Err(RunError::InvalidInput(anyhow::anyhow!(
            "--dashboard-port/--dashboard-bind requires --dashboard"
        )));
    }
    let bind_addr = if args.dashboard {
        let addr = dashboard_bind_addr(&args);
        if !addr.ip().is_loopback() {
            return Err(RunError::InvalidInput(anyhow::anyhow!(
                "--dashboard-bind must be a loopback address (got {addr}); remote binding is not supported"
            )));
        }
        Some(addr)
    } else {
        None
    };

    let client = MonitorClient::new(&cfg.master)
        .map_err(RunError::from_monitor)?
        .with_timeout(Some(cfg.timeout));
    let config = Arc::new(SharedConfig::new(cfg.poll.clone()));

    let out = output::formatter(args.output);
    out.print_header(&cfg);

    let info = Arc::new(InfoToggle::new(client.clone()));
    let dashboard = (args.dashboard || cfg.dashboard_out.is_some()).then(|| {
        Arc::new(Dashboard::new(
            config.clone() as Arc<dyn ConfigSource>,
            info.clone(),
            cfg.interval,
        ))
    });

    let mut views = FanOut::new(vec![out.view()]);
    if let Some(d) = &dashboard {
        views.push(d.clone() as Arc<dyn MonitorView>);
    }
    let poller = Arc::new(Poller::new(
        client,
        config.clone() as Arc<dyn ConfigSource>,
        Arc::new(views),
    ));

    let web_ui = match (bind_addr, &dashboard) {
        (Some(bind_addr), Some(dashboard)) => {
            let controls = WebControls {
                dashboard: dashboard.clone(),
                config: config.clone(),
                poller: poller.clone(),
                info,
            };
            let web = WebUi::start(WebUiConfig { bind_addr }, controls)
                .await
                .map_err(RunError::RuntimeError)?;
            eprintln!("dashboard={}", web.url());
            Some(web)
        }
        _ => None,
    };

    let outcome = if args.once {
        single_cycle(&poller).await?
    } else {
        follow(&poller, &cfg).await
    };
    out.print_outcome(outcome.as_ref());

    if let (Some(path), Some(dashboard)) = (&cfg.dashboard_out, &dashboard) {
        write_dashboard(path, dashboard)
            .await
            .map_err(RunError::RuntimeError)?;
    }

    if let Some(web) = web_ui {
        web.shutdown().await;
    }

    Ok(outcome
        .as_ref()
        .map_or(ExitCode::Success, ExitCode::from_status))
}

/// `--once`: one cycle, no timer. The outcome is the status that cycle saw.
async fn single_cycle(poller: &Poller) -> Result<Option<TestRunStatus>, RunError> {
    let status = poller.poll_once().await.ok_or_else(|| {
        RunError::RuntimeError(anyhow::anyhow!("poll failed: chart data unavailable"))
    })?;
    if poller.is_terminal() {
        poller.flush().await;
    }
    Ok(Some(status))
}

/// Poll until the run ends or the user interrupts. `None` means interrupted.
async fn follow(poller: &Poller, cfg: &WatchConfig) -> Option<TestRunStatus> {
    tracing::debug!(
        test_run_id = %cfg.poll.test_run_id,
        interval = ?cfg.interval,
        "watch started"
    );
    poller.start(cfg.interval);

    let status = tokio::select! {
        status = poller.wait_terminal() => status,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping the poll timer");
            poller.cancel();
            None
        }
    };
    poller.flush().await;
    status
}

async fn write_dashboard(path: &Path, dashboard: &Dashboard) -> anyhow::Result<()> {
    let html = dashboard.render_html(RenderMode::Offline)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!(
                "failed to create dashboard output dir: {}",
                parent.display()
            )
        })?;
    }
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("failed to write dashboard html: {}", path.display()))
}

fn dashboard_bind_addr(args: &WatchArgs) -> SocketAddr {
    if let Some(addr) = args.dashboard_bind {
        return addr;
    }

    let port = args.dashboard_port.unwrap_or(0);
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}
