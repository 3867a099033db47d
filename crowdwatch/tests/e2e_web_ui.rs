use std::process::Stdio;
use std::time::Duration;

use anyhow::Context as _;
use crowdwatch_http::{HttpClient, HttpRequest};
use crowdwatch_testserver::{RunScript, TestServer};
use tokio::io::{AsyncBufReadExt as _, BufReader};

#[tokio::test]
async fn e2e_web_ui_serves_dashboard_and_applies_selection() -> anyhow::Result<()> {
    let server = TestServer::start_with(RunScript::default().after_polls(15))
        .await
        .context("start test server")?;
    let base_url = server.base_url().to_string();

    let exe = env!("CARGO_BIN_EXE_crowdwatch");
    let mut child = tokio::process::Command::new(exe)
        .arg("watch")
        .arg("--master")
        .arg(&base_url)
        .arg("--test-run-id")
        .arg("42")
        .arg("--interval")
        .arg("200ms")
        .arg("--output")
        .arg("json")
        .arg("--dashboard")
        .arg("--dashboard-bind")
        .arg("127.0.0.1:0")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("spawn crowdwatch")?;

    let stderr = child.stderr.take().context("missing stderr")?;
    let mut stderr_lines = BufReader::new(stderr).lines();

    let web_url = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(line) = stderr_lines.next_line().await? {
            if let Some(v) = line.strip_prefix("dashboard=") {
                return Ok::<_, anyhow::Error>(v.trim().to_string());
            }
        }
        anyhow::bail!("dashboard url not found on stderr");
    })
    .await
    .context("timed out waiting for dashboard url")??;

    let http = HttpClient::default();
    let get = |path: &str| {
        let url = format!("{web_url}{path}");
        let http = http.clone();
        async move {
            let req = HttpRequest::get(url).with_timeout(Some(Duration::from_secs(2)));
            http.request(req).await.context("dashboard request")
        }
    };

    let page = get("/").await?;
    anyhow::ensure!(page.is_success(), "GET / returned {}", page.status);
    let html = page.body_utf8().context("dashboard html is not utf-8")?;
    anyhow::ensure!(html.contains("test run 42"), "unexpected page: {html}");
    anyhow::ensure!(html.contains(r#"action="/select""#), "live page needs the selection form");

    // Redirects are not followed; a 303 means the selection was applied.
    let selected = get("/select?slave=total&y_axis=avgl&actions=login").await?;
    anyhow::ensure!(selected.status == 303, "GET /select returned {}", selected.status);

    let rejected = get("/select?y_axis=p99").await?;
    anyhow::ensure!(rejected.status == 400, "bad y_axis returned {}", rejected.status);

    let other = get("/info/7").await?;
    anyhow::ensure!(other.status == 404, "GET /info/7 returned {}", other.status);

    let toggled = get("/info/42").await?;
    anyhow::ensure!(toggled.status == 303, "GET /info returned {}", toggled.status);

    let snapshot = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let resp = get("/snapshot.json").await?;
            anyhow::ensure!(
                resp.header("content-type") == Some("application/json"),
                "snapshot content-type: {:?}",
                resp.header("content-type")
            );
            let v: serde_json::Value =
                serde_json::from_slice(&resp.body).context("parse snapshot json")?;
            if v["cycles_rendered"].as_u64().unwrap_or(0) > 0
                && v["selection"]["y_axis"] == "avgl"
            {
                return Ok::<_, anyhow::Error>(v);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .context("timed out waiting for a rendered cycle")??;

    anyhow::ensure!(
        snapshot["selection"]["actions"] == serde_json::json!(["login"]),
        "selection not applied: {snapshot}"
    );
    anyhow::ensure!(
        snapshot["info_html"]
            .as_str()
            .is_some_and(|s| s.contains("ramp to 50 users")),
        "info block not shown: {snapshot}"
    );

    let query = server
        .stats()
        .last_chart_query()
        .context("no chart request seen")?;
    anyhow::ensure!(
        query.get("y_axis").map(String::as_str) == Some("avgl"),
        "poller did not pick up the selection: {query:?}"
    );
    anyhow::ensure!(server.stats().info_requests() == 1, "expected one info fetch");

    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .context("timed out waiting for crowdwatch to exit")?
        .context("wait crowdwatch")?;
    server.shutdown().await;

    anyhow::ensure!(status.success(), "crowdwatch exited with {status}");
    Ok(())
}
