use crowdwatch_core::info::no_description;
use crowdwatch_core::{ErrorKind, InfoToggle, MonitorClient};
use crowdwatch_testserver::{RunScript, TestServer};

#[tokio::test]
async fn toggle_fetches_on_every_click() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let toggle = InfoToggle::new(MonitorClient::new(server.base_url())?);

    let shown = toggle.toggle("42").await?;
    assert_eq!(shown, "<pre><code>ramp to 50 users</code></pre>");
    assert_eq!(toggle.content("42"), shown);

    assert_eq!(toggle.toggle("42").await?, "");
    assert_eq!(toggle.content("42"), "");
    assert_eq!(server.stats().info_requests(), 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unknown_run_shows_no_description_notice() -> anyhow::Result<()> {
    let server = TestServer::start_with(RunScript::default().without_description()).await?;
    let toggle = InfoToggle::new(MonitorClient::new(server.base_url())?);

    assert_eq!(toggle.toggle("42").await?, no_description("42"));
    assert_eq!(toggle.toggle("7").await?, no_description("7"));
    assert_eq!(toggle.content("42"), no_description("42"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_master_is_a_network_error() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let base_url = server.base_url().to_string();
    server.shutdown().await;

    let toggle = InfoToggle::new(MonitorClient::new(&base_url)?);
    let err = match toggle.toggle("42").await {
        Ok(content) => anyhow::bail!("expected an error, got {content:?}"),
        Err(err) => err,
    };
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(toggle.content("42"), "");
    Ok(())
}
