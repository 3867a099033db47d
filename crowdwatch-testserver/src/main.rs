use std::net::SocketAddr;

use crowdwatch_testserver::RunScript;
use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut script = RunScript::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--polls" => {
                let polls = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--polls requires a number"))?;
                script = script.after_polls(polls.parse()?);
            }
            "--final-status" => {
                let status = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--final-status requires a value"))?;
                script = script.finishing_with(&status);
            }
            "-h" | "--help" => {
                eprintln!(
                    "crowdwatch-testserver\n\nUSAGE:\n  crowdwatch-testserver [--bind 127.0.0.1:0] [--polls N] [--final-status FINISHED]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let stats = crowdwatch_testserver::TestServerStats::default();
    let app = crowdwatch_testserver::router(script, stats);

    println!("HTTP_URL=http://{addr}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
