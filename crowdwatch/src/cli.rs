use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crowdwatch_core::YAxis;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    let unit = unit_str.trim();
    match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

fn parse_y_axis(input: &str) -> Result<YAxis, String> {
    input
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| format!("invalid y-axis '{input}' (expected ops, aops, avgl or avgd)"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Spinner with the latest numbers on stderr.
    HumanReadable,
    /// Emit one JSON line (NDJSON) per rendered panel to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "crowdwatch",
    author,
    version,
    about = "Live monitor for distributed load-test runs",
    long_about = "crowdwatch polls a load-test master (or a single worker) for the metrics of one test run and renders them as they arrive.\n\nPolling stops on its own once the run reaches FINISHED, ABORTED or CANCELLED; the final status is then reported back to the master.",
    after_help = "Examples:\n  crowdwatch watch --master http://10.0.0.2:8000 --test-run-id 42\n  crowdwatch watch --master http://10.0.0.2:8000 --test-run-id 42 --slave 10.0.0.7 --y-axis avgl\n  crowdwatch watch --config watch.yaml --dashboard\n  crowdwatch info --master http://10.0.0.2:8000 42"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow a test run until it ends
    #[command(
        long_about = "Poll the run's chart, response summary and log tails every interval until the run ends.\n\nFlags override values from --config."
    )]
    Watch(WatchArgs),

    /// Print the stored description of a test run
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Master base URL (e.g. http://10.0.0.2:8000)
    #[arg(long, env = "CROWDWATCH_MASTER")]
    pub master: Option<String>,

    /// Test run to follow
    #[arg(long)]
    pub test_run_id: Option<String>,

    /// Follow a single worker host instead of the aggregate (`total`)
    #[arg(long, value_name = "HOST")]
    pub slave: Option<String>,

    /// Port the workers serve their monitoring endpoints on
    #[arg(long)]
    pub web_port: Option<u16>,

    /// Metric to plot: ops, aops, avgl or avgd
    #[arg(long, value_parser = parse_y_axis)]
    pub y_axis: Option<YAxis>,

    /// Restrict the chart to an action label (repeatable)
    #[arg(long = "action", value_name = "ACTION")]
    pub actions: Vec<String>,

    /// Poll interval (e.g. 5s, 500ms)
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Per-request timeout (e.g. 3s)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Poll once, print the panels and exit
    #[arg(long)]
    pub once: bool,

    /// Serve a live dashboard on a loopback address
    #[arg(long)]
    pub dashboard: bool,

    /// Dashboard bind address (loopback only, default 127.0.0.1:0)
    #[arg(long, value_name = "ADDR")]
    pub dashboard_bind: Option<SocketAddr>,

    /// Dashboard port on 127.0.0.1
    #[arg(long, value_name = "PORT")]
    pub dashboard_port: Option<u16>,

    /// Write the dashboard as a static HTML file when the run ends
    #[arg(long, value_name = "FILE")]
    pub dashboard_out: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// YAML file with watch settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Master base URL
    #[arg(long, env = "CROWDWATCH_MASTER")]
    pub master: String,

    /// Test run id
    pub trid: String,

    /// Request timeout (e.g. 3s)
    #[arg(long, value_parser = parse_duration, default_value = "10s")]
    pub timeout: Duration,
}
