use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use crowdwatch_core::{DEFAULT_INTERVAL, PollConfig, Target, YAxis};
use serde::Deserialize;

use crate::cli::WatchArgs;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// `--config` file. Every key is optional; flags given on the command line win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct WatchConfigYaml {
    #[serde(default)]
    pub master: Option<String>,

    #[serde(default, deserialize_with = "deserialize_id")]
    pub test_run_id: Option<String>,

    /// Worker host; `total` (or absent) means the aggregate.
    #[serde(default)]
    pub slave: Option<String>,

    #[serde(default)]
    pub web_port: Option<u16>,

    #[serde(default)]
    pub y_axis: Option<YAxis>,

    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default)]
    pub interval: Option<YamlDuration>,

    #[serde(default)]
    pub timeout: Option<YamlDuration>,

    #[serde(default)]
    pub dashboard_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 5s, 500ms) or seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v < 0 {
                    return Err(E::custom("duration must not be negative"));
                }
                Ok(YamlDuration(Duration::from_secs(v as u64)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a finite, non-negative number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Test run ids are often written unquoted (`testRunId: 42`).
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "testRunId must be a string or number, got {other:?}"
        ))),
    }
}

pub(crate) async fn load(path: &Path) -> anyhow::Result<WatchConfigYaml> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    serde_yaml::from_slice(&bytes)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

/// Fully resolved settings for one `watch` invocation.
#[derive(Debug, Clone)]
pub(crate) struct WatchConfig {
    pub master: String,
    pub poll: PollConfig,
    pub interval: Duration,
    pub timeout: Duration,
    pub dashboard_out: Option<PathBuf>,
}

/// Defaults, then the config file, then flags.
pub(crate) fn resolve(args: &WatchArgs, file: WatchConfigYaml) -> anyhow::Result<WatchConfig> {
    let master = args
        .master
        .clone()
        .or(file.master)
        .filter(|m| !m.trim().is_empty())
        .context("missing master URL (use --master or `master:` in --config)")?;

    let test_run_id = args
        .test_run_id
        .clone()
        .or(file.test_run_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .context("missing test run id (use --test-run-id or `testRunId:` in --config)")?;

    let mut poll = PollConfig::new(test_run_id);
    if let Some(slave) = args.slave.as_deref().or(file.slave.as_deref()) {
        poll.target = Target::new(slave);
    }
    if let Some(port) = args.web_port.or(file.web_port) {
        anyhow::ensure!(port != 0, "web port must not be 0");
        poll.web_port = port;
    }
    if let Some(y_axis) = args.y_axis.or(file.y_axis) {
        poll.y_axis = y_axis;
    }
    if args.actions.is_empty() {
        poll.set_actions(file.actions);
    } else {
        poll.set_actions(args.actions.iter().map(String::as_str));
    }

    let interval = args
        .interval
        .or(file.interval.map(YamlDuration::into_inner))
        .unwrap_or(DEFAULT_INTERVAL);
    anyhow::ensure!(!interval.is_zero(), "poll interval must be greater than 0");

    let timeout = args
        .timeout
        .or(file.timeout.map(YamlDuration::into_inner))
        .unwrap_or(DEFAULT_TIMEOUT);
    anyhow::ensure!(!timeout.is_zero(), "request timeout must be greater than 0");

    Ok(WatchConfig {
        master,
        poll,
        interval,
        timeout,
        dashboard_out: args.dashboard_out.clone().or(file.dashboard_out),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser as _;

    fn watch_args(extra: &[&str]) -> WatchArgs {
        let mut argv = vec!["crowdwatch", "watch"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Watch(args) => args,
            Command::Info(_) => panic!("expected watch command"),
        }
    }

    #[test]
    fn yaml_accepts_numeric_ids_and_human_durations() {
        let yaml = r#"
master: http://10.0.0.2:8000
testRunId: 42
slave: 10.0.0.7
webPort: 8081
yAxis: aops
actions: [login, search]
interval: 2s
timeout: 1.5
"#;
        let file: WatchConfigYaml = serde_yaml::from_str(yaml).unwrap();
        let cfg = resolve(&watch_args(&[]), file).unwrap();

        assert_eq!(cfg.master, "http://10.0.0.2:8000");
        assert_eq!(cfg.poll.test_run_id, "42");
        assert_eq!(cfg.poll.target, Target::new("10.0.0.7"));
        assert_eq!(cfg.poll.web_port, 8081);
        assert_eq!(cfg.poll.y_axis, YAxis::Aops);
        assert_eq!(cfg.poll.actions, vec!["login", "search"]);
        assert_eq!(cfg.interval, Duration::from_secs(2));
        assert_eq!(cfg.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn flags_override_file_values() {
        let file: WatchConfigYaml = serde_yaml::from_str(
            "master: http://file:8000\ntestRunId: '7'\nyAxis: avgl\nactions: [a]\ninterval: 1m\n",
        )
        .unwrap();
        let args = watch_args(&[
            "--master",
            "http://flag:8000",
            "--y-axis",
            "ops",
            "--action",
            "b",
            "--interval",
            "250ms",
        ]);

        let cfg = resolve(&args, file).unwrap();
        assert_eq!(cfg.master, "http://flag:8000");
        assert_eq!(cfg.poll.test_run_id, "7");
        assert_eq!(cfg.poll.y_axis, YAxis::Ops);
        assert_eq!(cfg.poll.actions, vec!["b"]);
        assert_eq!(cfg.interval, Duration::from_millis(250));
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn defaults_apply_without_file() {
        let args = watch_args(&["--master", "http://m:8000", "--test-run-id", "9"]);
        let cfg = resolve(&args, WatchConfigYaml::default()).unwrap();
        assert_eq!(cfg.poll.target, Target::Total);
        assert_eq!(cfg.poll.web_port, crowdwatch_core::DEFAULT_WEB_PORT);
        assert_eq!(cfg.interval, DEFAULT_INTERVAL);
        assert!(cfg.dashboard_out.is_none());
    }

    #[test]
    fn missing_test_run_id_is_rejected() {
        let args = watch_args(&["--master", "http://m:8000"]);
        let err = resolve(&args, WatchConfigYaml::default()).unwrap_err();
        assert!(err.to_string().contains("test run id"), "{err}");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let args = watch_args(&[
            "--master",
            "http://m:8000",
            "--test-run-id",
            "9",
            "--interval",
            "0s",
        ]);
        assert!(resolve(&args, WatchConfigYaml::default()).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: Result<WatchConfigYaml, _> = serde_yaml::from_str("mastr: http://m\n");
        assert!(parsed.is_err());
    }
}
