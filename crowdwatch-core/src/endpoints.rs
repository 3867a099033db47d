use url::Url;

use crate::error::{Error, Result};
use crate::jsonp;
use crate::model::{CompletionNotice, PollConfig, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum Endpoint {
    #[strum(serialize = "/_get_chartdata")]
    ChartData,
    #[strum(serialize = "/_get_summary")]
    Summary,
    #[strum(serialize = "/_get_logs")]
    Logs,
    #[strum(serialize = "/_test_info")]
    TestInfo,
    #[strum(serialize = "/_test_update")]
    TestUpdate,
}

impl Endpoint {
    #[must_use]
    pub fn path(self) -> &'static str {
        self.into()
    }

    /// Monitoring endpoints may be cross-origin (worker hosts) and answer with padded JSON.
    #[must_use]
    pub fn is_padded(self) -> bool {
        matches!(self, Self::ChartData | Self::Summary | Self::Logs)
    }
}

/// Builds request URLs against the master (aggregate, persistence) or a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorUrls {
    master: Url,
}

impl MonitorUrls {
    pub fn new(master: &str) -> Result<Self> {
        let master = Url::parse(master.trim())
            .map_err(|err| Error::InvalidConfig(format!("invalid master url `{master}`: {err}")))?;
        if master.scheme() != "http" && master.scheme() != "https" {
            return Err(Error::InvalidConfig(format!(
                "master url must be http:// or https:// (got `{master}`)"
            )));
        }
        if master.cannot_be_a_base() || master.host_str().is_none() {
            return Err(Error::InvalidConfig(format!(
                "master url has no host: `{master}`"
            )));
        }
        Ok(Self { master })
    }

    #[must_use]
    pub fn master(&self) -> &Url {
        &self.master
    }

    pub fn chart_data(&self, cfg: &PollConfig) -> Result<Url> {
        let mut url = self.monitor_base(&cfg.target, cfg.web_port, Endpoint::ChartData)?;
        url.query_pairs_mut()
            .append_pair("test_run_id", &cfg.test_run_id)
            .append_pair("y_axis", <&'static str>::from(cfg.y_axis))
            .append_pair("actions", &cfg.actions_param())
            .append_pair("slave", cfg.target.as_str())
            .append_pair(jsonp::CALLBACK, jsonp::CALLBACK);
        Ok(url)
    }

    pub fn summary(&self, cfg: &PollConfig) -> Result<Url> {
        self.run_scoped(cfg, Endpoint::Summary)
    }

    pub fn logs(&self, cfg: &PollConfig) -> Result<Url> {
        self.run_scoped(cfg, Endpoint::Logs)
    }

    pub fn test_info(&self, trid: &str) -> Url {
        let mut url = self.master_endpoint(Endpoint::TestInfo);
        url.query_pairs_mut().append_pair("trid", trid);
        url
    }

    pub fn test_update(&self, notice: &CompletionNotice) -> Url {
        let mut url = self.master_endpoint(Endpoint::TestUpdate);
        url.query_pairs_mut()
            .append_pair("test_run_title", &notice.test_run_title)
            .append_pair("completed", &notice.completed.to_string())
            .append_pair("status", &notice.status.to_string());
        url
    }

    fn run_scoped(&self, cfg: &PollConfig, endpoint: Endpoint) -> Result<Url> {
        let mut url = self.monitor_base(&cfg.target, cfg.web_port, endpoint)?;
        url.query_pairs_mut()
            .append_pair("test_run_id", &cfg.test_run_id)
            .append_pair("slave", cfg.target.as_str())
            .append_pair(jsonp::CALLBACK, jsonp::CALLBACK);
        Ok(url)
    }

    fn master_endpoint(&self, endpoint: Endpoint) -> Url {
        let mut url = self.master.clone();
        url.set_query(None);
        url.set_fragment(None);
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{}", endpoint.path()));
        url
    }

    /// `total` goes through the master; a worker is addressed directly on its web port.
    fn monitor_base(&self, target: &Target, web_port: u16, endpoint: Endpoint) -> Result<Url> {
        match target.worker_host() {
            None => Ok(self.master_endpoint(endpoint)),
            Some(host) => {
                let raw = format!("http://{host}:{web_port}{}", endpoint.path());
                Url::parse(&raw).map_err(|err| {
                    Error::InvalidConfig(format!("invalid worker host `{host}`: {err}"))
                })
            }
        }
    }
}
