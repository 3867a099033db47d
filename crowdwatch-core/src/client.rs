use std::time::Duration;

use crowdwatch_http::{HttpClient, HttpRequest};
use serde::de::DeserializeOwned;
use url::Url;

use crate::endpoints::{Endpoint, MonitorUrls};
use crate::error::{Error, Result};
use crate::jsonp;
use crate::model::{
    ChartData, ChartPayload, CompletionNotice, LogBundle, PollConfig, SummaryRow, TestInfo,
    UpdateAck,
};

/// Typed access to the master's and workers' monitoring endpoints.
#[derive(Debug, Clone)]
pub struct MonitorClient {
    http: HttpClient,
    urls: MonitorUrls,
    timeout: Option<Duration>,
}

impl MonitorClient {
    pub fn new(master: &str) -> Result<Self> {
        Ok(Self {
            http: HttpClient::default(),
            urls: MonitorUrls::new(master)?,
            timeout: None,
        })
    }

    /// Per-request timeout (connect timeout is configured on the http client).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn urls(&self) -> &MonitorUrls {
        &self.urls
    }

    pub async fn chart_data(&self, cfg: &PollConfig) -> Result<ChartData> {
        let url = self.urls.chart_data(cfg)?;
        let payload: ChartPayload = self.fetch(&url, Endpoint::ChartData).await?;
        ChartData::from_payload(payload, &cfg.target).map_err(|reason| Error::malformed(&url, reason))
    }

    pub async fn summary(&self, cfg: &PollConfig) -> Result<Vec<SummaryRow>> {
        let url = self.urls.summary(cfg)?;
        self.fetch(&url, Endpoint::Summary).await
    }

    pub async fn logs(&self, cfg: &PollConfig) -> Result<Vec<LogBundle>> {
        let url = self.urls.logs(cfg)?;
        self.fetch(&url, Endpoint::Logs).await
    }

    pub async fn test_info(&self, trid: &str) -> Result<TestInfo> {
        let url = self.urls.test_info(trid);
        self.fetch(&url, Endpoint::TestInfo).await
    }

    /// Failures come back as [`Error::TerminalNotify`]; callers are free to drop them.
    pub async fn notify_completion(&self, notice: &CompletionNotice) -> Result<UpdateAck> {
        let url = self.urls.test_update(notice);
        self.fetch(&url, Endpoint::TestUpdate)
            .await
            .map_err(|err| Error::TerminalNotify {
                test_run_id: notice.test_run_title.clone(),
                source: Box::new(err),
            })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &Url, endpoint: Endpoint) -> Result<T> {
        tracing::debug!(%endpoint, padded = endpoint.is_padded(), %url, "fetch");

        let req = HttpRequest::get(url.as_str()).with_timeout(self.timeout);
        let res = self.http.request(req).await.map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })?;

        tracing::debug!(
            %endpoint,
            status = res.status,
            content_type = res.header("content-type").unwrap_or("-"),
            "answered"
        );
        if !res.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: res.status,
            });
        }

        let body = res
            .body_utf8()
            .ok_or_else(|| Error::malformed(url, "body is not valid UTF-8"))?;

        jsonp::decode(body).map_err(|reason| Error::malformed(url, reason))
    }
}
