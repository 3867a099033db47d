use bytes::Bytes;
use http_body_util::{BodyExt as _, Empty};
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{Error, HttpRequest, HttpResponse, Result};

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        // The OS-level TCP connect timeout can be very long (tens of seconds), which makes
        // an unreachable worker stall its poll cycle. Fail connects promptly instead.
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(connect_timeout);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let inner = Client::builder(TokioExecutor::new()).build(https_connector);

        Self { inner }
    }

    /// `req.timeout` bounds the response head and the body read separately.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let timeout = req.timeout;
        let parsed = url::Url::parse(&req.url).map_err(|_| Error::InvalidUrl(req.url.clone()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::UnsupportedScheme(req.url));
        }

        let uri: hyper::Uri = req
            .url
            .parse()
            .map_err(|_| Error::InvalidUrl(req.url.to_string()))?;

        let mut builder = Request::builder().method(http::Method::GET).uri(uri);
        if let Some(host) = host_header_value(&parsed) {
            builder = builder.header(http::header::HOST, host);
        }
        let request: Request<Empty<Bytes>> = builder
            .body(Empty::new())
            .map_err(|_| Error::InvalidUrl(req.url.clone()))?;

        tracing::debug!(url = %parsed, "GET");

        let res: hyper::Response<Incoming> = if let Some(timeout) = timeout {
            match tokio::time::timeout(timeout, self.inner.request(request)).await {
                Ok(res) => res?,
                Err(_) => return Err(Error::Timeout(timeout)),
            }
        } else {
            self.inner.request(request).await?
        };

        let (parts, body) = res.into_parts();
        let status = parts.status.as_u16();

        // Normalize headers to lowercase keys.
        // If there are multiple values for a header, join them with ", ".
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in parts.headers.iter() {
            let key = name.as_str().to_ascii_lowercase();
            let v = String::from_utf8_lossy(value.as_bytes()).to_string();
            merged
                .entry(key)
                .and_modify(|cur| {
                    if !cur.is_empty() {
                        cur.push_str(", ");
                    }
                    cur.push_str(&v);
                })
                .or_insert(v);
        }
        let headers: Vec<(String, String)> = merged.into_iter().collect();

        let body = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, body.collect()).await {
                Ok(collected) => collected?.to_bytes(),
                Err(_) => return Err(Error::Timeout(timeout)),
            },
            None => body.collect().await?.to_bytes(),
        };

        tracing::debug!(status, bytes = body.len(), "response");

        Ok(HttpResponse {
            status,
            body,
            headers,
        })
    }
}

/// Workers are addressed as `host:web_port`; keep the port in Host unless it is the scheme default.
fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match (parsed.port(), parsed.scheme()) {
        (Some(80), "http") | (Some(443), "https") | (None, _) => Some(host.to_string()),
        (Some(port), _) => Some(format!("{host}:{port}")),
    }
}
