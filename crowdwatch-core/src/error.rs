use crowdwatch_http::TransportErrorKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Network,
    MalformedResponse,
    TerminalNotify,
    InvalidConfig,
}

impl ErrorKind {
    /// Completion notices are fire-and-forget; everything else skips the cycle it happened in.
    #[must_use]
    pub fn is_ignorable(self) -> bool {
        matches!(self, Self::TerminalNotify)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request to {url} failed ({}): {source}", .source.kind())]
    Network {
        url: String,
        #[source]
        source: crowdwatch_http::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("completion notice for test run `{test_run_id}` failed: {source}")]
    TerminalNotify {
        test_run_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } | Self::HttpStatus { .. } => ErrorKind::Network,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::TerminalNotify { .. } => ErrorKind::TerminalNotify,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Transport-level cause for [`Error::Network`], including one wrapped in a notice failure.
    #[must_use]
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Network { source, .. } => Some(source.kind()),
            Self::TerminalNotify { source, .. } => source.transport_kind(),
            _ => None,
        }
    }

    pub(crate) fn malformed(url: &url::Url, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
