//! Polling and rendering for a live load-test monitor.
//!
//! [`Poller`] drives the fetch cycle against the master's monitoring endpoints and hands
//! rendered panels to a [`MonitorView`].

#![forbid(unsafe_code)]

pub mod chart;
mod client;
mod endpoints;
mod error;
pub mod info;
pub mod jsonp;
mod model;
mod poller;
pub mod render;
pub mod status;
mod view;

pub use chart::{ChartField, ChartView, Series};
pub use client::MonitorClient;
pub use endpoints::{Endpoint, MonitorUrls};
pub use error::{Error, ErrorKind, Result};
pub use info::InfoToggle;
pub use model::{
    ChartData, ChartPayload, CompletionNotice, DEFAULT_WEB_PORT, LogBundle, Logs, MetricSample,
    PollConfig, Stamp, SummaryRow, TOTAL, Target, TestInfo, TestRunStatus, UpdateAck, YAxis,
};
pub use poller::{DEFAULT_INTERVAL, Poller};
pub use status::StatusFields;
pub use view::{ConfigSource, FanOut, MonitorView, SharedConfig};
