use std::sync::Arc;

use crowdwatch_core::{MonitorView, TestRunStatus};

use crate::cli::OutputFormat;
use crate::watch_config::WatchConfig;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, cfg: &WatchConfig);
    fn view(&self) -> Arc<dyn MonitorView>;
    /// `None` when the watch was interrupted before the run ended.
    fn print_outcome(&self, status: Option<&TestRunStatus>);
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
