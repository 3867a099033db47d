use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::model::{ChartData, Stamp, TestRunStatus};

/// Text fields shown next to the chart.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StatusFields {
    pub status: TestRunStatus,
    pub started: String,
    pub finished: String,
    pub progress: String,
}

impl StatusFields {
    #[must_use]
    pub fn from_chart(data: &ChartData) -> Self {
        Self {
            status: data.status.clone(),
            started: stamp_field(&data.started),
            finished: stamp_field(&data.finished),
            progress: data.progress.to_string(),
        }
    }
}

fn stamp_field(stamp: &Stamp) -> String {
    format!("{} [timestamp: {} ]", human_time(stamp), stamp)
}

/// `7 Mar 2024 09:05:01` (UTC) for numeric stamps; text stamps are returned unchanged.
#[must_use]
pub fn human_time(stamp: &Stamp) -> String {
    let Some(secs) = stamp.as_seconds() else {
        return stamp.to_string();
    };

    // Millisecond precision; anything outside the calendar range is shown raw.
    let Some(nanos) = ((secs * 1_000.0).round() as i128).checked_mul(1_000_000) else {
        return stamp.to_string();
    };
    let Ok(dt) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
        return stamp.to_string();
    };

    let fmt = format_description!(
        "[day padding:none] [month repr:short] [year] [hour]:[minute]:[second]"
    );
    dt.format(&fmt).unwrap_or_else(|_| stamp.to_string())
}
