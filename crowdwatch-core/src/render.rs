//! HTML fragments for the response summary and the worker log tails.
//!
//! All backend text is escaped before it is interpolated.

use std::fmt::Write as _;

use crate::model::{LogBundle, SummaryRow};

pub const SUMMARY_HEADING: &str = "Summary of responses";
pub const LOGS_HEADING: &str = "Debug information (limited to last 10 lines)";

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Response-code summary table.
pub fn render_summary(rows: &[SummaryRow]) -> String {
    let mut out = String::new();
    let _ = write!(out, "<h5>{SUMMARY_HEADING}</h5>");
    out.push_str(
        "<table class=\"summary\"><tr><th>Count</th><th>Response Code</th><th>Response Reason</th></tr>",
    );
    for row in rows {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            row.count,
            escape_html(&row.code),
            escape_html(&row.reason)
        );
    }
    out.push_str("</table>");
    out
}

/// Log tails, one block per worker. The backend already truncates to the last lines.
pub fn render_logs(bundles: &[LogBundle]) -> String {
    let mut out = String::new();
    let _ = write!(out, "<h5>{LOGS_HEADING}</h5>");
    for bundle in bundles {
        let label = bundle
            .host
            .as_deref()
            .map(|h| format!(" {}", escape_html(host_label(h))))
            .unwrap_or_default();
        let _ = write!(
            out,
            "<p><strong>Logs from Slave Host{label}:</strong></p>\
             <p><i>Test run logs:</i><br>{}</p>\
             <p><i>Monitor agent logs:</i><br>{}</p>",
            log_html(&bundle.logs.testrun),
            log_html(&bundle.logs.monitor)
        );
    }
    out
}

/// Host part of a `host:port` Host header value.
#[must_use]
pub fn host_label(host: &str) -> &str {
    match host.find(':') {
        Some(idx) => &host[..idx],
        None => host,
    }
}

/// Escaped `\n` sequences and real newlines both become line breaks; blank lines collapse.
fn log_html(raw: &str) -> String {
    raw.replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br>")
}
