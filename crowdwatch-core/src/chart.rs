//! Line chart of pass/fail/incomplete samples over time.
//!
//! The view is rebuilt from the full sample sequence on every poll; nothing is patched
//! incrementally. Only the most recent [`VISIBLE_SAMPLES`] points are in view.

use std::fmt::Write as _;
use std::ops::Range;

use serde::Serialize;

use crate::model::{MetricSample, YAxis};
use crate::render::escape_html;

pub const VISIBLE_SAMPLES: usize = 60;

pub const CATEGORY_AXIS_TITLE: &str =
    "Timeline (seconds elapsed after test started) - Last hour activity";

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 360.0;
const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 120.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MAX_X_LABELS: usize = 20;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChartField {
    Failed,
    Passed,
    Incomplete,
}

impl ChartField {
    pub const ALL: [Self; 3] = [Self::Failed, Self::Passed, Self::Incomplete];

    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Failed => "red",
            Self::Passed => "green",
            Self::Incomplete => "blue",
        }
    }

    #[must_use]
    pub fn value(self, sample: &MetricSample) -> f64 {
        match self {
            Self::Failed => sample.failed,
            Self::Passed => sample.passed,
            Self::Incomplete => sample.incomplete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub field: ChartField,
    pub color: &'static str,
    /// One value per category, full sequence.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub title: String,
    pub value_axis_title: String,
    pub category_axis_title: String,
    /// Sample timestamps, full sequence.
    pub categories: Vec<i64>,
    pub series: Vec<Series>,
    /// Index range of `categories` currently in view.
    pub window: Range<usize>,
}

/// Build the chart for `samples`, one line per entry of `fields` (duplicates ignored).
pub fn render(samples: &[MetricSample], fields: &[ChartField], y_axis: YAxis) -> ChartView {
    let mut series: Vec<Series> = Vec::with_capacity(fields.len());
    for &field in fields {
        if series.iter().any(|s| s.field == field) {
            continue;
        }
        series.push(Series {
            field,
            color: field.color(),
            values: samples.iter().map(|s| field.value(s)).collect(),
        });
    }

    let len = samples.len();
    ChartView {
        title: y_axis.title().to_string(),
        value_axis_title: y_axis.unit().to_string(),
        category_axis_title: CATEGORY_AXIS_TITLE.to_string(),
        categories: samples.iter().map(|s| s.timestamp).collect(),
        series,
        window: len.saturating_sub(VISIBLE_SAMPLES)..len,
    }
}

impl ChartView {
    #[must_use]
    pub fn visible_categories(&self) -> &[i64] {
        &self.categories[self.window.clone()]
    }

    #[must_use]
    pub fn visible_values<'a>(&self, series: &'a Series) -> &'a [f64] {
        series.values.get(self.window.clone()).unwrap_or(&[])
    }

    #[must_use]
    pub fn latest(&self, field: ChartField) -> Option<f64> {
        self.series
            .iter()
            .find(|s| s.field == field)
            .and_then(|s| s.values.last().copied())
    }

    /// Inline SVG of the visible window.
    #[must_use]
    pub fn to_svg(&self) -> String {
        let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let bottom = MARGIN_TOP + plot_h;

        let categories = self.visible_categories();
        let n = categories.len();

        let y_max = self
            .series
            .iter()
            .flat_map(|s| self.visible_values(s).iter().copied())
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);
        let y_max = if y_max > 0.0 { y_max } else { 1.0 };

        let x_at = |i: usize| -> f64 {
            if n <= 1 {
                MARGIN_LEFT + plot_w / 2.0
            } else {
                MARGIN_LEFT + (i as f64) * plot_w / ((n - 1) as f64)
            }
        };
        let y_at = |v: f64| -> f64 {
            let v = if v.is_finite() { v.max(0.0) } else { 0.0 };
            bottom - (v / y_max) * plot_h
        };

        let mut out = String::with_capacity(4096);
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="chart" viewBox="0 0 {WIDTH} {HEIGHT}" role="img" aria-label="{title}">"#,
            title = escape_html(&self.title)
        );
        let _ = write!(
            out,
            r#"<text class="chart-title" x="{x:.1}" y="20" text-anchor="middle">{title}</text>"#,
            x = MARGIN_LEFT + plot_w / 2.0,
            title = escape_html(&self.title)
        );

        // axes
        let _ = write!(
            out,
            r##"<g class="axes" stroke="#444"><line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{bottom}"/><line x1="{MARGIN_LEFT}" y1="{bottom}" x2="{right}" y2="{bottom}"/></g>"##,
            right = MARGIN_LEFT + plot_w
        );

        for tick in [0.0, y_max / 2.0, y_max] {
            let _ = write!(
                out,
                r#"<text class="y-tick" x="{x:.1}" y="{y:.1}" text-anchor="end">{label}</text>"#,
                x = MARGIN_LEFT - 6.0,
                y = y_at(tick) + 4.0,
                label = format_tick(tick)
            );
        }

        let step = n.div_ceil(MAX_X_LABELS).max(1);
        for (i, ts) in categories.iter().enumerate().step_by(step) {
            let x = x_at(i);
            let y = bottom + 8.0;
            let _ = write!(
                out,
                r#"<text class="x-tick" x="{x:.1}" y="{y:.1}" transform="rotate(90 {x:.1} {y:.1})">{ts}</text>"#
            );
        }

        let _ = write!(
            out,
            r#"<text class="axis-title value-axis" x="16" y="{y:.1}" transform="rotate(-90 16 {y:.1})" text-anchor="middle">{t}</text>"#,
            y = MARGIN_TOP + plot_h / 2.0,
            t = escape_html(&self.value_axis_title)
        );
        let _ = write!(
            out,
            r#"<text class="axis-title category-axis" x="{x:.1}" y="{y:.1}" text-anchor="middle">{t}</text>"#,
            x = MARGIN_LEFT + plot_w / 2.0,
            y = HEIGHT - 6.0,
            t = escape_html(&self.category_axis_title)
        );

        for s in &self.series {
            let values = self.visible_values(s);
            let points = values
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{:.1},{:.1}", x_at(i), y_at(*v)))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = write!(
                out,
                r#"<polyline class="series series-{field}" fill="none" stroke="{color}" stroke-width="2" points="{points}"/>"#,
                field = s.field,
                color = s.color
            );
            for (i, v) in values.iter().enumerate() {
                let _ = write!(
                    out,
                    r#"<circle class="bullet bullet-{field}" cx="{cx:.1}" cy="{cy:.1}" r="2.5" fill="{color}"/>"#,
                    field = s.field,
                    cx = x_at(i),
                    cy = y_at(*v),
                    color = s.color
                );
            }
        }

        out.push_str(r#"<g class="legend">"#);
        for (i, s) in self.series.iter().enumerate() {
            let y = MARGIN_TOP + 8.0 + (i as f64) * 18.0;
            let x = WIDTH - MARGIN_RIGHT + 16.0;
            let _ = write!(
                out,
                r#"<rect x="{x:.1}" y="{ry:.1}" width="12" height="4" fill="{color}"/><text x="{tx:.1}" y="{y:.1}">{field}</text>"#,
                ry = y - 4.0,
                tx = x + 18.0,
                color = s.color,
                field = s.field
            );
        }
        out.push_str("</g></svg>");
        out
    }
}

fn format_tick(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(n: usize) -> Vec<MetricSample> {
        (0..n)
            .map(|i| MetricSample {
                timestamp: i as i64,
                failed: (i % 3) as f64,
                passed: (i * 2) as f64,
                incomplete: 1.0,
            })
            .collect()
    }

    #[test]
    fn one_line_per_selected_field_with_fixed_colors() {
        let view = render(&samples(10), &ChartField::ALL, YAxis::Ops);
        let svg = view.to_svg();

        assert_eq!(svg.matches("<polyline").count(), 3);
        assert!(svg.contains(r#"class="series series-failed" fill="none" stroke="red""#));
        assert!(svg.contains(r#"class="series series-passed" fill="none" stroke="green""#));
        assert!(svg.contains(r#"class="series series-incomplete" fill="none" stroke="blue""#));

        let only_failed = render(&samples(10), &[ChartField::Failed], YAxis::Ops);
        assert_eq!(only_failed.series.len(), 1);
        assert_eq!(only_failed.to_svg().matches("<polyline").count(), 1);
    }

    #[test]
    fn duplicate_fields_draw_a_single_line() {
        let view = render(
            &samples(4),
            &[ChartField::Passed, ChartField::Passed, ChartField::Failed],
            YAxis::Ops,
        );
        let fields: Vec<ChartField> = view.series.iter().map(|s| s.field).collect();
        assert_eq!(fields, vec![ChartField::Passed, ChartField::Failed]);
    }

    #[test]
    fn window_covers_last_sixty_samples() {
        for n in [0_usize, 1, 59, 60, 61, 500] {
            let view = render(&samples(n), &ChartField::ALL, YAxis::Ops);
            assert_eq!(view.window.len(), n.min(VISIBLE_SAMPLES), "n={n}");
            assert_eq!(view.window.end, n, "n={n}");
            assert_eq!(view.categories.len(), n);
            if n > 0 {
                assert_eq!(view.visible_categories().last(), Some(&((n - 1) as i64)));
            }
        }
    }

    #[test]
    fn svg_only_plots_visible_window() {
        let view = render(&samples(100), &[ChartField::Passed], YAxis::Ops);
        let svg = view.to_svg();
        assert_eq!(svg.matches("bullet-passed").count(), VISIBLE_SAMPLES);
    }

    #[test]
    fn axis_titles_follow_selected_metric() {
        let latency = render(&samples(3), &ChartField::ALL, YAxis::Avgl);
        assert_eq!(latency.value_axis_title, "milliseconds");
        assert_eq!(latency.title, YAxis::Avgl.title());
        assert_eq!(latency.category_axis_title, CATEGORY_AXIS_TITLE);

        let rate = render(&samples(3), &ChartField::ALL, YAxis::Aops);
        assert_eq!(rate.value_axis_title, "op/sec");
        assert!(rate.to_svg().contains(">op/sec</text>"));
    }

    #[test]
    fn empty_sequence_still_renders() {
        let view = render(&[], &ChartField::ALL, YAxis::Ops);
        assert!(view.window.is_empty());
        let svg = view.to_svg();
        assert_eq!(svg.matches("<polyline").count(), 3);
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn latest_reads_last_sample() {
        let view = render(&samples(5), &ChartField::ALL, YAxis::Ops);
        assert_eq!(view.latest(ChartField::Passed), Some(8.0));
        assert_eq!(view.latest(ChartField::Incomplete), Some(1.0));
    }
}
