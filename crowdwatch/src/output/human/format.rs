pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

/// A chart value with its unit: latencies keep one decimal, rates are whole numbers.
pub(crate) fn format_metric(v: f64, unit: &str) -> String {
    if unit == "milliseconds" {
        if v.is_finite() {
            format!("{v:.1}ms")
        } else {
            "0.0ms".to_string()
        }
    } else {
        format!("{}/s", format_rate(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_carry_their_unit() {
        assert_eq!(format_metric(12.345, "milliseconds"), "12.3ms");
        assert_eq!(format_metric(99.6, "op/sec"), "100/s");
        assert_eq!(format_metric(f64::NAN, "op/sec"), "0/s");
    }
}
