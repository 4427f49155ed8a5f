//! Human-readable text report.
//!
//! Display conversions (currency suffixes, signs, rounding) happen only
//! here and never touch the result set.

use std::fmt;

use metriclab_core::domain::{Composite, Field, MetricStatus, MetricValue, Unit};

use crate::result_set::{MetricResult, ResultSet};

const RULE_WIDTH: usize = 70;

/// Render the full report into a string.
pub fn render_report(set: &ResultSet) -> Result<String, fmt::Error> {
    let mut out = String::with_capacity(4096);
    write_report(&mut out, set)?;
    Ok(out)
}

/// Write the full report: one section per group, then the summary.
pub fn write_report<W: fmt::Write>(out: &mut W, set: &ResultSet) -> fmt::Result {
    let rule = "=".repeat(RULE_WIDTH);

    for (timeframe, results) in set.groups() {
        writeln!(out, "{rule}")?;
        writeln!(out, "{} METRICS", timeframe.as_str().to_ascii_uppercase())?;
        writeln!(out, "{rule}")?;
        for r in results {
            writeln!(out, "{}", metric_line(r))?;
        }
        writeln!(out)?;
    }

    let summary = set.summary();
    writeln!(out, "{rule}")?;
    writeln!(out, "SUMMARY: {}/{} metrics OK", summary.ok(), summary.total)?;
    let counts: Vec<String> = MetricStatus::ALL
        .iter()
        .map(|s| format!("{}: {}", s.label(), summary.count(*s)))
        .collect();
    writeln!(out, "  {}", counts.join("  "))?;
    if !set.metadata.complete {
        writeln!(
            out,
            "(partial run: {} of {} metrics attempted)",
            set.metadata.attempted, set.metadata.planned
        )?;
    }
    writeln!(
        out,
        "mode: {}  provider: {}  registry: {}",
        set.metadata.data_mode,
        set.metadata.provider,
        short_fingerprint(&set.metadata.fingerprint)
    )
}

fn short_fingerprint(fp: &str) -> &str {
    fp.get(..12).unwrap_or(fp)
}

/// `[LABEL] id  name: detail`
pub fn metric_line(r: &MetricResult) -> String {
    let detail = match (r.status, r.value()) {
        (MetricStatus::Ok, Some(value)) => {
            let mut shown = format_value(value, r.unit);
            if r.note.is_some() {
                shown.push_str(" (approx.)");
            }
            shown
        }
        (MetricStatus::Missing, _) => format!("no data ({})", r.raw_error().unwrap_or("unknown")),
        (MetricStatus::Error, _) => format!("failed ({})", r.raw_error().unwrap_or("unknown")),
        _ => r.note.clone().unwrap_or_default(),
    };
    format!("[{}] {}  {}: {}", r.status.label(), r.id, r.name, detail)
}

/// Unit-aware display of a value.
pub fn format_value(value: &MetricValue, unit: Unit) -> String {
    match value {
        MetricValue::Scalar(v) => format_scalar(*v, unit),
        MetricValue::Composite(c) => format_composite(c),
        MetricValue::Series(points) => format!("[{} points]", points.len()),
        MetricValue::Records(records) => format!("[{} records]", records.len()),
    }
}

pub fn format_scalar(v: f64, unit: Unit) -> String {
    if !v.is_finite() {
        return "n/a".to_string();
    }
    match unit {
        Unit::Percent => format!("{}%", signed(v, 4)),
        Unit::BillionUsd => money(v, "B"),
        Unit::MillionUsd => money(v, "M"),
        Unit::Usd => money(v, ""),
        Unit::Ratio => format!("{v:.3}"),
        Unit::Thousand => format!("{}K", trimmed(v, 1, 2)),
        _ => trimmed(v, 0, 4),
    }
}

fn format_composite(c: &Composite) -> String {
    let fields: Vec<String> = c
        .iter()
        .map(|(k, f)| {
            let v = match f {
                Field::Num(n) if n.is_finite() => trimmed(*n, 0, 4),
                Field::Num(_) | Field::Null => "null".to_string(),
                Field::Int(n) => n.to_string(),
                Field::Text(s) => s.clone(),
            };
            format!("{k}={v}")
        })
        .collect();
    format!("{{{}}}", fields.join(", "))
}

fn money(v: f64, suffix: &str) -> String {
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}${:.2}{suffix}", v.abs())
}

fn signed(v: f64, max_dp: usize) -> String {
    let body = trimmed(v.abs(), 2, max_dp);
    if v < 0.0 {
        format!("-{body}")
    } else {
        format!("+{body}")
    }
}

/// Fixed `max_dp` decimals with trailing zeros removed down to `min_dp`.
fn trimmed(v: f64, min_dp: usize, max_dp: usize) -> String {
    let mut s = format!("{v:.max_dp$}");
    if let Some(dot) = s.find('.') {
        let keep = dot + 1 + min_dp;
        while s.len() > keep && s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}
