//! Flat CSV export: one row per metric.
//!
//! Columns: group, id, status, unit, value. Scalars are written as plain
//! numbers; composites, series and records as compact JSON. Non-OK rows
//! leave `value` empty.

use anyhow::{Context, Result};

use metriclab_core::domain::MetricValue;

use crate::result_set::ResultSet;

pub fn export_csv(set: &ResultSet) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["group", "id", "status", "unit", "value"])?;

    for r in set.iter() {
        let value = match r.value() {
            None => String::new(),
            Some(MetricValue::Scalar(v)) if v.is_finite() => v.to_string(),
            Some(MetricValue::Scalar(_)) => String::new(),
            Some(other) => serde_json::to_string(other)
                .with_context(|| format!("failed to serialize value of {}", r.id))?,
        };
        wtr.write_record([
            r.timeframe().as_str(),
            r.id.as_str(),
            r.status.as_str(),
            r.unit.as_str(),
            value.as_str(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
