//! Row extraction from provider `data` payloads.
//!
//! Provider numbers arrive as JSON numbers or numeric strings, and rows come
//! in either time order. These helpers coerce, filter and sort so the
//! normalizers only see clean `(time, value)` data.

use std::cmp::Ordering;

use serde_json::Value;

use super::time::canonical_timestamp;
use super::Reject;
use crate::domain::SeriesPoint;
use crate::provider::Envelope;

/// A JSON number or numeric string as a finite `f64`.
pub fn coerce_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// A JSON integer, integral float, or numeric string as `i64`.
pub fn coerce_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

/// The `data` array of an envelope. Empty or non-list data is a reject.
pub(crate) fn data_rows(envelope: &Envelope) -> Result<&[Value], Reject> {
    match &envelope.data {
        Value::Array(rows) if rows.is_empty() => Err(Reject::new("no datapoints")),
        Value::Array(rows) => Ok(rows),
        Value::Null => Err(Reject::new("no data")),
        _ => Err(Reject::new("data is not a list")),
    }
}

/// First of `keys` present on `row` as a number.
pub(crate) fn field(row: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| row.get(*k).and_then(coerce_f64))
}

/// First non-zero of `keys`, else zero. Absent fields count as zero.
pub(crate) fn field_or_zero(row: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .filter_map(|k| row.get(*k).and_then(coerce_f64))
        .find(|v| *v != 0.0)
        .unwrap_or(0.0)
}

/// Raw millisecond time of a row, from `time` or `timestamp`.
pub(crate) fn row_time(row: &Value) -> Option<i64> {
    row.get("time")
        .or_else(|| row.get("timestamp"))
        .and_then(coerce_i64)
}

/// `(time, value)` pairs for rows carrying both, ascending by time.
///
/// Rows where `keep` rejects the value are dropped. Ties on time are
/// broken by value so the order never depends on provider row order.
pub(crate) fn timed_values(rows: &[Value], keys: &[&str], keep: fn(f64) -> bool) -> Vec<(i64, f64)> {
    let mut pairs: Vec<(i64, f64)> = rows
        .iter()
        .filter_map(|row| Some((row_time(row)?, field(row, keys)?)))
        .filter(|(_, v)| keep(*v))
        .collect();
    pairs.sort_by(|a, b| cmp_pair(a, b));
    pairs
}

pub(crate) fn any_value(_: f64) -> bool {
    true
}

pub(crate) fn positive(v: f64) -> bool {
    v > 0.0
}

fn cmp_pair(a: &(i64, f64), b: &(i64, f64)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.total_cmp(&b.1))
}

/// Sort most recent first; equal timestamps order by value, descending.
pub fn sort_series(points: &mut [SeriesPoint]) {
    points.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.value.total_cmp(&a.value))
    });
}

/// Build a descending series from ascending millisecond pairs.
pub(crate) fn series_from(pairs: &[(i64, f64)], map: impl Fn(f64) -> f64) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = pairs
        .iter()
        .map(|(ms, v)| SeriesPoint {
            timestamp: canonical_timestamp(*ms),
            value: map(*v),
        })
        .collect();
    sort_series(&mut points);
    points
}

/// Last value at or before `latest_time - lookback`, from ascending pairs.
pub(crate) fn value_before(pairs: &[(i64, f64)], lookback_ms: i64) -> Option<f64> {
    let (latest, _) = *pairs.last()?;
    let target = latest.saturating_sub(lookback_ms);
    pairs
        .iter()
        .rev()
        .find(|(t, _)| *t <= target)
        .map(|(_, v)| *v)
}

/// Split the last 14 ascending pairs into (previous 7, current 7).
pub(crate) fn split_weeks<T: Copy>(pairs: &[T]) -> Result<(&[T], &[T]), Reject> {
    if pairs.len() < 14 {
        return Err(Reject::new(format!(
            "need 14 daily rows, got {}",
            pairs.len()
        )));
    }
    let last_14 = &pairs[pairs.len() - 14..];
    Ok(last_14.split_at(7))
}
