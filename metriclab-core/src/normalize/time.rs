//! Timestamp canonicalization and time-range plausibility.
//!
//! Provider timestamps are epoch milliseconds. Every time-bearing output is
//! whole epoch seconds, obtained by floor division.

use thiserror::Error;

pub const HOUR_SECS: i64 = 3_600;
pub const DAY_MS: i64 = 86_400_000;

/// Accepted deviation from a fixed window's nominal span (inclusive).
pub const SPAN_TOLERANCE_SECS: i64 = 4 * HOUR_SECS;

/// Milliseconds → whole seconds, rounding toward negative infinity.
pub fn canonical_timestamp(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

/// The datapoints of a fixed-window aggregate cover too much or too little
/// time for the aggregate to mean what its window says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "datapoints span {}h, expected {}h ± {}h",
    .elapsed_secs / HOUR_SECS,
    .nominal_secs / HOUR_SECS,
    SPAN_TOLERANCE_SECS / HOUR_SECS
)]
pub struct SpanRejected {
    pub elapsed_secs: i64,
    pub nominal_secs: i64,
}

/// Check the elapsed time from the first to the last datapoint (both in
/// seconds) against `nominal_secs ± SPAN_TOLERANCE_SECS`, bounds included.
///
/// Returns the elapsed span on success.
pub fn check_span(first_secs: i64, last_secs: i64, nominal_secs: i64) -> Result<i64, SpanRejected> {
    let elapsed = (last_secs - first_secs).abs();
    let low = nominal_secs - SPAN_TOLERANCE_SECS;
    let high = nominal_secs + SPAN_TOLERANCE_SECS;
    if (low..=high).contains(&elapsed) {
        Ok(elapsed)
    } else {
        Err(SpanRejected {
            elapsed_secs: elapsed,
            nominal_secs,
        })
    }
}
