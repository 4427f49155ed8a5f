//! Daily-panel normalizers: open interest, funding, long/short,
//! liquidations and the Coinbase premium.

use serde_json::Value;

use super::rows::{
    any_value, data_rows, field, field_or_zero, positive, row_time, series_from, timed_values,
};
use super::scale::{funding_rate_percent, mean, pct_change, round_dp, stdev};
use super::time::{canonical_timestamp, check_span};
use super::{Outcome, Reject};
use crate::domain::{Composite, Field, MetricValue, Window};
use crate::provider::Envelope;

const CLOSE: &[&str] = &["close"];

const LONG_LIQ: &[&str] = &[
    "aggregated_long_liquidation_usd",
    "longLiquidationUsd",
    "longLiquidation",
    "longVolUsd",
];
const SHORT_LIQ: &[&str] = &[
    "aggregated_short_liquidation_usd",
    "shortLiquidationUsd",
    "shortLiquidation",
    "shortVolUsd",
];

/// Minimum funding points for a history to be usable.
const MIN_FUNDING_POINTS: usize = 5;

const TOP_EVENTS: usize = 10;

pub(super) fn open_interest_total(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, CLOSE, positive);
    let (_, latest) = pairs
        .last()
        .ok_or_else(|| Reject::new("no positive open interest close"))?;
    Ok(MetricValue::Scalar(round_dp(latest / 1e9, 2)))
}

pub(super) fn open_interest_change(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, CLOSE, positive);
    let [.., (_, prev), (_, latest)] = pairs.as_slice() else {
        return Err(Reject::new(format!(
            "need two valid closes, got {}",
            pairs.len()
        )));
    };
    let change = pct_change(*prev, *latest).ok_or_else(|| Reject::new("previous close is zero"))?;
    Ok(MetricValue::Scalar(round_dp(change, 2)))
}

pub(super) fn funding_rate_latest(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, CLOSE, any_value);
    let (_, latest) = pairs
        .last()
        .ok_or_else(|| Reject::new("no funding rate close"))?;
    Ok(MetricValue::Scalar(round_dp(funding_rate_percent(*latest), 4)))
}

/// Latest positive close in the provider's own unit (a price, or a
/// base-asset amount).
pub(super) fn latest_close(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, CLOSE, positive);
    let (_, latest) = pairs
        .last()
        .ok_or_else(|| Reject::new("no positive close"))?;
    Ok(MetricValue::Scalar(round_dp(*latest, 2)))
}

pub(super) fn funding_rate_history(env: &Envelope) -> Outcome {
    let pairs = funding_points(env)?;
    Ok(MetricValue::Series(series_from(&pairs, |v| {
        round_dp(funding_rate_percent(v), 4)
    })))
}

fn funding_points(env: &Envelope) -> Result<Vec<(i64, f64)>, Reject> {
    let pairs = timed_values(data_rows(env)?, CLOSE, any_value);
    if pairs.len() < MIN_FUNDING_POINTS {
        return Err(Reject::new(format!(
            "need {MIN_FUNDING_POINTS} funding points, got {}",
            pairs.len()
        )));
    }
    Ok(pairs)
}

pub(super) fn long_short_ratio(env: &Envelope) -> Outcome {
    let latest = latest_row(data_rows(env)?)?;

    let long = field(latest, &["global_account_long_percent", "long_percent"])
        .ok_or_else(|| Reject::new("missing long share"))?;
    let short = field(latest, &["global_account_short_percent", "short_percent"])
        .ok_or_else(|| Reject::new("missing short share"))?;
    if short <= 0.0 {
        return Err(Reject::new("short share is not positive"));
    }
    let ratio = field(latest, &["global_account_long_short_ratio", "long_short_ratio"])
        .unwrap_or(long / short);

    Ok(MetricValue::Composite(
        Composite::new()
            .num("long", round_dp(long, 2))
            .num("short", round_dp(short, 2))
            .num("ratio", round_dp(ratio, 3)),
    ))
}

/// Long/short liquidation totals over a fixed window, in millions USD.
///
/// The buckets must span the window's nominal length within tolerance.
pub(super) fn liquidations_window(env: &Envelope, window: Window) -> Outcome {
    let mut buckets: Vec<(i64, f64, f64)> = data_rows(env)?
        .iter()
        .filter_map(|row| {
            let time = row_time(row)?;
            Some((time, field_or_zero(row, LONG_LIQ), field_or_zero(row, SHORT_LIQ)))
        })
        .collect();
    if buckets.len() < 2 {
        return Err(Reject::new("need at least two timed liquidation buckets"));
    }
    buckets.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.total_cmp(&b.1))
            .then_with(|| a.2.total_cmp(&b.2))
    });

    if let Some(nominal) = window.nominal_secs() {
        let first = canonical_timestamp(buckets[0].0);
        let last = canonical_timestamp(buckets[buckets.len() - 1].0);
        check_span(first, last, nominal)?;
    }

    let long: f64 = buckets.iter().map(|b| b.1).sum();
    let short: f64 = buckets.iter().map(|b| b.2).sum();
    let total = long + short;
    if total <= 0.0 {
        return Err(Reject::new("no liquidations in window"));
    }

    Ok(MetricValue::Composite(
        Composite::new()
            .num("long", round_dp(long / 1e6, 2))
            .num("short", round_dp(short / 1e6, 2))
            .num("total", round_dp(total / 1e6, 2))
            .num("long_percent", round_dp(long / total * 100.0, 1))
            .num("short_percent", round_dp(short / total * 100.0, 1)),
    ))
}

/// Largest liquidation buckets, one event per side per bucket.
///
/// The provider only exposes aggregated buckets, so these are synthetic
/// events, not individual orders. The registry marks the metric as an
/// approximation.
pub(super) fn top_liquidation_events(env: &Envelope) -> Outcome {
    let mut events: Vec<(i64, &'static str, f64)> = Vec::new();
    for row in data_rows(env)? {
        let Some(ms) = row_time(row) else { continue };
        let ts = canonical_timestamp(ms);
        let long = field_or_zero(row, LONG_LIQ);
        let short = field_or_zero(row, SHORT_LIQ);
        if long > 0.0 {
            events.push((ts, "long", long / 1e6));
        }
        if short > 0.0 {
            events.push((ts, "short", short / 1e6));
        }
    }
    if events.is_empty() {
        return Err(Reject::new("no liquidation events"));
    }

    events.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| b.0.cmp(&a.0))
            .then_with(|| a.1.cmp(b.1))
    });
    events.truncate(TOP_EVENTS);

    Ok(MetricValue::Records(
        events
            .into_iter()
            .map(|(ts, side, amount)| {
                Composite::new()
                    .int("timestamp", ts)
                    .text("side", side)
                    .num("amount", round_dp(amount, 2))
                    .text("exchange", "Aggregated")
            })
            .collect(),
    ))
}

pub(super) fn coinbase_premium(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, &["premium_rate"], any_value);
    let [.., (_, latest)] = pairs.as_slice() else {
        return Err(Reject::new("no premium rate"));
    };
    let premium = latest * 100.0;
    let change = pairs
        .len()
        .checked_sub(2)
        .map(|i| round_dp(premium - pairs[i].1 * 100.0, 4));

    Ok(MetricValue::Composite(
        Composite::new()
            .num("premium", round_dp(premium, 4))
            .opt_num("change_1h", change),
    ))
}

// ─── Funding regime ─────────────────────────────────────────────────

/// Funding payments per day on the 8h schedule.
const FUNDINGS_PER_DAY: f64 = 3.0;

/// Sign changes at or above which the history counts as choppy.
const CHOPPY_FLIPS: usize = 6;

/// Decision summary over the funding history (percent per 8h interval).
pub(super) fn funding_regime(env: &Envelope) -> Outcome {
    let pairs = funding_points(env)?;
    let rates: Vec<f64> = pairs.iter().map(|(_, v)| funding_rate_percent(*v)).collect();

    let last = rates[rates.len() - 1];
    let mean_v = mean(&rates).ok_or_else(|| Reject::new("empty funding series"))?;
    let stdev_v = stdev(&rates).unwrap_or(0.0);
    let z_last = if stdev_v > 0.0 {
        Some((last - mean_v) / stdev_v)
    } else {
        None
    };
    let positive_count = rates.iter().filter(|r| **r > 0.0).count();
    let pos_ratio = positive_count as f64 / rates.len() as f64;
    let flips = rates
        .windows(2)
        .filter(|w| (w[0] > 0.0) != (w[1] > 0.0))
        .count();
    let slope = (last - rates[0]) / (rates.len() - 1) as f64;
    let cumulative: f64 = rates.iter().sum();
    let ann_carry = mean_v * FUNDINGS_PER_DAY * 365.0;

    let regime = classify_regime(mean_v, pos_ratio, flips);
    let hint = z_last.and_then(squeeze_hint);

    let mut summary = Composite::new()
        .text("regime", regime)
        .num("last_pct", round_dp(last, 4))
        .num("mean_pct", round_dp(mean_v, 4))
        .num("stdev_pct", round_dp(stdev_v, 4))
        .opt_num("z_last", z_last.map(|z| round_dp(z, 2)))
        .num("pos_ratio", round_dp(pos_ratio, 2))
        .int("flips", flips as i64)
        .num("ann_carry_pct", round_dp(ann_carry, 2))
        .num("slope_pct_per_bar", round_dp(slope, 6))
        .num("cum_30_pct", round_dp(cumulative, 4));
    if let Some(hint) = hint {
        summary.insert("squeeze_risk_hint", Field::Text(hint.to_string()));
    }
    Ok(MetricValue::Composite(summary))
}

fn classify_regime(mean_pct: f64, pos_ratio: f64, flips: usize) -> &'static str {
    if mean_pct >= 0.03 && pos_ratio >= 0.7 {
        "crowded_long"
    } else if mean_pct <= -0.01 && pos_ratio <= 0.3 {
        "crowded_short"
    } else if flips >= CHOPPY_FLIPS {
        "choppy"
    } else {
        "neutral"
    }
}

fn squeeze_hint(z: f64) -> Option<&'static str> {
    if z >= 2.0 {
        Some("long_squeeze_risk")
    } else if z <= -2.0 {
        Some("short_squeeze_risk")
    } else {
        None
    }
}

/// Row with the greatest timestamp; rows without one are ignored.
fn latest_row(rows: &[Value]) -> Result<&Value, Reject> {
    rows.iter()
        .filter_map(|r| Some((row_time(r)?, r)))
        .max_by_key(|(t, _)| *t)
        .map(|(_, r)| r)
        .ok_or_else(|| Reject::new("no timed rows"))
}
