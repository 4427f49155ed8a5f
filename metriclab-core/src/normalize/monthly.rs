//! Monthly-panel normalizers.

use chrono::DateTime;
use serde_json::Value;

use super::rows::{coerce_f64, coerce_i64, data_rows, positive, timed_values};
use super::scale::{pct_change, round_dp, stdev};
use super::time::canonical_timestamp;
use super::{EtfScope, Outcome, Reject};
use crate::domain::{Composite, MetricValue};
use crate::provider::Envelope;

/// Daily closes needed for 30 returns.
const MONTH_CLOSES: usize = 31;

/// Annualized realized volatility of daily log returns, in percent.
pub(super) fn realized_volatility_30d(env: &Envelope) -> Outcome {
    let closes = monthly_closes(env)?;
    let returns: Vec<f64> = closes
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    let sd = stdev(&returns).ok_or_else(|| Reject::new("not enough returns"))?;
    Ok(MetricValue::Scalar(round_dp(sd * 365f64.sqrt() * 100.0, 2)))
}

pub(super) fn open_interest_growth_30d(env: &Envelope) -> Outcome {
    let closes = monthly_closes(env)?;
    let latest = closes[closes.len() - 1];
    let month_ago = closes[closes.len() - MONTH_CLOSES];
    let growth =
        pct_change(month_ago, latest).ok_or_else(|| Reject::new("month-ago close is zero"))?;
    Ok(MetricValue::Scalar(round_dp(growth, 2)))
}

/// The last 31 positive closes, oldest first.
fn monthly_closes(env: &Envelope) -> Result<Vec<f64>, Reject> {
    let pairs = timed_values(data_rows(env)?, &["close"], positive);
    if pairs.len() < MONTH_CLOSES {
        return Err(Reject::new(format!(
            "need {MONTH_CLOSES} daily closes, got {}",
            pairs.len()
        )));
    }
    Ok(pairs[pairs.len() - MONTH_CLOSES..]
        .iter()
        .map(|(_, v)| *v)
        .collect())
}

/// Daily options volume points compared: the last 30 against the 30 before.
const OPTIONS_WINDOW: usize = 30;

/// Options volume over the last 30 days against the 30 days before, in
/// percent. Volume is summed across every venue in `data_map`.
pub(super) fn options_volume_growth_30d(env: &Envelope) -> Outcome {
    let venues = env
        .data
        .get("data_map")
        .and_then(Value::as_object)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Reject::new("missing data_map"))?;

    let mut totals: Vec<f64> = Vec::new();
    for series in venues.values().filter_map(Value::as_array) {
        if series.len() > totals.len() {
            totals.resize(series.len(), 0.0);
        }
        for (slot, v) in totals.iter_mut().zip(series) {
            *slot += coerce_f64(v).unwrap_or(0.0);
        }
    }
    if totals.len() < 2 * OPTIONS_WINDOW {
        return Err(Reject::new(format!(
            "need {} daily volume points, got {}",
            2 * OPTIONS_WINDOW,
            totals.len()
        )));
    }

    let split = totals.len() - OPTIONS_WINDOW;
    let recent: f64 = totals[split..].iter().sum();
    let prior: f64 = totals[split - OPTIONS_WINDOW..split].iter().sum();
    let growth = pct_change(prior, recent).ok_or_else(|| Reject::new("no volume in prior window"))?;
    Ok(MetricValue::Scalar(round_dp(growth, 2)))
}

/// BTC held by the spot ETFs in `scope`, summed from each fund's
/// `asset_details.holding_quantity`.
pub(super) fn etf_holdings(env: &Envelope, scope: EtfScope) -> Outcome {
    let funds = data_rows(env)?;
    let held: Vec<f64> = funds
        .iter()
        .filter(|fund| in_scope(fund, scope))
        .filter_map(|fund| {
            fund.get("asset_details")
                .and_then(|d| d.get("holding_quantity"))
                .and_then(coerce_f64)
        })
        .filter(|q| *q >= 0.0)
        .collect();
    if held.is_empty() {
        return Err(Reject::new("no matching fund reports holdings"));
    }
    Ok(MetricValue::Scalar(round_dp(held.iter().sum(), 2)))
}

fn in_scope(fund: &Value, scope: EtfScope) -> bool {
    let text = |key: &str| fund.get(key).and_then(Value::as_str).unwrap_or_default();
    if !text("region").eq_ignore_ascii_case("us") {
        return false;
    }
    match scope {
        EtfScope::UsSpot => text("fund_type").eq_ignore_ascii_case("spot"),
        EtfScope::Grayscale => {
            let name = if text("fund_name").is_empty() {
                text("name")
            } else {
                text("fund_name")
            };
            name.to_ascii_lowercase().contains("grayscale")
        }
    }
}

/// Total stablecoin supply from per-coin snapshots, in billions, with the
/// change against the snapshot 30 entries earlier.
pub(super) fn stablecoin_market_cap(env: &Envelope) -> Outcome {
    let data = &env.data;
    let times = data
        .get("time_list")
        .and_then(Value::as_array)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| Reject::new("missing time_list"))?;
    let snapshots = data
        .get("data_list")
        .and_then(Value::as_array)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| Reject::new("missing data_list"))?;

    let latest_idx = snapshots.len() - 1;
    let total = snapshot_total(&snapshots[latest_idx])
        .filter(|t| *t > 0.0)
        .ok_or_else(|| Reject::new("latest snapshot has no positive supply"))?;

    let change = latest_idx
        .checked_sub(30)
        .and_then(|i| snapshot_total(&snapshots[i]))
        .filter(|prev| *prev > 0.0)
        .map_or(0.0, |prev| total - prev);

    let raw_ts = times
        .get(latest_idx)
        .and_then(coerce_i64)
        .ok_or_else(|| Reject::new("no timestamp for latest snapshot"))?;
    let ts = if raw_ts > 1_000_000_000_000 {
        canonical_timestamp(raw_ts)
    } else {
        raw_ts
    };
    let date = DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| Reject::new(format!("timestamp {ts} out of range")))?
        .format("%Y-%m-%d")
        .to_string();

    Ok(MetricValue::Composite(
        Composite::new()
            .num("value_b", round_dp(total / 1e9, 2))
            .num("change_30d_b", round_dp(change / 1e9, 2))
            .int("ts", ts)
            .text("ts_date", date),
    ))
}

/// Sum of the numeric entries of a `{coin: supply}` map.
fn snapshot_total(entry: &Value) -> Option<f64> {
    let map = entry.as_object()?;
    Some(map.values().filter_map(coerce_f64).sum())
}
