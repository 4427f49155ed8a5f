//! Weekly-panel normalizers.
//!
//! Most weekly metrics compare the latest seven daily bars with the seven
//! before them, or the latest reading with the last one at least seven days
//! older. Both produce a `{value, change_7d}` composite.

use serde_json::Value;

use super::rows::{
    any_value, coerce_f64, coerce_i64, data_rows, field, positive, row_time, split_weeks,
    timed_values, value_before,
};
use super::scale::{funding_rate_percent, mean, pct_change, round_dp};
use super::time::DAY_MS;
use super::{Outcome, Reject, Side, VolumeMode};
use crate::domain::{Composite, MetricValue};
use crate::provider::{Envelope, ProviderBody};

const WEEK_MS: i64 = 7 * DAY_MS;

fn week_change(value: f64, change: Option<f64>) -> MetricValue {
    MetricValue::Composite(
        Composite::new()
            .num("value", value)
            .opt_num("change_7d", change),
    )
}

pub(super) fn open_interest_trend_7d(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, &["close"], positive);
    let (prev, curr) = split_weeks(&pairs)?;
    let prev_last = prev[6].1;
    let curr_last = curr[6].1;
    Ok(week_change(
        round_dp(curr_last / 1e9, 2),
        Some(round_dp((curr_last - prev_last) / 1e9, 2)),
    ))
}

pub(super) fn basis_spread_7d(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, &["close_basis"], any_value);
    let (_, latest) = *pairs
        .last()
        .ok_or_else(|| Reject::new("no close_basis reading"))?;
    let change = value_before(&pairs, WEEK_MS).map(|prev| round_dp(latest - prev, 4));
    Ok(week_change(round_dp(latest, 4), change))
}

pub(super) fn funding_rate_avg_7d(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, &["close"], any_value);
    let (prev, curr) = split_weeks(&pairs)?;
    let avg = |week: &[(i64, f64)]| {
        let rates: Vec<f64> = week.iter().map(|(_, v)| funding_rate_percent(*v)).collect();
        mean(&rates).unwrap_or(0.0)
    };
    let (prev_avg, curr_avg) = (avg(prev), avg(curr));
    Ok(week_change(
        round_dp(curr_avg, 6),
        Some(round_dp(curr_avg - prev_avg, 6)),
    ))
}

/// Seven-day liquidation sum for one side. Rows must carry both sides so
/// the long and short metrics are computed over the same days.
pub(super) fn liquidations_7d(env: &Envelope, side: Side) -> Outcome {
    let mut rows: Vec<(i64, f64, f64)> = data_rows(env)?
        .iter()
        .filter_map(|row| {
            Some((
                row_time(row)?,
                field(row, &["aggregated_long_liquidation_usd"])?,
                field(row, &["aggregated_short_liquidation_usd"])?,
            ))
        })
        .collect();
    rows.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.total_cmp(&b.1))
            .then_with(|| a.2.total_cmp(&b.2))
    });

    let (prev, curr) = split_weeks(&rows)?;
    let pick = |r: &(i64, f64, f64)| match side {
        Side::Long => r.1,
        Side::Short => r.2,
    };
    let prev_sum: f64 = prev.iter().map(pick).sum();
    let curr_sum: f64 = curr.iter().map(pick).sum();
    Ok(week_change(
        round_dp(curr_sum / 1e6, 2),
        Some(round_dp((curr_sum - prev_sum) / 1e6, 2)),
    ))
}

pub(super) fn active_addresses_7d(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, &["active_address_count"], any_value);
    let (prev, curr) = split_weeks(&pairs)?;
    let avg = |week: &[(i64, f64)]| week.iter().map(|(_, v)| v).sum::<f64>() / week.len() as f64;
    let (prev_avg, curr_avg) = (avg(prev), avg(curr));
    Ok(week_change(
        round_dp(curr_avg / 1000.0, 2),
        Some(round_dp((curr_avg - prev_avg) / 1000.0, 2)),
    ))
}

pub(super) fn dominance_change_7d(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, &["bitcoin_dominance"], any_value);
    let (_, latest) = *pairs
        .last()
        .ok_or_else(|| Reject::new("no dominance reading"))?;
    if !(0.0..=100.0).contains(&latest) {
        return Err(Reject::new(format!("dominance {latest} outside 0..=100")));
    }
    let change = value_before(&pairs, WEEK_MS).map(|prev| round_dp(latest - prev, 2));
    Ok(week_change(round_dp(latest, 2), change))
}

/// Combined taker buy + sell volume over seven days, in billions.
pub(super) fn taker_volume_7d(env: &Envelope, mode: VolumeMode) -> Outcome {
    let mut pairs: Vec<(i64, f64)> = data_rows(env)?
        .iter()
        .filter_map(|row| {
            let buy = field(row, &["aggregated_buy_volume_usd"])?;
            let sell = field(row, &["aggregated_sell_volume_usd"])?;
            Some((row_time(row)?, buy + sell))
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));

    let (prev, curr) = split_weeks(&pairs)?;
    let prev_total = prev.iter().map(|(_, v)| v).sum::<f64>() / 1e9;
    let curr_total = curr.iter().map(|(_, v)| v).sum::<f64>() / 1e9;
    let change = match mode {
        VolumeMode::Absolute => curr_total - prev_total,
        VolumeMode::PercentChange => pct_change(prev_total, curr_total).unwrap_or(0.0),
    };
    Ok(week_change(round_dp(curr_total, 2), Some(round_dp(change, 2))))
}

/// USDC/USDT close as a premium in percent: `(close - 1) * 100`.
pub(super) fn stable_premium_7d(env: &Envelope) -> Outcome {
    let pairs = timed_values(data_rows(env)?, &["close"], any_value);
    let (prev, curr) = split_weeks(&pairs)?;
    let premium = |close: f64| (close - 1.0) * 100.0;
    let prev_last = premium(prev[6].1);
    let curr_last = premium(curr[6].1);
    Ok(week_change(
        round_dp(curr_last, 2),
        Some(round_dp(curr_last - prev_last, 2)),
    ))
}

// ─── Fear & greed ───────────────────────────────────────────────────

pub(super) fn fear_greed(env: &Envelope) -> Outcome {
    let pairs = parallel_lists(&env.data)?;
    let (latest_ts, value) = *pairs
        .last()
        .ok_or_else(|| Reject::new("empty fear & greed history"))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(Reject::new(format!("index {value} outside 0..=100")));
    }
    let change = pairs
        .iter()
        .rev()
        .find(|(t, _)| *t <= latest_ts.saturating_sub(WEEK_MS))
        .map(|(_, prev)| round_dp(value - prev, 1));

    Ok(MetricValue::Composite(
        Composite::new()
            .int("value", value as i64)
            .text("label", fear_greed_label(value))
            .opt_num("change_7d", change),
    ))
}

pub(super) fn fear_greed_label(value: f64) -> &'static str {
    match value {
        v if v <= 24.0 => "Extreme Fear",
        v if v <= 44.0 => "Fear",
        v if v <= 55.0 => "Neutral",
        v if v <= 75.0 => "Greed",
        _ => "Extreme Greed",
    }
}

/// `{time_list, data_list}` object into ascending `(time, value)` pairs.
fn parallel_lists(data: &Value) -> Result<Vec<(i64, f64)>, Reject> {
    let list = |name: &str| {
        data.get(name)
            .and_then(Value::as_array)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Reject::new(format!("missing {name}")))
    };
    let times = list("time_list")?;
    let values = list("data_list")?;
    if times.len() != values.len() {
        return Err(Reject::new(format!(
            "time_list has {} entries, data_list {}",
            times.len(),
            values.len()
        )));
    }
    let mut pairs: Vec<(i64, f64)> = times
        .iter()
        .zip(values)
        .filter_map(|(t, v)| Some((coerce_i64(t)?, coerce_f64(v)?)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));
    Ok(pairs)
}

// ─── ETH/BTC ────────────────────────────────────────────────────────

/// ETH/BTC close ratio from the `eth` and `btc` steps of a plan.
pub(super) fn ratio_change_7d(body: &ProviderBody) -> Outcome {
    let (eth_latest, eth_prev) = latest_and_week_ago(body, "eth")?;
    let (btc_latest, btc_prev) = latest_and_week_ago(body, "btc")?;
    if btc_latest <= 0.0 {
        return Err(Reject::new("BTC close is not positive"));
    }
    let ratio = eth_latest / btc_latest;
    let change = match (eth_prev, btc_prev) {
        (Some(eth), Some(btc)) if btc > 0.0 => Some(round_dp(ratio - eth / btc, 8)),
        _ => None,
    };
    Ok(week_change(round_dp(ratio, 8), change))
}

fn latest_and_week_ago(body: &ProviderBody, key: &str) -> Result<(f64, Option<f64>), Reject> {
    let env = body
        .step(key)
        .ok_or_else(|| Reject::new(format!("plan step {key} missing")))?;
    let pairs = timed_values(data_rows(env)?, &["close"], any_value);
    let (_, latest) = *pairs
        .last()
        .ok_or_else(|| Reject::new(format!("no {key} close")))?;
    Ok((latest, value_before(&pairs, WEEK_MS)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    const T0: i64 = 1_767_830_400_000;

    fn daily(n: i64, f: impl Fn(i64) -> Value) -> Envelope {
        Envelope::ok(Value::Array((0..n).map(f).collect()))
    }

    fn pair(v: &MetricValue) -> (f64, Option<f64>) {
        let c = v.as_composite().unwrap();
        (c.get_f64("value").unwrap(), c.get_f64("change_7d"))
    }

    #[test]
    fn oi_trend_compares_week_ends() {
        let env = daily(14, |i| json!({"time": T0 + i * DAY_MS, "close": (50 + i) as f64 * 1e9}));
        let v = open_interest_trend_7d(&env).unwrap();
        assert_eq!(pair(&v), (63.0, Some(7.0)));
    }

    #[test]
    fn oi_trend_needs_fourteen_days() {
        let env = daily(13, |i| json!({"time": T0 + i * DAY_MS, "close": 1e9}));
        assert!(open_interest_trend_7d(&env).is_err());
    }

    #[test]
    fn basis_without_history_has_no_change() {
        let env = daily(3, |i| json!({"time": T0 + i * DAY_MS, "close_basis": 0.1 * i as f64}));
        let v = basis_spread_7d(&env).unwrap();
        assert_eq!(pair(&v), (0.2, None));
    }

    #[test]
    fn funding_avg_week_over_week() {
        let env = daily(14, |i| {
            json!({"time": T0 + i * DAY_MS, "close": if i < 7 { "0.0001" } else { "0.0002" }})
        });
        let v = funding_rate_avg_7d(&env).unwrap();
        let (value, change) = pair(&v);
        assert_eq!(value, 0.02);
        assert_eq!(change, Some(0.01));
    }

    #[test]
    fn liquidations_per_side() {
        let env = daily(14, |i| {
            json!({
                "time": T0 + i * DAY_MS,
                "aggregated_long_liquidation_usd": if i < 7 { 1e6 } else { 2e6 },
                "aggregated_short_liquidation_usd": 5e5
            })
        });
        assert_eq!(pair(&liquidations_7d(&env, Side::Long).unwrap()), (14.0, Some(7.0)));
        assert_eq!(pair(&liquidations_7d(&env, Side::Short).unwrap()), (3.5, Some(0.0)));
    }

    #[test]
    fn liquidations_skip_rows_missing_a_side() {
        let env = daily(14, |i| {
            json!({"time": T0 + i * DAY_MS, "aggregated_long_liquidation_usd": 1e6})
        });
        assert!(liquidations_7d(&env, Side::Long).is_err());
    }

    #[test]
    fn active_addresses_in_thousands() {
        let env = daily(14, |i| {
            json!({"timestamp": T0 + i * DAY_MS, "active_address_count": if i < 7 { 800_000 } else { 900_000 }})
        });
        assert_eq!(pair(&active_addresses_7d(&env).unwrap()), (900.0, Some(100.0)));
    }

    #[test]
    fn dominance_range_checked() {
        let env = daily(1, |_| json!({"timestamp": T0, "bitcoin_dominance": 101.0}));
        assert!(dominance_change_7d(&env).is_err());
        let env = daily(8, |i| json!({"timestamp": T0 + i * DAY_MS, "bitcoin_dominance": 57.0 + i as f64 * 0.1}));
        let (value, change) = pair(&dominance_change_7d(&env).unwrap());
        assert_eq!(value, 57.7);
        assert_eq!(change, Some(0.7));
    }

    #[test]
    fn taker_volume_modes() {
        let env = daily(14, |i| {
            let side = if i < 7 { 5e9 } else { 6e9 };
            json!({"time": T0 + i * DAY_MS, "aggregated_buy_volume_usd": side, "aggregated_sell_volume_usd": side})
        });
        assert_eq!(pair(&taker_volume_7d(&env, VolumeMode::Absolute).unwrap()), (84.0, Some(14.0)));
        assert_eq!(pair(&taker_volume_7d(&env, VolumeMode::PercentChange).unwrap()), (84.0, Some(20.0)));
    }

    #[test]
    fn taker_volume_percent_with_empty_previous_week() {
        let env = daily(14, |i| {
            let side = if i < 7 { 0.0 } else { 1e9 };
            json!({"time": T0 + i * DAY_MS, "aggregated_buy_volume_usd": side, "aggregated_sell_volume_usd": 0})
        });
        assert_eq!(pair(&taker_volume_7d(&env, VolumeMode::PercentChange).unwrap()), (7.0, Some(0.0)));
    }

    #[test]
    fn stable_premium_from_close() {
        let env = daily(14, |i| json!({"time": T0 + i * DAY_MS, "close": if i < 7 { "1.0005" } else { "1.001" }}));
        let (value, change) = pair(&stable_premium_7d(&env).unwrap());
        assert_eq!(value, 0.1);
        assert_eq!(change, Some(0.05));
    }

    #[test]
    fn fear_greed_latest_by_time() {
        let env = Envelope::ok(json!({
            "time_list": [T0 + 8 * DAY_MS, T0, T0 + DAY_MS],
            "data_list": [72, 60, 65],
            "price_list": [1, 2, 3]
        }));
        let v = fear_greed(&env).unwrap();
        let c = v.as_composite().unwrap();
        assert_eq!(c.get_f64("value"), Some(72.0));
        assert_eq!(c.get("label").and_then(|f| f.as_str()), Some("Greed"));
        assert_eq!(c.get_f64("change_7d"), Some(7.0));
    }

    #[test]
    fn fear_greed_rejects_mismatched_lists() {
        let env = Envelope::ok(json!({"time_list": [1, 2], "data_list": [50]}));
        assert!(fear_greed(&env).is_err());
    }

    #[test]
    fn fear_greed_labels_at_bounds() {
        assert_eq!(fear_greed_label(24.0), "Extreme Fear");
        assert_eq!(fear_greed_label(44.0), "Fear");
        assert_eq!(fear_greed_label(55.0), "Neutral");
        assert_eq!(fear_greed_label(75.0), "Greed");
        assert_eq!(fear_greed_label(76.0), "Extreme Greed");
    }

    fn closes(values: [f64; 8]) -> Envelope {
        let rows: Vec<Value> = values
            .iter()
            .enumerate()
            .map(|(i, c)| json!({"time": T0 + i as i64 * DAY_MS, "close": c.to_string()}))
            .collect();
        Envelope::ok(Value::Array(rows))
    }

    #[test]
    fn eth_btc_ratio_from_plan() {
        let mut steps = BTreeMap::new();
        steps.insert("eth".to_string(), closes([2000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3000.0]));
        steps.insert("btc".to_string(), closes([50000.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 60000.0]));
        let v = ratio_change_7d(&ProviderBody::Plan(steps)).unwrap();
        assert_eq!(pair(&v), (0.05, Some(0.01)));
    }

    #[test]
    fn eth_btc_requires_both_steps() {
        let mut steps = BTreeMap::new();
        steps.insert("eth".to_string(), closes([1.0; 8]));
        assert!(ratio_change_7d(&ProviderBody::Plan(steps)).is_err());
    }
}
