//! Property tests for normalizer invariants.
//!
//! Uses proptest to verify:
//! 1. Ordering idempotence: any permutation of provider rows normalizes identically
//! 2. Timestamp canonicalization: floor division by 1000, seconds never exceed ms/1000
//! 3. Funding scale: fractions scale by 100, percents pass through unchanged
//! 4. Totality: arbitrary JSON never panics a normalizer

use proptest::prelude::*;
use serde_json::{json, Value};

use metriclab_core::domain::{Category, Endpoint, MetricDefinition, MetricStatus, Timeframe, Window};
use metriclab_core::normalize::{
    canonical_timestamp, funding_rate_percent, normalize_metric, EtfScope, NormalizerKind,
    FUNDING_FRACTION_THRESHOLD,
};
use metriclab_core::provider::{Envelope, ProviderBody};

// ── Helpers ──────────────────────────────────────────────────────────

fn definition(kind: NormalizerKind, window: Window) -> MetricDefinition {
    MetricDefinition::new("daily_01_under_test", "Under test", Timeframe::Daily, Category::Funding)
        .window(window)
        .endpoint(Endpoint::get("/api/test"))
        .normalizer(kind)
}

fn body(rows: Vec<Value>) -> ProviderBody {
    ProviderBody::Single(Envelope::ok(Value::Array(rows)))
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_funding_rows() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec((0i64..10_000, -0.01..0.01_f64), 5..40).prop_map(|points| {
        points
            .into_iter()
            .map(|(slot, rate)| json!({"time": 1_704_067_200_000i64 + slot * 28_800_000, "close": rate}))
            .collect()
    })
}

fn arb_liquidation_rows() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec((0i64..24, 0.0..5e7_f64, 0.0..5e7_f64), 2..30).prop_map(|rows| {
        let mut out: Vec<Value> = rows
            .into_iter()
            .map(|(hour, long, short)| {
                json!({"time": 1_704_067_200_000i64 + hour * 3_600_000, "longLiquidationUsd": long, "shortLiquidationUsd": short})
            })
            .collect();
        // Pin the span so every case passes the window check.
        out.push(json!({"time": 1_704_067_200_000i64, "longLiquidationUsd": 1e6}));
        out.push(json!({"time": 1_704_067_200_000i64 + 24 * 3_600_000, "shortLiquidationUsd": 1e6}));
        out
    })
}

// ── 1. Ordering idempotence ──────────────────────────────────────────

proptest! {
    #[test]
    fn funding_history_ignores_row_order(
        (rows, shuffled) in arb_funding_rows().prop_flat_map(|rows| {
            let copy = rows.clone();
            (Just(rows), Just(copy).prop_shuffle())
        })
    ) {
        let def = definition(NormalizerKind::FundingRateHistory, Window::H8);
        let a = normalize_metric(&def, &body(rows));
        let b = normalize_metric(&def, &body(shuffled));
        prop_assert_eq!(&a, &b);

        if let Some(series) = a.value.as_ref().and_then(|v| v.as_series()) {
            prop_assert!(series.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        }
    }

    #[test]
    fn liquidation_totals_ignore_row_order(
        (rows, shuffled) in arb_liquidation_rows().prop_flat_map(|rows| {
            let copy = rows.clone();
            (Just(rows), Just(copy).prop_shuffle())
        })
    ) {
        let def = definition(NormalizerKind::Liquidations24h, Window::H24);
        prop_assert_eq!(normalize_metric(&def, &body(rows)), normalize_metric(&def, &body(shuffled)));
    }

    #[test]
    fn top_events_ignore_row_order(
        (rows, shuffled) in arb_liquidation_rows().prop_flat_map(|rows| {
            let copy = rows.clone();
            (Just(rows), Just(copy).prop_shuffle())
        })
    ) {
        let def = definition(NormalizerKind::TopLiquidationEvents, Window::H24);
        let a = normalize_metric(&def, &body(rows));
        prop_assert_eq!(&a, &normalize_metric(&def, &body(shuffled)));
        if let Some(events) = a.value.as_ref().and_then(|v| v.as_records()) {
            prop_assert!(events.len() <= 10);
        }
    }
}

// ── 2. Timestamps ────────────────────────────────────────────────────

#[test]
fn timestamp_fixed_cases() {
    assert_eq!(canonical_timestamp(0), 0);
    assert_eq!(canonical_timestamp(1_704_067_200_000), 1_704_067_200);
    assert_eq!(canonical_timestamp(1_704_067_200_001), 1_704_067_200);
    assert_eq!(canonical_timestamp(1_704_067_200_999), 1_704_067_200);
}

proptest! {
    #[test]
    fn timestamp_is_floor_division(ms in 0i64..4_000_000_000_000) {
        let secs = canonical_timestamp(ms);
        prop_assert_eq!(secs, ms / 1000);
        prop_assert!(secs * 1000 <= ms && ms < (secs + 1) * 1000);
    }
}

// ── 3. Funding scale ─────────────────────────────────────────────────

#[test]
fn funding_scale_fixed_cases() {
    assert!((funding_rate_percent(0.0001) - 0.01).abs() < 1e-12);
    assert_eq!(funding_rate_percent(0.05), 0.05);
    assert_eq!(funding_rate_percent(0.001), 0.001);
}

proptest! {
    #[test]
    fn small_rates_scale_by_hundred(v in -0.000_999_9..0.000_999_9_f64) {
        prop_assert!((funding_rate_percent(v) - v * 100.0).abs() < 1e-12);
    }

    #[test]
    fn large_rates_pass_through(v in FUNDING_FRACTION_THRESHOLD..1.0_f64, negative in any::<bool>()) {
        let v = if negative { -v } else { v };
        prop_assert_eq!(funding_rate_percent(v), v);
    }
}

// ── 4. Totality ──────────────────────────────────────────────────────

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1e12..1e12_f64).prop_map(|f| json!(f)),
        "[a-z0-9._]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(
                prop_oneof![Just("time".to_string()), Just("close".to_string()), "[a-z_]{1,8}"],
                inner,
                0..5
            )
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn normalizers_never_panic(data in arb_json()) {
        let kinds = [
            NormalizerKind::OpenInterestTotal,
            NormalizerKind::OpenInterestChange,
            NormalizerKind::FundingRateHistory,
            NormalizerKind::LongShortRatio,
            NormalizerKind::Liquidations24h,
            NormalizerKind::TopLiquidationEvents,
            NormalizerKind::CoinbasePremium,
            NormalizerKind::FundingRegime,
            NormalizerKind::FearGreed,
            NormalizerKind::StablecoinMarketCap,
            NormalizerKind::RealizedVolatility30d,
            NormalizerKind::LatestClose,
            NormalizerKind::OptionsVolumeGrowth30d,
            NormalizerKind::EtfHoldings(EtfScope::UsSpot),
            NormalizerKind::EtfHoldings(EtfScope::Grayscale),
        ];
        for kind in kinds {
            let def = definition(kind, Window::H24);
            let out = normalize_metric(&def, &ProviderBody::Single(Envelope::ok(data.clone())));
            prop_assert!(out.status != MetricStatus::Ok || out.value.is_some());
        }
    }
}
