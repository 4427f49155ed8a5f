//! Normalizer set: raw provider bodies to canonical values plus a status.
//!
//! Every normalizer is total: any body shape yields a [`Normalized`] and
//! never panics on bad data. Validation failures (empty data, too few
//! points, out-of-range values, implausible spans) are `MISSING`.
//!
//! Dispatch is by [`NormalizerKind`], one implementation per kind, selected
//! by the metric definition. Callers can plug their own implementation in
//! through [`MetricNormalizer`].

mod daily;
mod monthly;
pub mod rows;
pub mod scale;
pub mod time;
mod weekly;

use std::fmt;

use crate::domain::{
    Availability, MetricDefinition, MetricStatus, MetricValue, NormalizerRef, ResponseShape,
    Window,
};
use crate::provider::{Envelope, ProviderBody};

pub use scale::{funding_rate_percent, FUNDING_FRACTION_THRESHOLD};
pub use time::{canonical_timestamp, check_span, SPAN_TOLERANCE_SECS};

/// What a normalizer knows about the metric it is working on.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub metric_id: &'a str,
    pub window: Window,
}

/// Normalizer output.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub status: MetricStatus,
    /// Present iff `status` is OK.
    pub value: Option<MetricValue>,
    pub diagnostic: Option<String>,
}

impl Normalized {
    pub fn ok(value: MetricValue) -> Self {
        Self {
            status: MetricStatus::Ok,
            value: Some(value),
            diagnostic: None,
        }
    }

    pub fn missing(reason: impl Into<String>) -> Self {
        Self::without_value(MetricStatus::Missing, reason)
    }

    pub fn locked(reason: impl Into<String>) -> Self {
        Self::without_value(MetricStatus::Locked, reason)
    }

    pub fn external(reason: impl Into<String>) -> Self {
        Self::without_value(MetricStatus::ExternalRequired, reason)
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::without_value(MetricStatus::Error, reason)
    }

    fn without_value(status: MetricStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            value: None,
            diagnostic: Some(reason.into()),
        }
    }
}

/// A pluggable normalizer.
pub trait MetricNormalizer: Send + Sync {
    fn name(&self) -> &str;

    /// Shape family of the values this normalizer produces.
    fn shape(&self) -> ResponseShape;

    fn normalize(&self, body: &ProviderBody, ctx: &NormalizeContext<'_>) -> Normalized;
}

/// Validation failure inside a built-in normalizer; surfaces as MISSING.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub(crate) struct Reject(String);

impl Reject {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<time::SpanRejected> for Reject {
    fn from(e: time::SpanRejected) -> Self {
        Self(e.to_string())
    }
}

pub(crate) type Outcome = Result<MetricValue, Reject>;

// ─── Built-in kinds ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

/// How a taker-volume metric reports its week-over-week change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeMode {
    /// Change in billions USD.
    Absolute,
    /// Change in percent of the previous week.
    PercentChange,
}

/// Which spot ETFs an ETF holdings metric sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtfScope {
    /// Every US-listed spot fund.
    UsSpot,
    /// US funds whose name contains "Grayscale".
    Grayscale,
}

/// Built-in normalizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizerKind {
    OpenInterestTotal,
    OpenInterestChange,
    FundingRateLatest,
    FundingRateHistory,
    LongShortRatio,
    Liquidations24h,
    TopLiquidationEvents,
    CoinbasePremium,
    FundingRegime,
    /// Most recent `close`, unscaled.
    LatestClose,
    OpenInterestTrend7d,
    BasisSpread7d,
    FundingRateAvg7d,
    Liquidations7d(Side),
    ActiveAddresses7d,
    DominanceChange7d,
    RatioChange7d,
    TakerVolume7d(VolumeMode),
    StablePremium7d,
    FearGreed,
    RealizedVolatility30d,
    StablecoinMarketCap,
    OpenInterestGrowth30d,
    OptionsVolumeGrowth30d,
    EtfHoldings(EtfScope),
    /// Placeholder for metrics without a provider endpoint.
    Unavailable,
}

impl NormalizerKind {
    pub fn shape(&self) -> ResponseShape {
        use NormalizerKind::*;
        match self {
            OpenInterestTotal | OpenInterestChange | FundingRateLatest | LatestClose
            | RealizedVolatility30d | OpenInterestGrowth30d | OptionsVolumeGrowth30d
            | EtfHoldings(_) | Unavailable => ResponseShape::Scalar,
            FundingRateHistory | TopLiquidationEvents => ResponseShape::TimeSeries,
            _ => ResponseShape::Composite,
        }
    }

    pub fn name(&self) -> &'static str {
        use NormalizerKind::*;
        match self {
            OpenInterestTotal => "open_interest_total",
            OpenInterestChange => "open_interest_change",
            FundingRateLatest => "funding_rate_latest",
            FundingRateHistory => "funding_rate_history",
            LongShortRatio => "long_short_ratio",
            Liquidations24h => "liquidations_24h",
            TopLiquidationEvents => "top_liquidation_events",
            CoinbasePremium => "coinbase_premium",
            FundingRegime => "funding_regime",
            LatestClose => "latest_close",
            OpenInterestTrend7d => "open_interest_trend_7d",
            BasisSpread7d => "basis_spread_7d",
            FundingRateAvg7d => "funding_rate_avg_7d",
            Liquidations7d(Side::Long) => "long_liquidations_7d",
            Liquidations7d(Side::Short) => "short_liquidations_7d",
            ActiveAddresses7d => "active_addresses_7d",
            DominanceChange7d => "dominance_change_7d",
            RatioChange7d => "ratio_change_7d",
            TakerVolume7d(VolumeMode::Absolute) => "taker_volume_7d",
            TakerVolume7d(VolumeMode::PercentChange) => "taker_volume_change_7d",
            StablePremium7d => "stable_premium_7d",
            FearGreed => "fear_greed",
            RealizedVolatility30d => "realized_volatility_30d",
            StablecoinMarketCap => "stablecoin_market_cap",
            OpenInterestGrowth30d => "open_interest_growth_30d",
            OptionsVolumeGrowth30d => "options_volume_growth_30d",
            EtfHoldings(EtfScope::UsSpot) => "etf_holdings_us_spot",
            EtfHoldings(EtfScope::Grayscale) => "etf_holdings_grayscale",
            Unavailable => "unavailable",
        }
    }

    fn run_single(&self, env: &Envelope, ctx: &NormalizeContext<'_>) -> Outcome {
        use NormalizerKind::*;
        match self {
            OpenInterestTotal => daily::open_interest_total(env),
            OpenInterestChange => daily::open_interest_change(env),
            FundingRateLatest => daily::funding_rate_latest(env),
            FundingRateHistory => daily::funding_rate_history(env),
            LongShortRatio => daily::long_short_ratio(env),
            Liquidations24h => daily::liquidations_window(env, ctx.window),
            TopLiquidationEvents => daily::top_liquidation_events(env),
            CoinbasePremium => daily::coinbase_premium(env),
            FundingRegime => daily::funding_regime(env),
            LatestClose => daily::latest_close(env),
            OpenInterestTrend7d => weekly::open_interest_trend_7d(env),
            BasisSpread7d => weekly::basis_spread_7d(env),
            FundingRateAvg7d => weekly::funding_rate_avg_7d(env),
            Liquidations7d(side) => weekly::liquidations_7d(env, *side),
            ActiveAddresses7d => weekly::active_addresses_7d(env),
            DominanceChange7d => weekly::dominance_change_7d(env),
            TakerVolume7d(mode) => weekly::taker_volume_7d(env, *mode),
            StablePremium7d => weekly::stable_premium_7d(env),
            FearGreed => weekly::fear_greed(env),
            RealizedVolatility30d => monthly::realized_volatility_30d(env),
            StablecoinMarketCap => monthly::stablecoin_market_cap(env),
            OpenInterestGrowth30d => monthly::open_interest_growth_30d(env),
            OptionsVolumeGrowth30d => monthly::options_volume_growth_30d(env),
            EtfHoldings(scope) => monthly::etf_holdings(env, *scope),
            RatioChange7d | Unavailable => Err(Reject::new("not a single-endpoint normalizer")),
        }
    }
}

impl fmt::Display for NormalizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl MetricNormalizer for NormalizerKind {
    fn name(&self) -> &str {
        NormalizerKind::name(self)
    }

    fn shape(&self) -> ResponseShape {
        NormalizerKind::shape(self)
    }

    fn normalize(&self, body: &ProviderBody, ctx: &NormalizeContext<'_>) -> Normalized {
        let outcome = match (self, body) {
            (NormalizerKind::Unavailable, _) => {
                return Normalized::external("no provider endpoint for this metric")
            }
            (NormalizerKind::RatioChange7d, ProviderBody::Plan(_)) => weekly::ratio_change_7d(body),
            (NormalizerKind::RatioChange7d, ProviderBody::Single(_)) => {
                return Normalized::error("ratio normalizer needs a multi-endpoint body")
            }
            (_, ProviderBody::Single(env)) => self.run_single(env, ctx),
            (_, ProviderBody::Plan(_)) => {
                return Normalized::error(format!(
                    "{} expects a single response, got a multi-endpoint body",
                    self.name()
                ))
            }
        };

        match outcome {
            Ok(value) => Normalized::ok(value),
            Err(reject) => Normalized::missing(reject.0),
        }
    }
}

// ─── Entry point ────────────────────────────────────────────────────

/// Normalize `body` for `def`.
///
/// The registry availability flag wins over everything: a structurally
/// absent metric is EXTERNAL_REQUIRED and a plan-gated one LOCKED even if a
/// body is supplied. Bodies that failed application validation resolve to
/// LOCKED (plan restriction) or ERROR before any normalizer runs.
pub fn normalize_metric(def: &MetricDefinition, body: &ProviderBody) -> Normalized {
    match &def.availability {
        Availability::External { notes } => return Normalized::external(notes.clone()),
        Availability::PlanGated { min_plan } => {
            return Normalized::locked(format!("requires {min_plan} plan"))
        }
        Availability::Implemented => {}
    }

    if let Some(rejected) = screen_envelopes(body) {
        return rejected;
    }

    let ctx = NormalizeContext {
        metric_id: &def.id,
        window: def.window,
    };
    let out = match &def.normalizer {
        NormalizerRef::Builtin(kind) => kind.normalize(body, &ctx),
        NormalizerRef::Custom(n) => n.normalize(body, &ctx),
    };

    if out.status == MetricStatus::Ok {
        let shape = out.value.as_ref().map(MetricValue::shape);
        return match shape {
            None => Normalized::error("normalizer reported OK without a value"),
            Some(s) if s != def.shape => Normalized::error(format!(
                "normalizer produced {s:?}, metric declares {:?}",
                def.shape
            )),
            Some(_) => out,
        };
    }

    Normalized {
        value: None,
        ..out
    }
}

fn screen_envelopes(body: &ProviderBody) -> Option<Normalized> {
    let envelopes: Vec<&Envelope> = match body {
        ProviderBody::Single(env) => vec![env],
        ProviderBody::Plan(map) => map.values().collect(),
    };
    envelopes.into_iter().find(|e| !e.is_success()).map(|e| {
        if e.is_plan_restricted() {
            Normalized::locked(format!("plan restriction: {}", e.msg))
        } else {
            Normalized::error(format!("provider code {}: {}", e.code, e.msg))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Endpoint, PlanTier, Timeframe};
    use serde_json::json;

    fn oi_def() -> MetricDefinition {
        MetricDefinition::new("daily_01_total_open_interest", "Total OI", Timeframe::Daily, Category::OpenInterest)
            .endpoint(Endpoint::get("/api/futures/open-interest/aggregated-history"))
            .normalizer(NormalizerKind::OpenInterestTotal)
    }

    fn body(data: serde_json::Value) -> ProviderBody {
        ProviderBody::Single(Envelope::ok(data))
    }

    #[test]
    fn external_flag_wins_over_body() {
        let def = MetricDefinition::new("daily_07_x", "X", Timeframe::Daily, Category::LongShort)
            .external("not exposed by the provider");
        let out = normalize_metric(&def, &body(json!([{"time": 1, "close": 5e10}])));
        assert_eq!(out.status, MetricStatus::ExternalRequired);
        assert!(out.value.is_none());
    }

    #[test]
    fn plan_gate_wins_over_body() {
        let def = oi_def().plan_gated(PlanTier::Standard);
        let out = normalize_metric(&def, &body(json!([{"time": 1, "close": 5e10}])));
        assert_eq!(out.status, MetricStatus::Locked);
    }

    #[test]
    fn upgrade_envelope_is_locked() {
        let env = Envelope {
            code: "403".into(),
            msg: "Upgrade plan".into(),
            data: json!(null),
        };
        let out = normalize_metric(&oi_def(), &ProviderBody::Single(env));
        assert_eq!(out.status, MetricStatus::Locked);
    }

    #[test]
    fn plan_code_without_marker_is_locked() {
        let env = Envelope {
            code: "403".into(),
            msg: "Forbidden".into(),
            data: json!(null),
        };
        let out = normalize_metric(&oi_def(), &ProviderBody::Single(env));
        assert_eq!(out.status, MetricStatus::Locked);
    }

    #[test]
    fn rejected_envelope_is_error() {
        let env = Envelope {
            code: "500".into(),
            msg: "internal".into(),
            data: json!(null),
        };
        assert_eq!(normalize_metric(&oi_def(), &ProviderBody::Single(env)).status, MetricStatus::Error);
    }

    #[test]
    fn empty_data_is_missing() {
        let out = normalize_metric(&oi_def(), &body(json!([])));
        assert_eq!(out.status, MetricStatus::Missing);
        assert!(out.diagnostic.is_some());
    }

    #[test]
    fn wrong_shape_from_custom_normalizer_is_error() {
        struct Liar;
        impl MetricNormalizer for Liar {
            fn name(&self) -> &str {
                "liar"
            }
            fn shape(&self) -> ResponseShape {
                ResponseShape::Scalar
            }
            fn normalize(&self, _: &ProviderBody, _: &NormalizeContext<'_>) -> Normalized {
                Normalized::ok(MetricValue::Series(vec![]))
            }
        }
        let def = oi_def().custom_normalizer(std::sync::Arc::new(Liar));
        assert_eq!(normalize_metric(&def, &body(json!([]))).status, MetricStatus::Error);
    }

    #[test]
    fn plan_body_for_single_normalizer_is_error() {
        let plan = ProviderBody::Plan(Default::default());
        assert_eq!(normalize_metric(&oi_def(), &plan).status, MetricStatus::Error);
    }
}
