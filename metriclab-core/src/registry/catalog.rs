//! The standard metric catalog.
//!
//! Ids are contract-stable: never renumber or rename an entry. New metrics
//! go at the end of their timeframe. Declaration order is display order.

use crate::domain::{
    Category, DataSource, Endpoint, MetricDefinition, PlanStep, PlanTier, Timeframe, Unit, Window,
};
use crate::normalize::{EtfScope, NormalizerKind, Side, VolumeMode};
use crate::provider::public::{
    NATIVE_FUNDING_PATH, NATIVE_KLINES_PATH, NATIVE_OI_HISTORY_PATH, NATIVE_OPEN_INTEREST_PATH,
};

use super::ExchangeSetId;

const OI_HISTORY: &str = "/api/futures/open-interest/aggregated-history";
const OI_WEIGHTED_FUNDING: &str = "/api/futures/funding-rate/oi-weight-history";
const FUNDING_HISTORY: &str = "/api/futures/funding-rate/history";
const GLOBAL_LONG_SHORT: &str = "/api/futures/global-long-short-account-ratio/history";
const LIQUIDATION_HISTORY: &str = "/api/futures/liquidation/aggregated-history";
const LIQUIDATION_ORDERS: &str = "/api/futures/liquidation/order";
const COINBASE_PREMIUM: &str = "/api/coinbase-premium-index";
const BASIS_HISTORY: &str = "/api/futures/basis/history";
const TAKER_VOLUME: &str = "/api/futures/aggregated-taker-buy-sell-volume/history";
const SPOT_PRICE: &str = "/api/spot/price/history";
const ACTIVE_ADDRESSES: &str = "/api/index/bitcoin-active-addresses";
const BTC_DOMINANCE: &str = "/api/index/bitcoin-dominance";
const FEAR_GREED: &str = "/api/index/fear-greed-history";
const STABLECOIN_CAP: &str = "/api/index/stableCoin-marketCap-history";
const OPTIONS_VOLUME: &str = "/api/option/exchange-vol-history";
const ETF_LIST: &str = "/api/etf/bitcoin/list";

const ONCHAIN: &str = "requires an on-chain data provider";
const CFTC: &str = "requires the CFTC commitments-of-traders report";

/// Every metric, daily then weekly then monthly.
pub fn standard_metrics() -> Vec<MetricDefinition> {
    let mut all = daily();
    all.extend(weekly());
    all.extend(monthly());
    all
}

fn aggregated(path: &str, interval: &str, limit: i64) -> Endpoint {
    Endpoint::get(path)
        .param("symbol", "BTC")
        .param("interval", interval)
        .param("limit", limit)
}

fn binance_native_oi(period: &str) -> Endpoint {
    Endpoint::get(NATIVE_OI_HISTORY_PATH)
        .param("symbol", "BTCUSDT")
        .param("period", period)
        .param("limit", 2)
}

fn binance(path: &str, symbol: &str, interval: &str, limit: i64) -> Endpoint {
    Endpoint::get(path)
        .param("exchange", "Binance")
        .param("symbol", symbol)
        .param("interval", interval)
        .param("limit", limit)
}

// ─── Daily ──────────────────────────────────────────────────────────

fn daily() -> Vec<MetricDefinition> {
    use Category::*;
    let d = |id: &str, name: &str, category| MetricDefinition::new(id, name, Timeframe::Daily, category);

    vec![
        d("daily_01_total_open_interest", "Total Open Interest", OpenInterest)
            .endpoint(aggregated(OI_HISTORY, "8h", 1))
            .normalizer(NormalizerKind::OpenInterestTotal)
            .unit(Unit::BillionUsd)
            .describe("Current aggregated open interest across exchanges"),
        d("daily_02_oi_change_1h", "OI Change (1h)", OpenInterest)
            .window(Window::H1)
            .endpoint(aggregated(OI_HISTORY, "1h", 5))
            .normalizer(NormalizerKind::OpenInterestChange)
            .unit(Unit::Percent)
            .describe("Percent change of the two latest hourly closes"),
        d("daily_03_oi_change_4h", "OI Change (4h)", OpenInterest)
            .window(Window::H4)
            .endpoint(aggregated(OI_HISTORY, "4h", 2))
            .normalizer(NormalizerKind::OpenInterestChange)
            .unit(Unit::Percent)
            .describe("Percent change of the two latest 4h closes"),
        d("daily_04_weighted_funding_rate", "Weighted Funding Rate", Funding)
            .endpoint(aggregated(OI_WEIGHTED_FUNDING, "8h", 1))
            .normalizer(NormalizerKind::FundingRateLatest)
            .unit(Unit::Percent)
            .describe("Latest OI-weighted funding rate, percent per 8h"),
        d("daily_05_funding_rate_history", "Funding Rate History", Funding)
            .window(Window::H8)
            .endpoint(aggregated(OI_WEIGHTED_FUNDING, "8h", 30))
            .normalizer(NormalizerKind::FundingRateHistory)
            .unit(Unit::Percent)
            .describe("Thirty 8h OI-weighted funding rates, most recent first"),
        d("daily_06_long_short_global", "Long/Short Ratio (Global)", LongShort)
            .window(Window::H1)
            .endpoint(
                Endpoint::get(GLOBAL_LONG_SHORT)
                    .param("exchange", "Binance")
                    .param("symbol", "BTCUSDT")
                    .param("interval", "1h")
                    .param("limit", 1),
            )
            .normalizer(NormalizerKind::LongShortRatio)
            .unit(Unit::Ratio)
            .describe("Global account long/short split on Binance"),
        d("daily_07_long_short_hyperliquid", "Long/Short Ratio (Hyperliquid)", LongShort)
            .unit(Unit::Ratio)
            .external("the provider exposes no Hyperliquid account ratio")
            .describe("Hyperliquid account long/short split"),
        d("daily_08_liquidations_24h_total", "24h Liquidations (Total)", Liquidations)
            .window(Window::H24)
            .endpoint(aggregated(LIQUIDATION_HISTORY, "4h", 6).param("exchange_list", ExchangeSetId::Daily))
            .normalizer(NormalizerKind::Liquidations24h)
            .unit(Unit::MillionUsd)
            .describe("Long, short and total liquidations over six 4h buckets"),
        d("daily_09_top_liquidation_events", "Top Liquidation Events", Liquidations)
            .window(Window::H24)
            .endpoint(aggregated(LIQUIDATION_HISTORY, "1h", 24).param("exchange_list", ExchangeSetId::Daily))
            .normalizer(NormalizerKind::TopLiquidationEvents)
            .unit(Unit::Events)
            .approximate("derived from aggregated hourly buckets, not individual liquidation orders")
            .describe("Ten largest hourly liquidation buckets by side"),
        d("daily_10_coinbase_premium_index", "Coinbase Premium Index", Premium)
            .endpoint(aggregated(COINBASE_PREMIUM, "1h", 2))
            .normalizer(NormalizerKind::CoinbasePremium)
            .unit(Unit::Percent)
            .describe("Coinbase premium rate and its change over the last hour"),
        d("daily_11_funding_regime_8h", "Funding Regime (8h)", Funding)
            .window(Window::H8)
            .endpoint(aggregated(OI_WEIGHTED_FUNDING, "8h", 30))
            .normalizer(NormalizerKind::FundingRegime)
            .unit(Unit::FundingRegime)
            .source_kind(DataSource::Computed)
            .describe("Regime summary of the last thirty 8h funding rates"),
        d("daily_12_price_last_close", "BTC Price (Last Close)", Price)
            .window(Window::H1)
            .endpoint(
                Endpoint::get(NATIVE_KLINES_PATH)
                    .param("symbol", "BTCUSDT")
                    .param("interval", "1h")
                    .param("limit", 2),
            )
            .normalizer(NormalizerKind::LatestClose)
            .unit(Unit::Usd)
            .source_kind(DataSource::Binance)
            .describe("Close of the latest hourly BTCUSDT spot candle"),
        d("daily_13_binance_funding_rate_last", "Binance Funding Rate", Funding)
            .window(Window::H8)
            .endpoint(
                Endpoint::get(NATIVE_FUNDING_PATH)
                    .param("symbol", "BTCUSDT")
                    .param("limit", 1),
            )
            .normalizer(NormalizerKind::FundingRateLatest)
            .unit(Unit::Percent)
            .source_kind(DataSource::Binance)
            .describe("Last settled BTCUSDT perpetual funding rate on Binance"),
        d("daily_14_binance_open_interest", "Binance Open Interest", OpenInterest)
            .endpoint(Endpoint::get(NATIVE_OPEN_INTEREST_PATH).param("symbol", "BTCUSDT"))
            .normalizer(NormalizerKind::LatestClose)
            .unit(Unit::Btc)
            .source_kind(DataSource::Binance)
            .describe("BTCUSDT perpetual open interest on Binance, in BTC"),
        d("daily_15_binance_oi_change_1h", "Binance OI Change (1h)", OpenInterest)
            .window(Window::H1)
            .endpoint(binance_native_oi("1h"))
            .normalizer(NormalizerKind::OpenInterestChange)
            .unit(Unit::Percent)
            .source_kind(DataSource::Binance)
            .describe("Percent change of Binance open interest value over the last hour"),
        d("daily_16_binance_oi_change_4h", "Binance OI Change (4h)", OpenInterest)
            .window(Window::H4)
            .endpoint(binance_native_oi("4h"))
            .normalizer(NormalizerKind::OpenInterestChange)
            .unit(Unit::Percent)
            .source_kind(DataSource::Binance)
            .describe("Percent change of Binance open interest value over the last 4h"),
        d("daily_17_liquidation_orders", "Liquidation Orders (24h)", Liquidations)
            .window(Window::H24)
            .endpoint(
                Endpoint::get(LIQUIDATION_ORDERS)
                    .param("symbol", "BTC")
                    .param("exchange_list", ExchangeSetId::Daily)
                    .param("limit", 10),
            )
            .unit(Unit::Events)
            .plan_gated(PlanTier::Standard)
            .describe("Individual liquidation orders"),
    ]
}

// ─── Weekly ─────────────────────────────────────────────────────────

fn weekly() -> Vec<MetricDefinition> {
    use Category::*;
    let w = |id: &str, name: &str, category| {
        MetricDefinition::new(id, name, Timeframe::Weekly, category).window(Window::D7)
    };
    let weekly_venues = |path| aggregated(path, "1d", 14).param("exchange_list", ExchangeSetId::Weekly);

    vec![
        w("weekly_01_oi_trend", "OI Trend (7d)", OpenInterest)
            .endpoint(aggregated(OI_HISTORY, "1d", 14))
            .normalizer(NormalizerKind::OpenInterestTrend7d)
            .unit(Unit::BillionUsd),
        w("weekly_02_cme_oi", "CME OI (7d)", OpenInterest)
            .unit(Unit::Contracts)
            .external(CFTC),
        w("weekly_03_cme_long_short", "CME Long/Short", LongShort)
            .unit(Unit::Ratio)
            .external(CFTC),
        w("weekly_04_basis_spread", "Basis Spread (7d)", Premium)
            .endpoint(binance(BASIS_HISTORY, "BTCUSDT", "1d", 14))
            .normalizer(NormalizerKind::BasisSpread7d)
            .unit(Unit::Percent),
        w("weekly_05_funding_rate_avg", "Funding Rate Avg (7d)", Funding)
            .endpoint(binance(FUNDING_HISTORY, "BTCUSDT", "1d", 14))
            .normalizer(NormalizerKind::FundingRateAvg7d)
            .unit(Unit::Percent),
        w("weekly_06_long_liquidations", "Long Liquidations (7d)", Liquidations)
            .endpoint(weekly_venues(LIQUIDATION_HISTORY))
            .normalizer(NormalizerKind::Liquidations7d(Side::Long))
            .unit(Unit::MillionUsd),
        w("weekly_07_short_liquidations", "Short Liquidations (7d)", Liquidations)
            .endpoint(weekly_venues(LIQUIDATION_HISTORY))
            .normalizer(NormalizerKind::Liquidations7d(Side::Short))
            .unit(Unit::MillionUsd),
        w("weekly_08_net_flow", "Net Flow (7d)", Onchain)
            .unit(Unit::Btc)
            .external(ONCHAIN),
        w("weekly_09_large_holder_acc", "Large Holder Accumulation (7d)", Onchain)
            .unit(Unit::Percent)
            .external(ONCHAIN),
        w("weekly_10_active_addresses", "Active Addresses (7d)", Onchain)
            .endpoint(Endpoint::get(ACTIVE_ADDRESSES))
            .normalizer(NormalizerKind::ActiveAddresses7d)
            .unit(Unit::Thousand)
            .describe("The provider returns the full history; the last 14 days are used"),
        w("weekly_11_btc_dominance_change", "BTC Dominance Change", Price)
            .endpoint(Endpoint::get(BTC_DOMINANCE))
            .normalizer(NormalizerKind::DominanceChange7d)
            .unit(Unit::Percent),
        w("weekly_12_eth_btc_ratio_change", "ETH/BTC Ratio Change", Price)
            .plan(vec![
                PlanStep {
                    key: "eth".to_string(),
                    endpoint: binance(SPOT_PRICE, "ETHUSDT", "1d", 8),
                },
                PlanStep {
                    key: "btc".to_string(),
                    endpoint: binance(SPOT_PRICE, "BTCUSDT", "1d", 8),
                },
            ])
            .normalizer(NormalizerKind::RatioChange7d)
            .unit(Unit::Ratio)
            .source_kind(DataSource::Computed),
        w("weekly_13_major_exchange_volume", "Major Exchange Volume (7d)", Volume)
            .endpoint(weekly_venues(TAKER_VOLUME))
            .normalizer(NormalizerKind::TakerVolume7d(VolumeMode::Absolute))
            .unit(Unit::BillionUsd)
            .approximate("taker buy/sell volume stands in for total exchange volume"),
        w("weekly_14_perp_volume_change", "Perp Volume Change (7d)", Volume)
            .endpoint(weekly_venues(TAKER_VOLUME))
            .normalizer(NormalizerKind::TakerVolume7d(VolumeMode::PercentChange))
            .unit(Unit::Percent)
            .approximate("taker buy/sell volume stands in for perpetual volume"),
        w("weekly_15_usdt_premium", "USDT Premium (7d)", Premium)
            .endpoint(binance(SPOT_PRICE, "USDCUSDT", "1d", 14))
            .normalizer(NormalizerKind::StablePremium7d)
            .unit(Unit::Percent)
            .approximate("USDC/USDT spot close stands in for the USDT premium"),
        w("weekly_16_fear_greed_index", "Fear & Greed Index", Sentiment)
            .endpoint(Endpoint::get(FEAR_GREED))
            .normalizer(NormalizerKind::FearGreed)
            .unit(Unit::Index),
        w("weekly_17_options_put_call_ratio", "Options Put/Call Ratio", Sentiment)
            .unit(Unit::Ratio)
            .external("requires an options data provider with a put/call split"),
        w("weekly_18_market_cap_rank_changes", "Market Cap Rank Changes", Price)
            .unit(Unit::Count)
            .external("requires a market-cap ranking source"),
    ]
}

// ─── Monthly ────────────────────────────────────────────────────────

fn monthly() -> Vec<MetricDefinition> {
    use Category::*;
    let m = |id: &str, name: &str, category| {
        MetricDefinition::new(id, name, Timeframe::Monthly, category).window(Window::D30)
    };
    let onchain = |id: &str, name: &str, unit| m(id, name, Onchain).unit(unit).external(ONCHAIN);

    vec![
        m("monthly_01_volatility", "Volatility (30d)", Price)
            .endpoint(binance(SPOT_PRICE, "BTCUSDT", "1d", 35))
            .normalizer(NormalizerKind::RealizedVolatility30d)
            .unit(Unit::Percent)
            .source_kind(DataSource::Computed)
            .describe("Annualized standard deviation of daily log returns"),
        onchain("monthly_02_mvrv_ratio", "MVRV Ratio", Unit::Ratio),
        onchain("monthly_03_nvt_ratio", "NVT Ratio", Unit::Ratio),
        onchain("monthly_04_supply_on_exchanges", "Supply on Exchanges", Unit::Percent),
        onchain("monthly_05_miner_reserve", "Miner Reserve", Unit::Btc),
        onchain("monthly_06_long_term_holder_supply", "Long-Term Holder Supply", Unit::Percent),
        m("monthly_07_hash_rate_growth", "Hash Rate Growth", Onchain)
            .unit(Unit::Percent)
            .external("requires a hash-rate data source"),
        onchain("monthly_08_realized_cap_change", "Realized Cap Change", Unit::Percent),
        m("monthly_09_stablecoin_market_cap", "Stablecoin Market Cap", Onchain)
            .endpoint(Endpoint::get(STABLECOIN_CAP))
            .normalizer(NormalizerKind::StablecoinMarketCap)
            .unit(Unit::BillionUsd),
        m("monthly_10_futures_oi_growth", "Futures OI Growth", OpenInterest)
            .endpoint(aggregated(OI_HISTORY, "1d", 35))
            .normalizer(NormalizerKind::OpenInterestGrowth30d)
            .unit(Unit::Percent),
        m("monthly_11_options_vol_growth", "Options Volume Growth", Volume)
            .endpoint(
                Endpoint::get(OPTIONS_VOLUME)
                    .param("symbol", "BTC")
                    .param("interval", "1d")
                    .param("limit", 60),
            )
            .normalizer(NormalizerKind::OptionsVolumeGrowth30d)
            .unit(Unit::Percent)
            .describe("Options volume across venues, last 30 days against the 30 before"),
        m("monthly_12_etf_holdings", "Spot ETF Holdings", Onchain)
            .endpoint(Endpoint::get(ETF_LIST))
            .normalizer(NormalizerKind::EtfHoldings(EtfScope::UsSpot))
            .unit(Unit::Btc)
            .describe("BTC held by US spot ETFs"),
        m("monthly_13_grayscale_institutional", "Grayscale Holdings", Onchain)
            .endpoint(Endpoint::get(ETF_LIST))
            .normalizer(NormalizerKind::EtfHoldings(EtfScope::Grayscale))
            .unit(Unit::Btc)
            .describe("BTC held by the Grayscale trusts"),
        m("monthly_14_social_volume", "Social Volume", Sentiment)
            .unit(Unit::Index)
            .external("requires a social-media mentions feed")
            .describe("Twitter and Reddit mentions of bitcoin"),
        m("monthly_15_developer_activity", "Developer Activity", Onchain)
            .unit(Unit::Count)
            .external("requires repository commit statistics")
            .describe("Commits to Bitcoin Core and Lightning repositories"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Availability;

    #[test]
    fn ids_carry_their_timeframe() {
        for def in standard_metrics() {
            assert!(def.id.starts_with(def.timeframe().as_str()), "{}", def.id);
        }
    }

    #[test]
    fn counts_per_timeframe() {
        let all = standard_metrics();
        let count = |tf| all.iter().filter(|d| d.timeframe() == tf).count();
        assert_eq!(count(Timeframe::Daily), 17);
        assert_eq!(count(Timeframe::Weekly), 18);
        assert_eq!(count(Timeframe::Monthly), 15);
    }

    #[test]
    fn binance_metrics_use_exchange_native_paths() {
        let all = standard_metrics();
        let native: Vec<&str> = all
            .iter()
            .filter(|d| d.data_source == DataSource::Binance)
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(
            native,
            vec![
                "daily_12_price_last_close",
                "daily_13_binance_funding_rate_last",
                "daily_14_binance_open_interest",
                "daily_15_binance_oi_change_1h",
                "daily_16_binance_oi_change_4h",
            ]
        );
        for def in all.iter().filter(|d| d.data_source == DataSource::Binance) {
            for endpoint in def.source.endpoints() {
                assert!(crate::provider::is_native_path(&endpoint.path), "{}", def.id);
            }
        }
    }

    #[test]
    fn liquidation_orders_stay_plan_gated() {
        let all = standard_metrics();
        let def = all.iter().find(|d| d.id == "daily_17_liquidation_orders").unwrap();
        assert_eq!(
            def.availability,
            Availability::PlanGated {
                min_plan: PlanTier::Standard
            }
        );
    }

    #[test]
    fn external_metrics_never_have_a_source() {
        for def in standard_metrics() {
            if matches!(def.availability, Availability::External { .. }) {
                assert!(def.source.endpoints().is_empty(), "{}", def.id);
            }
        }
    }

    #[test]
    fn top_events_is_flagged_approximate() {
        let all = standard_metrics();
        let def = all
            .iter()
            .find(|d| d.id == "daily_09_top_liquidation_events")
            .unwrap();
        assert!(def.approximation.is_some());
    }
}
