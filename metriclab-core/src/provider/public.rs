//! Free data-mode client backed by the Binance public APIs.
//!
//! Serves three provider paths and re-wraps the rows into the v4 envelope so
//! the normalizers cannot tell the difference:
//!
//! | provider path | Binance endpoint |
//! |---------------|------------------|
//! | `/api/futures/open-interest/aggregated-history` | `/futures/data/openInterestHist` |
//! | `/api/futures/funding-rate/oi-weight-history` | `/fapi/v1/fundingRate` |
//! | `/api/futures/global-long-short-account-ratio/history` | `/futures/data/globalLongShortAccountRatio` |
//!
//! It also serves the exchange-native paths in [`NATIVE_PATHS`] directly,
//! with the declared parameters passed through as the query. Those rows get
//! the same `{time, close}` shape. Every other path is unsupported; the
//! orchestrator reports those metrics as LOCKED without fetching.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde_json::{json, Map, Value};

use super::client::{FetchError, FetchRequest, ProviderClient};
use super::coinglass::ClientSettings;
use super::envelope::Envelope;
use super::http::{with_retry, HttpTransport};
use super::rate_limiter::RateLimiter;
use crate::domain::HttpMethod;
use crate::error::ConfigError;
use crate::normalize::rows::coerce_f64;

pub const BINANCE_FAPI_URL: &str = "https://fapi.binance.com";
pub const BINANCE_SPOT_URL: &str = "https://api.binance.com";

pub const OPEN_INTEREST_PATH: &str = "/api/futures/open-interest/aggregated-history";
pub const FUNDING_PATH: &str = "/api/futures/funding-rate/oi-weight-history";
pub const LONG_SHORT_PATH: &str = "/api/futures/global-long-short-account-ratio/history";

pub const NATIVE_FUNDING_PATH: &str = "/fapi/v1/fundingRate";
pub const NATIVE_OPEN_INTEREST_PATH: &str = "/fapi/v1/openInterest";
pub const NATIVE_OI_HISTORY_PATH: &str = "/futures/data/openInterestHist";
pub const NATIVE_KLINES_PATH: &str = "/api/v3/klines";

/// Binance endpoints metrics may declare directly.
pub const NATIVE_PATHS: &[&str] = &[
    NATIVE_FUNDING_PATH,
    NATIVE_OPEN_INTEREST_PATH,
    NATIVE_OI_HISTORY_PATH,
    NATIVE_KLINES_PATH,
];

/// Whether `path` is a Binance endpoint rather than a provider path.
pub fn is_native_path(path: &str) -> bool {
    NATIVE_PATHS.contains(&path)
}

/// Reshapes raw Binance rows into provider rows.
type RowMap = fn(&[Value]) -> Vec<Value>;

/// Periods the Binance history endpoints accept.
const BINANCE_PERIODS: &[&str] = &["5m", "15m", "30m", "1h", "2h", "4h", "6h", "12h", "1d"];

pub struct PublicMarketClient {
    futures: HttpTransport,
    spot: HttpTransport,
}

impl PublicMarketClient {
    pub fn new(settings: &ClientSettings, limiter: Arc<RateLimiter>) -> Result<Self, ConfigError> {
        let futures = HttpTransport::new(
            BINANCE_FAPI_URL,
            settings.timeout,
            HeaderMap::new(),
            settings.retry,
            Arc::clone(&limiter),
        )?;
        let spot = HttpTransport::new(
            BINANCE_SPOT_URL,
            settings.timeout,
            HeaderMap::new(),
            settings.retry,
            limiter,
        )?;
        Ok(Self { futures, spot })
    }

    fn get(
        &self,
        transport: &HttpTransport,
        label: &str,
        path: &str,
        query: Vec<(String, String)>,
        rows: RowMap,
    ) -> Result<Envelope, FetchError> {
        with_retry(transport.retry(), label, |_| {
            let (status, body) = transport.send_raw(path, HttpMethod::Get, &query)?;
            if !(200..300).contains(&status) {
                return Err(FetchError::Transport { status });
            }
            wrap_body(body, rows)
        })
    }

    fn native(&self, request: &FetchRequest) -> Result<Envelope, FetchError> {
        let query: Vec<(String, String)> = request
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let path = request.path.as_str();
        let rows: RowMap = match path {
            NATIVE_FUNDING_PATH => funding_rows,
            NATIVE_OPEN_INTEREST_PATH => open_interest_snapshot_rows,
            NATIVE_OI_HISTORY_PATH => open_interest_rows,
            NATIVE_KLINES_PATH => kline_rows,
            other => {
                return Err(FetchError::Unsupported {
                    path: other.to_string(),
                })
            }
        };
        let transport = if path == NATIVE_KLINES_PATH {
            &self.spot
        } else {
            &self.futures
        };
        self.get(transport, path, path, query, rows)
    }
}

/// Binance answers with a bare list, a single object, or a `{code, msg}`
/// error object.
fn wrap_body(body: Value, rows: RowMap) -> Result<Envelope, FetchError> {
    match body {
        Value::Array(raw) => Ok(Envelope::ok(Value::Array(rows(&raw)))),
        Value::Object(map) if map.contains_key("code") && map.contains_key("msg") => {
            Err(binance_error(&map))
        }
        Value::Object(map) => Ok(Envelope::ok(Value::Array(rows(&[Value::Object(map)])))),
        other => Err(FetchError::Malformed(format!("unexpected body: {other}"))),
    }
}

impl ProviderClient for PublicMarketClient {
    fn name(&self) -> &str {
        "binance_public"
    }

    fn supports(&self, path: &str) -> bool {
        matches!(path, OPEN_INTEREST_PATH | FUNDING_PATH | LONG_SHORT_PATH) || is_native_path(path)
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Envelope, FetchError> {
        if is_native_path(&request.path) {
            return self.native(request);
        }
        let params = &request.params;
        let symbol = map_symbol(params.get("symbol"));

        match request.path.as_str() {
            OPEN_INTEREST_PATH => {
                let query = vec![
                    ("symbol".to_string(), symbol),
                    ("period".to_string(), map_period(params.get("interval"))),
                    ("limit".to_string(), clamp_limit(params.get("limit"), 2)),
                ];
                self.get(
                    &self.futures,
                    &request.path,
                    NATIVE_OI_HISTORY_PATH,
                    query,
                    open_interest_rows,
                )
            }
            FUNDING_PATH => {
                let query = vec![
                    ("symbol".to_string(), symbol),
                    ("limit".to_string(), clamp_limit(params.get("limit"), 1)),
                ];
                self.get(&self.futures, &request.path, NATIVE_FUNDING_PATH, query, funding_rows)
            }
            LONG_SHORT_PATH => {
                if let Some(exchange) = params.get("exchange") {
                    if !exchange.eq_ignore_ascii_case("binance") {
                        return Err(FetchError::Unsupported {
                            path: format!("{} (exchange={exchange})", request.path),
                        });
                    }
                }
                let query = vec![
                    ("symbol".to_string(), symbol),
                    ("period".to_string(), map_period(params.get("interval"))),
                    ("limit".to_string(), clamp_limit(params.get("limit"), 1)),
                ];
                self.get(
                    &self.futures,
                    &request.path,
                    "/futures/data/globalLongShortAccountRatio",
                    query,
                    long_short_rows,
                )
            }
            other => Err(FetchError::Unsupported {
                path: other.to_string(),
            }),
        }
    }
}

// ─── Mapping helpers ────────────────────────────────────────────────

/// Bare coin symbols map to their USDT perpetual.
fn map_symbol(symbol: Option<&str>) -> String {
    let s = symbol.unwrap_or("BTC").to_ascii_uppercase();
    if s.ends_with("USDT") || s.ends_with("USDC") {
        s
    } else {
        format!("{s}USDT")
    }
}

/// Binance has no 8h period; the nearest wider one is 12h.
fn map_period(interval: Option<&str>) -> String {
    match interval {
        Some(iv) if BINANCE_PERIODS.contains(&iv) => iv.to_string(),
        Some("8h") => "12h".to_string(),
        Some("24h") => "1d".to_string(),
        _ => "1h".to_string(),
    }
}

fn clamp_limit(limit: Option<&str>, min: i64) -> String {
    limit
        .and_then(|l| l.parse::<i64>().ok())
        .map_or(min, |l| l.max(min))
        .to_string()
}

fn binance_error(map: &Map<String, Value>) -> FetchError {
    let code = map.get("code").map(|c| c.to_string()).unwrap_or_default();
    let msg = map
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    FetchError::Rejected { code, msg }
}

fn open_interest_rows(raw: &[Value]) -> Vec<Value> {
    raw.iter()
        .filter_map(|row| {
            let ts = row.get("timestamp").and_then(coerce_f64)?;
            let close = row
                .get("sumOpenInterestValue")
                .or_else(|| row.get("sumOpenInterest"))
                .and_then(coerce_f64)?;
            Some(json!({"time": ts as i64, "close": close}))
        })
        .collect()
}

/// `/fapi/v1/openInterest` answers with one object in base-asset units.
fn open_interest_snapshot_rows(raw: &[Value]) -> Vec<Value> {
    raw.iter()
        .filter_map(|row| {
            let ts = row.get("time").and_then(coerce_f64)?;
            let close = row.get("openInterest").and_then(coerce_f64)?;
            Some(json!({"time": ts as i64, "close": close}))
        })
        .collect()
}

/// Klines are positional: `[open_time, open, high, low, close, ...]`.
fn kline_rows(raw: &[Value]) -> Vec<Value> {
    raw.iter()
        .filter_map(|row| {
            let fields = row.as_array()?;
            let ts = fields.first().and_then(coerce_f64)?;
            let close = fields.get(4).and_then(coerce_f64)?;
            Some(json!({"time": ts as i64, "close": close}))
        })
        .collect()
}

fn funding_rows(raw: &[Value]) -> Vec<Value> {
    raw.iter()
        .filter_map(|row| {
            let ts = row.get("fundingTime").and_then(coerce_f64)?;
            let rate = row.get("fundingRate").and_then(coerce_f64)?;
            Some(json!({"time": ts as i64, "close": rate}))
        })
        .collect()
}

/// Binance reports account shares as fractions; the provider contract is
/// percent.
fn long_short_rows(raw: &[Value]) -> Vec<Value> {
    raw.iter()
        .filter_map(|row| {
            let ts = row.get("timestamp").and_then(coerce_f64)?;
            let long = row.get("longAccount").and_then(coerce_f64)?;
            let short = row.get("shortAccount").and_then(coerce_f64)?;
            let ratio = row.get("longShortRatio").and_then(coerce_f64)?;
            Some(json!({
                "time": ts as i64,
                "global_account_long_percent": long * 100.0,
                "global_account_short_percent": short * 100.0,
                "global_account_long_short_ratio": ratio,
            }))
        })
        .collect()
}
