//! Metric definitions: the immutable registry entries.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::normalize::{MetricNormalizer, NormalizerKind};
use crate::registry::ExchangeSetId;

// ─── Grouping ───────────────────────────────────────────────────────

/// Reporting cadence; the top-level grouping of every output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Timeframe::Daily),
            "weekly" => Some(Timeframe::Weekly),
            "monthly" => Some(Timeframe::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thematic sub-group within a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    OpenInterest,
    Funding,
    LongShort,
    Liquidations,
    Premium,
    Price,
    Sentiment,
    Onchain,
    Volume,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::OpenInterest => "open_interest",
            Category::Funding => "funding",
            Category::LongShort => "long_short",
            Category::Liquidations => "liquidations",
            Category::Premium => "premium",
            Category::Price => "price",
            Category::Sentiment => "sentiment",
            Category::Onchain => "onchain",
            Category::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub timeframe: Timeframe,
    pub category: Category,
}

/// Canonical aggregation window a metric describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "snapshot")]
    Snapshot,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "7d")]
    D7,
    #[serde(rename = "30d")]
    D30,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Snapshot => "snapshot",
            Window::H1 => "1h",
            Window::H4 => "4h",
            Window::H8 => "8h",
            Window::H24 => "24h",
            Window::D7 => "7d",
            Window::D30 => "30d",
        }
    }

    /// Nominal length in seconds; `None` for point-in-time snapshots.
    pub fn nominal_secs(&self) -> Option<i64> {
        const HOUR: i64 = 3_600;
        match self {
            Window::Snapshot => None,
            Window::H1 => Some(HOUR),
            Window::H4 => Some(4 * HOUR),
            Window::H8 => Some(8 * HOUR),
            Window::H24 => Some(24 * HOUR),
            Window::D7 => Some(7 * 24 * HOUR),
            Window::D30 => Some(30 * 24 * HOUR),
        }
    }
}

// ─── Request descriptors ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A declared parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    /// Reference to a named venue set; rendered by the parameter normalizer.
    Exchanges(ExchangeSetId),
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<ExchangeSetId> for ParamValue {
    fn from(id: ExchangeSetId) -> Self {
        ParamValue::Exchanges(id)
    }
}

/// Provider path, method, and declared parameters (in declaration order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    pub params: Vec<(String, ParamValue)>,
}

impl Endpoint {
    pub fn get(path: &str) -> Self {
        Self {
            path: path.to_string(),
            method: HttpMethod::Get,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }
}

/// One keyed step of a multi-endpoint fetch plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub key: String,
    pub endpoint: Endpoint,
}

/// Where a metric's raw data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSource {
    Endpoint(Endpoint),
    /// Several requests; the metric succeeds only if all of them do.
    Plan(Vec<PlanStep>),
    None,
}

impl RequestSource {
    pub fn endpoints(&self) -> Vec<&Endpoint> {
        match self {
            RequestSource::Endpoint(e) => vec![e],
            RequestSource::Plan(steps) => steps.iter().map(|s| &s.endpoint).collect(),
            RequestSource::None => Vec::new(),
        }
    }
}

// ─── Metric metadata ────────────────────────────────────────────────

/// Response shape family; selects the normalizer family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    Scalar,
    TimeSeries,
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Startup,
    Standard,
    Premium,
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlanTier::Startup => "startup",
            PlanTier::Standard => "standard",
            PlanTier::Premium => "premium",
        })
    }
}

/// Whether a metric can be fetched at all. Authoritative over any fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Implemented,
    /// No reachable provider endpoint; always `EXTERNAL_REQUIRED`.
    External { notes: String },
    /// Known to need a higher plan; always `LOCKED`, never fetched.
    PlanGated { min_plan: PlanTier },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[serde(rename = "coinglass")]
    CoinGlass,
    /// Binance public endpoints, served without a key.
    Binance,
    Computed,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Percent,
    BillionUsd,
    MillionUsd,
    Thousand,
    Ratio,
    Index,
    Usd,
    Btc,
    Contracts,
    Count,
    FundingRegime,
    Events,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Percent => "percent",
            Unit::BillionUsd => "billion_usd",
            Unit::MillionUsd => "million_usd",
            Unit::Thousand => "thousand",
            Unit::Ratio => "ratio",
            Unit::Index => "index",
            Unit::Usd => "usd",
            Unit::Btc => "btc",
            Unit::Contracts => "contracts",
            Unit::Count => "count",
            Unit::FundingRegime => "funding_regime",
            Unit::Events => "events",
        }
    }
}

/// Normalizer selection: a built-in kind or a caller-supplied implementation.
#[derive(Clone)]
pub enum NormalizerRef {
    Builtin(NormalizerKind),
    Custom(Arc<dyn MetricNormalizer>),
}

impl NormalizerRef {
    pub fn shape(&self) -> ResponseShape {
        match self {
            NormalizerRef::Builtin(kind) => kind.shape(),
            NormalizerRef::Custom(n) => n.shape(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NormalizerRef::Builtin(kind) => kind.name(),
            NormalizerRef::Custom(n) => n.name(),
        }
    }
}

impl fmt::Debug for NormalizerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizerRef::Builtin(kind) => write!(f, "Builtin({kind:?})"),
            NormalizerRef::Custom(n) => write!(f, "Custom({})", n.name()),
        }
    }
}

// ─── MetricDefinition ───────────────────────────────────────────────

/// Immutable description of how to fetch and normalize one metric.
///
/// Built once when the registry is constructed and shared read-only by
/// every run.
#[derive(Debug, Clone)]
pub struct MetricDefinition {
    pub id: String,
    pub name: String,
    pub group: Group,
    pub window: Window,
    pub source: RequestSource,
    pub shape: ResponseShape,
    pub normalizer: NormalizerRef,
    pub availability: Availability,
    pub unit: Unit,
    pub data_source: DataSource,
    /// Set when the value is knowingly approximate.
    pub approximation: Option<String>,
    pub description: String,
}

impl MetricDefinition {
    /// Start a definition. Defaults: snapshot window, no source,
    /// a placeholder availability until a normalizer is attached.
    pub fn new(id: &str, name: &str, timeframe: Timeframe, category: Category) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            group: Group { timeframe, category },
            window: Window::Snapshot,
            source: RequestSource::None,
            shape: ResponseShape::Scalar,
            normalizer: NormalizerRef::Builtin(NormalizerKind::Unavailable),
            availability: Availability::External {
                notes: "no provider endpoint".to_string(),
            },
            unit: Unit::Count,
            data_source: DataSource::CoinGlass,
            approximation: None,
            description: String::new(),
        }
    }

    pub fn window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.source = RequestSource::Endpoint(endpoint);
        self
    }

    pub fn plan(mut self, steps: Vec<PlanStep>) -> Self {
        self.source = RequestSource::Plan(steps);
        self
    }

    /// Attach a built-in normalizer; marks the metric implemented.
    pub fn normalizer(self, kind: NormalizerKind) -> Self {
        self.normalizer_ref(NormalizerRef::Builtin(kind))
    }

    /// Attach a custom normalizer; marks the metric implemented.
    pub fn custom_normalizer(self, normalizer: Arc<dyn MetricNormalizer>) -> Self {
        self.normalizer_ref(NormalizerRef::Custom(normalizer))
    }

    fn normalizer_ref(mut self, normalizer: NormalizerRef) -> Self {
        self.shape = normalizer.shape();
        self.normalizer = normalizer;
        self.availability = Availability::Implemented;
        self
    }

    pub fn external(mut self, notes: &str) -> Self {
        self.availability = Availability::External {
            notes: notes.to_string(),
        };
        self.data_source = DataSource::External;
        self
    }

    pub fn plan_gated(mut self, min_plan: PlanTier) -> Self {
        self.availability = Availability::PlanGated { min_plan };
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn source_kind(mut self, data_source: DataSource) -> Self {
        self.data_source = data_source;
        self
    }

    pub fn approximate(mut self, note: &str) -> Self {
        self.approximation = Some(note.to_string());
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn timeframe(&self) -> Timeframe {
        self.group.timeframe
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self.availability, Availability::Implemented)
    }
}
