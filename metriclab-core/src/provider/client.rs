//! Provider client trait and structured fetch error types.
//!
//! The ProviderClient trait abstracts over data sources (CoinGlass, the
//! public-exchange fallback, recorded fixtures) so the orchestrator can swap
//! implementations and mock them in tests.

use std::collections::BTreeMap;

use thiserror::Error;

use super::envelope::Envelope;
use crate::domain::{Endpoint, HttpMethod};
use crate::params::RequestParams;

/// Structured fetch failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}")]
    Transport { status: u16 },

    #[error("provider rejected request (code {code}): {msg}")]
    Rejected { code: String, msg: String },

    #[error("plan restriction (code {code}): {msg}")]
    PlanRestricted { code: String, msg: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("endpoint not supported by this client: {path}")]
    Unsupported { path: String },
}

impl FetchError {
    /// Transient failures worth another attempt: timeouts, connection
    /// failures, HTTP 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connection(_) => true,
            FetchError::Transport { status } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Short kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Connection(_) => "connection",
            FetchError::Transport { .. } => "transport",
            FetchError::Rejected { .. } => "rejected",
            FetchError::PlanRestricted { .. } => "plan_restricted",
            FetchError::Malformed(_) => "malformed",
            FetchError::Unsupported { .. } => "unsupported",
        }
    }
}

/// One rendered provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Plan step key; `None` for single-endpoint metrics.
    pub key: Option<String>,
    pub path: String,
    pub method: HttpMethod,
    pub params: RequestParams,
}

impl FetchRequest {
    pub fn new(key: Option<String>, endpoint: &Endpoint, params: RequestParams) -> Self {
        Self {
            key,
            path: endpoint.path.clone(),
            method: endpoint.method,
            params,
        }
    }

    /// `path?query`, or just the path when there are no parameters.
    pub fn target(&self) -> String {
        if self.params.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.params.as_query())
        }
    }
}

/// Raw input to a normalizer: one envelope, or one per plan step.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderBody {
    Single(Envelope),
    Plan(BTreeMap<String, Envelope>),
}

impl ProviderBody {
    pub fn single(&self) -> Option<&Envelope> {
        match self {
            ProviderBody::Single(e) => Some(e),
            ProviderBody::Plan(_) => None,
        }
    }

    pub fn step(&self, key: &str) -> Option<&Envelope> {
        match self {
            ProviderBody::Plan(map) => map.get(key),
            ProviderBody::Single(_) => None,
        }
    }
}

/// Trait for provider clients (CoinGlass, public fallback, fixtures).
///
/// Implementations own their transport, retry policy and rate limiter.
/// A returned envelope has already passed dual validation.
pub trait ProviderClient: Send + Sync {
    /// Human-readable name of this client.
    fn name(&self) -> &str;

    /// Issue one request.
    fn fetch(&self, request: &FetchRequest) -> Result<Envelope, FetchError>;

    /// Whether this client can serve `path` at all.
    fn supports(&self, _path: &str) -> bool {
        true
    }
}
