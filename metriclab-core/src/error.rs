//! Configuration and registry errors.
//!
//! Both are fatal before a run starts. Per-metric failures never use these
//! types at the top level; the orchestrator contains them.

use thiserror::Error;

/// Invalid credentials, settings, or request parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing API key: set COINGLASS_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("invalid exchange list for '{param}': {reason}")]
    InvalidExchangeList { param: String, reason: String },

    #[error("invalid interval '{0}'")]
    InvalidInterval(String),

    #[error("invalid limit '{0}': must be a positive integer")]
    InvalidLimit(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Problems found while building the metric registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate metric id '{0}'")]
    DuplicateId(String),

    #[error("malformed metric id '{0}'")]
    MalformedId(String),

    #[error("metric '{id}' is registered under {timeframe} but its id says otherwise")]
    TimeframeMismatch { id: String, timeframe: String },

    #[error("metric '{id}' is implemented but declares no request source")]
    MissingSource { id: String },

    #[error("metric '{id}' has invalid parameters: {source}")]
    InvalidParams {
        id: String,
        #[source]
        source: ConfigError,
    },
}
