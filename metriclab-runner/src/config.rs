//! Run configuration: TOML file, environment overrides, validation, and
//! construction of the provider client for a run.
//!
//! Layering is defaults ← TOML file ← environment ← CLI flags. The CLI
//! applies its own flags on top of what [`RunConfig::load`] returns.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use metriclab_core::domain::Timeframe;
use metriclab_core::provider::{
    ClientSettings, CoinGlassClient, FixtureProvider, ProviderClient, PublicMarketClient,
    RateLimiter, RetryPolicy, RoutedClient, DEFAULT_BASE_URL,
};
use metriclab_core::ConfigError;

use crate::orchestrator::RunOptions;

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "COINGLASS_API_KEY";

/// Environment variable selecting the data mode.
pub const DATA_MODE_ENV: &str = "DATA_MODE";

/// Where a run gets its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// Authenticated CoinGlass API.
    #[default]
    Full,
    /// Public exchange endpoints; most metrics resolve to LOCKED.
    Free,
    /// Recorded responses from `fixture_path`.
    Replay,
}

impl DataMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataMode::Full => "full",
            DataMode::Free => "free",
            DataMode::Replay => "replay",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(DataMode::Full),
            "free" => Ok(DataMode::Free),
            "replay" => Ok(DataMode::Replay),
            other => Err(ConfigError::InvalidSetting {
                field: "data_mode".into(),
                reason: format!("unknown mode '{other}' (expected full, free or replay)"),
            }),
        }
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider API key. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Output destinations. `None` means stdout for the document and report,
/// and no CSV at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub document_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
}

/// Everything a run needs besides the registry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub api_key: Option<ApiKey>,
    pub data_mode: DataMode,
    pub base_url: String,
    pub timeout_secs: u64,
    pub min_request_spacing_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// 1 runs metrics sequentially; more uses a worker pool.
    pub workers: usize,
    /// Timeframes to run. Empty runs all of them.
    pub groups: Vec<Timeframe>,
    /// Recorded responses for replay mode.
    pub fixture_path: Option<PathBuf>,
    pub output: OutputConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            data_mode: DataMode::Full,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            min_request_spacing_ms: 100,
            max_retries: 3,
            retry_base_delay_ms: 500,
            workers: 1,
            groups: Vec::new(),
            fixture_path: None,
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Defaults, then the optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_from(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`. Empty values are
    /// ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = Some(ApiKey::new(key));
        }
        if let Some(mode) = non_empty(DATA_MODE_ENV) {
            self.data_mode = DataMode::parse(&mode)?;
        }
        Ok(())
    }

    /// Fail fast on settings that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_mode == DataMode::Full && self.api_key.as_ref().map_or(true, ApiKey::is_blank) {
            return Err(ConfigError::MissingApiKey);
        }
        if self.data_mode == DataMode::Replay && self.fixture_path.is_none() {
            return Err(invalid("fixture_path", "replay mode needs a fixture file"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be greater than zero"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        Ok(())
    }

    /// Orchestrator options implied by this configuration.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            workers: self.workers,
            groups: self.groups.clone(),
            data_mode: self.data_mode,
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
            },
        }
    }

    /// A fresh limiter for one run.
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(Duration::from_millis(self.min_request_spacing_ms)))
    }

    /// Build the client for the configured data mode, sharing `limiter`.
    pub fn build_provider(
        &self,
        limiter: Arc<RateLimiter>,
    ) -> Result<Arc<dyn ProviderClient>, ConfigError> {
        let settings = self.client_settings();
        match self.data_mode {
            DataMode::Full => {
                let key = self.api_key.as_ref().ok_or(ConfigError::MissingApiKey)?;
                let primary = CoinGlassClient::new(key.expose(), &settings, Arc::clone(&limiter))?;
                let exchange = PublicMarketClient::new(&settings, limiter)?;
                Ok(Arc::new(RoutedClient::new(Box::new(primary), Box::new(exchange))))
            }
            DataMode::Free => Ok(Arc::new(PublicMarketClient::new(&settings, limiter)?)),
            DataMode::Replay => {
                let path = self
                    .fixture_path
                    .as_deref()
                    .ok_or_else(|| invalid("fixture_path", "replay mode needs a fixture file"))?;
                Ok(Arc::new(FixtureProvider::from_file(path)?))
            }
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_provider_limits() {
        let config = RunConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.min_request_spacing_ms, 100);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay_ms, 500);
        assert_eq!(config.workers, 1);
        assert_eq!(config.data_mode, DataMode::Full);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = RunConfig::from_toml(
            r#"
            data_mode = "free"
            workers = 4
            groups = ["daily", "monthly"]

            [output]
            csv_path = "out/metrics.csv"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_mode, DataMode::Free);
        assert_eq!(config.workers, 4);
        assert_eq!(config.groups, vec![Timeframe::Daily, Timeframe::Monthly]);
        assert_eq!(config.output.csv_path, Some(PathBuf::from("out/metrics.csv")));
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = RunConfig::from_toml("wokers = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = RunConfig::from_toml(r#"api_key = "from-file""#).unwrap();
        config
            .apply_env_from(env(&[(API_KEY_ENV, "from-env"), (DATA_MODE_ENV, "FREE")]))
            .unwrap();
        assert_eq!(config.api_key.unwrap().expose(), "from-env");
        assert_eq!(config.data_mode, DataMode::Free);
    }

    #[test]
    fn empty_env_values_ignored() {
        let mut config = RunConfig::from_toml(r#"api_key = "from-file""#).unwrap();
        config.apply_env_from(env(&[(API_KEY_ENV, "  ")])).unwrap();
        assert_eq!(config.api_key.unwrap().expose(), "from-file");
    }

    #[test]
    fn bad_env_mode_is_an_error() {
        let mut config = RunConfig::default();
        let err = config
            .apply_env_from(env(&[(DATA_MODE_ENV, "turbo")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }

    #[test]
    fn full_mode_needs_key() {
        assert!(matches!(
            RunConfig::default().validate(),
            Err(ConfigError::MissingApiKey)
        ));

        let config = RunConfig {
            api_key: Some(ApiKey::new("k")),
            ..RunConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn free_mode_runs_without_key() {
        let config = RunConfig {
            data_mode: DataMode::Free,
            ..RunConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_workers_and_timeout_rejected() {
        let base = RunConfig {
            data_mode: DataMode::Free,
            ..RunConfig::default()
        };
        let zero_workers = RunConfig {
            workers: 0,
            ..base.clone()
        };
        let zero_timeout = RunConfig {
            timeout_secs: 0,
            ..base
        };
        assert!(zero_workers.validate().is_err());
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn replay_needs_fixture() {
        let config = RunConfig {
            data_mode: DataMode::Replay,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let config = RunConfig {
            api_key: Some(ApiKey::new("super-secret")),
            ..RunConfig::default()
        };
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RunConfig::from_file(Path::new("/nonexistent/metriclab.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/metriclab.toml"));
    }
}
