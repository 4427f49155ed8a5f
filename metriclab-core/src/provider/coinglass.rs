//! CoinGlass open API v4 client.
//!
//! Authenticates with the `CG-API-KEY` header. Spacing, retries and dual
//! validation come from the shared [`HttpTransport`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::client::{FetchError, FetchRequest, ProviderClient};
use super::envelope::Envelope;
use super::http::{HttpTransport, RetryPolicy};
use super::rate_limiter::RateLimiter;
use crate::error::ConfigError;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://open-api-v4.coinglass.com";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "cg-api-key";

/// Connection settings shared by the HTTP-backed clients.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct CoinGlassClient {
    transport: HttpTransport,
}

impl CoinGlassClient {
    pub fn new(
        api_key: &str,
        settings: &ClientSettings,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        let headers = HttpTransport::header(API_KEY_HEADER, api_key.trim())?;
        let transport = HttpTransport::new(
            &settings.base_url,
            settings.timeout,
            headers,
            settings.retry,
            limiter,
        )?;
        Ok(Self { transport })
    }
}

impl fmt::Debug for CoinGlassClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoinGlassClient")
            .field("base_url", &self.transport.base_url())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ProviderClient for CoinGlassClient {
    fn name(&self) -> &str {
        "coinglass"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Envelope, FetchError> {
        self.transport.fetch(request)
    }
}
