//! Blocking HTTP transport with bounded retry.
//!
//! Retries only transient failures (timeouts, connection errors, HTTP 429 and
//! 5xx) with exponential backoff `base_delay * 2^(attempt-1)`. Application
//! rejections and plan restrictions return immediately.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde_json::Value;

use super::client::{FetchError, FetchRequest};
use super::envelope::{self, Envelope};
use super::rate_limiter::RateLimiter;
use crate::domain::HttpMethod;
use crate::error::ConfigError;

const LOG_TARGET: &str = "metriclab::http";

/// Retry settings for one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt - 1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or retries run out.
///
/// `attempt` receives the 0-based attempt number.
pub fn with_retry<F>(policy: RetryPolicy, label: &str, mut attempt: F) -> Result<Envelope, FetchError>
where
    F: FnMut(u32) -> Result<Envelope, FetchError>,
{
    let mut n = 0;
    loop {
        match attempt(n) {
            Ok(envelope) => return Ok(envelope),
            Err(e) if e.is_retryable() && n < policy.max_retries => {
                n += 1;
                let delay = policy.delay(n);
                log::debug!(
                    target: LOG_TARGET,
                    "{label}: {e}; retry {n}/{} in {} ms",
                    policy.max_retries,
                    delay.as_millis()
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Shared HTTP plumbing for the provider clients.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    retry: RetryPolicy,
    limiter: Arc<RateLimiter>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        headers: HeaderMap,
        retry: RetryPolicy,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ConfigError> {
        let mut headers = headers;
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("metriclab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidSetting {
                field: "http_client".into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            limiter,
        })
    }

    /// Build a single header map entry, rejecting values that are not valid
    /// header text.
    pub fn header(name: &'static str, value: &str) -> Result<HeaderMap, ConfigError> {
        let mut map = HeaderMap::new();
        let value = HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidSetting {
            field: name.to_string(),
            reason: "not a valid header value".into(),
        })?;
        map.insert(HeaderName::from_static(name), value);
        Ok(map)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Send `request` (against `path`, which may differ from the request's
    /// own path for clients that remap endpoints) and decode the raw JSON.
    pub fn send_raw(
        &self,
        path: &str,
        method: HttpMethod,
        query: &[(String, String)],
    ) -> Result<(u16, Value), FetchError> {
        self.limiter.acquire();

        let url = format!("{}{}", self.base_url, path);
        let builder = match method {
            HttpMethod::Get => self.client.get(&url).query(query),
            HttpMethod::Post => {
                let body: serde_json::Map<String, Value> = query
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                self.client.post(&url).json(&body)
            }
        };

        let resp = builder.send().map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();
        let text = resp.text().map_err(map_reqwest_error)?;

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok((status, body)),
            Err(_) if !(200..300).contains(&status) => Err(FetchError::Transport { status }),
            Err(e) => Err(FetchError::Malformed(format!("invalid JSON: {e}"))),
        }
    }

    /// Send one provider request with retry and dual validation.
    pub fn fetch(&self, request: &FetchRequest) -> Result<Envelope, FetchError> {
        let query: Vec<(String, String)> = request
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        with_retry(self.retry, &request.path, |_| {
            let (status, body) = self.send_raw(&request.path, request.method, &query)?;
            envelope::validate(status, body)
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = e.status() {
        FetchError::Transport {
            status: status.as_u16(),
        }
    } else if e.is_decode() {
        FetchError::Malformed(e.to_string())
    } else {
        FetchError::Connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay(1), Duration::from_millis(500));
        assert_eq!(p.delay(2), Duration::from_millis(1000));
        assert_eq!(p.delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let mut calls = 0;
        let result = with_retry(fast(), "test", |_| {
            calls += 1;
            if calls < 3 {
                Err(FetchError::Transport { status: 503 })
            } else {
                Ok(Envelope::ok(json!([])))
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn retries_are_bounded() {
        let mut calls = 0;
        let result = with_retry(fast(), "test", |_| {
            calls += 1;
            Err(FetchError::Timeout)
        });
        assert_eq!(result.unwrap_err(), FetchError::Timeout);
        assert_eq!(calls, 4);
    }

    #[test]
    fn rejections_are_not_retried() {
        let mut calls = 0;
        let result = with_retry(fast(), "test", |_| {
            calls += 1;
            Err(FetchError::PlanRestricted {
                code: "403".into(),
                msg: "Upgrade plan".into(),
            })
        });
        assert!(matches!(result, Err(FetchError::PlanRestricted { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn header_rejects_control_characters() {
        assert!(HttpTransport::header("cg-api-key", "abc\n").is_err());
        assert!(HttpTransport::header("cg-api-key", "abc123").is_ok());
    }
}
