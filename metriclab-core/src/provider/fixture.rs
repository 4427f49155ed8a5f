//! Recorded-response client for replay runs and tests.
//!
//! Responses are looked up by `path?query` first, then by bare path. Bodies
//! go through the same dual validation as live responses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use super::client::{FetchError, FetchRequest, ProviderClient};
use super::envelope::{self, Envelope};
use crate::error::ConfigError;

#[derive(Debug, Clone)]
enum Recorded {
    Body { status: u16, body: Value },
    Failure(FetchError),
}

/// Serves canned responses keyed by request target.
#[derive(Debug, Default)]
pub struct FixtureProvider {
    responses: HashMap<String, Recorded>,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `target` with HTTP 200 and `body`.
    pub fn with(self, target: &str, body: Value) -> Self {
        self.with_status(target, 200, body)
    }

    pub fn with_status(mut self, target: &str, status: u16, body: Value) -> Self {
        self.responses
            .insert(target.to_string(), Recorded::Body { status, body });
        self
    }

    /// Fail requests to `target` with `error`.
    pub fn with_error(mut self, target: &str, error: FetchError) -> Self {
        self.responses
            .insert(target.to_string(), Recorded::Failure(error));
        self
    }

    /// Load a JSON object mapping target → body.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(ConfigError::Parse(
                "fixture file must be a JSON object keyed by request target".into(),
            ));
        };
        Ok(map
            .into_iter()
            .fold(Self::new(), |fixtures, (target, body)| fixtures.with(&target, body)))
    }

    /// Number of fetches served (including failures and misses).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Targets requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProviderClient for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Envelope, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let target = request.target();
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.clone());

        let recorded = self
            .responses
            .get(&target)
            .or_else(|| self.responses.get(&request.path));

        match recorded {
            Some(Recorded::Body { status, body }) => envelope::validate(*status, body.clone()),
            Some(Recorded::Failure(e)) => Err(e.clone()),
            None => Err(FetchError::Transport { status: 404 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Endpoint;
    use crate::params::normalize_params;
    use serde_json::json;

    fn request(endpoint: &Endpoint) -> FetchRequest {
        FetchRequest::new(None, endpoint, normalize_params(endpoint).unwrap())
    }

    #[test]
    fn exact_target_wins_over_path() {
        let e = Endpoint::get("/api/x").param("symbol", "BTC");
        let fx = FixtureProvider::new()
            .with("/api/x", json!({"code": "0", "data": "path"}))
            .with("/api/x?symbol=BTC", json!({"code": "0", "data": "exact"}));
        assert_eq!(fx.fetch(&request(&e)).unwrap().data, json!("exact"));
    }

    #[test]
    fn unknown_target_is_not_found() {
        let fx = FixtureProvider::new();
        let err = fx.fetch(&request(&Endpoint::get("/nope"))).unwrap_err();
        assert_eq!(err, FetchError::Transport { status: 404 });
        assert_eq!(fx.calls(), 1);
    }

    #[test]
    fn recorded_bodies_are_dual_validated() {
        let fx = FixtureProvider::new().with("/api/x", json!({"code": "1", "msg": "Upgrade plan"}));
        let err = fx.fetch(&request(&Endpoint::get("/api/x"))).unwrap_err();
        assert!(matches!(err, FetchError::PlanRestricted { .. }));
    }

    #[test]
    fn loads_from_json_object() {
        let fx = FixtureProvider::from_json(r#"{"/api/x": {"code": "0", "data": []}}"#).unwrap();
        assert!(fx.fetch(&request(&Endpoint::get("/api/x"))).is_ok());
        assert!(FixtureProvider::from_json("[]").is_err());
    }
}
