//! Run orchestration: drive every selected metric through
//! fetch → normalize → classify and collect an ordered [`ResultSet`].
//!
//! Each metric runs in isolation. A panic or error while handling one
//! metric becomes an ERROR result for that metric and the run continues.
//! With `workers > 1` metrics are handled on a rayon pool that shares the
//! client (and therefore its rate limiter). Results come back in registry
//! order either way.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use metriclab_core::domain::{
    Availability, MetricDefinition, MetricState, MetricStatus, StateError, Timeframe,
};
use metriclab_core::normalize::normalize_metric;
use metriclab_core::params::build_requests;
use metriclab_core::provider::{FetchError, FetchRequest, ProviderBody, ProviderClient};
use metriclab_core::registry::MetricRegistry;

use crate::config::DataMode;
use crate::result_set::{MetricResult, ResultSet, RunMetadata};

const LOG_TARGET: &str = "metriclab::orchestrator";

/// Note on metrics the active client cannot serve.
pub const REQUIRES_FULL_MODE: &str = "requires full data mode";

// ─── Options, progress, errors ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// 1 = sequential; more runs metrics on a worker pool of that size.
    pub workers: usize,
    /// Timeframes to run. Empty runs everything.
    pub groups: Vec<Timeframe>,
    /// Recorded in the run metadata.
    pub data_mode: DataMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            groups: Vec::new(),
            data_mode: DataMode::Full,
        }
    }
}

/// Progress snapshot sent after each metric finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub completed: usize,
    pub total: usize,
    pub metric_id: String,
    pub status: MetricStatus,
    pub elapsed_secs: f64,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

// ─── Run loop ───────────────────────────────────────────────────────

/// Run every metric of `registry` selected by `options.groups`.
///
/// - `progress_cb`: called once per finished metric, possibly from worker
///   threads.
/// - `cancel`: checked before each metric starts. Once set, no new metric
///   starts and the returned set is partial (`complete = false`).
pub fn run_metrics(
    registry: &MetricRegistry,
    client: &dyn ProviderClient,
    options: &RunOptions,
    progress_cb: Option<&(dyn Fn(&RunProgress) + Sync)>,
    cancel: Option<&AtomicBool>,
) -> Result<ResultSet, OrchestratorError> {
    if options.workers == 0 {
        return Err(OrchestratorError::NoWorkers);
    }

    let selected = registry.filter(&options.groups);
    let total = selected.len();
    let started_at = Utc::now();
    let start = Instant::now();
    let completed = AtomicUsize::new(0);

    log::info!(
        target: LOG_TARGET,
        "run started: {total} metrics, client {}, {} worker(s)",
        client.name(),
        options.workers
    );

    let step = |def: &MetricDefinition| -> Option<MetricResult> {
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return None;
        }
        let result = run_metric(def, client);
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(cb) = progress_cb {
            cb(&RunProgress {
                completed: done,
                total,
                metric_id: result.id.clone(),
                status: result.status,
                elapsed_secs: start.elapsed().as_secs_f64(),
            });
        }
        Some(result)
    };

    let slots: Vec<Option<MetricResult>> = if options.workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()
            .map_err(|e| OrchestratorError::Pool(e.to_string()))?;
        pool.install(|| selected.par_iter().map(|def| step(def.as_ref())).collect())
    } else {
        selected.iter().map(|def| step(def.as_ref())).collect()
    };

    let results: Vec<MetricResult> = slots.into_iter().flatten().collect();
    let attempted = results.len();
    let cancelled = attempted < total;
    if cancelled {
        log::warn!(
            target: LOG_TARGET,
            "run cancelled: {attempted} of {total} metrics finished"
        );
    }

    let set = ResultSet::new(
        results,
        RunMetadata {
            data_mode: options.data_mode,
            provider: client.name().to_string(),
            started_at,
            fingerprint: registry.fingerprint().to_string(),
            planned: total,
            attempted,
            complete: !cancelled,
            cancelled,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        },
    );

    let summary = set.summary();
    for (timeframe, counts) in &summary.by_group {
        log::info!(target: LOG_TARGET, "{timeframe}: {counts:?}");
    }
    log::info!(
        target: LOG_TARGET,
        "run finished: {}/{} OK in {} ms",
        summary.ok(),
        summary.total,
        set.metadata.elapsed_ms
    );
    Ok(set)
}

/// Resolve one metric, containing any panic as an ERROR result.
pub fn run_metric(def: &MetricDefinition, client: &dyn ProviderClient) -> MetricResult {
    let result = match panic::catch_unwind(AssertUnwindSafe(|| resolve(def, client))) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            log::debug!(target: LOG_TARGET, "{}: panicked: {msg}", def.id);
            MetricResult::error(def, format!("panicked while processing: {msg}"))
        }
    };

    match result.status {
        MetricStatus::Missing | MetricStatus::Error => log::warn!(
            target: LOG_TARGET,
            "{} {}: {}",
            result.id,
            result.status,
            result.raw_error().unwrap_or("")
        ),
        _ => log::debug!(target: LOG_TARGET, "{} {}", result.id, result.status),
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ─── Per-metric state machine ───────────────────────────────────────

/// Checked walk through [`MetricState`], recording every state visited.
struct Tracker {
    state: MetricState,
    trace: Vec<MetricState>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            state: MetricState::Pending,
            trace: vec![MetricState::Pending],
        }
    }

    fn advance(&mut self, next: MetricState) -> Result<(), StateError> {
        self.state = self.state.advance(next)?;
        self.trace.push(next);
        Ok(())
    }

    fn finish(&mut self, result: MetricResult) -> Result<MetricResult, StateError> {
        self.advance(MetricState::Done(result.status))?;
        Ok(result)
    }
}

fn resolve(def: &MetricDefinition, client: &dyn ProviderClient) -> MetricResult {
    let mut tracker = Tracker::new();
    match drive(def, client, &mut tracker) {
        Ok(result) => result.with_trace(tracker.trace),
        Err(e) => MetricResult::error(def, e.to_string()),
    }
}

fn drive(
    def: &MetricDefinition,
    client: &dyn ProviderClient,
    tracker: &mut Tracker,
) -> Result<MetricResult, StateError> {
    match &def.availability {
        Availability::External { notes } => {
            return tracker.finish(MetricResult::external(def, notes.clone()));
        }
        Availability::PlanGated { min_plan } => {
            return tracker.finish(MetricResult::locked(def, format!("requires {min_plan} plan")));
        }
        Availability::Implemented => {}
    }

    let requests = match build_requests(def) {
        Ok(requests) => requests,
        Err(e) => return tracker.finish(MetricResult::error(def, format!("invalid parameters: {e}"))),
    };
    if let Some(req) = requests.iter().find(|r| !client.supports(&r.path)) {
        log::debug!(
            target: LOG_TARGET,
            "{}: {} cannot serve {}",
            def.id,
            client.name(),
            req.path
        );
        return tracker.finish(MetricResult::locked(def, REQUIRES_FULL_MODE));
    }

    tracker.advance(MetricState::Fetching)?;
    let body = match fetch_body(client, &requests) {
        Ok(body) => body,
        Err((_, FetchError::PlanRestricted { msg, .. })) => {
            // LOCKED after a fetch is only reachable through Normalizing.
            tracker.advance(MetricState::Normalizing)?;
            return tracker.finish(MetricResult::locked(def, format!("plan restriction: {msg}")));
        }
        Err((target, e)) => {
            return tracker.finish(MetricResult::error(
                def,
                format!("fetch {target} failed ({}): {e}", e.kind()),
            ));
        }
    };

    tracker.advance(MetricState::Normalizing)?;
    let out = normalize_metric(def, &body);
    tracker.finish(MetricResult::from_normalized(def, out))
}

/// Fetch every request of a metric; all succeed or the metric fails on
/// the first error.
fn fetch_body(
    client: &dyn ProviderClient,
    requests: &[FetchRequest],
) -> Result<ProviderBody, (String, FetchError)> {
    let mut steps = BTreeMap::new();
    let mut single = None;

    for request in requests {
        let envelope = client
            .fetch(request)
            .map_err(|e| (request.target(), e))?;
        match &request.key {
            Some(key) => {
                steps.insert(key.clone(), envelope);
            }
            None => single = Some(envelope),
        }
    }

    match single {
        Some(envelope) if steps.is_empty() => Ok(ProviderBody::Single(envelope)),
        None if !steps.is_empty() => Ok(ProviderBody::Plan(steps)),
        _ => Err((
            requests.first().map(FetchRequest::target).unwrap_or_default(),
            FetchError::Malformed("metric mixes keyed and unkeyed requests".into()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metriclab_core::domain::{Category, Endpoint, PlanStep};
    use metriclab_core::normalize::NormalizerKind;
    use metriclab_core::provider::FixtureProvider;
    use serde_json::json;

    fn oi_metric() -> MetricDefinition {
        MetricDefinition::new("daily_01_oi", "OI", Timeframe::Daily, Category::OpenInterest)
            .endpoint(Endpoint::get("/api/oi").param("limit", 1))
            .normalizer(NormalizerKind::OpenInterestTotal)
    }

    #[test]
    fn tracker_records_happy_path() {
        let client = FixtureProvider::new().with(
            "/api/oi?limit=1",
            json!({"code": "0", "msg": "", "data": [{"time": 1_704_067_200_000i64, "close": "62342795495.89"}]}),
        );
        let r = run_metric(&oi_metric(), &client);
        assert_eq!(r.status, MetricStatus::Ok);
        assert_eq!(
            r.trace,
            vec![
                MetricState::Pending,
                MetricState::Fetching,
                MetricState::Normalizing,
                MetricState::Done(MetricStatus::Ok),
            ]
        );
    }

    #[test]
    fn fetch_failure_skips_normalizer() {
        let client = FixtureProvider::new().with_error("/api/oi?limit=1", FetchError::Timeout);
        let r = run_metric(&oi_metric(), &client);
        assert_eq!(r.status, MetricStatus::Error);
        assert!(r.raw_error().unwrap().contains("timeout"));
        assert!(!r.trace.contains(&MetricState::Normalizing));
    }

    #[test]
    fn plan_restriction_is_locked() {
        let client = FixtureProvider::new().with_error(
            "/api/oi?limit=1",
            FetchError::PlanRestricted {
                code: "400".into(),
                msg: "Please upgrade your plan".into(),
            },
        );
        let r = run_metric(&oi_metric(), &client);
        assert_eq!(r.status, MetricStatus::Locked);
        assert!(r.raw_error().is_none());
    }

    #[test]
    fn external_metric_is_never_fetched() {
        let client = FixtureProvider::new();
        let def = MetricDefinition::new("weekly_02_cot", "COT", Timeframe::Weekly, Category::Sentiment)
            .external("CFTC report");
        let r = run_metric(&def, &client);
        assert_eq!(r.status, MetricStatus::ExternalRequired);
        assert_eq!(r.note.as_deref(), Some("CFTC report"));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn plan_with_failed_step_is_error() {
        let def = MetricDefinition::new("weekly_12_ratio", "Ratio", Timeframe::Weekly, Category::Price)
            .window(metriclab_core::domain::Window::D7)
            .plan(vec![
                PlanStep {
                    key: "eth".into(),
                    endpoint: Endpoint::get("/api/eth"),
                },
                PlanStep {
                    key: "btc".into(),
                    endpoint: Endpoint::get("/api/btc"),
                },
            ])
            .normalizer(NormalizerKind::RatioChange7d);
        let client = FixtureProvider::new()
            .with("/api/eth", json!({"code": "0", "data": []}))
            .with_error("/api/btc", FetchError::Transport { status: 502 });
        let r = run_metric(&def, &client);
        assert_eq!(r.status, MetricStatus::Error);
        assert!(r.raw_error().unwrap().contains("/api/btc"));
    }

    #[test]
    fn zero_workers_rejected() {
        let registry = MetricRegistry::new(vec![oi_metric()]).unwrap();
        let options = RunOptions {
            workers: 0,
            ..RunOptions::default()
        };
        let err = run_metrics(&registry, &FixtureProvider::new(), &options, None, None).unwrap_err();
        assert!(matches!(err, OrchestratorError::NoWorkers));
    }

    #[test]
    fn panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
