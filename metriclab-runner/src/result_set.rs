//! Per-metric results and the ordered result set of one run.
//!
//! A [`MetricResult`] can only be built through constructors that keep the
//! status/value/error invariant: a value exists iff the status is OK, a raw
//! error exists iff the status is MISSING or ERROR.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use metriclab_core::domain::{
    Group, MetricDefinition, MetricState, MetricStatus, MetricValue, Timeframe, Unit,
};
use metriclab_core::normalize::Normalized;

use crate::config::DataMode;

// ─── MetricResult ───────────────────────────────────────────────────

/// Terminal outcome of one metric in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResult {
    pub id: String,
    pub name: String,
    pub group: Group,
    pub unit: Unit,
    pub status: MetricStatus,
    value: Option<MetricValue>,
    raw_error: Option<String>,
    /// Plan requirement, external-source notes, or approximation marker.
    pub note: Option<String>,
    /// States visited, `Pending` first and a `Done` last.
    pub trace: Vec<MetricState>,
}

impl MetricResult {
    fn base(def: &MetricDefinition, status: MetricStatus) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            group: def.group,
            unit: def.unit,
            status,
            value: None,
            raw_error: None,
            note: def
                .approximation
                .as_ref()
                .map(|a| format!("approximation: {a}")),
            trace: vec![MetricState::Pending, MetricState::Done(status)],
        }
    }

    pub fn ok(def: &MetricDefinition, value: MetricValue) -> Self {
        Self {
            value: Some(value),
            ..Self::base(def, MetricStatus::Ok)
        }
    }

    pub fn missing(def: &MetricDefinition, reason: impl Into<String>) -> Self {
        Self {
            raw_error: Some(reason.into()),
            ..Self::base(def, MetricStatus::Missing)
        }
    }

    pub fn error(def: &MetricDefinition, reason: impl Into<String>) -> Self {
        Self {
            raw_error: Some(reason.into()),
            ..Self::base(def, MetricStatus::Error)
        }
    }

    pub fn locked(def: &MetricDefinition, note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::base(def, MetricStatus::Locked)
        }
    }

    pub fn external(def: &MetricDefinition, note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::base(def, MetricStatus::ExternalRequired)
        }
    }

    /// Convert normalizer output. An OK without a value becomes ERROR.
    pub fn from_normalized(def: &MetricDefinition, out: Normalized) -> Self {
        let Normalized {
            status,
            value,
            diagnostic,
        } = out;
        let reason = diagnostic.unwrap_or_else(|| "no diagnostic".into());
        match status {
            MetricStatus::Ok => match value {
                Some(value) => Self::ok(def, value),
                None => Self::error(def, "normalizer reported OK without a value"),
            },
            MetricStatus::Missing => Self::missing(def, reason),
            MetricStatus::Error => Self::error(def, reason),
            MetricStatus::Locked => Self::locked(def, reason),
            MetricStatus::ExternalRequired => Self::external(def, reason),
        }
    }

    /// Replace the state trace. The trace must end in this result's status.
    pub fn with_trace(mut self, trace: Vec<MetricState>) -> Self {
        if trace.last() == Some(&MetricState::Done(self.status)) {
            self.trace = trace;
        }
        self
    }

    pub fn value(&self) -> Option<&MetricValue> {
        self.value.as_ref()
    }

    /// Diagnostic text for MISSING and ERROR. Not part of the document.
    pub fn raw_error(&self) -> Option<&str> {
        self.raw_error.as_deref()
    }

    pub fn timeframe(&self) -> Timeframe {
        self.group.timeframe
    }
}

// ─── Run metadata and summary ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub data_mode: DataMode,
    pub provider: String,
    pub started_at: DateTime<Utc>,
    /// Registry fingerprint (blake3 hex).
    pub fingerprint: String,
    /// Metrics selected for the run.
    pub planned: usize,
    /// Metrics that reached a terminal state.
    pub attempted: usize,
    pub complete: bool,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

/// Status counts, overall and per timeframe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub by_status: BTreeMap<MetricStatus, usize>,
    pub by_group: BTreeMap<Timeframe, BTreeMap<MetricStatus, usize>>,
}

impl StatusSummary {
    pub fn count(&self, status: MetricStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn ok(&self) -> usize {
        self.count(MetricStatus::Ok)
    }

    pub fn group_count(&self, timeframe: Timeframe, status: MetricStatus) -> usize {
        self.by_group
            .get(&timeframe)
            .and_then(|m| m.get(&status))
            .copied()
            .unwrap_or(0)
    }
}

// ─── ResultSet ──────────────────────────────────────────────────────

/// Results of one run, grouped by timeframe, in registry order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    groups: BTreeMap<Timeframe, Vec<MetricResult>>,
    pub metadata: RunMetadata,
}

impl ResultSet {
    /// Group `results` by timeframe. Order within a group is kept.
    pub fn new(results: Vec<MetricResult>, metadata: RunMetadata) -> Self {
        let mut groups: BTreeMap<Timeframe, Vec<MetricResult>> = BTreeMap::new();
        for result in results {
            groups.entry(result.timeframe()).or_default().push(result);
        }
        Self { groups, metadata }
    }

    pub fn groups(&self) -> impl Iterator<Item = (Timeframe, &[MetricResult])> {
        self.groups.iter().map(|(tf, rs)| (*tf, rs.as_slice()))
    }

    pub fn group(&self, timeframe: Timeframe) -> &[MetricResult] {
        self.groups.get(&timeframe).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricResult> {
        self.groups.values().flatten()
    }

    pub fn get(&self, id: &str) -> Option<&MetricResult> {
        self.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for r in self.iter() {
            summary.total += 1;
            *summary.by_status.entry(r.status).or_default() += 1;
            *summary
                .by_group
                .entry(r.timeframe())
                .or_default()
                .entry(r.status)
                .or_default() += 1;
        }
        summary
    }
}
