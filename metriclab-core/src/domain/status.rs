//! Status taxonomy and the per-metric run state machine.
//!
//! Every metric visits `Pending` once per run and ends in exactly one
//! terminal `Done(status)`. Transitions are checked by [`MetricState::advance`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Terminal classification of one metric's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricStatus {
    Ok,
    Missing,
    ExternalRequired,
    Locked,
    Error,
}

impl MetricStatus {
    pub const ALL: [MetricStatus; 5] = [
        MetricStatus::Ok,
        MetricStatus::Missing,
        MetricStatus::ExternalRequired,
        MetricStatus::Locked,
        MetricStatus::Error,
    ];

    /// Contract name used in the structured document.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricStatus::Ok => "OK",
            MetricStatus::Missing => "MISSING",
            MetricStatus::ExternalRequired => "EXTERNAL_REQUIRED",
            MetricStatus::Locked => "LOCKED",
            MetricStatus::Error => "ERROR",
        }
    }

    /// Short label for the text report. Each status gets a distinct label.
    pub fn label(&self) -> &'static str {
        match self {
            MetricStatus::Ok => "OK",
            MetricStatus::Missing => "MISSING",
            MetricStatus::ExternalRequired => "EXTERNAL",
            MetricStatus::Locked => "LOCKED",
            MetricStatus::Error => "ERROR",
        }
    }

    /// What an operator should do about a metric in this status.
    pub fn remediation(&self) -> &'static str {
        match self {
            MetricStatus::Ok => "none",
            MetricStatus::Missing => "wait and retry",
            MetricStatus::ExternalRequired => "use an external source",
            MetricStatus::Locked => "upgrade plan",
            MetricStatus::Error => "investigate",
        }
    }
}

impl fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle position of one metric within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricState {
    Pending,
    Fetching,
    Normalizing,
    Done(MetricStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal metric state transition {from:?} -> {to:?}")]
pub struct StateError {
    pub from: MetricState,
    pub to: MetricState,
}

impl MetricState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MetricState::Done(_))
    }

    /// Move to `next`, rejecting transitions the run model does not allow.
    ///
    /// - `Pending` may short-circuit to `EXTERNAL_REQUIRED`, `LOCKED` or
    ///   `ERROR` without fetching.
    /// - `Fetching` ends in `ERROR` on a fetch failure, otherwise moves on to
    ///   `Normalizing`.
    /// - `Normalizing` may end in any status (`ERROR` only through
    ///   failure containment).
    pub fn advance(self, next: MetricState) -> Result<MetricState, StateError> {
        use MetricState::*;
        use MetricStatus as S;

        let legal = match (self, next) {
            (Pending, Fetching) => true,
            (Pending, Done(S::ExternalRequired | S::Locked | S::Error)) => true,
            (Fetching, Normalizing) => true,
            (Fetching, Done(S::Error)) => true,
            (Normalizing, Done(_)) => true,
            _ => false,
        };

        if legal {
            Ok(next)
        } else {
            Err(StateError { from: self, to: next })
        }
    }
}
