//! Metric registry: the ordered, immutable catalog every run iterates.
//!
//! Construction validates each definition once: id format, uniqueness,
//! timeframe prefix, a request source for implemented metrics, and request
//! parameters that render. After that the registry is read-only and shared
//! through `Arc`.

mod catalog;
pub mod exchange_sets;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Availability, MetricDefinition, Timeframe};
use crate::error::RegistryError;
use crate::params::build_requests;

pub use catalog::standard_metrics;
pub use exchange_sets::{render_venues, ExchangeSetId, DAILY_VENUES, WEEKLY_VENUES};

const LOG_TARGET: &str = "metriclab::registry";

/// Counts by availability and timeframe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub implemented: usize,
    pub external: usize,
    pub plan_gated: usize,
    pub approximate: usize,
    pub by_timeframe: BTreeMap<Timeframe, usize>,
}

/// Ordered set of validated metric definitions.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    metrics: Vec<Arc<MetricDefinition>>,
    index: HashMap<String, usize>,
    fingerprint: String,
}

impl MetricRegistry {
    /// Validate `defs` and build the registry, keeping their order.
    pub fn new(defs: Vec<MetricDefinition>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(defs.len());
        let mut hasher = blake3::Hasher::new();

        for (pos, def) in defs.iter().enumerate() {
            let timeframe = parse_id(&def.id)?;
            if timeframe != def.timeframe() {
                return Err(RegistryError::TimeframeMismatch {
                    id: def.id.clone(),
                    timeframe: def.timeframe().to_string(),
                });
            }
            if index.insert(def.id.clone(), pos).is_some() {
                return Err(RegistryError::DuplicateId(def.id.clone()));
            }
            if def.is_implemented() && def.source.endpoints().is_empty() {
                return Err(RegistryError::MissingSource { id: def.id.clone() });
            }
            let requests = build_requests(def).map_err(|source| RegistryError::InvalidParams {
                id: def.id.clone(),
                source,
            })?;

            hasher.update(def.id.as_bytes());
            for request in &requests {
                hasher.update(b"|");
                hasher.update(request.method.as_str().as_bytes());
                hasher.update(request.target().as_bytes());
            }
            hasher.update(b"|");
            hasher.update(availability_tag(&def.availability).as_bytes());
            hasher.update(def.normalizer.name().as_bytes());
            hasher.update(b"\n");
        }

        let registry = Self {
            metrics: defs.into_iter().map(Arc::new).collect(),
            index,
            fingerprint: hasher.finalize().to_hex().to_string(),
        };
        for (timeframe, gaps) in registry.numbering_gaps() {
            log::warn!(
                target: LOG_TARGET,
                "{timeframe} metrics skip numbers {gaps:?}"
            );
        }
        log::debug!(
            target: LOG_TARGET,
            "registry built: {} metrics, fingerprint {}",
            registry.len(),
            &registry.fingerprint[..12]
        );
        Ok(registry)
    }

    /// The built-in catalog.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::new(standard_metrics())
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MetricDefinition>> {
        self.metrics.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<MetricDefinition>> {
        self.index.get(id).map(|&pos| &self.metrics[pos])
    }

    pub fn by_timeframe(&self, timeframe: Timeframe) -> impl Iterator<Item = &Arc<MetricDefinition>> {
        self.metrics.iter().filter(move |d| d.timeframe() == timeframe)
    }

    /// Definitions in the given timeframes, in registry order. An empty
    /// slice selects everything.
    pub fn filter(&self, timeframes: &[Timeframe]) -> Vec<Arc<MetricDefinition>> {
        self.metrics
            .iter()
            .filter(|d| timeframes.is_empty() || timeframes.contains(&d.timeframe()))
            .cloned()
            .collect()
    }

    /// Missing ordinal numbers per timeframe, from 1 up to the highest used.
    pub fn numbering_gaps(&self) -> Vec<(Timeframe, Vec<u32>)> {
        Timeframe::ALL
            .iter()
            .filter_map(|&tf| {
                let mut used: Vec<u32> = self
                    .by_timeframe(tf)
                    .filter_map(|d| ordinal(&d.id))
                    .collect();
                used.sort_unstable();
                let max = *used.last()?;
                let gaps: Vec<u32> = (1..=max).filter(|n| used.binary_search(n).is_err()).collect();
                (!gaps.is_empty()).then_some((tf, gaps))
            })
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total: self.len(),
            ..RegistryStats::default()
        };
        for def in &self.metrics {
            match def.availability {
                Availability::Implemented => stats.implemented += 1,
                Availability::External { .. } => stats.external += 1,
                Availability::PlanGated { .. } => stats.plan_gated += 1,
            }
            if def.approximation.is_some() {
                stats.approximate += 1;
            }
            *stats.by_timeframe.entry(def.timeframe()).or_default() += 1;
        }
        stats
    }

    /// blake3 hex digest over ids, rendered requests, availability and
    /// normalizer names. Any exchange-set or parameter edit changes it.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn availability_tag(availability: &Availability) -> String {
    match availability {
        Availability::Implemented => "implemented".to_string(),
        Availability::External { notes } => format!("external:{notes}"),
        Availability::PlanGated { min_plan } => format!("plan:{min_plan}"),
    }
}

/// Check `<timeframe>_<NN>_<slug>` where the slug is lowercase
/// alphanumeric words joined by single underscores.
fn parse_id(id: &str) -> Result<Timeframe, RegistryError> {
    let malformed = || RegistryError::MalformedId(id.to_string());

    let mut parts = id.splitn(3, '_');
    let timeframe = parts.next().and_then(Timeframe::parse).ok_or_else(malformed)?;
    let number = parts.next().ok_or_else(malformed)?;
    let slug = parts.next().ok_or_else(malformed)?;

    // Timeframe::parse is lenient about case; ids are not.
    if !id.starts_with(timeframe.as_str()) {
        return Err(malformed());
    }
    if number.len() != 2 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let word_ok = |w: &str| !w.is_empty() && w.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !slug.split('_').all(word_ok) {
        return Err(malformed());
    }
    Ok(timeframe)
}

fn ordinal(id: &str) -> Option<u32> {
    id.split('_').nth(1)?.parse().ok()
}
