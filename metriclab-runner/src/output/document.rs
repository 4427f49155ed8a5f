//! Structured JSON document.
//!
//! Keys follow registry order (groups by timeframe, metrics by id order
//! within a group), so identical result sets serialize to identical bytes.
//! Each entry carries its category, so the timeframe × category grouping
//! can be rebuilt from the document alone.
//! Raw error text never appears here.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use metriclab_core::domain::{Category, MetricStatus, MetricValue, Unit};

use crate::result_set::{MetricResult, ResultSet, RunMetadata, StatusSummary};

/// Document contract version.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct Document<'a> {
    schema_version: u32,
    metadata: Metadata<'a>,
    groups: Groups<'a>,
}

#[derive(Serialize)]
struct Metadata<'a> {
    #[serde(flatten)]
    run: &'a RunMetadata,
    summary: StatusSummary,
}

struct Groups<'a>(&'a ResultSet);

impl Serialize for Groups<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let groups: Vec<_> = self.0.groups().collect();
        let mut map = serializer.serialize_map(Some(groups.len()))?;
        for (timeframe, results) in groups {
            map.serialize_entry(timeframe.as_str(), &Metrics(results))?;
        }
        map.end()
    }
}

struct Metrics<'a>(&'a [MetricResult]);

impl Serialize for Metrics<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for r in self.0 {
            map.serialize_entry(&r.id, &Entry::from(r))?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct Entry<'a> {
    status: MetricStatus,
    category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a MetricValue>,
    unit: Unit,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

impl<'a> From<&'a MetricResult> for Entry<'a> {
    fn from(r: &'a MetricResult) -> Self {
        Self {
            status: r.status,
            category: r.group.category,
            value: r.value(),
            unit: r.unit,
            name: &r.name,
            note: r.note.as_deref(),
        }
    }
}

/// Serialize `set` as the pretty-printed structured document.
pub fn render_document(set: &ResultSet) -> serde_json::Result<String> {
    let doc = Document {
        schema_version: SCHEMA_VERSION,
        metadata: Metadata {
            run: &set.metadata,
            summary: set.summary(),
        },
        groups: Groups(set),
    };
    serde_json::to_string_pretty(&doc)
}
