//! Normalized metric values.
//!
//! A value is one of the response shape families: a scalar, a time series,
//! an ordered composite record, or a list of records. Serialization keeps
//! insertion order and writes non-finite numbers as `null`.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::definition::ResponseShape;

/// One field of a composite value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Num(f64),
    Int(i64),
    Text(String),
    Null,
}

impl Field {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Field::Num(v) => Some(*v),
            Field::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Num(v) => serialize_finite(v, serializer),
            Field::Int(v) => serializer.serialize_i64(*v),
            Field::Text(s) => serializer.serialize_str(s),
            Field::Null => serializer.serialize_none(),
        }
    }
}

/// Ordered key/value record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composite {
    fields: Vec<(String, Field)>,
}

impl Composite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, field: Field) -> Self {
        self.insert(key, field);
        self
    }

    pub fn num(self, key: &str, value: f64) -> Self {
        self.with(key, Field::Num(value))
    }

    pub fn opt_num(self, key: &str, value: Option<f64>) -> Self {
        self.with(key, value.map_or(Field::Null, Field::Num))
    }

    pub fn int(self, key: &str, value: i64) -> Self {
        self.with(key, Field::Int(value))
    }

    pub fn text(self, key: &str, value: impl Into<String>) -> Self {
        self.with(key, Field::Text(value.into()))
    }

    /// Insert or replace `key`, keeping its original position on replace.
    pub fn insert(&mut self, key: &str, field: Field) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((key.to_string(), field)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Field::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Composite {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A point of a time series. `timestamp` is whole epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl Serialize for SeriesPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("value", &Finite(self.value))?;
        map.end()
    }
}

/// A normalized metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar(f64),
    /// Sorted by timestamp, most recent first.
    Series(Vec<SeriesPoint>),
    Composite(Composite),
    Records(Vec<Composite>),
}

impl MetricValue {
    pub fn shape(&self) -> ResponseShape {
        match self {
            MetricValue::Scalar(_) => ResponseShape::Scalar,
            MetricValue::Series(_) | MetricValue::Records(_) => ResponseShape::TimeSeries,
            MetricValue::Composite(_) => ResponseShape::Composite,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            MetricValue::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[SeriesPoint]> {
        match self {
            MetricValue::Series(points) => Some(points),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Composite]> {
        match self {
            MetricValue::Records(records) => Some(records),
            _ => None,
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Scalar(v) => serialize_finite(v, serializer),
            MetricValue::Series(points) => {
                let mut seq = serializer.serialize_seq(Some(points.len()))?;
                for p in points {
                    seq.serialize_element(p)?;
                }
                seq.end()
            }
            MetricValue::Composite(c) => c.serialize(serializer),
            MetricValue::Records(records) => {
                let mut seq = serializer.serialize_seq(Some(records.len()))?;
                for r in records {
                    seq.serialize_element(r)?;
                }
                seq.end()
            }
        }
    }
}

struct Finite(f64);

impl Serialize for Finite {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_finite(&self.0, serializer)
    }
}

/// NaN and infinities are not representable in JSON; they become `null`.
fn serialize_finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}
