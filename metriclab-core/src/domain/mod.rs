//! Domain types for MetricLab

pub mod definition;
pub mod status;
pub mod value;

pub use definition::{
    Availability, Category, DataSource, Endpoint, Group, HttpMethod, MetricDefinition,
    NormalizerRef, ParamValue, PlanStep, PlanTier, RequestSource, ResponseShape, Timeframe, Unit,
    Window,
};
pub use status::{MetricState, MetricStatus, StateError};
pub use value::{Composite, Field, MetricValue, SeriesPoint};

/// Metric identifier alias
pub type MetricId = String;
