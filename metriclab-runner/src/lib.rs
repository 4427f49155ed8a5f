//! MetricLab Runner: run orchestration, result sets, and output.
//!
//! This crate builds on `metriclab-core` to provide:
//! - Layered run configuration (TOML, environment) and provider construction
//! - The orchestrator that resolves every metric to exactly one status
//! - Ordered result sets with run metadata and status summaries
//! - JSON document, text report, and CSV rendering

pub mod config;
pub mod orchestrator;
pub mod output;
pub mod result_set;

pub use config::{ApiKey, DataMode, OutputConfig, RunConfig};
pub use orchestrator::{
    run_metric, run_metrics, OrchestratorError, RunOptions, RunProgress, REQUIRES_FULL_MODE,
};
pub use output::{emit, export_csv, render, write_file, Rendered, SCHEMA_VERSION};
pub use result_set::{MetricResult, ResultSet, RunMetadata, StatusSummary};
