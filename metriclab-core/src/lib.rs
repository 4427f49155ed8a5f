//! MetricLab Core: metric registry, request parameters, provider boundary,
//! and the normalizer set.
//!
//! This crate holds everything a run needs except the run itself:
//! - Domain types (definitions, statuses, normalized values)
//! - Exchange-list policy and the metric catalog
//! - Parameter normalization (pure, no I/O)
//! - Provider client trait, envelope validation, rate limiter, HTTP clients
//! - Normalizers from raw provider bodies to canonical values

pub mod domain;
pub mod error;
pub mod normalize;
pub mod params;
pub mod provider;
pub mod registry;

pub use error::{ConfigError, RegistryError};
