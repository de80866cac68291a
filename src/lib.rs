//! # Cloud Eye Exporter Library
//!
//! Polls the OTC Cloud Eye API for the metric catalog of the configured
//! namespaces and their latest datapoints, and republishes the values as
//! Prometheus gauges.
//!
//! Modules:
//! - `config`: YAML configuration, env interpolation and validation
//! - `cache`: the token and its durable credential store
//! - `sources`: token, catalog and datapoint calls against the provider
//! - `registry`: metric descriptors and the gauge table
//! - `executor`: the refresh loop tying it all together
//! - `observability` / `server`: self-metrics and the `/metrics` endpoint

pub mod cache;
pub mod config;
pub mod executor;
pub mod helpers;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::types::ServiceConfig;
pub use crate::executor::refresh_loop::RefreshLoop;
pub use crate::sources::error::ExporterError;
