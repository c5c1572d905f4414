//! Marketing Conversion Dashboard Library
//!
//! This library provides tools to:
//! - Load a marketing event dataset and aggregate conversion rates per channel,
//!   subscription channel or age group
//! - Build embeddable bar charts of conversions
//! - Score a single user record with a serialized conversion classifier
//! - Serve the dashboard and prediction form over HTTP with Prometheus metrics

pub mod analytics;
pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod formatter;
pub mod metrics;
pub mod pages;
pub mod prediction;
pub mod server;

// Re-export common types
pub use config::Config;
pub use dataset::{EventRecord, EventTable, GroupingKey};
pub use error::{Error, Result};
pub use prediction::{PredictedLabel, Prediction, PredictionService, QueryRecord};
