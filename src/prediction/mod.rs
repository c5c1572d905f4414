//! Live conversion prediction
//!
//! - `query`: query records and schema validation
//! - `model`: classifier interface and the serialized model format
//! - `loader`: per-call and cached model loading
//! - `service`: decision rule and the prediction service

pub mod loader;
pub mod model;
pub mod query;
pub mod service;

pub use loader::{loader_for, CachedModelLoader, FileModelLoader, ModelLoader};
pub use model::{Classifier, LogisticModel, UnknownCategory};
pub use query::{FeatureRow, FeatureSchema, QueryRecord};
pub use service::{DecisionRule, PredictedLabel, Prediction, PredictionService};
