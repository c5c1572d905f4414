//! Classifier interface and the serialized logistic regression model.
//!
//! The model file is JSON describing a one-hot encoded logistic regression:
//!
//! ```json
//! {
//!   "feature_names": ["marketing_channel", "subscribing_channel", "age_group"],
//!   "classes": ["False", "True"],
//!   "intercept": -1.7,
//!   "weights": {
//!     "marketing_channel": { "Email": 0.9, "House Ads": -0.4 },
//!     "subscribing_channel": { "Email": 0.6 },
//!     "age_group": { "19-24 years": 0.2 }
//!   },
//!   "handle_unknown": "error"
//! }
//! ```
//!
//! Categories absent from `weights` contribute nothing when
//! `handle_unknown` is `ignore`, and fail the prediction when it is `error`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::query::{FeatureRow, FeatureSchema};
use crate::{Error, Result};

/// A trained classifier that scores one feature row.
pub trait Classifier: Send + Sync {
    /// Features the model expects, in model order.
    fn schema(&self) -> FeatureSchema;

    /// Class labels, in the order `predict_proba` reports them.
    fn classes(&self) -> &[String];

    /// Probability for each class, same order as `classes`.
    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>>;
}

/// What to do with a category the model was not trained on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategory {
    #[default]
    Error,
    Ignore,
}

/// One-hot logistic regression over categorical features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    pub intercept: f64,
    #[serde(default)]
    pub weights: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub handle_unknown: UnknownCategory,
}

impl LogisticModel {
    /// Parse and validate a serialized model.
    pub fn from_json(json: &str) -> Result<Self> {
        let model: LogisticModel =
            serde_json::from_str(json).map_err(|e| Error::ModelLoad(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.classes.len() != 2 {
            return Err(Error::ModelLoad(format!(
                "logistic model needs exactly 2 classes, found {}",
                self.classes.len()
            )));
        }
        if self.feature_names.is_empty() {
            return Err(Error::ModelLoad("model declares no features".to_string()));
        }
        if let Some(extra) = self
            .weights
            .keys()
            .find(|name| !self.feature_names.contains(name))
        {
            return Err(Error::ModelLoad(format!(
                "weights given for undeclared feature {}",
                extra
            )));
        }
        if !self.intercept.is_finite()
            || self
                .weights
                .values()
                .flat_map(|w| w.values())
                .any(|w| !w.is_finite())
        {
            return Err(Error::ModelLoad("non-finite coefficient".to_string()));
        }
        Ok(())
    }

    fn weight(&self, feature: &str, category: &str) -> Result<f64> {
        match self.weights.get(feature).and_then(|w| w.get(category)) {
            Some(w) => Ok(*w),
            None => match self.handle_unknown {
                UnknownCategory::Ignore => Ok(0.0),
                UnknownCategory::Error => Err(Error::Model(format!(
                    "unknown category {:?} for feature {}",
                    category, feature
                ))),
            },
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Classifier for LogisticModel {
    fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.feature_names.iter().cloned())
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        let mut z = self.intercept;
        for name in &self.feature_names {
            let value = row
                .get(name)
                .ok_or_else(|| Error::MissingFeature(name.clone()))?;
            z += self.weight(name, value)?;
        }
        let positive = sigmoid(z);
        Ok(vec![1.0 - positive, positive])
    }
}
