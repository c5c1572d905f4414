//! Scoring a query record and turning class probabilities into a verdict.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::loader::ModelLoader;
use super::query::QueryRecord;
use crate::{Error, Result};

/// Outcome predicted for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictedLabel {
    Converts,
    DoesNotConvert,
}

impl PredictedLabel {
    pub fn converts(&self) -> bool {
        matches!(self, PredictedLabel::Converts)
    }
}

impl fmt::Display for PredictedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictedLabel::Converts => f.write_str("will convert"),
            PredictedLabel::DoesNotConvert => f.write_str("will not convert"),
        }
    }
}

/// Which class means "converts" and how sure the model must be of the
/// other class to predict no conversion. Built through `new`, so the
/// index is always 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecisionRule {
    positive_class_index: usize,
    decision_threshold: f64,
}

impl Default for DecisionRule {
    fn default() -> Self {
        Self {
            positive_class_index: 1,
            decision_threshold: 0.5,
        }
    }
}

impl DecisionRule {
    pub fn new(positive_class_index: usize, decision_threshold: f64) -> Result<Self> {
        if positive_class_index > 1 {
            return Err(Error::InvalidArgument(format!(
                "positive_class_index must be 0 or 1, got {}",
                positive_class_index
            )));
        }
        if !(0.0..=1.0).contains(&decision_threshold) {
            return Err(Error::InvalidArgument(format!(
                "decision_threshold must be within [0, 1], got {}",
                decision_threshold
            )));
        }
        Ok(Self {
            positive_class_index,
            decision_threshold,
        })
    }

    pub fn positive_class_index(&self) -> usize {
        self.positive_class_index
    }

    pub fn decision_threshold(&self) -> f64 {
        self.decision_threshold
    }

    fn negative_class_index(&self) -> usize {
        1 - self.positive_class_index
    }

    /// Predict no conversion when the negative class probability is strictly
    /// above the threshold; ties go to conversion. Returns the label and the
    /// probability of the predicted class.
    pub fn decide(&self, probabilities: &[f64]) -> Result<(PredictedLabel, f64)> {
        if probabilities.len() != 2 {
            return Err(Error::Model(format!(
                "expected 2 class probabilities, got {}",
                probabilities.len()
            )));
        }
        if probabilities
            .iter()
            .any(|p| !p.is_finite() || !(0.0..=1.0).contains(p))
        {
            return Err(Error::Model(format!(
                "probabilities out of range: {:?}",
                probabilities
            )));
        }

        let negative = probabilities[self.negative_class_index()];
        if negative > self.decision_threshold {
            Ok((PredictedLabel::DoesNotConvert, negative))
        } else {
            Ok((
                PredictedLabel::Converts,
                probabilities[self.positive_class_index],
            ))
        }
    }
}

/// Result of scoring one query record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: PredictedLabel,
    /// Probability of the predicted class.
    pub probability: f64,
    /// Raw class probabilities in model order.
    pub probabilities: Vec<f64>,
}

/// Loads the classifier, validates the record against its schema, scores it.
#[derive(Clone)]
pub struct PredictionService {
    loader: Arc<dyn ModelLoader>,
    rule: DecisionRule,
}

impl PredictionService {
    pub fn new(loader: Arc<dyn ModelLoader>, rule: DecisionRule) -> Self {
        Self { loader, rule }
    }

    pub fn rule(&self) -> DecisionRule {
        self.rule
    }

    pub fn predict(&self, record: &QueryRecord) -> Result<Prediction> {
        let model = self.loader.load()?;
        let row = model.schema().validate(record)?;
        let probabilities = model.predict_proba(&row)?;
        let (label, probability) = self.rule.decide(&probabilities)?;

        debug!(
            ?probabilities,
            %label,
            probability,
            "Scored query record"
        );

        Ok(Prediction {
            label,
            probability,
            probabilities,
        })
    }
}
