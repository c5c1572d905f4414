//! Human-readable prediction messages.

use serde::Serialize;

use crate::prediction::PredictedLabel;

/// The two lines shown on the result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedPrediction {
    pub prediction: String,
    pub probability: String,
}

/// Probability as a percentage rounded to two decimals, printed in its
/// shortest form with at least one decimal digit (`0.7` -> `70.0%`).
pub fn format_percentage(probability: f64) -> String {
    let percent = probability * 100.0;
    // Round once, on the exact binary value, then print the shortest form.
    let rounded: f64 = format!("{:.2}", percent).parse().unwrap_or(percent);
    let mut text = rounded.to_string();
    if rounded.is_finite() && !text.contains('.') {
        text.push_str(".0");
    }
    text.push('%');
    text
}

pub fn format_prediction(label: PredictedLabel, probability: f64) -> FormattedPrediction {
    let verdict = if label.converts() { "True" } else { "False" };
    let percentage = format_percentage(probability);
    let probability = if label.converts() {
        format!("User will convert with probability: {}", percentage)
    } else {
        format!("User will not convert with probability: {}", percentage)
    };

    FormattedPrediction {
        prediction: format!("Model predicts: {}", verdict),
        probability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.7), "70.0%");
        assert_eq!(format_percentage(0.6789), "67.89%");
        assert_eq!(format_percentage(0.5), "50.0%");
        assert_eq!(format_percentage(1.0), "100.0%");
        assert_eq!(format_percentage(0.12346), "12.35%");
        assert_eq!(format_percentage(0.0), "0.0%");
    }

    #[test]
    fn test_format_percentage_rounds_once() {
        // 0.00015 * 100 lands just below 0.015 in binary.
        assert_eq!(format_percentage(0.00015), "0.01%");
        assert_eq!(format_percentage(0.00045), "0.04%");
        assert_eq!(format_percentage(0.00105), "0.1%");
    }

    #[test]
    fn test_format_converts() {
        let text = format_prediction(PredictedLabel::Converts, 0.6789);
        assert_eq!(text.prediction, "Model predicts: True");
        assert_eq!(
            text.probability,
            "User will convert with probability: 67.89%"
        );
    }

    #[test]
    fn test_format_does_not_convert() {
        let text = format_prediction(PredictedLabel::DoesNotConvert, 0.7);
        assert_eq!(text.prediction, "Model predicts: False");
        assert_eq!(
            text.probability,
            "User will not convert with probability: 70.0%"
        );
    }
}
