//! Classifier evaluation on held-out rows

use serde::Serialize;

use crate::error::{Error, Result};
use crate::features::FeatureMatrix;
use crate::train::Model;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    /// Tally predictions against actual labels
    pub fn from_predictions(predicted: &[u8], actual: &[u8]) -> Self {
        let mut cm = Self::default();
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p, a) {
                (1, 1) => cm.true_positives += 1,
                (1, _) => cm.false_positives += 1,
                (_, 1) => cm.false_negatives += 1,
                _ => cm.true_negatives += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// Metrics with the positive class as the target
    pub fn positive_class(&self) -> ClassMetrics {
        ClassMetrics::new(
            self.true_positives,
            self.false_positives,
            self.false_negatives,
            self.true_positives + self.false_negatives,
        )
    }

    /// Metrics with the negative class as the target
    pub fn negative_class(&self) -> ClassMetrics {
        ClassMetrics::new(
            self.true_negatives,
            self.false_negatives,
            self.false_positives,
            self.true_negatives + self.false_positives,
        )
    }
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Actual rows of this class
    pub support: usize,
}

impl ClassMetrics {
    fn new(hits: usize, false_alarms: usize, misses: usize, support: usize) -> Self {
        let precision = ratio(hits, hits + false_alarms);
        let recall = ratio(hits, hits + misses);
        Self {
            precision,
            recall,
            f1: f1(precision, recall),
            support,
        }
    }
}

/// Per-class breakdown with unweighted and support-weighted averages
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub negative: ClassMetrics,
    pub positive: ClassMetrics,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let negative = cm.negative_class();
        let positive = cm.positive_class();
        let total = cm.total();

        let macro_avg = ClassMetrics {
            precision: (negative.precision + positive.precision) / 2.0,
            recall: (negative.recall + positive.recall) / 2.0,
            f1: (negative.f1 + positive.f1) / 2.0,
            support: total,
        };

        let weight = |m: &ClassMetrics| {
            if total == 0 {
                0.0
            } else {
                m.support as f64 / total as f64
            }
        };
        let (wn, wp) = (weight(&negative), weight(&positive));
        let weighted_avg = ClassMetrics {
            precision: wn * negative.precision + wp * positive.precision,
            recall: wn * negative.recall + wp * positive.recall,
            f1: wn * negative.f1 + wp * positive.f1,
            support: total,
        };

        Self {
            negative,
            positive,
            macro_avg,
            weighted_avg,
        }
    }
}

/// Scores of a model on a test set; positive-class metrics at the top level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub threshold: f64,
    pub classes: ClassificationReport,
}

impl EvaluationReport {
    /// Build a report from predicted and actual 0/1 labels
    pub fn from_predictions(predicted: &[u8], actual: &[u8], threshold: f64) -> Self {
        let cm = ConfusionMatrix::from_predictions(predicted, actual);
        let positive = cm.positive_class();
        Self {
            accuracy: cm.accuracy(),
            precision: positive.precision,
            recall: positive.recall,
            f1: positive.f1,
            confusion_matrix: cm,
            threshold,
            classes: ClassificationReport::from_confusion(&cm),
        }
    }
}

/// Score `model` on a held-out matrix
///
/// A row is predicted positive when its probability is at least `threshold`.
pub fn evaluate(
    model: &Model,
    matrix: &FeatureMatrix,
    labels: &[u8],
    threshold: f64,
) -> Result<EvaluationReport> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::config(format!(
            "Threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    if matrix.nrows() != labels.len() {
        return Err(Error::config(format!(
            "Test matrix has {} rows but {} labels",
            matrix.nrows(),
            labels.len()
        )));
    }
    if labels.is_empty() {
        return Err(Error::EmptyInput("No test rows".to_string()));
    }

    let predicted: Vec<u8> = model
        .predict_proba_matrix(matrix)?
        .into_iter()
        .map(|p| u8::from(p >= threshold))
        .collect();

    Ok(EvaluationReport::from_predictions(&predicted, labels, threshold))
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}
