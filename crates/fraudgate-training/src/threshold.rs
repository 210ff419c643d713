//! Operating threshold selection.
//!
//! Sweeps every distinct probability as a candidate cut ("positive iff
//! probability >= threshold"), scores each cut with F1 and F2, and recommends
//! one threshold under optional precision/recall floors. Selection is
//! deterministic: best metric score, then best precision, then the highest
//! threshold, with ties detected by tolerance rather than exact equality.

use crate::error::{TrainingError, TrainingResult};
use crate::metrics::{ConfusionMatrix, clip_fraction, descending_curve, f_beta, is_close};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Threshold used when the sweep yields no candidate cuts.
pub const FALLBACK_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMetric {
    #[default]
    F1,
    F2,
}

impl ThresholdMetric {
    #[must_use]
    pub fn beta(self) -> f64 {
        match self {
            Self::F1 => 1.0,
            Self::F2 => 2.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::F1 => "f1",
            Self::F2 => "f2",
        }
    }
}

impl fmt::Display for ThresholdMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdMetric {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f1" => Ok(Self::F1),
            "f2" => Ok(Self::F2),
            other => Err(TrainingError::Validation(format!("unknown threshold metric '{other}' (expected f1 or f2)"))),
        }
    }
}

/// Metric choice plus precision/recall floors for one run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    #[serde(default)]
    pub metric: ThresholdMetric,
    #[serde(default)]
    pub min_precision: f64,
    #[serde(default)]
    pub min_recall: f64,
}

impl ThresholdPolicy {
    #[must_use]
    pub fn new(metric: ThresholdMetric, min_precision: f64, min_recall: f64) -> Self {
        Self { metric, min_precision, min_recall }
    }

    /// Same policy with both floors clamped into `[0, 1]`.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            metric: self.metric,
            min_precision: clip_fraction(self.min_precision),
            min_recall: clip_fraction(self.min_recall),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRecommendation {
    pub threshold: f64,
    pub metric: ThresholdMetric,
    pub metric_score: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub positive_predictions: u64,
    /// False when no cut met the floors and the pool was widened to all cuts.
    pub constraints_satisfied: bool,
}

/// One candidate cut in the audit table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAnalysisRow {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub f2: f64,
    pub metric_score: f64,
    pub meets_constraints: bool,
    pub positive_predictions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSelection {
    pub recommendation: ThresholdRecommendation,
    /// Rows ordered by ascending threshold.
    pub analysis: Vec<ThresholdAnalysisRow>,
}

fn validate_inputs(labels: &[u8], probabilities: &[f64]) -> TrainingResult<()> {
    if labels.len() != probabilities.len() {
        return Err(TrainingError::Validation(format!(
            "labels ({}) and probabilities ({}) differ in length",
            labels.len(),
            probabilities.len()
        )));
    }
    if let Some(bad) = labels.iter().find(|l| **l > 1) {
        return Err(TrainingError::Validation(format!("labels must be 0 or 1, got {bad}")));
    }
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
        return Err(TrainingError::Validation(format!("probabilities must be finite, got {bad}")));
    }
    Ok(())
}

/// Candidate cuts in ascending threshold order.
///
/// Empty when there is nothing to sweep: no rows, or no positive labels
/// (recall is undefined without positives).
fn sweep(labels: &[u8], probabilities: &[f64], metric: ThresholdMetric, policy: &ThresholdPolicy) -> Vec<ThresholdAnalysisRow> {
    let total_pos = labels.iter().filter(|l| **l == 1).count();
    if probabilities.is_empty() || total_pos == 0 {
        return Vec::new();
    }

    let mut rows: Vec<ThresholdAnalysisRow> = descending_curve(labels, probabilities)
        .into_iter()
        .map(|point| {
            let predicted = point.true_positives + point.false_positives;
            let precision = point.true_positives as f64 / predicted as f64;
            let recall = point.true_positives as f64 / total_pos as f64;
            let f1 = f_beta(precision, recall, 1.0);
            let f2 = f_beta(precision, recall, 2.0);
            ThresholdAnalysisRow {
                threshold: point.threshold,
                precision,
                recall,
                f1,
                f2,
                metric_score: match metric {
                    ThresholdMetric::F1 => f1,
                    ThresholdMetric::F2 => f2,
                },
                meets_constraints: precision >= policy.min_precision && recall >= policy.min_recall,
                positive_predictions: predicted,
            }
        })
        .collect();
    rows.reverse();
    rows
}

fn pick_best(analysis: &[ThresholdAnalysisRow], pool: &[usize]) -> usize {
    let best_score = pool.iter().map(|i| analysis[*i].metric_score).fold(f64::NEG_INFINITY, f64::max);
    let mut best: Vec<usize> = pool.iter().copied().filter(|i| is_close(analysis[*i].metric_score, best_score)).collect();

    if best.len() > 1 {
        let max_precision = best.iter().map(|i| analysis[*i].precision).fold(f64::NEG_INFINITY, f64::max);
        best.retain(|i| is_close(analysis[*i].precision, max_precision));
    }

    // Remaining ties: highest threshold wins. First maximal index on exact equality.
    let mut winner = best[0];
    for idx in &best[1..] {
        if analysis[*idx].threshold > analysis[winner].threshold {
            winner = *idx;
        }
    }
    winner
}

/// Recommend an operating threshold for held-out `labels`/`probabilities`.
pub fn select_threshold(labels: &[u8], probabilities: &[f64], policy: &ThresholdPolicy) -> TrainingResult<ThresholdSelection> {
    validate_inputs(labels, probabilities)?;
    let policy = policy.clamped();
    let metric = policy.metric;

    let analysis = sweep(labels, probabilities, metric, &policy);
    if analysis.is_empty() {
        let matrix = ConfusionMatrix::at_threshold(labels, probabilities, FALLBACK_THRESHOLD);
        let (precision, recall) = (matrix.precision(), matrix.recall());
        let f1 = f_beta(precision, recall, 1.0);
        let f2 = f_beta(precision, recall, 2.0);
        let metric_score = f_beta(precision, recall, metric.beta());
        tracing::debug!(rows = labels.len(), "no candidate cuts; using fallback threshold");

        return Ok(ThresholdSelection {
            recommendation: ThresholdRecommendation {
                threshold: FALLBACK_THRESHOLD,
                metric,
                metric_score,
                precision,
                recall,
                f1,
                positive_predictions: matrix.positive_predictions(),
                constraints_satisfied: true,
            },
            analysis: vec![ThresholdAnalysisRow {
                threshold: FALLBACK_THRESHOLD,
                precision,
                recall,
                f1,
                f2,
                metric_score,
                meets_constraints: true,
                positive_predictions: matrix.positive_predictions(),
            }],
        });
    }

    let constrained: Vec<usize> = (0..analysis.len()).filter(|i| analysis[*i].meets_constraints).collect();
    let constraints_satisfied = !constrained.is_empty();
    let pool = if constraints_satisfied {
        constrained
    } else {
        tracing::warn!(
            min_precision = policy.min_precision,
            min_recall = policy.min_recall,
            "no threshold meets the precision/recall floors; selecting from all thresholds"
        );
        (0..analysis.len()).collect()
    };

    let best = pick_best(&analysis, &pool);
    let threshold = clip_fraction(analysis[best].threshold);
    let matrix = ConfusionMatrix::at_threshold(labels, probabilities, threshold);

    Ok(ThresholdSelection {
        recommendation: ThresholdRecommendation {
            threshold,
            metric,
            metric_score: analysis[best].metric_score,
            precision: matrix.precision(),
            recall: matrix.recall(),
            f1: matrix.f1(),
            positive_predictions: matrix.positive_predictions(),
            constraints_satisfied,
        },
        analysis,
    })
}
