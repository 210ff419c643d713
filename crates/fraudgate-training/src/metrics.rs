//! Binary classification metrics computed on held-out predictions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Relative and absolute tolerance used for score tie detection.
pub const TIE_TOLERANCE: f64 = 1e-12;

/// Tolerance-based float comparison: `|a - b| <= atol + rtol * |b|`.
#[must_use]
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_TOLERANCE + TIE_TOLERANCE * b.abs()
}

/// Clamp a fraction into `[0, 1]`; non-finite input becomes 0.
#[must_use]
pub fn clip_fraction(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

/// `(1 + b^2) P R / (b^2 P + R)`, 0 when the denominator is 0.
#[must_use]
pub fn f_beta(precision: f64, recall: f64, beta: f64) -> f64 {
    let beta_sq = beta * beta;
    let denominator = beta_sq * precision + recall;
    if denominator > 0.0 { (1.0 + beta_sq) * precision * recall / denominator } else { 0.0 }
}

/// 2x2 confusion counts with labels ordered `[0, 1]`.
///
/// Serialized as `[[tn, fp], [fn, tp]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub true_positives: u64,
}

impl ConfusionMatrix {
    #[must_use]
    pub fn from_predictions(labels: &[u8], predictions: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (label, predicted) in labels.iter().zip(predictions) {
            match (label, predicted) {
                (0, 0) => matrix.true_negatives += 1,
                (0, _) => matrix.false_positives += 1,
                (_, 0) => matrix.false_negatives += 1,
                _ => matrix.true_positives += 1,
            }
        }
        matrix
    }

    /// Confusion at the rule "positive iff probability >= threshold".
    #[must_use]
    pub fn at_threshold(labels: &[u8], probabilities: &[f64], threshold: f64) -> Self {
        let predictions = predict_at(probabilities, threshold);
        Self::from_predictions(labels, &predictions)
    }

    #[must_use]
    pub fn precision(&self) -> f64 {
        let predicted = self.true_positives + self.false_positives;
        if predicted == 0 { 0.0 } else { self.true_positives as f64 / predicted as f64 }
    }

    #[must_use]
    pub fn recall(&self) -> f64 {
        let actual = self.true_positives + self.false_negatives;
        if actual == 0 { 0.0 } else { self.true_positives as f64 / actual as f64 }
    }

    #[must_use]
    pub fn f1(&self) -> f64 {
        f_beta(self.precision(), self.recall(), 1.0)
    }

    /// `FP / (FP + TN)`, defined as 0 when the split has no actual negatives.
    #[must_use]
    pub fn false_positive_rate(&self) -> f64 {
        let negatives = self.false_positives + self.true_negatives;
        if negatives == 0 { 0.0 } else { self.false_positives as f64 / negatives as f64 }
    }

    #[must_use]
    pub fn positive_predictions(&self) -> u64 {
        self.true_positives + self.false_positives
    }

    #[must_use]
    pub fn as_rows(&self) -> [[u64; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }
}

impl Serialize for ConfusionMatrix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_rows().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfusionMatrix {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [[tn, fp], [fneg, tp]] = <[[u64; 2]; 2]>::deserialize(deserializer)?;
        Ok(Self { true_negatives: tn, false_positives: fp, false_negatives: fneg, true_positives: tp })
    }
}

#[must_use]
pub fn predict_at(probabilities: &[f64], threshold: f64) -> Vec<u8> {
    let threshold = clip_fraction(threshold);
    probabilities.iter().map(|p| u8::from(*p >= threshold)).collect()
}

fn has_both_classes(labels: &[u8]) -> bool {
    labels.contains(&0) && labels.contains(&1)
}

/// Area under the ROC curve via the rank-sum statistic with averaged ranks
/// for tied scores. 0 when only one class is present.
#[must_use]
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> f64 {
    if !has_both_classes(labels) {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]].total_cmp(&scores[order[start]]) == Ordering::Equal {
            end += 1;
        }
        // ranks are 1-based; tied block shares the mean rank
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = mean_rank;
        }
        start = end;
    }

    let n_pos = labels.iter().filter(|l| **l == 1).count() as f64;
    let n_neg = labels.len() as f64 - n_pos;
    let pos_rank_sum: f64 = labels.iter().zip(&ranks).filter(|(l, _)| **l == 1).map(|(_, r)| *r).sum();

    (pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

/// Average precision: `sum_k (R_k - R_{k-1}) * P_k` over descending distinct
/// score thresholds. 0 when only one class is present.
#[must_use]
pub fn average_precision(labels: &[u8], scores: &[f64]) -> f64 {
    if !has_both_classes(labels) {
        return 0.0;
    }

    let curve = descending_curve(labels, scores);
    let total_pos = labels.iter().filter(|l| **l == 1).count() as f64;

    let mut previous_recall = 0.0;
    let mut ap = 0.0;
    for point in curve {
        let recall = point.true_positives as f64 / total_pos;
        let precision = point.true_positives as f64 / (point.true_positives + point.false_positives) as f64;
        ap += (recall - previous_recall) * precision;
        previous_recall = recall;
    }
    ap
}

/// Cumulative counts at one distinct score, sweeping from the highest score down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CurvePoint {
    pub threshold: f64,
    pub true_positives: u64,
    pub false_positives: u64,
}

/// For every distinct score `t` (highest first), the counts of rows with
/// score `>= t`.
pub(crate) fn descending_curve(labels: &[u8], scores: &[f64]) -> Vec<CurvePoint> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

    let mut points = Vec::new();
    let (mut tp, mut fp) = (0u64, 0u64);
    for (pos, idx) in order.iter().enumerate() {
        if labels[*idx] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_block = order
            .get(pos + 1)
            .is_none_or(|next| scores[*next].total_cmp(&scores[*idx]) != Ordering::Equal);
        if last_of_block {
            points.push(CurvePoint { threshold: scores[*idx], true_positives: tp, false_positives: fp });
        }
    }
    points
}
