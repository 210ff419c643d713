//! Candidate evaluation and champion selection.

use crate::error::{TrainingError, TrainingResult};
use crate::metrics::{ConfusionMatrix, average_precision, roc_auc};
use crate::split::TrainTestSplit;
use crate::threshold::{ThresholdAnalysisRow, ThresholdMetric, ThresholdPolicy, select_threshold};
use crate::trainer::{CandidateSpec, FittedScorer, Hyperparameters, ModelTrainer};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Uniform held-out metrics for one evaluated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
    pub pr_auc: f64,
    pub operating_threshold: f64,
    pub operating_metric: ThresholdMetric,
    pub operating_metric_score: f64,
    pub cv_best_roc_auc: f64,
    pub false_positive_rate: f64,
    pub positive_predictions: u64,
}

impl CandidateMetrics {
    /// Descending ranking key: operating F1, then ROC-AUC, then PR-AUC.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.f1
            .total_cmp(&other.f1)
            .then_with(|| self.roc_auc.total_cmp(&other.roc_auc))
            .then_with(|| self.pr_auc.total_cmp(&other.pr_auc))
    }
}

#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub name: String,
    pub estimator: String,
    pub scorer: Arc<dyn FittedScorer>,
    pub best_hyperparameters: Hyperparameters,
    pub metrics: CandidateMetrics,
    pub confusion_matrix: ConfusionMatrix,
    pub threshold_analysis: Vec<ThresholdAnalysisRow>,
}

/// Trains one candidate through the external trainer and scores it on the
/// held-out split under a fixed threshold policy.
pub struct CandidateEvaluator<'a> {
    trainer: &'a dyn ModelTrainer,
    policy: ThresholdPolicy,
}

impl<'a> CandidateEvaluator<'a> {
    #[must_use]
    pub fn new(trainer: &'a dyn ModelTrainer, policy: ThresholdPolicy) -> Self {
        Self { trainer, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn evaluate(&self, spec: &CandidateSpec, split: &TrainTestSplit) -> TrainingResult<CandidateResult> {
        tracing::debug!(candidate = %spec.name, estimator = %spec.estimator, trainer = self.trainer.id(), "fitting candidate");
        let outcome = self.trainer.fit_search(spec, &split.train)?;

        let labels = &split.test.labels;
        let probabilities = outcome.scorer.predict_proba_batch(&split.test.rows);
        if probabilities.len() != labels.len() {
            return Err(TrainingError::Trainer(format!(
                "scorer for '{}' returned {} probabilities for {} rows",
                spec.name,
                probabilities.len(),
                labels.len()
            )));
        }

        let selection = select_threshold(labels, &probabilities, &self.policy)?;
        let recommendation = &selection.recommendation;
        let confusion_matrix = ConfusionMatrix::at_threshold(labels, &probabilities, recommendation.threshold);

        let metrics = CandidateMetrics {
            precision: confusion_matrix.precision(),
            recall: confusion_matrix.recall(),
            f1: confusion_matrix.f1(),
            roc_auc: roc_auc(labels, &probabilities),
            pr_auc: average_precision(labels, &probabilities),
            operating_threshold: recommendation.threshold,
            operating_metric: recommendation.metric,
            operating_metric_score: recommendation.metric_score,
            cv_best_roc_auc: outcome.cv_best_roc_auc,
            false_positive_rate: confusion_matrix.false_positive_rate(),
            positive_predictions: confusion_matrix.positive_predictions(),
        };

        tracing::info!(
            candidate = %spec.name,
            f1 = metrics.f1,
            roc_auc = metrics.roc_auc,
            pr_auc = metrics.pr_auc,
            threshold = metrics.operating_threshold,
            "candidate evaluated"
        );

        Ok(CandidateResult {
            name: spec.name.clone(),
            estimator: spec.estimator.clone(),
            scorer: Arc::from(outcome.scorer),
            best_hyperparameters: outcome.best_hyperparameters,
            metrics,
            confusion_matrix,
            threshold_analysis: selection.analysis,
        })
    }
}

/// Index of the champion: maximum of (f1, roc_auc, pr_auc). A full tie keeps
/// the earliest candidate. `None` for an empty slice.
#[must_use]
pub fn select_champion(candidates: &[CandidateResult]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let replace = match best {
            None => true,
            Some(current) => candidate.metrics.rank_cmp(&candidates[current].metrics) == Ordering::Greater,
        };
        if replace {
            best = Some(idx);
        }
    }
    best
}

/// Candidate indices sorted by the ranking key, best first. Stable, so equal
/// candidates keep evaluation order.
#[must_use]
pub fn ranking_order(candidates: &[CandidateResult]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|a, b| candidates[*b].metrics.rank_cmp(&candidates[*a].metrics));
    order
}
