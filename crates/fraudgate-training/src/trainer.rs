use crate::error::TrainingResult;
use crate::features::{FeatureRow, LabeledFeatures};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;

/// Hyperparameter name -> value. Ordered so serialized records are stable.
pub type Hyperparameters = BTreeMap<String, serde_json::Value>;

/// Hyperparameter name -> candidate values explored by the search.
pub type ParamGrid = BTreeMap<String, Vec<serde_json::Value>>;

/// One model specification evaluated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    /// Name used in reports (e.g. `logistic_regression`).
    pub name: String,
    /// Estimator identifier understood by the trainer backend.
    pub estimator: String,
    #[serde(default)]
    pub param_grid: ParamGrid,
}

/// A fitted model able to score feature rows.
pub trait FittedScorer: Debug + Send + Sync {
    /// Estimator identifier this scorer was produced by.
    fn estimator(&self) -> &str;

    /// Probability of the positive (fraud) class.
    fn predict_proba(&self, row: &FeatureRow) -> f64;

    /// Serialized artifact representation.
    fn to_artifact_json(&self) -> TrainingResult<serde_json::Value>;

    fn predict_proba_batch(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_proba(row)).collect()
    }

    fn write_artifact(&self, path: &Path) -> TrainingResult<()> {
        let json = serde_json::to_string_pretty(&self.to_artifact_json()?)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Result of a cross-validated hyperparameter search.
#[derive(Debug)]
pub struct SearchOutcome {
    pub scorer: Box<dyn FittedScorer>,
    pub best_hyperparameters: Hyperparameters,
    /// Mean validation ROC-AUC of the winning grid point.
    pub cv_best_roc_auc: f64,
}

/// External learning backend: fits a candidate on the training split with a
/// cross-validated search scored by ROC-AUC and refits the best grid point.
pub trait ModelTrainer {
    fn id(&self) -> &'static str;

    fn fit_search(&self, spec: &CandidateSpec, train: &LabeledFeatures) -> TrainingResult<SearchOutcome>;
}
