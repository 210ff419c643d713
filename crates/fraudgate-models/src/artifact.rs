use crate::forest::ForestModel;
use crate::logistic::LogisticModel;
use fraudgate_training::{FeatureRow, FittedScorer, TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized fitted model, stored as `model.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub enum ModelArtifact {
    LogisticRegression(LogisticModel),
    RandomForest(ForestModel),
}

impl ModelArtifact {
    pub fn load(path: &Path) -> TrainingResult<Self> {
        if !path.exists() {
            return Err(TrainingError::NotFound(format!("model artifact not found at {}", path.display())));
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[must_use]
    pub fn scorer(&self) -> &dyn FittedScorer {
        match self {
            Self::LogisticRegression(model) => model,
            Self::RandomForest(model) => model,
        }
    }

    #[must_use]
    pub fn predict_proba(&self, row: &FeatureRow) -> f64 {
        self.scorer().predict_proba(row)
    }
}
