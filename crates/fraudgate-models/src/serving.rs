//! Serving-side view of the registry's active model.

use crate::artifact::ModelArtifact;
use fraudgate_training::threshold::FALLBACK_THRESHOLD;
use fraudgate_training::{FeatureRow, ModelRegistry, TrainingError, TrainingResult, metrics::clip_fraction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDecision {
    pub probability: f64,
    pub threshold: f64,
    pub is_fraud: bool,
    pub model_version: String,
}

/// The active model loaded once from a registry.
///
/// Build it at startup and hand it to request handlers by reference; reload
/// by constructing a new one after an activation or rollback.
#[derive(Debug, Clone)]
pub struct ActiveModel {
    version_id: String,
    threshold: f64,
    artifact: ModelArtifact,
    metadata: serde_json::Value,
}

impl ActiveModel {
    pub fn load(registry: &ModelRegistry) -> TrainingResult<Self> {
        let state = registry.list()?;
        let active = state
            .active_entry()
            .ok_or_else(|| TrainingError::State("registry has no active version configured".to_string()))?;

        let layout = registry.layout();
        let artifact = ModelArtifact::load(&layout.active_model_path())?;
        let metadata: serde_json::Value = match std::fs::read(layout.active_metadata_path()) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::Value::Null,
            Err(e) => return Err(e.into()),
        };

        let threshold = metadata
            .get("operating_threshold")
            .and_then(serde_json::Value::as_f64)
            .map_or(FALLBACK_THRESHOLD, clip_fraction);

        tracing::info!(version = %active.version_id, threshold, "loaded active model");
        Ok(Self { version_id: active.version_id.clone(), threshold, artifact, metadata })
    }

    #[must_use]
    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[must_use]
    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    #[must_use]
    pub fn score(&self, row: &FeatureRow) -> ScoreDecision {
        let probability = clip_fraction(self.artifact.predict_proba(row));
        ScoreDecision {
            probability,
            threshold: self.threshold,
            is_fraud: probability >= self.threshold,
            model_version: self.version_id.clone(),
        }
    }
}
