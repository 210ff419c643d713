//! End-to-end training run: load, split, evaluate, select, report, register.

use crate::artifacts::{copy_artifact, describe_artifact};
use crate::config::PipelineConfig;
use crate::error::{TrainingError, TrainingResult};
use crate::evaluation::{CandidateEvaluator, CandidateResult, select_champion};
use crate::features::{FeatureMetadata, FeatureSource};
use crate::layout::RunLayout;
use crate::progress::{ProgressEvent, ProgressSink, RunId};
use crate::registry::{ModelRegistry, RegisterOptions, VersionEntry};
use crate::report::{CandidateRecord, ReportPaths, RunSummary, SelectionCriteria, comparison_rows, write_run_reports};
use crate::split::stratified_split;
use crate::trainer::{CandidateSpec, ModelTrainer};
use chrono::Utc;
use std::path::PathBuf;

/// Immutable record of one completed run.
#[derive(Debug, Clone)]
pub struct RunArtifact {
    pub run_id: RunId,
    pub run_directory: PathBuf,
    pub champion: CandidateResult,
    /// Evaluation order.
    pub candidates: Vec<CandidateResult>,
    pub feature_metadata: FeatureMetadata,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub artifact: RunArtifact,
    pub summary: RunSummary,
    pub version: VersionEntry,
    pub deployed_to: Option<PathBuf>,
}

pub struct TrainingOrchestrator<'a> {
    config: &'a PipelineConfig,
    trainer: &'a dyn ModelTrainer,
    registry: &'a ModelRegistry,
    progress: &'a dyn ProgressSink,
}

impl<'a> TrainingOrchestrator<'a> {
    #[must_use]
    pub fn new(
        config: &'a PipelineConfig,
        trainer: &'a dyn ModelTrainer,
        registry: &'a ModelRegistry,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self { config, trainer, registry, progress }
    }

    /// Run the full pipeline over `candidates`.
    ///
    /// Nothing touches the registry until every report has been written; a
    /// failure earlier leaves it unmodified.
    pub fn run(&self, source: &dyn FeatureSource, candidates: &[CandidateSpec]) -> TrainingResult<RunOutcome> {
        self.config.validate()?;
        if candidates.is_empty() {
            return Err(TrainingError::Validation("no candidate models configured".to_string()));
        }

        let run_id = RunId::new();
        self.progress.on_event(ProgressEvent::Started { run_id: run_id.clone() });

        let dataset = source.describe();
        let (data, feature_metadata) = source.load()?;
        if data.class_count() < 2 {
            return Err(TrainingError::Validation(format!(
                "target column '{}' must contain at least two classes",
                feature_metadata.target_column
            )));
        }
        tracing::info!(
            %run_id,
            dataset = %dataset,
            rows = data.len(),
            positive_ratio = feature_metadata.positive_class_ratio,
            "loaded training data"
        );

        let split = stratified_split(&data, self.config.split.test_size, self.config.split.random_state)?;
        self.message(&run_id, format!("split {} train / {} held-out rows", split.train.len(), split.test.len()));

        let evaluator = CandidateEvaluator::new(self.trainer, self.config.threshold);
        let mut results = Vec::with_capacity(candidates.len());
        for (idx, spec) in candidates.iter().enumerate() {
            let result = evaluator.evaluate(spec, &split)?;
            self.progress.on_event(ProgressEvent::CandidateEvaluated {
                run_id: run_id.clone(),
                candidate: result.name.clone(),
                index: idx + 1,
                total: candidates.len(),
                f1: result.metrics.f1,
                roc_auc: result.metrics.roc_auc,
            });
            results.push(result);
        }

        let champion_idx = select_champion(&results)
            .ok_or_else(|| TrainingError::Validation("no candidate results to rank".to_string()))?;
        let champion = results[champion_idx].clone();
        tracing::info!(
            %run_id,
            champion = %champion.name,
            f1 = champion.metrics.f1,
            threshold = champion.metrics.operating_threshold,
            "champion selected"
        );

        let created_at = Utc::now();
        let layout = RunLayout::allocate(&self.config.output_root, created_at)?;
        champion.scorer.write_artifact(&layout.champion_model_path())?;

        let summary = RunSummary {
            run_id: run_id.clone(),
            generated_at: created_at,
            dataset,
            feature_metadata: feature_metadata.clone(),
            selection_criteria: SelectionCriteria::from(&self.config.threshold),
            champion_model: CandidateRecord::from(&champion),
            champion_artifact: describe_artifact(layout.champion_model_path())?,
            candidate_models: comparison_rows(&results)?,
            artifacts: ReportPaths::from(&layout),
        };
        write_run_reports(&layout, &summary, &champion)?;
        self.message(&run_id, format!("reports written to {}", layout.run_dir().display()));

        let version = self.registry.register(
            &layout.champion_model_path(),
            &summary.registry_metadata()?,
            &RegisterOptions { activate: true, version_id: None },
        )?;

        let deployed_to = match &self.config.deploy_model_path {
            Some(target) => {
                copy_artifact(&self.registry.layout().resolve(&version.model_path), target)?;
                tracing::info!(version = %version.version_id, path = %target.display(), "deployed active model");
                Some(target.clone())
            }
            None => None,
        };

        self.progress.on_event(ProgressEvent::Finished {
            run_id: run_id.clone(),
            version_id: Some(version.version_id.clone()),
        });

        Ok(RunOutcome {
            artifact: RunArtifact {
                run_id,
                run_directory: layout.run_dir().to_path_buf(),
                champion,
                candidates: results,
                feature_metadata,
            },
            summary,
            version,
            deployed_to,
        })
    }

    fn message(&self, run_id: &RunId, message: String) {
        tracing::debug!(%run_id, "{message}");
        self.progress.on_event(ProgressEvent::Message { run_id: run_id.clone(), message });
    }
}
