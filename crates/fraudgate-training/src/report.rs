//! Run report documents: metrics JSON, markdown summary and CSV tables.

use crate::artifacts::ArtifactFile;
use crate::error::{TrainingError, TrainingResult};
use crate::evaluation::{CandidateMetrics, CandidateResult, ranking_order};
use crate::features::FeatureMetadata;
use crate::layout::RunLayout;
use crate::metrics::ConfusionMatrix;
use crate::progress::RunId;
use crate::threshold::{ThresholdAnalysisRow, ThresholdMetric, ThresholdPolicy};
use crate::trainer::Hyperparameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Champion ranking keys, in priority order.
pub const RANKING_KEYS: [&str; 3] = ["f1", "roc_auc", "pr_auc"];

/// One row of `model_comparison.csv` (and `candidate_models` in metrics.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub model: String,
    pub precision: f64,
    pub recall: f64,
    pub operating_f1: f64,
    pub roc_auc: f64,
    pub pr_auc: f64,
    pub false_positive_rate: f64,
    pub operating_threshold: f64,
    pub operating_metric: ThresholdMetric,
    pub operating_metric_score: f64,
    pub cv_best_roc_auc: f64,
    /// Sorted-key JSON object.
    pub best_params: String,
}

impl ComparisonRow {
    fn from_candidate(candidate: &CandidateResult) -> TrainingResult<Self> {
        let m = &candidate.metrics;
        Ok(Self {
            model: candidate.name.clone(),
            precision: m.precision,
            recall: m.recall,
            operating_f1: m.f1,
            roc_auc: m.roc_auc,
            pr_auc: m.pr_auc,
            false_positive_rate: m.false_positive_rate,
            operating_threshold: m.operating_threshold,
            operating_metric: m.operating_metric,
            operating_metric_score: m.operating_metric_score,
            cv_best_roc_auc: m.cv_best_roc_auc,
            best_params: serde_json::to_string(&candidate.best_hyperparameters)?,
        })
    }
}

/// Comparison rows sorted by operating F1, ROC-AUC, PR-AUC descending.
pub fn comparison_rows(candidates: &[CandidateResult]) -> TrainingResult<Vec<ComparisonRow>> {
    ranking_order(candidates).into_iter().map(|idx| ComparisonRow::from_candidate(&candidates[idx])).collect()
}

/// Serializable view of the champion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub name: String,
    pub estimator: String,
    pub best_params: Hyperparameters,
    pub metrics: CandidateMetrics,
    pub confusion_matrix: ConfusionMatrix,
    pub constraints_satisfied: bool,
}

impl From<&CandidateResult> for CandidateRecord {
    fn from(candidate: &CandidateResult) -> Self {
        Self {
            name: candidate.name.clone(),
            estimator: candidate.estimator.clone(),
            best_params: candidate.best_hyperparameters.clone(),
            metrics: candidate.metrics.clone(),
            confusion_matrix: candidate.confusion_matrix,
            constraints_satisfied: candidate.threshold_analysis.iter().any(|row| row.meets_constraints),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub ranking: Vec<String>,
    pub threshold_metric: ThresholdMetric,
    pub min_precision: f64,
    pub min_recall: f64,
}

impl From<&ThresholdPolicy> for SelectionCriteria {
    fn from(policy: &ThresholdPolicy) -> Self {
        let policy = policy.clamped();
        Self {
            ranking: RANKING_KEYS.iter().map(|k| (*k).to_string()).collect(),
            threshold_metric: policy.metric,
            min_precision: policy.min_precision,
            min_recall: policy.min_recall,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPaths {
    pub run_dir: PathBuf,
    pub champion_model_path: PathBuf,
    pub metrics: PathBuf,
    pub summary: PathBuf,
    pub model_comparison: PathBuf,
    pub threshold_analysis: PathBuf,
    pub confusion_matrix: PathBuf,
}

impl From<&RunLayout> for ReportPaths {
    fn from(layout: &RunLayout) -> Self {
        Self {
            run_dir: layout.run_dir().to_path_buf(),
            champion_model_path: layout.champion_model_path(),
            metrics: layout.metrics_path(),
            summary: layout.summary_path(),
            model_comparison: layout.comparison_path(),
            threshold_analysis: layout.threshold_analysis_path(),
            confusion_matrix: layout.confusion_matrix_path(),
        }
    }
}

/// Full run summary, written as `metrics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub generated_at: DateTime<Utc>,
    pub dataset: String,
    pub feature_metadata: FeatureMetadata,
    pub selection_criteria: SelectionCriteria,
    pub champion_model: CandidateRecord,
    /// Serialized champion with its content digest.
    pub champion_artifact: ArtifactFile,
    pub candidate_models: Vec<ComparisonRow>,
    pub artifacts: ReportPaths,
}

impl RunSummary {
    /// Metadata document handed to the registry alongside the champion artifact.
    pub fn registry_metadata(&self) -> TrainingResult<serde_json::Value> {
        Ok(serde_json::json!({
            "run_summary": serde_json::to_value(self)?,
            "evaluation": serde_json::to_value(&self.champion_model.metrics)?,
            "best_params": serde_json::to_value(&self.champion_model.best_params)?,
            "model_name": self.champion_model.name,
            "operating_threshold": self.champion_model.metrics.operating_threshold,
        }))
    }
}

fn csv_into_file(writer: csv::Writer<Vec<u8>>, path: &Path) -> TrainingResult<()> {
    let data = writer
        .into_inner()
        .map_err(|e| TrainingError::Other(anyhow::anyhow!("Failed to get CSV data: {}", e)))?;
    std::fs::write(path, data)?;
    Ok(())
}

pub fn write_comparison_csv(path: &Path, rows: &[ComparisonRow]) -> TrainingResult<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(Vec::new());

    writer.write_record([
        "model",
        "precision",
        "recall",
        "operating_f1",
        "roc_auc",
        "pr_auc",
        "false_positive_rate",
        "operating_threshold",
        "operating_metric",
        "operating_metric_score",
        "cv_best_roc_auc",
        "best_params",
    ])?;

    for row in rows {
        writer.write_record([
            row.model.clone(),
            row.precision.to_string(),
            row.recall.to_string(),
            row.operating_f1.to_string(),
            row.roc_auc.to_string(),
            row.pr_auc.to_string(),
            row.false_positive_rate.to_string(),
            row.operating_threshold.to_string(),
            row.operating_metric.to_string(),
            row.operating_metric_score.to_string(),
            row.cv_best_roc_auc.to_string(),
            row.best_params.clone(),
        ])?;
    }

    writer.flush()?;
    csv_into_file(writer, path)
}

pub fn write_threshold_analysis_csv(path: &Path, model: &str, rows: &[ThresholdAnalysisRow]) -> TrainingResult<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(Vec::new());

    writer.write_record([
        "threshold",
        "precision",
        "recall",
        "f1",
        "f2",
        "metric_score",
        "meets_constraints",
        "positive_predictions",
        "model",
    ])?;

    for row in rows {
        writer.write_record([
            row.threshold.to_string(),
            row.precision.to_string(),
            row.recall.to_string(),
            row.f1.to_string(),
            row.f2.to_string(),
            row.metric_score.to_string(),
            row.meets_constraints.to_string(),
            row.positive_predictions.to_string(),
            model.to_string(),
        ])?;
    }

    writer.flush()?;
    csv_into_file(writer, path)
}

pub fn write_confusion_matrix_csv(path: &Path, matrix: &ConfusionMatrix) -> TrainingResult<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(Vec::new());

    writer.write_record(["", "predicted_0", "predicted_1"])?;
    for (label, [predicted_0, predicted_1]) in ["actual_0", "actual_1"].into_iter().zip(matrix.as_rows()) {
        writer.write_record([label.to_string(), predicted_0.to_string(), predicted_1.to_string()])?;
    }

    writer.flush()?;
    csv_into_file(writer, path)
}

pub fn write_metrics_json(path: &Path, summary: &RunSummary) -> TrainingResult<()> {
    std::fs::write(path, serde_json::to_string_pretty(summary)?)?;
    Ok(())
}

/// Human readable `training_summary.md`.
pub fn render_markdown(summary: &RunSummary) -> TrainingResult<String> {
    let best_params = serde_json::to_string(&summary.champion_model.best_params)?;
    let mut out = String::new();
    write_markdown(&mut out, summary, &best_params)
        .map_err(|e| TrainingError::Other(anyhow::anyhow!("Failed to render training summary: {}", e)))?;
    Ok(out)
}

fn write_markdown(out: &mut String, summary: &RunSummary, best_params: &str) -> std::fmt::Result {
    let meta = &summary.feature_metadata;
    let champion = &summary.champion_model;
    let m = &champion.metrics;
    let criteria = &summary.selection_criteria;

    writeln!(out, "# Fraud Model Training Summary")?;
    writeln!(out)?;
    writeln!(out, "- Generated at: {}", summary.generated_at.to_rfc3339())?;
    writeln!(out, "- Run id: {}", summary.run_id)?;
    writeln!(out, "- Dataset: {}", summary.dataset)?;
    writeln!(out, "- Source schema: {}", meta.source_schema)?;
    writeln!(out, "- Rows: {}", meta.row_count)?;
    writeln!(out, "- Positive class ratio: {:.6}", meta.positive_class_ratio)?;
    writeln!(out)?;

    writeln!(out, "## Champion")?;
    writeln!(out)?;
    writeln!(out, "- Model: {}", champion.name)?;
    writeln!(out, "- Operating threshold ({}): {:.4}", m.operating_metric, m.operating_threshold)?;
    writeln!(out, "- Operating {} score: {:.4}", m.operating_metric, m.operating_metric_score)?;
    writeln!(out, "- Precision: {:.4}", m.precision)?;
    writeln!(out, "- Recall: {:.4}", m.recall)?;
    writeln!(out, "- F1: {:.4}", m.f1)?;
    writeln!(out, "- ROC-AUC: {:.4}", m.roc_auc)?;
    writeln!(out, "- PR-AUC: {:.4}", m.pr_auc)?;
    writeln!(out, "- False positive rate: {:.4}", m.false_positive_rate)?;
    writeln!(out, "- CV best ROC-AUC: {:.4}", m.cv_best_roc_auc)?;
    writeln!(out, "- Best params: `{}`", best_params)?;
    writeln!(out)?;

    writeln!(out, "## Threshold Constraints")?;
    writeln!(out)?;
    writeln!(out, "- Metric: {}", criteria.threshold_metric)?;
    writeln!(out, "- Minimum precision: {:.4}", criteria.min_precision)?;
    writeln!(out, "- Minimum recall: {:.4}", criteria.min_recall)?;
    writeln!(out, "- Constraints satisfied: {}", if champion.constraints_satisfied { "yes" } else { "no" })?;
    writeln!(out)?;

    writeln!(out, "## Candidates")?;
    writeln!(out)?;
    writeln!(out, "| Model | F1 | ROC-AUC | PR-AUC | Threshold |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for row in &summary.candidate_models {
        writeln!(
            out,
            "| {} | {:.4} | {:.4} | {:.4} | {:.4} |",
            row.model, row.operating_f1, row.roc_auc, row.pr_auc, row.operating_threshold
        )?;
    }
    writeln!(out)?;

    let paths = &summary.artifacts;
    writeln!(out, "## Artifacts")?;
    writeln!(out)?;
    writeln!(out, "- Run directory: {}", paths.run_dir.display())?;
    writeln!(out, "- Champion model: {}", paths.champion_model_path.display())?;
    writeln!(out, "- Metrics: {}", paths.metrics.display())?;
    writeln!(out, "- Model comparison: {}", paths.model_comparison.display())?;
    writeln!(out, "- Threshold analysis: {}", paths.threshold_analysis.display())?;
    writeln!(out, "- Confusion matrix: {}", paths.confusion_matrix.display())?;
    writeln!(out, "- Champion model sha256: {}", summary.champion_artifact.sha256)?;
    Ok(())
}

/// Write every report for a run. Files already written stay on disk if a
/// later one fails.
pub fn write_run_reports(layout: &RunLayout, summary: &RunSummary, champion: &CandidateResult) -> TrainingResult<()> {
    write_metrics_json(&layout.metrics_path(), summary)?;
    std::fs::write(layout.summary_path(), render_markdown(summary)?)?;
    write_comparison_csv(&layout.comparison_path(), &summary.candidate_models)?;
    write_threshold_analysis_csv(&layout.threshold_analysis_path(), &champion.name, &champion.threshold_analysis)?;
    write_confusion_matrix_csv(&layout.confusion_matrix_path(), &champion.confusion_matrix)?;
    tracing::debug!(run_dir = %layout.run_dir().display(), "run reports written");
    Ok(())
}
