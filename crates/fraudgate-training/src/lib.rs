//! Fraudgate Training
//!
//! Backend-agnostic core of the fraud model lifecycle:
//! - Loading sanitized features (`FeatureSource`) and stratified splitting
//! - Threshold selection under precision/recall floors
//! - Candidate evaluation and champion selection
//! - Versioned model registry with activation and rollback
//! - Run orchestration and report generation

pub mod artifacts;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod layout;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod report;
pub mod split;
pub mod threshold;
pub mod trainer;

pub use artifacts::{ArtifactFile, copy_artifact, describe_artifact, sha256_file};
pub use config::{ConfigError, PipelineConfig, SplitConfig};
pub use error::{TrainingError, TrainingResult};
pub use evaluation::{CandidateEvaluator, CandidateMetrics, CandidateResult, ranking_order, select_champion};
pub use features::{CsvFeatureSource, FeatureMetadata, FeatureRow, FeatureSource, LabeledFeatures, SyntheticFeatureSource};
pub use layout::{RegistryLayout, RunLayout};
pub use metrics::{ConfusionMatrix, average_precision, roc_auc};
pub use orchestrator::{RunArtifact, RunOutcome, TrainingOrchestrator};
pub use progress::{NoopProgressSink, ProgressEvent, ProgressSink, RunId, StdoutProgressSink};
pub use registry::{ModelRegistry, RegisterOptions, Registry, VersionEntry};
pub use report::{ComparisonRow, RunSummary};
pub use split::{TrainTestSplit, stratified_folds, stratified_split};
pub use threshold::{ThresholdAnalysisRow, ThresholdMetric, ThresholdPolicy, ThresholdRecommendation, select_threshold};
pub use trainer::{CandidateSpec, FittedScorer, Hyperparameters, ModelTrainer, ParamGrid, SearchOutcome};
