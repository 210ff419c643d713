use clap::{Args, Subcommand};
use fraudgate_training::ThresholdMetric;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Labeled CSV dataset
    #[arg(long, conflicts_with = "synthetic")]
    pub dataset: Option<PathBuf>,

    /// Train on N generated rows instead of a dataset
    #[arg(long, value_name = "N")]
    pub synthetic: Option<usize>,

    /// Label column (auto-detected from is_fraud, label, class, Class, target)
    #[arg(long)]
    pub target_column: Option<String>,

    /// Parent directory for run directories
    #[arg(long)]
    pub output_root: Option<PathBuf>,

    /// Model registry directory
    #[arg(long)]
    pub registry_dir: Option<PathBuf>,

    /// Also copy the registered champion artifact here
    #[arg(long)]
    pub deploy_model_path: Option<PathBuf>,

    /// Use reduced hyperparameter grids
    #[arg(long)]
    pub quick: bool,

    /// Held-out share, in (0, 1)
    #[arg(long)]
    pub test_size: Option<f64>,

    /// Seed for the split and synthetic data
    #[arg(long)]
    pub random_state: Option<u64>,

    /// Metric maximized when picking the operating threshold (f1, f2)
    #[arg(long)]
    pub threshold_metric: Option<ThresholdMetric>,

    /// Precision floor for the operating threshold
    #[arg(long)]
    pub min_precision: Option<f64>,

    /// Recall floor for the operating threshold
    #[arg(long)]
    pub min_recall: Option<f64>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Model registry directory
    #[arg(long, global = true)]
    pub registry_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: RegistryCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RegistryCommand {
    /// Print the full registry state
    List,

    /// Make an existing version active
    Activate {
        /// Version id (e.g. v3)
        #[arg(long)]
        version: String,
    },

    /// Re-activate an older version
    Rollback {
        /// Versions to step back from the active one
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        steps: i64,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    /// Model registry directory
    #[arg(long)]
    pub registry_dir: Option<PathBuf>,

    #[arg(long)]
    pub amount: f64,

    #[arg(long)]
    pub transaction_frequency: f64,

    #[arg(long)]
    pub location_risk: f64,

    #[arg(long)]
    pub merchant_risk: f64,
}
