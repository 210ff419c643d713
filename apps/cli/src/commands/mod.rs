//! Command implementations for the Fraudgate CLI.

pub mod registry;
pub mod score;
pub mod train;
pub mod types;

pub use types::{RegistryArgs, ScoreArgs, TrainArgs};

use anyhow::{Context, Result};
use fraudgate_training::{ModelRegistry, PipelineConfig};
use std::path::{Path, PathBuf};

/// Config file if given, defaults otherwise.
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// `--registry-dir` flag, falling back to the configured directory.
pub fn open_registry(flag: Option<PathBuf>, config: &PipelineConfig) -> Result<ModelRegistry> {
    let root = flag.unwrap_or_else(|| config.registry_dir.clone());
    ModelRegistry::open(&root).with_context(|| format!("Failed to open model registry at {}", root.display()))
}
