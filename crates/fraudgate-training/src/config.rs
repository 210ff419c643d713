//! Pipeline configuration file support.
//!
//! Values resolve as CLI flags > config file > defaults; the binary applies
//! its flags on top of a loaded [`PipelineConfig`].

use crate::error::TrainingError;
use crate::threshold::ThresholdPolicy;
use crate::trainer::CandidateSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_OUTPUT_ROOT: &str = "runs";
pub const DEFAULT_REGISTRY_DIR: &str = "model_registry";
pub const DEFAULT_TEST_SIZE: f64 = 0.25;
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Training pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Labeled CSV dataset.
    #[serde(default)]
    pub dataset: Option<PathBuf>,

    /// Explicit label column; auto-detected when absent.
    #[serde(default)]
    pub target_column: Option<String>,

    /// Parent directory for run directories.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,

    /// Where to copy the registered champion artifact, if anywhere.
    #[serde(default)]
    pub deploy_model_path: Option<PathBuf>,

    /// Use reduced hyperparameter grids.
    #[serde(default)]
    pub quick_mode: bool,

    #[serde(default)]
    pub split: SplitConfig,

    #[serde(default)]
    pub threshold: ThresholdPolicy,

    /// Candidate overrides; empty means the backend's defaults.
    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
}

/// Held-out split configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

fn default_output_root() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_ROOT)
}

fn default_registry_dir() -> PathBuf {
    PathBuf::from(DEFAULT_REGISTRY_DIR)
}

fn default_test_size() -> f64 {
    DEFAULT_TEST_SIZE
}

fn default_random_state() -> u64 {
    DEFAULT_RANDOM_STATE
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { test_size: DEFAULT_TEST_SIZE, random_state: DEFAULT_RANDOM_STATE }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            target_column: None,
            output_root: default_output_root(),
            registry_dir: default_registry_dir(),
            deploy_model_path: None,
            quick_mode: false,
            split: SplitConfig::default(),
            threshold: ThresholdPolicy::default(),
            candidates: Vec::new(),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for TrainingError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound(path) => Self::NotFound(format!("configuration file {path}")),
            other => Self::Config(other.to_string()),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::ReadError(format!("Failed to create directory: {}", e)))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::ReadError(format!("Failed to write file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let test_size = self.split.test_size;
        if !(test_size.is_finite() && test_size > 0.0 && test_size < 1.0) {
            return Err(ConfigError::InvalidValue(format!("split.test_size must be in (0, 1), got {test_size}")));
        }
        if !self.threshold.min_precision.is_finite() {
            return Err(ConfigError::InvalidValue("threshold.min_precision must be finite".to_string()));
        }
        if !self.threshold.min_recall.is_finite() {
            return Err(ConfigError::InvalidValue("threshold.min_recall must be finite".to_string()));
        }

        let mut seen = HashSet::new();
        for candidate in &self.candidates {
            if candidate.name.trim().is_empty() || candidate.estimator.trim().is_empty() {
                return Err(ConfigError::InvalidValue("candidates need a name and an estimator".to_string()));
            }
            if !seen.insert(candidate.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!("duplicate candidate name '{}'", candidate.name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::ThresholdMetric;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_root, PathBuf::from("runs"));
        assert_eq!(config.registry_dir, PathBuf::from("model_registry"));
        assert!((config.split.test_size - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.split.random_state, 42);
        assert_eq!(config.threshold.metric, ThresholdMetric::F1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let toml_str = r#"
            dataset = "data/transactions.csv"
            quick_mode = true

            [threshold]
            metric = "f2"
            min_recall = 0.7

            [[candidates]]
            name = "logistic_regression"
            estimator = "logistic_regression"
            param_grid = { C = [0.5, 1.0] }
        "#;
        let config: PipelineConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.dataset, Some(PathBuf::from("data/transactions.csv")));
        assert!(config.quick_mode);
        assert_eq!(config.threshold.metric, ThresholdMetric::F2);
        assert!((config.threshold.min_recall - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.threshold.min_precision, 0.0);
        assert_eq!(config.split.random_state, 42);
        assert_eq!(config.candidates.len(), 1);
        assert_eq!(config.candidates[0].param_grid["C"].len(), 2);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("fraudgate.toml");
        let mut config = PipelineConfig::default();
        config.target_column = Some("label".to_string());
        config.split.test_size = 0.3;

        config.save_to_file(&path).unwrap();
        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = PipelineConfig::load_from_file(&temp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert!(matches!(TrainingError::from(err), TrainingError::NotFound(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.split.test_size = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let mut config = PipelineConfig::default();
        config.threshold.min_precision = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        let spec = CandidateSpec { name: "a".to_string(), estimator: "x".to_string(), param_grid: Default::default() };
        config.candidates = vec![spec.clone(), spec];
        assert!(config.validate().is_err());
    }
}
