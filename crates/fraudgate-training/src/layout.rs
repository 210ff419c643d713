use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub const REGISTRY_FILE_NAME: &str = "registry.json";
pub const REGISTRY_LOCK_FILE_NAME: &str = "registry.lock";
pub const VERSIONS_DIRECTORY: &str = "versions";
pub const ACTIVE_DIRECTORY: &str = "active";
pub const MODEL_FILE_NAME: &str = "model.json";
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Filesystem layout of a model registry.
///
/// ```text
/// <root>/registry.json
/// <root>/versions/<id>/{model.json, metadata.json}
/// <root>/active/{model.json, metadata.json}
/// ```
#[derive(Debug, Clone)]
pub struct RegistryLayout {
    root: PathBuf,
}

impl RegistryLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE_NAME)
    }

    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(REGISTRY_LOCK_FILE_NAME)
    }

    #[must_use]
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join(VERSIONS_DIRECTORY)
    }

    #[must_use]
    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.versions_dir().join(version_id)
    }

    #[must_use]
    pub fn active_dir(&self) -> PathBuf {
        self.root.join(ACTIVE_DIRECTORY)
    }

    #[must_use]
    pub fn active_model_path(&self) -> PathBuf {
        self.active_dir().join(MODEL_FILE_NAME)
    }

    #[must_use]
    pub fn active_metadata_path(&self) -> PathBuf {
        self.active_dir().join(METADATA_FILE_NAME)
    }

    /// Scratch directory the active mirror is assembled in before the swap.
    #[must_use]
    pub fn active_staging_dir(&self) -> PathBuf {
        self.root.join(".active-staging")
    }

    /// Resolve a registry-relative path (as stored in `registry.json`).
    #[must_use]
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Registry-relative path with forward slashes.
    pub fn relative(&self, path: &Path) -> TrainingResult<String> {
        let rel = path.strip_prefix(&self.root).map_err(|_| {
            TrainingError::Validation(format!("{} is not inside registry {}", path.display(), self.root.display()))
        })?;
        Ok(rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/"))
    }

    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(self.versions_dir())?;
        Ok(())
    }
}

/// Layout of a single training run directory.
///
/// Default layout is `<output_root>/run_<timestamp>/{reports,artifacts}/...`
#[derive(Debug, Clone)]
pub struct RunLayout {
    run_dir: PathBuf,
}

impl RunLayout {
    /// Allocate a fresh run directory under `output_root`.
    ///
    /// The directory name is derived from `created_at`; if it already exists a
    /// numeric suffix is appended. Existing directories are never reused.
    pub fn allocate(output_root: &Path, created_at: DateTime<Utc>) -> TrainingResult<Self> {
        std::fs::create_dir_all(output_root)?;
        let base = format!("run_{}", created_at.format("%Y%m%dT%H%M%S%3fZ"));

        for attempt in 0u32.. {
            let name = if attempt == 0 { base.clone() } else { format!("{base}-{attempt}") };
            let candidate = output_root.join(name);
            match std::fs::create_dir(&candidate) {
                Ok(()) => {
                    let layout = Self { run_dir: candidate };
                    std::fs::create_dir_all(layout.reports_dir())?;
                    std::fs::create_dir_all(layout.artifacts_dir())?;
                    return Ok(layout);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
        unreachable!("u32 range exhausted while allocating a run directory")
    }

    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.run_dir.join("reports")
    }

    #[must_use]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.run_dir.join("artifacts")
    }

    #[must_use]
    pub fn champion_model_path(&self) -> PathBuf {
        self.artifacts_dir().join(MODEL_FILE_NAME)
    }

    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        self.reports_dir().join("metrics.json")
    }

    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.reports_dir().join("training_summary.md")
    }

    #[must_use]
    pub fn comparison_path(&self) -> PathBuf {
        self.reports_dir().join("model_comparison.csv")
    }

    #[must_use]
    pub fn threshold_analysis_path(&self) -> PathBuf {
        self.reports_dir().join("threshold_analysis.csv")
    }

    #[must_use]
    pub fn confusion_matrix_path(&self) -> PathBuf {
        self.reports_dir().join("confusion_matrix.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_registry_layout_paths() {
        let temp = TempDir::new().unwrap();
        let layout = RegistryLayout::new(temp.path().to_path_buf());

        assert!(layout.registry_file().ends_with("registry.json"));
        assert!(layout.version_dir("v3").ends_with("versions/v3"));
        let rel = layout.relative(&layout.version_dir("v3").join(MODEL_FILE_NAME)).unwrap();
        assert_eq!(rel, "versions/v3/model.json");
        assert!(layout.relative(Path::new("/elsewhere/model.json")).is_err());
    }

    #[test]
    fn test_run_dirs_are_never_reused() {
        let temp = TempDir::new().unwrap();
        let now = Utc::now();

        let first = RunLayout::allocate(temp.path(), now).unwrap();
        let second = RunLayout::allocate(temp.path(), now).unwrap();

        assert_ne!(first.run_dir(), second.run_dir());
        assert!(first.reports_dir().is_dir());
        assert!(second.artifacts_dir().is_dir());
    }
}
