//! Versioned model registry.
//!
//! Artifacts are copied into immutable `versions/<id>/` directories and one
//! version is mirrored into `active/` for serving. The registry document is
//! rewritten in full on every mutation, through a temp file and rename, while
//! an exclusive lock on `registry.lock` is held for the whole
//! read-modify-write.

use crate::artifacts::{copy_artifact, sha256_file};
use crate::error::{TrainingError, TrainingResult};
use crate::layout::{METADATA_FILE_NAME, MODEL_FILE_NAME, RegistryLayout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One registered model version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version_id: String,
    pub created_at: DateTime<Utc>,
    /// Registry-relative path of the model artifact.
    pub model_path: String,
    /// Registry-relative path of the metadata document.
    pub metadata_path: String,
}

/// Persisted registry state (`registry.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub active_version: Option<String>,
    /// Sorted ascending by `created_at`. Append-only.
    pub versions: Vec<VersionEntry>,
}

impl Registry {
    #[must_use]
    pub fn find(&self, version_id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.version_id == version_id)
    }

    #[must_use]
    pub fn active_entry(&self) -> Option<&VersionEntry> {
        self.active_version.as_deref().and_then(|id| self.find(id))
    }

    /// `"v" + (max numeric suffix + 1)`, or `"v1"` for an empty registry.
    #[must_use]
    pub fn next_version_id(&self) -> String {
        let max = self
            .versions
            .iter()
            .filter_map(|v| v.version_id.strip_prefix('v'))
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|digits| digits.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("v{}", max + 1)
    }
}

/// Options for [`ModelRegistry::register`].
#[derive(Debug, Clone)]
pub struct RegisterOptions {
    pub activate: bool,
    pub version_id: Option<String>,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self { activate: true, version_id: None }
    }
}

/// Handle on a registry directory.
///
/// Construct once per process and share by reference. All mutating calls
/// serialize on an advisory file lock, so separate processes pointed at the
/// same directory do not interleave their read-modify-write cycles.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    layout: RegistryLayout,
}

impl ModelRegistry {
    /// Open (and initialize if needed) the registry rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> TrainingResult<Self> {
        let registry = Self { layout: RegistryLayout::new(root.into()) };
        registry.layout.ensure_dirs()?;
        if !registry.layout.registry_file().exists() {
            let lock = registry.lock_file()?;
            let mut lock = fd_lock::RwLock::new(lock);
            let _guard = lock.write()?;
            if !registry.layout.registry_file().exists() {
                registry.save(&Registry::default())?;
            }
        }
        Ok(registry)
    }

    #[must_use]
    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Full persisted state, unchanged.
    pub fn list(&self) -> TrainingResult<Registry> {
        self.load()
    }

    /// Copy `source` into a new immutable version and optionally activate it.
    ///
    /// The new version becomes active when `activate` is set or when no version
    /// is active yet.
    pub fn register(
        &self,
        source: &Path,
        metadata: &serde_json::Value,
        options: &RegisterOptions,
    ) -> TrainingResult<VersionEntry> {
        if !source.exists() {
            return Err(TrainingError::NotFound(format!("model artifact not found at {}", source.display())));
        }

        self.with_lock(|| {
            let mut registry = self.load()?;
            let version_id = match &options.version_id {
                Some(id) => validate_version_id(id)?,
                None => registry.next_version_id(),
            };
            if registry.find(&version_id).is_some() {
                return Err(TrainingError::Conflict(format!("version '{version_id}' already exists in registry")));
            }

            let version_dir = self.layout.version_dir(&version_id);
            if version_dir.exists() {
                return Err(TrainingError::Conflict(format!(
                    "version directory {} already exists",
                    version_dir.display()
                )));
            }

            let created_at = Utc::now();
            let model_destination = version_dir.join(MODEL_FILE_NAME);
            let metadata_destination = version_dir.join(METADATA_FILE_NAME);
            let entry = VersionEntry {
                version_id: version_id.clone(),
                created_at,
                model_path: self.layout.relative(&model_destination)?,
                metadata_path: self.layout.relative(&metadata_destination)?,
            };

            // Built in a scratch directory; dropped (and removed) on any error.
            let staging = tempfile::Builder::new().prefix(".staging-").tempdir_in(self.layout.versions_dir())?;
            let staged_model = staging.path().join(MODEL_FILE_NAME);
            copy_artifact(source, &staged_model)?;
            let enriched = enrich_metadata(metadata, &[
                ("registered_at", serde_json::json!(created_at)),
                ("version_id", serde_json::json!(version_id)),
                ("registry_dir", serde_json::json!(self.layout.root().display().to_string())),
                ("model_path", serde_json::json!(entry.model_path)),
                ("model_sha256", serde_json::json!(sha256_file(&staged_model)?)),
            ]);
            std::fs::write(staging.path().join(METADATA_FILE_NAME), serde_json::to_string_pretty(&enriched)?)?;
            std::fs::rename(staging.path(), &version_dir)?;

            let previous_active = registry.active_entry().cloned();
            registry.versions.push(entry.clone());
            registry.versions.sort_by(|a, b| a.created_at.cmp(&b.created_at));

            let activating = options.activate || registry.active_version.is_none();
            if let Err(e) = self.commit_version(&mut registry, &entry, activating) {
                if activating {
                    self.restore_active(previous_active.as_ref());
                }
                if let Err(cleanup) = std::fs::remove_dir_all(&version_dir) {
                    tracing::warn!(version = %version_id, error = %cleanup, "failed to remove unregistered version directory");
                }
                return Err(e);
            }

            tracing::info!(
                version = %entry.version_id,
                active = ?registry.active_version,
                "registered model version"
            );
            Ok(entry)
        })
    }

    /// Point `active` at an existing version and re-mirror its files.
    pub fn activate(&self, version_id: &str) -> TrainingResult<VersionEntry> {
        self.with_lock(|| self.activate_locked(version_id))
    }

    /// Re-activate the version `steps` positions before the active one.
    pub fn rollback(&self, steps: i64) -> TrainingResult<VersionEntry> {
        if steps < 1 {
            return Err(TrainingError::Validation(format!("rollback steps must be >= 1, got {steps}")));
        }

        self.with_lock(|| {
            let registry = self.load()?;
            if registry.versions.is_empty() {
                return Err(TrainingError::State("registry has no versions to roll back".to_string()));
            }
            let active = registry
                .active_version
                .as_deref()
                .ok_or_else(|| TrainingError::State("registry has no active version configured".to_string()))?;
            let active_pos = registry.versions.iter().position(|v| v.version_id == active).ok_or_else(|| {
                TrainingError::State(format!("active version '{active}' was not found in registry versions"))
            })?;

            let target_pos = i64::try_from(active_pos).unwrap_or(i64::MAX) - steps;
            let Ok(target_pos) = usize::try_from(target_pos) else {
                return Err(TrainingError::Range(format!(
                    "cannot roll back {steps} step(s) from active version '{active}': only {active_pos} older version(s)"
                )));
            };

            let target = registry.versions[target_pos].version_id.clone();
            tracing::info!(from = %active, to = %target, steps, "rolling back active model");
            self.activate_locked(&target)
        })
    }

    fn activate_locked(&self, version_id: &str) -> TrainingResult<VersionEntry> {
        let mut registry = self.load()?;
        let entry = registry
            .find(version_id)
            .cloned()
            .ok_or_else(|| TrainingError::NotFound(format!("version '{version_id}' was not found in registry")))?;

        let previous_active = registry.active_entry().cloned();
        self.mirror_active(&entry)?;
        registry.active_version = Some(entry.version_id.clone());
        if let Err(e) = self.save(&registry) {
            self.restore_active(previous_active.as_ref());
            return Err(e);
        }
        tracing::info!(version = %entry.version_id, "activated model version");
        Ok(entry)
    }

    /// Rebuild `active/` from one version's files.
    ///
    /// Files are staged first, then the old mirror is replaced, so the mirror
    /// never mixes files from two versions.
    fn mirror_active(&self, entry: &VersionEntry) -> TrainingResult<()> {
        let staging = self.layout.active_staging_dir();
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;
        copy_artifact(&self.layout.resolve(&entry.model_path), &staging.join(MODEL_FILE_NAME))?;
        copy_artifact(&self.layout.resolve(&entry.metadata_path), &staging.join(METADATA_FILE_NAME))?;

        let active = self.layout.active_dir();
        if active.exists() {
            std::fs::remove_dir_all(&active)?;
        }
        std::fs::rename(&staging, &active)?;
        Ok(())
    }

    fn commit_version(&self, registry: &mut Registry, entry: &VersionEntry, activate: bool) -> TrainingResult<()> {
        if activate {
            self.mirror_active(entry)?;
            registry.active_version = Some(entry.version_id.clone());
        }
        self.save(registry)
    }

    /// Put `active/` back to `previous` after a failed pointer write, or clear
    /// it when nothing was active.
    fn restore_active(&self, previous: Option<&VersionEntry>) {
        let restored = match previous {
            Some(entry) => self.mirror_active(entry),
            None => {
                let active = self.layout.active_dir();
                if active.exists() { std::fs::remove_dir_all(&active).map_err(Into::into) } else { Ok(()) }
            }
        };
        if let Err(e) = restored {
            tracing::warn!(error = %e, "failed to restore active model mirror");
        }
    }

    fn lock_file(&self) -> TrainingResult<File> {
        Ok(OpenOptions::new().create(true).truncate(false).write(true).open(self.layout.lock_file())?)
    }

    /// Run `f` while holding the exclusive registry lock; released on drop.
    fn with_lock<T>(&self, f: impl FnOnce() -> TrainingResult<T>) -> TrainingResult<T> {
        let mut lock = fd_lock::RwLock::new(self.lock_file()?);
        let _guard = lock.write()?;
        f()
    }

    fn load(&self) -> TrainingResult<Registry> {
        let path = self.layout.registry_file();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Registry::default()),
            Err(e) => return Err(e.into()),
        };
        let registry: Registry = serde_json::from_slice(&bytes)?;
        if let Some(active) = &registry.active_version {
            if registry.find(active).is_none() {
                return Err(TrainingError::State(format!(
                    "registry document points at unknown active version '{active}'"
                )));
            }
        }
        Ok(registry)
    }

    fn save(&self, registry: &Registry) -> TrainingResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(self.layout.root())?;
        tmp.write_all(serde_json::to_string_pretty(registry)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.layout.registry_file()).map_err(|e| TrainingError::Io(e.error))?;
        Ok(())
    }
}

fn validate_version_id(id: &str) -> TrainingResult<String> {
    let trimmed = id.trim();
    let valid = !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(TrainingError::Validation(format!("invalid version id '{id}'")));
    }
    Ok(trimmed.to_string())
}

/// Copy of `metadata` with the registry fields added. Non-object metadata is
/// kept under a `metadata` key.
fn enrich_metadata(metadata: &serde_json::Value, fields: &[(&str, serde_json::Value)]) -> serde_json::Value {
    let mut object = match metadata {
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("metadata".to_string(), other.clone());
            map
        }
    };
    for (key, value) in fields {
        object.insert((*key).to_string(), value.clone());
    }
    serde_json::Value::Object(object)
}
