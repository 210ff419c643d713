use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A file produced by a run, with its content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub sha256: String,
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn describe_artifact(path: PathBuf) -> TrainingResult<ArtifactFile> {
    if !path.exists() {
        return Err(TrainingError::NotFound(format!("artifact path does not exist: {}", path.display())));
    }

    let sha256 = sha256_file(&path)?;
    Ok(ArtifactFile { path, sha256 })
}

/// Plain copy of an artifact file, creating the destination's parent.
///
/// Not atomic across a crash; callers needing durability retry the copy.
pub fn copy_artifact(source: &Path, destination: &Path) -> TrainingResult<()> {
    if !source.exists() {
        return Err(TrainingError::NotFound(format!("artifact not found at {}", source.display())));
    }
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, destination)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_digest_is_stable_and_content_addressed() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.json");
        let b = temp.path().join("b.json");
        std::fs::write(&a, b"model-v1").unwrap();
        std::fs::write(&b, b"model-v1").unwrap();

        assert_eq!(sha256_file(&a).unwrap(), sha256_file(&b).unwrap());
        assert_eq!(describe_artifact(a).unwrap().sha256.len(), 64);
    }

    #[test]
    fn test_copy_missing_source_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = copy_artifact(&temp.path().join("missing"), &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, TrainingError::NotFound(_)));
    }
}
