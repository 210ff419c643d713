use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    /// Missing source artifact, dataset, or unknown version id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input: bad target column, single-class labels, bad step counts.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Duplicate version id on register.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation against an empty or uninitialized registry.
    #[error("invalid registry state: {0}")]
    State(String),

    /// Rollback past the start of the version history.
    #[error("out of range: {0}")]
    Range(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainingError {
    /// Stable lowercase tag for the error class, used in CLI output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::State(_) => "state",
            Self::Range(_) => "range",
            Self::Trainer(_) => "trainer",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Csv(_) => "csv",
            Self::Other(_) => "other",
        }
    }
}
