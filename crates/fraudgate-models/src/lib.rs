//! Fraudgate Models
//!
//! In-process estimators behind the `ModelTrainer` contract:
//! - `logistic_regression` and `random_forest` scorers
//! - Cross-validated grid search scored by ROC-AUC
//! - `model.json` artifact format and the serving-side `ActiveModel`

pub mod artifact;
pub mod candidates;
pub mod forest;
pub mod logistic;
mod params;
pub mod search;
pub mod serving;

pub use artifact::ModelArtifact;
pub use candidates::default_candidates;
pub use forest::{ForestModel, ForestParams};
pub use logistic::{LogisticModel, LogisticParams};
pub use search::{GridSearchTrainer, expand_grid, fit_estimator};
pub use serving::{ActiveModel, ScoreDecision};
