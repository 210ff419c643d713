//! Exhaustive grid search with stratified k-fold cross-validation.

use crate::forest::{self, ForestModel, ForestParams};
use crate::logistic::{self, LogisticModel, LogisticParams};
use fraudgate_training::{
    CandidateSpec, FittedScorer, Hyperparameters, LabeledFeatures, ModelTrainer, ParamGrid, SearchOutcome,
    TrainingError, TrainingResult, roc_auc, stratified_folds,
};

pub const DEFAULT_FOLDS: usize = 3;
pub const DEFAULT_SEED: u64 = 42;

/// Every grid point, keys in sorted order with the last key varying fastest.
/// An empty grid yields a single empty point.
pub fn expand_grid(grid: &ParamGrid) -> TrainingResult<Vec<Hyperparameters>> {
    let mut points = vec![Hyperparameters::new()];
    for (name, values) in grid {
        if values.is_empty() {
            return Err(TrainingError::Validation(format!("parameter grid entry '{name}' has no values")));
        }
        points = points
            .into_iter()
            .flat_map(|point| {
                values.iter().map(move |value| {
                    let mut next = point.clone();
                    next.insert(name.clone(), value.clone());
                    next
                })
            })
            .collect();
    }
    Ok(points)
}

/// Fit one estimator at one grid point.
pub fn fit_estimator(
    estimator: &str,
    params: &Hyperparameters,
    data: &LabeledFeatures,
) -> TrainingResult<Box<dyn FittedScorer>> {
    let known: &[&str] = match estimator {
        logistic::ESTIMATOR => &logistic::PARAM_NAMES,
        forest::ESTIMATOR => &forest::PARAM_NAMES,
        other => return Err(TrainingError::Trainer(format!("unknown estimator '{other}'"))),
    };
    if let Some(unknown) = params.keys().find(|key| !known.contains(&key.as_str())) {
        return Err(TrainingError::Validation(format!("estimator '{estimator}' has no parameter '{unknown}'")));
    }

    match estimator {
        logistic::ESTIMATOR => {
            Ok(Box::new(LogisticModel::fit(data, &LogisticParams::from_hyperparameters(params)?)?))
        }
        _ => Ok(Box::new(ForestModel::fit(data, &ForestParams::from_hyperparameters(params)?)?)),
    }
}

/// In-process [`ModelTrainer`] backed by the estimators in this crate.
#[derive(Debug, Clone)]
pub struct GridSearchTrainer {
    folds: usize,
    seed: u64,
}

impl Default for GridSearchTrainer {
    fn default() -> Self {
        Self { folds: DEFAULT_FOLDS, seed: DEFAULT_SEED }
    }
}

impl GridSearchTrainer {
    #[must_use]
    pub fn new(folds: usize, seed: u64) -> Self {
        Self { folds, seed }
    }
}

impl ModelTrainer for GridSearchTrainer {
    fn id(&self) -> &'static str {
        "grid_search"
    }

    /// Best mean validation ROC-AUC wins; the earliest grid point keeps a tie.
    fn fit_search(&self, spec: &CandidateSpec, train: &LabeledFeatures) -> TrainingResult<SearchOutcome> {
        let points = expand_grid(&spec.param_grid)?;
        let folds = stratified_folds(&train.labels, self.folds, self.seed)?;
        let fold_data: Vec<(LabeledFeatures, LabeledFeatures)> =
            folds.iter().map(|(fit_idx, val_idx)| (train.select(fit_idx), train.select(val_idx))).collect();

        let mut best: Option<(usize, f64)> = None;
        for (point_idx, point) in points.iter().enumerate() {
            let mut total = 0.0;
            for (fit, validation) in &fold_data {
                let scorer = fit_estimator(&spec.estimator, point, fit)?;
                total += roc_auc(&validation.labels, &scorer.predict_proba_batch(&validation.rows));
            }
            let mean = total / fold_data.len() as f64;
            tracing::debug!(candidate = %spec.name, params = ?point, cv_roc_auc = mean, "grid point scored");

            if best.is_none_or(|(_, score)| mean > score) {
                best = Some((point_idx, mean));
            }
        }

        let (best_idx, cv_best_roc_auc) =
            best.ok_or_else(|| TrainingError::Trainer(format!("no grid points for '{}'", spec.name)))?;
        let best_hyperparameters = points[best_idx].clone();
        let scorer = fit_estimator(&spec.estimator, &best_hyperparameters, train)?;

        tracing::info!(
            candidate = %spec.name,
            grid_points = points.len(),
            cv_best_roc_auc,
            "grid search finished"
        );
        Ok(SearchOutcome { scorer, best_hyperparameters, cv_best_roc_auc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudgate_training::{FeatureSource, SyntheticFeatureSource};
    use serde_json::json;

    fn grid(entries: &[(&str, Vec<serde_json::Value>)]) -> ParamGrid {
        entries.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    fn spec(estimator: &str, param_grid: ParamGrid) -> CandidateSpec {
        CandidateSpec { name: estimator.to_string(), estimator: estimator.to_string(), param_grid }
    }

    fn synthetic(size: usize) -> LabeledFeatures {
        SyntheticFeatureSource::new(size, 17).load().unwrap().0
    }

    #[test]
    fn test_expand_grid_order() {
        let points = expand_grid(&grid(&[("b", vec![json!(1), json!(2)]), ("a", vec![json!("x"), json!("y")])])).unwrap();

        assert_eq!(points.len(), 4);
        assert_eq!(points[0]["a"], "x");
        assert_eq!(points[0]["b"], 1);
        assert_eq!(points[1]["a"], "x");
        assert_eq!(points[1]["b"], 2);
        assert_eq!(points[3]["a"], "y");
        assert_eq!(expand_grid(&ParamGrid::new()).unwrap(), vec![Hyperparameters::new()]);
        assert!(expand_grid(&grid(&[("a", vec![])])).is_err());
    }

    #[test]
    fn test_grid_search_tie_keeps_first_point() {
        // Newton converges well inside either cap, so both points score the same
        let trainer = GridSearchTrainer::default();
        let outcome = trainer
            .fit_search(&spec("logistic_regression", grid(&[("max_iter", vec![json!(100), json!(200)])])), &synthetic(600))
            .unwrap();

        assert_eq!(outcome.best_hyperparameters["max_iter"], 100);
        assert!(outcome.cv_best_roc_auc > 0.6 && outcome.cv_best_roc_auc <= 1.0);
        assert_eq!(outcome.scorer.estimator(), "logistic_regression");
    }

    #[test]
    fn test_forest_search_refits_best_point() {
        let trainer = GridSearchTrainer::default();
        let candidate = spec(
            "random_forest",
            grid(&[("n_estimators", vec![json!(10)]), ("max_depth", vec![json!(2), json!(5)])]),
        );
        let outcome = trainer.fit_search(&candidate, &synthetic(500)).unwrap();

        assert_eq!(outcome.best_hyperparameters.len(), 2);
        assert_eq!(outcome.scorer.estimator(), "random_forest");
        let artifact = outcome.scorer.to_artifact_json().unwrap();
        assert_eq!(artifact["trees"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_unknown_estimator_and_parameter() {
        let trainer = GridSearchTrainer::default();
        let data = synthetic(200);

        let err = trainer.fit_search(&spec("svm", ParamGrid::new()), &data).unwrap_err();
        assert!(matches!(err, TrainingError::Trainer(_)));

        let err = trainer
            .fit_search(&spec("logistic_regression", grid(&[("solver", vec![json!("lbfgs")])])), &data)
            .unwrap_err();
        assert!(matches!(err, TrainingError::Validation(_)));
    }
}
