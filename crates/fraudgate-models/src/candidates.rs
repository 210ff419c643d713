use crate::{forest, logistic};
use fraudgate_training::{CandidateSpec, ParamGrid};
use serde_json::{Value, json};

fn grid(entries: Vec<(&str, Vec<Value>)>) -> ParamGrid {
    entries.into_iter().map(|(name, values)| (name.to_string(), values)).collect()
}

/// Logistic regression and random forest search spaces. `quick_mode` trades
/// search breadth for runtime.
#[must_use]
pub fn default_candidates(quick_mode: bool) -> Vec<CandidateSpec> {
    let logistic_grid = if quick_mode {
        grid(vec![("C", vec![json!(0.5), json!(1.0)])])
    } else {
        grid(vec![("C", vec![json!(0.25), json!(0.5), json!(1.0), json!(2.0), json!(4.0)])])
    };

    let forest_grid = if quick_mode {
        grid(vec![
            ("n_estimators", vec![json!(80)]),
            ("max_depth", vec![json!(6), Value::Null]),
            ("min_samples_leaf", vec![json!(1)]),
            ("min_samples_split", vec![json!(2)]),
        ])
    } else {
        grid(vec![
            ("n_estimators", vec![json!(150), json!(250)]),
            ("max_depth", vec![json!(6), json!(10), Value::Null]),
            ("min_samples_leaf", vec![json!(1), json!(3), json!(5)]),
            ("min_samples_split", vec![json!(2), json!(6)]),
        ])
    };

    vec![
        CandidateSpec {
            name: logistic::ESTIMATOR.to_string(),
            estimator: logistic::ESTIMATOR.to_string(),
            param_grid: logistic_grid,
        },
        CandidateSpec {
            name: forest::ESTIMATOR.to_string(),
            estimator: forest::ESTIMATOR.to_string(),
            param_grid: forest_grid,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::expand_grid;

    #[test]
    fn test_grid_sizes() {
        let quick = default_candidates(true);
        let full = default_candidates(false);

        assert_eq!(quick.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["logistic_regression", "random_forest"]);
        assert_eq!(expand_grid(&quick[0].param_grid).unwrap().len(), 2);
        assert_eq!(expand_grid(&quick[1].param_grid).unwrap().len(), 2);
        assert_eq!(expand_grid(&full[0].param_grid).unwrap().len(), 5);
        assert_eq!(expand_grid(&full[1].param_grid).unwrap().len(), 36);
    }
}
