//! Typed access to loosely typed hyperparameter maps.

use fraudgate_training::{Hyperparameters, TrainingError, TrainingResult};
use serde_json::Value;

fn invalid(name: &str, expected: &str, value: &Value) -> TrainingError {
    TrainingError::Validation(format!("hyperparameter '{name}' must be {expected}, got {value}"))
}

pub(crate) fn f64_param(params: &Hyperparameters, name: &str, default: f64) -> TrainingResult<f64> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| invalid(name, "a positive number", value)),
    }
}

pub(crate) fn usize_param(params: &Hyperparameters, name: &str, default: usize) -> TrainingResult<usize> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .filter(|v| *v >= 1)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| invalid(name, "an integer >= 1", value)),
    }
}

/// Like [`usize_param`], but `null` or `"none"` mean unlimited.
pub(crate) fn optional_usize_param(params: &Hyperparameters, name: &str) -> TrainingResult<Option<usize>> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("none") => Ok(None),
        Some(_) => usize_param(params, name, 1).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Hyperparameters {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_defaults_and_parsing() {
        let p = params(&[("C", json!(0.5)), ("n_estimators", json!(80)), ("max_depth", Value::Null)]);
        assert_eq!(f64_param(&p, "C", 1.0).unwrap(), 0.5);
        assert_eq!(f64_param(&p, "missing", 1.0).unwrap(), 1.0);
        assert_eq!(usize_param(&p, "n_estimators", 100).unwrap(), 80);
        assert_eq!(optional_usize_param(&p, "max_depth").unwrap(), None);
        assert_eq!(optional_usize_param(&params(&[("max_depth", json!("None"))]), "max_depth").unwrap(), None);
        assert_eq!(optional_usize_param(&params(&[("max_depth", json!(6))]), "max_depth").unwrap(), Some(6));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(f64_param(&params(&[("C", json!(-1.0))]), "C", 1.0).is_err());
        assert!(usize_param(&params(&[("n_estimators", json!(0))]), "n_estimators", 1).is_err());
        assert!(usize_param(&params(&[("n_estimators", json!("many"))]), "n_estimators", 1).is_err());
    }
}
