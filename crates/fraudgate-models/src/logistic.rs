//! Class-balanced, L2-regularized logistic regression on standardized features.

use crate::artifact::ModelArtifact;
use crate::params::{f64_param, usize_param};
use fraudgate_training::{FeatureRow, FittedScorer, Hyperparameters, LabeledFeatures, TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};

pub const ESTIMATOR: &str = "logistic_regression";
pub const PARAM_NAMES: [&str; 2] = ["C", "max_iter"];

const N_FEATURES: usize = 4;
/// Intercept plus one coefficient per feature.
const DIM: usize = N_FEATURES + 1;
const CONVERGENCE_TOLERANCE: f64 = 1e-8;
const MAX_NEWTON_STEP: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iter: usize,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self { c: 1.0, max_iter: 100 }
    }
}

impl LogisticParams {
    pub fn from_hyperparameters(params: &Hyperparameters) -> TrainingResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            c: f64_param(params, "C", defaults.c)?,
            max_iter: usize_param(params, "max_iter", defaults.max_iter)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub means: [f64; N_FEATURES],
    pub scales: [f64; N_FEATURES],
    /// Coefficients in standardized feature space.
    pub coefficients: [f64; N_FEATURES],
    pub intercept: f64,
}

impl LogisticModel {
    /// Penalized Newton iterations on
    /// `sum_i w_i * logloss_i + ||coef||^2 / (2C)`, with balanced class weights
    /// `w_c = n / (2 n_c)`. The intercept is not penalized.
    pub fn fit(data: &LabeledFeatures, params: &LogisticParams) -> TrainingResult<Self> {
        if data.class_count() < 2 {
            return Err(TrainingError::Trainer(format!("{ESTIMATOR} needs both classes in the training data")));
        }

        let vectors: Vec<[f64; N_FEATURES]> = data.rows.iter().map(FeatureRow::to_vector).collect();
        let (means, scales) = standardization(&vectors);
        let design: Vec<[f64; DIM]> = vectors.iter().map(|v| augmented(v, &means, &scales)).collect();

        let n = data.len() as f64;
        let positives = data.labels.iter().filter(|l| **l == 1).count() as f64;
        let class_weight = [n / (2.0 * (n - positives)), n / (2.0 * positives)];
        let penalty = 1.0 / params.c;

        let mut beta = [0.0; DIM];
        for iteration in 0..params.max_iter {
            let mut gradient = [0.0; DIM];
            let mut hessian = [[0.0; DIM]; DIM];

            for (x, label) in design.iter().zip(&data.labels) {
                let p = sigmoid(dot(&beta, x));
                let w = class_weight[usize::from(*label)];
                let residual = w * (p - f64::from(*label));
                let curvature = w * p * (1.0 - p);
                for j in 0..DIM {
                    gradient[j] += residual * x[j];
                    for k in 0..DIM {
                        hessian[j][k] += curvature * x[j] * x[k];
                    }
                }
            }
            for j in 1..DIM {
                gradient[j] += penalty * beta[j];
                hessian[j][j] += penalty;
            }
            // keeps the intercept direction invertible on separable data
            hessian[0][0] += 1e-9;

            let mut step = solve(hessian, gradient)
                .ok_or_else(|| TrainingError::Trainer(format!("{ESTIMATOR}: singular Hessian at iteration {iteration}")))?;
            let largest = step.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
            if largest > MAX_NEWTON_STEP {
                let scale = MAX_NEWTON_STEP / largest;
                step.iter_mut().for_each(|s| *s *= scale);
            }
            for (b, s) in beta.iter_mut().zip(step) {
                *b -= s;
            }
            if largest < CONVERGENCE_TOLERANCE {
                tracing::trace!(iteration, "logistic regression converged");
                break;
            }
        }

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(TrainingError::Trainer(format!("{ESTIMATOR}: fit diverged")));
        }

        let mut coefficients = [0.0; N_FEATURES];
        coefficients.copy_from_slice(&beta[1..]);
        Ok(Self { means, scales, coefficients, intercept: beta[0] })
    }

    #[must_use]
    pub fn decision_function(&self, row: &FeatureRow) -> f64 {
        let x = augmented(&row.to_vector(), &self.means, &self.scales);
        self.intercept + self.coefficients.iter().zip(&x[1..]).map(|(c, v)| c * v).sum::<f64>()
    }
}

impl FittedScorer for LogisticModel {
    fn estimator(&self) -> &str {
        ESTIMATOR
    }

    fn predict_proba(&self, row: &FeatureRow) -> f64 {
        sigmoid(self.decision_function(row)).clamp(0.0, 1.0)
    }

    fn to_artifact_json(&self) -> TrainingResult<serde_json::Value> {
        Ok(serde_json::to_value(ModelArtifact::LogisticRegression(self.clone()))?)
    }
}

fn standardization(vectors: &[[f64; N_FEATURES]]) -> ([f64; N_FEATURES], [f64; N_FEATURES]) {
    let n = vectors.len().max(1) as f64;
    let mut means = [0.0; N_FEATURES];
    for v in vectors {
        for (m, x) in means.iter_mut().zip(v) {
            *m += x / n;
        }
    }
    let mut scales = [0.0; N_FEATURES];
    for v in vectors {
        for j in 0..N_FEATURES {
            scales[j] += (v[j] - means[j]).powi(2) / n;
        }
    }
    for s in &mut scales {
        // constant columns pass through unscaled
        *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
    }
    (means, scales)
}

fn augmented(v: &[f64; N_FEATURES], means: &[f64; N_FEATURES], scales: &[f64; N_FEATURES]) -> [f64; DIM] {
    let mut x = [1.0; DIM];
    for j in 0..N_FEATURES {
        x[j + 1] = (v[j] - means[j]) / scales[j];
    }
    x
}

fn dot(a: &[f64; DIM], b: &[f64; DIM]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Gaussian elimination with partial pivoting. `None` if singular.
fn solve(mut a: [[f64; DIM]; DIM], mut b: [f64; DIM]) -> Option<[f64; DIM]> {
    for col in 0..DIM {
        let pivot = (col..DIM).max_by(|x, y| a[*x][col].abs().total_cmp(&a[*y][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..DIM {
            let factor = a[row][col] / a[col][col];
            for k in col..DIM {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; DIM];
    for row in (0..DIM).rev() {
        let tail: f64 = (row + 1..DIM).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
