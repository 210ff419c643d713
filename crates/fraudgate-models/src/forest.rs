//! Random forest of CART trees.
//!
//! Each tree is grown on a bootstrap sample with per-sample weights
//! `bootstrap_count * class_weight`, where class weights are balanced over the
//! bootstrap sample itself. Splits minimize weighted Gini impurity over a
//! random subset of `sqrt(n_features)` features. Trees are fitted in parallel
//! but seeded per tree, so results do not depend on scheduling.

use crate::artifact::ModelArtifact;
use crate::params::{optional_usize_param, usize_param};
use fraudgate_training::{FeatureRow, FittedScorer, Hyperparameters, LabeledFeatures, TrainingError, TrainingResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const ESTIMATOR: &str = "random_forest";
pub const PARAM_NAMES: [&str; 4] = ["n_estimators", "max_depth", "min_samples_leaf", "min_samples_split"];

const N_FEATURES: usize = 4;
/// `sqrt(N_FEATURES)`.
const MAX_FEATURES: usize = 2;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self { n_estimators: 100, max_depth: None, min_samples_leaf: 1, min_samples_split: 2, seed: DEFAULT_SEED }
    }
}

impl ForestParams {
    pub fn from_hyperparameters(params: &Hyperparameters) -> TrainingResult<Self> {
        let defaults = Self::default();
        let parsed = Self {
            n_estimators: usize_param(params, "n_estimators", defaults.n_estimators)?,
            max_depth: optional_usize_param(params, "max_depth")?,
            min_samples_leaf: usize_param(params, "min_samples_leaf", defaults.min_samples_leaf)?,
            min_samples_split: usize_param(params, "min_samples_split", defaults.min_samples_split)?,
            seed: defaults.seed,
        };
        if parsed.min_samples_split < 2 {
            return Err(TrainingError::Validation("hyperparameter 'min_samples_split' must be >= 2".to_string()));
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `value <= threshold` go left.
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { probability: f64 },
}

/// Flattened tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    #[must_use]
    pub fn predict(&self, x: &[f64; N_FEATURES]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { probability }) => return *probability,
                None => return 0.0,
            }
        }
    }

    /// Number of split levels on the longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match self.nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
                _ => deepest = deepest.max(depth),
            }
        }
        deepest
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<DecisionTree>,
}

impl ForestModel {
    pub fn fit(data: &LabeledFeatures, params: &ForestParams) -> TrainingResult<Self> {
        if data.class_count() < 2 {
            return Err(TrainingError::Trainer(format!("{ESTIMATOR} needs both classes in the training data")));
        }

        let samples: Vec<[f64; N_FEATURES]> = data.rows.iter().map(FeatureRow::to_vector).collect();
        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(tree_idx as u64));
                TreeBuilder { samples: &samples, labels: &data.labels, params }.grow(&mut rng)
            })
            .collect();

        Ok(Self { trees })
    }
}

impl FittedScorer for ForestModel {
    fn estimator(&self) -> &str {
        ESTIMATOR
    }

    fn predict_proba(&self, row: &FeatureRow) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let x = row.to_vector();
        let total: f64 = self.trees.iter().map(|tree| tree.predict(&x)).sum();
        (total / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    fn to_artifact_json(&self) -> TrainingResult<serde_json::Value> {
        Ok(serde_json::to_value(ModelArtifact::RandomForest(self.clone()))?)
    }
}

struct TreeBuilder<'a> {
    samples: &'a [[f64; N_FEATURES]],
    labels: &'a [u8],
    params: &'a ForestParams,
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl TreeBuilder<'_> {
    fn grow(&self, rng: &mut StdRng) -> DecisionTree {
        let n = self.samples.len();
        let mut counts = vec![0u32; n];
        for _ in 0..n {
            counts[rng.gen_range(0..n)] += 1;
        }

        let mut class_totals = [0.0_f64; 2];
        for (count, label) in counts.iter().zip(self.labels) {
            class_totals[usize::from(*label)] += f64::from(*count);
        }
        let drawn = class_totals[0] + class_totals[1];
        let class_weight = class_totals.map(|total| if total > 0.0 { drawn / (2.0 * total) } else { 0.0 });

        let weights: Vec<f64> = counts
            .iter()
            .zip(self.labels)
            .map(|(count, label)| f64::from(*count) * class_weight[usize::from(*label)])
            .collect();
        let root: Vec<usize> = (0..n).filter(|idx| counts[*idx] > 0).collect();

        let mut nodes = vec![TreeNode::Leaf { probability: 0.0 }];
        let mut stack = vec![(0usize, root, 0usize)];
        while let Some((node_idx, members, depth)) = stack.pop() {
            let (w0, w1) = self.class_weights(&members, &weights);
            let probability = if w0 + w1 > 0.0 { w1 / (w0 + w1) } else { 0.0 };

            let at_depth_limit = self.params.max_depth.is_some_and(|max| depth >= max);
            let too_small =
                members.len() < self.params.min_samples_split || members.len() < 2 * self.params.min_samples_leaf;
            let pure = w0 <= 0.0 || w1 <= 0.0;
            let split = if at_depth_limit || too_small || pure { None } else { self.best_split(&members, &weights, rng) };

            match split {
                None => nodes[node_idx] = TreeNode::Leaf { probability },
                Some(split) => {
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(TreeNode::Leaf { probability: 0.0 });
                    nodes.push(TreeNode::Leaf { probability: 0.0 });
                    nodes[node_idx] = TreeNode::Split { feature: split.feature, threshold: split.threshold, left, right };
                    stack.push((left, split.left, depth + 1));
                    stack.push((right, split.right, depth + 1));
                }
            }
        }
        DecisionTree { nodes }
    }

    fn class_weights(&self, members: &[usize], weights: &[f64]) -> (f64, f64) {
        members.iter().fold((0.0, 0.0), |(w0, w1), idx| {
            if self.labels[*idx] == 1 { (w0, w1 + weights[*idx]) } else { (w0 + weights[*idx], w1) }
        })
    }

    /// Keeps inspecting features past `MAX_FEATURES` until one valid split exists.
    fn best_split(&self, members: &[usize], weights: &[f64], rng: &mut StdRng) -> Option<Split> {
        let mut features: [usize; N_FEATURES] = [0, 1, 2, 3];
        features.shuffle(rng);

        let mut best: Option<Split> = None;
        let mut visited = 0;
        for feature in features {
            if visited >= MAX_FEATURES && best.is_some() {
                break;
            }
            let mut sorted = members.to_vec();
            sorted.sort_by(|a, b| self.samples[*a][feature].total_cmp(&self.samples[*b][feature]));
            let first = self.samples[sorted[0]][feature];
            let last = self.samples[sorted[sorted.len() - 1]][feature];
            if first >= last {
                continue;
            }
            visited += 1;

            if let Some(candidate) = self.scan_feature(feature, &sorted, weights) {
                if best.as_ref().is_none_or(|b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn scan_feature(&self, feature: usize, sorted: &[usize], weights: &[f64]) -> Option<Split> {
        let (total0, total1) = self.class_weights(sorted, weights);
        let min_leaf = self.params.min_samples_leaf;
        let n = sorted.len();

        let (mut left0, mut left1) = (0.0, 0.0);
        let mut best: Option<(usize, f64)> = None;
        for pos in 0..n - 1 {
            let idx = sorted[pos];
            if self.labels[idx] == 1 {
                left1 += weights[idx];
            } else {
                left0 += weights[idx];
            }

            let value = self.samples[idx][feature];
            let next = self.samples[sorted[pos + 1]][feature];
            if value >= next {
                continue;
            }
            let left_count = pos + 1;
            if left_count < min_leaf || n - left_count < min_leaf {
                continue;
            }

            let impurity = weighted_gini(left0, left1) + weighted_gini(total0 - left0, total1 - left1);
            if best.is_none_or(|(_, b)| impurity < b) {
                best = Some((pos, impurity));
            }
        }

        let (pos, impurity) = best?;
        let low = self.samples[sorted[pos]][feature];
        let high = self.samples[sorted[pos + 1]][feature];
        let mut threshold = low + (high - low) / 2.0;
        if threshold >= high {
            threshold = low;
        }
        Some(Split {
            feature,
            threshold,
            impurity,
            left: sorted[..=pos].to_vec(),
            right: sorted[pos + 1..].to_vec(),
        })
    }
}

/// Gini impurity scaled by node weight: `w * (1 - p0^2 - p1^2)`.
fn weighted_gini(w0: f64, w1: f64) -> f64 {
    let total = w0 + w1;
    if total <= 0.0 {
        return 0.0;
    }
    total - (w0 * w0 + w1 * w1) / total
}
