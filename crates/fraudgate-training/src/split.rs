use crate::error::{TrainingError, TrainingResult};
use crate::features::LabeledFeatures;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Train/held-out partition of a labeled feature table.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: LabeledFeatures,
    pub test: LabeledFeatures,
}

/// Stratified shuffle split.
///
/// Each class contributes `round(n_c * test_size)` rows to the held-out split,
/// clamped to `[1, n_c - 1]` when the class has at least two rows so both
/// sides see every class. Selected rows keep their original relative order.
pub fn stratified_split(data: &LabeledFeatures, test_size: f64, seed: u64) -> TrainingResult<TrainTestSplit> {
    if !(test_size.is_finite() && test_size > 0.0 && test_size < 1.0) {
        return Err(TrainingError::Validation(format!("test_size must be in (0, 1), got {test_size}")));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::with_capacity(data.len());
    let mut test_idx = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = data
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(idx, _)| idx)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);

        let n = members.len();
        let mut n_test = (n as f64 * test_size).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        } else {
            n_test = 0;
        }

        test_idx.extend_from_slice(&members[..n_test]);
        train_idx.extend_from_slice(&members[n_test..]);
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();

    Ok(TrainTestSplit { train: data.select(&train_idx), test: data.select(&test_idx) })
}

/// Stratified k-fold assignment; returns `(train, validation)` index sets per fold.
pub fn stratified_folds(labels: &[u8], folds: usize, seed: u64) -> TrainingResult<Vec<(Vec<usize>, Vec<usize>)>> {
    if folds < 2 {
        return Err(TrainingError::Validation(format!("cross-validation needs at least 2 folds, got {folds}")));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; labels.len()];

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(idx, _)| idx)
            .collect();
        if !members.is_empty() && members.len() < folds {
            return Err(TrainingError::Validation(format!(
                "class {class} has {} rows, fewer than the {folds} cross-validation folds",
                members.len()
            )));
        }
        members.shuffle(&mut rng);
        for (pos, idx) in members.into_iter().enumerate() {
            assignment[idx] = pos % folds;
        }
    }

    Ok((0..folds)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|idx| assignment[*idx] == fold);
            (train, validation)
        })
        .collect())
}
