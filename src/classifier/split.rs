//! Stratified train/test split.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::category::CategoryLabel;
use crate::error::{MailsiftError, Result};

/// Row indices of the training and test partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so each label keeps its share in both partitions.
///
/// For every label, its rows are shuffled with a generator seeded from
/// `seed` and `round(count × test_fraction)` of them go to the test side,
/// clamped so that both sides get at least one row. Labels with a single
/// row cannot be stratified and are rejected. Both index lists are returned
/// sorted.
pub fn stratified_split(
    labels: &[CategoryLabel],
    test_fraction: f64,
    seed: u64,
) -> Result<DatasetSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(MailsiftError::invalid_argument(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if labels.is_empty() {
        return Err(MailsiftError::training_data("no labeled rows to split"));
    }

    let mut by_label: BTreeMap<CategoryLabel, Vec<usize>> = BTreeMap::new();
    for (row, label) in labels.iter().enumerate() {
        by_label.entry(*label).or_default().push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (label, mut rows) in by_label {
        if rows.len() < 2 {
            return Err(MailsiftError::training_data(format!(
                "category {label} has only {} example; at least 2 are needed to stratify",
                rows.len()
            )));
        }

        rows.shuffle(&mut rng);
        let n_test = ((rows.len() as f64 * test_fraction).round() as usize).clamp(1, rows.len() - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    Ok(DatasetSplit { train, test })
}
