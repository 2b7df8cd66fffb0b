//! Seeded train/test partitioning

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::features::{select_labels, FeatureMatrix, LabelVector};

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Disjoint row indices covering every row, each list ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Matrix and labels materialised for both partitions
#[derive(Debug, Clone)]
pub struct SplitData {
    pub train_matrix: FeatureMatrix,
    pub train_labels: LabelVector,
    pub test_matrix: FeatureMatrix,
    pub test_labels: LabelVector,
}

impl Split {
    /// Copy out the rows of each partition
    pub fn apply(&self, matrix: &FeatureMatrix, labels: &[u8]) -> SplitData {
        SplitData {
            train_matrix: matrix.select(&self.train),
            train_labels: select_labels(labels, &self.train),
            test_matrix: matrix.select(&self.test),
            test_labels: select_labels(labels, &self.test),
        }
    }
}

/// Partition rows into train and test sets
///
/// The first `round(test_fraction * n)` indices of a seeded shuffle form the
/// test set. The same inputs and seed always give the same split.
pub fn split(
    matrix: &FeatureMatrix,
    labels: &[u8],
    test_fraction: f64,
    seed: u64,
) -> Result<Split> {
    if matrix.nrows() != labels.len() {
        return Err(Error::config(format!(
            "Matrix has {} rows but {} labels",
            matrix.nrows(),
            labels.len()
        )));
    }
    split_indices(labels.len(), test_fraction, seed)
}

/// Partition `0..n`; see [`split`]
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::config(format!(
            "Test fraction must be between 0 and 1 (exclusive), got {}",
            test_fraction
        )));
    }
    if n == 0 {
        return Err(Error::EmptyInput("No rows to split".to_string()));
    }

    let test_size = (n as f64 * test_fraction).round() as usize;
    if test_size == 0 || test_size == n {
        return Err(Error::config(format!(
            "Test fraction {} leaves an empty partition for {} rows",
            test_fraction, n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut test = indices[..test_size].to_vec();
    let mut train = indices[test_size..].to_vec();
    test.sort_unstable();
    train.sort_unstable();

    debug!(
        train = train.len(),
        test = test.len(),
        seed,
        "Split rows"
    );

    Ok(Split { train, test })
}
