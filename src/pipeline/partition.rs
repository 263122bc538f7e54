//! Stratified train/test partitioning and cross-validation folds.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Errors from partitioning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PartitionError {
    #[error("cannot partition an empty table")]
    Empty,

    #[error("outcome has a single class ({class}); a stratified split needs both")]
    SingleClass { class: bool },

    #[error("test fraction must be in (0, 1), got {fraction}")]
    InvalidFraction { fraction: f64 },

    #[error("class {class} has only {count} rows, too few to appear in both partitions")]
    DegenerateClass { class: bool, count: usize },

    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount { n_folds: usize },

    #[error("class {class} has only {count} rows, need at least {n_folds} for stratified folds")]
    TooFewForFolds {
        class: bool,
        count: usize,
        n_folds: usize,
    },
}

/// Disjoint, sorted train and test row indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn indices_by_class(outcome: &[bool]) -> (Vec<usize>, Vec<usize>) {
    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    for (i, &y) in outcome.iter().enumerate() {
        if y {
            positives.push(i);
        } else {
            negatives.push(i);
        }
    }
    (positives, negatives)
}

/// Hold out `round(n_class * test_fraction)` rows of each class.
///
/// # Errors
/// * `PartitionError::Empty` - No rows
/// * `PartitionError::InvalidFraction` - Fraction outside (0, 1)
/// * `PartitionError::SingleClass` - Outcome has one class
/// * `PartitionError::DegenerateClass` - A class would be absent from a partition
#[instrument(skip(outcome), fields(n_rows = outcome.len()))]
pub fn stratified_split(
    outcome: &[bool],
    test_fraction: f64,
    seed: u64,
) -> Result<Split, PartitionError> {
    if outcome.is_empty() {
        return Err(PartitionError::Empty);
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PartitionError::InvalidFraction {
            fraction: test_fraction,
        });
    }

    let (positives, negatives) = indices_by_class(outcome);
    if positives.is_empty() || negatives.is_empty() {
        return Err(PartitionError::SingleClass {
            class: !positives.is_empty(),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(outcome.len());
    let mut test = Vec::new();

    for (class, mut indices) in [(true, positives), (false, negatives)] {
        let n = indices.len();
        let n_test = (n as f64 * test_fraction).round() as usize;
        if n_test == 0 || n_test == n {
            return Err(PartitionError::DegenerateClass { class, count: n });
        }
        indices.shuffle(&mut rng);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    debug!(train = train.len(), test = test.len(), "Stratified split");
    Ok(Split { train, test })
}

/// Fold assignment per row: shuffle within each class, then round-robin.
pub fn stratified_folds(
    outcome: &[bool],
    n_folds: usize,
    seed: u64,
) -> Result<Vec<usize>, PartitionError> {
    if n_folds < 2 {
        return Err(PartitionError::InvalidFoldCount { n_folds });
    }
    if outcome.is_empty() {
        return Err(PartitionError::Empty);
    }

    let (positives, negatives) = indices_by_class(outcome);
    for (class, indices) in [(true, &positives), (false, &negatives)] {
        if !indices.is_empty() && indices.len() < n_folds {
            return Err(PartitionError::TooFewForFolds {
                class,
                count: indices.len(),
                n_folds,
            });
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut assignments = vec![0usize; outcome.len()];
    for mut indices in [positives, negatives] {
        indices.shuffle(&mut rng);
        for (j, &idx) in indices.iter().enumerate() {
            assignments[idx] = j % n_folds;
        }
    }
    Ok(assignments)
}
