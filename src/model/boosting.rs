//! Bernoulli gradient boosting.
//!
//! Each iteration fits a [`RegressionTree`] to the residuals `y - p` on a
//! random half-sample (without replacement) of the training rows, with
//! Newton-step leaf values. Predictions are `init + shrinkage * sum(trees)`
//! on the log-odds scale.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::ModelError;
use super::tree::{grow_tree, BinnedMatrix, RegressionTree, TreeParams};
use crate::pipeline::features::FeatureMatrix;

/// Hyperparameters for one boosted ensemble.
///
/// Construct with [`BoostingParams::default`] and chain `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_trees: usize,
    /// Splits per tree.
    pub interaction_depth: usize,
    pub shrinkage: f64,
    /// Minimum training rows per leaf.
    pub min_leaf: usize,
    /// Share of rows sampled for each tree.
    pub bag_fraction: f64,
    pub max_bins: usize,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            interaction_depth: 3,
            shrinkage: 0.05,
            min_leaf: 20,
            bag_fraction: 0.5,
            max_bins: 256,
            seed: 42,
        }
    }
}

impl BoostingParams {
    #[must_use]
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    #[must_use]
    pub fn with_interaction_depth(mut self, depth: usize) -> Self {
        self.interaction_depth = depth;
        self
    }

    #[must_use]
    pub fn with_shrinkage(mut self, shrinkage: f64) -> Self {
        self.shrinkage = shrinkage;
        self
    }

    #[must_use]
    pub fn with_min_leaf(mut self, min_leaf: usize) -> Self {
        self.min_leaf = min_leaf;
        self
    }

    #[must_use]
    pub fn with_bag_fraction(mut self, fraction: f64) -> Self {
        self.bag_fraction = fraction;
        self
    }

    #[must_use]
    pub fn with_max_bins(mut self, max_bins: usize) -> Self {
        self.max_bins = max_bins;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::InvalidTreeCount`] | `n_trees == 0` |
    /// | [`ModelError::InvalidDepth`] | `interaction_depth == 0` |
    /// | [`ModelError::InvalidShrinkage`] | shrinkage outside (0, 1] |
    /// | [`ModelError::InvalidBagFraction`] | bag fraction outside (0, 1] |
    /// | [`ModelError::InvalidMinLeaf`] | `min_leaf == 0` |
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_trees == 0 {
            return Err(ModelError::InvalidTreeCount {
                n_trees: self.n_trees,
            });
        }
        if self.interaction_depth == 0 {
            return Err(ModelError::InvalidDepth {
                depth: self.interaction_depth,
            });
        }
        if !(self.shrinkage > 0.0 && self.shrinkage <= 1.0) {
            return Err(ModelError::InvalidShrinkage {
                shrinkage: self.shrinkage,
            });
        }
        if !(self.bag_fraction > 0.0 && self.bag_fraction <= 1.0) {
            return Err(ModelError::InvalidBagFraction {
                fraction: self.bag_fraction,
            });
        }
        if self.min_leaf == 0 {
            return Err(ModelError::InvalidMinLeaf {
                min_leaf: self.min_leaf,
            });
        }
        Ok(())
    }
}

fn sigmoid(f: f64) -> f64 {
    1.0 / (1.0 + (-f).exp())
}

/// Fitted boosted-tree binary classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedClassifier {
    params: BoostingParams,
    init_score: f64,
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
}

impl BoostedClassifier {
    /// Fit to `x` and binary outcome `y`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::EmptyDataset`] | Zero rows |
    /// | [`ModelError::ZeroFeatures`] | Zero columns |
    /// | [`ModelError::OutcomeLengthMismatch`] | `y.len() != x.n_rows()` |
    /// | [`ModelError::SingleClass`] | `y` has one class |
    /// | [`ModelError::NonFinite`] | Gradients or leaf values overflow |
    /// | Parameter errors | From [`BoostingParams::validate`] |
    #[instrument(skip_all, fields(
        n_trees = params.n_trees,
        depth = params.interaction_depth,
        shrinkage = params.shrinkage,
        n_rows = x.n_rows(),
    ))]
    pub fn fit(x: &FeatureMatrix, y: &[bool], params: &BoostingParams) -> Result<Self, ModelError> {
        params.validate()?;
        let n = x.n_rows();
        if n == 0 {
            return Err(ModelError::EmptyDataset);
        }
        if x.n_features() == 0 {
            return Err(ModelError::ZeroFeatures);
        }
        if y.len() != n {
            return Err(ModelError::OutcomeLengthMismatch {
                expected: n,
                got: y.len(),
            });
        }
        let positives = y.iter().filter(|&&v| v).count();
        if positives == 0 || positives == n {
            return Err(ModelError::SingleClass);
        }

        let binned = BinnedMatrix::from_matrix(x, params.max_bins);
        let targets: Vec<f64> = y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
        let p0 = positives as f64 / n as f64;
        let init_score = (p0 / (1.0 - p0)).ln();

        let bag_size = ((n as f64 * params.bag_fraction).round() as usize).clamp(1, n);
        let tree_params = TreeParams {
            max_splits: params.interaction_depth,
            min_leaf: params.min_leaf,
        };

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut scores = vec![init_score; n];
        let mut gradients = vec![0.0; n];
        let mut hessians = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_trees);

        for iteration in 0..params.n_trees {
            for i in 0..n {
                let p = sigmoid(scores[i]);
                gradients[i] = targets[i] - p;
                hessians[i] = p * (1.0 - p);
            }
            if gradients.iter().any(|g| !g.is_finite()) {
                return Err(ModelError::NonFinite {
                    quantity: "gradient",
                    iteration,
                });
            }

            let mut bag = if bag_size == n {
                (0..n).collect::<Vec<_>>()
            } else {
                rand::seq::index::sample(&mut rng, n, bag_size).into_vec()
            };
            bag.sort_unstable();

            let tree = grow_tree(&binned, &gradients, &hessians, bag, tree_params);
            if tree.leaf_values().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite {
                    quantity: "leaf value",
                    iteration,
                });
            }

            for (i, score) in scores.iter_mut().enumerate() {
                *score += params.shrinkage * tree.predict_row(x, i);
            }
            trees.push(tree);
        }

        debug!(trees = trees.len(), init_score, "Boosting complete");
        Ok(Self {
            params: params.clone(),
            init_score,
            trees,
            feature_names: x.names().to_vec(),
        })
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn check_features(&self, x: &FeatureMatrix) -> Result<(), ModelError> {
        if x.n_features() != self.feature_names.len() {
            return Err(ModelError::PredictionFeatureMismatch {
                expected: self.feature_names.len(),
                got: x.n_features(),
            });
        }
        Ok(())
    }

    /// Probability of the positive class for every row.
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        self.check_features(x)?;
        Ok((0..x.n_rows())
            .map(|row| {
                let f = self.trees.iter().fold(self.init_score, |acc, tree| {
                    acc + self.params.shrinkage * tree.predict_row(x, row)
                });
                sigmoid(f)
            })
            .collect())
    }

    /// Probabilities after the first `k` trees for each `k` in `checkpoints`.
    ///
    /// Checkpoints beyond the ensemble size are clamped to it. Output is
    /// indexed `[checkpoint][row]`.
    pub fn staged_probabilities(
        &self,
        x: &FeatureMatrix,
        checkpoints: &[usize],
    ) -> Result<Vec<Vec<f64>>, ModelError> {
        self.check_features(x)?;
        let n = x.n_rows();
        let mut order: Vec<usize> = (0..checkpoints.len()).collect();
        order.sort_by_key(|&i| checkpoints[i]);

        let mut staged = vec![Vec::new(); checkpoints.len()];
        let mut scores = vec![self.init_score; n];
        let mut applied = 0;

        for i in order {
            let target = checkpoints[i].min(self.trees.len());
            while applied < target {
                let tree = &self.trees[applied];
                for (row, score) in scores.iter_mut().enumerate() {
                    *score += self.params.shrinkage * tree.predict_row(x, row);
                }
                applied += 1;
            }
            staged[i] = scores.iter().map(|&f| sigmoid(f)).collect();
        }

        Ok(staged)
    }
}
