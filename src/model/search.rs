//! Cross-validated grid search over boosting hyperparameters.
//!
//! Each (depth, shrinkage, fold) task fits one ensemble of the largest tree
//! count and scores it at every tree-count checkpoint, so the tree-count axis
//! of the grid costs a single fit. Tasks run on a dedicated rayon pool.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::boosting::{BoostedClassifier, BoostingParams};
use super::error::ModelError;
use crate::equity::metrics::{accuracy, roc_auc, DEFAULT_THRESHOLD};
use crate::pipeline::features::FeatureMatrix;
use crate::pipeline::partition::stratified_folds;
use crate::utils::progress_bar_or_hidden;

/// Score used to rank grid combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum SelectionMetric {
    /// Share of correct predictions at threshold 0.5.
    #[default]
    Accuracy,
    /// Area under the ROC curve.
    #[value(name = "auc")]
    RocAuc,
}

impl SelectionMetric {
    pub fn name(self) -> &'static str {
        match self {
            SelectionMetric::Accuracy => "accuracy",
            SelectionMetric::RocAuc => "auc",
        }
    }

    /// Score a fold. `NaN` when undefined.
    pub fn score(self, probabilities: &[f64], truth: &[bool]) -> f64 {
        let score = match self {
            SelectionMetric::Accuracy => accuracy(probabilities, truth, DEFAULT_THRESHOLD),
            SelectionMetric::RocAuc => roc_auc(probabilities, truth),
        };
        score.unwrap_or(f64::NAN)
    }
}

/// Hyperparameter values to search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchGrid {
    pub n_trees: Vec<usize>,
    pub depths: Vec<usize>,
    pub shrinkages: Vec<f64>,
}

impl Default for SearchGrid {
    fn default() -> Self {
        Self {
            n_trees: Self::tree_steps(2500, 100),
            depths: vec![2, 3, 4],
            shrinkages: vec![0.025, 0.05, 0.1],
        }
    }
}

impl SearchGrid {
    /// `step, 2*step, ..` up to and including `max` when it is a multiple.
    pub fn tree_steps(max: usize, step: usize) -> Vec<usize> {
        if step == 0 {
            return vec![max];
        }
        (1..=max / step).map(|k| k * step).collect()
    }

    pub fn max_trees(&self) -> usize {
        self.n_trees.iter().copied().max().unwrap_or(0)
    }

    /// Number of (n_trees, depth, shrinkage) combinations.
    pub fn len(&self) -> usize {
        self.n_trees.len() * self.depths.len() * self.shrinkages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Grid search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub grid: SearchGrid,
    pub n_folds: usize,
    pub min_leaf: usize,
    pub bag_fraction: f64,
    pub max_bins: usize,
    pub metric: SelectionMetric,
    /// Worker threads; 1 runs sequentially.
    pub workers: usize,
    pub seed: u64,
    #[serde(skip)]
    pub show_progress: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            grid: SearchGrid::default(),
            n_folds: 5,
            min_leaf: 20,
            bag_fraction: 0.5,
            max_bins: 256,
            metric: SelectionMetric::Accuracy,
            workers: 1,
            seed: 42,
            show_progress: false,
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn with_grid(mut self, grid: SearchGrid) -> Self {
        self.grid = grid;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: SelectionMetric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    #[must_use]
    pub fn with_min_leaf(mut self, min_leaf: usize) -> Self {
        self.min_leaf = min_leaf;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Boosting parameters for one combination.
    pub fn params(&self, n_trees: usize, depth: usize, shrinkage: f64) -> BoostingParams {
        BoostingParams::default()
            .with_n_trees(n_trees)
            .with_interaction_depth(depth)
            .with_shrinkage(shrinkage)
            .with_min_leaf(self.min_leaf)
            .with_bag_fraction(self.bag_fraction)
            .with_max_bins(self.max_bins)
            .with_seed(self.seed)
    }
}

/// Cross-validated score of one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub n_trees: usize,
    pub interaction_depth: usize,
    pub shrinkage: f64,
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
}

/// A (depth, shrinkage) pair excluded because a fold failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCombination {
    pub interaction_depth: usize,
    pub shrinkage: f64,
    pub reason: String,
}

/// Outcome of a grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub metric: SelectionMetric,
    pub best: CandidateScore,
    /// Scored combinations in grid order.
    pub candidates: Vec<CandidateScore>,
    pub failed: Vec<FailedCombination>,
}

#[derive(Debug, Clone, Copy)]
struct Task {
    depth_idx: usize,
    shrinkage_idx: usize,
    fold: usize,
}

fn run_task(
    x: &FeatureMatrix,
    y: &[bool],
    folds: &[usize],
    task: Task,
    config: &SearchConfig,
    checkpoints: &[usize],
) -> Result<Vec<f64>, ModelError> {
    let train_rows: Vec<usize> = (0..y.len()).filter(|&i| folds[i] != task.fold).collect();
    let valid_rows: Vec<usize> = (0..y.len()).filter(|&i| folds[i] == task.fold).collect();

    let x_train = x.select_rows(&train_rows);
    let y_train: Vec<bool> = train_rows.iter().map(|&i| y[i]).collect();
    let x_valid = x.select_rows(&valid_rows);
    let y_valid: Vec<bool> = valid_rows.iter().map(|&i| y[i]).collect();

    let params = config
        .params(
            config.grid.max_trees(),
            config.grid.depths[task.depth_idx],
            config.grid.shrinkages[task.shrinkage_idx],
        )
        .with_seed(config.seed.wrapping_add(task.fold as u64));

    let model = BoostedClassifier::fit(&x_train, &y_train, &params)?;
    let staged = model.staged_probabilities(&x_valid, checkpoints)?;
    Ok(staged
        .iter()
        .map(|probabilities| config.metric.score(probabilities, &y_valid))
        .collect())
}

/// Run k-fold cross-validated grid search and pick the best combination.
///
/// Ties go to the combination that comes first in grid order (depth, then
/// shrinkage, then tree count). A combination with any failed fold is
/// excluded.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::EmptyGrid`] | No combinations |
/// | [`ModelError::Partition`] | Folds cannot be formed |
/// | [`ModelError::ThreadPool`] | Worker pool creation failed |
/// | [`ModelError::AllCandidatesFailed`] | No combination produced a score |
#[instrument(skip_all, fields(
    n_rows = x.n_rows(),
    n_features = x.n_features(),
    combinations = config.grid.len(),
    workers = config.workers,
))]
pub fn grid_search(
    x: &FeatureMatrix,
    y: &[bool],
    config: &SearchConfig,
) -> Result<SearchResult, ModelError> {
    if config.grid.is_empty() {
        return Err(ModelError::EmptyGrid);
    }
    if y.len() != x.n_rows() {
        return Err(ModelError::OutcomeLengthMismatch {
            expected: x.n_rows(),
            got: y.len(),
        });
    }

    let folds = stratified_folds(y, config.n_folds, config.seed)?;
    let checkpoints = config.grid.n_trees.clone();

    let mut tasks = Vec::new();
    for depth_idx in 0..config.grid.depths.len() {
        for shrinkage_idx in 0..config.grid.shrinkages.len() {
            for fold in 0..config.n_folds {
                tasks.push(Task {
                    depth_idx,
                    shrinkage_idx,
                    fold,
                });
            }
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
        .map_err(|source| ModelError::ThreadPool { source })?;

    let pb = progress_bar_or_hidden(config.show_progress, tasks.len() as u64, "Cross-validating");
    let outcomes: Vec<Result<Vec<f64>, ModelError>> = pool.install(|| {
        tasks
            .par_iter()
            .map(|&task| {
                let outcome = run_task(x, y, &folds, task, config, &checkpoints);
                pb.inc(1);
                outcome
            })
            .collect()
    });
    pb.finish_and_clear();

    let mut candidates = Vec::new();
    let mut failed = Vec::new();
    let n_folds = config.n_folds;

    for depth_idx in 0..config.grid.depths.len() {
        for shrinkage_idx in 0..config.grid.shrinkages.len() {
            let depth = config.grid.depths[depth_idx];
            let shrinkage = config.grid.shrinkages[shrinkage_idx];
            let start = (depth_idx * config.grid.shrinkages.len() + shrinkage_idx) * n_folds;
            let fold_outcomes = &outcomes[start..start + n_folds];

            if let Some(Err(err)) = fold_outcomes.iter().find(|o| o.is_err()) {
                warn!(depth, shrinkage, error = %err, "Excluding failed combination");
                failed.push(FailedCombination {
                    interaction_depth: depth,
                    shrinkage,
                    reason: err.to_string(),
                });
                continue;
            }
            let fold_scores: Vec<&Vec<f64>> = fold_outcomes.iter().flatten().collect();

            for (k, &n_trees) in checkpoints.iter().enumerate() {
                let scores: Vec<f64> = fold_scores.iter().map(|s| s[k]).collect();
                let mean_score = scores.iter().sum::<f64>() / scores.len() as f64;
                candidates.push(CandidateScore {
                    n_trees,
                    interaction_depth: depth,
                    shrinkage,
                    mean_score,
                    fold_scores: scores,
                });
            }
        }
    }

    let mut best: Option<&CandidateScore> = None;
    for candidate in &candidates {
        if candidate.mean_score.is_nan() {
            continue;
        }
        if best.map_or(true, |b| candidate.mean_score > b.mean_score) {
            best = Some(candidate);
        }
    }
    let best = best.cloned().ok_or(ModelError::AllCandidatesFailed {
        candidates: config.grid.depths.len() * config.grid.shrinkages.len(),
    })?;

    info!(
        n_trees = best.n_trees,
        depth = best.interaction_depth,
        shrinkage = best.shrinkage,
        score = best.mean_score,
        metric = config.metric.name(),
        "Selected hyperparameters"
    );

    Ok(SearchResult {
        metric: config.metric,
        best,
        candidates,
        failed,
    })
}
