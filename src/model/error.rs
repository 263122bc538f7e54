use std::path::PathBuf;

/// Errors from boosting, grid search and artifact persistence.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when interaction_depth is zero.
    #[error("interaction_depth must be at least 1, got {depth}")]
    InvalidDepth {
        /// The invalid depth provided.
        depth: usize,
    },

    /// Returned when shrinkage is not in (0, 1].
    #[error("shrinkage must be in (0, 1], got {shrinkage}")]
    InvalidShrinkage {
        /// The invalid shrinkage provided.
        shrinkage: f64,
    },

    /// Returned when bag_fraction is not in (0, 1].
    #[error("bag_fraction must be in (0, 1], got {fraction}")]
    InvalidBagFraction {
        /// The invalid fraction provided.
        fraction: f64,
    },

    /// Returned when min_leaf is zero.
    #[error("min_leaf must be at least 1, got {min_leaf}")]
    InvalidMinLeaf {
        /// The invalid min_leaf provided.
        min_leaf: usize,
    },

    /// Returned when the training matrix has zero rows.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training matrix has zero columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when outcome length differs from the matrix row count.
    #[error("outcome has {got} entries, expected {expected}")]
    OutcomeLengthMismatch {
        /// Number of matrix rows.
        expected: usize,
        /// Number of outcome entries.
        got: usize,
    },

    /// Returned when the outcome has a single class.
    #[error("outcome has a single class; cannot fit a classifier")]
    SingleClass,

    /// Returned at prediction time when feature counts differ.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// Features the model was trained on.
        expected: usize,
        /// Features supplied.
        got: usize,
    },

    /// Returned when gradients or leaf values stop being finite.
    #[error("non-finite {quantity} at iteration {iteration}")]
    NonFinite {
        /// What became non-finite.
        quantity: &'static str,
        /// Zero-based boosting iteration.
        iteration: usize,
    },

    /// Returned when the search grid has no combinations.
    #[error("search grid is empty")]
    EmptyGrid,

    /// Returned when every grid combination failed to fit.
    #[error("all {candidates} hyperparameter combinations failed to fit")]
    AllCandidatesFailed {
        /// Number of combinations attempted.
        candidates: usize,
    },

    /// Returned when the worker pool cannot be built.
    #[error("failed to build worker pool")]
    ThreadPool {
        /// The underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },

    /// Returned when cross-validation folds cannot be formed.
    #[error(transparent)]
    Partition(#[from] crate::pipeline::partition::PartitionError),

    /// Returned when artifact serialization fails.
    #[error("failed to serialize model artifact")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when artifact deserialization fails.
    #[error("failed to deserialize model artifact from {path}")]
    DeserializeModel {
        /// Path to the artifact.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the artifact fails.
    #[error("failed to write model artifact to {path}")]
    WriteModel {
        /// Path to the artifact.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the artifact fails.
    #[error("failed to read model artifact from {path}")]
    ReadModel {
        /// Path to the artifact.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the artifact was written by an incompatible version.
    #[error("incompatible model artifact version {found} (expected {expected})")]
    IncompatibleModelVersion {
        /// Version in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
}
