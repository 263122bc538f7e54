//! Gradient-boosted classifiers, hyperparameter search and artifacts.

pub mod artifact;
pub mod boosting;
pub mod error;
pub mod search;
pub mod train;
pub mod tree;

pub use artifact::ModelArtifact;
pub use boosting::{BoostedClassifier, BoostingParams};
pub use error::ModelError;
pub use search::{grid_search, SearchConfig, SearchGrid, SearchResult, SelectionMetric};
pub use train::{train_variant, TrainedModel};
