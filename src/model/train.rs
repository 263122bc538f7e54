use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::boosting::{BoostedClassifier, BoostingParams};
use super::error::ModelError;
use super::search::{grid_search, SearchConfig, SearchResult};
use crate::pipeline::features::FeatureMatrix;

/// A classifier refitted with the selected hyperparameters, together with
/// its predictions on both partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub classifier: BoostedClassifier,
    pub selected: BoostingParams,
    pub search: SearchResult,
    pub train_probabilities: Vec<f64>,
    pub test_probabilities: Vec<f64>,
}

/// Search the grid on the training partition, refit the winner on all
/// training rows, and score both partitions.
#[instrument(skip_all, fields(n_train = x_train.n_rows(), n_test = x_test.n_rows()))]
pub fn train_variant(
    x_train: &FeatureMatrix,
    y_train: &[bool],
    x_test: &FeatureMatrix,
    config: &SearchConfig,
) -> Result<TrainedModel, ModelError> {
    let search = grid_search(x_train, y_train, config)?;
    let best = &search.best;
    let selected = config.params(best.n_trees, best.interaction_depth, best.shrinkage);

    let classifier = BoostedClassifier::fit(x_train, y_train, &selected)?;
    let train_probabilities = classifier.predict_proba(x_train)?;
    let test_probabilities = classifier.predict_proba(x_test)?;

    info!(
        n_trees = selected.n_trees,
        depth = selected.interaction_depth,
        shrinkage = selected.shrinkage,
        "Refitted selected model"
    );

    Ok(TrainedModel {
        classifier,
        selected,
        search,
        train_probabilities,
        test_probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::search::SearchGrid;

    #[test]
    fn test_train_variant_shapes() {
        let n = 240;
        let signal: Vec<f64> = (0..n).map(|i| (i % 10) as f64).collect();
        let y: Vec<bool> = signal
            .iter()
            .enumerate()
            .map(|(i, &s)| s >= 5.0 || i % 7 == 0)
            .collect();
        let x = FeatureMatrix::from_columns(vec!["signal".into()], vec![signal]).unwrap();
        let x_test = x.select_rows(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let config = SearchConfig::default().with_grid(SearchGrid {
            n_trees: vec![10, 20],
            depths: vec![2],
            shrinkages: vec![0.1],
        });
        let trained = train_variant(&x, &y, &x_test, &config).unwrap();

        assert_eq!(trained.train_probabilities.len(), n);
        assert_eq!(trained.test_probabilities.len(), 10);
        assert!(trained
            .test_probabilities
            .iter()
            .all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(trained.classifier.n_trees(), trained.selected.n_trees);
        // Low signal values are mostly negatives, high ones positives
        assert!(trained.test_probabilities[9] > trained.test_probabilities[0]);
    }
}
