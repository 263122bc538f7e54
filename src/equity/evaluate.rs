//! Model quality per demographic slice.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::judge::{tally_by_category, JudgeCase, JudgeTally};
use super::metrics::ClassificationMetrics;
use crate::pipeline::catalog::ModelVariant;
use crate::pipeline::demographics::{category_order, AgeBands, DemographicProfile, Dimension};

/// Metrics for one category of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    pub category: String,
    pub metrics: ClassificationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionMetrics {
    pub dimension: Dimension,
    pub groups: Vec<GroupMetrics>,
}

/// Held-out evaluation of one model variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantEvaluation {
    pub variant: ModelVariant,
    pub overall: ClassificationMetrics,
    pub by_dimension: Vec<DimensionMetrics>,
}

impl VariantEvaluation {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionMetrics> {
        self.by_dimension.iter().find(|d| d.dimension == dimension)
    }
}

/// Judge proxy tallies overall and per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeEvaluation {
    pub overall: JudgeTally,
    pub by_dimension: Vec<(Dimension, Vec<(String, JudgeTally)>)>,
}

/// Metrics per category in `order`; categories with no rows are omitted.
pub fn slice_metrics(
    probabilities: &[f64],
    truth: &[bool],
    profiles: &[DemographicProfile],
    dimension: Dimension,
    order: &[String],
) -> Vec<GroupMetrics> {
    order
        .iter()
        .filter_map(|category| {
            let (p, y): (Vec<f64>, Vec<bool>) = profiles
                .iter()
                .zip(probabilities.iter().zip(truth))
                .filter(|(profile, _)| profile.category(dimension) == category)
                .map(|(_, (&p, &y))| (p, y))
                .unzip();
            ClassificationMetrics::compute(&p, &y).map(|metrics| GroupMetrics {
                category: category.clone(),
                metrics,
            })
        })
        .collect()
}

/// Evaluate one variant's predictions against the truth, overall and by
/// every demographic dimension.
pub fn evaluate_variant(
    variant: ModelVariant,
    probabilities: &[f64],
    truth: &[bool],
    profiles: &[DemographicProfile],
    bands: &AgeBands,
) -> Result<VariantEvaluation> {
    ensure!(
        probabilities.len() == truth.len() && truth.len() == profiles.len(),
        "{} model: {} predictions, {} outcomes and {} profiles",
        variant,
        probabilities.len(),
        truth.len(),
        profiles.len()
    );
    let Some(overall) = ClassificationMetrics::compute(probabilities, truth) else {
        anyhow::bail!("{} model: no rows to evaluate", variant);
    };

    let by_dimension = Dimension::ALL
        .iter()
        .map(|&dimension| {
            let order = category_order(dimension, profiles, bands);
            DimensionMetrics {
                dimension,
                groups: slice_metrics(probabilities, truth, profiles, dimension, &order),
            }
        })
        .collect();

    debug!(variant = variant.name(), accuracy = overall.accuracy, "Evaluated variant");
    Ok(VariantEvaluation {
        variant,
        overall,
        by_dimension,
    })
}

/// Tally the judge proxy overall and per dimension.
pub fn evaluate_judges(
    cases: &[JudgeCase],
    profiles: &[DemographicProfile],
    bands: &AgeBands,
) -> JudgeEvaluation {
    let by_dimension = Dimension::ALL
        .iter()
        .map(|&dimension| {
            let order = category_order(dimension, profiles, bands);
            (dimension, tally_by_category(cases, profiles, dimension, &order))
        })
        .collect();
    JudgeEvaluation {
        overall: JudgeTally::from_cases(cases),
        by_dimension,
    }
}
