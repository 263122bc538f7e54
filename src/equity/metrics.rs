//! Classification metrics over predicted probabilities.

use serde::{Deserialize, Serialize};

/// Default decision threshold on the predicted probability.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Share of rows where `p >= threshold` agrees with the truth.
/// `None` for empty input.
pub fn accuracy(probabilities: &[f64], truth: &[bool], threshold: f64) -> Option<f64> {
    if probabilities.is_empty() {
        return None;
    }
    let correct = probabilities
        .iter()
        .zip(truth)
        .filter(|(p, y)| (**p >= threshold) == **y)
        .count();
    Some(correct as f64 / probabilities.len() as f64)
}

/// Rank-based ROC AUC (Mann-Whitney U) with tied scores given their average
/// rank. `None` unless both classes are present.
pub fn roc_auc(probabilities: &[f64], truth: &[bool]) -> Option<f64> {
    let n_pos = truth.iter().filter(|&&y| y).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block i..=j shares the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if truth[idx] {
                positive_rank_sum += mean_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let u = positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg as f64))
}

/// Arithmetic mean, `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Median, `None` for empty input.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Model quality on one slice of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub n: usize,
    pub accuracy: f64,
    /// `None` when the slice has a single class.
    pub auc: Option<f64>,
    pub mean_probability: f64,
}

impl ClassificationMetrics {
    /// `None` for an empty slice.
    pub fn compute(probabilities: &[f64], truth: &[bool]) -> Option<Self> {
        Some(Self {
            n: probabilities.len(),
            accuracy: accuracy(probabilities, truth, DEFAULT_THRESHOLD)?,
            auc: roc_auc(probabilities, truth),
            mean_probability: mean(probabilities)?,
        })
    }
}
