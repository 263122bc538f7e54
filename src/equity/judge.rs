//! Human-judge proxy built from bail decisions.
//!
//! Setting bail is read as a prediction that the defendant will fail to
//! appear. Among released defendants with a known outcome:
//!
//! | bail set | failed to appear | outcome |
//! |---|---|---|
//! | yes | yes | true positive (correct) |
//! | yes | no | false positive |
//! | no | yes | false negative |
//! | no | no | true negative (correct) |

use serde::{Deserialize, Serialize};

use crate::pipeline::demographics::{DemographicProfile, Dimension};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JudgeOutcome {
    TruePositive,
    FalsePositive,
    FalseNegative,
    TrueNegative,
}

impl JudgeOutcome {
    pub fn is_correct(self) -> bool {
        matches!(self, JudgeOutcome::TruePositive | JudgeOutcome::TrueNegative)
    }
}

/// Classify one bail decision against the appearance outcome.
pub fn classify_decision(bail_set: bool, failed_to_appear: bool) -> JudgeOutcome {
    match (bail_set, failed_to_appear) {
        (true, true) => JudgeOutcome::TruePositive,
        (true, false) => JudgeOutcome::FalsePositive,
        (false, true) => JudgeOutcome::FalseNegative,
        (false, false) => JudgeOutcome::TrueNegative,
    }
}

/// One defendant's decision record; unknown fields are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JudgeCase {
    pub released: Option<bool>,
    pub bail_set: Option<bool>,
    pub failed_to_appear: Option<bool>,
}

impl JudgeCase {
    /// `None` unless the defendant was released and both the bail decision
    /// and the outcome are known.
    pub fn outcome(&self) -> Option<JudgeOutcome> {
        if self.released != Some(true) {
            return None;
        }
        Some(classify_decision(self.bail_set?, self.failed_to_appear?))
    }
}

/// Contingency counts of judge outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeTally {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_negative: usize,
}

impl JudgeTally {
    pub fn record(&mut self, outcome: JudgeOutcome) {
        match outcome {
            JudgeOutcome::TruePositive => self.true_positive += 1,
            JudgeOutcome::FalsePositive => self.false_positive += 1,
            JudgeOutcome::FalseNegative => self.false_negative += 1,
            JudgeOutcome::TrueNegative => self.true_negative += 1,
        }
    }

    pub fn from_cases<'a, I>(cases: I) -> Self
    where
        I: IntoIterator<Item = &'a JudgeCase>,
    {
        let mut tally = Self::default();
        for outcome in cases.into_iter().filter_map(JudgeCase::outcome) {
            tally.record(outcome);
        }
        tally
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.false_negative + self.true_negative
    }

    /// `None` when no cases were counted.
    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| (self.true_positive + self.true_negative) as f64 / total as f64)
    }

    /// Share of FTA cases where bail was set.
    pub fn sensitivity(&self) -> Option<f64> {
        let positives = self.true_positive + self.false_negative;
        (positives > 0).then(|| self.true_positive as f64 / positives as f64)
    }

    /// Share of appearing defendants with no bail.
    pub fn specificity(&self) -> Option<f64> {
        let negatives = self.true_negative + self.false_positive;
        (negatives > 0).then(|| self.true_negative as f64 / negatives as f64)
    }
}

/// Judge tallies per category of one dimension, in `order`. Categories
/// without any counted case are omitted.
pub fn tally_by_category(
    cases: &[JudgeCase],
    profiles: &[DemographicProfile],
    dimension: Dimension,
    order: &[String],
) -> Vec<(String, JudgeTally)> {
    order
        .iter()
        .filter_map(|category| {
            let tally = JudgeTally::from_cases(
                cases
                    .iter()
                    .zip(profiles)
                    .filter(|(_, p)| p.category(dimension) == category)
                    .map(|(c, _)| c),
            );
            (tally.total() > 0).then(|| (category.clone(), tally))
        })
        .collect()
}
