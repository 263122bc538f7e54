//! Release and bail statistics by demographic group.

use serde::{Deserialize, Serialize};

use super::metrics::{mean, median};
use crate::pipeline::demographics::{category_order, AgeBands, DemographicProfile, Dimension};

/// Per-row pretrial decision attributes. Missing values are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionColumns {
    pub released: Vec<Option<bool>>,
    pub bail_set: Vec<Option<bool>>,
    pub bail_amount: Vec<Option<f64>>,
}

impl DecisionColumns {
    pub fn len(&self) -> usize {
        self.released.len()
    }

    pub fn is_empty(&self) -> bool {
        self.released.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub category: String,
    pub n: usize,
    /// Known-status rows only; `None` when there are none.
    pub release_rate: Option<f64>,
    pub bail_set_rate: Option<f64>,
    /// Over positive bail amounts.
    pub mean_bail: Option<f64>,
    pub median_bail: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub overall: GroupStats,
    pub by_dimension: Vec<(Dimension, Vec<GroupStats>)>,
}

fn rate(flags: impl Iterator<Item = Option<bool>>) -> Option<f64> {
    let (known, set) = flags
        .flatten()
        .fold((0usize, 0usize), |(k, s), f| (k + 1, s + usize::from(f)));
    (known > 0).then(|| set as f64 / known as f64)
}

/// Statistics over the rows in `rows`.
pub fn group_stats(category: &str, decisions: &DecisionColumns, rows: &[usize]) -> GroupStats {
    let amounts: Vec<f64> = rows
        .iter()
        .filter_map(|&i| decisions.bail_amount.get(i).copied().flatten())
        .filter(|a| a.is_finite() && *a > 0.0)
        .collect();
    GroupStats {
        category: category.to_string(),
        n: rows.len(),
        release_rate: rate(rows.iter().map(|&i| decisions.released.get(i).copied().flatten())),
        bail_set_rate: rate(rows.iter().map(|&i| decisions.bail_set.get(i).copied().flatten())),
        mean_bail: mean(&amounts),
        median_bail: median(&amounts),
    }
}

/// Overall and per-category statistics. Empty categories are omitted.
pub fn describe(
    decisions: &DecisionColumns,
    profiles: &[DemographicProfile],
    bands: &AgeBands,
) -> DescriptiveStats {
    let all: Vec<usize> = (0..profiles.len()).collect();
    let by_dimension = Dimension::ALL
        .iter()
        .map(|&dimension| {
            let groups = category_order(dimension, profiles, bands)
                .iter()
                .filter_map(|category| {
                    let rows: Vec<usize> = all
                        .iter()
                        .copied()
                        .filter(|&i| profiles[i].category(dimension) == category)
                        .collect();
                    (!rows.is_empty()).then(|| group_stats(category, decisions, &rows))
                })
                .collect();
            (dimension, groups)
        })
        .collect();

    DescriptiveStats {
        overall: group_stats("All", decisions, &all),
        by_dimension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::demographics::RaceCategory;

    #[test]
    fn test_rates_ignore_unknowns() {
        assert_eq!(rate([Some(true), None, Some(false)].into_iter()), Some(0.5));
        assert_eq!(rate([None, None].into_iter()), None);
    }

    #[test]
    fn test_describe_by_gender() {
        let profile = |g: &str| DemographicProfile {
            gender: g.into(),
            age_band: "18-24".into(),
            race: RaceCategory::Other,
        };
        let profiles = vec![profile("Female"), profile("Male"), profile("Male")];
        let decisions = DecisionColumns {
            released: vec![Some(true), Some(true), Some(false)],
            bail_set: vec![Some(false), Some(true), Some(true)],
            bail_amount: vec![Some(0.0), Some(500.0), Some(1500.0)],
        };

        let stats = describe(&decisions, &profiles, &AgeBands::default());
        assert_eq!(stats.overall.n, 3);
        assert!((stats.overall.release_rate.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.overall.mean_bail, Some(1000.0));

        let (_, gender) = &stats.by_dimension[0];
        assert_eq!(gender.len(), 2);
        assert_eq!(gender[0].category, "Female");
        assert_eq!(gender[0].mean_bail, None);
        assert_eq!(gender[1].release_rate, Some(0.5));
        assert_eq!(gender[1].median_bail, Some(1000.0));
    }
}
