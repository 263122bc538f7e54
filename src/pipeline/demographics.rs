//! Demographic slicing: gender, age band and race category per row.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::frame::{column_as_f64, column_as_strings, LabelledFrame};
use super::target::decode_labelled_flags;

/// Label used for rows whose attribute is missing.
pub const UNKNOWN: &str = "Unknown";

/// Mutually exclusive race categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RaceCategory {
    White,
    Black,
    Latinx,
    Other,
}

impl RaceCategory {
    pub const ALL: [RaceCategory; 4] = [
        RaceCategory::White,
        RaceCategory::Black,
        RaceCategory::Latinx,
        RaceCategory::Other,
    ];

    /// Latinx takes precedence; otherwise exactly one of Black/White is
    /// required, and anything else (none, both, unknown) is Other.
    pub fn from_flags(white: Option<bool>, black: Option<bool>, latinx: Option<bool>) -> Self {
        let white = white.unwrap_or(false);
        let black = black.unwrap_or(false);
        if latinx.unwrap_or(false) {
            RaceCategory::Latinx
        } else if black && !white {
            RaceCategory::Black
        } else if white && !black {
            RaceCategory::White
        } else {
            RaceCategory::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RaceCategory::White => "White",
            RaceCategory::Black => "Black",
            RaceCategory::Latinx => "Latinx",
            RaceCategory::Other => "Other",
        }
    }
}

impl fmt::Display for RaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Age bands from ascending lower edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBands {
    edges: Vec<u32>,
}

impl Default for AgeBands {
    fn default() -> Self {
        Self {
            edges: vec![18, 25, 35, 45, 55],
        }
    }
}

impl AgeBands {
    /// Returns `None` for empty or non-increasing edges.
    pub fn new(edges: Vec<u32>) -> Option<Self> {
        if edges.is_empty() {
            return None;
        }
        let sorted = edges.windows(2).all(|w| w[0] < w[1]);
        if !sorted {
            return None;
        }
        Some(Self { edges })
    }

    /// Every label in order, excluding [`UNKNOWN`].
    pub fn labels(&self) -> Vec<String> {
        let mut labels = vec![format!("Under {}", self.edges[0])];
        for (i, lower) in self.edges.iter().enumerate() {
            match self.edges.get(i + 1) {
                Some(next) => labels.push(format!("{}-{}", lower, next - 1)),
                None => labels.push(format!("{}+", lower)),
            }
        }
        labels
    }

    pub fn label(&self, age: Option<f64>) -> String {
        let Some(age) = age.filter(|a| a.is_finite()) else {
            return UNKNOWN.to_string();
        };
        let band = self.edges.partition_point(|&edge| edge as f64 <= age);
        match band {
            0 => format!("Under {}", self.edges[0]),
            i if i == self.edges.len() => format!("{}+", self.edges[i - 1]),
            i => format!("{}-{}", self.edges[i - 1], self.edges[i] - 1),
        }
    }
}

/// Slicing dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Gender,
    AgeBand,
    Race,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Gender, Dimension::AgeBand, Dimension::Race];

    pub fn title(self) -> &'static str {
        match self {
            Dimension::Gender => "Gender",
            Dimension::AgeBand => "Age",
            Dimension::Race => "Race",
        }
    }
}

/// Columns holding the demographic attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicColumns {
    pub gender: Option<String>,
    pub age: Option<String>,
    pub race_white: Option<String>,
    pub race_black: Option<String>,
    pub latinx: Option<String>,
}

impl DemographicColumns {
    pub fn configured(&self) -> Vec<(&'static str, &str)> {
        [
            ("gender", &self.gender),
            ("age", &self.age),
            ("race-white", &self.race_white),
            ("race-black", &self.race_black),
            ("latinx", &self.latinx),
        ]
        .into_iter()
        .filter_map(|(role, column)| column.as_deref().map(|c| (role, c)))
        .collect()
    }
}

/// Demographic attributes of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicProfile {
    pub gender: String,
    pub age_band: String,
    pub race: RaceCategory,
}

impl DemographicProfile {
    pub fn category(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Gender => &self.gender,
            Dimension::AgeBand => &self.age_band,
            Dimension::Race => self.race.as_str(),
        }
    }
}

/// Derive a profile for every row. Unconfigured or missing attributes map to
/// [`UNKNOWN`] (gender, age) or unset flags (race).
pub fn derive_profiles(
    frame: &LabelledFrame,
    columns: &DemographicColumns,
    bands: &AgeBands,
) -> Result<Vec<DemographicProfile>> {
    let n = frame.height();

    let gender = match &columns.gender {
        Some(c) => column_as_strings(&frame.df, c)?,
        None => vec![None; n],
    };
    let age = match &columns.age {
        Some(c) => column_as_f64(&frame.df, c)?,
        None => vec![None; n],
    };
    let flags = |column: &Option<String>| -> Result<Vec<Option<bool>>> {
        match column {
            Some(c) => decode_labelled_flags(frame, c),
            None => Ok(vec![None; n]),
        }
    };
    let white = flags(&columns.race_white)?;
    let black = flags(&columns.race_black)?;
    let latinx = flags(&columns.latinx)?;

    let profiles = (0..n)
        .map(|i| DemographicProfile {
            gender: gender[i]
                .clone()
                .filter(|g| !g.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            age_band: bands.label(age[i]),
            race: RaceCategory::from_flags(white[i], black[i], latinx[i]),
        })
        .collect();

    Ok(profiles)
}

/// Categories in display order for one dimension.
pub fn category_order(
    dimension: Dimension,
    profiles: &[DemographicProfile],
    bands: &AgeBands,
) -> Vec<String> {
    let mut order: Vec<String> = match dimension {
        Dimension::Race => RaceCategory::ALL.iter().map(|r| r.to_string()).collect(),
        Dimension::AgeBand => bands.labels(),
        Dimension::Gender => {
            let mut seen: Vec<String> = profiles
                .iter()
                .map(|p| p.gender.clone())
                .filter(|g| g != UNKNOWN)
                .collect();
            seen.sort();
            seen.dedup();
            seen
        }
    };
    order.push(UNKNOWN.to_string());
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_race_precedence() {
        use RaceCategory::*;
        assert_eq!(RaceCategory::from_flags(Some(true), None, Some(true)), Latinx);
        assert_eq!(RaceCategory::from_flags(Some(true), Some(false), None), White);
        assert_eq!(RaceCategory::from_flags(None, Some(true), Some(false)), Black);
        assert_eq!(RaceCategory::from_flags(Some(true), Some(true), None), Other);
        assert_eq!(RaceCategory::from_flags(None, None, None), Other);
    }

    #[test]
    fn test_age_bands() {
        let bands = AgeBands::default();
        assert_eq!(bands.label(Some(17.0)), "Under 18");
        assert_eq!(bands.label(Some(18.0)), "18-24");
        assert_eq!(bands.label(Some(24.9)), "18-24");
        assert_eq!(bands.label(Some(54.0)), "45-54");
        assert_eq!(bands.label(Some(70.0)), "55+");
        assert_eq!(bands.label(None), UNKNOWN);
        assert_eq!(
            bands.labels(),
            vec!["Under 18", "18-24", "25-34", "35-44", "45-54", "55+"]
        );
    }

    #[test]
    fn test_age_bands_reject_unsorted_edges() {
        assert!(AgeBands::new(vec![]).is_none());
        assert!(AgeBands::new(vec![30, 20]).is_none());
        assert!(AgeBands::new(vec![21, 65]).is_some());
    }

    #[test]
    fn test_derive_profiles() {
        let df = df! {
            "sex" => [Some("Male"), None, Some("Female")],
            "age" => [Some(30.0f64), Some(60.0), None],
            "white" => [Some(1.0f64), Some(0.0), Some(1.0)],
            "black" => [Some(0.0f64), Some(1.0), None],
            "hisp" => [Some("No"), Some("No"), Some("Yes")],
        }
        .unwrap();
        let columns = DemographicColumns {
            gender: Some("sex".into()),
            age: Some("age".into()),
            race_white: Some("white".into()),
            race_black: Some("black".into()),
            latinx: Some("hisp".into()),
        };

        let profiles =
            derive_profiles(&LabelledFrame::new(df), &columns, &AgeBands::default()).unwrap();
        assert_eq!(profiles[0].gender, "Male");
        assert_eq!(profiles[0].age_band, "25-34");
        assert_eq!(profiles[0].race, RaceCategory::White);
        assert_eq!(profiles[1].gender, UNKNOWN);
        assert_eq!(profiles[1].race, RaceCategory::Black);
        assert_eq!(profiles[2].age_band, UNKNOWN);
        assert_eq!(profiles[2].race, RaceCategory::Latinx);
    }
}
