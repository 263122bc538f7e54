//! Variable catalog and typed column roles
//!
//! The catalog is read once and passed to each stage. [`Catalog::resolve`]
//! intersects it with the columns actually present and yields a [`Schema`]
//! whose role sets drive every later column selection.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::frame::LabelledFrame;

/// Errors raised while loading or validating the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse catalog CSV {path}")]
    Csv { path: PathBuf, source: PolarsError },

    #[error("failed to parse catalog JSON {path}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unsupported catalog format '{extension}' (expected csv or json)")]
    UnsupportedFormat { extension: String },

    #[error("catalog is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("variable '{variable}' has invalid {field} flag '{value}'")]
    InvalidFlag {
        variable: String,
        field: &'static str,
        value: String,
    },

    #[error("variable '{variable}' appears more than once in the catalog")]
    Duplicate { variable: String },

    #[error("{role} column '{column}' has no catalog entry")]
    UnknownRoleColumn { role: String, column: String },

    #[error("catalog has no outcome variable")]
    NoOutcome,

    #[error("outcome column '{column}' is not flagged as an outcome in the catalog")]
    OutcomeNotFlagged { column: String },
}

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub variable: String,
    #[serde(default)]
    pub keep: bool,
    #[serde(default)]
    pub outcome: bool,
    #[serde(default)]
    pub discrim: bool,
    #[serde(default)]
    pub label: Option<String>,
}

impl CatalogEntry {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            keep: false,
            outcome: false,
            discrim: false,
            label: None,
        }
    }

    #[must_use]
    pub fn keep(mut self) -> Self {
        self.keep = true;
        self
    }

    #[must_use]
    pub fn outcome(mut self) -> Self {
        self.outcome = true;
        self
    }

    #[must_use]
    pub fn discrim(mut self) -> Self {
        self.discrim = true;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Role implied by the flags alone. Outcome wins over demographic, which
    /// wins over keep.
    pub fn role(&self) -> Option<ColumnRole> {
        if self.outcome {
            Some(ColumnRole::Outcome)
        } else if self.discrim {
            Some(ColumnRole::Demographic)
        } else if self.keep {
            Some(ColumnRole::Feature)
        } else {
            None
        }
    }
}

/// Role of a retained column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Outcome,
    /// Protected attribute; an input to the full model only.
    Demographic,
    /// Input to both models.
    Feature,
    /// Needed by evaluation (release, bail) but not a model input.
    Auxiliary,
}

/// Which feature set a model is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelVariant {
    /// Features and demographic variables.
    Full,
    /// Features only.
    Fair,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Full, ModelVariant::Fair];

    pub fn name(self) -> &'static str {
        match self {
            ModelVariant::Full => "full",
            ModelVariant::Fair => "fair",
        }
    }

    pub fn artifact_file_name(self) -> String {
        format!("model_{}.bin", self.name())
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Variable catalog keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate variable names.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.variable.clone(), i).is_some() {
                return Err(CatalogError::Duplicate {
                    variable: entry.variable.clone(),
                });
            }
        }
        Ok(Self { entries, index })
    }

    /// Load a catalog from `.csv` or `.json`.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let entries = match extension.as_str() {
            "csv" => read_csv_entries(path)?,
            "json" => {
                let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&text).map_err(|source| CatalogError::Json {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => return Err(CatalogError::UnsupportedFormat { extension }),
        };

        let catalog = Self::from_entries(entries)?;
        info!(
            entries = catalog.len(),
            features = catalog.keep_names().len(),
            demographics = catalog.demographic_names().len(),
            path = %path.display(),
            "Loaded variable catalog"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, variable: &str) -> Option<&CatalogEntry> {
        self.index.get(variable).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.index.contains_key(variable)
    }

    fn names_where(&self, predicate: impl Fn(&CatalogEntry) -> bool) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| predicate(e))
            .map(|e| e.variable.clone())
            .collect()
    }

    pub fn outcome_names(&self) -> Vec<String> {
        self.names_where(|e| e.outcome)
    }

    pub fn demographic_names(&self) -> Vec<String> {
        self.names_where(|e| e.discrim)
    }

    pub fn keep_names(&self) -> Vec<String> {
        self.names_where(|e| e.keep)
    }

    /// Check that the configured outcome is an outcome variable and every
    /// other role column is catalogued.
    pub fn check_roles(&self, outcome: &str, roles: &[(&str, &str)]) -> Result<(), CatalogError> {
        if self.outcome_names().is_empty() {
            return Err(CatalogError::NoOutcome);
        }
        match self.get(outcome) {
            Some(entry) if entry.outcome => {}
            Some(_) => {
                return Err(CatalogError::OutcomeNotFlagged {
                    column: outcome.to_string(),
                })
            }
            None => {
                return Err(CatalogError::UnknownRoleColumn {
                    role: "outcome".to_string(),
                    column: outcome.to_string(),
                })
            }
        }
        for (role, column) in roles {
            if !self.contains(column) {
                return Err(CatalogError::UnknownRoleColumn {
                    role: role.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolve roles against the columns present in a table.
    ///
    /// `auxiliary` lists extra columns the caller needs downstream; they must
    /// be catalogued but need no flags. Catalogued names absent from the
    /// table are dropped with a warning.
    pub fn resolve(&self, columns: &[String], auxiliary: &[String]) -> Schema {
        let present: HashSet<&str> = columns.iter().map(|s| s.as_str()).collect();
        let auxiliary: HashSet<&str> = auxiliary.iter().map(|s| s.as_str()).collect();

        let absent: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.role().is_some() || auxiliary.contains(e.variable.as_str()))
            .filter(|e| !present.contains(e.variable.as_str()))
            .map(|e| e.variable.clone())
            .collect();
        if !absent.is_empty() {
            warn!(
                count = absent.len(),
                columns = ?absent,
                "Catalog variables not present in data were dropped"
            );
        }

        let mut roles = Vec::new();
        for column in columns {
            let Some(entry) = self.get(column) else {
                continue;
            };
            let role = match entry.role() {
                Some(role) => role,
                None if auxiliary.contains(column.as_str()) => ColumnRole::Auxiliary,
                None => continue,
            };
            roles.push((column.clone(), role));
        }

        Schema { roles, absent }
    }
}

fn read_csv_entries(path: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
    let csv_err = |source| CatalogError::Csv {
        path: path.to_path_buf(),
        source,
    };

    // Read every field as text so flags like TRUE/1/yes all parse the same way
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(csv_err)?;

    let text_column = |name: &str| -> Result<Option<Vec<Option<String>>>, CatalogError> {
        match df.column(name) {
            Ok(column) => Ok(Some(
                column
                    .str()
                    .map_err(csv_err)?
                    .into_iter()
                    .map(|v| v.map(|s| s.trim().to_string()))
                    .collect(),
            )),
            Err(_) => Ok(None),
        }
    };
    let required = |name: &str| -> Result<Vec<Option<String>>, CatalogError> {
        text_column(name)?.ok_or_else(|| CatalogError::MissingColumn {
            column: name.to_string(),
        })
    };

    let variables = required("variable")?;
    let keep = required("keep")?;
    let outcome = required("outcome")?;
    let discrim = required("discrim")?;
    let labels = text_column("label")?;

    let mut entries = Vec::with_capacity(variables.len());
    for (i, variable) in variables.into_iter().enumerate() {
        let Some(variable) = variable.filter(|v| !v.is_empty()) else {
            continue;
        };
        let flag = |values: &[Option<String>], field: &'static str| {
            parse_flag(values[i].as_deref()).ok_or_else(|| CatalogError::InvalidFlag {
                variable: variable.clone(),
                field,
                value: values[i].clone().unwrap_or_default(),
            })
        };
        let entry = CatalogEntry {
            keep: flag(&keep, "keep")?,
            outcome: flag(&outcome, "outcome")?,
            discrim: flag(&discrim, "discrim")?,
            label: labels
                .as_ref()
                .and_then(|l| l[i].clone())
                .filter(|l| !l.is_empty()),
            variable,
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Parse a catalog flag. Blank cells are `false`.
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") => Some(false),
        Some("true" | "t" | "yes" | "y" | "1") => Some(true),
        Some("false" | "f" | "no" | "n" | "0") => Some(false),
        _ => None,
    }
}

/// Column roles resolved against one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Retained columns in table order.
    roles: Vec<(String, ColumnRole)>,
    /// Catalogued names missing from the table.
    absent: Vec<String>,
}

impl Schema {
    pub fn role(&self, column: &str) -> Option<ColumnRole> {
        self.roles
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, role)| *role)
    }

    fn with_role(&self, role: ColumnRole) -> Vec<String> {
        self.roles
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn outcome_columns(&self) -> Vec<String> {
        self.with_role(ColumnRole::Outcome)
    }

    pub fn demographic_columns(&self) -> Vec<String> {
        self.with_role(ColumnRole::Demographic)
    }

    pub fn auxiliary_columns(&self) -> Vec<String> {
        self.with_role(ColumnRole::Auxiliary)
    }

    /// Every retained column in table order.
    pub fn retained_columns(&self) -> Vec<String> {
        self.roles.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn absent_columns(&self) -> &[String] {
        &self.absent
    }

    /// Model inputs for a variant.
    pub fn feature_columns(&self, variant: ModelVariant) -> Vec<String> {
        self.roles
            .iter()
            .filter(|(_, role)| match variant {
                ModelVariant::Full => {
                    matches!(role, ColumnRole::Feature | ColumnRole::Demographic)
                }
                ModelVariant::Fair => *role == ColumnRole::Feature,
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// All retained columns.
    pub fn full_view(&self, frame: &LabelledFrame) -> PolarsResult<LabelledFrame> {
        frame.select(&self.retained_columns())
    }

    /// Retained columns without demographic variables.
    pub fn fair_view(&self, frame: &LabelledFrame) -> PolarsResult<LabelledFrame> {
        let columns: Vec<String> = self
            .roles
            .iter()
            .filter(|(_, role)| *role != ColumnRole::Demographic)
            .map(|(name, _)| name.clone())
            .collect();
        frame.select(&columns)
    }

    pub fn outcome_view(&self, frame: &LabelledFrame) -> PolarsResult<LabelledFrame> {
        frame.select(&self.outcome_columns())
    }
}
