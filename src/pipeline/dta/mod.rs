//! Stata `.dta` file reader (releases 117, 118 and 119).
//!
//! Produces a [`LabelledFrame`]: numeric variables become `Float64` columns,
//! string variables become `String` columns, and every variable's display
//! label and value label table land in its [`VariableMeta`].
//!
//! # Module Structure
//!
//! - `constants` - Section tags, type codes, missing value thresholds
//! - `error` - Error types for parsing failures
//! - `reader` - Bounds-checked byte cursor and text decoding
//! - `header` - Header, section map and variable descriptors
//! - `data` - Observations and strL resolution
//! - `labels` - Value label tables

pub mod constants;
pub mod data;
pub mod error;
pub mod header;
pub mod labels;
pub mod reader;

pub use error::DtaError;

use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, instrument};

use self::constants::*;
use self::data::{build_columns, read_data, read_strls};
use self::header::{parse_header, parse_variables};
use self::labels::read_value_labels;
use self::reader::{ByteOrder, ByteReader, TextEncoding};
use crate::pipeline::frame::{LabelledFrame, VariableMeta};

/// Supported format releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtaRelease {
    /// Stata 13, Windows-1252 text.
    V117,
    /// Stata 14+, UTF-8 text.
    V118,
    /// Stata 15+ for more than 32,767 variables.
    V119,
}

impl DtaRelease {
    pub fn encoding(self) -> TextEncoding {
        match self {
            DtaRelease::V117 => TextEncoding::Windows1252,
            DtaRelease::V118 | DtaRelease::V119 => TextEncoding::Utf8,
        }
    }

    pub fn widths(self) -> FieldWidths {
        match self {
            DtaRelease::V117 => WIDTHS_117,
            DtaRelease::V118 | DtaRelease::V119 => WIDTHS_118,
        }
    }
}

/// Parsed `<header>` and `<map>`.
#[derive(Debug, Clone)]
pub struct DtaHeader {
    pub release: DtaRelease,
    pub byte_order: ByteOrder,
    pub n_vars: usize,
    pub n_obs: u64,
    pub dataset_label: String,
    pub timestamp: String,
    pub map: [u64; MAP_ENTRIES],
}

/// Storage type of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// Fixed-width string of the given byte length.
    Str(u16),
    StrL,
    Double,
    Float,
    Long,
    Int,
    Byte,
}

impl VariableType {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1..=TYPE_STR_MAX => Some(VariableType::Str(code)),
            TYPE_STRL => Some(VariableType::StrL),
            TYPE_DOUBLE => Some(VariableType::Double),
            TYPE_FLOAT => Some(VariableType::Float),
            TYPE_LONG => Some(VariableType::Long),
            TYPE_INT => Some(VariableType::Int),
            TYPE_BYTE => Some(VariableType::Byte),
            _ => None,
        }
    }

    /// Bytes occupied in one observation record.
    pub fn width(self) -> usize {
        match self {
            VariableType::Str(n) => n as usize,
            VariableType::StrL | VariableType::Double => 8,
            VariableType::Float | VariableType::Long => 4,
            VariableType::Int => 2,
            VariableType::Byte => 1,
        }
    }
}

/// One variable descriptor.
#[derive(Debug, Clone)]
pub struct DtaVariable {
    pub name: String,
    pub var_type: VariableType,
    /// Byte offset within an observation record.
    pub offset: usize,
    pub format: String,
    pub value_label_name: String,
    pub label: String,
}

/// Loads a `.dta` file from disk.
///
/// # Errors
/// * `DtaError::Io` - The file cannot be read
/// * any parse error from [`read_dta`]
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_dta(path: &Path) -> Result<LabelledFrame, DtaError> {
    let bytes = std::fs::read(path)?;
    read_dta(&bytes)
}

/// Parses an in-memory `.dta` file.
pub fn read_dta(bytes: &[u8]) -> Result<LabelledFrame, DtaError> {
    let mut reader = ByteReader::new(bytes);

    let header = parse_header(&mut reader)?;
    debug!(
        release = ?header.release,
        n_vars = header.n_vars,
        n_obs = header.n_obs,
        "Parsed .dta header"
    );

    let variables = parse_variables(&mut reader, &header)?;
    let buffers = read_data(&mut reader, &header, &variables)?;
    let strls = if variables.iter().any(|v| v.var_type == VariableType::StrL) {
        read_strls(&mut reader, &header)?
    } else {
        HashMap::new()
    };
    let label_tables = read_value_labels(&mut reader, &header)?;

    let columns = build_columns(&variables, buffers, &strls)?;
    let df = DataFrame::new(columns)?;

    let meta = variables
        .iter()
        .map(|v| {
            let value_labels = if v.value_label_name.is_empty() {
                Default::default()
            } else {
                label_tables
                    .get(&v.value_label_name)
                    .cloned()
                    .unwrap_or_default()
            };
            let display_label = (!v.label.trim().is_empty()).then(|| v.label.clone());
            (
                v.name.clone(),
                VariableMeta {
                    display_label,
                    value_labels,
                },
            )
        })
        .collect();

    Ok(LabelledFrame::with_meta(df, meta))
}
