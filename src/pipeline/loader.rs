//! Dataset loader for Stata, CSV and Parquet files

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::info;

use super::dta::load_dta;
use super::frame::{LabelledFrame, VariableMeta};

/// Load a dataset from a file, choosing the reader by extension.
///
/// Only `.dta` files carry variable and value labels; CSV and Parquet input
/// yields empty metadata.
pub fn load_dataset(path: &Path) -> Result<LabelledFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let frame = match extension.as_str() {
        "dta" => load_dta(path)
            .with_context(|| format!("Failed to load Stata file: {}", path.display()))?,
        "csv" => {
            let df = LazyCsvReader::new(path)
                .with_infer_schema_length(Some(10_000))
                .finish()
                .and_then(|lf| lf.collect())
                .with_context(|| format!("Failed to load CSV file: {}", path.display()))?;
            LabelledFrame::new(df)
        }
        "parquet" => {
            let df = LazyFrame::scan_parquet(path, Default::default())
                .and_then(|lf| lf.collect())
                .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?;
            LabelledFrame::new(df)
        }
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: dta, csv, parquet",
            extension
        ),
    };

    let (rows, cols) = frame.df.shape();
    info!(rows, cols, path = %path.display(), "Loaded dataset");
    Ok(frame)
}

/// Estimated in-memory size of the table in megabytes.
pub fn estimated_memory_mb(df: &DataFrame) -> f64 {
    df.estimated_size() as f64 / (1024.0 * 1024.0)
}

/// Path of the JSON sidecar holding label metadata for a Parquet table.
pub fn labels_sidecar_path(parquet: &Path) -> std::path::PathBuf {
    parquet.with_extension("labels.json")
}

/// Write the table to Parquet and its metadata to a JSON sidecar.
pub fn save_labelled_parquet(frame: &LabelledFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut df = frame.df.clone();
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;

    let sidecar = labels_sidecar_path(path);
    let json = serde_json::to_string_pretty(&frame.meta)?;
    std::fs::write(&sidecar, json)
        .with_context(|| format!("Failed to write label metadata: {}", sidecar.display()))?;
    Ok(())
}

/// Load a Parquet table written by [`save_labelled_parquet`].
///
/// A missing sidecar is not an error; the frame then has no metadata.
pub fn load_labelled_parquet(path: &Path) -> Result<LabelledFrame> {
    let mut frame = load_dataset(path)?;
    let sidecar = labels_sidecar_path(path);
    if sidecar.exists() {
        let json = std::fs::read_to_string(&sidecar)
            .with_context(|| format!("Failed to read label metadata: {}", sidecar.display()))?;
        let meta: HashMap<String, VariableMeta> = serde_json::from_str(&json)
            .with_context(|| format!("Invalid label metadata: {}", sidecar.display()))?;
        frame.meta = meta;
    }
    Ok(frame)
}
