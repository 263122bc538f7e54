//! Shared test utilities and fixture generators

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use fta_equity::config::{PipelineConfig, RoleColumns};
use fta_equity::model::{SearchConfig, SearchGrid};
use fta_equity::pipeline::demographics::DemographicColumns;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

/// Create a synthetic pretrial release table.
///
/// Columns:
/// - `case_id`: not catalogued, never retained
/// - `fta`: 0/1 outcome, more likely with more priors and a felony charge
/// - `priors`, `charge`: features
/// - `sex`, `age`, `race_white`, `race_black`, `latinx`: demographics
/// - `released`, `bail_set`, `bail_amount`: decision columns
///
/// About 5% of ages are the sentinel `99`.
pub fn create_pretrial_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut case_id = Vec::with_capacity(rows);
    let mut fta = Vec::with_capacity(rows);
    let mut priors = Vec::with_capacity(rows);
    let mut charge = Vec::with_capacity(rows);
    let mut sex = Vec::with_capacity(rows);
    let mut age = Vec::with_capacity(rows);
    let mut race_white = Vec::with_capacity(rows);
    let mut race_black = Vec::with_capacity(rows);
    let mut latinx = Vec::with_capacity(rows);
    let mut released = Vec::with_capacity(rows);
    let mut bail_set = Vec::with_capacity(rows);
    let mut bail_amount = Vec::with_capacity(rows);

    for i in 0..rows {
        let n_priors: i64 = rng.gen_range(0..6);
        let felony = rng.gen_bool(0.4);
        let p_fta = 0.1 + 0.1 * n_priors as f64 + if felony { 0.15 } else { 0.0 };
        let failed = rng.gen_bool(p_fta.min(0.9));

        let white = rng.gen_bool(0.5);
        let bail = rng.gen_bool(if failed { 0.6 } else { 0.3 });

        case_id.push(i as i64);
        fta.push(failed as i64);
        priors.push(n_priors);
        charge.push(if felony { "Felony" } else { "Misdemeanor" });
        sex.push(if rng.gen_bool(0.7) { "Male" } else { "Female" });
        age.push(if rng.gen_bool(0.05) {
            99.0
        } else {
            rng.gen_range(18..76) as f64
        });
        race_white.push(white as i64);
        race_black.push((!white) as i64);
        latinx.push(if rng.gen_bool(0.2) { "Yes" } else { "No" });
        released.push(rng.gen_bool(0.8) as i64);
        bail_set.push(bail as i64);
        bail_amount.push(if bail {
            500.0 * rng.gen_range(1..11) as f64
        } else {
            0.0
        });
    }

    df! {
        "case_id" => case_id,
        "fta" => fta,
        "priors" => priors,
        "charge" => charge,
        "sex" => sex,
        "age" => age,
        "race_white" => race_white,
        "race_black" => race_black,
        "latinx" => latinx,
        "released" => released,
        "bail_set" => bail_set,
        "bail_amount" => bail_amount,
    }
    .unwrap()
}

/// Catalog rows matching [`create_pretrial_dataframe`], plus one variable
/// that is never present in the data.
pub const PRETRIAL_CATALOG: &str = "\
variable,keep,outcome,discrim,label
fta,,TRUE,,Failed to appear
priors,TRUE,,,Prior failures to appear
charge,TRUE,,,Top charge severity
sex,,,TRUE,Gender
age,,,TRUE,Age at arrest
race_white,,,TRUE,White
race_black,,,TRUE,Black
latinx,,,TRUE,Latinx
released,,,,Released pretrial
bail_set,,,,Bail set
bail_amount,,,,Bail amount
court_zip,TRUE,,,Court ZIP code
";

/// Write `contents` to `name` inside `dir`.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Write a DataFrame to CSV inside `dir`.
pub fn write_csv(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    path
}

/// A temporary directory holding `data.csv` and `catalog.csv`.
pub struct PretrialFixture {
    pub dir: TempDir,
    pub data: PathBuf,
    pub catalog: PathBuf,
}

impl PretrialFixture {
    pub fn new(rows: usize, seed: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let mut df = create_pretrial_dataframe(rows, seed);
        let data = write_csv(dir.path(), "data.csv", &mut df);
        let catalog = write_file(dir.path(), "catalog.csv", PRETRIAL_CATALOG);
        Self { dir, data, catalog }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    /// Role columns for every decision and demographic column.
    pub fn roles() -> RoleColumns {
        RoleColumns {
            outcome: "fta".to_string(),
            released: Some("released".to_string()),
            bail_set: Some("bail_set".to_string()),
            bail_amount: Some("bail_amount".to_string()),
            demographics: DemographicColumns {
                gender: Some("sex".to_string()),
                age: Some("age".to_string()),
                race_white: Some("race_white".to_string()),
                race_black: Some("race_black".to_string()),
                latinx: Some("latinx".to_string()),
            },
        }
    }

    /// Pipeline settings with a grid small enough for tests.
    pub fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new(&self.data, &self.catalog, self.output_dir(), "fta");
        config.roles = Self::roles();
        config.search = tiny_search();
        config
    }
}

/// Two depths, one shrinkage, trees in steps of 10 up to 30, 2 folds.
pub fn tiny_search() -> SearchConfig {
    SearchConfig::default()
        .with_grid(SearchGrid {
            n_trees: SearchGrid::tree_steps(30, 10),
            depths: vec![1, 2],
            shrinkages: vec![0.1],
        })
        .with_folds(2)
        .with_min_leaf(5)
}

// ============================================================================
// Minimal Stata release 118 writer
// ============================================================================

/// One variable for [`write_dta_118`].
pub enum DtaColumn {
    Double {
        name: &'static str,
        label: &'static str,
        values: Vec<Option<f64>>,
        /// Name of a value label table, or empty.
        value_labels: &'static str,
    },
    Str {
        name: &'static str,
        label: &'static str,
        width: u16,
        values: Vec<String>,
    },
}

impl DtaColumn {
    fn name(&self) -> &str {
        match self {
            DtaColumn::Double { name, .. } | DtaColumn::Str { name, .. } => name,
        }
    }

    fn label(&self) -> &str {
        match self {
            DtaColumn::Double { label, .. } | DtaColumn::Str { label, .. } => label,
        }
    }

    fn type_code(&self) -> u16 {
        match self {
            DtaColumn::Double { .. } => 65526,
            DtaColumn::Str { width, .. } => *width,
        }
    }

    fn len(&self) -> usize {
        match self {
            DtaColumn::Double { values, .. } => values.len(),
            DtaColumn::Str { values, .. } => values.len(),
        }
    }
}

/// Stata's system missing value for doubles.
const DOUBLE_MISSING: f64 = 8.98846567431158e307;

fn padded(text: &str, width: usize) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(width, 0);
    bytes
}

/// Serialise a little-endian release 118 file with one optional value
/// label table.
pub fn write_dta_118(
    columns: &[DtaColumn],
    label_table: Option<(&str, &[(i32, &str)])>,
) -> Vec<u8> {
    let k = columns.len();
    let n = columns.first().map_or(0, DtaColumn::len);
    let mut out: Vec<u8> = Vec::new();
    let mut map = [0u64; 14];

    out.extend_from_slice(b"<stata_dta><header><release>118</release><byteorder>LSF</byteorder>");
    out.extend_from_slice(b"<K>");
    out.extend_from_slice(&(k as u16).to_le_bytes());
    out.extend_from_slice(b"</K><N>");
    out.extend_from_slice(&(n as u64).to_le_bytes());
    out.extend_from_slice(b"</N><label>");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(b"</label><timestamp>");
    out.push(0);
    out.extend_from_slice(b"</timestamp></header>");

    map[1] = out.len() as u64;
    out.extend_from_slice(b"<map>");
    let map_pos = out.len();
    out.extend_from_slice(&[0u8; 14 * 8]);
    out.extend_from_slice(b"</map>");

    map[2] = out.len() as u64;
    out.extend_from_slice(b"<variable_types>");
    for c in columns {
        out.extend_from_slice(&c.type_code().to_le_bytes());
    }
    out.extend_from_slice(b"</variable_types>");

    map[3] = out.len() as u64;
    out.extend_from_slice(b"<varnames>");
    for c in columns {
        out.extend(padded(c.name(), 129));
    }
    out.extend_from_slice(b"</varnames>");

    map[4] = out.len() as u64;
    out.extend_from_slice(b"<sortlist>");
    out.extend(vec![0u8; (k + 1) * 2]);
    out.extend_from_slice(b"</sortlist>");

    map[5] = out.len() as u64;
    out.extend_from_slice(b"<formats>");
    for c in columns {
        let format = match c {
            DtaColumn::Double { .. } => "%10.0g".to_string(),
            DtaColumn::Str { width, .. } => format!("%{}s", width),
        };
        out.extend(padded(&format, 57));
    }
    out.extend_from_slice(b"</formats>");

    map[6] = out.len() as u64;
    out.extend_from_slice(b"<value_label_names>");
    for c in columns {
        let name = match c {
            DtaColumn::Double { value_labels, .. } => *value_labels,
            DtaColumn::Str { .. } => "",
        };
        out.extend(padded(name, 129));
    }
    out.extend_from_slice(b"</value_label_names>");

    map[7] = out.len() as u64;
    out.extend_from_slice(b"<variable_labels>");
    for c in columns {
        out.extend(padded(c.label(), 321));
    }
    out.extend_from_slice(b"</variable_labels>");

    map[8] = out.len() as u64;
    out.extend_from_slice(b"<characteristics></characteristics>");

    map[9] = out.len() as u64;
    out.extend_from_slice(b"<data>");
    for row in 0..n {
        for c in columns {
            match c {
                DtaColumn::Double { values, .. } => {
                    let v = values[row].unwrap_or(DOUBLE_MISSING);
                    out.extend_from_slice(&v.to_le_bytes());
                }
                DtaColumn::Str { width, values, .. } => {
                    out.extend(padded(&values[row], *width as usize));
                }
            }
        }
    }
    out.extend_from_slice(b"</data>");

    map[10] = out.len() as u64;
    out.extend_from_slice(b"<strls></strls>");

    map[11] = out.len() as u64;
    out.extend_from_slice(b"<value_labels>");
    if let Some((name, entries)) = label_table {
        let mut text = Vec::new();
        let mut offsets = Vec::new();
        for (_, label) in entries {
            offsets.push(text.len() as i32);
            text.extend_from_slice(label.as_bytes());
            text.push(0);
        }
        let body_len = 8 + entries.len() * 8 + text.len();

        out.extend_from_slice(b"<lbl>");
        out.extend_from_slice(&(body_len as u32).to_le_bytes());
        out.extend(padded(name, 129));
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&(entries.len() as i32).to_le_bytes());
        out.extend_from_slice(&(text.len() as i32).to_le_bytes());
        for offset in &offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        for (value, _) in entries {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&text);
        out.extend_from_slice(b"</lbl>");
    }
    out.extend_from_slice(b"</value_labels>");

    map[12] = out.len() as u64;
    out.extend_from_slice(b"</stata_dta>");
    map[13] = out.len() as u64;

    for (i, offset) in map.iter().enumerate() {
        let at = map_pos + i * 8;
        out[at..at + 8].copy_from_slice(&offset.to_le_bytes());
    }
    out
}
