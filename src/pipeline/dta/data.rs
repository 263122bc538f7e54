//! Data section and strL (long string) extraction.
//!
//! Observations are stored row-major with fixed widths per variable. Long
//! strings (`strL`) are stored once in the `<strls>` section and referenced
//! from the data section by a `(variable, observation)` key.

use std::collections::HashMap;

use polars::prelude::*;

use super::constants::*;
use super::error::DtaError;
use super::reader::{decode_text, ByteReader};
use super::{DtaHeader, DtaRelease, DtaVariable, VariableType};

/// Per-column value accumulator filled while scanning rows.
#[derive(Debug, Clone)]
pub enum ColumnBuffer {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    /// Unresolved strL references, `None` for the empty string.
    Strl(Vec<Option<(u64, u64)>>),
}

impl ColumnBuffer {
    fn for_type(var_type: VariableType, capacity: usize) -> Self {
        match var_type {
            VariableType::Str(_) => ColumnBuffer::Text(Vec::with_capacity(capacity)),
            VariableType::StrL => ColumnBuffer::Strl(Vec::with_capacity(capacity)),
            _ => ColumnBuffer::Numeric(Vec::with_capacity(capacity)),
        }
    }
}

/// Convert a raw `byte` to a value, mapping Stata missing codes to `None`.
pub fn byte_value(raw: i8) -> Option<f64> {
    (raw <= BYTE_MAX_VALID).then_some(raw as f64)
}

/// Convert a raw `int` to a value, mapping Stata missing codes to `None`.
pub fn int_value(raw: i16) -> Option<f64> {
    (raw <= INT_MAX_VALID).then_some(raw as f64)
}

/// Convert a raw `long` to a value, mapping Stata missing codes to `None`.
pub fn long_value(raw: i32) -> Option<f64> {
    (raw <= LONG_MAX_VALID).then_some(raw as f64)
}

/// Convert raw `float` bits to a value, mapping Stata missing codes to `None`.
///
/// Missing values occupy the positive range above the largest valid float,
/// so the comparison is done on the value rather than the sign-carrying bits.
pub fn float_value(bits: u32) -> Option<f64> {
    let value = f32::from_bits(bits);
    if value.is_nan() || value > f32::from_bits(FLOAT_MAX_VALID_BITS) {
        None
    } else {
        Some(value as f64)
    }
}

/// Convert raw `double` bits to a value, mapping Stata missing codes to `None`.
pub fn double_value(bits: u64) -> Option<f64> {
    let value = f64::from_bits(bits);
    if value.is_nan() || value > f64::from_bits(DOUBLE_MAX_VALID_BITS) {
        None
    } else {
        Some(value)
    }
}

/// Observation count as `usize`, rejected when the records cannot fit in
/// the bytes that remain.
fn checked_observations(
    n_obs: u64,
    variables: &[DtaVariable],
    available: usize,
) -> Result<usize, DtaError> {
    let record_width: usize = variables.iter().map(|v| v.var_type.width()).sum();
    if record_width == 0 {
        return Ok(0);
    }
    usize::try_from(n_obs)
        .ok()
        .filter(|n| n.checked_mul(record_width).is_some_and(|needed| needed <= available))
        .ok_or(DtaError::ObservationCount {
            n_obs,
            record_width,
            available,
        })
}

/// Reads every observation in the `<data>` section.
pub fn read_data(
    reader: &mut ByteReader<'_>,
    header: &DtaHeader,
    variables: &[DtaVariable],
) -> Result<Vec<ColumnBuffer>, DtaError> {
    let encoding = header.release.encoding();

    reader.seek(header.map[MAP_DATA])?;
    reader.expect_tag(TAG_DATA_OPEN)?;
    let n_obs = checked_observations(header.n_obs, variables, reader.remaining())?;

    let mut buffers: Vec<ColumnBuffer> = variables
        .iter()
        .map(|v| ColumnBuffer::for_type(v.var_type, n_obs))
        .collect();

    for _ in 0..n_obs {
        for (variable, buffer) in variables.iter().zip(buffers.iter_mut()) {
            match (variable.var_type, buffer) {
                (VariableType::Byte, ColumnBuffer::Numeric(values)) => {
                    values.push(byte_value(reader.read_i8()?))
                }
                (VariableType::Int, ColumnBuffer::Numeric(values)) => {
                    values.push(int_value(reader.read_i16()?))
                }
                (VariableType::Long, ColumnBuffer::Numeric(values)) => {
                    values.push(long_value(reader.read_i32()?))
                }
                (VariableType::Float, ColumnBuffer::Numeric(values)) => {
                    values.push(float_value(reader.read_u32()?))
                }
                (VariableType::Double, ColumnBuffer::Numeric(values)) => {
                    values.push(double_value(reader.read_u64()?))
                }
                (VariableType::Str(width), ColumnBuffer::Text(values)) => {
                    let text = reader.read_fixed_string(width as usize, encoding)?;
                    values.push(non_empty(text));
                }
                (VariableType::StrL, ColumnBuffer::Strl(values)) => {
                    let (v, o) = read_strl_reference(reader, header.release)?;
                    values.push(if v == 0 && o == 0 { None } else { Some((v, o)) });
                }
                // Buffers are built from the same variable list
                _ => unreachable!("column buffer does not match variable type"),
            }
        }
    }

    Ok(buffers)
}

fn read_strl_reference(
    reader: &mut ByteReader<'_>,
    release: DtaRelease,
) -> Result<(u64, u64), DtaError> {
    let (v_width, o_width) = match release {
        DtaRelease::V117 => (4, 4),
        DtaRelease::V118 => (2, 6),
        DtaRelease::V119 => (3, 5),
    };
    let v = reader.read_uint(v_width)?;
    let o = reader.read_uint(o_width)?;
    Ok((v, o))
}

/// Reads the `<strls>` section into a `(v, o) -> text` lookup.
pub fn read_strls(
    reader: &mut ByteReader<'_>,
    header: &DtaHeader,
) -> Result<HashMap<(u64, u64), String>, DtaError> {
    let encoding = header.release.encoding();
    let mut strls = HashMap::new();

    reader.seek(header.map[MAP_STRLS])?;
    reader.expect_tag(TAG_STRLS_OPEN)?;

    while !reader.peek_tag(TAG_STRLS_CLOSE) {
        reader.expect_tag(GSO_SIGNATURE)?;
        let v = reader.read_u32()? as u64;
        let o = match header.release {
            DtaRelease::V117 => reader.read_u32()? as u64,
            _ => reader.read_u64()?,
        };
        let content_type = reader.read_u8()?;
        let len = reader.read_u32()? as usize;
        let bytes = reader.read_bytes(len)?;
        let text = if content_type == GSO_TYPE_ASCII {
            decode_text(bytes, encoding)
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        };
        strls.insert((v, o), text);
    }

    Ok(strls)
}

/// Builds polars columns, resolving strL references against `strls`.
pub fn build_columns(
    variables: &[DtaVariable],
    buffers: Vec<ColumnBuffer>,
    strls: &HashMap<(u64, u64), String>,
) -> Result<Vec<Column>, DtaError> {
    let mut columns = Vec::with_capacity(variables.len());

    for (variable, buffer) in variables.iter().zip(buffers) {
        let name: PlSmallStr = variable.name.as_str().into();
        let column = match buffer {
            ColumnBuffer::Numeric(values) => Column::new(name, values),
            ColumnBuffer::Text(values) => Column::new(name, values),
            ColumnBuffer::Strl(refs) => {
                let mut values: Vec<Option<String>> = Vec::with_capacity(refs.len());
                for (row, reference) in refs.into_iter().enumerate() {
                    match reference {
                        None => values.push(None),
                        Some((v, o)) => {
                            let text = strls.get(&(v, o)).ok_or_else(|| DtaError::MissingStrl {
                                column: variable.name.clone(),
                                row: row as u64,
                                v,
                                o,
                            })?;
                            values.push(non_empty(text.clone()));
                        }
                    }
                }
                Column::new(name, values)
            }
        };
        columns.push(column);
    }

    Ok(columns)
}

/// Stata stores a missing string as the empty string.
fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
