//! Stata `.dta` header, section map and variable descriptor parsing.

use super::constants::*;
use super::error::DtaError;
use super::reader::{ByteOrder, ByteReader, TextEncoding};
use super::{DtaHeader, DtaRelease, DtaVariable, VariableType};

/// Parses the `<header>` and `<map>` sections.
///
/// # Errors
/// * `DtaError::InvalidMagic` - File does not start with `<stata_dta>`
/// * `DtaError::UnsupportedRelease` - Release other than 117, 118 or 119
/// * `DtaError::InvalidByteOrder` - Byte order marker is not LSF/MSF
pub fn parse_header(reader: &mut ByteReader<'_>) -> Result<DtaHeader, DtaError> {
    if !reader.peek_tag(TAG_FILE_OPEN) {
        return Err(DtaError::InvalidMagic);
    }
    reader.expect_tag(TAG_HEADER_OPEN)?;

    reader.expect_tag(TAG_RELEASE_OPEN)?;
    let release_text = String::from_utf8_lossy(reader.read_bytes(3)?).into_owned();
    let release = match release_text.as_str() {
        "117" => DtaRelease::V117,
        "118" => DtaRelease::V118,
        "119" => DtaRelease::V119,
        _ => {
            return Err(DtaError::UnsupportedRelease {
                release: release_text,
            })
        }
    };
    reader.expect_tag(TAG_RELEASE_CLOSE)?;

    reader.expect_tag(TAG_BYTEORDER_OPEN)?;
    let marker = String::from_utf8_lossy(reader.read_bytes(3)?).into_owned();
    let byte_order = match marker.as_str() {
        "LSF" => ByteOrder::Little,
        "MSF" => ByteOrder::Big,
        _ => return Err(DtaError::InvalidByteOrder { marker }),
    };
    reader.set_order(byte_order);
    reader.expect_tag(TAG_BYTEORDER_CLOSE)?;

    reader.expect_tag(TAG_K_OPEN)?;
    let n_vars = match release {
        DtaRelease::V119 => reader.read_u32()? as usize,
        _ => reader.read_u16()? as usize,
    };
    reader.expect_tag(TAG_K_CLOSE)?;

    reader.expect_tag(TAG_N_OPEN)?;
    let n_obs = match release {
        DtaRelease::V117 => reader.read_u32()? as u64,
        _ => reader.read_u64()?,
    };
    reader.expect_tag(TAG_N_CLOSE)?;

    let encoding = release.encoding();

    reader.expect_tag(TAG_LABEL_OPEN)?;
    let label_len = match release {
        DtaRelease::V117 => reader.read_u8()? as usize,
        _ => reader.read_u16()? as usize,
    };
    let dataset_label = reader.read_fixed_string(label_len, encoding)?;
    reader.expect_tag(TAG_LABEL_CLOSE)?;

    reader.expect_tag(TAG_TIMESTAMP_OPEN)?;
    let ts_len = reader.read_u8()? as usize;
    let timestamp = reader.read_fixed_string(ts_len, TextEncoding::Utf8)?;
    reader.expect_tag(TAG_TIMESTAMP_CLOSE)?;
    reader.expect_tag(TAG_HEADER_CLOSE)?;

    reader.expect_tag(TAG_MAP_OPEN)?;
    let mut map = [0u64; MAP_ENTRIES];
    for slot in map.iter_mut() {
        *slot = reader.read_u64()?;
    }

    Ok(DtaHeader {
        release,
        byte_order,
        n_vars,
        n_obs,
        dataset_label,
        timestamp,
        map,
    })
}

/// Parses the per-variable descriptor sections into [`DtaVariable`]s.
///
/// Sections are located through the header's section map rather than read
/// sequentially, so an unexpected `<sortlist>` layout does not matter.
pub fn parse_variables(
    reader: &mut ByteReader<'_>,
    header: &DtaHeader,
) -> Result<Vec<DtaVariable>, DtaError> {
    let widths = header.release.widths();
    let encoding = header.release.encoding();
    let k = header.n_vars;

    reader.seek(header.map[MAP_VARIABLE_TYPES])?;
    reader.expect_tag(TAG_VARIABLE_TYPES_OPEN)?;
    if k.saturating_mul(2) > reader.remaining() {
        return Err(DtaError::UnexpectedEof {
            offset: reader.position(),
            needed: k.saturating_mul(2),
        });
    }
    let mut types = Vec::with_capacity(k);
    for index in 0..k {
        let code = reader.read_u16()?;
        let var_type = VariableType::from_code(code)
            .ok_or(DtaError::UnknownVariableType { index, code })?;
        types.push(var_type);
    }

    reader.seek(header.map[MAP_VARNAMES])?;
    reader.expect_tag(TAG_VARNAMES_OPEN)?;
    let names = read_string_table(reader, k, widths.varname, encoding)?;

    reader.seek(header.map[MAP_FORMATS])?;
    reader.expect_tag(TAG_FORMATS_OPEN)?;
    let formats = read_string_table(reader, k, widths.format, encoding)?;

    reader.seek(header.map[MAP_VALUE_LABEL_NAMES])?;
    reader.expect_tag(TAG_VALUE_LABEL_NAMES_OPEN)?;
    let value_label_names = read_string_table(reader, k, widths.value_label_name, encoding)?;

    reader.seek(header.map[MAP_VARIABLE_LABELS])?;
    reader.expect_tag(TAG_VARIABLE_LABELS_OPEN)?;
    let labels = read_string_table(reader, k, widths.variable_label, encoding)?;

    let mut offset = 0usize;
    let mut variables = Vec::with_capacity(k);
    for i in 0..k {
        let var_type = types[i];
        variables.push(DtaVariable {
            name: names[i].clone(),
            var_type,
            offset,
            format: formats[i].clone(),
            value_label_name: value_label_names[i].clone(),
            label: labels[i].clone(),
        });
        offset += var_type.width();
    }

    Ok(variables)
}

fn read_string_table(
    reader: &mut ByteReader<'_>,
    count: usize,
    width: usize,
    encoding: TextEncoding,
) -> Result<Vec<String>, DtaError> {
    (0..count)
        .map(|_| reader.read_fixed_string(width, encoding))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_stata_bytes() {
        let mut reader = ByteReader::new(b"PAR1 not a stata file");
        assert!(matches!(parse_header(&mut reader), Err(DtaError::InvalidMagic)));
    }

    #[test]
    fn test_rejects_old_release() {
        let bytes = b"<stata_dta><header><release>115</release>";
        let mut reader = ByteReader::new(bytes);
        match parse_header(&mut reader) {
            Err(DtaError::UnsupportedRelease { release }) => assert_eq!(release, "115"),
            other => panic!("Expected UnsupportedRelease, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_byte_order() {
        let bytes = b"<stata_dta><header><release>118</release><byteorder>XYZ</byteorder>";
        let mut reader = ByteReader::new(bytes);
        assert!(matches!(
            parse_header(&mut reader),
            Err(DtaError::InvalidByteOrder { .. })
        ));
    }

    #[test]
    fn test_truncated_header_reports_eof() {
        let bytes = b"<stata_dta><header><release>118</release><byteorder>LSF</byteorder><K>";
        let mut reader = ByteReader::new(bytes);
        assert!(matches!(
            parse_header(&mut reader),
            Err(DtaError::UnexpectedEof { .. })
        ));
    }
}
