//! Value label tables (`<value_labels>` section).

use std::collections::HashMap;

use super::constants::*;
use super::error::DtaError;
use super::reader::{decode_text, ByteReader};
use super::DtaHeader;
use crate::pipeline::frame::ValueLabels;

/// Reads every `<lbl>` table, keyed by label table name.
///
/// Each table stores `n` entries as parallel offset and value arrays followed
/// by a text blob; entry `i` is the NUL-terminated text starting at `off[i]`.
pub fn read_value_labels(
    reader: &mut ByteReader<'_>,
    header: &DtaHeader,
) -> Result<HashMap<String, ValueLabels>, DtaError> {
    let widths = header.release.widths();
    let encoding = header.release.encoding();
    let mut tables = HashMap::new();

    reader.seek(header.map[MAP_VALUE_LABELS])?;
    reader.expect_tag(TAG_VALUE_LABELS_OPEN)?;

    while !reader.peek_tag(TAG_VALUE_LABELS_CLOSE) {
        reader.expect_tag(TAG_LBL_OPEN)?;
        let _table_len = reader.read_u32()?;
        let name = reader.read_fixed_string(widths.value_label_name, encoding)?;
        reader.read_bytes(LBL_NAME_PADDING)?;

        let n = reader.read_i32()?.max(0) as usize;
        let text_len = reader.read_i32()?.max(0) as usize;
        let offsets = (0..n)
            .map(|_| reader.read_i32().map(|o| o.max(0) as usize))
            .collect::<Result<Vec<_>, _>>()?;
        let values = (0..n)
            .map(|_| reader.read_i32())
            .collect::<Result<Vec<_>, _>>()?;
        let text = reader.read_bytes(text_len)?;
        reader.expect_tag(TAG_LBL_CLOSE)?;

        let mut labels = ValueLabels::new();
        for (offset, value) in offsets.into_iter().zip(values) {
            let label = text
                .get(offset..)
                .map(|bytes| decode_text(bytes, encoding))
                .unwrap_or_default();
            labels.insert(value as i64, label);
        }
        tables.insert(name, labels);
    }

    Ok(tables)
}
