//! Binary format constants for the Stata `.dta` file format (releases 117-119).
//!
//! Releases 117 and later wrap every section in XML-like tags and store a
//! section map of 14 file offsets right after the header.

// ============================================================================
// Section Tags
// ============================================================================

pub const TAG_FILE_OPEN: &[u8] = b"<stata_dta>";
pub const TAG_HEADER_OPEN: &[u8] = b"<header>";
pub const TAG_RELEASE_OPEN: &[u8] = b"<release>";
pub const TAG_RELEASE_CLOSE: &[u8] = b"</release>";
pub const TAG_BYTEORDER_OPEN: &[u8] = b"<byteorder>";
pub const TAG_BYTEORDER_CLOSE: &[u8] = b"</byteorder>";
pub const TAG_K_OPEN: &[u8] = b"<K>";
pub const TAG_K_CLOSE: &[u8] = b"</K>";
pub const TAG_N_OPEN: &[u8] = b"<N>";
pub const TAG_N_CLOSE: &[u8] = b"</N>";
pub const TAG_LABEL_OPEN: &[u8] = b"<label>";
pub const TAG_LABEL_CLOSE: &[u8] = b"</label>";
pub const TAG_TIMESTAMP_OPEN: &[u8] = b"<timestamp>";
pub const TAG_TIMESTAMP_CLOSE: &[u8] = b"</timestamp>";
pub const TAG_HEADER_CLOSE: &[u8] = b"</header>";
pub const TAG_MAP_OPEN: &[u8] = b"<map>";
pub const TAG_VARIABLE_TYPES_OPEN: &[u8] = b"<variable_types>";
pub const TAG_VARNAMES_OPEN: &[u8] = b"<varnames>";
pub const TAG_FORMATS_OPEN: &[u8] = b"<formats>";
pub const TAG_VALUE_LABEL_NAMES_OPEN: &[u8] = b"<value_label_names>";
pub const TAG_VARIABLE_LABELS_OPEN: &[u8] = b"<variable_labels>";
pub const TAG_DATA_OPEN: &[u8] = b"<data>";
pub const TAG_STRLS_OPEN: &[u8] = b"<strls>";
pub const TAG_STRLS_CLOSE: &[u8] = b"</strls>";
pub const TAG_VALUE_LABELS_OPEN: &[u8] = b"<value_labels>";
pub const TAG_VALUE_LABELS_CLOSE: &[u8] = b"</value_labels>";
pub const TAG_LBL_OPEN: &[u8] = b"<lbl>";
pub const TAG_LBL_CLOSE: &[u8] = b"</lbl>";
pub const GSO_SIGNATURE: &[u8] = b"GSO";

// ============================================================================
// Section Map
// ============================================================================

/// Number of u64 offsets stored in `<map>`.
pub const MAP_ENTRIES: usize = 14;

pub const MAP_VARIABLE_TYPES: usize = 2;
pub const MAP_VARNAMES: usize = 3;
pub const MAP_FORMATS: usize = 5;
pub const MAP_VALUE_LABEL_NAMES: usize = 6;
pub const MAP_VARIABLE_LABELS: usize = 7;
pub const MAP_DATA: usize = 9;
pub const MAP_STRLS: usize = 10;
pub const MAP_VALUE_LABELS: usize = 11;

// ============================================================================
// Variable Type Codes
// ============================================================================

/// Largest fixed-width string type code (`str2045`).
pub const TYPE_STR_MAX: u16 = 2045;
pub const TYPE_STRL: u16 = 32768;
pub const TYPE_DOUBLE: u16 = 65526;
pub const TYPE_FLOAT: u16 = 65527;
pub const TYPE_LONG: u16 = 65528;
pub const TYPE_INT: u16 = 65529;
pub const TYPE_BYTE: u16 = 65530;

// ============================================================================
// Missing Value Thresholds
// ============================================================================
//
// Stata reserves the top of each numeric range for the system missing value
// `.` and the extended missing values `.a` through `.z`.

/// Largest non-missing `byte` value.
pub const BYTE_MAX_VALID: i8 = 100;
/// Largest non-missing `int` value.
pub const INT_MAX_VALID: i16 = 32_740;
/// Largest non-missing `long` value.
pub const LONG_MAX_VALID: i32 = 2_147_483_620;
/// Bit pattern of the largest non-missing `float` value.
pub const FLOAT_MAX_VALID_BITS: u32 = 0x7eff_ffff;
/// Bit pattern of the largest non-missing `double` value.
pub const DOUBLE_MAX_VALID_BITS: u64 = 0x7fdf_ffff_ffff_ffff;

// ============================================================================
// Release-dependent field widths
// ============================================================================

/// Field widths that differ between releases 117 and 118/119.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldWidths {
    pub varname: usize,
    pub format: usize,
    pub value_label_name: usize,
    pub variable_label: usize,
}

pub const WIDTHS_117: FieldWidths = FieldWidths {
    varname: 33,
    format: 49,
    value_label_name: 33,
    variable_label: 81,
};

pub const WIDTHS_118: FieldWidths = FieldWidths {
    varname: 129,
    format: 57,
    value_label_name: 129,
    variable_label: 321,
};

/// Padding bytes between a value label table's name and its body.
pub const LBL_NAME_PADDING: usize = 3;

/// GSO content type for null-terminated ASCII strings.
pub const GSO_TYPE_ASCII: u8 = 130;
