//! Error types for Stata `.dta` file parsing.
//!
//! Each variant captures a specific failure mode while validating the file
//! envelope, decoding variable metadata, or reconstructing column values.

use polars::prelude::PolarsError;

/// Errors that can occur when parsing Stata `.dta` files.
#[derive(Debug, thiserror::Error)]
pub enum DtaError {
    /// File does not start with the `<stata_dta>` tag.
    ///
    /// Releases before 117 use a headerless binary layout and are reported
    /// here as well.
    #[error("Invalid Stata file: missing <stata_dta> signature")]
    InvalidMagic,

    /// The `<release>` tag holds a release this reader does not support.
    #[error("Unsupported Stata release '{release}' (supported: 117, 118, 119)")]
    UnsupportedRelease {
        /// Release string found in the header
        release: String,
    },

    /// The `<byteorder>` tag is neither `LSF` nor `MSF`.
    #[error("Invalid byte order marker '{marker}'")]
    InvalidByteOrder {
        /// Marker text found in the header
        marker: String,
    },

    /// An expected section tag was not found.
    #[error("Expected tag {tag} at byte offset {offset}")]
    MissingTag {
        /// The tag that was expected
        tag: String,
        /// Byte offset where the tag should start
        offset: u64,
    },

    /// The file ended before a field could be read.
    #[error("Unexpected end of file: needed {needed} bytes at offset {offset}")]
    UnexpectedEof {
        /// Byte offset of the read
        offset: u64,
        /// Number of bytes requested
        needed: usize,
    },

    /// The header's observation count needs more bytes than the data
    /// section holds.
    #[error("{n_obs} records of {record_width} bytes exceed the {available} bytes left")]
    ObservationCount {
        /// Observation count from the `<N>` tag
        n_obs: u64,
        /// Bytes per observation record
        record_width: usize,
        /// Bytes left after the `<data>` tag
        available: usize,
    },

    /// A variable carries a type code outside the documented set.
    #[error("Unknown type code {code} for variable {index}")]
    UnknownVariableType {
        /// Zero-based variable index
        index: usize,
        /// Raw type code
        code: u16,
    },

    /// A strL reference in the data section points to no GSO entry.
    #[error("Column '{column}' row {row} references missing strL ({v}, {o})")]
    MissingStrl {
        /// Column name
        column: String,
        /// Zero-based row index
        row: u64,
        /// Variable component of the reference
        v: u64,
        /// Observation component of the reference
        o: u64,
    },

    /// Assembling the polars DataFrame failed.
    #[error("Failed to build DataFrame: {0}")]
    Frame(#[from] PolarsError),

    /// I/O error occurred while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
