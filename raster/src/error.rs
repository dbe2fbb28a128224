//! The five error kinds of the decode pipeline, as a single enum.
//!
//! Decoders never panic on malformed input. Every fallible entry point in
//! this crate returns `Result<T>`; callers (here: `pdf::object::types::xobject`)
//! decide whether a failure is recoverable (emit a fallback raster) or fatal.

use std::fmt;

#[derive(Debug, Snafu)]
pub enum RasterError {
    /// Peek past end of bit stream, missing marker, partial chunk.
    #[snafu(display("truncated input: {}", what))]
    Truncated { what: &'static str },

    /// Huffman miss, invalid CCITT run, bad predictor byte.
    #[snafu(display("malformed codeword in {}: {}", where_, detail))]
    Malformed { where_: &'static str, detail: String },

    /// Declared component count disagrees with detected, bpc not supported, etc.
    #[snafu(display("semantic mismatch: {}", detail))]
    SemanticMismatch { detail: String },

    /// Sample table / dimension exceeds a configured cap.
    #[snafu(display("oversize: {} (limit {})", what, limit))]
    Oversize { what: &'static str, limit: usize },

    /// A feature this crate does not implement (e.g. full JPX wavelet decode).
    #[snafu(display("unsupported feature: {}", what))]
    Unsupported { what: &'static str },
}

pub type Result<T> = std::result::Result<T, RasterError>;

impl RasterError {
    pub fn truncated(what: &'static str) -> Self {
        RasterError::Truncated { what }
    }
    pub fn malformed(where_: &'static str, detail: impl fmt::Display) -> Self {
        RasterError::Malformed { where_, detail: detail.to_string() }
    }
    pub fn semantic(detail: impl fmt::Display) -> Self {
        RasterError::SemanticMismatch { detail: detail.to_string() }
    }
    pub fn oversize(what: &'static str, limit: usize) -> Self {
        RasterError::Oversize { what, limit }
    }
    pub fn unsupported(what: &'static str) -> Self {
        RasterError::Unsupported { what }
    }
}
