//! Baseline/progressive JPEG decoding.

mod decoder;
mod huffman;
mod idct;
mod marker;
mod tables;

pub use decoder::{ColorTransform, JpegDecoder};

use crate::error::Result;

/// Parse and fully decode a JPEG stream, ready for row-at-a-time readout via
/// [`JpegDecoder::try_read_row`].
pub fn open(data: &[u8]) -> Result<JpegDecoder> {
    JpegDecoder::new(data)
}
