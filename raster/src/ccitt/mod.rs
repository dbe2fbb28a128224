//! CCITT Group 3/4 fax decoding entry point.

mod decoder;
mod tables;

pub use decoder::{BitRaster, CcittParams, K};

use crate::error::Result;

/// Decode a CCITT-encoded image stream into a packed 1-bpp raster.
///
/// `params.rows == 0` means the row count is unknown ahead of time; decoding
/// continues until the input is exhausted or an `EndOfBlock` marker is seen.
pub fn decode_ccitt(data: &[u8], params: &CcittParams) -> Result<BitRaster> {
    decoder::decode(data, params)
}
