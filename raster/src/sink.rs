//! Final pixel sink seam. The PNG encoder is one
//! implementation; a direct-to-GPU texture upload is another, entirely
//! outside this crate.

use crate::error::Result;

/// A raster produced by a [`RowSink`]; `bytes` is whatever `finish` decided
/// to hand back (a PNG byte stream for [`crate::png::PngEncoder`], raw RGBA
/// for an in-memory sink, etc).
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

pub trait RowSink {
    /// Called once before any row, with an optional RGB palette and an
    /// optional embedded ICC profile.
    fn init(&mut self, palette: Option<&[u8]>, icc: Option<&[u8]>) -> Result<()>;

    /// Called once per row, in strictly increasing row order.
    fn write_row(&mut self, row: &[u8]) -> Result<()>;

    fn finish(self: Box<Self>) -> Result<Raster>;
}
