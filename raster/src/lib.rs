//! Image and color decoding core extracted from the PDF rendering pipeline.
//!
//! Owns decoding CCITT fax / JPEG / JPEG2000-header image data row by row,
//! running pixels through an ICC color engine, and streaming the result
//! out as PNG. PDF object parsing, content-stream interpretation, font
//! rasterization and everything else stays upstream; this crate is called
//! into through the types in [`image`] and [`sink`].

#[macro_use] extern crate snafu;
#[macro_use] extern crate log;

pub mod error;
pub mod bitio;
pub mod filters;
pub mod ccitt;
pub mod jpeg;
pub mod jpx;
pub mod icc;
pub mod colorspace;
pub mod cmap;
pub mod rowconv;
pub mod rowproc;
pub mod png;
pub mod image;
pub mod sink;

pub use error::{RasterError, Result};
