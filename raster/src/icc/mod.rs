//! ICC color engine: profile parsing, TRC evaluators, 3-D CLUT
//! interpolation, and the rendering-intent pipeline, exposed to the rest of
//! the crate as a [`crate::colorspace::Sampler`] implementation.

mod clut;
mod engine;
mod lut;
mod profile;
mod trc;

pub use clut::Clut;
pub use engine::IccSampler;
pub use lut::LutPipeline;
pub use profile::{ColorSpaceSig, PcsSig, Profile, ProfileHeader};
pub use trc::Trc;
