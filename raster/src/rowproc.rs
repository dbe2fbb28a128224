//! Per-row decode/mask/color/palette fan-out.
//!
//! Sits between the format decoder (or row converter) and the PNG row
//! encoder. Three output modes, chosen once per image by
//! [`RowProcessor::choose_mode`]:
//!
//! - `Passthrough` — samples pass through unchanged (e.g. an `Indexed`
//!   image whose palette the sink can carry as PLTE directly).
//! - `Rgba` — every sample is resolved through the color space to RGBA.
//! - `Stencil` — 1-bit image masks: one bit per pixel, no color at all.

use crate::bitio::UintBitWriter;
use crate::colorspace::{resolve_sample, ColorSpaceVariant, RgbaF32, Sampler};
use crate::error::{RasterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMode {
    /// `Indexed` (real palette) or a single-component non-indexed space with
    /// `bpc <= 8` (synthesized palette): samples pass through as one byte
    /// per index, the palette is built once up front.
    Passthrough,
    /// `DeviceGray`/`DeviceRGB` with a PNG-representable bit depth: samples
    /// pass through re-packed at their native bit depth, no palette.
    Native,
    Rgba,
    Stencil,
}

/// Two floats per component giving an affine remap of the raw sample code
/// into the component's declared value range.
#[derive(Clone)]
pub struct DecodeArray(pub Vec<(f32, f32)>);

impl DecodeArray {
    pub fn identity(component_count: usize, max_value: f32) -> Self {
        DecodeArray(vec![(0.0, max_value); component_count])
    }

    pub fn apply(&self, component: usize, raw: f32, max_value: f32) -> f32 {
        match self.0.get(component) {
            Some(&(dmin, dmax)) => dmin + raw * (dmax - dmin) / max_value,
            None => raw,
        }
    }
}

/// Inclusive `[min,max]` sample-code range per component; a sample whose
/// every component falls inside its range is treated as fully transparent.
#[derive(Clone)]
pub struct ColorKeyMask(pub Vec<(u32, u32)>);

impl ColorKeyMask {
    pub fn matches(&self, raw_components: &[u32]) -> bool {
        if self.0.len() != raw_components.len() {
            return false;
        }
        raw_components.iter().zip(&self.0).all(|(&v, &(lo, hi))| v >= lo && v <= hi)
    }
}

pub struct RowProcessorConfig<'a> {
    pub bits_per_component: u8,
    pub component_count: usize,
    pub color_space: &'a ColorSpaceVariant,
    pub decode_array: Option<DecodeArray>,
    pub mask_array: Option<ColorKeyMask>,
    pub is_image_mask: bool,
}

pub struct RowProcessor<'a> {
    config: RowProcessorConfig<'a>,
    mode: RowMode,
    max_value: f32,
}

impl<'a> RowProcessor<'a> {
    pub fn new(config: RowProcessorConfig<'a>) -> Result<Self> {
        if !matches!(config.bits_per_component, 1 | 2 | 4 | 8 | 16) {
            return Err(RasterError::semantic(format!("unsupported bits_per_component {}", config.bits_per_component)));
        }
        let mode = Self::choose_mode(&config);
        let max_value = ((1u32 << config.bits_per_component) - 1) as f32;
        Ok(RowProcessor { config, mode, max_value })
    }

    /// The "should-convert" decision tree, checked in order:
    /// 1. `ImageMask` always wins as `Stencil`.
    /// 2. Any decode array or color-key mask forces `Rgba` (both need the
    ///    per-pixel float path).
    /// 3. `Indexed` passes indices straight through with a real palette.
    /// 4. `IccBased` converts to `Rgba` — this core has no consumer that
    ///    accepts an embedded ICC profile faithfully, so the "unless"
    ///    clause never applies.
    /// 5. `DeviceGray`/`DeviceRGB` pass through natively, provided the bit
    ///    depth is one PNG can carry for that color type (any of
    ///    1/2/4/8/16 for gray, 8/16 for RGB truecolor).
    /// 6. A single-component space otherwise, with `bpc <= 8`, passes
    ///    indices through with a synthesized palette.
    /// 7. Everything else converts to `Rgba`.
    ///
    /// Public so a caller assembling a [`crate::sink::RowSink`] ahead of
    /// time (e.g. to pick a PNG color type) can predict the mode from an
    /// `ImageDescriptor`'s fields without constructing the full processor.
    pub fn choose_mode(config: &RowProcessorConfig) -> RowMode {
        if config.is_image_mask {
            return RowMode::Stencil;
        }
        if config.decode_array.is_some() || config.mask_array.is_some() {
            return RowMode::Rgba;
        }
        match config.color_space {
            ColorSpaceVariant::Indexed { .. } => RowMode::Passthrough,
            ColorSpaceVariant::IccBased { .. } => RowMode::Rgba,
            ColorSpaceVariant::DeviceGray => RowMode::Native,
            ColorSpaceVariant::DeviceRgb if matches!(config.bits_per_component, 8 | 16) => RowMode::Native,
            _ if config.component_count == 1 && config.bits_per_component <= 8 => RowMode::Passthrough,
            _ => RowMode::Rgba,
        }
    }

    pub fn mode(&self) -> RowMode {
        self.mode
    }

    /// Build the PLTE-ready palette for `RowMode::Passthrough`: either the
    /// real `Indexed` palette expanded through the base space, or a
    /// synthesized palette for a single-component non-indexed space,
    /// sampling the space at each of the `2^bpc` codes.
    pub fn build_palette(&self, sampler: &dyn Sampler) -> Result<Vec<[u8; 3]>> {
        match self.config.color_space {
            ColorSpaceVariant::Indexed { base, hival, palette } => {
                let stride = base.component_count();
                let mut out = Vec::with_capacity(*hival as usize + 1);
                for index in 0..=*hival as usize {
                    let offset = index * stride;
                    let mut comps = vec![0.0f32; stride];
                    for (i, c) in comps.iter_mut().enumerate() {
                        *c = palette.get(offset + i).map_or(0.0, |&b| b as f32 / 255.0);
                    }
                    let rgba = resolve_sample(base, &comps, sampler);
                    out.push([to_u8(rgba.r), to_u8(rgba.g), to_u8(rgba.b)]);
                }
                Ok(out)
            }
            _ => {
                if self.config.component_count != 1 {
                    return Err(RasterError::semantic("build_palette called on a non-Indexed, multi-component color space"));
                }
                let entries = 1usize << self.config.bits_per_component;
                let mut out = Vec::with_capacity(entries);
                for code in 0..entries {
                    let rgba = resolve_sample(self.config.color_space, &[code as f32 / self.max_value], sampler);
                    out.push([to_u8(rgba.r), to_u8(rgba.g), to_u8(rgba.b)]);
                }
                Ok(out)
            }
        }
    }

    /// Process one row of unpacked samples (`width * component_count`
    /// entries, each in `[0, 2^bpc - 1]`) into the mode's output
    /// representation.
    pub fn process_row(&self, raw_samples: &[u32], width: usize, sampler: &dyn Sampler) -> Result<ProcessedRow> {
        match self.mode {
            RowMode::Passthrough => Ok(ProcessedRow::Indices(raw_samples.iter().map(|&v| v as u8).collect())),
            RowMode::Native => {
                let mut writer = UintBitWriter::new();
                for &v in raw_samples {
                    writer.write_bits(self.config.bits_per_component as u32, v);
                }
                Ok(ProcessedRow::Packed(writer.finish()))
            }
            RowMode::Stencil => Ok(ProcessedRow::Stencil(raw_samples.iter().map(|&v| v != 0).collect())),
            RowMode::Rgba => {
                let nc = self.config.component_count;
                if raw_samples.len() != width * nc {
                    return Err(RasterError::semantic("row sample count does not match width * component_count"));
                }
                let mut out = Vec::with_capacity(width);
                for px in raw_samples.chunks_exact(nc) {
                    let masked = self.config.mask_array.as_ref().map_or(false, |m| m.matches(px));
                    let mut components = vec![0.0f32; nc];
                    for (i, &raw) in px.iter().enumerate() {
                        let v = self
                            .config
                            .decode_array
                            .as_ref()
                            .map_or(raw as f32 / self.max_value, |d| d.apply(i, raw as f32, self.max_value) / default_range(self.config.color_space));
                        components[i] = v;
                    }
                    let mut rgba = resolve_sample(self.config.color_space, &components, sampler);
                    if masked {
                        rgba.a = 0.0;
                    }
                    out.push(rgba);
                }
                Ok(ProcessedRow::Rgba(out))
            }
        }
    }
}

/// `decode_array.apply` above yields a value already in the component's
/// declared domain (e.g. `[0,100]` for Lab L*); `Sampler` implementations
/// expect normalized `[0,1]` input for device spaces, so divide back down
/// by the space's natural range. Device/ICC spaces have range 1.0 already.
fn default_range(space: &ColorSpaceVariant) -> f32 {
    match space {
        ColorSpaceVariant::Lab { .. } => 1.0, // Lab samplers consume native L*a*b* ranges directly
        _ => 1.0,
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub enum ProcessedRow {
    Indices(Vec<u8>),
    /// `RowMode::Native` output: samples re-packed at their native bit
    /// depth, ready to hand straight to a Gray/RGB PNG row.
    Packed(Vec<u8>),
    Stencil(Vec<bool>),
    Rgba(Vec<RgbaF32>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::{DeviceGraySampler, DeviceRgbSampler};
    use std::sync::Arc;

    #[test]
    fn device_gray_chooses_native_and_repacks_bit_depth() {
        let space = ColorSpaceVariant::DeviceGray;
        let config = RowProcessorConfig {
            bits_per_component: 1,
            component_count: 1,
            color_space: &space,
            decode_array: None,
            mask_array: None,
            is_image_mask: false,
        };
        let proc = RowProcessor::new(config).unwrap();
        assert_eq!(proc.mode(), RowMode::Native);

        let sampler = DeviceGraySampler;
        // 5 one-bit samples pack into a single byte (MSB-first, zero-padded).
        let row = proc.process_row(&[1, 0, 1, 1, 0], 5, &sampler).unwrap();
        match row {
            ProcessedRow::Packed(bytes) => assert_eq!(bytes, vec![0b1011_0000]),
            _ => panic!("expected packed native row"),
        }
    }

    #[test]
    fn device_rgb_with_unsupported_bit_depth_falls_back_to_rgba() {
        let space = ColorSpaceVariant::DeviceRgb;
        let config = RowProcessorConfig {
            bits_per_component: 4,
            component_count: 3,
            color_space: &space,
            decode_array: None,
            mask_array: None,
            is_image_mask: false,
        };
        let proc = RowProcessor::new(config).unwrap();
        assert_eq!(proc.mode(), RowMode::Rgba);
    }

    #[test]
    fn single_component_non_indexed_space_synthesizes_a_palette() {
        let space = ColorSpaceVariant::CalGray { gamma: 1.0, white_point: [0.9505, 1.0, 1.089] };
        let config = RowProcessorConfig {
            bits_per_component: 8,
            component_count: 1,
            color_space: &space,
            decode_array: None,
            mask_array: None,
            is_image_mask: false,
        };
        let proc = RowProcessor::new(config).unwrap();
        assert_eq!(proc.mode(), RowMode::Passthrough);
        let sampler = DeviceGraySampler;
        let palette = proc.build_palette(&sampler).unwrap();
        assert_eq!(palette.len(), 256);
    }

    #[test]
    fn decode_array_forces_rgba_even_for_indexed_space() {
        let palette: Arc<[u8]> = Arc::from(vec![0u8, 0, 0, 255, 0, 0].into_boxed_slice());
        let space = ColorSpaceVariant::Indexed { base: Box::new(ColorSpaceVariant::DeviceRgb), hival: 1, palette };
        let config = RowProcessorConfig {
            bits_per_component: 1,
            component_count: 1,
            color_space: &space,
            decode_array: Some(DecodeArray::identity(1, 1.0)),
            mask_array: None,
            is_image_mask: false,
        };
        let proc = RowProcessor::new(config).unwrap();
        assert_eq!(proc.mode(), RowMode::Rgba);
    }

    #[test]
    fn indexed_space_chooses_passthrough_without_mask() {
        let palette: Arc<[u8]> = Arc::from(vec![0u8, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255].into_boxed_slice());
        let space = ColorSpaceVariant::Indexed { base: Box::new(ColorSpaceVariant::DeviceRgb), hival: 3, palette };
        let config = RowProcessorConfig {
            bits_per_component: 2,
            component_count: 1,
            color_space: &space,
            decode_array: None,
            mask_array: None,
            is_image_mask: false,
        };
        let proc = RowProcessor::new(config).unwrap();
        assert_eq!(proc.mode(), RowMode::Passthrough);

        // source bpc=2, row [0b00 01 10 11] => indices [0,1,2,3]
        let sampler = DeviceRgbSampler;
        let row = proc.process_row(&[0, 1, 2, 3], 4, &sampler).unwrap();
        match row {
            ProcessedRow::Indices(idx) => assert_eq!(idx, vec![0, 1, 2, 3]),
            _ => panic!("expected passthrough indices"),
        }
    }

    #[test]
    fn image_mask_is_stencil_regardless_of_space() {
        let space = ColorSpaceVariant::DeviceGray;
        let config = RowProcessorConfig {
            bits_per_component: 1,
            component_count: 1,
            color_space: &space,
            decode_array: None,
            mask_array: None,
            is_image_mask: true,
        };
        let proc = RowProcessor::new(config).unwrap();
        assert_eq!(proc.mode(), RowMode::Stencil);
    }

    #[test]
    fn color_key_mask_sets_alpha_zero() {
        let space = ColorSpaceVariant::DeviceRgb;
        let mask = ColorKeyMask(vec![(255, 255), (0, 0), (0, 0)]);
        let config = RowProcessorConfig {
            bits_per_component: 8,
            component_count: 3,
            color_space: &space,
            decode_array: None,
            mask_array: Some(mask),
            is_image_mask: false,
        };
        let proc = RowProcessor::new(config).unwrap();
        let sampler = DeviceRgbSampler;
        let row = proc.process_row(&[255, 0, 0], 1, &sampler).unwrap();
        match row {
            ProcessedRow::Rgba(pixels) => assert_eq!(pixels[0].a, 0.0),
            _ => panic!("expected rgba row"),
        }
    }
}
