//! Streaming PNG row encoder: adaptive per-row filter selection,
//! zlib/DEFLATE framing, chunked output.

use once_cell::sync::Lazy;

use crate::error::{RasterError, Result};
use crate::filters::{png_filter_row, PredictorType};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const IDAT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorType {
    Gray = 0,
    Rgb = 2,
    Palette = 3,
    GrayAlpha = 4,
    Rgba = 6,
}

impl ColorType {
    fn samples_per_pixel(self) -> usize {
        match self {
            ColorType::Gray | ColorType::Palette => 1,
            ColorType::GrayAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }
}

pub struct PngEncoderConfig {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub palette: Option<Vec<[u8; 3]>>,
    pub trns: Option<Vec<u8>>,
    pub icc_profile: Option<Vec<u8>>,
}

/// Accepts rows one at a time, filters each adaptively against the previous
/// row, and assembles the final PNG byte stream on [`finish`].
pub struct PngEncoder {
    config: PngEncoderConfig,
    stride: usize,
    bpp: usize,
    prev_row: Vec<u8>,
    filtered: Vec<u8>,
    rows_written: u32,
}

impl PngEncoder {
    pub fn new(config: PngEncoderConfig) -> Result<Self> {
        if !matches!(config.bit_depth, 1 | 2 | 4 | 8 | 16) {
            return Err(RasterError::semantic("PNG encoder: unsupported bit depth"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(RasterError::oversize("PNG dimensions", 0));
        }
        let samples = config.color_type.samples_per_pixel();
        let stride = (config.width as usize * samples * config.bit_depth as usize + 7) / 8;
        let bpp = ((samples * config.bit_depth as usize + 7) / 8).max(1);
        Ok(PngEncoder {
            config,
            stride,
            bpp,
            prev_row: vec![0u8; stride],
            filtered: Vec::new(),
            rows_written: 0,
        })
    }

    /// Feed one raw (unfiltered) row of exactly `stride` bytes.
    pub fn write_row(&mut self, row: &[u8]) -> Result<()> {
        if row.len() != self.stride {
            return Err(RasterError::semantic("PNG encoder: row length does not match stride"));
        }
        if self.rows_written >= self.config.height {
            return Err(RasterError::semantic("PNG encoder: too many rows written"));
        }

        let (filter, filtered_row) = self.choose_best_filter(row);
        self.filtered.push(filter as u8);
        self.filtered.extend_from_slice(&filtered_row);
        self.prev_row.copy_from_slice(row);
        self.rows_written += 1;
        Ok(())
    }

    /// Tries all five filter types and keeps the one with lowest
    /// sum-of-absolute-residuals (treating each byte as signed); the chosen
    /// filter's cost never exceeds the `None` filter's cost for that row.
    fn choose_best_filter(&self, row: &[u8]) -> (PredictorType, Vec<u8>) {
        const CANDIDATES: [PredictorType; 5] =
            [PredictorType::NoFilter, PredictorType::Sub, PredictorType::Up, PredictorType::Avg, PredictorType::Paeth];

        let mut best: Option<(PredictorType, Vec<u8>, u64)> = None;
        for &candidate in &CANDIDATES {
            let mut out = vec![0u8; self.stride];
            png_filter_row(candidate, self.bpp, &self.prev_row, row, &mut out);
            let cost: u64 = out.iter().map(|&b| (b as i8).unsigned_abs() as u64).sum();
            if best.as_ref().map_or(true, |(_, _, best_cost)| cost < *best_cost) {
                best = Some((candidate, out, cost));
            }
        }
        let (filter, bytes, _) = best.expect("CANDIDATES is non-empty");
        (filter, bytes)
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        if self.rows_written != self.config.height {
            return Err(RasterError::semantic("PNG encoder: finish() called before all rows were written"));
        }

        let mut out = Vec::with_capacity(self.filtered.len() + 256);
        out.extend_from_slice(&SIGNATURE);

        let mut ihdr = Vec::with_capacity(13);
        ihdr.extend_from_slice(&self.config.width.to_be_bytes());
        ihdr.extend_from_slice(&self.config.height.to_be_bytes());
        ihdr.push(self.config.bit_depth);
        ihdr.push(self.config.color_type as u8);
        ihdr.push(0); // compression method
        ihdr.push(0); // filter method
        ihdr.push(0); // interlace method
        write_chunk(&mut out, b"IHDR", &ihdr);

        if let Some(icc) = &self.config.icc_profile {
            let mut payload = Vec::with_capacity(icc.len() + 16);
            payload.extend_from_slice(b"icc\0"); // profile name, null-terminated
            payload.push(0); // compression method (zlib)
            payload.extend_from_slice(&deflate::deflate_bytes_zlib(icc));
            write_chunk(&mut out, b"iCCP", &payload);
        }

        if let Some(palette) = &self.config.palette {
            let mut plte = Vec::with_capacity(palette.len() * 3);
            for entry in palette {
                plte.extend_from_slice(entry);
            }
            write_chunk(&mut out, b"PLTE", &plte);
        }

        if let Some(trns) = &self.config.trns {
            write_chunk(&mut out, b"tRNS", trns);
        }

        let compressed = deflate::deflate_bytes_zlib(&self.filtered);
        for chunk in compressed.chunks(IDAT_CHUNK_SIZE) {
            write_chunk(&mut out, b"IDAT", chunk);
        }

        write_chunk(&mut out, b"IEND", &[]);
        Ok(out)
    }
}

fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    let start = out.len();
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    let crc = crc32(&out[start..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

static CRC_TABLE: Lazy<[u32; 256]> = Lazy::new(|| {
    let mut table = [0u32; 256];
    for (n, entry) in table.iter_mut().enumerate() {
        let mut c = n as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
        }
        *entry = c;
    }
    table
});

fn crc32(data: &[u8]) -> u32 {
    let mut c = 0xFFFF_FFFFu32;
    for &byte in data {
        c = CRC_TABLE[((c ^ byte as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_produces_valid_signature_and_ihdr() {
        // width=3, height=2, RGBA rows.
        let config = PngEncoderConfig {
            width: 3,
            height: 2,
            bit_depth: 8,
            color_type: ColorType::Rgba,
            palette: None,
            trns: None,
            icc_profile: None,
        };
        let mut enc = PngEncoder::new(config).unwrap();
        let row: [u8; 12] = [0xFF, 0, 0, 0xFF, 0, 0xFF, 0, 0xFF, 0, 0, 0xFF, 0xFF];
        enc.write_row(&row).unwrap();
        enc.write_row(&row).unwrap();
        let png = enc.finish().unwrap();

        assert_eq!(&png[0..8], &SIGNATURE);
        assert_eq!(&png[12..16], b"IHDR");
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        assert_eq!(width, 3);
        assert_eq!(height, 2);
        assert_eq!(png[24], 8); // depth
        assert_eq!(png[25], 6); // color type RGBA

        // exactly one IHDR chunk
        let ihdr_count = png.windows(4).filter(|w| *w == b"IHDR").count();
        assert_eq!(ihdr_count, 1);
    }

    #[test]
    fn crc_table_matches_known_value() {
        // CRC-32 of the ASCII bytes "IEND" (a chunk type with no data).
        assert_eq!(crc32(b"IEND"), 0xAE42_6082);
    }

    #[test]
    fn none_filter_is_never_beaten_in_cost_by_an_invalid_choice() {
        let config = PngEncoderConfig {
            width: 4,
            height: 1,
            bit_depth: 8,
            color_type: ColorType::Gray,
            palette: None,
            trns: None,
            icc_profile: None,
        };
        let enc = PngEncoder::new(config).unwrap();
        let row = [10u8, 10, 10, 10];
        let (_, best_bytes) = enc.choose_best_filter(&row);
        let mut none_bytes = vec![0u8; 4];
        png_filter_row(PredictorType::NoFilter, enc.bpp, &enc.prev_row, &row, &mut none_bytes);
        let best_cost: u64 = best_bytes.iter().map(|&b| (b as i8).unsigned_abs() as u64).sum();
        let none_cost: u64 = none_bytes.iter().map(|&b| (b as i8).unsigned_abs() as u64).sum();
        assert!(best_cost <= none_cost);
    }
}
