//! Row converters: optional up/downsampling between the format decoder and
//! the row processor. Both converters consume one source row at
//! a time and report whether a destination row came out the other end —
//! vertical scaling means a single source row can emit zero, one, or
//! several destination rows, and the caller drives them strictly in order.

use crate::bitio::{UintBitReader, UintBitWriter};
use crate::error::{RasterError, Result};

fn validate_bpc(bpc: u8) -> Result<()> {
    if matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        Ok(())
    } else {
        Err(RasterError::semantic(format!("row converter: unsupported bits_per_component {}", bpc)))
    }
}

/// `s = (d + 0.5)/scale - 0.5`, clamped into `[0, src_len)` and monotonized
/// so consecutive destination indices never produce a smaller source index
/// than their predecessor.
fn nearest_index_map(src_len: usize, dst_len: usize) -> Vec<usize> {
    if dst_len == 0 || src_len == 0 {
        return Vec::new();
    }
    let scale = dst_len as f64 / src_len as f64;
    let mut map = Vec::with_capacity(dst_len);
    let mut prev = 0usize;
    for d in 0..dst_len {
        let s = (d as f64 + 0.5) / scale - 0.5;
        let idx = s.round().clamp(0.0, (src_len - 1) as f64) as usize;
        let idx = idx.max(prev);
        map.push(idx);
        prev = idx;
    }
    map
}

fn unpack_row(row: &[u8], bpc: u8, sample_count: usize) -> Vec<u32> {
    let mut reader = UintBitReader::new(row);
    (0..sample_count).map(|_| reader.read_bits(bpc as u32).unwrap_or(0)).collect()
}

fn pack_row(samples: &[u32], bpc: u8) -> Vec<u8> {
    let mut writer = UintBitWriter::new();
    for &s in samples {
        writer.write_bits(bpc as u32, s);
    }
    writer.finish()
}

/// Nearest-neighbor resampler; supports up- and downsampling on either axis.
/// Output bit depth equals input.
pub struct NearestNeighborConverter {
    bpc: u8,
    components: usize,
    src_width: usize,
    col_map: Vec<usize>,
    row_map: Vec<usize>,
    src_rows: Vec<Option<Vec<u32>>>,
    next_src_row: usize,
    next_dst_row: usize,
}

impl NearestNeighborConverter {
    pub fn new(src_width: usize, src_height: usize, dst_width: usize, dst_height: usize, bpc: u8, components: usize) -> Result<Self> {
        validate_bpc(bpc)?;
        if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
            return Err(RasterError::oversize("row converter dimensions", 0));
        }
        Ok(NearestNeighborConverter {
            bpc,
            components,
            src_width,
            col_map: nearest_index_map(src_width, dst_width),
            row_map: nearest_index_map(src_height, dst_height),
            src_rows: vec![None; src_height],
            next_src_row: 0,
            next_dst_row: 0,
        })
    }

    /// Feed the next source row (packed at `bpc`). Returns every destination
    /// row this source row unblocks, in order; empty if none yet (a
    /// downsampled source row that no destination pixel-center lands on).
    pub fn push_row(&mut self, row: &[u8]) -> Vec<Vec<u8>> {
        let samples = unpack_row(row, self.bpc, self.src_width * self.components);
        if self.next_src_row < self.src_rows.len() {
            self.src_rows[self.next_src_row] = Some(samples);
            self.next_src_row += 1;
        }

        let mut out = Vec::new();
        while self.next_dst_row < self.row_map.len() {
            let src_y = self.row_map[self.next_dst_row];
            let Some(src_row) = &self.src_rows[src_y] else { break };
            let mut dst = vec![0u32; self.col_map.len() * self.components];
            for (dx, &sx) in self.col_map.iter().enumerate() {
                let from = sx * self.components;
                let to = dx * self.components;
                dst[to..to + self.components].copy_from_slice(&src_row[from..from + self.components]);
            }
            out.push(pack_row(&dst, self.bpc));
            self.next_dst_row += 1;
        }
        out
    }
}

/// Box-filter downsampler. Downsampling only. Destination
/// samples are 8-bit, except `bpc == 16` where 16-bit precision is kept.
pub struct AveragingConverter {
    bpc: u8,
    components: usize,
    src_width: usize,
    col_spans: Vec<(usize, usize)>,
    row_spans: Vec<(usize, usize)>,
    accum: Vec<i64>,
    count: Vec<u32>,
    next_dst_col_row: usize,
    src_row_idx: usize,
}

fn downsample_spans(src_len: usize, dst_len: usize) -> Vec<(usize, usize)> {
    (0..dst_len)
        .map(|d| {
            let start = (d * src_len) / dst_len;
            let end = (((d + 1) * src_len) / dst_len).max(start + 1).min(src_len);
            (start, end)
        })
        .collect()
}

impl AveragingConverter {
    pub fn new(src_width: usize, src_height: usize, dst_width: usize, dst_height: usize, bpc: u8, components: usize) -> Result<Self> {
        validate_bpc(bpc)?;
        if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
            return Err(RasterError::oversize("row converter dimensions", 0));
        }
        if dst_width > src_width || dst_height > src_height {
            return Err(RasterError::semantic("averaging row converter only supports downsampling"));
        }
        Ok(AveragingConverter {
            bpc,
            components,
            src_width,
            col_spans: downsample_spans(src_width, dst_width),
            row_spans: downsample_spans(src_height, dst_height),
            accum: vec![0i64; dst_width * components],
            count: vec![0u32; dst_width * components],
            next_dst_col_row: 0,
            src_row_idx: 0,
        })
    }

    fn output_depth_max(&self) -> u32 {
        if self.bpc == 16 {
            0xFFFF
        } else {
            0xFF
        }
    }

    fn sample_max(&self) -> u32 {
        (1u32 << self.bpc) - 1
    }

    /// Feed the next source row. Returns `Some(row)` once the last source
    /// row contributing to a destination row has been consumed; the row is
    /// 8-bit samples, or one `u16` packed big-endian per sample when
    /// `bpc == 16`.
    pub fn push_row(&mut self, row: &[u8]) -> Option<Vec<u8>> {
        let samples = unpack_row(row, self.bpc, self.src_width * self.components);
        let (row_start, row_end) = self.row_spans[self.next_dst_col_row];
        if self.src_row_idx >= row_start && self.src_row_idx < row_end {
            for (dx, &(col_start, col_end)) in self.col_spans.iter().enumerate() {
                for c in 0..self.components {
                    let mut sum = 0i64;
                    let mut n = 0u32;
                    for sx in col_start..col_end {
                        sum += samples[sx * self.components + c] as i64;
                        n += 1;
                    }
                    self.accum[dx * self.components + c] += sum;
                    self.count[dx * self.components + c] += n;
                }
            }
        }
        self.src_row_idx += 1;

        if self.src_row_idx < row_end {
            return None;
        }

        let out_max = self.output_depth_max();
        let in_max = self.sample_max();
        let mut dst = vec![0u32; self.accum.len()];
        for i in 0..dst.len() {
            let avg = if self.count[i] > 0 {
                (self.accum[i] as f64 / self.count[i] as f64).round() as i64
            } else {
                0
            };
            let scaled = if in_max == out_max { avg } else { (avg * out_max as i64) / in_max as i64 };
            dst[i] = scaled.clamp(0, out_max as i64) as u32;
        }
        self.accum.iter_mut().for_each(|v| *v = 0);
        self.count.iter_mut().for_each(|v| *v = 0);
        self.next_dst_col_row += 1;

        let out_bpc = if self.bpc == 16 { 16 } else { 8 };
        Some(pack_row(&dst, out_bpc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_neighbor_downsamples_both_axes() {
        // 4x2 -> 2x1, 1 component, 8 bpc.
        let mut conv = NearestNeighborConverter::new(4, 2, 2, 1, 8, 1).unwrap();
        let mut rows = conv.push_row(&[10, 20, 30, 40]);
        assert!(rows.is_empty());
        rows = conv.push_row(&[50, 60, 70, 80]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn nearest_neighbor_upsamples_rows() {
        // 2x1 -> 2x3: a single source row feeds three destination rows.
        let mut conv = NearestNeighborConverter::new(2, 1, 2, 3, 8, 1).unwrap();
        let rows = conv.push_row(&[10, 20]);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r == &vec![10u8, 20]));
    }

    #[test]
    fn averaging_downsample_is_exact_for_uniform_rows() {
        let mut conv = AveragingConverter::new(6, 2, 2, 1, 8, 1).unwrap();
        assert!(conv.push_row(&[50, 50, 50, 50, 50, 50]).is_none());
        let row = conv.push_row(&[50, 50, 50, 50, 50, 50]).unwrap();
        assert_eq!(row, vec![50, 50]);
    }

    #[test]
    fn averaging_rejects_upsample_request() {
        assert!(AveragingConverter::new(2, 2, 4, 2, 8, 1).is_err());
    }

    #[test]
    fn averaging_rejects_bad_bit_depth() {
        assert!(AveragingConverter::new(4, 4, 2, 2, 3, 1).is_err());
    }
}
