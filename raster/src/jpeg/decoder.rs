//! Baseline and progressive JPEG decoding.
//!
//! Decodes the whole image up front into per-component sample planes, then
//! exposes the planes through [`JpegDecoder::try_read_row`] so the rest of
//! the pipeline can stay row-streamed even though JPEG itself is not
//! naturally streamable once progressive scans are in play (later scans
//! refine coefficients the earlier scans already wrote).

use std::collections::HashMap;

use super::huffman::{EntropyReader, HuffmanTable};
use super::idct::{dc_only_block, is_dc_only, transform_scaled_zigzag};
use super::marker::{self, AdobeTransform, FrameComponent, Markers, ScanHeader};
use super::tables::{IdctPlan, ZIGZAG};
use crate::error::{RasterError, Result};

pub use marker::AdobeTransform as ColorTransform;

struct Component {
    info: FrameComponent,
    blocks_per_line: usize,
    blocks_per_col: usize,
    /// zig-zag order, raw (undequantized) coefficients, one `[i32; 64]` per block.
    coefficients: Vec<i32>,
}

impl Component {
    fn block_mut(&mut self, bx: usize, by: usize) -> &mut [i32] {
        let idx = (by * self.blocks_per_line + bx) * 64;
        &mut self.coefficients[idx..idx + 64]
    }
    fn block(&self, bx: usize, by: usize) -> &[i32] {
        let idx = (by * self.blocks_per_line + bx) * 64;
        &self.coefficients[idx..idx + 64]
    }
}

pub struct JpegDecoder {
    markers: Markers,
    components: Vec<Component>,
    huffman_dc: HashMap<u8, HuffmanTable>,
    huffman_ac: HashMap<u8, HuffmanTable>,
    mcus_per_line: usize,
    mcus_per_col: usize,
    h_max: u8,
    v_max: u8,
    decoded: bool,
    next_row: usize,
    planes: Vec<Vec<u8>>,
}

impl JpegDecoder {
    pub fn new(data: &[u8]) -> Result<Self> {
        let (markers, huffman_specs, mut cursor) = marker::parse_headers(data)?;
        if markers.frame.components.is_empty() {
            return Err(RasterError::semantic("JPEG frame declares zero components"));
        }
        let h_max = markers.frame.components.iter().map(|c| c.h).max().unwrap_or(1);
        let v_max = markers.frame.components.iter().map(|c| c.v).max().unwrap_or(1);
        if h_max == 0 || v_max == 0 {
            return Err(RasterError::malformed("JPEG SOF", "zero sampling factor"));
        }
        let mcus_per_line = ceil_div(markers.frame.width as usize, 8 * h_max as usize);
        let mcus_per_col = ceil_div(markers.frame.height as usize, 8 * v_max as usize);

        let mut components = Vec::with_capacity(markers.frame.components.len());
        for info in &markers.frame.components {
            let blocks_per_line = mcus_per_line * info.h as usize;
            let blocks_per_col = mcus_per_col * info.v as usize;
            components.push(Component {
                info: *info,
                blocks_per_line,
                blocks_per_col,
                coefficients: vec![0i32; blocks_per_line * blocks_per_col * 64],
            });
        }

        let mut huffman_dc = HashMap::new();
        let mut huffman_ac = HashMap::new();
        for (class_and_id, bits, values) in &huffman_specs {
            let class = class_and_id >> 4;
            let id = class_and_id & 0x0F;
            let table = HuffmanTable::build(bits, values)?;
            if class == 0 {
                huffman_dc.insert(id, table);
            } else {
                huffman_ac.insert(id, table);
            }
        }

        let mut decoder = JpegDecoder {
            markers,
            components,
            huffman_dc,
            huffman_ac,
            mcus_per_line,
            mcus_per_col,
            h_max,
            v_max,
            decoded: false,
            next_row: 0,
            planes: Vec::new(),
        };

        loop {
            let (scan, next_cursor) = marker::next_scan(data, cursor)?;
            decoder.decode_scan(&scan.header, scan.entropy_data)?;
            cursor = next_cursor;
            if cursor >= data.len() {
                break;
            }
            match peek_marker(data, cursor) {
                Some(0xD9) => break,
                Some(0xDA) => continue,
                Some(m) if (0xC4..=0xFE).contains(&m) => {
                    // another DHT/DQT/APPn etc. before the next scan (progressive
                    // streams may redefine tables mid-stream).
                    let (more_quant, more_present, more_huffman, new_cursor) =
                        marker::scan_tables_until_sos(data, cursor)?;
                    decoder.markers.quant_tables = merge_quant(decoder.markers.quant_tables, more_quant, more_present);
                    for p in 0..4 {
                        decoder.markers.quant_present[p] |= more_present[p];
                    }
                    for (class_and_id, bits, values) in &more_huffman {
                        let class = class_and_id >> 4;
                        let id = class_and_id & 0x0F;
                        let table = HuffmanTable::build(bits, values)?;
                        if class == 0 {
                            decoder.huffman_dc.insert(id, table);
                        } else {
                            decoder.huffman_ac.insert(id, table);
                        }
                    }
                    cursor = new_cursor;
                }
                _ => break,
            }
        }

        decoder.finalize_planes()?;
        Ok(decoder)
    }

    pub fn width(&self) -> usize {
        self.markers.frame.width as usize
    }
    pub fn height(&self) -> usize {
        self.markers.frame.height as usize
    }
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
    pub fn adobe_transform(&self) -> Option<AdobeTransform> {
        self.markers.adobe_transform
    }
    pub fn icc_profile(&self) -> &[u8] {
        &self.markers.icc_profile
    }

    fn decode_scan(&mut self, header: &ScanHeader, entropy_data: &[u8]) -> Result<()> {
        let mut reader = EntropyReader::new(entropy_data);
        let interleaved = header.components.len() > 1;
        let is_dc_scan = header.spectral_start == 0;

        let mut dc_pred = vec![0i32; header.components.len()];
        let mut eobrun = 0u32;
        let restart_interval = self.markers.restart_interval as usize;
        let mut units_since_restart = 0usize;

        let total_units = if interleaved {
            self.mcus_per_line * self.mcus_per_col
        } else {
            let ci = header.components[0].component_index;
            let comp = self.component_for_id(ci)?;
            ceil_div(self.markers.frame.width as usize * comp.info.h as usize, self.h_max as usize * 8)
                * ceil_div(self.markers.frame.height as usize * comp.info.v as usize, self.v_max as usize * 8)
        };

        for unit in 0..total_units {
            if restart_interval > 0 && units_since_restart == restart_interval {
                reader.reset_to_restart();
                dc_pred.iter_mut().for_each(|p| *p = 0);
                eobrun = 0;
                units_since_restart = 0;
            }

            if interleaved {
                let (mcu_x, mcu_y) = (unit % self.mcus_per_line, unit / self.mcus_per_line);
                for (sc_idx, sc) in header.components.iter().enumerate() {
                    let comp_idx = self.index_for_id(sc.component_index)?;
                    let (h, v) = (self.components[comp_idx].info.h, self.components[comp_idx].info.v);
                    for by in 0..v as usize {
                        for bx in 0..h as usize {
                            let block_x = mcu_x * h as usize + bx;
                            let block_y = mcu_y * v as usize + by;
                            self.decode_block(
                                comp_idx,
                                block_x,
                                block_y,
                                header,
                                sc.dc_table,
                                sc.ac_table,
                                &mut reader,
                                &mut dc_pred[sc_idx],
                                &mut eobrun,
                                is_dc_scan,
                            )?;
                        }
                    }
                }
            } else {
                let sc = &header.components[0];
                let comp_idx = self.index_for_id(sc.component_index)?;
                let comp_width_blocks =
                    ceil_div(self.markers.frame.width as usize * self.components[comp_idx].info.h as usize, self.h_max as usize * 8);
                let (block_x, block_y) = (unit % comp_width_blocks, unit / comp_width_blocks);
                self.decode_block(
                    comp_idx,
                    block_x,
                    block_y,
                    header,
                    sc.dc_table,
                    sc.ac_table,
                    &mut reader,
                    &mut dc_pred[0],
                    &mut eobrun,
                    is_dc_scan,
                )?;
            }

            units_since_restart += 1;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_block(
        &mut self,
        comp_idx: usize,
        bx: usize,
        by: usize,
        header: &ScanHeader,
        dc_table_id: u8,
        ac_table_id: u8,
        reader: &mut EntropyReader,
        dc_pred: &mut i32,
        eobrun: &mut u32,
        is_dc_scan: bool,
    ) -> Result<()> {
        let progressive = self.markers.frame.progressive;
        let ah = header.approx_high;
        let al = header.approx_low;

        if is_dc_scan {
            if !progressive || ah == 0 {
                let dc_table = self
                    .huffman_dc
                    .get(&dc_table_id)
                    .ok_or_else(|| RasterError::malformed("JPEG scan", "missing DC table"))?;
                let size = dc_table.decode(reader)?;
                let diff = reader.receive(size as u32)?;
                *dc_pred += diff;
                let value = if progressive { *dc_pred << al } else { *dc_pred };
                self.components[comp_idx].block_mut(bx, by)[0] = value;
            } else {
                let bit = reader.next_bit()?;
                if bit == 1 {
                    self.components[comp_idx].block_mut(bx, by)[0] |= 1 << al;
                }
            }
            if !progressive {
                // sequential scans carry DC and AC together
                self.decode_ac_sequential(comp_idx, bx, by, ac_table_id, reader)?;
            }
            return Ok(());
        }

        // AC scan (always non-interleaved, progressive only).
        if ah == 0 {
            self.decode_ac_first(comp_idx, bx, by, header, ac_table_id, reader, eobrun)
        } else {
            self.decode_ac_refine(comp_idx, bx, by, header, ac_table_id, reader, eobrun)
        }
    }

    fn decode_ac_sequential(
        &mut self,
        comp_idx: usize,
        bx: usize,
        by: usize,
        ac_table_id: u8,
        reader: &mut EntropyReader,
    ) -> Result<()> {
        let ac_table = self
            .huffman_ac
            .get(&ac_table_id)
            .ok_or_else(|| RasterError::malformed("JPEG scan", "missing AC table"))?;
        let mut k = 1usize;
        while k < 64 {
            let rs = ac_table.decode(reader)?;
            let run = (rs >> 4) as usize;
            let size = rs & 0x0F;
            if size == 0 {
                if run == 15 {
                    k += 16;
                    continue;
                }
                break; // EOB
            }
            k += run;
            if k >= 64 {
                return Err(RasterError::malformed("JPEG scan", "AC run exceeds block"));
            }
            let value = reader.receive(size as u32)?;
            self.components[comp_idx].block_mut(bx, by)[k] = value;
            k += 1;
        }
        Ok(())
    }

    fn decode_ac_first(
        &mut self,
        comp_idx: usize,
        bx: usize,
        by: usize,
        header: &ScanHeader,
        ac_table_id: u8,
        reader: &mut EntropyReader,
        eobrun: &mut u32,
    ) -> Result<()> {
        if *eobrun > 0 {
            *eobrun -= 1;
            return Ok(());
        }
        let ac_table = self
            .huffman_ac
            .get(&ac_table_id)
            .ok_or_else(|| RasterError::malformed("JPEG scan", "missing AC table"))?;
        let al = header.approx_low;
        let mut k = header.spectral_start as usize;
        let se = header.spectral_end as usize;
        while k <= se {
            let rs = ac_table.decode(reader)?;
            let run = (rs >> 4) as usize;
            let size = rs & 0x0F;
            if size == 0 {
                if run != 15 {
                    let mut run_bits = 1u32 << run;
                    if run > 0 {
                        run_bits += reader.receive_unsigned(run as u32)?;
                    }
                    *eobrun = run_bits - 1;
                    break;
                }
                k += 16;
                continue;
            }
            k += run;
            if k > se {
                return Err(RasterError::malformed("JPEG scan", "AC run exceeds spectral range"));
            }
            let value = reader.receive(size as u32)?;
            self.components[comp_idx].block_mut(bx, by)[k] = value << al;
            k += 1;
        }
        Ok(())
    }

    fn decode_ac_refine(
        &mut self,
        comp_idx: usize,
        bx: usize,
        by: usize,
        header: &ScanHeader,
        ac_table_id: u8,
        reader: &mut EntropyReader,
        eobrun: &mut u32,
    ) -> Result<()> {
        let al = header.approx_low;
        let p1 = 1i32 << al;
        let m1 = -1i32 << al;
        let se = header.spectral_end as usize;
        let mut k = header.spectral_start as usize;

        if *eobrun == 0 {
            let ac_table = self
                .huffman_ac
                .get(&ac_table_id)
                .ok_or_else(|| RasterError::malformed("JPEG scan", "missing AC table"))?;
            while k <= se {
                let rs = ac_table.decode(reader)?;
                let mut run = (rs >> 4) as usize;
                let size = rs & 0x0F;
                let mut newval = 0i32;
                if size == 0 {
                    if run != 15 {
                        let mut run_bits = 1u32 << run;
                        if run > 0 {
                            run_bits += reader.receive_unsigned(run as u32)?;
                        }
                        *eobrun = run_bits;
                        break;
                    }
                } else {
                    // size must be 1 for refinement scans
                    newval = if reader.next_bit()? == 1 { p1 } else { m1 };
                }

                while k <= se {
                    let coef = self.components[comp_idx].block_mut(bx, by)[k];
                    if coef != 0 {
                        if reader.next_bit()? == 1 && (coef & p1) == 0 {
                            let delta = if coef >= 0 { p1 } else { m1 };
                            self.components[comp_idx].block_mut(bx, by)[k] += delta;
                        }
                    } else {
                        if run == 0 {
                            if size != 0 {
                                self.components[comp_idx].block_mut(bx, by)[k] = newval;
                            }
                            k += 1;
                            break;
                        }
                        run -= 1;
                    }
                    k += 1;
                }
            }
        }

        if *eobrun > 0 {
            while k <= se {
                let coef = self.components[comp_idx].block_mut(bx, by)[k];
                if coef != 0 && reader.next_bit()? == 1 && (coef & p1) == 0 {
                    let delta = if coef >= 0 { p1 } else { m1 };
                    self.components[comp_idx].block_mut(bx, by)[k] += delta;
                }
                k += 1;
            }
            *eobrun -= 1;
        }
        Ok(())
    }

    fn index_for_id(&self, id: usize) -> Result<usize> {
        self.components
            .iter()
            .position(|c| c.info.id as usize == id)
            .ok_or_else(|| RasterError::semantic(format!("unknown JPEG scan component id {id}")))
    }

    fn component_for_id(&self, id: usize) -> Result<&Component> {
        let idx = self.index_for_id(id)?;
        Ok(&self.components[idx])
    }

    fn finalize_planes(&mut self) -> Result<()> {
        let mut plans: Vec<IdctPlan> = Vec::with_capacity(self.components.len());
        for comp in &self.components {
            let table_id = comp.info.quant_table as usize;
            if table_id >= 4 || !self.markers.quant_present[table_id] {
                return Err(RasterError::semantic("JPEG component references undefined quant table"));
            }
            let mut zigzag_table = [0u16; 64];
            for i in 0..64 {
                zigzag_table[i] = self.markers.quant_tables[table_id][i];
            }
            plans.push(IdctPlan::from_quant_table(&zigzag_table));
        }

        for (ci, comp) in self.components.iter().enumerate() {
            let width = comp.blocks_per_line * 8;
            let height = comp.blocks_per_col * 8;
            let mut plane = vec![0u8; width * height];
            for by in 0..comp.blocks_per_col {
                for bx in 0..comp.blocks_per_line {
                    let block = comp.block(bx, by);
                    let mut natural = [0i32; 64];
                    for i in 0..64 {
                        natural[ZIGZAG[i]] = block[i];
                    }
                    let samples = if is_dc_only(&natural) {
                        dc_only_block(block[0] * plans[ci].dequant_zig[0])
                    } else {
                        transform_scaled_zigzag(block, &plans[ci])
                    };
                    for row in 0..8 {
                        let dst = (by * 8 + row) * width + bx * 8;
                        plane[dst..dst + 8].copy_from_slice(&samples[row * 8..row * 8 + 8]);
                    }
                }
            }
            self.planes.push(plane);
        }
        Ok(())
    }

    /// Copies the next reconstructed, color-converted row into `row_out`
    /// (`width * component_count` bytes). Chroma planes are upsampled by
    /// replication. Returns `false` once every row has been produced.
    pub fn try_read_row(&mut self, row_out: &mut [u8]) -> bool {
        let width = self.width();
        let height = self.height();
        if self.next_row >= height {
            return false;
        }
        let row = self.next_row;
        let nc = self.components.len();
        debug_assert!(row_out.len() >= width * nc);

        let mut samples = vec![0u8; width * nc];
        for (ci, comp) in self.components.iter().enumerate() {
            let plane_width = comp.blocks_per_line * 8;
            let sy = row * comp.info.v as usize / self.v_max as usize;
            for x in 0..width {
                let sx = x * comp.info.h as usize / self.h_max as usize;
                samples[x * nc + ci] = self.planes[ci][sy * plane_width + sx];
            }
        }

        apply_color_conversion(&mut samples, nc, self.markers.adobe_transform);
        row_out[..width * nc].copy_from_slice(&samples);
        self.next_row += 1;
        true
    }
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

fn peek_marker(data: &[u8], pos: usize) -> Option<u8> {
    if pos + 1 < data.len() && data[pos] == 0xFF {
        Some(data[pos + 1])
    } else {
        None
    }
}

fn merge_quant(mut base: [[u16; 64]; 4], extra: [[u16; 64]; 4], present: [bool; 4]) -> [[u16; 64]; 4] {
    for i in 0..4 {
        if present[i] {
            base[i] = extra[i];
        }
    }
    base
}

/// Apply the color transform implied by the component count and Adobe
/// marker, in place.
fn apply_color_conversion(samples: &mut [u8], nc: usize, transform: Option<AdobeTransform>) {
    match nc {
        1 => {}
        3 => {
            let do_transform = !matches!(transform, Some(AdobeTransform::Unknown));
            if do_transform {
                for px in samples.chunks_exact_mut(3) {
                    let (y, cb, cr) = (px[0] as i32, px[1] as i32 - 128, px[2] as i32 - 128);
                    px[0] = clamp8(y + ((91881 * cr) >> 16));
                    px[1] = clamp8(y - ((22554 * cb + 46802 * cr) >> 16));
                    px[2] = clamp8(y + ((116130 * cb) >> 16));
                }
            }
        }
        4 => {
            match transform {
                Some(AdobeTransform::YCck) => {
                    for px in samples.chunks_exact_mut(4) {
                        let (y, cb, cr) = (px[0] as i32, px[1] as i32 - 128, px[2] as i32 - 128);
                        let r = clamp8(y + ((91881 * cr) >> 16));
                        let g = clamp8(y - ((22554 * cb + 46802 * cr) >> 16));
                        let b = clamp8(y + ((116130 * cb) >> 16));
                        px[0] = 255 - r;
                        px[1] = 255 - g;
                        px[2] = 255 - b;
                        // K channel (px[3]) is carried through unchanged per Adobe convention
                    }
                }
                _ => {
                    // Plain CMYK (Adobe transform 0 or absent): Adobe writes inverted
                    // CMYK samples, so invert every channel including K to leave the
                    // decoder in additive CMYK.
                    for b in samples.iter_mut() {
                        *b = 255 - *b;
                    }
                }
            }
        }
        _ => {}
    }
}

#[inline]
fn clamp8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

impl<'a> EntropyReader<'a> {
    /// Convenience for the EOB-run extra bits: an unsigned `size`-bit value
    /// with no sign extension (unlike `receive`, used for DC/AC magnitude).
    pub fn receive_unsigned(&mut self, size: u32) -> Result<u32> {
        let mut v = 0u32;
        for _ in 0..size {
            v = (v << 1) | self.next_bit()?;
        }
        Ok(v)
    }
}
