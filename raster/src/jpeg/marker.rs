//! JPEG marker/header parsing.

use crate::error::{RasterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdobeTransform {
    Unknown,
    YCbCr,
    YCck,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameComponent {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    pub quant_table: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanComponent {
    pub component_index: usize,
    pub dc_table: u8,
    pub ac_table: u8,
}

#[derive(Debug, Clone)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub approx_high: u8,
    pub approx_low: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct HuffmanTableSpec<'a> {
    pub class: u8,
    pub id: u8,
    pub bits: [u8; 16],
    pub values: &'a [u8],
}

#[derive(Debug)]
pub struct FrameHeader {
    pub progressive: bool,
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: Vec<FrameComponent>,
}

/// One fully parsed segment boundary: DQT/DHT payloads are consumed eagerly
/// into the `quant_tables`/`huffman_tables` maps; SOS hands back the raw
/// entropy-coded slice and leaves the cursor positioned after its scan so
/// the caller can detect subsequent scans (progressive) or EOI (baseline).
pub struct Markers {
    pub frame: FrameHeader,
    pub quant_tables: [[u16; 64]; 4],
    pub quant_present: [bool; 4],
    pub adobe_transform: Option<AdobeTransform>,
    pub icc_profile: Vec<u8>,
    pub restart_interval: u16,
}

pub struct ScanResult<'a> {
    pub header: ScanHeader,
    pub entropy_data: &'a [u8],
}

/// Walks the byte stream once, collecting DQT/DHT/APP14/APP2/SOF/DRI into
/// `Markers`, and returns the cursor positioned at the first SOS so the
/// caller can iterate scans with [`next_scan`].
pub fn parse_headers<'a>(data: &'a [u8]) -> Result<(Markers, Vec<(u8, [u8; 16], Vec<u8>)>, usize)> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(RasterError::malformed("JPEG header", "missing SOI marker"));
    }
    let mut pos = 2usize;

    let mut quant_tables = [[0u16; 64]; 4];
    let mut quant_present = [false; 4];
    let mut huffman_specs: Vec<(u8, [u8; 16], Vec<u8>)> = Vec::new();
    let mut frame: Option<FrameHeader> = None;
    let mut adobe_transform = None;
    let mut icc_chunks: Vec<(u8, u8, Vec<u8>)> = Vec::new();
    let mut restart_interval = 0u16;

    loop {
        let marker_pos = pos;
        let (marker, seg_start, seg_len) = next_marker(data, pos)?;
        pos = seg_start;

        match marker {
            0xD9 => return Err(RasterError::truncated("JPEG: EOI before SOS")),
            0xDB => {
                parse_dqt(&data[pos..pos + seg_len], &mut quant_tables, &mut quant_present)?;
                pos += seg_len;
            }
            0xC4 => {
                parse_dht(&data[pos..pos + seg_len], &mut huffman_specs)?;
                pos += seg_len;
            }
            0xC0 | 0xC1 | 0xC2 => {
                let progressive = marker == 0xC2;
                frame = Some(parse_sof(&data[pos..pos + seg_len], progressive)?);
                pos += seg_len;
            }
            0xC3 | 0xC5..=0xC7 | 0xC9..=0xCF => {
                return Err(RasterError::unsupported("JPEG arithmetic/lossless/hierarchical SOF variant"));
            }
            0xDD => {
                if seg_len >= 2 {
                    restart_interval = u16::from_be_bytes([data[pos], data[pos + 1]]);
                }
                pos += seg_len;
            }
            0xEE => {
                parse_app14(&data[pos..pos + seg_len], &mut adobe_transform);
                pos += seg_len;
            }
            0xE2 => {
                parse_app2_icc(&data[pos..pos + seg_len], &mut icc_chunks);
                pos += seg_len;
            }
            0xDA => {
                let frame = frame.take().ok_or_else(|| RasterError::malformed("JPEG", "SOS before SOF"))?;
                let icc_profile = assemble_icc(icc_chunks);
                let markers = Markers {
                    frame,
                    quant_tables,
                    quant_present,
                    adobe_transform,
                    icc_profile,
                    restart_interval,
                };
                return Ok((markers, huffman_specs, marker_pos));
            }
            _ => {
                pos += seg_len;
            }
        }
    }
}

/// Collects any DQT/DHT segments between two scans (progressive streams may
/// redefine tables mid-stream) without requiring a SOF, stopping at the next
/// SOS or EOI.
pub fn scan_tables_until_sos(
    data: &[u8],
    start: usize,
) -> Result<([[u16; 64]; 4], [bool; 4], Vec<(u8, [u8; 16], Vec<u8>)>, usize)> {
    let mut pos = start;
    let mut quant_tables = [[0u16; 64]; 4];
    let mut quant_present = [false; 4];
    let mut huffman_specs = Vec::new();

    loop {
        let marker_pos = pos;
        let (marker, seg_start, seg_len) = next_marker(data, pos)?;
        pos = seg_start;
        match marker {
            0xD9 | 0xDA => return Ok((quant_tables, quant_present, huffman_specs, marker_pos)),
            0xDB => {
                parse_dqt(&data[pos..pos + seg_len], &mut quant_tables, &mut quant_present)?;
                pos += seg_len;
            }
            0xC4 => {
                parse_dht(&data[pos..pos + seg_len], &mut huffman_specs)?;
                pos += seg_len;
            }
            _ => pos += seg_len,
        }
    }
}

/// Parses one SOS header plus its entropy-coded segment, returning the new
/// cursor position (just past the entropy data, at the marker that follows).
pub fn next_scan<'a>(data: &'a [u8], sos_pos: usize) -> Result<(ScanResult<'a>, usize)> {
    let (marker, seg_start, seg_len) = next_marker(data, sos_pos)?;
    if marker != 0xDA {
        return Err(RasterError::malformed("JPEG", "expected SOS marker"));
    }
    let seg = &data[seg_start..seg_start + seg_len];
    if seg.is_empty() {
        return Err(RasterError::truncated("JPEG SOS header"));
    }
    let ns = seg[0] as usize;
    let mut components = Vec::with_capacity(ns);
    let mut p = 1;
    for _ in 0..ns {
        if p + 2 > seg.len() {
            return Err(RasterError::truncated("JPEG SOS component spec"));
        }
        let cs = seg[p];
        let td = seg[p + 1] >> 4;
        let ta = seg[p + 1] & 0x0F;
        components.push((cs, td, ta));
        p += 2;
    }
    if p + 3 > seg.len() {
        return Err(RasterError::truncated("JPEG SOS spectral range"));
    }
    let spectral_start = seg[p];
    let spectral_end = seg[p + 1];
    let approx_high = seg[p + 2] >> 4;
    let approx_low = seg[p + 2] & 0x0F;

    let entropy_start = seg_start + seg_len;
    let entropy_end = find_entropy_end(data, entropy_start)?;

    let header = ScanHeader {
        components: components
            .into_iter()
            .map(|(cs, td, ta)| ScanComponent { component_index: cs as usize, dc_table: td, ac_table: ta })
            .collect(),
        spectral_start,
        spectral_end,
        approx_high,
        approx_low,
    };

    Ok((ScanResult { header, entropy_data: &data[entropy_start..entropy_end] }, entropy_end))
}

/// Scans forward from `pos` for the next marker that is not a stuffed
/// `FF 00` byte or a restart marker (`FFD0`-`FFD7`, which belong to the
/// entropy-coded data and are handled by the bit reader, not here).
fn find_entropy_end(data: &[u8], pos: usize) -> Result<usize> {
    let mut i = pos;
    while i + 1 < data.len() {
        if data[i] == 0xFF {
            let next = data[i + 1];
            if next == 0x00 || (0xD0..=0xD7).contains(&next) {
                i += 2;
                continue;
            }
            if next != 0xFF {
                return Ok(i);
            }
        }
        i += 1;
    }
    Ok(data.len())
}

fn next_marker(data: &[u8], mut pos: usize) -> Result<(u8, usize, usize)> {
    loop {
        if pos + 1 >= data.len() {
            return Err(RasterError::truncated("JPEG marker"));
        }
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        if marker == 0x00 || marker == 0xFF {
            pos += 1;
            continue;
        }
        pos += 2;
        if marker == 0xD8 || marker == 0xD9 || (0xD0..=0xD7).contains(&marker) {
            return Ok((marker, pos, 0));
        }
        if pos + 2 > data.len() {
            return Err(RasterError::truncated("JPEG segment length"));
        }
        let len = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        if len < 2 || pos + len > data.len() {
            return Err(RasterError::malformed("JPEG segment", "invalid length"));
        }
        return Ok((marker, pos + 2, len - 2));
    }
}

fn parse_dqt(mut seg: &[u8], tables: &mut [[u16; 64]; 4], present: &mut [bool; 4]) -> Result<()> {
    while !seg.is_empty() {
        let pq = seg[0] >> 4;
        let tq = (seg[0] & 0x0F) as usize;
        if tq >= 4 {
            return Err(RasterError::malformed("JPEG DQT", "table id out of range"));
        }
        seg = &seg[1..];
        let entry_size = if pq == 0 { 1 } else { 2 };
        if seg.len() < 64 * entry_size {
            return Err(RasterError::truncated("JPEG DQT table"));
        }
        for i in 0..64 {
            tables[tq][i] = if pq == 0 {
                seg[i] as u16
            } else {
                u16::from_be_bytes([seg[2 * i], seg[2 * i + 1]])
            };
        }
        present[tq] = true;
        seg = &seg[64 * entry_size..];
    }
    Ok(())
}

fn parse_dht(mut seg: &[u8], out: &mut Vec<(u8, [u8; 16], Vec<u8>)>) -> Result<()> {
    while !seg.is_empty() {
        if seg.len() < 17 {
            return Err(RasterError::truncated("JPEG DHT table"));
        }
        let class_and_id = seg[0];
        let mut bits = [0u8; 16];
        bits.copy_from_slice(&seg[1..17]);
        let total: usize = bits.iter().map(|&b| b as usize).sum();
        seg = &seg[17..];
        if seg.len() < total {
            return Err(RasterError::truncated("JPEG DHT values"));
        }
        out.push((class_and_id, bits, seg[..total].to_vec()));
        seg = &seg[total..];
    }
    Ok(())
}

fn parse_sof(seg: &[u8], progressive: bool) -> Result<FrameHeader> {
    if seg.len() < 6 {
        return Err(RasterError::truncated("JPEG SOF"));
    }
    let precision = seg[0];
    let height = u16::from_be_bytes([seg[1], seg[2]]);
    let width = u16::from_be_bytes([seg[3], seg[4]]);
    let nf = seg[5] as usize;
    if nf == 0 || nf > 4 {
        return Err(RasterError::semantic(format!("unsupported component count {nf}")));
    }
    let mut components = Vec::with_capacity(nf);
    let mut p = 6;
    for _ in 0..nf {
        if p + 3 > seg.len() {
            return Err(RasterError::truncated("JPEG SOF component"));
        }
        components.push(FrameComponent {
            id: seg[p],
            h: seg[p + 1] >> 4,
            v: seg[p + 1] & 0x0F,
            quant_table: seg[p + 2],
        });
        p += 3;
    }
    Ok(FrameHeader { progressive, precision, height, width, components })
}

fn parse_app14(seg: &[u8], transform: &mut Option<AdobeTransform>) {
    if seg.len() >= 12 && &seg[0..5] == b"Adobe" {
        *transform = Some(match seg[11] {
            1 => AdobeTransform::YCbCr,
            2 => AdobeTransform::YCck,
            _ => AdobeTransform::Unknown,
        });
    }
}

fn parse_app2_icc(seg: &[u8], chunks: &mut Vec<(u8, u8, Vec<u8>)>) {
    if seg.len() >= 14 && &seg[0..11] == b"ICC_PROFILE" {
        let seq = seg[12];
        let count = seg[13];
        chunks.push((seq, count, seg[14..].to_vec()));
    }
}

fn assemble_icc(mut chunks: Vec<(u8, u8, Vec<u8>)>) -> Vec<u8> {
    chunks.sort_by_key(|(seq, _, _)| *seq);
    chunks.into_iter().flat_map(|(_, _, data)| data).collect()
}
