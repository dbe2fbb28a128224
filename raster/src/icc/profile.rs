//! ICC profile header and tag table parsing.

use std::collections::HashMap;

use crate::bitio::BigEndianReader;
use crate::colorspace::RenderingIntent;
use crate::error::{RasterError, Result};

use super::lut::LutPipeline;
use super::trc::Trc;

const HEADER_SIZE: usize = 128;
const TAG_ENTRY_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpaceSig {
    Gray,
    Rgb,
    Cmyk,
    Lab,
    Xyz,
    Other([u8; 4]),
}

impl ColorSpaceSig {
    fn from_bytes(b: [u8; 4]) -> Self {
        match &b {
            b"GRAY" => ColorSpaceSig::Gray,
            b"RGB " => ColorSpaceSig::Rgb,
            b"CMYK" => ColorSpaceSig::Cmyk,
            b"Lab " => ColorSpaceSig::Lab,
            b"XYZ " => ColorSpaceSig::Xyz,
            _ => ColorSpaceSig::Other(b),
        }
    }

    pub fn component_count(&self) -> usize {
        match self {
            ColorSpaceSig::Gray => 1,
            ColorSpaceSig::Rgb | ColorSpaceSig::Lab | ColorSpaceSig::Xyz => 3,
            ColorSpaceSig::Cmyk => 4,
            ColorSpaceSig::Other(_) => 3,
        }
    }
}

pub type PcsSig = ColorSpaceSig;

#[derive(Debug, Clone, Copy)]
pub struct ProfileHeader {
    pub size: u32,
    pub data_color_space: ColorSpaceSig,
    pub pcs: PcsSig,
    pub rendering_intent: RenderingIntent,
}

fn parse_header(r: &BigEndianReader) -> Result<ProfileHeader> {
    if r.len() < HEADER_SIZE {
        return Err(RasterError::truncated("ICC header"));
    }
    let signature = r.read_bytes(36, 4).ok_or_else(|| RasterError::truncated("ICC signature"))?;
    if signature != b"acsp" {
        return Err(RasterError::malformed("ICC header", "missing 'acsp' signature"));
    }
    let size = r.read_u32(0).ok_or_else(|| RasterError::truncated("ICC size"))?;
    let cs_bytes: [u8; 4] = r.read_bytes(16, 4).ok_or_else(|| RasterError::truncated("ICC color space"))?.try_into().unwrap();
    let pcs_bytes: [u8; 4] = r.read_bytes(20, 4).ok_or_else(|| RasterError::truncated("ICC PCS"))?.try_into().unwrap();
    let intent_code = r.read_u32(64).ok_or_else(|| RasterError::truncated("ICC rendering intent"))?;
    let rendering_intent = match intent_code & 0xFFFF {
        0 => RenderingIntent::Perceptual,
        1 => RenderingIntent::RelativeColorimetric,
        2 => RenderingIntent::Saturation,
        3 => RenderingIntent::AbsoluteColorimetric,
        // Default to relative colorimetric, the conservative choice, when
        // the profile is silent or out of range.
        _ => RenderingIntent::RelativeColorimetric,
    };
    Ok(ProfileHeader {
        size,
        data_color_space: ColorSpaceSig::from_bytes(cs_bytes),
        pcs: ColorSpaceSig::from_bytes(pcs_bytes),
        rendering_intent,
    })
}

struct TagEntry {
    offset: usize,
    size: usize,
}

pub struct Profile {
    pub header: ProfileHeader,
    tags: HashMap<[u8; 4], TagEntry>,
    data: Vec<u8>,
}

impl Profile {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = BigEndianReader::new(data);
        let header = parse_header(&r)?;
        let tag_count = r.read_u32(HEADER_SIZE).ok_or_else(|| RasterError::truncated("ICC tag count"))? as usize;

        let mut tags = HashMap::with_capacity(tag_count);
        for i in 0..tag_count {
            let entry_off = HEADER_SIZE + 4 + i * TAG_ENTRY_SIZE;
            let sig: [u8; 4] = r.read_bytes(entry_off, 4).ok_or_else(|| RasterError::truncated("ICC tag signature"))?.try_into().unwrap();
            let offset = r.read_u32(entry_off + 4).ok_or_else(|| RasterError::truncated("ICC tag offset"))? as usize;
            let size = r.read_u32(entry_off + 8).ok_or_else(|| RasterError::truncated("ICC tag size"))? as usize;
            if !r.can_read(offset, size) {
                return Err(RasterError::truncated("ICC tag data"));
            }
            tags.insert(sig, TagEntry { offset, size });
        }

        Ok(Profile { header, tags, data: data.to_vec() })
    }

    fn tag_bytes(&self, sig: &[u8; 4]) -> Option<&[u8]> {
        self.tags.get(sig).map(|t| &self.data[t.offset..t.offset + t.size])
    }

    /// Evaluate a `curv`/`para` TRC tag by signature (e.g. `b"rTRC"`).
    /// Returns `Ok(None)` when the tag is absent rather than an error: not
    /// every profile carries every channel's TRC.
    pub fn trc(&self, sig: &[u8; 4]) -> Result<Option<Trc>> {
        let Some(bytes) = self.tag_bytes(sig) else { return Ok(None) };
        if bytes.len() < 8 {
            return Err(RasterError::truncated("ICC TRC tag"));
        }
        let type_sig = &bytes[0..4];
        let payload = &bytes[8..];
        match type_sig {
            b"curv" => Ok(Some(Trc::parse_curv(payload)?)),
            b"para" => Ok(Some(Trc::parse_para(payload)?)),
            other => Err(RasterError::malformed("ICC TRC tag", format!("unsupported curve type {:?}", String::from_utf8_lossy(other)))),
        }
    }

    fn xyz_tag(&self, sig: &[u8; 4]) -> Result<Option<[f32; 3]>> {
        let Some(bytes) = self.tag_bytes(sig) else { return Ok(None) };
        if &bytes[0..4] != b"XYZ " || bytes.len() < 20 {
            return Err(RasterError::malformed("ICC XYZ tag", "bad XYZType header"));
        }
        let r = BigEndianReader::new(&bytes[8..]);
        Ok(Some([
            r.read_s15fixed16(0).ok_or_else(|| RasterError::truncated("ICC XYZ"))?,
            r.read_s15fixed16(4).ok_or_else(|| RasterError::truncated("ICC XYZ"))?,
            r.read_s15fixed16(8).ok_or_else(|| RasterError::truncated("ICC XYZ"))?,
        ]))
    }

    pub fn white_point(&self) -> Result<Option<[f32; 3]>> {
        self.xyz_tag(b"wtpt")
    }

    /// Chromatic-adaptation matrix from the `chad` tag (row-major 3x3 of
    /// `s15Fixed16Number`), when present.
    pub fn chad_matrix(&self) -> Result<Option<[f32; 9]>> {
        let Some(bytes) = self.tag_bytes(b"chad") else { return Ok(None) };
        if &bytes[0..4] != b"sf32" || bytes.len() < 8 + 9 * 4 {
            return Err(RasterError::malformed("ICC chad tag", "bad sf32Type header"));
        }
        let r = BigEndianReader::new(&bytes[8..]);
        let mut m = [0f32; 9];
        for (i, slot) in m.iter_mut().enumerate() {
            *slot = r.read_s15fixed16(i * 4).ok_or_else(|| RasterError::truncated("ICC chad matrix"))?;
        }
        Ok(Some(m))
    }

    /// Matrix-curve column vectors from `rXYZ`/`gXYZ`/`bXYZ`, assembled into
    /// a row-major 3x3 matrix, when all three are present.
    pub fn matrix_columns(&self) -> Result<Option<[f32; 9]>> {
        let r = self.xyz_tag(b"rXYZ")?;
        let g = self.xyz_tag(b"gXYZ")?;
        let b = self.xyz_tag(b"bXYZ")?;
        match (r, g, b) {
            (Some(r), Some(g), Some(b)) => Ok(Some([r[0], g[0], b[0], r[1], g[1], b[1], r[2], g[2], b[2]])),
            _ => Ok(None),
        }
    }

    /// A-to-B pipeline for the given rendering intent, preferring `A2B0`
    /// (perceptual)/`A2B1` (relative colorimetric)/`A2B2` (saturation) per
    /// the usual ICC convention; falls back to whichever `A2Bn` is present.
    pub fn a2b(&self, intent: RenderingIntent) -> Result<Option<LutPipeline>> {
        let preferred: &[&[u8; 4]] = match intent {
            RenderingIntent::Perceptual => &[b"A2B0", b"A2B1", b"A2B2"],
            RenderingIntent::RelativeColorimetric | RenderingIntent::AbsoluteColorimetric => &[b"A2B1", b"A2B0", b"A2B2"],
            RenderingIntent::Saturation => &[b"A2B2", b"A2B0", b"A2B1"],
        };
        for sig in preferred {
            if let Some(bytes) = self.tag_bytes(sig) {
                return Ok(Some(LutPipeline::parse(bytes)?));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_profile(tags: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[36..40].copy_from_slice(b"acsp");
        data[16..20].copy_from_slice(b"RGB ");
        data[20..24].copy_from_slice(b"XYZ ");
        data[64..68].copy_from_slice(&1u32.to_be_bytes()); // relative colorimetric

        let tag_table_start = data.len();
        let mut tag_table = Vec::new();
        let mut payloads = Vec::new();
        let mut offset = HEADER_SIZE + 4 + tags.len() * TAG_ENTRY_SIZE;
        for (sig, payload) in tags {
            tag_table.extend_from_slice(sig);
            tag_table.extend_from_slice(&(offset as u32).to_be_bytes());
            tag_table.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            offset += payload.len();
            payloads.extend_from_slice(payload);
        }
        data.extend_from_slice(&(tags.len() as u32).to_be_bytes());
        assert_eq!(data.len(), tag_table_start + 4);
        data.extend_from_slice(&tag_table);
        data.extend_from_slice(&payloads);
        data
    }

    #[test]
    fn parses_header_color_space_and_intent() {
        let data = minimal_profile(&[]);
        let profile = Profile::parse(&data).unwrap();
        assert_eq!(profile.header.data_color_space, ColorSpaceSig::Rgb);
        assert_eq!(profile.header.rendering_intent, RenderingIntent::RelativeColorimetric);
    }

    #[test]
    fn reads_identity_curv_tag() {
        let mut curv = b"curv".to_vec();
        curv.extend_from_slice(&[0u8; 4]); // reserved
        curv.extend_from_slice(&0u32.to_be_bytes()); // count = 0 => identity
        let data = minimal_profile(&[(*b"rTRC", curv)]);
        let profile = Profile::parse(&data).unwrap();
        let trc = profile.trc(b"rTRC").unwrap().unwrap();
        assert_eq!(trc.eval(0.42), 0.42);
    }

    #[test]
    fn missing_tag_is_none_not_error() {
        let data = minimal_profile(&[]);
        let profile = Profile::parse(&data).unwrap();
        assert!(profile.trc(b"rTRC").unwrap().is_none());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut data = vec![0u8; HEADER_SIZE + 4];
        data[16..20].copy_from_slice(b"RGB ");
        assert!(Profile::parse(&data).is_err());
    }
}
