//! `lut8Type`/`lut16Type` A-to-B pipelines: a fixed
//! matrix, per-input curves, an N-dimensional CLUT, and per-output curves,
//! applied in the order the ICC spec defines for these tag types: matrix,
//! then input curves, then CLUT, then output curves.

use crate::bitio::BigEndianReader;
use crate::error::{RasterError, Result};

use super::clut::Clut;
use super::trc::Trc;

pub struct LutPipeline {
    input_channels: usize,
    output_channels: usize,
    matrix: [f32; 9],
    input_curves: Vec<Trc>,
    clut: Clut,
    output_curves: Vec<Trc>,
}

impl LutPipeline {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(RasterError::truncated("ICC lut tag"));
        }
        match &bytes[0..4] {
            b"mft1" => parse_mft1(bytes),
            b"mft2" => parse_mft2(bytes),
            _ => Err(RasterError::unsupported("ICC mAB/mBA LUT tag type")),
        }
    }

    pub fn eval(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.input_channels {
            return Err(RasterError::semantic("ICC LUT pipeline input arity mismatch"));
        }
        let after_matrix = apply_matrix(&self.matrix, input);
        let after_input_curves: Vec<f32> =
            after_matrix.iter().zip(&self.input_curves).map(|(&v, curve)| curve.eval(v)).collect();
        let clut_out = self.clut.sample(&after_input_curves);
        let final_out: Vec<f32> = clut_out.iter().zip(&self.output_curves).map(|(&v, curve)| curve.eval(v)).collect();
        Ok(final_out)
    }
}

fn apply_matrix(m: &[f32; 9], input: &[f32]) -> Vec<f32> {
    if input.len() != 3 {
        // the matrix stage only applies to 3-input (PCS=XYZ-adjacent) LUTs;
        // pass through untouched otherwise.
        return input.to_vec();
    }
    vec![
        m[0] * input[0] + m[1] * input[1] + m[2] * input[2],
        m[3] * input[0] + m[4] * input[1] + m[5] * input[2],
        m[6] * input[0] + m[7] * input[1] + m[8] * input[2],
    ]
}

fn parse_mft1(bytes: &[u8]) -> Result<LutPipeline> {
    let r = BigEndianReader::new(bytes);
    let input_channels = r.read_u8(8).ok_or_else(|| RasterError::truncated("ICC mft1 header"))? as usize;
    let output_channels = r.read_u8(9).ok_or_else(|| RasterError::truncated("ICC mft1 header"))? as usize;
    let clut_points = r.read_u8(10).ok_or_else(|| RasterError::truncated("ICC mft1 header"))? as usize;
    let matrix = read_matrix(&r, 12)?;

    let mut pos = 48;
    let mut input_curves = Vec::with_capacity(input_channels);
    for _ in 0..input_channels {
        let table: Vec<f32> = (0..256).map(|i| r.read_u8(pos + i).unwrap_or(0) as f32 / 255.0).collect();
        input_curves.push(Trc::Sampled(table));
        pos += 256;
    }

    let clut_entries = clut_points.pow(input_channels as u32) * output_channels;
    let clut_table: Vec<f32> = (0..clut_entries).map(|i| r.read_u8(pos + i).unwrap_or(0) as f32 / 255.0).collect();
    pos += clut_entries;
    let clut = Clut::new(input_channels, output_channels, clut_points, clut_table)?;

    let mut output_curves = Vec::with_capacity(output_channels);
    for _ in 0..output_channels {
        let table: Vec<f32> = (0..256).map(|i| r.read_u8(pos + i).unwrap_or(0) as f32 / 255.0).collect();
        output_curves.push(Trc::Sampled(table));
        pos += 256;
    }

    Ok(LutPipeline { input_channels, output_channels, matrix, input_curves, clut, output_curves })
}

fn parse_mft2(bytes: &[u8]) -> Result<LutPipeline> {
    let r = BigEndianReader::new(bytes);
    let input_channels = r.read_u8(8).ok_or_else(|| RasterError::truncated("ICC mft2 header"))? as usize;
    let output_channels = r.read_u8(9).ok_or_else(|| RasterError::truncated("ICC mft2 header"))? as usize;
    let clut_points = r.read_u8(10).ok_or_else(|| RasterError::truncated("ICC mft2 header"))? as usize;
    let matrix = read_matrix(&r, 12)?;
    let input_entries = r.read_u16(48).ok_or_else(|| RasterError::truncated("ICC mft2 header"))? as usize;
    let output_entries = r.read_u16(50).ok_or_else(|| RasterError::truncated("ICC mft2 header"))? as usize;

    let mut pos = 52;
    let mut input_curves = Vec::with_capacity(input_channels);
    for _ in 0..input_channels {
        let table: Vec<f32> = (0..input_entries).map(|i| r.read_u16(pos + i * 2).unwrap_or(0) as f32 / 65535.0).collect();
        input_curves.push(Trc::Sampled(table));
        pos += input_entries * 2;
    }

    let clut_entries = clut_points.pow(input_channels as u32) * output_channels;
    let clut_table: Vec<f32> = (0..clut_entries).map(|i| r.read_u16(pos + i * 2).unwrap_or(0) as f32 / 65535.0).collect();
    pos += clut_entries * 2;
    let clut = Clut::new(input_channels, output_channels, clut_points, clut_table)?;

    let mut output_curves = Vec::with_capacity(output_channels);
    for _ in 0..output_channels {
        let table: Vec<f32> = (0..output_entries).map(|i| r.read_u16(pos + i * 2).unwrap_or(0) as f32 / 65535.0).collect();
        output_curves.push(Trc::Sampled(table));
        pos += output_entries * 2;
    }

    Ok(LutPipeline { input_channels, output_channels, matrix, input_curves, clut, output_curves })
}

fn read_matrix(r: &BigEndianReader, offset: usize) -> Result<[f32; 9]> {
    let mut m = [0f32; 9];
    for (i, slot) in m.iter_mut().enumerate() {
        *slot = r.read_s15fixed16(offset + i * 4).ok_or_else(|| RasterError::truncated("ICC LUT matrix"))?;
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_mft1(channels: usize) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"mft1");
        data.extend_from_slice(&[0u8; 4]);
        data.push(channels as u8); // input channels
        data.push(channels as u8); // output channels
        data.push(2); // clut grid points
        data.push(0); // reserved/padding
        for i in 0..9 {
            let v: i32 = if i % 4 == 0 { 1 << 16 } else { 0 }; // identity matrix
            data.extend_from_slice(&v.to_be_bytes());
        }
        for _ in 0..channels {
            for i in 0..256u32 {
                data.push((i * 255 / 255) as u8);
            }
        }
        let grid_entries = 2usize.pow(channels as u32) * channels;
        let mut coords = vec![0usize; channels];
        for _ in 0..grid_entries / channels.max(1) {
            for c in 0..channels {
                data.push(if coords[c] == 1 { 255 } else { 0 });
            }
            for i in (0..channels).rev() {
                coords[i] += 1;
                if coords[i] < 2 {
                    break;
                }
                coords[i] = 0;
            }
        }
        for _ in 0..channels {
            for i in 0..256u32 {
                data.push(i as u8);
            }
        }
        data
    }

    #[test]
    fn identity_mft1_round_trips_input() {
        let data = identity_mft1(3);
        let pipeline = LutPipeline::parse(&data).unwrap();
        let out = pipeline.eval(&[0.25, 0.5, 0.75]).unwrap();
        assert!((out[0] - 0.25).abs() < 0.02);
        assert!((out[1] - 0.5).abs() < 0.02);
        assert!((out[2] - 0.75).abs() < 0.02);
    }

    #[test]
    fn unknown_lut_type_is_unsupported_not_a_panic() {
        let mut data = b"xxxx".to_vec();
        data.extend_from_slice(&[0u8; 40]);
        assert!(LutPipeline::parse(&data).is_err());
    }
}
