//! N-dimensional CLUT with multilinear interpolation.
//!
//! Table entries are stored pre-normalized to `[0,1]`. Interpolation walks
//! the `2^input_channels` corners of the enclosing grid cell, which
//! specializes to ordinary trilinear interpolation for the common 3-input
//! case without a separate code path.

use crate::error::{RasterError, Result};

pub struct Clut {
    input_channels: usize,
    output_channels: usize,
    grid_points: usize,
    table: Vec<f32>,
}

impl Clut {
    pub fn new(input_channels: usize, output_channels: usize, grid_points: usize, table: Vec<f32>) -> Result<Self> {
        let expected = grid_points.pow(input_channels as u32) * output_channels;
        if table.len() != expected {
            return Err(RasterError::semantic(format!(
                "ICC CLUT table has {} entries, expected {} ({} grid points ^ {} inputs * {} outputs)",
                table.len(),
                expected,
                grid_points,
                input_channels,
                output_channels
            )));
        }
        if input_channels == 0 || input_channels > 8 {
            return Err(RasterError::semantic("ICC CLUT input channel count out of range"));
        }
        Ok(Clut { input_channels, output_channels, grid_points, table })
    }

    /// Build a CLUT by sampling an arbitrary function at every grid point.
    pub fn from_sampler(input_channels: usize, output_channels: usize, grid_points: usize, f: impl Fn(&[f32]) -> Vec<f32>) -> Result<Self> {
        let total_points = grid_points.pow(input_channels as u32);
        let mut table = Vec::with_capacity(total_points * output_channels);
        let mut coords = vec![0usize; input_channels];
        for _ in 0..total_points {
            let input: Vec<f32> = coords.iter().map(|&c| c as f32 / (grid_points - 1).max(1) as f32).collect();
            table.extend(f(&input));
            // odometer increment, fastest-varying last input channel
            for i in (0..input_channels).rev() {
                coords[i] += 1;
                if coords[i] < grid_points {
                    break;
                }
                coords[i] = 0;
            }
        }
        Clut::new(input_channels, output_channels, grid_points, table)
    }

    fn entry(&self, grid_coords: &[usize]) -> &[f32] {
        let mut idx = 0usize;
        for &c in grid_coords {
            idx = idx * self.grid_points + c.min(self.grid_points - 1);
        }
        let start = idx * self.output_channels;
        &self.table[start..start + self.output_channels]
    }

    /// Multilinear interpolation at `input` (each component in `[0,1]`).
    pub fn sample(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.input_channels);
        let n = self.grid_points - 1;
        let mut lo = vec![0usize; self.input_channels];
        let mut frac = vec![0f32; self.input_channels];
        for (i, &v) in input.iter().enumerate() {
            let pos = v.clamp(0.0, 1.0) * n as f32;
            let l = pos.floor() as usize;
            lo[i] = l.min(n.saturating_sub(1).max(0));
            frac[i] = (pos - lo[i] as f32).clamp(0.0, 1.0);
        }

        let mut out = vec![0f32; self.output_channels];
        let corners = 1usize << self.input_channels;
        let mut coords = vec![0usize; self.input_channels];
        for corner in 0..corners {
            let mut weight = 1f32;
            for i in 0..self.input_channels {
                let bit = (corner >> i) & 1;
                coords[i] = lo[i] + bit;
                weight *= if bit == 1 { frac[i] } else { 1.0 - frac[i] };
            }
            if weight == 0.0 {
                continue;
            }
            let entry = self.entry(&coords);
            for (o, e) in out.iter_mut().zip(entry) {
                *o += weight * e;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_3d_clut_passes_through() {
        // 2x2x2 grid, 3 outputs, identity mapping at every grid corner.
        let grid_points = 2;
        let clut = Clut::from_sampler(3, 3, grid_points, |input| input.to_vec()).unwrap();
        let out = clut.sample(&[0.25, 0.6, 0.9]);
        assert!((out[0] - 0.25).abs() < 1e-5);
        assert!((out[1] - 0.6).abs() < 1e-5);
        assert!((out[2] - 0.9).abs() < 1e-5);
    }

    #[test]
    fn bilinear_2d_interpolates_corners() {
        // 2 inputs, 1 output; corners 0,0->0.0 0,1->1.0 1,0->1.0 1,1->2.0
        let table = vec![0.0, 1.0, 1.0, 2.0];
        let clut = Clut::new(2, 1, 2, table).unwrap();
        let out = clut.sample(&[0.5, 0.5]);
        assert!((out[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn wrong_table_length_is_rejected() {
        assert!(Clut::new(2, 1, 2, vec![0.0; 3]).is_err());
    }
}
