//! Rendering-intent pipeline and the ICC [`Sampler`] implementation.

use crate::colorspace::{RenderingIntent, RgbaF32, Sampler};
use crate::error::Result;

use super::lut::LutPipeline;
use super::profile::{ColorSpaceSig, Profile};

/// D50, the PCS illuminant every ICC profile's XYZ tags are relative to.
const D50_WHITE: [f32; 3] = [0.9642, 1.0, 0.8249];

fn xyz_to_srgb(xyz: [f32; 3]) -> RgbaF32 {
    let [x, y, z] = xyz;
    let r = 3.1338561 * x - 1.6168667 * y - 0.4906146 * z;
    let g = -0.9787684 * x + 1.9161415 * y + 0.0334540 * z;
    let b = 0.0719453 * x - 0.2289914 * y + 1.4052427 * z;
    RgbaF32::opaque(srgb_gamma(r).clamp(0.0, 1.0), srgb_gamma(g).clamp(0.0, 1.0), srgb_gamma(b).clamp(0.0, 1.0))
}

fn srgb_gamma(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        12.92 * linear
    } else {
        1.055 * linear.max(0.0).powf(1.0 / 2.4) - 0.055
    }
}

fn mat_vec(m: &[f32; 9], v: [f32; 3]) -> [f32; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

/// Bradford-adapted chromatic-adaptation matrix from `src_white` to
/// `dst_white`, used when the profile carries no `chad` tag.
fn bradford_adaptation(src_white: [f32; 3], dst_white: [f32; 3]) -> [f32; 9] {
    const BRADFORD: [f32; 9] = [0.8951, 0.2664, -0.1614, -0.7502, 1.7135, 0.0367, 0.0389, -0.0685, 1.0296];
    const BRADFORD_INV: [f32; 9] = [
        0.9869929, -0.1470543, 0.1599627, 0.4323053, 0.5183603, 0.0492912, -0.0085287, 0.0400428, 0.9684867,
    ];
    let src_cone = mat_vec(&BRADFORD, src_white);
    let dst_cone = mat_vec(&BRADFORD, dst_white);
    let scale = [
        if src_cone[0] != 0.0 { dst_cone[0] / src_cone[0] } else { 1.0 },
        if src_cone[1] != 0.0 { dst_cone[1] / src_cone[1] } else { 1.0 },
        if src_cone[2] != 0.0 { dst_cone[2] / src_cone[2] } else { 1.0 },
    ];
    let scaled = [
        scale[0], 0.0, 0.0, //
        0.0, scale[1], 0.0, //
        0.0, 0.0, scale[2],
    ];
    mat_mul(&mat_mul(&BRADFORD_INV, &scaled), &BRADFORD)
}

fn mat_mul(a: &[f32; 9], b: &[f32; 9]) -> [f32; 9] {
    let mut out = [0f32; 9];
    for row in 0..3 {
        for col in 0..3 {
            let mut acc = 0f32;
            for k in 0..3 {
                acc += a[row * 3 + k] * b[k * 3 + col];
            }
            out[row * 3 + col] = acc;
        }
    }
    out
}

enum Pipeline {
    Lut(LutPipeline),
    MatrixCurves { matrix: [f32; 9], adapt: Option<[f32; 9]> },
}

/// Wires a parsed [`Profile`] into the [`Sampler`] seam. Built once per
/// profile + rendering intent.
pub struct IccSampler {
    color_space: ColorSpaceSig,
    intent: RenderingIntent,
    pipeline: Pipeline,
    input_curves: [super::trc::Trc; 3],
}

impl IccSampler {
    pub fn build(profile: &Profile, intent: RenderingIntent) -> Result<Self> {
        let input_curves = [
            profile.trc(b"rTRC")?.unwrap_or(super::trc::Trc::Identity),
            profile.trc(b"gTRC")?.unwrap_or(super::trc::Trc::Identity),
            profile.trc(b"bTRC")?.unwrap_or(super::trc::Trc::Identity),
        ];

        // Saturation falls back to perceptual when no saturation-specific
        // A2B is present: `Profile::a2b` already tries A2B0 as
        // its secondary choice for Saturation, so a direct lookup covers it.
        if let Some(lut) = profile.a2b(intent)? {
            return Ok(IccSampler { color_space: profile.header.data_color_space, intent, pipeline: Pipeline::Lut(lut), input_curves });
        }

        let matrix = profile.matrix_columns()?.unwrap_or([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let adapt = if matches!(intent, RenderingIntent::AbsoluteColorimetric) {
            // Absolute colorimetric skips white-point adaptation entirely.
            None
        } else {
            let src_white = profile.white_point()?.unwrap_or(D50_WHITE);
            Some(profile.chad_matrix()?.unwrap_or_else(|| bradford_adaptation(src_white, D50_WHITE)))
        };
        Ok(IccSampler { color_space: profile.header.data_color_space, intent, pipeline: Pipeline::MatrixCurves { matrix, adapt }, input_curves })
    }

    pub fn rendering_intent(&self) -> RenderingIntent {
        self.intent
    }
}

impl Sampler for IccSampler {
    fn sample(&self, components: &[f32]) -> RgbaF32 {
        match &self.pipeline {
            Pipeline::Lut(lut) => {
                let padded: Vec<f32> = (0..self.color_space.component_count()).map(|i| components.get(i).copied().unwrap_or(0.0)).collect();
                match lut.eval(&padded) {
                    Ok(pcs) if pcs.len() >= 3 => xyz_to_srgb([pcs[0], pcs[1], pcs[2]]),
                    _ => RgbaF32::opaque(0.0, 0.0, 0.0),
                }
            }
            Pipeline::MatrixCurves { matrix, adapt } => {
                let linear: Vec<f32> =
                    components.iter().enumerate().map(|(i, &c)| self.input_curves.get(i).map_or(c, |curve| curve.eval(c))).collect();
                let rgb = [linear.first().copied().unwrap_or(0.0), linear.get(1).copied().unwrap_or(0.0), linear.get(2).copied().unwrap_or(0.0)];
                let xyz = mat_vec(matrix, rgb);
                let xyz = match adapt {
                    Some(m) => mat_vec(m, xyz),
                    None => xyz,
                };
                xyz_to_srgb(xyz)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bradford_identity_whitepoints_is_identity_matrix() {
        let m = bradford_adaptation(D50_WHITE, D50_WHITE);
        let v = mat_vec(&m, [0.5, 0.3, 0.2]);
        assert!((v[0] - 0.5).abs() < 1e-3);
        assert!((v[1] - 0.3).abs() < 1e-3);
        assert!((v[2] - 0.2).abs() < 1e-3);
    }

    #[test]
    fn srgb_gamma_is_monotone() {
        let mut prev = srgb_gamma(0.0);
        for i in 1..=10 {
            let v = srgb_gamma(i as f32 / 10.0);
            assert!(v >= prev);
            prev = v;
        }
    }
}
