//! The IJG "islow" integer IDCT, fused with dequantization.
//!
//! Ported from libjpeg's `jidctint.c` algorithm: an AAN-derived separable
//! 1-D IDCT run once over rows then once over columns, with scaling chosen
//! so rounding matches libjpeg bit-for-bit (`CONST_BITS=13`, `PASS1_BITS=2`).

use super::tables::*;

/// Dequantize zig-zag-ordered coefficients and run the full IDCT, producing
/// a level-shifted, clamped natural-order 8x8 block of samples.
pub fn transform_scaled_zigzag(zigzag_coeffs: &[i32; 64], plan: &IdctPlan) -> [u8; 64] {
    let mut natural = [0i32; 64];
    for i in 0..64 {
        natural[ZIGZAG[i]] = zigzag_coeffs[i] * plan.dequant_zig[i];
    }
    idct_islow(&natural)
}

/// Same as [`transform_scaled_zigzag`] but the input is already natural-order
/// (used by progressive JPEG, whose coefficient buffer is stored natural-order
/// after per-scan accumulation).
pub fn transform_scaled_natural(natural_coeffs: &[i32; 64], plan: &IdctPlan) -> [u8; 64] {
    let mut dequant = [0i32; 64];
    for i in 0..64 {
        dequant[i] = natural_coeffs[i] * plan.dequant_natural[i];
    }
    idct_islow(&dequant)
}

/// DC-only fast path: if every AC coefficient is zero, the whole block is a
/// uniform value derived from the DC term alone.
pub fn is_dc_only(natural_coeffs: &[i32; 64]) -> bool {
    natural_coeffs[1..].iter().all(|&c| c == 0)
}

pub fn dc_only_block(dc_dequant: i32) -> [u8; 64] {
    // Pass 1 would broadcast `dc << PASS1_BITS` into every row of the column,
    // pass 2 then descales by the same `CONST_BITS + PASS1_BITS + 3` every
    // other column of the full IDCT uses, since a constant input column
    // carries no row-pass cross terms.
    let dcval = descale((dc_dequant as i64) << (PASS1_BITS + CONST_BITS), CONST_BITS + PASS1_BITS + 3);
    let val = clamp_sample(dcval + 128);
    [val; 64]
}

#[inline]
fn clamp_sample(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Full two-pass separable IDCT over a natural-order dequantized block.
fn idct_islow(coef: &[i32; 64]) -> [u8; 64] {
    let mut workspace = [0i32; 64];

    // Pass 1: process columns, results scaled by PASS1_BITS extra bits.
    for col in 0..8 {
        let c = |r: usize| coef[r * 8 + col] as i64;

        if (1..8).all(|r| c(r) == 0) {
            let dcval = (c(0) << PASS1_BITS) as i32;
            for r in 0..8 {
                workspace[r * 8 + col] = dcval;
            }
            continue;
        }

        let z2 = c(2);
        let z3 = c(6);
        let z1 = (z2 + z3) * FIX_0_541196100;
        let tmp2 = z1 + z3 * -FIX_1_847759065;
        let tmp3 = z1 + z2 * FIX_0_765366865;

        let z2 = c(0);
        let z3 = c(4);
        let tmp0 = (z2 + z3) << CONST_BITS;
        let tmp1 = (z2 - z3) << CONST_BITS;

        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        let t0 = c(7);
        let t1 = c(5);
        let t2 = c(3);
        let t3 = c(1);

        let mut z1 = t0 + t3;
        let mut z2 = t1 + t2;
        let mut z3 = t0 + t2;
        let mut z4 = t1 + t3;
        let z5 = (z3 + z4) * FIX_1_175875602;

        let mut tmp0b = t0 * FIX_0_298631336;
        let mut tmp1b = t1 * FIX_2_053119869;
        let mut tmp2b = t2 * FIX_3_072711026;
        let mut tmp3b = t3 * FIX_1_501321110;
        z1 *= -FIX_0_899976223;
        z2 *= -FIX_2_562915447;
        z3 *= -FIX_1_961570560;
        z3 += z5;
        z4 *= -FIX_0_390180644;
        z4 += z5;

        tmp0b += z1 + z3;
        tmp1b += z2 + z4;
        tmp2b += z2 + z3;
        tmp3b += z1 + z4;

        workspace[0 * 8 + col] = descale(tmp10 + tmp3b, CONST_BITS - PASS1_BITS);
        workspace[7 * 8 + col] = descale(tmp10 - tmp3b, CONST_BITS - PASS1_BITS);
        workspace[1 * 8 + col] = descale(tmp11 + tmp2b, CONST_BITS - PASS1_BITS);
        workspace[6 * 8 + col] = descale(tmp11 - tmp2b, CONST_BITS - PASS1_BITS);
        workspace[2 * 8 + col] = descale(tmp12 + tmp1b, CONST_BITS - PASS1_BITS);
        workspace[5 * 8 + col] = descale(tmp12 - tmp1b, CONST_BITS - PASS1_BITS);
        workspace[3 * 8 + col] = descale(tmp13 + tmp0b, CONST_BITS - PASS1_BITS);
        workspace[4 * 8 + col] = descale(tmp13 - tmp0b, CONST_BITS - PASS1_BITS);
    }

    let mut out = [0u8; 64];

    // Pass 2: process rows, descale to samples and level-shift +128.
    for row in 0..8 {
        let w = |c: usize| workspace[row * 8 + c] as i64;

        let z2 = w(2);
        let z3 = w(6);
        let z1 = (z2 + z3) * FIX_0_541196100;
        let tmp2 = z1 + z3 * -FIX_1_847759065;
        let tmp3 = z1 + z2 * FIX_0_765366865;

        let z2 = w(0);
        let z3 = w(4);
        let tmp0 =
            (z2 + z3) << CONST_BITS;
        let tmp1 =
            (z2 - z3) << CONST_BITS;

        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        let t0 = w(7);
        let t1 = w(5);
        let t2 = w(3);
        let t3 = w(1);

        let mut z1 = t0 + t3;
        let mut z2 = t1 + t2;
        let mut z3 = t0 + t2;
        let mut z4 = t1 + t3;
        let z5 = (z3 + z4) * FIX_1_175875602;

        let mut tmp0b = t0 * FIX_0_298631336;
        let mut tmp1b = t1 * FIX_2_053119869;
        let mut tmp2b = t2 * FIX_3_072711026;
        let mut tmp3b = t3 * FIX_1_501321110;
        z1 *= -FIX_0_899976223;
        z2 *= -FIX_2_562915447;
        z3 *= -FIX_1_961570560;
        z3 += z5;
        z4 *= -FIX_0_390180644;
        z4 += z5;

        tmp0b += z1 + z3;
        tmp1b += z2 + z4;
        tmp2b += z2 + z3;
        tmp3b += z1 + z4;

        const SHIFT: i32 = CONST_BITS + PASS1_BITS + 3;
        out[row * 8 + 0] = clamp_sample(descale(tmp10 + tmp3b, SHIFT) + 128);
        out[row * 8 + 7] = clamp_sample(descale(tmp10 - tmp3b, SHIFT) + 128);
        out[row * 8 + 1] = clamp_sample(descale(tmp11 + tmp2b, SHIFT) + 128);
        out[row * 8 + 6] = clamp_sample(descale(tmp11 - tmp2b, SHIFT) + 128);
        out[row * 8 + 2] = clamp_sample(descale(tmp12 + tmp1b, SHIFT) + 128);
        out[row * 8 + 5] = clamp_sample(descale(tmp12 - tmp1b, SHIFT) + 128);
        out[row * 8 + 3] = clamp_sample(descale(tmp13 + tmp0b, SHIFT) + 128);
        out[row * 8 + 4] = clamp_sample(descale(tmp13 - tmp0b, SHIFT) + 128);
    }

    out
}

/// Forward DCT used only by the `jpeg_idct_round_trip` test; not
/// part of the decoder's runtime path. A direct float DCT-II is accurate
/// enough to validate the integer IDCT's rounding against round-trip bytes.
#[cfg(test)]
pub fn forward_dct(samples: &[i32; 64]) -> [i32; 64] {
    let mut out = [0i32; 64];
    for u in 0..8 {
        for v in 0..8 {
            let mut sum = 0.0f64;
            for x in 0..8 {
                for y in 0..8 {
                    let s = samples[x * 8 + y] as f64 - 128.0;
                    sum += s
                        * ((std::f64::consts::PI * (2.0 * x as f64 + 1.0) * u as f64 / 16.0).cos())
                        * ((std::f64::consts::PI * (2.0 * y as f64 + 1.0) * v as f64 / 16.0).cos());
                }
            }
            let cu = if u == 0 { 1.0 / std::f64::consts::SQRT_2 } else { 1.0 };
            let cv = if v == 0 { 1.0 / std::f64::consts::SQRT_2 } else { 1.0 };
            out[u * 8 + v] = (0.25 * cu * cv * sum).round() as i32;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_only_fast_path_matches_uniform_block() {
        let mut natural = [0i32; 64];
        natural[0] = 64;
        let plan = IdctPlan { dequant_zig: [1; 64], dequant_natural: [1; 64] };
        let full = transform_scaled_natural(&natural, &plan);
        let fast = dc_only_block(natural[0] * plan.dequant_natural[0]);
        assert!(is_dc_only(&natural));
        for i in 0..64 {
            assert!((full[i] as i32 - fast[i] as i32).abs() <= 1, "idx {i}: {} vs {}", full[i], fast[i]);
        }
    }

    #[test]
    fn idct_round_trip_within_one_level() {
        let input: [i32; 64] = {
            let mut a = [0i32; 64];
            for (i, v) in a.iter_mut().enumerate() {
                *v = 100 + (i as i32 * 7) % 155;
            }
            a
        };
        let coeffs = forward_dct(&input);
        let plan = IdctPlan { dequant_zig: [1; 64], dequant_natural: [1; 64] };
        let decoded = transform_scaled_natural(&coeffs, &plan);
        for i in 0..64 {
            let diff = (decoded[i] as i32 - input[i]).abs();
            assert!(diff <= 2, "idx {i}: decoded={} input={}", decoded[i], input[i]);
        }
    }

    #[test]
    fn baseline_scenario_dc64_all_ac_zero() {
        // quant table all 1s, DC coeff 64, AC all zero => dc/8 + 128 = 136 everywhere.
        let mut zigzag = [0i32; 64];
        zigzag[0] = 64;
        let quant = [1u16; 64];
        let plan = IdctPlan::from_quant_table(&quant);
        let block = transform_scaled_zigzag(&zigzag, &plan);
        for &b in block.iter() {
            assert_eq!(b, 136);
        }
    }
}
