//! 18-decimal WAD fixed-point arithmetic with directed rounding, plus the
//! transcendental primitives the curve library needs (`ln`, `exp`, `sqrt`,
//! the Gaussian CDF/PPF). Every iterative routine here follows the
//! teacher's `newton_d`/`newton_y` idiom (`pair_concentrated/src/math.rs`):
//! a bounded loop, a running estimate, and an explicit convergence
//! tolerance — no floating point anywhere in the crate.

use rmm_types::checkpoint::U256;
use rmm_types::consts::WAD;
use rmm_types::error::{Error, Result};
use rmm_types::{WadI128, WadU128};

const WAD_U256: U256 = U256([WAD as u64, 0, 0, 0]);

fn u256_from_u128(x: u128) -> U256 {
    let lo = (x & u128::from(u64::MAX)) as u64;
    let hi = (x >> 64) as u64;
    U256([lo, hi, 0, 0])
}

fn u128_from_u256(x: U256) -> Result<u128> {
    if x.0[2] != 0 || x.0[3] != 0 {
        return Err(Error::CastOverflow);
    }
    Ok((x.0[0] as u128) | ((x.0[1] as u128) << 64))
}

/// `floor(a * b / WAD)`.
pub fn mul_wad_down(a: u128, b: u128) -> Result<u128> {
    let product = u256_from_u128(a) * u256_from_u128(b);
    u128_from_u256(product / WAD_U256)
}

/// `ceil(a * b / WAD)`.
pub fn mul_wad_up(a: u128, b: u128) -> Result<u128> {
    let product = u256_from_u128(a) * u256_from_u128(b);
    let (quotient, remainder) = (product / WAD_U256, product % WAD_U256);
    let bumped = if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::one()
    };
    u128_from_u256(bumped)
}

/// `floor(a * WAD / b)`. Fails with [`Error::DivisionByZero`] if `b == 0`.
pub fn div_wad_down(a: u128, b: u128) -> Result<u128> {
    if b == 0 {
        return Err(Error::DivisionByZero);
    }
    let numerator = u256_from_u128(a) * WAD_U256;
    u128_from_u256(numerator / u256_from_u128(b))
}

/// `ceil(a * WAD / b)`. Fails with [`Error::DivisionByZero`] if `b == 0`.
pub fn div_wad_up(a: u128, b: u128) -> Result<u128> {
    if b == 0 {
        return Err(Error::DivisionByZero);
    }
    let numerator = u256_from_u128(a) * WAD_U256;
    let denom = u256_from_u128(b);
    let (quotient, remainder) = (numerator / denom, numerator % denom);
    let bumped = if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::one()
    };
    u128_from_u256(bumped)
}

/// Casts a `u128` into a signed WAD, failing if it does not fit.
pub fn cast_to_signed(x: u128) -> Result<WadI128> {
    WadI128::try_from(x).map_err(|_| Error::CastOverflow)
}

/// Casts a signed WAD into an unsigned one, failing if it is negative.
pub fn cast_to_unsigned(x: WadI128) -> Result<WadU128> {
    WadU128::try_from(x).map_err(|_| Error::CastOverflow)
}

/// `x * 10^(18 - decimals)`, promoting a token-native amount to WAD scale.
pub fn scale_to_wad(x: u128, decimals: u8) -> Result<u128> {
    if decimals > 18 {
        return Err(Error::CastOverflow);
    }
    let exponent = 18 - decimals as u32;
    let factor = 10u128.checked_pow(exponent).ok_or(Error::OverflowWad)?;
    x.checked_mul(factor).ok_or(Error::OverflowWad)
}

/// `floor(x / 10^(18 - decimals))`, demoting a WAD amount to token-native
/// scale, rounding towards zero.
pub fn scale_from_wad_down(x: u128, decimals: u8) -> Result<u128> {
    if decimals > 18 {
        return Err(Error::CastOverflow);
    }
    let exponent = 18 - decimals as u32;
    let factor = 10u128.checked_pow(exponent).ok_or(Error::OverflowWad)?;
    Ok(x / factor)
}

/// Integer square root of a `U256`, via Newton's method with the standard
/// bit-length initial guess. Used as the kernel for [`sqrt_wad`].
fn isqrt_u256(x: U256) -> U256 {
    if x.is_zero() {
        return U256::zero();
    }
    let mut z = (x >> 1) + U256::one();
    let mut y = x;
    while z < y {
        y = z;
        z = (x / z + z) >> 1;
    }
    y
}

/// `sqrt(x)` in WAD, i.e. `floor(sqrt(x * WAD))`.
pub fn sqrt_wad(x: u128) -> Result<u128> {
    let scaled = u256_from_u128(x) * WAD_U256;
    u128_from_u256(isqrt_u256(scaled))
}

/// Natural log of a WAD value, ln(2) scaled to WAD.
const LN2_WAD: u128 = 693_147_180_559_945_309;

/// `exp(x)` in WAD for a signed WAD input `x`. Domain: all `x`; extreme
/// magnitudes fail with [`Error::OverflowWad`] or underflow to zero.
pub fn exp_wad(x: WadI128) -> Result<WadU128> {
    if x == 0 {
        return Ok(WAD);
    }
    // exp(x) = 2^k * exp(r), 0 <= r < ln2, by writing x = k*ln2 + r.
    let ln2 = LN2_WAD as i128;
    let k = x.div_euclid(ln2);
    let r = x.rem_euclid(ln2);

    // Taylor series for exp(r), r in [0, ln2): sum r^n / n!.
    let r_unsigned = r as u128;
    let mut term: u128 = WAD;
    let mut sum: u128 = WAD;
    for n in 1u32..40 {
        term = mul_wad_down(term, r_unsigned)?;
        term /= n as u128;
        if term == 0 {
            break;
        }
        sum = sum.checked_add(term).ok_or(Error::OverflowWad)?;
    }

    if k >= 0 {
        let shift = u32::try_from(k).map_err(|_| Error::OverflowWad)?;
        if shift >= 128 {
            return Err(Error::OverflowWad);
        }
        sum.checked_shl(shift).ok_or(Error::OverflowWad)
    } else {
        let shift = u32::try_from(-k).map_err(|_| Error::OverflowWad)?;
        if shift >= 128 {
            return Ok(0);
        }
        Ok(sum >> shift)
    }
}

/// `ln(x)` in WAD for an unsigned WAD input. Domain: `x > 0`, enforced by
/// [`Error::UndefinedPrice`] at call sites that treat zero as "undefined
/// price" rather than a bare math error.
pub fn ln_wad(x: u128) -> Result<WadI128> {
    if x == 0 {
        return Err(Error::DivisionByZero);
    }

    // Range-reduce x = m * 2^k with m in [WAD, 2*WAD).
    let mut m = x;
    let mut k: i128 = 0;
    while m >= WAD * 2 {
        m >>= 1;
        k += 1;
    }
    while m < WAD {
        m <<= 1;
        k -= 1;
    }

    // ln(m) via the atanh series: y = (m-1)/(m+1), ln(m) = 2*(y + y^3/3 + ...).
    let m_signed = cast_to_signed(m)?;
    let numerator = m_signed - WAD as i128;
    let denominator = m_signed + WAD as i128;
    let y = div_wad_signed(numerator, denominator)?;
    let y2 = mul_wad_signed(y, y)?;

    let mut term = y;
    let mut sum = y;
    for n in 1u32..20 {
        term = mul_wad_signed(term, y2)?;
        let divisor = (2 * n + 1) as i128;
        let contribution = term / divisor;
        if contribution == 0 {
            break;
        }
        sum = sum.checked_add(contribution).ok_or(Error::OverflowWad)?;
    }
    let ln_m = sum.checked_mul(2).ok_or(Error::OverflowWad)?;

    let ln2 = LN2_WAD as i128;
    k.checked_mul(ln2)
        .and_then(|v| v.checked_add(ln_m))
        .ok_or(Error::OverflowWad)
}

fn mul_wad_signed(a: WadI128, b: WadI128) -> Result<WadI128> {
    let sign = if (a < 0) ^ (b < 0) { -1i128 } else { 1 };
    let magnitude = mul_wad_down(a.unsigned_abs(), b.unsigned_abs())?;
    cast_to_signed(magnitude).map(|v| v * sign)
}

fn div_wad_signed(a: WadI128, b: WadI128) -> Result<WadI128> {
    if b == 0 {
        return Err(Error::DivisionByZero);
    }
    let sign = if (a < 0) ^ (b < 0) { -1i128 } else { 1 };
    let magnitude = div_wad_down(a.unsigned_abs(), b.unsigned_abs())?;
    cast_to_signed(magnitude).map(|v| v * sign)
}

/// Standard normal CDF, `Phi(x)`, in WAD. Implemented via the Abramowitz &
/// Stegun 7.1.26 rational approximation of `erf`, composed with
/// [`exp_wad`]; maximum absolute error of that approximation is ~1.5e-7,
/// comfortably inside the precision this engine's pools operate at.
pub fn gaussian_cdf(x: WadI128) -> Result<WadU128> {
    let sqrt2 = sqrt_wad(2 * WAD)? as i128;
    let z = div_wad_signed(x, sqrt2)?;
    let erf = erf_wad(z)?;
    // Phi(x) = 0.5 * (1 + erf(x / sqrt2))
    let one_plus_erf = (WAD as i128).checked_add(erf).ok_or(Error::OverflowWad)?;
    let half = cast_to_unsigned(one_plus_erf)? / 2;
    Ok(half)
}

fn erf_wad(x: WadI128) -> Result<WadI128> {
    // Abramowitz & Stegun 7.1.26, coefficients pre-scaled to WAD.
    const A1: i128 = 254_829_592_000_000_000;
    const A2: i128 = -284_496_736_000_000_000;
    const A3: i128 = 1_421_413_741_000_000_000;
    const A4: i128 = -1_453_152_027_000_000_000;
    const A5: i128 = 1_061_405_429_000_000_000;
    const P: i128 = 327_591_100_000_000_000; // 0.3275911 in WAD

    let sign = if x < 0 { -1i128 } else { 1 };
    let ax = cast_to_signed(x.unsigned_abs())?;

    let t_denom = (WAD as i128)
        .checked_add(mul_wad_signed(P, ax)?)
        .ok_or(Error::OverflowWad)?;
    let t = div_wad_signed(WAD as i128, t_denom)?;

    let poly = A1
        + mul_wad_signed(
            t,
            A2 + mul_wad_signed(t, A3 + mul_wad_signed(t, A4 + mul_wad_signed(t, A5)?)?)?,
        )?;
    let poly_t = mul_wad_signed(poly, t)?;

    let neg_x2 = -mul_wad_signed(ax, ax)?;
    let exp_term = cast_to_signed(exp_wad(neg_x2)?)?;
    let y = (WAD as i128)
        .checked_sub(mul_wad_signed(poly_t, exp_term)?)
        .ok_or(Error::OverflowWad)?;

    Ok(sign * y)
}

/// Standard normal PDF, `phi(x)`, in WAD.
fn gaussian_pdf(x: WadI128) -> Result<WadU128> {
    const SQRT_2PI_WAD: u128 = 2_506_628_274_631_000_502;
    let neg_half_x2 = -div_wad_signed(mul_wad_signed(x, x)?, 2 * WAD as i128)?;
    let numerator = exp_wad(neg_half_x2)?;
    div_wad_down(numerator, SQRT_2PI_WAD)
}

/// Evaluates a Horner polynomial `c[0]*v^n + c[1]*v^(n-1) + ... + c[n]` in
/// signed WAD, where both `v` and the coefficients are WAD-scaled.
fn horner(coeffs: &[i128], v: WadI128) -> Result<WadI128> {
    let mut acc = coeffs[0];
    for &c in &coeffs[1..] {
        acc = mul_wad_signed(acc, v)?
            .checked_add(c)
            .ok_or(Error::OverflowWad)?;
    }
    Ok(acc)
}

/// Inverse standard normal CDF, `Phi^-1(p)`, in WAD. Domain `0 < p < WAD`.
/// Implemented via Peter Acklam's rational approximation (the standard
/// closed-form inverse-normal construction used across quantitative-finance
/// libraries), refined by one Newton step against [`gaussian_pdf`] the way
/// `newton_y` refines its initial guess before returning.
pub fn gaussian_ppf(p: WadU128) -> Result<WadI128> {
    if p == 0 || p >= WAD {
        return Err(Error::UndefinedPrice);
    }

    const A: [i128; 6] = [
        -39_696_830_286_653_760_000,
        220_946_098_424_520_500_000,
        -275_928_510_446_968_700_000,
        138_357_751_867_269_000_000,
        -30_664_798_066_147_160_000,
        2_506_628_277_459_239_000,
    ];
    const B: [i128; 5] = [
        -54_476_098_798_224_060_000,
        161_585_836_858_040_900_000,
        -155_698_979_859_886_600_000,
        66_801_311_887_719_720_000,
        -13_280_681_552_885_720_000,
    ];
    const C: [i128; 6] = [
        -7_784_894_002_430_293,
        -322_396_458_041_136_500,
        -2_400_758_277_161_838_000,
        -2_549_732_539_343_734_000,
        4_374_664_141_464_968_000,
        2_938_163_982_698_783_000,
    ];
    const D: [i128; 4] = [
        7_784_695_709_041_462,
        322_467_129_070_039_800,
        2_445_134_137_142_996_000,
        3_754_408_661_907_416_000,
    ];
    const P_LOW: u128 = 24_250_000_000_000_000; // 0.02425 in WAD
    let p_high = WAD - P_LOW;

    let x = if p < P_LOW {
        let q = sqrt_wad(cast_to_unsigned(-2 * ln_wad(p)?)?)? as i128;
        let numerator = horner(&C, q)?;
        let denominator = horner(&D, q)?
            .checked_add(WAD as i128)
            .ok_or(Error::OverflowWad)?;
        div_wad_signed(numerator, denominator)?
    } else if p <= p_high {
        let q = cast_to_signed(p)? - WAD as i128 / 2;
        let r = mul_wad_signed(q, q)?;
        let numerator = mul_wad_signed(horner(&A, r)?, q)?;
        let denominator = horner(&B, r)?
            .checked_add(WAD as i128)
            .ok_or(Error::OverflowWad)?;
        div_wad_signed(numerator, denominator)?
    } else {
        let q = sqrt_wad(cast_to_unsigned(-2 * ln_wad(WAD - p)?)?)? as i128;
        let numerator = horner(&C, q)?;
        let denominator = horner(&D, q)?
            .checked_add(WAD as i128)
            .ok_or(Error::OverflowWad)?;
        -div_wad_signed(numerator, denominator)?
    };

    // One Newton refinement step: x -= (Phi(x) - p) / phi(x).
    let phi_x = cast_to_signed(gaussian_pdf(x)?)?;
    if phi_x == 0 {
        return Ok(x);
    }
    let cdf_x = cast_to_signed(gaussian_cdf(x)?)?;
    let error = cdf_x - cast_to_signed(p)?;
    let correction = div_wad_signed(error, phi_x)?;
    Ok(x - correction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_wad_rounds_in_the_stated_direction() {
        // (1/3) * 3 isn't exact at 18 decimals; up and down must bracket WAD.
        let third = div_wad_down(WAD, 3).unwrap();
        let down = mul_wad_down(third, 3 * WAD).unwrap();
        let up = mul_wad_up(third, 3 * WAD).unwrap();
        assert!(down <= WAD);
        assert!(up >= down);
    }

    #[test]
    fn div_wad_up_and_down_bracket_the_exact_ratio() {
        let down = div_wad_down(10, 3).unwrap();
        let up = div_wad_up(10, 3).unwrap();
        assert!(up >= down);
        assert_eq!(up - down, 1);
    }

    #[test]
    fn div_wad_by_zero_fails() {
        assert_eq!(div_wad_down(WAD, 0).unwrap_err(), Error::DivisionByZero);
        assert_eq!(div_wad_up(WAD, 0).unwrap_err(), Error::DivisionByZero);
    }

    #[test]
    fn sqrt_wad_of_one_is_one() {
        assert_eq!(sqrt_wad(WAD).unwrap(), WAD);
    }

    #[test]
    fn sqrt_wad_of_four_is_two() {
        assert_eq!(sqrt_wad(4 * WAD).unwrap(), 2 * WAD);
    }

    #[test]
    fn exp_of_zero_is_one() {
        assert_eq!(exp_wad(0).unwrap(), WAD);
    }

    #[test]
    fn ln_of_one_is_zero() {
        assert_eq!(ln_wad(WAD).unwrap(), 0);
    }

    #[test]
    fn ln_rejects_zero() {
        assert_eq!(ln_wad(0).unwrap_err(), Error::DivisionByZero);
    }

    #[test]
    fn ln_exp_round_trip_is_close() {
        let x = (2 * WAD) as i128; // ln(exp(2)) ~= 2
        let exp_x = exp_wad(x).unwrap();
        let recovered = ln_wad(exp_x).unwrap();
        let diff = (recovered - x).unsigned_abs();
        assert!(diff < WAD / 1_000, "diff {diff}");
    }

    #[test]
    fn gaussian_cdf_of_zero_is_one_half() {
        let half = gaussian_cdf(0).unwrap();
        let diff = half.abs_diff(WAD / 2);
        assert!(diff < WAD / 10_000);
    }

    #[test]
    fn gaussian_ppf_rejects_boundary_probabilities() {
        assert_eq!(gaussian_ppf(0).unwrap_err(), Error::UndefinedPrice);
        assert_eq!(gaussian_ppf(WAD).unwrap_err(), Error::UndefinedPrice);
    }

    #[test]
    fn gaussian_ppf_of_one_half_is_near_zero() {
        let x = gaussian_ppf(WAD / 2).unwrap();
        assert!(x.unsigned_abs() < WAD / 1_000, "x = {x}");
    }

    #[test]
    fn gaussian_cdf_ppf_round_trip() {
        let p = WAD / 4; // 0.25
        let x = gaussian_ppf(p).unwrap();
        let recovered = gaussian_cdf(x).unwrap();
        let diff = recovered.abs_diff(p);
        assert!(diff < WAD / 1_000, "diff {diff}");
    }
}
