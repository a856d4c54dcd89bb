//! The covered-call trading function: the `x <-> price`, `x <-> y`
//! conversions and the invariant check that the swap engine evolves along
//! (spec §4.2).

use rmm_types::consts::{SECONDS_PER_YEAR, WAD};
use rmm_types::error::{Error, Result};
use rmm_types::WadI128;

use crate::fixed_point::{
    cast_to_signed, div_wad_down, exp_wad, gaussian_cdf, gaussian_ppf, ln_wad, mul_wad_down,
    sqrt_wad,
};

/// `tau` in WAD years for a pool with `duration` seconds, `elapsed`
/// seconds already passed. Floors at zero — an expired pool has `tau == 0`.
pub fn seconds_to_wad_years(duration: u64, elapsed: u64) -> u128 {
    let remaining = duration.saturating_sub(elapsed);
    (remaining as u128) * WAD / (SECONDS_PER_YEAR as u128)
}

/// Converts a basis-point value into WAD, e.g. `30 bps -> 0.003 WAD`.
pub fn bps_to_wad(bps: u32) -> u128 {
    (bps as u128) * WAD / 10_000
}

fn sigma_sqrt_tau(sigma: u128, tau: u128) -> Result<u128> {
    let sqrt_tau = sqrt_wad(tau)?;
    mul_wad_down(sigma, sqrt_tau)
}

fn half_sigma_sq_tau(sigma: u128, tau: u128) -> Result<u128> {
    let sigma_sq = mul_wad_down(sigma, sigma)?;
    let scaled = mul_wad_down(sigma_sq, tau)?;
    Ok(scaled / 2)
}

/// `x_of_price`: the asset-side reserve share implied by a spot price.
///
/// `tau == 0 || sigma == 0` degenerates to `x = 0` (all value sits on the
/// quote side once there is no time or volatility left). `price == 0` is
/// undefined.
pub fn x_of_price(price: u128, strike: u128, sigma: u128, tau: u128) -> Result<u128> {
    if price == 0 {
        return Err(Error::UndefinedPrice);
    }
    if strike == 0 {
        return Err(Error::DivisionByZero);
    }
    if tau == 0 || sigma == 0 {
        return Ok(0);
    }

    let s_over_k = div_wad_down(price, strike)?;
    let ln_s_k = ln_wad(s_over_k)?;
    let drift = cast_to_signed(half_sigma_sq_tau(sigma, tau)?)?;
    let numerator = ln_s_k.checked_add(drift).ok_or(Error::OverflowWad)?;
    let denom = cast_to_signed(sigma_sqrt_tau(sigma, tau)?)?;
    if denom == 0 {
        return Err(Error::DivisionByZero);
    }
    let d = div_wad_signed(numerator, denom)?;
    let cdf_d = gaussian_cdf(d)?;
    Ok(WAD - cdf_d)
}

/// `price_of_x`: the spot price implied by an asset-side reserve share.
///
/// `x == 0` is undefined (price is unbounded); `x == 1` implies `price ==
/// 0`; `x > 1` is out of domain. `tau == 0 || sigma == 0` degenerates to
/// `price == strike`.
pub fn price_of_x(x: u128, strike: u128, sigma: u128, tau: u128) -> Result<u128> {
    if x == 0 {
        return Err(Error::UndefinedPrice);
    }
    if x > WAD {
        return Err(Error::OverflowWad);
    }
    if x == WAD {
        return Ok(0);
    }
    if tau == 0 || sigma == 0 {
        return Ok(strike);
    }

    let phi_inv = gaussian_ppf(WAD - x)?;
    let sigma_sqrt_tau_signed = cast_to_signed(sigma_sqrt_tau(sigma, tau)?)?;
    let drift = cast_to_signed(half_sigma_sq_tau(sigma, tau)?)?;
    let exponent = mul_wad_signed(phi_inv, sigma_sqrt_tau_signed)?
        .checked_sub(drift)
        .ok_or(Error::OverflowWad)?;
    let factor = exp_wad(exponent)?;
    mul_wad_down(strike, factor)
}

/// `y_of_x`: the quote-side reserve implied by an asset-side share, offset
/// by the pool's running invariant.
pub fn y_of_x(x: u128, strike: u128, sigma: u128, tau: u128, invariant: WadI128) -> Result<u128> {
    if tau == 0 || sigma == 0 {
        return add_invariant(strike, invariant);
    }
    if x >= WAD {
        return Err(Error::OverflowWad);
    }
    let phi_inv = gaussian_ppf(WAD - x)?;
    let sigma_sqrt_tau_signed = cast_to_signed(sigma_sqrt_tau(sigma, tau)?)?;
    let arg = phi_inv
        .checked_sub(sigma_sqrt_tau_signed)
        .ok_or(Error::OverflowWad)?;
    let cdf = gaussian_cdf(arg)?;
    let scaled = mul_wad_down(strike, cdf)?;
    add_invariant(scaled, invariant)
}

/// `x_of_y`: the asset-side share implied by a quote-side reserve, net of
/// the pool's running invariant.
pub fn x_of_y(y: u128, strike: u128, sigma: u128, tau: u128, invariant: WadI128) -> Result<u128> {
    if tau == 0 || sigma == 0 {
        return Ok(0);
    }
    if strike == 0 {
        return Err(Error::DivisionByZero);
    }
    let y_net = subtract_invariant(y, invariant)?;
    let ratio = div_wad_down(y_net, strike)?;
    let phi_inv = gaussian_ppf(ratio)?;
    let sigma_sqrt_tau_signed = cast_to_signed(sigma_sqrt_tau(sigma, tau)?)?;
    let arg = phi_inv
        .checked_add(sigma_sqrt_tau_signed)
        .ok_or(Error::OverflowWad)?;
    let cdf = gaussian_cdf(arg)?;
    Ok(WAD - cdf)
}

/// The scalar trading-function invariant, `k(x, y, K, sigma, tau)`. Must be
/// non-decreasing across any swap (spec §4.4 step 6).
pub fn invariant(y: u128, x: u128, strike: u128, sigma: u128, tau: u128) -> Result<WadI128> {
    let quote_at_x = if tau == 0 || sigma == 0 {
        strike
    } else {
        if x >= WAD {
            return Err(Error::OverflowWad);
        }
        let phi_inv = gaussian_ppf(WAD - x)?;
        let sigma_sqrt_tau_signed = cast_to_signed(sigma_sqrt_tau(sigma, tau)?)?;
        let arg = phi_inv
            .checked_sub(sigma_sqrt_tau_signed)
            .ok_or(Error::OverflowWad)?;
        mul_wad_down(strike, gaussian_cdf(arg)?)?
    };
    cast_to_signed(y)?
        .checked_sub(cast_to_signed(quote_at_x)?)
        .ok_or(Error::OverflowWad)
}

/// Computes `(y, x)` reserves for a target spot price and a starting
/// invariant, the pair used at pool creation (spec §4.2 `computeReserves`).
pub fn compute_reserves(
    price: u128,
    strike: u128,
    sigma: u128,
    tau: u128,
    invariant: WadI128,
) -> Result<(u128, u128)> {
    let x = x_of_price(price, strike, sigma, tau)?;
    let y = y_of_x(x, strike, sigma, tau, invariant)?;
    Ok((y, x))
}

fn add_invariant(base: u128, invariant: WadI128) -> Result<u128> {
    cast_to_signed(base)?
        .checked_add(invariant)
        .and_then(|v| u128::try_from(v).ok())
        .ok_or(Error::OverflowWad)
}

fn subtract_invariant(base: u128, invariant: WadI128) -> Result<u128> {
    cast_to_signed(base)?
        .checked_sub(invariant)
        .and_then(|v| u128::try_from(v).ok())
        .ok_or(Error::OverflowWad)
}

fn div_wad_signed(a: WadI128, b: WadI128) -> Result<WadI128> {
    if b == 0 {
        return Err(Error::DivisionByZero);
    }
    let sign = if (a < 0) ^ (b < 0) { -1i128 } else { 1 };
    let magnitude = div_wad_down(a.unsigned_abs(), b.unsigned_abs())?;
    cast_to_signed(magnitude).map(|v| v * sign)
}

fn mul_wad_signed(a: WadI128, b: WadI128) -> Result<WadI128> {
    let sign = if (a < 0) ^ (b < 0) { -1i128 } else { 1 };
    let magnitude = mul_wad_down(a.unsigned_abs(), b.unsigned_abs())?;
    cast_to_signed(magnitude).map(|v| v * sign)
}
