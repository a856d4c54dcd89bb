//! WAD fixed-point arithmetic and the covered-call trading-function library
//! (spec §4.1, §4.2).

pub mod curve;
pub mod fixed_point;

pub use curve::{
    bps_to_wad, compute_reserves, invariant, price_of_x, seconds_to_wad_years, x_of_price,
    x_of_y, y_of_x,
};
pub use fixed_point::{
    cast_to_signed, cast_to_unsigned, div_wad_down, div_wad_up, exp_wad, gaussian_cdf,
    gaussian_ppf, ln_wad, mul_wad_down, mul_wad_up, scale_from_wad_down, scale_to_wad, sqrt_wad,
};
