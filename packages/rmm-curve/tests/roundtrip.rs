//! Property tests for the curve library's round-trip law (spec §8 property
//! 7): recovering a price from the reserves computed for it should return
//! the original price to within a small tolerance.

use proptest::prelude::*;
use rmm_curve::{bps_to_wad, price_of_x, seconds_to_wad_years, x_of_price};
use rmm_types::consts::WAD;

proptest! {
    #[test]
    fn price_round_trips_through_x(
        price_units in 100u128..10_000u128,
        strike_units in 100u128..10_000u128,
        vol_bps in 100u32..20_000u32,
        elapsed in 0u64..31_535_999u64,
    ) {
        let price = price_units * WAD;
        let strike = strike_units * WAD;
        let sigma = bps_to_wad(vol_bps);
        let tau = seconds_to_wad_years(31_536_000, elapsed);

        let x = x_of_price(price, strike, sigma, tau).unwrap();
        let recovered = price_of_x(x, strike, sigma, tau).unwrap();

        // Rational-approximation error budget: within 1% of the original price.
        let diff = recovered.abs_diff(price);
        prop_assert!(diff * 100 <= price, "recovered {recovered} vs original {price}");
    }
}
