//! Engine-wide bound constants. The "configuration" layer of a core with no
//! runtime config file: every validation bound a pool parameter is checked
//! against lives here, the way `astroport_pcl_common::consts` collects the
//! concentrated-pair bounds.

use crate::WadU128;

/// Fixed-point one, i.e. `1.0` at 18 fractional decimal digits.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Seconds in a 365-day year, used to convert pool duration into WAD years.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Minimum token decimal width accepted by `create_pair`.
pub const MIN_DECIMALS: u8 = 6;
/// Maximum token decimal width accepted by `create_pair`.
pub const MAX_DECIMALS: u8 = 18;

/// Fee floor, in basis points.
pub const MIN_FEE_BPS: u16 = 1;
/// Fee ceiling, in basis points.
pub const MAX_FEE_BPS: u16 = 1_000;

/// Volatility floor, in basis points (1% implied vol).
pub const MIN_VOLATILITY_BPS: u32 = 100;
/// Volatility ceiling, in basis points (1000% implied vol).
pub const MAX_VOLATILITY_BPS: u32 = 100_000;

/// JIT anti-siphon policy applied to pools created without a controller.
pub const DEFAULT_JIT_POLICY: u64 = 0;

/// Basis-point denominator: `10_000 == 100%`.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// `u128::MAX`, the "all of it" sentinel for claim/draw/fund amounts.
pub const AMOUNT_MAX_SENTINEL: u128 = u128::MAX;

/// `pair_ref == 0` resolves to "the most recently created pair".
pub const LATEST_PAIR_SENTINEL: u32 = 0;

/// Width, in bits, of the pool nonce packed into a [`crate::ids::PoolId`].
pub const POOL_NONCE_BITS: u32 = 32;
/// Width, in bits, of the pair id packed into a [`crate::ids::PoolId`].
pub const POOL_PAIR_ID_BITS: u32 = 24;

/// One WAD as a typed reserve amount, used as the additive identity in
/// reserve/liquidity arithmetic.
pub const ZERO_WAD: WadU128 = 0;
