//! The swap engine (spec §4.4): a capability trait standing in for the
//! teacher's inheritance hierarchy over `Portfolio`-flavoured pools (spec
//! §9 "Inheritance over `Portfolio`"), a concrete covered-call
//! implementation of it, and the nine-step swap algorithm that drives
//! either one.

use rmm_curve::{
    bps_to_wad, compute_reserves, div_wad_down, mul_wad_down, price_of_x, scale_from_wad_down,
    scale_to_wad, seconds_to_wad_years, x_of_y, y_of_x,
};
use rmm_types::address::Address;
use rmm_types::checkpoint::U256;
use rmm_types::consts::{BPS_DENOMINATOR, WAD};
use rmm_types::error::{Error, Result};
use rmm_types::events::Event;
use rmm_types::ids::PoolId;
use rmm_types::pool::Pool;
use rmm_types::position::Position;
use rmm_types::WadI128;

use crate::ledger::Ledger;
use crate::state::State;

/// The capability set a pool flavour must provide for the swap engine to
/// drive it. The teacher's source expresses this as an abstract contract
/// different `Portfolio` flavours inherit from; here it is a trait, with
/// [`CoveredCall`] as the one concrete implementation this core ships.
pub trait SwapObjective {
    /// Syncs `pool.last_timestamp` to `now` and returns the invariant at
    /// entry. Fails `PoolExpired` if the pool has no time-to-maturity left.
    fn before_swap(&self, pool: &mut Pool, now: u64) -> Result<WadI128>;

    /// Folds a completed swap's effects back into the pool: new per-unit
    /// reserves, the timestamp, and fee/invariant growth checkpoints.
    #[allow(clippy::too_many_arguments)]
    fn after_swap(
        &self,
        pool: &mut Pool,
        sell_asset: bool,
        next_independent: u128,
        next_dependent: u128,
        fee_amount: u128,
        liquidity: u128,
        prev_invariant: WadI128,
        next_invariant: WadI128,
        now: u64,
    ) -> Result<()>;

    fn check_invariant(&self, prev: WadI128, next: WadI128) -> Result<()>;

    /// The largest whole-pool input consumable before the independent
    /// reserve share would leave the curve's `[0, WAD]` domain.
    fn compute_max_input(&self, pool: &Pool, live_independent: u128, liquidity: u128) -> Result<u128>;

    fn compute_reserves_from_price(&self, pool: &Pool, price: u128, now: u64) -> Result<(u128, u128)>;

    /// The pool's current implied spot price, derived from its live
    /// `virtual_x` reserve share.
    fn get_latest_estimated_price(&self, pool: &Pool, now: u64) -> Result<u128>;

    /// `(next_independent_per_unit, next_dependent_per_unit,
    /// output_amount_whole_pool)`. The curve is only ever moved by
    /// `consumed_less_fee`, the amount actually priced against the trader;
    /// `consumed` (fee included) is what the independent side's *stored*
    /// reserve grows by, so the fee the pool kept but never priced shows up
    /// as real invariant growth once the post-trade state is recomputed.
    fn get_amount_out(
        &self,
        pool: &Pool,
        sell_asset: bool,
        consumed: u128,
        consumed_less_fee: u128,
        liquidity: u128,
        prev_invariant: WadI128,
        now: u64,
    ) -> Result<(u128, u128, u128)>;

    fn check_position(&self, position: &Position) -> Result<()>;

    fn check_pool(&self, pool: &Pool, now: u64) -> Result<()>;
}

/// The covered-call trading function (spec §4.2), the only `SwapObjective`
/// this core ships.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoveredCall;

impl CoveredCall {
    fn curve_params(pool: &Pool, now: u64) -> (u128, u128, u128) {
        let strike = pool.params.max_price;
        let sigma = bps_to_wad(pool.params.volatility_bps);
        let elapsed = now.saturating_sub(pool.params.created_at);
        let tau = seconds_to_wad_years(pool.params.duration_seconds, elapsed);
        (strike, sigma, tau)
    }
}

impl SwapObjective for CoveredCall {
    fn before_swap(&self, pool: &mut Pool, now: u64) -> Result<WadI128> {
        if pool.is_expired(now) {
            return Err(Error::PoolExpired);
        }
        let (strike, sigma, tau) = Self::curve_params(pool, now);
        let prev_invariant = rmm_curve::invariant(pool.virtual_y, pool.virtual_x, strike, sigma, tau)?;
        pool.last_timestamp = now;
        Ok(prev_invariant)
    }

    fn after_swap(
        &self,
        pool: &mut Pool,
        sell_asset: bool,
        next_independent: u128,
        next_dependent: u128,
        fee_amount: u128,
        liquidity: u128,
        prev_invariant: WadI128,
        next_invariant: WadI128,
        now: u64,
    ) -> Result<()> {
        if sell_asset {
            pool.virtual_x = next_independent;
            pool.virtual_y = next_dependent;
        } else {
            pool.virtual_y = next_independent;
            pool.virtual_x = next_dependent;
        }
        pool.last_timestamp = now;

        if fee_amount > 0 {
            let fee_growth_delta = div_wad_down(fee_amount, liquidity)?;
            let delta_u256 = U256::from(fee_growth_delta);
            if sell_asset {
                pool.fee_growth_asset_global = pool.fee_growth_asset_global.wrapping_add(delta_u256);
            } else {
                pool.fee_growth_quote_global = pool.fee_growth_quote_global.wrapping_add(delta_u256);
            }
        }

        let invariant_delta = next_invariant.checked_sub(prev_invariant).ok_or(Error::OverflowWad)?;
        let invariant_delta_u256 = U256::from(invariant_delta.unsigned_abs());
        pool.invariant_growth_global = pool.invariant_growth_global.wrapping_add(invariant_delta_u256);
        Ok(())
    }

    fn check_invariant(&self, prev: WadI128, next: WadI128) -> Result<()> {
        if next >= prev {
            Ok(())
        } else {
            Err(Error::InvalidInvariant { prev, next })
        }
    }

    fn compute_max_input(&self, pool: &Pool, live_independent: u128, liquidity: u128) -> Result<u128> {
        let headroom = WAD.checked_sub(live_independent).ok_or(Error::OverflowWad)?;
        mul_wad_down(headroom, liquidity)
    }

    fn compute_reserves_from_price(&self, pool: &Pool, price: u128, now: u64) -> Result<(u128, u128)> {
        let (strike, sigma, tau) = Self::curve_params(pool, now);
        compute_reserves(price, strike, sigma, tau, 0)
    }

    fn get_latest_estimated_price(&self, pool: &Pool, now: u64) -> Result<u128> {
        let (strike, sigma, tau) = Self::curve_params(pool, now);
        price_of_x(pool.virtual_x, strike, sigma, tau)
    }

    fn get_amount_out(
        &self,
        pool: &Pool,
        sell_asset: bool,
        consumed: u128,
        consumed_less_fee: u128,
        liquidity: u128,
        prev_invariant: WadI128,
        now: u64,
    ) -> Result<(u128, u128, u128)> {
        let (strike, sigma, tau) = Self::curve_params(pool, now);
        let priced_delta = div_wad_down(consumed_less_fee, liquidity)?;
        let stored_delta = div_wad_down(consumed, liquidity)?;

        if sell_asset {
            let priced_x = pool.virtual_x.checked_add(priced_delta).ok_or(Error::OverflowWad)?;
            let next_y = y_of_x(priced_x, strike, sigma, tau, prev_invariant)?;
            let output_per_unit = pool.virtual_y.checked_sub(next_y).ok_or(Error::OverflowWad)?;
            let output_amount = mul_wad_down(output_per_unit, liquidity)?;
            let next_x = pool.virtual_x.checked_add(stored_delta).ok_or(Error::OverflowWad)?;
            Ok((next_x, next_y, output_amount))
        } else {
            let priced_y = pool.virtual_y.checked_add(priced_delta).ok_or(Error::OverflowWad)?;
            let next_x = x_of_y(priced_y, strike, sigma, tau, prev_invariant)?;
            let output_per_unit = pool.virtual_x.checked_sub(next_x).ok_or(Error::OverflowWad)?;
            let output_amount = mul_wad_down(output_per_unit, liquidity)?;
            let next_y = pool.virtual_y.checked_add(stored_delta).ok_or(Error::OverflowWad)?;
            Ok((next_y, next_x, output_amount))
        }
    }

    fn check_position(&self, _position: &Position) -> Result<()> {
        Ok(())
    }

    fn check_pool(&self, pool: &Pool, now: u64) -> Result<()> {
        if pool.is_expired(now) {
            Err(Error::PoolExpired)
        } else {
            Ok(())
        }
    }
}

/// Caller-supplied swap parameters (spec §4.4 input record).
pub struct SwapArgs {
    pub pool_id: PoolId,
    pub sell_asset: bool,
    pub use_max: bool,
    pub input_amount: u128,
    pub min_output: u128,
    pub now: u64,
}

/// The nine-step swap algorithm (spec §4.4), generic over the pool
/// flavour's [`SwapObjective`].
pub fn swap<O: SwapObjective>(
    state: &mut State,
    ledger: &mut Ledger,
    objective: &O,
    caller: Address,
    args: SwapArgs,
) -> Result<(u128, u128, Event)> {
    let pool_ref = state.pool_mut(args.pool_id)?;
    let prev_invariant = objective.before_swap(pool_ref, args.now)?;

    let pool = state.pool(args.pool_id)?.clone();
    let pair = *state.pairs.get(pool.pair_id)?;

    let (input_token, output_token, input_decimals, output_decimals) = if args.sell_asset {
        (pair.asset, pair.quote, pair.asset_decimals, pair.quote_decimals)
    } else {
        (pair.quote, pair.asset, pair.quote_decimals, pair.asset_decimals)
    };

    let remainder = if args.use_max {
        scale_to_wad(ledger.balance_of(caller, input_token), input_decimals)?
    } else {
        scale_to_wad(args.input_amount, input_decimals)?
    };
    if remainder == 0 {
        return Err(Error::ZeroInput);
    }
    if pool.liquidity == 0 {
        return Err(Error::ZeroLiquidity);
    }

    let live_independent = if args.sell_asset { pool.virtual_x } else { pool.virtual_y };
    let live_dependent = if args.sell_asset { pool.virtual_y } else { pool.virtual_x };

    let fee_bps = pool.fee_for(caller);
    let max_input = objective.compute_max_input(&pool, live_independent, pool.liquidity)?;
    let consumed = remainder.min(max_input);
    let fee_amount = consumed
        .checked_mul(fee_bps as u128)
        .ok_or(Error::OverflowWad)?
        / BPS_DENOMINATOR;
    let consumed_less_fee = consumed.checked_sub(fee_amount).ok_or(Error::OverflowWad)?;

    let (next_independent, next_dependent, output_amount) = objective.get_amount_out(
        &pool,
        args.sell_asset,
        consumed,
        consumed_less_fee,
        pool.liquidity,
        prev_invariant,
        args.now,
    )?;
    if output_amount == 0 {
        return Err(Error::ZeroOutput);
    }

    let min_output_wad = scale_to_wad(args.min_output, if args.sell_asset { pair.quote_decimals } else { pair.asset_decimals })?;
    if output_amount < min_output_wad {
        return Err(Error::ZeroOutput);
    }

    let (next_x, next_y) = if args.sell_asset {
        (next_independent, next_dependent)
    } else {
        (next_dependent, next_independent)
    };
    let (strike, sigma, tau) = CoveredCall::curve_params(&pool, args.now);
    let next_invariant = rmm_curve::invariant(next_y, next_x, strike, sigma, tau)?;
    objective.check_invariant(prev_invariant, next_invariant)?;

    let pool_mut = state.pool_mut(args.pool_id)?;
    objective.after_swap(
        pool_mut,
        args.sell_asset,
        next_independent,
        next_dependent,
        fee_amount,
        pool.liquidity,
        prev_invariant,
        next_invariant,
        args.now,
    )?;

    // The curve only ever moves in WAD; the ledger and every external
    // token movement are decimal-scaled to the pair's native units (spec
    // §4.4 step 9), matching `fund`/`draw`'s already-native balances.
    let consumed_native = scale_from_wad_down(consumed, input_decimals)?;
    let output_native = scale_from_wad_down(output_amount, output_decimals)?;
    if output_native == 0 {
        return Err(Error::ZeroOutput);
    }

    ledger.debit(caller, input_token, consumed_native)?;
    ledger.increase_reserve(input_token, consumed_native)?;
    ledger.credit(caller, output_token, output_native)?;
    ledger.decrease_reserve(output_token, output_native)?;

    let event = Event::Swap {
        pool_id: args.pool_id,
        caller,
        sell_asset: args.sell_asset,
        input: consumed_native,
        output: output_native,
        fee_amount,
    };
    Ok((consumed_native, output_native, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmm_types::checkpoint::Checkpoint;
    use rmm_types::pool::PoolParams;

    fn pool_at(virtual_x: u128, virtual_y: u128, liquidity: u128) -> Pool {
        Pool {
            pair_id: 1,
            controller: None,
            params: PoolParams {
                max_price: 3_000 * WAD,
                jit: 0,
                fee_bps: 30,
                priority_fee_bps: 0,
                volatility_bps: 10_000,
                duration_seconds: 31_536_000,
                created_at: 0,
            },
            virtual_x,
            virtual_y,
            liquidity,
            fee_growth_asset_global: Checkpoint::ZERO,
            fee_growth_quote_global: Checkpoint::ZERO,
            invariant_growth_global: Checkpoint::ZERO,
            last_timestamp: 0,
        }
    }

    #[test]
    fn compute_max_input_bounds_independent_share_below_one_wad() {
        let objective = CoveredCall;
        let pool = pool_at(WAD / 2, 1_000 * WAD, WAD);
        let max_input = objective.compute_max_input(&pool, pool.virtual_x, pool.liquidity).unwrap();
        assert_eq!(max_input, WAD / 2);
    }

    #[test]
    fn check_invariant_rejects_a_decrease() {
        let objective = CoveredCall;
        assert!(objective.check_invariant(100, 100).is_ok());
        assert!(objective.check_invariant(100, 101).is_ok());
        assert_eq!(
            objective.check_invariant(100, 99).unwrap_err(),
            Error::InvalidInvariant { prev: 100, next: 99 }
        );
    }

    #[test]
    fn get_amount_out_produces_a_positive_output_for_a_small_sell() {
        let objective = CoveredCall;
        let pool = pool_at(308_537_538_726_349_000, 1_384_567_213_334_818_000_000, WAD);
        let (next_x, next_y, output) = objective
            .get_amount_out(&pool, true, WAD / 100, WAD / 100, pool.liquidity, 0, 0)
            .unwrap();
        assert!(next_x > pool.virtual_x);
        assert!(next_y < pool.virtual_y);
        assert!(output > 0);
    }
}
