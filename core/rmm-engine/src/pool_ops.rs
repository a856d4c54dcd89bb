//! Pool/pair operations (spec §4.3): pair/pool creation, parameter
//! changes, and the allocate/deallocate/claim liquidity primitives. These
//! operate purely on [`State`]/[`Ledger`] — resolving host-dependent
//! inputs like `use_max` is the dispatcher's job, mirroring the teacher's
//! split between `contract.rs` orchestration and `utils.rs`/`state.rs`
//! pure helpers.

use rmm_curve::{
    bps_to_wad, compute_reserves, div_wad_down, mul_wad_down, mul_wad_up, scale_from_wad_down,
    seconds_to_wad_years,
};
use rmm_types::address::Address;
use rmm_types::checkpoint::{Checkpoint, U256};
use rmm_types::consts::{AMOUNT_MAX_SENTINEL, WAD};
use rmm_types::error::{Error, Result};
use rmm_types::ids::{resolve_pair_ref, PairId, PoolId};
use rmm_types::pool::{Pool, PoolParams};

use crate::ledger::Ledger;
use crate::state::State;

fn wad_u256() -> U256 {
    U256::from(WAD)
}

/// Converts a wrapping growth distance (WAD-scaled fee-per-liquidity) and a
/// position's free liquidity into an owed token amount, `distance *
/// free_liquidity / WAD`.
fn fee_owed(distance: U256, free_liquidity: u128) -> Result<u128> {
    let product = distance * U256::from(free_liquidity);
    let quotient = product / wad_u256();
    if quotient > U256::from(u128::MAX) {
        return Err(Error::CastOverflow);
    }
    Ok(quotient.as_u128())
}

/// Syncs a position's fee checkpoints against its pool's current globals,
/// crediting any newly earned fees into `tokens_owed_*` (spec §4.3 step 4).
fn sync_position_fees(pool: &Pool, position: &mut rmm_types::position::Position) -> Result<()> {
    let asset_distance = pool
        .fee_growth_asset_global
        .distance_since(position.fee_growth_asset_last);
    let quote_distance = pool
        .fee_growth_quote_global
        .distance_since(position.fee_growth_quote_last);

    let earned_asset = fee_owed(asset_distance, position.free_liquidity)?;
    let earned_quote = fee_owed(quote_distance, position.free_liquidity)?;

    position.tokens_owed_asset = position
        .tokens_owed_asset
        .checked_add(earned_asset)
        .ok_or(Error::CastOverflow)?;
    position.tokens_owed_quote = position
        .tokens_owed_quote
        .checked_add(earned_quote)
        .ok_or(Error::CastOverflow)?;

    position.fee_growth_asset_last = pool.fee_growth_asset_global;
    position.fee_growth_quote_last = pool.fee_growth_quote_global;
    position.invariant_growth_last = pool.invariant_growth_global;
    Ok(())
}

/// `(delta_asset, delta_quote)` for a change of `delta_liquidity`, rounded
/// away from the pool: up for allocate (the pool can never be shorted by a
/// rounding remainder), down for deallocate.
pub fn liquidity_deltas(pool: &Pool, delta_liquidity: u128, round_up: bool) -> Result<(u128, u128)> {
    if round_up {
        let asset = mul_wad_up(pool.virtual_x, delta_liquidity)?;
        let quote = mul_wad_up(pool.virtual_y, delta_liquidity)?;
        Ok((asset, quote))
    } else {
        let asset = mul_wad_down(pool.virtual_x, delta_liquidity)?;
        let quote = mul_wad_down(pool.virtual_y, delta_liquidity)?;
        Ok((asset, quote))
    }
}

/// The largest `delta_liquidity` purchasable from `bal_asset`/`bal_quote`
/// at the pool's current per-liquidity reserve ratio.
pub fn max_mintable(pool: &Pool, bal_asset: u128, bal_quote: u128) -> Result<u128> {
    let from_asset = if pool.virtual_x > 0 {
        div_wad_down(bal_asset, pool.virtual_x)?
    } else {
        u128::MAX
    };
    let from_quote = if pool.virtual_y > 0 {
        div_wad_down(bal_quote, pool.virtual_y)?
    } else {
        u128::MAX
    };
    Ok(from_asset.min(from_quote))
}

/// `create_pair` (spec §4.3).
pub fn create_pair(
    state: &mut State,
    asset: Address,
    quote: Address,
    asset_decimals: u8,
    quote_decimals: u8,
) -> Result<PairId> {
    state
        .pairs
        .create_pair(asset, quote, asset_decimals, quote_decimals)
}

/// Parameters for `create_pool`, gathered into one record the way the
/// teacher bundles `ConcentratedPoolParams`.
pub struct CreatePoolArgs {
    pub pair_ref: PairId,
    pub controller: Option<Address>,
    pub priority_fee_bps: u16,
    pub fee_bps: u16,
    pub volatility_bps: u32,
    pub duration_seconds: u64,
    pub jit: u64,
    pub max_price: u128,
    pub price: u128,
    pub now: u64,
}

/// `create_pool` (spec §4.3).
pub fn create_pool(state: &mut State, args: CreatePoolArgs) -> Result<PoolId> {
    if args.price == 0 {
        return Err(Error::ZeroPrice);
    }
    let pair_id = resolve_pair_ref(args.pair_ref, state.pairs.latest_id())?;
    state.pairs.get(pair_id)?;

    let jit = Pool::normalize_jit(args.controller, args.jit);
    let priority_fee_bps = if args.controller.is_none() {
        0
    } else {
        args.priority_fee_bps
    };

    let params = PoolParams {
        max_price: args.max_price,
        jit,
        fee_bps: args.fee_bps,
        priority_fee_bps,
        volatility_bps: args.volatility_bps,
        duration_seconds: args.duration_seconds,
        created_at: args.now,
    };
    params.validate()?;

    let sigma = bps_to_wad(args.volatility_bps);
    let tau = seconds_to_wad_years(args.duration_seconds, 0);
    let (virtual_y, virtual_x) = compute_reserves(args.price, args.max_price, sigma, tau, 0)?;

    let has_controller = args.controller.is_some();
    let nonce = state.next_pool_nonce(pair_id);
    let pool_id = PoolId::pack(pair_id, has_controller, nonce)?;

    let pool = Pool {
        pair_id,
        controller: args.controller,
        params,
        virtual_x,
        virtual_y,
        liquidity: 0,
        fee_growth_asset_global: Checkpoint::ZERO,
        fee_growth_quote_global: Checkpoint::ZERO,
        invariant_growth_global: Checkpoint::ZERO,
        last_timestamp: args.now,
    };
    state.insert_pool(pool_id, pool)?;
    Ok(pool_id)
}

/// `change_parameters` (spec §4.3). Zero values mean "leave unchanged".
pub fn change_parameters(
    state: &mut State,
    caller: Address,
    pool_id: PoolId,
    new_priority_fee_bps: u16,
    new_fee_bps: u16,
    new_jit: u64,
) -> Result<()> {
    let pool = state.pool_mut(pool_id)?;
    match pool.controller {
        Some(controller) if controller == caller => {}
        _ => return Err(Error::NotController),
    }

    let mut params = pool.params;
    if new_fee_bps != 0 {
        params.fee_bps = new_fee_bps;
    }
    if new_priority_fee_bps != 0 {
        params.priority_fee_bps = new_priority_fee_bps;
    }
    if new_jit != 0 {
        params.jit = new_jit;
    }
    params.validate()?;
    pool.params = params;
    Ok(())
}

/// `allocate` (spec §4.3), operating on an already-resolved
/// `delta_liquidity` (the dispatcher resolves `use_max` before calling
/// this). Returns the decimal-scaled (token-native) amounts debited.
pub fn allocate(
    state: &mut State,
    ledger: &mut Ledger,
    caller: Address,
    pool_id: PoolId,
    delta_liquidity: u128,
    now: u64,
) -> Result<(u128, u128)> {
    let pool = state.pool(pool_id)?.clone();
    let pair = *state.pairs.get(pool.pair_id)?;
    let (delta_asset_wad, delta_quote_wad) = liquidity_deltas(&pool, delta_liquidity, true)?;
    let delta_asset = scale_from_wad_down(delta_asset_wad, pair.asset_decimals)?;
    let delta_quote = scale_from_wad_down(delta_quote_wad, pair.quote_decimals)?;

    let key = (caller, pool_id);
    let position = state.position_mut_or_default(key, now, &pool);
    sync_position_fees(&pool, position)?;
    position.free_liquidity = position
        .free_liquidity
        .checked_add(delta_liquidity)
        .ok_or(Error::CastOverflow)?;
    position.last_timestamp = now;

    let pool_mut = state.pool_mut(pool_id)?;
    pool_mut.liquidity = pool_mut
        .liquidity
        .checked_add(delta_liquidity)
        .ok_or(Error::CastOverflow)?;

    ledger.debit(caller, pair.asset, delta_asset)?;
    ledger.increase_reserve(pair.asset, delta_asset)?;
    ledger.debit(caller, pair.quote, delta_quote)?;
    ledger.increase_reserve(pair.quote, delta_quote)?;

    Ok((delta_asset, delta_quote))
}

/// `deallocate` (spec §4.3), symmetric to `allocate`. Enforces the JIT
/// anti-siphon rule before moving any state. Returns the decimal-scaled
/// (token-native) amounts credited.
pub fn deallocate(
    state: &mut State,
    ledger: &mut Ledger,
    caller: Address,
    pool_id: PoolId,
    delta_liquidity: u128,
    now: u64,
) -> Result<(u128, u128)> {
    let pool = state.pool(pool_id)?.clone();
    let pair = *state.pairs.get(pool.pair_id)?;
    let key = (caller, pool_id);
    let position = state.position(key).ok_or(Error::NonExistentPosition)?;
    let elapsed = now.saturating_sub(position.last_timestamp);
    if elapsed < pool.params.jit {
        tracing::debug!(?pool_id, elapsed, jit = pool.params.jit, "deallocate rejected by jit window");
        return Err(Error::JitLiquidity(pool.params.jit));
    }

    let (delta_asset_wad, delta_quote_wad) = liquidity_deltas(&pool, delta_liquidity, false)?;
    let delta_asset = scale_from_wad_down(delta_asset_wad, pair.asset_decimals)?;
    let delta_quote = scale_from_wad_down(delta_quote_wad, pair.quote_decimals)?;

    let position = state.position_mut(key)?;
    sync_position_fees(&pool, position)?;
    position.free_liquidity = position
        .free_liquidity
        .checked_sub(delta_liquidity)
        .ok_or(Error::CastOverflow)?;
    position.last_timestamp = now;

    let pool_mut = state.pool_mut(pool_id)?;
    pool_mut.liquidity = pool_mut
        .liquidity
        .checked_sub(delta_liquidity)
        .ok_or(Error::CastOverflow)?;

    ledger.credit(caller, pair.asset, delta_asset)?;
    ledger.decrease_reserve(pair.asset, delta_asset)?;
    ledger.credit(caller, pair.quote, delta_quote)?;
    ledger.decrease_reserve(pair.quote, delta_quote)?;

    Ok((delta_asset, delta_quote))
}

/// `claim` (spec §4.3). The sentinel `u128::MAX` on either request means
/// "all owed". `tokens_owed_*` is tracked WAD-scaled like every other
/// scalar in the pool's accounting; the amounts actually credited to the
/// ledger are decimal-scaled down to the pair's token-native units.
pub fn claim(
    state: &mut State,
    ledger: &mut Ledger,
    caller: Address,
    pool_id: PoolId,
    delta_asset_req: u128,
    delta_quote_req: u128,
) -> Result<(u128, u128)> {
    let pool = state.pool(pool_id)?.clone();
    let pair = *state.pairs.get(pool.pair_id)?;
    let key = (caller, pool_id);
    let position = state.position_mut(key)?;
    sync_position_fees(&pool, position)?;

    let asset_request = if delta_asset_req == AMOUNT_MAX_SENTINEL {
        position.tokens_owed_asset
    } else {
        delta_asset_req
    };
    let quote_request = if delta_quote_req == AMOUNT_MAX_SENTINEL {
        position.tokens_owed_quote
    } else {
        delta_quote_req
    };

    let asset_paid_wad = asset_request.min(position.tokens_owed_asset);
    let quote_paid_wad = quote_request.min(position.tokens_owed_quote);
    position.tokens_owed_asset -= asset_paid_wad;
    position.tokens_owed_quote -= quote_paid_wad;

    let asset_paid = scale_from_wad_down(asset_paid_wad, pair.asset_decimals)?;
    let quote_paid = scale_from_wad_down(quote_paid_wad, pair.quote_decimals)?;

    ledger.credit(caller, pair.asset, asset_paid)?;
    ledger.credit(caller, pair.quote, quote_paid)?;

    tracing::debug!(?pool_id, asset_paid, quote_paid, "claimed owed fees");
    Ok((asset_paid, quote_paid))
}
