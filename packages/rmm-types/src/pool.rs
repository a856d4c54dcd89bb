use crate::address::Address;
use crate::checkpoint::Checkpoint;
use crate::consts::{
    DEFAULT_JIT_POLICY, MAX_FEE_BPS, MAX_VOLATILITY_BPS, MIN_FEE_BPS, MIN_VOLATILITY_BPS,
};
use crate::error::{Error, Result};
use crate::ids::PairId;

/// Parameters fixed at pool creation (and, for controller-owned pools,
/// mutable thereafter via `change_parameters`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParams {
    pub max_price: u128,
    pub jit: u64,
    pub fee_bps: u16,
    pub priority_fee_bps: u16,
    pub volatility_bps: u32,
    pub duration_seconds: u64,
    pub created_at: u64,
}

impl PoolParams {
    /// Validates the bounds spec §3 places on pool parameters. Does not
    /// validate `max_price > 0`; that check belongs to `create_pool`, which
    /// knows whether the caller passed an explicit max price.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FEE_BPS..=MAX_FEE_BPS).contains(&self.fee_bps) {
            return Err(Error::InvalidFee(self.fee_bps));
        }
        // `priority_fee_bps == 0` is the controller-less pool's pinned value
        // (spec §3 "if absent, priority_fee = 0") and is always valid; a
        // controller-owned pool's priority fee is otherwise bounded the same
        // way the standard fee is.
        if self.priority_fee_bps != 0
            && (self.priority_fee_bps < MIN_FEE_BPS || self.priority_fee_bps > self.fee_bps)
        {
            return Err(Error::InvalidFee(self.priority_fee_bps));
        }
        if !(MIN_VOLATILITY_BPS..=MAX_VOLATILITY_BPS).contains(&self.volatility_bps) {
            return Err(Error::InvalidVolatility(self.volatility_bps));
        }
        if self.duration_seconds == 0 {
            return Err(Error::InvalidDuration);
        }
        if self.max_price == 0 {
            return Err(Error::ZeroPrice);
        }
        Ok(())
    }
}

/// A liquidity pool keyed by its packed [`crate::ids::PoolId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool {
    pub pair_id: PairId,
    pub controller: Option<Address>,
    pub params: PoolParams,
    pub virtual_x: u128,
    pub virtual_y: u128,
    pub liquidity: u128,
    pub fee_growth_asset_global: Checkpoint,
    pub fee_growth_quote_global: Checkpoint,
    pub invariant_growth_global: Checkpoint,
    pub last_timestamp: u64,
}

impl Pool {
    /// Validates a `jit` value against the pool's controller status: a
    /// controller-less pool pins `jit` to [`DEFAULT_JIT_POLICY`] and a
    /// controller may set any non-negative value (already guaranteed by the
    /// unsigned type).
    pub fn normalize_jit(controller: Option<Address>, jit: u64) -> u64 {
        if controller.is_none() {
            DEFAULT_JIT_POLICY
        } else {
            jit
        }
    }

    /// Whether the pool is expired at `now`, i.e. has `tau == 0`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.seconds_to_maturity(now) == 0
    }

    /// Seconds remaining until maturity, floored at zero.
    pub fn seconds_to_maturity(&self, now: u64) -> u64 {
        let maturity = self.params.created_at + self.params.duration_seconds;
        maturity.saturating_sub(now)
    }

    /// The fee rate that applies to a caller: the priority fee if they are
    /// the pool's controller, the standard fee otherwise.
    pub fn fee_for(&self, caller: Address) -> u16 {
        match self.controller {
            Some(controller) if controller == caller => self.params.priority_fee_bps,
            _ => self.params.fee_bps,
        }
    }
}
