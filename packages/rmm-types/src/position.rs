use crate::address::Address;
use crate::checkpoint::Checkpoint;
use crate::ids::PoolId;

/// A caller's stake in a single pool, keyed by `(owner, pool_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub free_liquidity: u128,
    pub tokens_owed_asset: u128,
    pub tokens_owed_quote: u128,
    pub fee_growth_asset_last: Checkpoint,
    pub fee_growth_quote_last: Checkpoint,
    pub invariant_growth_last: Checkpoint,
    pub last_timestamp: u64,
}

impl Position {
    /// A freshly materialised position, checkpointed against the pool's
    /// current growth accumulators so the first fee sync credits nothing
    /// for history that predates this position.
    pub fn new_at(now: u64, fee_asset: Checkpoint, fee_quote: Checkpoint, inv: Checkpoint) -> Self {
        Position {
            free_liquidity: 0,
            tokens_owed_asset: 0,
            tokens_owed_quote: 0,
            fee_growth_asset_last: fee_asset,
            fee_growth_quote_last: fee_quote,
            invariant_growth_last: inv,
            last_timestamp: now,
        }
    }
}

/// Key identifying a position: the owning address and the pool it is held
/// against. A thin pair, not a struct, to keep hash-map lookups cheap.
pub type PositionKey = (Address, PoolId);
