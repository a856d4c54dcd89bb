use std::collections::HashMap;

use rmm_types::error::{Error, Result};
use rmm_types::ids::PoolId;
use rmm_types::pair::PairStore;
use rmm_types::pool::Pool;
use rmm_types::position::{Position, PositionKey};
use rmm_types::PairId;

/// The engine-wide, exclusively-owned table of pairs, pools and positions.
/// Mirrors the teacher's `CONFIG`/`POSITIONS` storage maps, but held as a
/// single owned aggregate passed by exclusive reference into each
/// operation (spec §9 "Global mutable state") rather than exposed to
/// collaborators.
#[derive(Debug, Default, Clone)]
pub struct State {
    pub pairs: PairStore,
    pools: HashMap<PoolId, Pool>,
    positions: HashMap<PositionKey, Position>,
    pool_nonces: HashMap<PairId, u32>,
}

impl State {
    pub fn new() -> Self {
        Self {
            pairs: PairStore::new(),
            pools: HashMap::new(),
            positions: HashMap::new(),
            pool_nonces: HashMap::new(),
        }
    }

    pub fn pool(&self, id: PoolId) -> Result<&Pool> {
        self.pools.get(&id).ok_or(Error::NonExistentPool)
    }

    pub fn pool_mut(&mut self, id: PoolId) -> Result<&mut Pool> {
        self.pools.get_mut(&id).ok_or(Error::NonExistentPool)
    }

    pub fn insert_pool(&mut self, id: PoolId, pool: Pool) -> Result<()> {
        if self.pools.contains_key(&id) {
            return Err(Error::PoolExists);
        }
        self.pools.insert(id, pool);
        Ok(())
    }

    /// Allocates the next pool nonce for `pair_id`, starting at zero.
    pub fn next_pool_nonce(&mut self, pair_id: PairId) -> u32 {
        let entry = self.pool_nonces.entry(pair_id).or_insert(0);
        let nonce = *entry;
        *entry += 1;
        nonce
    }

    pub fn position(&self, key: PositionKey) -> Option<&Position> {
        self.positions.get(&key)
    }

    pub fn position_mut_or_default(&mut self, key: PositionKey, now: u64, pool: &Pool) -> &mut Position {
        self.positions.entry(key).or_insert_with(|| {
            Position::new_at(
                now,
                pool.fee_growth_asset_global,
                pool.fee_growth_quote_global,
                pool.invariant_growth_global,
            )
        })
    }

    pub fn position_mut(&mut self, key: PositionKey) -> Result<&mut Position> {
        self.positions.get_mut(&key).ok_or(Error::NonExistentPosition)
    }

    /// Sum of `free_liquidity` across every position keyed on `pool_id`.
    /// Used by tests to assert invariant 3 of spec §8.
    pub fn liquidity_sum(&self, pool_id: PoolId) -> u128 {
        self.positions
            .iter()
            .filter(|((_, pid), _)| *pid == pool_id)
            .map(|(_, pos)| pos.free_liquidity)
            .sum()
    }
}
