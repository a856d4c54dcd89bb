use std::collections::HashMap;

use crate::address::Address;
use crate::consts::{MAX_DECIMALS, MIN_DECIMALS};
use crate::error::{Error, Result};
use crate::ids::PairId;

/// An ordered `(asset, quote)` token identity with the decimal widths pinned
/// at creation time. Append-only: once created a pair's fields never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub id: PairId,
    pub asset: Address,
    pub quote: Address,
    pub asset_decimals: u8,
    pub quote_decimals: u8,
}

fn validate_decimals(decimals: u8) -> Result<()> {
    if (MIN_DECIMALS..=MAX_DECIMALS).contains(&decimals) {
        Ok(())
    } else {
        Err(Error::InvalidDecimals(decimals))
    }
}

/// The pair table: a dense, monotonically growing sequence of pairs plus an
/// order-sensitive index for duplicate detection, mirroring the teacher's
/// `PAIRS: Map<pair_key, Addr>` with an explicit integer key instead of a
/// storage-backed map.
#[derive(Debug, Default, Clone)]
pub struct PairStore {
    pairs: HashMap<PairId, Pair>,
    by_tokens: HashMap<(Address, Address), PairId>,
    next_id: PairId,
}

impl PairStore {
    pub fn new() -> Self {
        Self {
            pairs: HashMap::new(),
            by_tokens: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn get(&self, id: PairId) -> Result<&Pair> {
        self.pairs.get(&id).ok_or(Error::NonExistentPair)
    }

    pub fn latest_id(&self) -> Option<PairId> {
        if self.next_id > 1 {
            Some(self.next_id - 1)
        } else {
            None
        }
    }

    /// Registers a new pair. Fails with [`Error::SameToken`] if `asset ==
    /// quote`, [`Error::PairExists`] if this exact ordered pair is already
    /// registered, and [`Error::InvalidDecimals`] if either decimal width
    /// falls outside `[6, 18]`.
    pub fn create_pair(
        &mut self,
        asset: Address,
        quote: Address,
        asset_decimals: u8,
        quote_decimals: u8,
    ) -> Result<PairId> {
        if asset == quote {
            return Err(Error::SameToken);
        }
        validate_decimals(asset_decimals)?;
        validate_decimals(quote_decimals)?;
        if self.by_tokens.contains_key(&(asset, quote)) {
            return Err(Error::PairExists);
        }

        let id = self.next_id;
        self.next_id += 1;
        let pair = Pair {
            id,
            asset,
            quote,
            asset_decimals,
            quote_decimals,
        };
        self.pairs.insert(id, pair);
        self.by_tokens.insert((asset, quote), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn create_pair_assigns_sequential_ids() {
        let mut store = PairStore::new();
        let a = store.create_pair(addr(1), addr(2), 18, 6).unwrap();
        let b = store.create_pair(addr(1), addr(3), 18, 6).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(store.latest_id(), Some(2));
    }

    #[test]
    fn same_token_rejected() {
        let mut store = PairStore::new();
        assert_eq!(
            store.create_pair(addr(1), addr(1), 18, 6).unwrap_err(),
            Error::SameToken
        );
    }

    #[test]
    fn duplicate_ordered_pair_rejected_but_reverse_order_allowed() {
        let mut store = PairStore::new();
        store.create_pair(addr(1), addr(2), 18, 6).unwrap();
        assert_eq!(
            store.create_pair(addr(1), addr(2), 18, 6).unwrap_err(),
            Error::PairExists
        );
        // order-sensitive: (quote, asset) is a distinct pair
        assert!(store.create_pair(addr(2), addr(1), 6, 18).is_ok());
    }

    #[test]
    fn decimals_out_of_range_rejected() {
        let mut store = PairStore::new();
        assert_eq!(
            store.create_pair(addr(1), addr(2), 5, 18).unwrap_err(),
            Error::InvalidDecimals(5)
        );
        assert_eq!(
            store.create_pair(addr(1), addr(2), 18, 19).unwrap_err(),
            Error::InvalidDecimals(19)
        );
    }
}
