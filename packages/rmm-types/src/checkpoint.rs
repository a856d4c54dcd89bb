//! Wrapping 256-bit fee/invariant growth checkpoints.
//!
//! `fee_growth_*_global` and `invariant_growth_global` are allowed to wrap
//! modulo 2**256 (spec §3, §9 "Checkpoint wraparound"). Consumers only ever
//! need the distance between two checkpoints, computed with wrapping
//! subtraction, so the stored value itself is never promoted to an
//! arbitrary-precision integer.

use std::ops::Add;

use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer, used only for the wrapping growth
    /// checkpoints. Everything else in the engine fits in 128 bits.
    pub struct U256(4);
}

/// A monotonically-advancing-but-wrapping growth accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Checkpoint(pub U256);

impl Checkpoint {
    pub const ZERO: Checkpoint = Checkpoint(U256::zero());

    /// Advance the checkpoint by `delta`, wrapping on overflow.
    pub fn wrapping_add(self, delta: U256) -> Checkpoint {
        let (sum, _overflowed) = self.0.overflowing_add(delta);
        Checkpoint(sum)
    }

    /// Distance travelled from `earlier` to `self`, under wraparound.
    pub fn distance_since(self, earlier: Checkpoint) -> U256 {
        let (diff, _overflowed) = self.0.overflowing_sub(earlier.0);
        diff
    }
}

impl Add<U256> for Checkpoint {
    type Output = Checkpoint;

    fn add(self, rhs: U256) -> Checkpoint {
        self.wrapping_add(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_linear_without_wrap() {
        let a = Checkpoint(U256::from(10u64));
        let b = a.wrapping_add(U256::from(7u64));
        assert_eq!(b.distance_since(a), U256::from(7u64));
    }

    #[test]
    fn distance_survives_wraparound() {
        let near_max = Checkpoint(U256::max_value() - U256::from(2u64));
        let wrapped = near_max.wrapping_add(U256::from(5u64));
        assert_eq!(wrapped.distance_since(near_max), U256::from(5u64));
    }
}
