//! Collaborator capabilities the core consumes (spec §6) but never
//! implements. The core treats the execution host, the token contracts, the
//! wrapped-native adapter and the clock as abstract interfaces so that the
//! engine stays deterministic and host-agnostic; a concrete host wires real
//! implementations of these traits in.

use crate::address::Address;
use crate::error::Result;

/// An ERC-20-like token the engine can query and move on the caller's
/// behalf. Implementations live entirely outside this crate.
pub trait TokenAdapter {
    fn balance_of(&self, token: Address, holder: Address) -> Result<u128>;
    fn transfer(&mut self, token: Address, to: Address, amount: u128) -> Result<()>;
    fn transfer_from(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<()>;
    fn decimals(&self, token: Address) -> Result<u8>;
}

/// The wrapped-native-token adapter used by `deposit`/`draw` when the token
/// in question is the wrapped native asset.
pub trait WrappedNative {
    fn wrapped_token(&self) -> Address;
    fn wrap(&mut self, amount: u128) -> Result<()>;
    fn unwrap(&mut self, amount: u128) -> Result<()>;
}

/// The host's monotonic wall clock, seconds resolution.
pub trait Clock {
    fn now(&self) -> u64;
}

/// The identity and attached value of the account driving the current
/// operation.
pub trait CallerContext {
    fn caller(&self) -> Address;
    fn value(&self) -> u128;
}

/// The full set of capabilities a host must provide for the engine to run
/// an externally initiated operation.
pub trait Host: TokenAdapter + WrappedNative + Clock + CallerContext {}

impl<T> Host for T where T: TokenAdapter + WrappedNative + Clock + CallerContext {}
