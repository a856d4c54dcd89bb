use crate::address::Address;
use crate::ids::{PairId, PoolId};

/// Effects emitted in the order they occur (spec §6 "Emission ordering
/// matches effect ordering"). The teacher reports these as
/// `Response::add_attributes`; here they are a plain, inspectable `Vec`
/// returned alongside each operation's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CreatePair {
        pair_id: PairId,
        asset: Address,
        quote: Address,
    },
    CreatePool {
        pool_id: PoolId,
        pair_id: PairId,
        price: u128,
    },
    Allocate {
        pool_id: PoolId,
        owner: Address,
        delta_liquidity: u128,
        delta_asset: u128,
        delta_quote: u128,
    },
    Deallocate {
        pool_id: PoolId,
        owner: Address,
        delta_liquidity: u128,
        delta_asset: u128,
        delta_quote: u128,
    },
    Swap {
        pool_id: PoolId,
        caller: Address,
        sell_asset: bool,
        input: u128,
        output: u128,
        fee_amount: u128,
    },
    Collect {
        pool_id: PoolId,
        owner: Address,
        asset_amount: u128,
        quote_amount: u128,
    },
    ChangeParameters {
        pool_id: PoolId,
    },
    Deposit {
        caller: Address,
        amount: u128,
    },
    BalanceDelta {
        owner: Address,
        token: Address,
        increased: bool,
        amount: u128,
    },
}
