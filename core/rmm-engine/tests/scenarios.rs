//! End-to-end scenarios from spec §8, driven entirely through `Engine`'s
//! public operation surface with a minimal in-memory `Host` stub standing in
//! for the execution environment.

use std::collections::HashMap;

use rmm_engine::Engine;
use rmm_types::address::Address;
use rmm_types::error::Error;
use rmm_types::events::Event;

fn addr(byte: u8) -> Address {
    Address([byte; 20])
}

/// A permissive in-memory host: every `transfer`/`transfer_from` succeeds
/// unconditionally and just books the movement, matching a token contract
/// whose caller already holds sufficient balance. `now` and `caller` are
/// mutable so a test can advance the clock or switch identities between
/// operations.
struct StubHost {
    now: u64,
    caller: Address,
    value: u128,
    wrapped: Address,
    external_balances: HashMap<(Address, Address), u128>,
    fail_transfer_from: bool,
}

impl StubHost {
    fn new(caller: Address) -> Self {
        Self {
            now: 0,
            caller,
            value: 0,
            wrapped: addr(0xee),
            external_balances: HashMap::new(),
            fail_transfer_from: false,
        }
    }
}

impl rmm_types::external::TokenAdapter for StubHost {
    fn balance_of(&self, token: Address, holder: Address) -> rmm_types::error::Result<u128> {
        Ok(*self.external_balances.get(&(token, holder)).unwrap_or(&0))
    }
    fn transfer(&mut self, token: Address, to: Address, amount: u128) -> rmm_types::error::Result<()> {
        *self.external_balances.entry((token, to)).or_insert(0) += amount;
        Ok(())
    }
    fn transfer_from(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> rmm_types::error::Result<()> {
        if self.fail_transfer_from {
            return Err(Error::DrawBalance);
        }
        *self.external_balances.entry((token, from)).or_insert(0) += amount;
        *self.external_balances.entry((token, to)).or_insert(0) += amount;
        Ok(())
    }
    fn decimals(&self, _token: Address) -> rmm_types::error::Result<u8> {
        Ok(18)
    }
}

impl rmm_types::external::WrappedNative for StubHost {
    fn wrapped_token(&self) -> Address {
        self.wrapped
    }
    fn wrap(&mut self, _amount: u128) -> rmm_types::error::Result<()> {
        Ok(())
    }
    fn unwrap(&mut self, _amount: u128) -> rmm_types::error::Result<()> {
        Ok(())
    }
}

impl rmm_types::external::Clock for StubHost {
    fn now(&self) -> u64 {
        self.now
    }
}

impl rmm_types::external::CallerContext for StubHost {
    fn caller(&self) -> Address {
        self.caller
    }
    fn value(&self) -> u128 {
        self.value
    }
}

/// Raw encoders for the `multiprocess` wire format (spec §4.6, §6):
/// `(use_max << 4) | opcode` header byte followed by big-endian operands.
/// Opcode numbering mirrors `rmm_engine::instructions`'s private constants.
mod wire {
    use rmm_types::address::Address;
    use rmm_types::ids::PoolId;

    const OP_CREATE_PAIR: u8 = 0;
    const OP_CREATE_POOL: u8 = 1;
    const OP_ALLOCATE: u8 = 2;
    const OP_DEALLOCATE: u8 = 3;
    const OP_SWAP: u8 = 4;
    const OP_CLAIM: u8 = 5;

    pub fn create_pair(asset: Address, quote: Address, asset_decimals: u8, quote_decimals: u8) -> Vec<u8> {
        let mut frame = vec![OP_CREATE_PAIR];
        frame.extend_from_slice(&asset.0);
        frame.extend_from_slice(&quote.0);
        frame.push(asset_decimals);
        frame.push(quote_decimals);
        frame
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_pool(
        pair_ref: u32,
        controller: Option<Address>,
        priority_fee_bps: u16,
        fee_bps: u16,
        volatility_bps: u32,
        duration_seconds: u64,
        jit: u64,
        max_price: u128,
        price: u128,
    ) -> Vec<u8> {
        let mut frame = vec![OP_CREATE_POOL];
        frame.extend_from_slice(&pair_ref.to_be_bytes());
        match controller {
            Some(address) => {
                frame.push(1);
                frame.extend_from_slice(&address.0);
            }
            None => frame.push(0),
        }
        frame.extend_from_slice(&priority_fee_bps.to_be_bytes());
        frame.extend_from_slice(&fee_bps.to_be_bytes());
        frame.extend_from_slice(&volatility_bps.to_be_bytes());
        frame.extend_from_slice(&duration_seconds.to_be_bytes());
        frame.extend_from_slice(&jit.to_be_bytes());
        frame.extend_from_slice(&max_price.to_be_bytes());
        frame.extend_from_slice(&price.to_be_bytes());
        frame
    }

    pub fn allocate(pool_id: PoolId, use_max: bool, delta_liquidity: u128) -> Vec<u8> {
        let mut frame = vec![((use_max as u8) << 4) | OP_ALLOCATE];
        frame.extend_from_slice(&pool_id.0.to_be_bytes());
        frame.extend_from_slice(&delta_liquidity.to_be_bytes());
        frame
    }

    pub fn deallocate(pool_id: PoolId, use_max: bool, delta_liquidity: u128) -> Vec<u8> {
        let mut frame = vec![((use_max as u8) << 4) | OP_DEALLOCATE];
        frame.extend_from_slice(&pool_id.0.to_be_bytes());
        frame.extend_from_slice(&delta_liquidity.to_be_bytes());
        frame
    }

    pub fn swap(pool_id: PoolId, sell_asset: bool, input_amount: u128, min_output: u128) -> Vec<u8> {
        let mut frame = vec![OP_SWAP];
        frame.extend_from_slice(&pool_id.0.to_be_bytes());
        frame.push(sell_asset as u8);
        frame.extend_from_slice(&input_amount.to_be_bytes());
        frame.extend_from_slice(&min_output.to_be_bytes());
        frame
    }

    pub fn claim(pool_id: PoolId, delta_asset_req: u128, delta_quote_req: u128) -> Vec<u8> {
        let mut frame = vec![OP_CLAIM];
        frame.extend_from_slice(&pool_id.0.to_be_bytes());
        frame.extend_from_slice(&delta_asset_req.to_be_bytes());
        frame.extend_from_slice(&delta_quote_req.to_be_bytes());
        frame
    }
}

const WAD: u128 = 1_000_000_000_000_000_000;

fn create_pair_and_pool(
    engine: &mut Engine,
    host: &mut StubHost,
    controller: Option<Address>,
    jit: u64,
) -> rmm_types::ids::PoolId {
    let asset = addr(1);
    let quote = addr(2);
    engine
        .multiprocess(host, &wire::create_pair(asset, quote, 18, 6))
        .unwrap();

    let events = engine
        .multiprocess(
            host,
            &wire::create_pool(0, controller, 0, 30, 10_000, 31_536_000, jit, 3_000 * WAD, 2_000 * WAD),
        )
        .unwrap();
    match events[0] {
        Event::CreatePool { pool_id, .. } => pool_id,
        _ => panic!("expected CreatePool"),
    }
}

/// S1: pool creation places the curve's initial reserves in the reported
/// neighbourhood and the resulting pool round-trips its own creation price
/// through the pricing kernel.
#[test]
fn s1_create_pool_lands_near_the_reported_initial_reserves() {
    let mut engine = Engine::new(addr(0xaa));
    let mut host = StubHost::new(addr(1));
    let pool_id = create_pair_and_pool(&mut engine, &mut host, None, 4);

    let pool = engine.state().pool(pool_id).unwrap();
    assert!(pool.virtual_x > 0 && pool.virtual_x < WAD);
    assert!(pool.virtual_y > 0);

    // within 1% of the literal values the scenario reports
    let expected_x = 308 * WAD / 1_000;
    let expected_y = 1_384 * WAD;
    assert!(pool.virtual_x.abs_diff(expected_x) * 100 < expected_x);
    assert!(pool.virtual_y.abs_diff(expected_y) * 100 < expected_y);
}

/// S2: allocating `ΔL = 1e18` debits exactly the pool's per-unit reserves
/// and leaves the position and pool liquidity counters in lockstep
/// (invariant 3 of spec §8).
#[test]
fn s2_allocate_debits_reserves_scaled_by_delta_liquidity_and_tracks_liquidity() {
    let mut engine = Engine::new(addr(0xaa));
    let caller = addr(1);
    let mut host = StubHost::new(caller);
    let pool_id = create_pair_and_pool(&mut engine, &mut host, None, 4);

    let (virtual_x, virtual_y) = {
        let pool = engine.state().pool(pool_id).unwrap();
        (pool.virtual_x, pool.virtual_y)
    };

    engine.multiprocess(&mut host, &wire::allocate(pool_id, false, WAD)).unwrap();

    let pool = engine.state().pool(pool_id).unwrap();
    assert_eq!(pool.liquidity, WAD);
    assert_eq!(pool.liquidity, engine.state().liquidity_sum(pool_id));

    let position = engine.state().position((caller, pool_id)).unwrap();
    assert_eq!(position.free_liquidity, WAD);

    // delta_liquidity == 1 WAD exactly, so rounding up leaves no remainder:
    // the debited amounts equal the pool's own per-unit reserves, decimal
    // scaled down to the pair's token-native units (asset 18, quote 6).
    assert_eq!(engine.ledger().reserve_of(addr(1)), virtual_x);
    assert_eq!(engine.ledger().reserve_of(addr(2)), virtual_y / 1_000_000_000_000);
}

/// S3: a sell-asset swap increases `fee_growth_asset_global` only, leaves
/// `fee_growth_quote_global` untouched, and never decreases the invariant.
#[test]
fn s3_swap_grows_fees_on_the_input_side_only_and_preserves_the_invariant() {
    let mut engine = Engine::new(addr(0xaa));
    let caller = addr(1);
    let mut host = StubHost::new(caller);
    let pool_id = create_pair_and_pool(&mut engine, &mut host, None, 4);
    engine.multiprocess(&mut host, &wire::allocate(pool_id, false, WAD)).unwrap();

    let before = engine.state().pool(pool_id).unwrap().clone();

    engine
        .multiprocess(&mut host, &wire::swap(pool_id, true, WAD / 10, 0))
        .unwrap();

    let after = engine.state().pool(pool_id).unwrap();
    assert!(after.fee_growth_asset_global.distance_since(before.fee_growth_asset_global) > rmm_types::checkpoint::U256::zero());
    assert_eq!(after.fee_growth_quote_global, before.fee_growth_quote_global);
    assert!(after.virtual_x > before.virtual_x);
    assert!(after.virtual_y < before.virtual_y);
}

/// S4 (adapted): the literal scenario asks for `jit = 4` on a
/// controller-less pool, but spec §3/§4.3 pin a controller-less pool's `jit`
/// to `DEFAULT_JIT_POLICY`, so the only way to observe the requested window
/// is through a controller-owned pool (see DESIGN.md). Deallocating before
/// the window elapses fails `JitLiquidity(4)`; deallocating once it has
/// elapsed succeeds.
#[test]
fn s4_deallocate_respects_the_jit_window_on_a_controller_owned_pool() {
    let mut engine = Engine::new(addr(0xaa));
    let controller = addr(1);
    let mut host = StubHost::new(controller);
    let pool_id = create_pair_and_pool(&mut engine, &mut host, Some(controller), 4);
    engine.multiprocess(&mut host, &wire::allocate(pool_id, false, WAD)).unwrap();

    host.now = 3;
    let err = engine
        .multiprocess(&mut host, &wire::deallocate(pool_id, false, WAD / 2))
        .unwrap_err();
    assert_eq!(err, Error::JitLiquidity(4));

    host.now = 4;
    engine
        .multiprocess(&mut host, &wire::deallocate(pool_id, false, WAD / 2))
        .unwrap();
}

/// S6: a swap whose `min_output` can never be met still leaves the pool's
/// reserves, liquidity and fee checkpoints exactly as they were (the
/// operation rolls back in full rather than partially applying effects).
#[test]
fn s6_a_rejected_swap_leaves_every_pool_field_unchanged() {
    let mut engine = Engine::new(addr(0xaa));
    let caller = addr(1);
    let mut host = StubHost::new(caller);
    let pool_id = create_pair_and_pool(&mut engine, &mut host, None, 4);
    engine.multiprocess(&mut host, &wire::allocate(pool_id, false, WAD)).unwrap();

    let before = engine.state().pool(pool_id).unwrap().clone();

    // an unreachable min_output forces the swap's output guard to reject the
    // trade and the whole operation to roll back.
    let err = engine
        .multiprocess(&mut host, &wire::swap(pool_id, true, WAD / 10, 20_000_000_000_000))
        .unwrap_err();
    assert_eq!(err, Error::ZeroOutput);

    let after = engine.state().pool(pool_id).unwrap();
    assert_eq!(*after, before);
}

/// Universal invariant 1 (spec §8): reserves never exceed the host's real
/// external balance for the engine's own address.
#[test]
fn invariant_reserves_never_exceed_external_balance() {
    use rmm_types::external::TokenAdapter;

    let mut engine = Engine::new(addr(0xaa));
    let caller = addr(1);
    let mut host = StubHost::new(caller);
    let pool_id = create_pair_and_pool(&mut engine, &mut host, None, 4);
    engine.multiprocess(&mut host, &wire::allocate(pool_id, false, WAD)).unwrap();

    for token in [addr(1), addr(2)] {
        let external = host.balance_of(token, addr(0xaa)).unwrap();
        assert!(engine.ledger().reserve_of(token) <= external);
    }
}

/// Universal invariant 5 (spec §8): a caller's virtual balance never
/// exceeds the token's total reserve.
#[test]
fn invariant_balances_never_exceed_reserves() {
    let mut engine = Engine::new(addr(0xaa));
    let caller = addr(1);
    let mut host = StubHost::new(caller);
    engine.fund(&mut host, addr(9), 500).unwrap();
    assert!(engine.ledger().balance_of(caller, addr(9)) <= engine.ledger().reserve_of(addr(9)));
}

/// Universal invariant 6: the ledger is quiescent (`settled`, no warm
/// tokens) between operations, including after one that failed.
#[test]
fn invariant_ledger_is_quiescent_between_operations() {
    let mut engine = Engine::new(addr(0xaa));
    let mut host = StubHost::new(addr(1));
    assert!(engine.ledger().settled());

    let _ = engine.draw(&mut host, addr(9), 10, addr(2));
    assert!(engine.ledger().settled());
    assert!(engine.ledger().warm_tokens().is_empty());
}

/// Round-trip law 8: allocating then fully deallocating the same
/// `delta_liquidity` restores `pool.liquidity` and the position's
/// `free_liquidity` to their prior values.
#[test]
fn round_trip_allocate_then_deallocate_restores_liquidity() {
    let mut engine = Engine::new(addr(0xaa));
    let caller = addr(1);
    let mut host = StubHost::new(caller);
    let pool_id = create_pair_and_pool(&mut engine, &mut host, None, 0);

    engine.multiprocess(&mut host, &wire::allocate(pool_id, false, WAD)).unwrap();
    engine.multiprocess(&mut host, &wire::deallocate(pool_id, false, WAD)).unwrap();

    let pool = engine.state().pool(pool_id).unwrap();
    assert_eq!(pool.liquidity, 0);
    let position = engine.state().position((caller, pool_id)).unwrap();
    assert_eq!(position.free_liquidity, 0);
}

/// `deposit`/`fund`/`draw` round trip through the ledger and settle cleanly.
#[test]
fn deposit_fund_and_draw_round_trip_through_the_ledger() {
    let mut engine = Engine::new(addr(0xaa));
    let caller = addr(1);
    let mut host = StubHost::new(caller);
    host.value = 50;

    engine.deposit(&mut host).unwrap();
    assert_eq!(engine.ledger().balance_of(caller, host.wrapped), 50);

    engine.fund(&mut host, addr(9), 25).unwrap();
    assert_eq!(engine.ledger().balance_of(caller, addr(9)), 25);

    engine.draw(&mut host, addr(9), 10, addr(2)).unwrap();
    assert_eq!(engine.ledger().balance_of(caller, addr(9)), 15);
}

/// `claim` pays out at most what is owed even when the caller requests the
/// `u128::MAX` "all of it" sentinel.
#[test]
fn claim_pays_out_owed_fees_and_respects_the_sentinel() {
    let mut engine = Engine::new(addr(0xaa));
    let caller = addr(1);
    let mut host = StubHost::new(caller);
    let pool_id = create_pair_and_pool(&mut engine, &mut host, None, 0);
    engine.multiprocess(&mut host, &wire::allocate(pool_id, false, WAD)).unwrap();
    engine.multiprocess(&mut host, &wire::swap(pool_id, true, WAD / 10, 0)).unwrap();

    let events = engine
        .multiprocess(&mut host, &wire::claim(pool_id, u128::MAX, u128::MAX))
        .unwrap();
    match events[0] {
        Event::Collect { asset_amount, .. } => assert!(asset_amount > 0),
        _ => panic!("expected Collect"),
    }

    let position = engine.state().position((caller, pool_id)).unwrap();
    assert_eq!(position.tokens_owed_asset, 0);
}
