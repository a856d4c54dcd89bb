//! The operation dispatcher (spec §4.6): reentrancy lock, settlement
//! windows, and the externally invocable operation surface (`deposit`,
//! `fund`, `draw`, `multiprocess`, `change_parameters`). Mirrors the
//! teacher's `contract.rs` `execute` entry point, generalised from a single
//! CosmWasm `ExecuteMsg` dispatch to a host-agnostic `Engine`.

use rmm_types::address::Address;
use rmm_types::consts::AMOUNT_MAX_SENTINEL;
use rmm_types::error::{Error, Result};
use rmm_types::events::Event;
use rmm_types::external::Host;
use rmm_types::ids::PoolId;

use crate::instructions::{self, Instruction};
use crate::ledger::Ledger;
use crate::pool_ops;
use crate::state::State;
use crate::swap::{self, CoveredCall, SwapArgs};

/// The engine-wide reentrancy lock (spec §5 "Reentrancy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Lock {
    #[default]
    Idle,
    Busy,
}

/// The RMM core: owns [`State`] and [`Ledger`] and is the sole entry point
/// for externally initiated operations. A host holds one `Engine` and
/// drives it through `&mut dyn Host` on every call.
#[derive(Debug, Default)]
pub struct Engine {
    state: State,
    ledger: Ledger,
    lock: Lock,
    self_address: Address,
}

impl Engine {
    pub fn new(self_address: Address) -> Self {
        Self {
            state: State::new(),
            ledger: Ledger::new(),
            lock: Lock::Idle,
            self_address,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Acquires the reentrancy lock, runs `body`, then the settlement pass
    /// of spec §4.5, releasing the lock once both have succeeded. Any
    /// failure — from `body`, from settlement, or a dangling `settled ==
    /// false` — discards every write the operation made by restoring a
    /// snapshot taken before `body` ran (spec §5 "any failure aborts the
    /// entire operation and rolls back all state writes").
    fn run_operation<T>(
        &mut self,
        host: &mut dyn Host,
        body: impl FnOnce(&mut State, &mut Ledger, &mut dyn Host) -> Result<T>,
    ) -> Result<T> {
        if self.lock == Lock::Busy {
            tracing::warn!("rejected a reentrant operation");
            return Err(Error::InvalidReentrancy);
        }
        let state_snapshot = self.state.clone();
        let ledger_snapshot = self.ledger.clone();

        self.lock = Lock::Busy;
        self.ledger.begin_operation();

        let result = body(&mut self.state, &mut self.ledger, host);
        let caller = host.caller();
        let outcome = result.and_then(|value| {
            self.ledger.settle(host, self.self_address, caller)?;
            if !self.ledger.settled() {
                return Err(Error::InvalidSettlement);
            }
            Ok(value)
        });

        if let Err(err) = &outcome {
            tracing::debug!(?err, "operation failed, rolling back state and ledger");
            self.state = state_snapshot;
            self.ledger = ledger_snapshot;
        }
        self.lock = Lock::Idle;
        outcome
    }

    /// `deposit()`: wraps `host.value()` into wrapped-native credit for the
    /// caller (spec §6).
    pub fn deposit(&mut self, host: &mut dyn Host) -> Result<Event> {
        self.run_operation(host, |_state, ledger, host| {
            let caller = host.caller();
            let amount = host.value();
            let wrapped = host.wrapped_token();
            host.wrap(amount)?;
            ledger.credit(caller, wrapped, amount)?;
            ledger.increase_reserve(wrapped, amount)?;
            Ok(Event::Deposit { caller, amount })
        })
    }

    /// `fund(token, amount | MAX)`: pulls `token` from the caller and
    /// credits them (spec §6).
    pub fn fund(&mut self, host: &mut dyn Host, token: Address, amount: u128) -> Result<Event> {
        self.run_operation(host, |_state, ledger, host| {
            let caller = host.caller();
            let resolved = if amount == AMOUNT_MAX_SENTINEL {
                host.balance_of(token, caller)?
            } else {
                amount
            };
            ledger.queue_pull(token, resolved)?;
            ledger.credit(caller, token, resolved)?;
            ledger.increase_reserve(token, resolved)?;
            Ok(Event::BalanceDelta {
                owner: caller,
                token,
                increased: true,
                amount: resolved,
            })
        })
    }

    /// `draw(token, amount | MAX, to)`: debits the caller's virtual balance,
    /// decreases reserves, and transfers out (unwrapping first if `token`
    /// is the wrapped native asset). Fails `InvalidTransfer` if `to ==
    /// self`, `DrawBalance` if the caller is over-withdrawing.
    pub fn draw(&mut self, host: &mut dyn Host, token: Address, amount: u128, to: Address) -> Result<Event> {
        let self_address = self.self_address;
        self.run_operation(host, |_state, ledger, host| {
            if to == self_address {
                return Err(Error::InvalidTransfer);
            }
            let caller = host.caller();
            let available = ledger.balance_of(caller, token);
            let resolved = if amount == AMOUNT_MAX_SENTINEL { available } else { amount };
            if resolved > available {
                return Err(Error::DrawBalance);
            }

            ledger.debit(caller, token, resolved)?;
            ledger.decrease_reserve(token, resolved)?;
            if token == host.wrapped_token() {
                host.unwrap(resolved)?;
            }
            host.transfer(token, to, resolved)?;
            Ok(Event::BalanceDelta {
                owner: caller,
                token,
                increased: false,
                amount: resolved,
            })
        })
    }

    /// `change_parameters` (spec §4.6), controller-gated, run inside its
    /// own settlement window like every other externally initiated
    /// operation even though it never touches tokens.
    pub fn change_parameters(
        &mut self,
        host: &mut dyn Host,
        pool_id: PoolId,
        new_priority_fee_bps: u16,
        new_fee_bps: u16,
        new_jit: u64,
    ) -> Result<Event> {
        self.run_operation(host, |state, _ledger, host| {
            let caller = host.caller();
            pool_ops::change_parameters(state, caller, pool_id, new_priority_fee_bps, new_fee_bps, new_jit)?;
            Ok(Event::ChangeParameters { pool_id })
        })
    }

    /// `multiprocess(payload)` (spec §4.6, §6): decodes and executes a
    /// batch of instructions inside one settlement window. Instructions
    /// run in order; a later instruction observes every write of an
    /// earlier one in the same batch.
    pub fn multiprocess(&mut self, host: &mut dyn Host, payload: &[u8]) -> Result<Vec<Event>> {
        let batch = instructions::decode_batch(payload)?;
        tracing::debug!(len = batch.len(), "decoded instruction batch");
        self.run_operation(host, |state, ledger, host| {
            let now = host.now();
            let caller = host.caller();
            let mut events = Vec::with_capacity(batch.len());
            for instruction in batch {
                events.push(apply_instruction(state, ledger, caller, now, instruction)?);
            }
            Ok(events)
        })
    }
}

fn apply_instruction(
    state: &mut State,
    ledger: &mut Ledger,
    caller: Address,
    now: u64,
    instruction: Instruction,
) -> Result<Event> {
    match instruction {
        Instruction::CreatePair { asset, quote, asset_decimals, quote_decimals } => {
            let pair_id = pool_ops::create_pair(state, asset, quote, asset_decimals, quote_decimals)?;
            tracing::info!(pair_id, ?asset, ?quote, "created pair");
            Ok(Event::CreatePair { pair_id, asset, quote })
        }
        Instruction::CreatePool {
            pair_ref,
            controller,
            priority_fee_bps,
            fee_bps,
            volatility_bps,
            duration_seconds,
            jit,
            max_price,
            price,
        } => {
            let args = pool_ops::CreatePoolArgs {
                pair_ref,
                controller,
                priority_fee_bps,
                fee_bps,
                volatility_bps,
                duration_seconds,
                jit,
                max_price,
                price,
                now,
            };
            let pool_id = pool_ops::create_pool(state, args)?;
            tracing::info!(?pool_id, price, "created pool");
            Ok(Event::CreatePool { pool_id, pair_id: pair_ref, price })
        }
        Instruction::Allocate { pool_id, use_max, delta_liquidity } => {
            let pool = state.pool(pool_id)?.clone();
            let pair = *state.pairs.get(pool.pair_id)?;
            let delta_liquidity = if use_max {
                let bal_asset = ledger.balance_of(caller, pair.asset);
                let bal_quote = ledger.balance_of(caller, pair.quote);
                pool_ops::max_mintable(&pool, bal_asset, bal_quote)?
            } else {
                delta_liquidity
            };
            let (delta_asset, delta_quote) =
                pool_ops::allocate(state, ledger, caller, pool_id, delta_liquidity, now)?;
            Ok(Event::Allocate { pool_id, owner: caller, delta_liquidity, delta_asset, delta_quote })
        }
        Instruction::Deallocate { pool_id, use_max, delta_liquidity } => {
            let delta_liquidity = if use_max {
                let position = state.position((caller, pool_id)).ok_or(Error::NonExistentPosition)?;
                position.free_liquidity
            } else {
                delta_liquidity
            };
            let (delta_asset, delta_quote) =
                pool_ops::deallocate(state, ledger, caller, pool_id, delta_liquidity, now)?;
            Ok(Event::Deallocate { pool_id, owner: caller, delta_liquidity, delta_asset, delta_quote })
        }
        Instruction::Swap { pool_id, sell_asset, use_max, input_amount, min_output } => {
            let objective = CoveredCall;
            let args = SwapArgs { pool_id, sell_asset, use_max, input_amount, min_output, now };
            let (consumed, output, event) = swap::swap(state, ledger, &objective, caller, args)?;
            tracing::debug!(?pool_id, sell_asset, consumed, output, "executed swap");
            Ok(event)
        }
        Instruction::Claim { pool_id, delta_asset_req, delta_quote_req } => {
            let (asset_amount, quote_amount) =
                pool_ops::claim(state, ledger, caller, pool_id, delta_asset_req, delta_quote_req)?;
            Ok(Event::Collect { pool_id, owner: caller, asset_amount, quote_amount })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    struct StubHost {
        now: u64,
        caller: Address,
        value: u128,
        wrapped: Address,
        external_balances: std::collections::HashMap<(Address, Address), u128>,
        fail_transfer_from: bool,
    }

    impl StubHost {
        fn new(caller: Address) -> Self {
            Self {
                now: 0,
                caller,
                value: 0,
                wrapped: addr(0xee),
                external_balances: std::collections::HashMap::new(),
                fail_transfer_from: false,
            }
        }
    }

    impl rmm_types::external::TokenAdapter for StubHost {
        fn balance_of(&self, token: Address, holder: Address) -> Result<u128> {
            Ok(*self.external_balances.get(&(token, holder)).unwrap_or(&0))
        }
        fn transfer(&mut self, token: Address, to: Address, amount: u128) -> Result<()> {
            *self.external_balances.entry((token, to)).or_insert(0) += amount;
            Ok(())
        }
        fn transfer_from(&mut self, token: Address, from: Address, to: Address, amount: u128) -> Result<()> {
            if self.fail_transfer_from {
                return Err(Error::DrawBalance);
            }
            *self.external_balances.entry((token, from)).or_insert(0) += amount;
            *self.external_balances.entry((token, to)).or_insert(0) += amount;
            Ok(())
        }
        fn decimals(&self, _token: Address) -> Result<u8> {
            Ok(18)
        }
    }

    impl rmm_types::external::WrappedNative for StubHost {
        fn wrapped_token(&self) -> Address {
            self.wrapped
        }
        fn wrap(&mut self, _amount: u128) -> Result<()> {
            Ok(())
        }
        fn unwrap(&mut self, _amount: u128) -> Result<()> {
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

    #[test]
    fn a_busy_lock_rejects_a_nested_operation() {
        let mut engine = Engine::new(addr(0xaa));
        engine.lock = Lock::Busy;
        let mut host = StubHost::new(addr(1));
        assert_eq!(
            engine.fund(&mut host, addr(9), 10).unwrap_err(),
            Error::InvalidReentrancy
        );
    }

    #[test]
    fn a_failed_settlement_pull_rolls_back_every_write_from_the_operation() {
        let mut engine = Engine::new(addr(0xaa));
        let token = addr(9);
        let caller = addr(1);
        let mut host = StubHost::new(caller);
        host.fail_transfer_from = true;

        let before_reserve = engine.ledger().reserve_of(token);
        let result = engine.fund(&mut host, token, 100);
        assert_eq!(result.unwrap_err(), Error::DrawBalance);
        assert_eq!(engine.ledger().reserve_of(token), before_reserve);
        assert_eq!(engine.ledger().balance_of(caller, token), 0);
        assert!(engine.ledger().settled());
    }

    #[test]
    fn a_successful_fund_credits_the_caller_and_settles() {
        let mut engine = Engine::new(addr(0xaa));
        let token = addr(9);
        let caller = addr(1);
        let mut host = StubHost::new(caller);

        engine.fund(&mut host, token, 100).unwrap();
        assert_eq!(engine.ledger().balance_of(caller, token), 100);
        assert_eq!(engine.ledger().reserve_of(token), 100);
        assert!(engine.ledger().settled());
    }
}
