use std::collections::HashMap;

use rmm_types::address::Address;
use rmm_types::error::{Error, Result};
use rmm_types::external::Host;

/// Per-token reserves and per-`(owner, token)` virtual balances, the
/// transient warm-token set, and the settled flag (spec §3 "Ledger",
/// §4.5). Process-wide, exclusively owned by the engine.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    reserves: HashMap<Address, u128>,
    balances: HashMap<(Address, Address), u128>,
    /// Insertion-ordered, duplicate-eliding sequence of tokens touched by
    /// the current operation.
    warm: Vec<Address>,
    /// Per-token shortfall still owed externally once the caller's own
    /// virtual balance has been drawn down as far as it will go, summed
    /// across every `debit` in the current operation so repeated debits to
    /// the same token net into a single pull (spec §4.6 "debits and
    /// credits are netted").
    pending_pulls: HashMap<Address, u128>,
    settled: bool,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            reserves: HashMap::new(),
            balances: HashMap::new(),
            warm: Vec::new(),
            pending_pulls: HashMap::new(),
            settled: true,
        }
    }

    pub fn settled(&self) -> bool {
        self.settled
    }

    pub fn reserve_of(&self, token: Address) -> u128 {
        *self.reserves.get(&token).unwrap_or(&0)
    }

    pub fn balance_of(&self, owner: Address, token: Address) -> u128 {
        *self.balances.get(&(owner, token)).unwrap_or(&0)
    }

    /// Marks `token` as touched by the in-flight operation, appending it to
    /// `warm` only the first time it is seen.
    pub fn warm_token(&mut self, token: Address) {
        if !self.warm.contains(&token) {
            self.warm.push(token);
        }
    }

    pub fn warm_tokens(&self) -> &[Address] {
        &self.warm
    }

    /// Increases `owner`'s cost: spends as much as possible out of their
    /// existing virtual balance, and queues whatever is left over to be
    /// pulled from the host at settlement.
    pub fn debit(&mut self, owner: Address, token: Address, amount: u128) -> Result<()> {
        self.warm_token(token);
        let balance = self.balances.entry((owner, token)).or_insert(0);
        let spent = amount.min(*balance);
        *balance -= spent;
        let shortfall = amount - spent;
        if shortfall > 0 {
            let pending = self.pending_pulls.entry(token).or_insert(0);
            *pending = pending.checked_add(shortfall).ok_or(Error::CastOverflow)?;
        }
        Ok(())
    }

    /// Queues an unconditional external pull of `amount` of `token`,
    /// without first drawing down any existing virtual balance. Used by
    /// `fund`, where the whole requested amount must come from the
    /// caller's real external balance regardless of what they already hold
    /// inside the engine.
    pub fn queue_pull(&mut self, token: Address, amount: u128) -> Result<()> {
        self.warm_token(token);
        if amount > 0 {
            let pending = self.pending_pulls.entry(token).or_insert(0);
            *pending = pending.checked_add(amount).ok_or(Error::CastOverflow)?;
        }
        Ok(())
    }

    /// Increases `owner`'s virtual balance.
    pub fn credit(&mut self, owner: Address, token: Address, amount: u128) -> Result<()> {
        self.warm_token(token);
        let entry = self.balances.entry((owner, token)).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(Error::CastOverflow)?;
        Ok(())
    }

    pub fn increase_reserve(&mut self, token: Address, amount: u128) -> Result<()> {
        self.warm_token(token);
        let entry = self.reserves.entry(token).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(Error::CastOverflow)?;
        Ok(())
    }

    pub fn decrease_reserve(&mut self, token: Address, amount: u128) -> Result<()> {
        self.warm_token(token);
        let entry = self.reserves.entry(token).or_insert(0);
        *entry = entry.checked_sub(amount).ok_or(Error::CastOverflow)?;
        Ok(())
    }

    /// `reserves[token] - external_balance_of(self, token)`. Transiently
    /// negative mid-settlement is allowed; quiescent callers must see
    /// `net_balance <= 0`.
    pub fn net_balance(&self, token: Address, external_balance: u128) -> i128 {
        self.reserve_of(token) as i128 - external_balance as i128
    }

    /// The end-of-operation settlement pass (spec §4.5 steps 2–3): drains
    /// the FIFO of pulls queued by `debit` during the operation body, one
    /// `transfer_from(caller -> self, amount)` per warm token, then clears
    /// `warm` and flips `settled` back to `true`.
    ///
    /// Credits (the caller being owed tokens) never need a host round
    /// trip — `credit`/`increase_reserve` already applied them as the
    /// operation ran — so only debits carry forward to this pass.
    pub fn settle(&mut self, host: &mut dyn Host, self_address: Address, caller: Address) -> Result<()> {
        for &token in self.warm.iter().rev() {
            if let Some(amount) = self.pending_pulls.remove(&token) {
                if amount > 0 {
                    tracing::debug!(?token, amount, "pulling settlement shortfall from caller");
                    host.transfer_from(token, caller, self_address, amount)?;
                }
            }
        }

        self.warm.clear();
        self.pending_pulls.clear();
        self.settled = true;
        Ok(())
    }

    /// Opens a settlement window for a new externally initiated operation.
    pub fn begin_operation(&mut self) {
        self.settled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn warm_tokens_deduplicate_in_insertion_order() {
        let mut ledger = Ledger::new();
        ledger.warm_token(addr(1));
        ledger.warm_token(addr(2));
        ledger.warm_token(addr(1));
        assert_eq!(ledger.warm_tokens(), &[addr(1), addr(2)]);
    }

    #[test]
    fn credit_then_debit_draws_down_balance_before_queuing_a_pull() {
        let mut ledger = Ledger::new();
        ledger.credit(addr(1), addr(9), 100).unwrap();
        ledger.debit(addr(1), addr(9), 40).unwrap();
        assert_eq!(ledger.balance_of(addr(1), addr(9)), 60);
        assert_eq!(ledger.pending_pulls.get(&addr(9)), None);
    }

    #[test]
    fn debit_beyond_balance_queues_the_shortfall() {
        let mut ledger = Ledger::new();
        ledger.credit(addr(1), addr(9), 10).unwrap();
        ledger.debit(addr(1), addr(9), 30).unwrap();
        assert_eq!(ledger.balance_of(addr(1), addr(9)), 0);
        assert_eq!(*ledger.pending_pulls.get(&addr(9)).unwrap(), 20);
    }

    #[test]
    fn repeated_debits_to_the_same_token_net_into_one_pull() {
        let mut ledger = Ledger::new();
        ledger.debit(addr(1), addr(9), 5).unwrap();
        ledger.debit(addr(1), addr(9), 7).unwrap();
        assert_eq!(*ledger.pending_pulls.get(&addr(9)).unwrap(), 12);
    }

    #[test]
    fn settled_flag_toggles_around_an_operation() {
        let mut ledger = Ledger::new();
        assert!(ledger.settled());
        ledger.begin_operation();
        assert!(!ledger.settled());
    }
}
