//! The RMM core: pool/pair store, accounting ledger, swap engine,
//! operation dispatcher and instruction batch decoder (spec §2).

pub mod dispatcher;
pub mod instructions;
pub mod ledger;
pub mod pool_ops;
pub mod state;
pub mod swap;

pub use dispatcher::Engine;
pub use ledger::Ledger;
pub use state::State;
pub use swap::{CoveredCall, SwapArgs, SwapObjective};
