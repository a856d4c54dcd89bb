use thiserror::Error;

use crate::WadI128;

/// The RMM core's single error taxonomy.
///
/// Every fallible operation across `rmm-types`, `rmm-curve` and `rmm-engine`
/// returns `Result<_, Error>`. Unlike the teacher, which layers a distinct
/// `ContractError`/`PclError` per package, this core is one deployable unit
/// rather than several independently versioned contracts, so one flat enum
/// stands in for all three layers (see `DESIGN.md`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // --- InvalidInput ---
    #[error("price must be strictly positive")]
    ZeroPrice,
    #[error("pool has no liquidity")]
    ZeroLiquidity,
    #[error("both requested amounts are zero")]
    ZeroAmounts,
    #[error("swap input must be strictly positive")]
    ZeroInput,
    #[error("swap output must be strictly positive")]
    ZeroOutput,
    #[error("token decimals {0} outside the allowed [6, 18] range")]
    InvalidDecimals(u8),
    #[error("fee {0} bps outside the allowed bounds")]
    InvalidFee(u16),
    #[error("volatility {0} bps outside the allowed bounds")]
    InvalidVolatility(u32),
    #[error("duration must be strictly positive")]
    InvalidDuration,
    #[error("jit policy {0} is invalid for this pool")]
    InvalidJit(u64),
    #[error("asset and quote token must differ")]
    SameToken,
    #[error("transfer destination may not be the engine itself")]
    InvalidTransfer,
    #[error("instruction byte does not decode to a known opcode")]
    InvalidInstruction,

    // --- StateConflict ---
    #[error("a pair already exists for this (asset, quote) ordering")]
    PairExists,
    #[error("a pool already exists for this identifier")]
    PoolExists,
    #[error("no pair is registered for this reference")]
    NonExistentPair,
    #[error("no pool is registered for this identifier")]
    NonExistentPool,
    #[error("no position is registered for this (owner, pool)")]
    NonExistentPosition,
    #[error("caller is not this pool's controller")]
    NotController,

    // --- Policy ---
    #[error("liquidity is still JIT-locked; {0} seconds must elapse since last change")]
    JitLiquidity(u64),
    #[error("pool has passed its maturity and no longer accepts swaps")]
    PoolExpired,
    #[error("draw amount exceeds the caller's virtual balance")]
    DrawBalance,

    // --- Invariant ---
    #[error("swap would decrease the trading-function invariant: {prev} -> {next}")]
    InvalidInvariant { prev: WadI128, next: WadI128 },
    #[error("operation exited without reconciling the ledger")]
    InvalidSettlement,
    #[error("a nested external call attempted to re-enter the engine")]
    InvalidReentrancy,
    #[error("value does not fit in the target integer width")]
    CastOverflow,

    // --- Math ---
    #[error("division by zero")]
    DivisionByZero,
    #[error("fixed-point operation overflowed its WAD representation")]
    OverflowWad,
    #[error("price or reserve share is outside the curve's defined domain")]
    UndefinedPrice,
}

pub type Result<T> = core::result::Result<T, Error>;
