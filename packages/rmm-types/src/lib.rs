//! Common types shared by the RMM core: identifiers, domain records, the
//! accounting primitives' scalar types, external-collaborator traits, the
//! error taxonomy, and engine-wide constants.

pub mod address;
pub mod checkpoint;
pub mod consts;
pub mod error;
pub mod events;
pub mod external;
pub mod ids;
pub mod pair;
pub mod pool;
pub mod position;

pub use address::Address;
pub use checkpoint::{Checkpoint, U256};
pub use error::{Error, Result};
pub use events::Event;
pub use ids::{PairId, PoolId};
pub use pair::{Pair, PairStore};
pub use pool::{Pool, PoolParams};
pub use position::{Position, PositionKey};

/// Signed WAD fixed-point value (18 fractional decimal digits). Used by the
/// curve library, which needs negative intermediates (e.g. `ln(S/K)` for
/// `S < K`).
pub type WadI128 = i128;

/// Unsigned WAD fixed-point value. Used for reserves, liquidity, and any
/// quantity the data model guarantees is non-negative.
pub type WadU128 = u128;
