//! Error types.
//!
//! `EngineError` is the user-facing taxonomy. `InvariantViolation` is only
//! produced by `MatchingEngine::verify` and always means a bug.

use thiserror::Error;

use crate::fixed::{Price, Quantity};
use crate::order::{OrderId, Side};

/// Why an order request was refused before touching the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// Quantity is zero.
    #[error("quantity must be positive")]
    ZeroQuantity,
    /// Price is zero.
    #[error("price must be positive")]
    ZeroPrice,
    /// Resting the full quantity would overflow the side's total volume.
    #[error("quantity would overflow resting volume")]
    VolumeOverflow,
}

/// Errors returned by `MatchingEngine::submit` and `MatchingEngine::cancel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid order: {0}")]
    InvalidOrder(RejectReason),
    #[error("order {0} is not resting in the book")]
    NotFound(OrderId),
}

/// A broken structural invariant of the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{side} level {price}: recorded volume {recorded}, queue holds {actual}")]
    LevelVolume {
        side: Side,
        price: Price,
        recorded: Quantity,
        actual: Quantity,
    },
    #[error("{side} level {price} is empty but still indexed")]
    EmptyLevel { side: Side, price: Price },
    #[error("{side} price index and priority order disagree (price {price:?})")]
    IndexMismatch { side: Side, price: Option<Price> },
    #[error("{side} side order count or volume drifted from its levels")]
    SideTotals { side: Side },
    #[error("order {id} back-reference does not match the level holding it")]
    BackReference { id: OrderId },
    #[error("order index and pool disagree about order {id}")]
    OrderIndex { id: OrderId },
    #[error("book is crossed: best bid {bid} >= best ask {ask}")]
    Crossed { bid: Price, ask: Price },
}
