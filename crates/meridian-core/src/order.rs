//! Order types and lifecycle management.
//!
//! An order is born at submission, rests in exactly one price level while
//! it has remaining size, and dies on full fill or cancellation.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::book::LevelHandle;
use crate::fixed::{Price, Quantity};

/// Side of the order book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Bid side (buyers).
    Buy = 0,
    /// Ask side (sellers).
    Sell = 1,
}

impl Side {
    /// Get the opposite side.
    #[inline(always)]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Check if this is the buy side.
    #[inline(always)]
    pub const fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Check if this is the sell side.
    #[inline(always)]
    pub const fn is_sell(self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

/// Unique order identifier, assigned by the engine on acceptance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A limit order intent as handed to `MatchingEngine::submit`.
///
/// Only good-till-canceled limit orders exist; anything that survives
/// matching rests in the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Order side.
    pub side: Side,
    /// Limit price.
    pub price: Price,
    /// Requested size.
    pub quantity: Quantity,
}

impl OrderRequest {
    /// Buy `quantity` at `price` or better.
    pub const fn buy(price: Price, quantity: Quantity) -> Self {
        Self { side: Side::Buy, price, quantity }
    }

    /// Sell `quantity` at `price` or better.
    pub const fn sell(price: Price, quantity: Quantity) -> Self {
        Self { side: Side::Sell, price, quantity }
    }
}

/// An accepted order.
///
/// Identity fields never change; only `remaining_qty` and the level
/// back-reference move over the order's life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Order side (buy/sell).
    pub side: Side,
    /// Limit price.
    pub price: Price,
    /// Size at submission.
    pub original_qty: Quantity,
    /// Size still open.
    pub remaining_qty: Quantity,
    /// Arrival counter. Breaks ties between orders at the same price.
    pub sequence: u64,
    /// Level this order rests in, `None` while matching or once removed.
    pub(crate) level: Option<LevelHandle>,
}

impl Order {
    /// Create a new, not yet resting, order.
    #[inline(always)]
    pub fn new(id: OrderId, side: Side, price: Price, qty: Quantity, sequence: u64) -> Self {
        Self {
            id,
            side,
            price,
            original_qty: qty,
            remaining_qty: qty,
            sequence,
            level: None,
        }
    }

    /// Check if order is completely filled.
    #[inline(always)]
    pub const fn is_filled(&self) -> bool {
        self.remaining_qty.is_zero()
    }

    /// Fill the order by the given quantity.
    ///
    /// # Panics
    /// Debug-panics if qty > remaining_qty.
    #[inline(always)]
    pub fn fill(&mut self, qty: Quantity) {
        debug_assert!(qty <= self.remaining_qty, "Fill quantity exceeds remaining");
        self.remaining_qty = self.remaining_qty.saturating_sub(qty);
    }

    /// Get filled quantity.
    #[inline(always)]
    pub const fn filled_qty(&self) -> Quantity {
        Quantity(self.original_qty.0 - self.remaining_qty.0)
    }

    /// Check whether the order currently rests in a price level.
    #[inline(always)]
    pub const fn is_resting(&self) -> bool {
        self.level.is_some()
    }

    /// Level back-reference.
    #[inline(always)]
    pub const fn level(&self) -> Option<LevelHandle> {
        self.level
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {}/{} @ {}",
            self.id, self.side, self.remaining_qty, self.original_qty, self.price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_fill() {
        let mut order = Order::new(OrderId(1), Side::Buy, Price::from_ticks(100), Quantity(100), 1);

        assert!(!order.is_filled());
        order.fill(Quantity(50));
        assert_eq!(order.remaining_qty.0, 50);
        assert!(!order.is_filled());

        order.fill(Quantity(50));
        assert!(order.is_filled());
        assert_eq!(order.filled_qty().0, 100);
    }

    #[test]
    fn test_new_order_is_not_resting() {
        let order = Order::new(OrderId(7), Side::Sell, Price::from_ticks(5), Quantity(1), 3);
        assert!(!order.is_resting());
        assert_eq!(order.level(), None);
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_display() {
        let order = Order::new(OrderId(3), Side::Buy, Price::from_raw(10150), Quantity(12), 3);
        assert_eq!(order.to_string(), "#3 buy 12/12 @ 101.50");
    }
}
