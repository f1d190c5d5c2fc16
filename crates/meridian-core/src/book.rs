//! Order book data structures.
//!
//! Each side keeps its price levels in an arena addressed by
//! `LevelHandle`, indexed two ways: a hash map from price to level for
//! O(1) lookup, and a B-tree keyed by matching priority for O(log n)
//! best-level access. Both indexes always name exactly the same levels.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;
use crate::fixed::{Price, Quantity};
use crate::level::PriceLevel;
use crate::order::Side;
use crate::pool::{OrderHandle, OrderPool};

/// Index of a price level inside its `BookSide`.
///
/// This is the non-owning back-reference an order keeps to the level it
/// rests in. Handles are recycled once a level is pruned, which is safe
/// because only empty levels are pruned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LevelHandle(pub u32);

impl LevelHandle {
    /// Get raw index.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Aggregated view of one price level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Level price.
    pub price: Price,
    /// Sum of remaining size at this price.
    pub quantity: Quantity,
    /// Number of resting orders.
    pub order_count: usize,
}

/// Check whether an incoming limit crosses a resting level price.
///
/// A buy crosses when its limit is at or above the level, a sell when its
/// limit is at or below it.
#[inline(always)]
pub const fn prices_cross(incoming: Side, limit: Price, level_price: Price) -> bool {
    match incoming {
        Side::Buy => limit.0 >= level_price.0,
        Side::Sell => limit.0 <= level_price.0,
    }
}

/// One side of the order book (Bids or Asks).
#[derive(Debug)]
pub struct BookSide {
    /// Side indicator for priority ordering.
    side: Side,
    /// Level storage. `None` marks a free slot.
    levels: Vec<Option<PriceLevel>>,
    /// LIFO free list of level slots.
    free_levels: Vec<u32>,
    /// Price → level, for O(1) existence checks.
    index: HashMap<Price, LevelHandle>,
    /// Priority key → level; the first entry is the best level.
    priority: BTreeMap<u64, LevelHandle>,
    /// Total order count on this side.
    order_count: usize,
    /// Total quantity on this side.
    total_qty: Quantity,
}

impl BookSide {
    /// Create a new empty book side.
    pub fn new(side: Side, level_capacity: usize) -> Self {
        Self {
            side,
            levels: Vec::with_capacity(level_capacity),
            free_levels: Vec::new(),
            index: HashMap::with_capacity(level_capacity),
            priority: BTreeMap::new(),
            order_count: 0,
            total_qty: Quantity::ZERO,
        }
    }

    /// Which side this is.
    #[inline(always)]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Sort key: ascending price for asks, descending for bids.
    #[inline(always)]
    const fn priority_key(&self, price: Price) -> u64 {
        match self.side {
            Side::Buy => u64::MAX - price.0,
            Side::Sell => price.0,
        }
    }

    /// Get level by handle.
    #[inline(always)]
    pub fn level(&self, handle: LevelHandle) -> Option<&PriceLevel> {
        self.levels.get(handle.index()).and_then(Option::as_ref)
    }

    /// Get level by handle (mutable).
    #[inline(always)]
    pub fn level_mut(&mut self, handle: LevelHandle) -> Option<&mut PriceLevel> {
        self.levels.get_mut(handle.index()).and_then(Option::as_mut)
    }

    /// Get level at an exact price.
    #[inline]
    pub fn level_at(&self, price: Price) -> Option<&PriceLevel> {
        let handle = *self.index.get(&price)?;
        self.level(handle)
    }

    /// Get level at an exact price (mutable).
    #[inline]
    pub fn level_at_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        let handle = *self.index.get(&price)?;
        self.level_mut(handle)
    }

    /// Handle of the highest-priority level.
    #[inline(always)]
    pub fn best_handle(&self) -> Option<LevelHandle> {
        self.priority.first_key_value().map(|(_, handle)| *handle)
    }

    /// Get the best price level for matching (immutable).
    #[inline(always)]
    pub fn best_level(&self) -> Option<&PriceLevel> {
        self.best_handle().and_then(|handle| self.level(handle))
    }

    /// Get the best price level for matching (mutable).
    #[inline(always)]
    pub fn best_level_mut(&mut self) -> Option<&mut PriceLevel> {
        self.best_handle().and_then(move |handle| self.level_mut(handle))
    }

    /// Get the best price.
    #[inline(always)]
    pub fn best_price(&self) -> Option<Price> {
        self.best_level().map(PriceLevel::price)
    }

    /// Check if an incoming order on the other side would cross the best level.
    #[inline(always)]
    pub fn would_match(&self, price: Price, incoming_side: Side) -> bool {
        debug_assert_ne!(incoming_side, self.side, "Orders never match their own side");
        self.best_price()
            .is_some_and(|best| prices_cross(incoming_side, price, best))
    }

    /// Add a pooled order to the level at its price, creating the level on demand.
    pub fn insert_order(&mut self, handle: OrderHandle, pool: &mut OrderPool) -> LevelHandle {
        let (price, qty) = {
            let order = &pool[handle];
            debug_assert_eq!(order.side, self.side, "Order inserted on the wrong side");
            (order.price, order.remaining_qty)
        };

        let level_handle = match self.index.get(&price) {
            Some(&existing) => existing,
            None => self.create_level(price),
        };

        match self.level_mut(level_handle) {
            Some(level) => level.push_back(handle, pool),
            None => unreachable!("indexed level {:?} missing from arena", level_handle),
        }

        self.order_count += 1;
        self.total_qty = self.total_qty.saturating_add(qty);
        level_handle
    }

    /// Allocate a level slot and register it in both indexes.
    fn create_level(&mut self, price: Price) -> LevelHandle {
        let handle = match self.free_levels.pop() {
            Some(idx) => {
                let handle = LevelHandle(idx);
                self.levels[handle.index()] = Some(PriceLevel::new(price, handle));
                handle
            }
            None => {
                let handle = LevelHandle(self.levels.len() as u32);
                self.levels.push(Some(PriceLevel::new(price, handle)));
                handle
            }
        };

        let key = self.priority_key(price);
        self.index.insert(price, handle);
        self.priority.insert(key, handle);
        handle
    }

    /// Unlink a resting order from its level (cancellation path).
    ///
    /// Uses the order's back-reference; the caller is expected to prune the
    /// level afterwards with `remove_level_if_empty`.
    pub fn remove_order(&mut self, handle: OrderHandle, pool: &mut OrderPool) -> Option<Quantity> {
        let level_handle = pool.get(handle)?.level?;
        let removed = self.level_mut(level_handle)?.remove(handle, pool);

        self.order_count -= 1;
        self.reduce_qty(removed);
        Some(removed)
    }

    /// Excise the level at `price` from both indexes if its queue is empty.
    ///
    /// Returns `true` if a level was removed.
    pub fn remove_level_if_empty(&mut self, price: Price) -> bool {
        let Some(&handle) = self.index.get(&price) else {
            return false;
        };
        if !self.level(handle).is_some_and(PriceLevel::is_empty) {
            return false;
        }

        let key = self.priority_key(price);
        self.index.remove(&price);
        self.priority.remove(&key);
        self.levels[handle.index()] = None;
        self.free_levels.push(handle.0);
        true
    }

    /// Levels in priority order, best first.
    pub fn levels(&self) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.priority.values().filter_map(move |&handle| self.level(handle))
    }

    /// Aggregated depth, best first, at most `max_levels` entries.
    pub fn depth(&self, max_levels: usize) -> Vec<DepthLevel> {
        self.levels()
            .take(max_levels)
            .map(|level| DepthLevel {
                price: level.price(),
                quantity: level.total_qty(),
                order_count: level.len(),
            })
            .collect()
    }

    /// Check if side is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.priority.is_empty()
    }

    /// Number of price levels.
    #[inline(always)]
    pub fn level_count(&self) -> usize {
        self.priority.len()
    }

    /// Get order count.
    #[inline(always)]
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    /// Get total quantity.
    #[inline(always)]
    pub fn total_qty(&self) -> Quantity {
        self.total_qty
    }

    /// Reduce total quantity (after fill).
    #[inline(always)]
    pub fn reduce_qty(&mut self, qty: Quantity) {
        debug_assert!(qty <= self.total_qty, "Side volume underflow");
        self.total_qty = self.total_qty.saturating_sub(qty);
    }

    /// Decrement order count (after a maker is fully filled).
    #[inline(always)]
    pub fn decrement_order_count(&mut self) {
        debug_assert!(self.order_count > 0, "Side order count underflow");
        self.order_count = self.order_count.saturating_sub(1);
    }

    /// Walk every level and order on this side and check structural invariants.
    pub(crate) fn verify(&self, pool: &OrderPool) -> Result<(), InvariantViolation> {
        let side = self.side;
        let mut orders = 0usize;
        let mut volume = Quantity::ZERO;

        for (&key, &handle) in &self.priority {
            let Some(level) = self.level(handle) else {
                return Err(InvariantViolation::IndexMismatch { side, price: None });
            };
            let price = level.price();
            if key != self.priority_key(price) || self.index.get(&price) != Some(&handle) {
                return Err(InvariantViolation::IndexMismatch { side, price: Some(price) });
            }
            if level.is_empty() {
                return Err(InvariantViolation::EmptyLevel { side, price });
            }

            let mut queued = Quantity::ZERO;
            let mut count = 0usize;
            for order_handle in level.iter(pool) {
                let order = &pool[order_handle];
                if order.level != Some(handle) || order.price != price || order.side != side {
                    return Err(InvariantViolation::BackReference { id: order.id });
                }
                let Some(sum) = queued.0.checked_add(order.remaining_qty.0) else {
                    return Err(InvariantViolation::LevelVolume {
                        side,
                        price,
                        recorded: level.total_qty(),
                        actual: Quantity::MAX,
                    });
                };
                queued = Quantity(sum);
                count += 1;
            }
            if queued != level.total_qty() || count != level.len() {
                return Err(InvariantViolation::LevelVolume {
                    side,
                    price,
                    recorded: level.total_qty(),
                    actual: queued,
                });
            }

            orders += count;
            volume = match volume.0.checked_add(queued.0) {
                Some(sum) => Quantity(sum),
                None => return Err(InvariantViolation::SideTotals { side }),
            };
        }

        if let Some((&price, _)) = self
            .index
            .iter()
            .find(|(price, _)| !self.priority.contains_key(&self.priority_key(**price)))
        {
            return Err(InvariantViolation::IndexMismatch { side, price: Some(price) });
        }
        let live_levels = self.levels.iter().filter(|slot| slot.is_some()).count();
        if live_levels != self.priority.len() {
            return Err(InvariantViolation::IndexMismatch { side, price: None });
        }
        if orders != self.order_count || volume != self.total_qty {
            return Err(InvariantViolation::SideTotals { side });
        }
        Ok(())
    }
}

/// The complete order book for a single instrument.
#[derive(Debug)]
pub struct OrderBook {
    /// Bid side (buyers).
    pub bids: BookSide,
    /// Ask side (sellers).
    pub asks: BookSide,
}

impl OrderBook {
    /// Create a new order book.
    pub fn new(level_capacity: usize) -> Self {
        Self {
            bids: BookSide::new(Side::Buy, level_capacity),
            asks: BookSide::new(Side::Sell, level_capacity),
        }
    }

    /// Get best bid price.
    #[inline(always)]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    /// Get best ask price.
    #[inline(always)]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Get the spread (best ask - best bid).
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask.0 > bid.0 => Some(Price(ask.0 - bid.0)),
            _ => None,
        }
    }

    /// Get midpoint price.
    pub fn midpoint(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(Price(bid.0 + (ask.0 - bid.0) / 2)),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        }
    }

    /// Check if book is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Get immutable reference to appropriate side.
    #[inline(always)]
    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Get mutable reference to appropriate side.
    #[inline(always)]
    pub fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Order, OrderId};

    fn rest(side: &mut BookSide, pool: &mut OrderPool, id: u64, ticks: u64, qty: u64) -> OrderHandle {
        let order = Order::new(OrderId(id), side.side(), Price::from_ticks(ticks), Quantity(qty), id);
        let handle = pool.insert(order);
        side.insert_order(handle, pool);
        handle
    }

    #[test]
    fn test_book_side_insert_order() {
        let mut pool = OrderPool::with_capacity(8);
        let mut side = BookSide::new(Side::Buy, 8);

        rest(&mut side, &mut pool, 1, 100, 1000);

        assert_eq!(side.order_count(), 1);
        assert_eq!(side.level_count(), 1);
        assert_eq!(side.best_price(), Some(Price::from_ticks(100)));
        assert_eq!(side.level_at(Price::from_ticks(100)).map(PriceLevel::total_qty), Some(Quantity(1000)));
        assert!(side.verify(&pool).is_ok());
    }

    #[test]
    fn test_bid_priority_is_descending() {
        let mut pool = OrderPool::with_capacity(8);
        let mut side = BookSide::new(Side::Buy, 8);

        rest(&mut side, &mut pool, 1, 100, 100);
        assert_eq!(side.best_price(), Some(Price::from_ticks(100)));

        // Higher is better for bids
        rest(&mut side, &mut pool, 2, 110, 100);
        assert_eq!(side.best_price(), Some(Price::from_ticks(110)));

        // Worse order does not move best
        rest(&mut side, &mut pool, 3, 90, 100);
        assert_eq!(side.best_price(), Some(Price::from_ticks(110)));

        let prices: Vec<u64> = side.levels().map(|l| l.price().to_ticks()).collect();
        assert_eq!(prices, vec![110, 100, 90]);
    }

    #[test]
    fn test_ask_priority_is_ascending() {
        let mut pool = OrderPool::with_capacity(8);
        let mut side = BookSide::new(Side::Sell, 8);

        for (id, ticks) in [(1, 103), (2, 101), (3, 102)] {
            rest(&mut side, &mut pool, id, ticks, 10);
        }

        let prices: Vec<u64> = side.levels().map(|l| l.price().to_ticks()).collect();
        assert_eq!(prices, vec![101, 102, 103]);
        assert!(side.would_match(Price::from_ticks(101), Side::Buy));
        assert!(!side.would_match(Price::from_ticks(100), Side::Buy));
    }

    #[test]
    fn test_same_price_shares_level() {
        let mut pool = OrderPool::with_capacity(8);
        let mut side = BookSide::new(Side::Sell, 8);

        let a = rest(&mut side, &mut pool, 1, 100, 10);
        let b = rest(&mut side, &mut pool, 2, 100, 5);

        assert_eq!(side.level_count(), 1);
        assert_eq!(pool[a].level(), pool[b].level());
        let depth = side.depth(10);
        assert_eq!(
            depth,
            vec![DepthLevel { price: Price::from_ticks(100), quantity: Quantity(15), order_count: 2 }]
        );
    }

    #[test]
    fn test_remove_order_prunes_level() {
        let mut pool = OrderPool::with_capacity(8);
        let mut side = BookSide::new(Side::Sell, 8);

        let a = rest(&mut side, &mut pool, 1, 100, 10);
        rest(&mut side, &mut pool, 2, 101, 5);

        assert_eq!(side.remove_order(a, &mut pool), Some(Quantity(10)));
        // Not yet pruned: the caller decides when to excise
        assert!(side.level_at(Price::from_ticks(100)).is_some());
        assert!(side.remove_level_if_empty(Price::from_ticks(100)));
        assert!(side.level_at(Price::from_ticks(100)).is_none());
        assert_eq!(side.best_price(), Some(Price::from_ticks(101)));

        pool.remove(a);
        assert!(side.verify(&pool).is_ok());
    }

    #[test]
    fn test_remove_level_if_empty_keeps_live_level() {
        let mut pool = OrderPool::with_capacity(8);
        let mut side = BookSide::new(Side::Buy, 8);
        rest(&mut side, &mut pool, 1, 100, 10);

        assert!(!side.remove_level_if_empty(Price::from_ticks(100)));
        assert!(!side.remove_level_if_empty(Price::from_ticks(55)));
        assert_eq!(side.level_count(), 1);
    }

    #[test]
    fn test_level_slot_reuse() {
        let mut pool = OrderPool::with_capacity(8);
        let mut side = BookSide::new(Side::Buy, 8);

        let a = rest(&mut side, &mut pool, 1, 100, 10);
        let first = pool[a].level();
        side.remove_order(a, &mut pool);
        side.remove_level_if_empty(Price::from_ticks(100));
        pool.remove(a);

        let b = rest(&mut side, &mut pool, 2, 120, 10);
        assert_eq!(pool[b].level(), first);
        assert_eq!(side.best_price(), Some(Price::from_ticks(120)));
        assert!(side.verify(&pool).is_ok());
    }

    #[test]
    fn test_prices_cross() {
        let p100 = Price::from_ticks(100);
        let p101 = Price::from_ticks(101);
        assert!(prices_cross(Side::Buy, p101, p100));
        assert!(prices_cross(Side::Buy, p100, p100));
        assert!(!prices_cross(Side::Buy, p100, p101));
        assert!(prices_cross(Side::Sell, p100, p101));
        assert!(prices_cross(Side::Sell, p100, p100));
        assert!(!prices_cross(Side::Sell, p101, p100));
    }

    #[test]
    fn test_book_spread() {
        let mut pool = OrderPool::with_capacity(8);
        let mut book = OrderBook::new(8);

        rest(&mut book.bids, &mut pool, 1, 100, 100);
        rest(&mut book.asks, &mut pool, 2, 101, 100);

        assert_eq!(book.best_bid(), Some(Price::from_ticks(100)));
        assert_eq!(book.best_ask(), Some(Price::from_ticks(101)));
        assert_eq!(book.spread(), Some(Price::from_ticks(1)));
        assert_eq!(book.midpoint(), Some(Price::from_raw(10_050)));
    }
}
