//! Matching engine core.
//!
//! This is THE hot path. The matching algorithm implements price-time
//! priority: better-priced levels are exhausted first, and within a level
//! the oldest order fills first. Trades always print at the resting
//! order's price.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::book::{prices_cross, DepthLevel, OrderBook};
use crate::config::EngineConfig;
use crate::error::{EngineError, InvariantViolation, RejectReason};
use crate::fixed::{Price, Quantity};
use crate::order::{Order, OrderId, OrderRequest, Side};
use crate::pool::{OrderHandle, OrderPool};

/// Execution report for a single fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Monotonic trade counter for audit ordering.
    pub sequence: u64,
    /// Incoming order that initiated the match.
    pub taker_order_id: OrderId,
    /// Resting order that was matched.
    pub maker_order_id: OrderId,
    /// Side the maker rested on.
    pub maker_side: Side,
    /// Execution price (the maker's level price).
    pub price: Price,
    /// Execution quantity.
    pub quantity: Quantity,
}

impl Trade {
    /// Side of the incoming order.
    #[inline(always)]
    pub const fn taker_side(&self) -> Side {
        self.maker_side.opposite()
    }

    /// The buying order of this trade.
    #[inline(always)]
    pub const fn buy_order_id(&self) -> OrderId {
        match self.maker_side {
            Side::Buy => self.maker_order_id,
            Side::Sell => self.taker_order_id,
        }
    }

    /// The selling order of this trade.
    #[inline(always)]
    pub const fn sell_order_id(&self) -> OrderId {
        match self.maker_side {
            Side::Buy => self.taker_order_id,
            Side::Sell => self.maker_order_id,
        }
    }
}

/// Outcome classification of a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStatus {
    /// Order fully filled, nothing rests.
    Filled,
    /// Order partially filled, rest resting on book.
    PartiallyFilled,
    /// Order resting on book (no matches).
    Resting,
}

/// Result of an accepted order submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Identifier assigned to the incoming order.
    pub order_id: OrderId,
    /// Trades in execution order.
    pub trades: Vec<Trade>,
    /// Size left resting in the book (zero if fully filled).
    pub resting_qty: Quantity,
}

impl Submission {
    /// Id of the resting remainder, if any size rests.
    #[inline]
    pub fn resting_order_id(&self) -> Option<OrderId> {
        (!self.resting_qty.is_zero()).then_some(self.order_id)
    }

    /// Total size executed.
    pub fn filled_qty(&self) -> Quantity {
        self.trades.iter().map(|t| t.quantity).sum()
    }

    /// Classify the outcome.
    pub fn status(&self) -> FillStatus {
        match (self.trades.is_empty(), self.resting_qty.is_zero()) {
            (_, true) => FillStatus::Filled,
            (false, false) => FillStatus::PartiallyFilled,
            (true, false) => FillStatus::Resting,
        }
    }
}

/// Immutable, self-consistent view of the book at one revision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Engine revision this snapshot was taken at.
    pub revision: u64,
    /// Best bid price.
    pub best_bid: Option<Price>,
    /// Best ask price.
    pub best_ask: Option<Price>,
    /// Bid levels, best (highest) first.
    pub bids: Vec<DepthLevel>,
    /// Ask levels, best (lowest) first.
    pub asks: Vec<DepthLevel>,
}

impl BookSnapshot {
    /// Depth of one side.
    pub fn depth(&self, side: Side) -> &[DepthLevel] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }
}

/// The matching engine for one instrument.
///
/// Owns both book sides and the order arena. All mutation goes through
/// `submit` and `cancel`, which take `&mut self`; callers sharing an engine
/// across threads must serialize those calls (see `meridian-sequencer`).
#[derive(Debug)]
pub struct MatchingEngine {
    /// The order book.
    book: OrderBook,
    /// Storage for resting orders.
    pool: OrderPool,
    /// Resting order lookup for cancellation.
    orders: HashMap<OrderId, OrderHandle>,
    /// Last assigned order id.
    last_order_id: u64,
    /// Last assigned arrival sequence.
    last_sequence: u64,
    /// Last assigned trade sequence.
    last_trade_sequence: u64,
    /// Bumped on every successful mutation.
    revision: u64,
}

impl MatchingEngine {
    /// Create a new matching engine.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            book: OrderBook::new(config.level_capacity),
            pool: OrderPool::with_capacity(config.order_capacity),
            orders: HashMap::with_capacity(config.order_capacity),
            last_order_id: 0,
            last_sequence: 0,
            last_trade_sequence: 0,
            revision: 0,
        }
    }

    /// Submit a limit order.
    ///
    /// Validation failures leave the book untouched. Otherwise the order is
    /// matched against the opposing side and any remainder rests.
    pub fn submit(&mut self, request: OrderRequest) -> Result<Submission, EngineError> {
        // === VALIDATION ===
        if let Err(reason) = self.validate(&request) {
            warn!(side = %request.side, price = %request.price, quantity = %request.quantity, %reason, "order rejected");
            return Err(EngineError::InvalidOrder(reason));
        }

        self.last_order_id += 1;
        self.last_sequence += 1;
        let mut order = Order::new(
            OrderId(self.last_order_id),
            request.side,
            request.price,
            request.quantity,
            self.last_sequence,
        );

        // === MATCHING ===
        let mut trades = Vec::new();
        self.match_order(&mut order, &mut trades);

        // === POST-MATCH HANDLING ===
        let resting_qty = order.remaining_qty;
        if !resting_qty.is_zero() {
            self.add_to_book(order);
        }
        self.revision += 1;

        debug!(
            order_id = %order.id,
            side = %order.side,
            price = %order.price,
            quantity = %order.original_qty,
            trades = trades.len(),
            resting = %resting_qty,
            "order accepted"
        );

        Ok(Submission { order_id: order.id, trades, resting_qty })
    }

    /// Minimal, fast-fail request validation.
    ///
    /// Matching only drains the opposing side, so the resident side can grow
    /// by at most the request's quantity. Checking that sum up front keeps
    /// every level and side total exact.
    #[inline(always)]
    fn validate(&self, request: &OrderRequest) -> Result<(), RejectReason> {
        if request.quantity.is_zero() {
            return Err(RejectReason::ZeroQuantity);
        }
        if request.price.is_zero() {
            return Err(RejectReason::ZeroPrice);
        }
        let resident = self.book.side(request.side).total_qty();
        if resident.0.checked_add(request.quantity.0).is_none() {
            return Err(RejectReason::VolumeOverflow);
        }
        Ok(())
    }

    /// Core matching loop.
    ///
    /// Walks the opposing side best level first, filling the head of each
    /// level's queue until the taker is done or prices stop crossing.
    fn match_order(&mut self, taker: &mut Order, trades: &mut Vec<Trade>) {
        let Self { book, pool, orders, last_trade_sequence, .. } = self;
        let opposing = book.side_mut(taker.side.opposite());

        while !taker.remaining_qty.is_zero() {
            let Some(level) = opposing.best_level_mut() else {
                break; // No liquidity
            };
            let level_price = level.price();
            if !prices_cross(taker.side, taker.price, level_price) {
                break;
            }
            let Some(maker_handle) = level.front() else {
                debug_assert!(false, "empty level {} left in book", level_price);
                break;
            };

            // Execute fill
            let maker = &mut pool[maker_handle];
            let fill_qty = taker.remaining_qty.min(maker.remaining_qty);
            maker.fill(fill_qty);
            taker.fill(fill_qty);
            let maker_id = maker.id;
            let maker_side = maker.side;
            let maker_done = maker.is_filled();

            *last_trade_sequence += 1;
            let trade = Trade {
                sequence: *last_trade_sequence,
                taker_order_id: taker.id,
                maker_order_id: maker_id,
                maker_side,
                price: level_price,
                quantity: fill_qty,
            };
            trace!(
                trade = trade.sequence,
                taker = %trade.taker_order_id,
                maker = %trade.maker_order_id,
                price = %trade.price,
                quantity = %trade.quantity,
                "fill"
            );
            trades.push(trade);

            // Update level
            level.reduce_qty(fill_qty);
            if maker_done {
                level.pop_front(pool);
            }
            let level_empty = level.is_empty();

            opposing.reduce_qty(fill_qty);
            if maker_done {
                opposing.decrement_order_count();
                pool.remove(maker_handle);
                orders.remove(&maker_id);
            }
            if level_empty {
                opposing.remove_level_if_empty(level_price);
            }
        }
    }

    /// Rest an order's remainder on its own side.
    fn add_to_book(&mut self, order: Order) {
        let handle = self.pool.insert(order);
        self.book.side_mut(order.side).insert_order(handle, &mut self.pool);
        self.orders.insert(order.id, handle);
    }

    /// Cancel a resting order, returning it as it was at removal time.
    ///
    /// Fails with `NotFound` for unknown, filled or already canceled ids.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<Order, EngineError> {
        let Some(&handle) = self.orders.get(&order_id) else {
            debug!(order_id = %order_id, "cancel of unknown order");
            return Err(EngineError::NotFound(order_id));
        };
        let (side, price) = {
            let order = &self.pool[handle];
            (order.side, order.price)
        };

        let book_side = self.book.side_mut(side);
        book_side
            .remove_order(handle, &mut self.pool)
            .ok_or(EngineError::NotFound(order_id))?;
        book_side.remove_level_if_empty(price);

        self.orders.remove(&order_id);
        let order = self.pool.remove(handle).ok_or(EngineError::NotFound(order_id))?;
        self.revision += 1;

        debug!(order_id = %order_id, side = %side, price = %price, remaining = %order.remaining_qty, "order canceled");
        Ok(order)
    }

    /// Get best bid price.
    #[inline(always)]
    pub fn best_bid(&self) -> Option<Price> {
        self.book.best_bid()
    }

    /// Get best ask price.
    #[inline(always)]
    pub fn best_ask(&self) -> Option<Price> {
        self.book.best_ask()
    }

    /// Get the spread (best ask - best bid).
    pub fn spread(&self) -> Option<Price> {
        self.book.spread()
    }

    /// Get midpoint price.
    pub fn midpoint(&self) -> Option<Price> {
        self.book.midpoint()
    }

    /// Aggregated levels of one side, best first.
    pub fn depth(&self, side: Side, max_levels: usize) -> Vec<DepthLevel> {
        self.book.side(side).depth(max_levels)
    }

    /// Capture a consistent view of the top `max_levels` of each side.
    pub fn snapshot(&self, max_levels: usize) -> BookSnapshot {
        BookSnapshot {
            revision: self.revision,
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            bids: self.depth(Side::Buy, max_levels),
            asks: self.depth(Side::Sell, max_levels),
        }
    }

    /// Look up a resting order.
    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        let handle = *self.orders.get(&order_id)?;
        self.pool.get(handle)
    }

    /// Number of resting orders.
    #[inline(always)]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Number of trades emitted so far.
    #[inline(always)]
    pub fn trade_count(&self) -> u64 {
        self.last_trade_sequence
    }

    /// Mutation counter.
    #[inline(always)]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Read access to the book.
    #[inline(always)]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Check every structural invariant of the book.
    ///
    /// Walks all levels and orders, so this is O(book size).
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.book.bids.verify(&self.pool)?;
        self.book.asks.verify(&self.pool)?;

        for (&id, &handle) in &self.orders {
            match self.pool.get(handle) {
                Some(order) if order.id == id && order.is_resting() => {}
                _ => return Err(InvariantViolation::OrderIndex { id }),
            }
        }
        if let Some((_, order)) = self.pool.iter().find(|(_, o)| !self.orders.contains_key(&o.id)) {
            return Err(InvariantViolation::OrderIndex { id: order.id });
        }

        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return Err(InvariantViolation::Crossed { bid, ask });
            }
        }
        Ok(())
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
