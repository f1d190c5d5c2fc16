//! Price level queue management.
//!
//! A price level contains all orders at a specific price,
//! organized as a FIFO queue (price-time priority).
//!
//! The queue is a doubly linked list threaded through the order pool:
//! O(1) append, O(1) pop from the front and O(1) removal of an arbitrary
//! order given its handle.

use crate::book::LevelHandle;
use crate::fixed::{Price, Quantity};
use crate::pool::{OrderHandle, OrderPool};

/// A single price level in the order book.
#[derive(Clone, Debug)]
pub struct PriceLevel {
    /// Price shared by every order in the queue.
    price: Price,
    /// Handle of this level in its book side.
    handle: LevelHandle,
    /// Total remaining quantity at this level.
    total_qty: Quantity,
    /// Number of orders at this level.
    order_count: usize,
    /// Oldest order (next to match).
    head: Option<OrderHandle>,
    /// Newest order.
    tail: Option<OrderHandle>,
}

impl PriceLevel {
    /// Create a new empty price level.
    pub(crate) fn new(price: Price, handle: LevelHandle) -> Self {
        Self {
            price,
            handle,
            total_qty: Quantity::ZERO,
            order_count: 0,
            head: None,
            tail: None,
        }
    }

    /// Price of this level.
    #[inline(always)]
    pub const fn price(&self) -> Price {
        self.price
    }

    /// Handle of this level in its book side.
    #[inline(always)]
    pub const fn handle(&self) -> LevelHandle {
        self.handle
    }

    /// Total remaining quantity resting at this level.
    #[inline(always)]
    pub const fn total_qty(&self) -> Quantity {
        self.total_qty
    }

    /// Check if level is empty.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Number of orders at this level.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.order_count
    }

    /// Append an order to the back of the queue.
    ///
    /// Sets the order's back-reference to this level and adds its
    /// remaining size to the level volume.
    pub fn push_back(&mut self, handle: OrderHandle, pool: &mut OrderPool) {
        let prev_tail = self.tail;
        {
            let entry = pool.entry_mut(handle);
            debug_assert!(entry.order.level.is_none(), "Order already rests in a level");
            debug_assert_eq!(entry.order.price, self.price, "Order price differs from level");
            entry.prev = prev_tail;
            entry.next = None;
            entry.order.level = Some(self.handle);
            self.total_qty = self.total_qty.saturating_add(entry.order.remaining_qty);
        }

        match prev_tail {
            Some(tail) => pool.entry_mut(tail).next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.order_count += 1;
    }

    /// Get front order handle (for matching).
    #[inline(always)]
    pub const fn front(&self) -> Option<OrderHandle> {
        self.head
    }

    /// Remove front order from queue.
    ///
    /// Note: Does NOT update total_qty. During matching the caller reduces
    /// volume fill by fill with `reduce_qty`, so a fully filled head has
    /// already been accounted for.
    pub fn pop_front(&mut self, pool: &mut OrderPool) -> Option<OrderHandle> {
        let handle = self.head?;
        self.unlink(handle, pool);
        Some(handle)
    }

    /// Remove an arbitrary order from the queue.
    ///
    /// Relative order of the remaining orders is preserved. The order's
    /// remaining size leaves the level volume and its back-reference is
    /// cleared. Returns the removed remaining size.
    pub fn remove(&mut self, handle: OrderHandle, pool: &mut OrderPool) -> Quantity {
        debug_assert_eq!(pool[handle].level, Some(self.handle), "Order does not rest here");
        let qty = pool[handle].remaining_qty;
        self.unlink(handle, pool);
        self.reduce_qty(qty);
        qty
    }

    /// Splice an order out of the list and clear its back-reference.
    fn unlink(&mut self, handle: OrderHandle, pool: &mut OrderPool) {
        let (prev, next) = {
            let entry = pool.entry_mut(handle);
            let links = (entry.prev, entry.next);
            entry.prev = None;
            entry.next = None;
            entry.order.level = None;
            links
        };

        match prev {
            Some(p) => pool.entry_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => pool.entry_mut(n).prev = prev,
            None => self.tail = prev,
        }
        self.order_count -= 1;
    }

    /// Update total quantity after a fill against this level.
    #[inline(always)]
    pub fn reduce_qty(&mut self, qty: Quantity) {
        debug_assert!(qty <= self.total_qty, "Level volume underflow");
        self.total_qty = self.total_qty.saturating_sub(qty);
    }

    /// Iterator over order handles, oldest first.
    pub fn iter<'a>(&self, pool: &'a OrderPool) -> PriceLevelIter<'a> {
        PriceLevelIter {
            pool,
            cursor: self.head,
            remaining: self.order_count,
        }
    }
}

/// Iterator over order handles in a price level.
pub struct PriceLevelIter<'a> {
    pool: &'a OrderPool,
    cursor: Option<OrderHandle>,
    remaining: usize,
}

impl<'a> Iterator for PriceLevelIter<'a> {
    type Item = OrderHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        self.cursor = self.pool.entry(handle).next;
        self.remaining = self.remaining.saturating_sub(1);
        Some(handle)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a> ExactSizeIterator for PriceLevelIter<'a> {}
