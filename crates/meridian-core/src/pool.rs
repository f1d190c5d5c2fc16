//! Arena for resting orders.
//!
//! Orders live in a slab of slots addressed by `OrderHandle`. Freed slots
//! go on a LIFO free list for better cache locality on reuse. Each slot also
//! carries the intrusive FIFO links used by `PriceLevel`, so a level never
//! owns order memory and never holds a pointer into it.

use core::ops::{Index, IndexMut};

use crate::order::Order;

/// Index into the order pool.
///
/// Uses u32 to save space (supports up to 4 billion live slots).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OrderHandle(pub u32);

impl OrderHandle {
    /// Get raw index.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A pooled order plus its position in a level queue.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Entry {
    pub(crate) order: Order,
    pub(crate) prev: Option<OrderHandle>,
    pub(crate) next: Option<OrderHandle>,
}

/// Growable pool of orders.
///
/// Unlike a fixed-capacity pool an insert never fails, which keeps
/// `submit` free of any failure mode after matching has started.
#[derive(Debug, Default)]
pub struct OrderPool {
    /// Storage for orders. `None` marks a free slot.
    slots: Vec<Option<Entry>>,
    /// LIFO free list for O(1) alloc/dealloc.
    free_list: Vec<u32>,
    /// Number of live orders.
    active_count: usize,
}

impl OrderPool {
    /// Create a pool with room for `capacity` orders before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            active_count: 0,
        }
    }

    /// Store an order and return its handle.
    #[inline]
    pub fn insert(&mut self, order: Order) -> OrderHandle {
        let entry = Entry { order, prev: None, next: None };
        self.active_count += 1;

        if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(entry);
            return OrderHandle(idx);
        }

        debug_assert!(self.slots.len() < u32::MAX as usize, "Order pool overflow");
        let idx = self.slots.len() as u32;
        self.slots.push(Some(entry));
        OrderHandle(idx)
    }

    /// Remove an order, returning its slot to the free list.
    #[inline]
    pub fn remove(&mut self, handle: OrderHandle) -> Option<Order> {
        let entry = self.slots.get_mut(handle.index())?.take()?;
        self.free_list.push(handle.0);
        self.active_count -= 1;
        Some(entry.order)
    }

    /// Get immutable reference to order.
    #[inline(always)]
    pub fn get(&self, handle: OrderHandle) -> Option<&Order> {
        self.slots
            .get(handle.index())
            .and_then(Option::as_ref)
            .map(|entry| &entry.order)
    }

    /// Get mutable reference to order.
    #[inline(always)]
    pub fn get_mut(&mut self, handle: OrderHandle) -> Option<&mut Order> {
        self.slots
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .map(|entry| &mut entry.order)
    }

    /// Slot access for queue linking.
    ///
    /// # Panics
    /// Panics if the handle does not refer to a live order.
    #[inline(always)]
    pub(crate) fn entry(&self, handle: OrderHandle) -> &Entry {
        match self.slots.get(handle.index()) {
            Some(Some(entry)) => entry,
            _ => panic!("dangling order handle {:?}", handle),
        }
    }

    /// Mutable slot access for queue linking.
    ///
    /// # Panics
    /// Panics if the handle does not refer to a live order.
    #[inline(always)]
    pub(crate) fn entry_mut(&mut self, handle: OrderHandle) -> &mut Entry {
        match self.slots.get_mut(handle.index()) {
            Some(Some(entry)) => entry,
            _ => panic!("dangling order handle {:?}", handle),
        }
    }

    /// Iterate over live orders in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (OrderHandle, &Order)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref().map(|entry| (OrderHandle(idx as u32), &entry.order))
        })
    }

    /// Number of live orders.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.active_count
    }

    /// Check if pool holds no orders.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.active_count == 0
    }

    /// Number of slots ever allocated (live + free).
    #[inline(always)]
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    /// Slots available before the backing storage reallocates.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Number of free slots ready for reuse.
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.free_list.len()
    }
}

impl Index<OrderHandle> for OrderPool {
    type Output = Order;

    #[inline(always)]
    fn index(&self, handle: OrderHandle) -> &Order {
        &self.entry(handle).order
    }
}

impl IndexMut<OrderHandle> for OrderPool {
    #[inline(always)]
    fn index_mut(&mut self, handle: OrderHandle) -> &mut Order {
        &mut self.entry_mut(handle).order
    }
}
