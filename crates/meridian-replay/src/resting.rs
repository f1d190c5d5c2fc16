//! Client-side view of the orders a producer has resting in the book.
//!
//! Fills reported in a submission's trades drain the makers they hit, so
//! cancels only target orders that are still open as far as this producer
//! has seen.

use std::collections::HashMap;

use meridian_core::{OrderId, Quantity, Submission};

#[derive(Debug, Default)]
pub struct RestingOrders {
    /// Open ids, in no particular order, for uniform picking.
    ids: Vec<OrderId>,
    /// Position in `ids` and open quantity of each tracked order.
    open: HashMap<OrderId, (usize, Quantity)>,
}

impl RestingOrders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a submission's fills, then track its remainder if it rested.
    pub fn on_submission(&mut self, submission: &Submission) {
        for trade in &submission.trades {
            self.on_fill(trade.maker_order_id, trade.quantity);
        }
        if let Some(order_id) = submission.resting_order_id() {
            self.insert(order_id, submission.resting_qty);
        }
    }

    pub fn insert(&mut self, order_id: OrderId, quantity: Quantity) {
        if quantity.is_zero() {
            return;
        }
        self.open.insert(order_id, (self.ids.len(), quantity));
        self.ids.push(order_id);
    }

    /// Drain `quantity` from a tracked maker. Unknown ids belong to someone else.
    pub fn on_fill(&mut self, order_id: OrderId, quantity: Quantity) {
        let Some((_, remaining)) = self.open.get_mut(&order_id) else {
            return;
        };
        *remaining = remaining.saturating_sub(quantity);
        if remaining.is_zero() {
            self.remove(order_id);
        }
    }

    /// Stop tracking one order, chosen by `pick`, and return it.
    pub fn take(&mut self, pick: u64) -> Option<OrderId> {
        if self.ids.is_empty() {
            return None;
        }
        let order_id = self.ids[(pick % self.ids.len() as u64) as usize];
        self.remove(order_id)
    }

    fn remove(&mut self, order_id: OrderId) -> Option<OrderId> {
        let (idx, _) = self.open.remove(&order_id)?;
        self.ids.swap_remove(idx);
        // The former tail now sits at `idx`.
        if let Some(moved) = self.ids.get(idx) {
            if let Some(entry) = self.open.get_mut(moved) {
                entry.0 = idx;
            }
        }
        Some(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(ids: &[u64]) -> RestingOrders {
        let mut resting = RestingOrders::new();
        for &id in ids {
            resting.insert(OrderId(id), Quantity(10));
        }
        resting
    }

    #[test]
    fn test_take_swaps_tail_into_hole() {
        let mut resting = tracked(&[1, 2, 3]);
        assert_eq!(resting.take(4), Some(OrderId(2)));
        assert_eq!(resting.ids, vec![OrderId(1), OrderId(3)]);
        assert_eq!(resting.open[&OrderId(3)].0, 1);

        assert_eq!(resting.take(1), Some(OrderId(3)));
        assert_eq!(resting.take(0), Some(OrderId(1)));
        assert_eq!(resting.take(7), None);
    }

    #[test]
    fn test_filled_makers_are_dropped() {
        let mut resting = tracked(&[1, 2, 3]);

        resting.on_fill(OrderId(1), Quantity(4));
        assert_eq!(resting.open[&OrderId(1)].1, Quantity(6));

        resting.on_fill(OrderId(1), Quantity(6));
        assert!(!resting.open.contains_key(&OrderId(1)));
        assert_eq!(resting.ids.len(), 2);
        assert_eq!(resting.open[&OrderId(3)].0, 0);

        // Someone else's maker
        resting.on_fill(OrderId(99), Quantity(1));
        assert_eq!(resting.ids.len(), 2);

        let mut left: Vec<_> = (0..2).filter_map(|_| resting.take(0)).collect();
        left.sort_by_key(|id| id.0);
        assert_eq!(left, vec![OrderId(2), OrderId(3)]);
    }

    #[test]
    fn test_zero_quantity_is_not_tracked() {
        let mut resting = RestingOrders::new();
        resting.insert(OrderId(5), Quantity::ZERO);
        assert_eq!(resting.take(0), None);
    }
}
