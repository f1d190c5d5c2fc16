//! Deterministic synthetic order flow.
//!
//! Every action is a pure function of its step number, so the same step
//! range always produces the same flow.

use meridian_core::{OrderRequest, Price, Quantity, Side};

/// Reference price around which the flow is built, in ticks.
pub const MID_TICKS: u64 = 10_000;

/// One step of the workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Submit(OrderRequest),
    /// Cancel one of the caller's resting orders, chosen by `pick`.
    Cancel { pick: u64 },
}

#[derive(Clone, Copy, Debug)]
pub struct Workload {
    cancel_every: u64,
}

impl Workload {
    /// `cancel_every = 0` disables cancels.
    pub fn new(cancel_every: u64) -> Self {
        Self { cancel_every }
    }

    pub fn action(&self, step: u64) -> Action {
        if self.cancel_every > 0 && step % self.cancel_every == self.cancel_every - 1 {
            return Action::Cancel { pick: step.wrapping_mul(31) };
        }

        let offset = 1 + step % 20;
        let quantity = Quantity(10 * (1 + step % 9));
        let (side, ticks) = match step % 10 {
            0..=4 => (Side::Buy, MID_TICKS - offset),  // passive bids
            5..=7 => (Side::Sell, MID_TICKS + offset), // passive asks
            8 => (Side::Buy, MID_TICKS + 5),           // aggressive
            _ => (Side::Sell, MID_TICKS - 5),          // aggressive
        };
        Action::Submit(OrderRequest {
            side,
            price: Price::from_ticks(ticks),
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_is_deterministic() {
        let a = Workload::new(7);
        let b = Workload::new(7);
        for step in 0..1_000 {
            assert_eq!(a.action(step), b.action(step));
        }
    }

    #[test]
    fn test_cancel_cadence() {
        let workload = Workload::new(4);
        let cancels = (0..100).filter(|&s| matches!(workload.action(s), Action::Cancel { .. })).count();
        assert_eq!(cancels, 25);

        let no_cancels = Workload::new(0);
        assert!((0..100).all(|s| matches!(no_cancels.action(s), Action::Submit(_))));
    }

    #[test]
    fn test_requests_are_valid() {
        let workload = Workload::new(0);
        for step in 0..100 {
            if let Action::Submit(request) = workload.action(step) {
                assert!(!request.quantity.is_zero());
                assert!(!request.price.is_zero());
            }
        }
    }
}
