//! Property tests: random order flow must never break the book.

use meridian_core::{EngineError, MatchingEngine, OrderId, OrderRequest, Price, Quantity, Side};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Submit { side: Side, ticks: u64, qty: u64 },
    Cancel { pick: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<bool>(), 95u64..=105, 1u64..=20).prop_map(|(is_buy, ticks, qty)| Op::Submit {
            side: if is_buy { Side::Buy } else { Side::Sell },
            ticks,
            qty,
        }),
        1 => any::<usize>().prop_map(|pick| Op::Cancel { pick }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn random_flow_preserves_invariants(ops in prop::collection::vec(op(), 1..200)) {
        let mut engine = MatchingEngine::default();
        let mut issued: Vec<OrderId> = Vec::new();

        for op in ops {
            match op {
                Op::Submit { side, ticks, qty } => {
                    let limit = Price::from_ticks(ticks);
                    let result = engine
                        .submit(OrderRequest { side, price: limit, quantity: Quantity(qty) })
                        .unwrap();

                    // Conservation: filled + resting == requested
                    prop_assert_eq!(result.filled_qty().0 + result.resting_qty.0, qty);

                    // Every trade respects the taker's limit
                    for trade in &result.trades {
                        match side {
                            Side::Buy => prop_assert!(trade.price <= limit),
                            Side::Sell => prop_assert!(trade.price >= limit),
                        }
                        prop_assert_eq!(trade.taker_order_id, result.order_id);
                        prop_assert_eq!(trade.maker_side, side.opposite());
                    }

                    // Trades never get better for the taker as the sweep proceeds
                    for pair in result.trades.windows(2) {
                        match side {
                            Side::Buy => prop_assert!(pair[0].price <= pair[1].price),
                            Side::Sell => prop_assert!(pair[0].price >= pair[1].price),
                        }
                    }
                    issued.push(result.order_id);
                }
                Op::Cancel { pick } => {
                    if issued.is_empty() {
                        continue;
                    }
                    let id = issued[pick % issued.len()];
                    let was_resting = engine.order(id).copied();
                    match engine.cancel(id) {
                        Ok(order) => {
                            let expected = was_resting.map(|o| o.remaining_qty);
                            prop_assert_eq!(Some(order.remaining_qty), expected);
                        }
                        Err(err) => {
                            prop_assert_eq!(err, EngineError::NotFound(id));
                            prop_assert!(was_resting.is_none());
                        }
                    }
                    prop_assert!(engine.order(id).is_none());
                }
            }

            engine.verify().map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
    }

    #[test]
    fn same_price_orders_fill_in_arrival_order(sizes in prop::collection::vec(1u64..=10, 2..20)) {
        let mut engine = MatchingEngine::default();
        let price = Price::from_ticks(100);
        let makers: Vec<OrderId> = sizes
            .iter()
            .map(|&qty| engine.submit(OrderRequest::sell(price, Quantity(qty))).unwrap().order_id)
            .collect();

        let total: u64 = sizes.iter().sum();
        let result = engine.submit(OrderRequest::buy(price, Quantity(total))).unwrap();

        let filled: Vec<OrderId> = result.trades.iter().map(|t| t.maker_order_id).collect();
        prop_assert_eq!(filled, makers);
        prop_assert!(engine.book().is_empty());
    }
}
