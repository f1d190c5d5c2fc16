//! Many producers, one book.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use meridian_core::{MatchingEngine, OrderRequest, Price, Quantity, Side};
use meridian_sequencer::{Sequencer, SequencerConfig, SequencerError};

const PRODUCERS: u64 = 4;
const ORDERS_PER_PRODUCER: u64 = 500;

fn config(queue_capacity: usize) -> SequencerConfig {
    SequencerConfig {
        instrument: "TEST".to_string(),
        queue_capacity,
        snapshot_depth: 5,
    }
}

#[test]
fn concurrent_producers_never_cross_the_book() {
    let sequencer = Sequencer::start(MatchingEngine::default(), config(64)).unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let handle = sequencer.handle();
            thread::spawn(move || {
                let mut submitted = 0u64;
                let mut traded = 0u64;
                for i in 0..ORDERS_PER_PRODUCER {
                    let side = if (i + p) % 2 == 0 { Side::Buy } else { Side::Sell };
                    let request = OrderRequest {
                        side,
                        price: Price::from_ticks(100 + (i * 7 + p) % 5),
                        quantity: Quantity(1 + i % 4),
                    };
                    let result = handle.submit(request).unwrap();
                    submitted += request.quantity.0;
                    traded += result.filled_qty().0;
                }
                (submitted, traded)
            })
        })
        .collect();

    let mut submitted = 0;
    let mut traded_by_takers = 0;
    for producer in producers {
        let (s, t) = producer.join().unwrap();
        submitted += s;
        traded_by_takers += t;
    }

    let engine = sequencer.shutdown().unwrap();
    engine.verify().unwrap();

    // Each traded unit consumed one unit from a taker and one from a maker.
    let resting = engine.book().bids.total_qty().0 + engine.book().asks.total_qty().0;
    assert_eq!(submitted, resting + 2 * traded_by_takers);
    assert_eq!(engine.revision(), PRODUCERS * ORDERS_PER_PRODUCER);
}

#[test]
fn readers_only_see_uncrossed_snapshots() {
    let sequencer = Sequencer::start(MatchingEngine::default(), config(16)).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let handle = sequencer.handle();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last_revision = 0;
            while !done.load(Ordering::Acquire) {
                let snapshot = handle.snapshot();
                assert!(snapshot.revision >= last_revision);
                last_revision = snapshot.revision;
                if let (Some(bid), Some(ask)) = (snapshot.best_bid, snapshot.best_ask) {
                    assert!(bid < ask, "crossed snapshot {bid} / {ask}");
                }
                assert!(snapshot.bids.windows(2).all(|w| w[0].price > w[1].price));
                assert!(snapshot.asks.windows(2).all(|w| w[0].price < w[1].price));
            }
        })
    };

    let writer = {
        let handle = sequencer.handle();
        thread::spawn(move || {
            for i in 0..2_000u64 {
                let request = if i % 2 == 0 {
                    OrderRequest::buy(Price::from_ticks(95 + i % 7), Quantity(2))
                } else {
                    OrderRequest::sell(Price::from_ticks(97 + i % 7), Quantity(3))
                };
                let result = handle.submit(request).unwrap();
                if i % 5 == 0 {
                    if let Some(id) = result.resting_order_id() {
                        handle.cancel(id).unwrap();
                    }
                }
            }
        })
    };

    writer.join().unwrap();
    done.store(true, Ordering::Release);
    reader.join().unwrap();

    sequencer.shutdown().unwrap().verify().unwrap();
}

#[test]
fn try_submit_results_arrive_in_queue_order() {
    let sequencer = Sequencer::start(MatchingEngine::default(), config(1024)).unwrap();
    let handle = sequencer.handle();

    let mut pending = Vec::new();
    for _ in 0..100 {
        match handle.try_submit(OrderRequest::sell(Price::from_ticks(100), Quantity(1))) {
            Ok(p) => pending.push(p),
            Err(SequencerError::Overloaded) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let ids: Vec<_> = pending.into_iter().map(|p| p.wait().unwrap().order_id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let taker = handle
        .submit(OrderRequest::buy(Price::from_ticks(100), Quantity(ids.len() as u64)))
        .unwrap();
    let makers: Vec<_> = taker.trades.iter().map(|t| t.maker_order_id).collect();
    assert_eq!(makers, ids);
}
