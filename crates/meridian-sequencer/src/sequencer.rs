//! Single-writer sequencer.
//!
//! One thread owns the `MatchingEngine` and applies commands in the order
//! they leave a bounded queue. Readers see the book through an immutable
//! snapshot that is swapped after every mutating command, before the
//! command's reply is sent.

use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use meridian_core::{
    BookSnapshot, DepthLevel, EngineError, MatchingEngine, Order, OrderId, OrderRequest, Price, Side, Submission,
};
use tracing::{debug, info, warn};

use crate::config::SequencerConfig;
use crate::error::SequencerError;

type Reply<T> = Sender<Result<T, EngineError>>;

/// Work item for the sequencer thread.
enum Command {
    Submit { request: OrderRequest, reply: Reply<Submission> },
    Cancel { order_id: OrderId, reply: Reply<Order> },
    Shutdown,
}

/// Latest published snapshot, swapped wholesale by the sequencer thread.
type Published = Arc<RwLock<Arc<BookSnapshot>>>;

/// An enqueued command whose result has not been collected yet.
#[must_use = "the command's result is only observable through `wait`"]
pub struct Pending<T> {
    reply: Receiver<Result<T, EngineError>>,
}

impl<T> Pending<T> {
    /// Block until the sequencer has applied the command.
    pub fn wait(self) -> Result<T, SequencerError> {
        match self.reply.recv() {
            Ok(result) => result.map_err(SequencerError::from),
            Err(_) => Err(SequencerError::Disconnected),
        }
    }
}

/// Cloneable producer and reader endpoint.
#[derive(Clone)]
pub struct SequencerHandle {
    commands: Sender<Command>,
    published: Published,
    instrument: Arc<str>,
}

impl SequencerHandle {
    /// Submit an order and wait for its execution report.
    ///
    /// Blocks while the queue is full.
    pub fn submit(&self, request: OrderRequest) -> Result<Submission, SequencerError> {
        let (reply, pending) = reply_channel();
        self.commands
            .send(Command::Submit { request, reply })
            .map_err(|_| SequencerError::Disconnected)?;
        pending.wait()
    }

    /// Enqueue an order without blocking.
    ///
    /// Fails with `Overloaded` if the queue is full; the order was not
    /// enqueued and the book is untouched.
    pub fn try_submit(&self, request: OrderRequest) -> Result<Pending<Submission>, SequencerError> {
        let (reply, pending) = reply_channel();
        match self.commands.try_send(Command::Submit { request, reply }) {
            Ok(()) => Ok(pending),
            Err(TrySendError::Full(_)) => {
                warn!(instrument = %self.instrument, "sequencer queue full, order refused");
                Err(SequencerError::Overloaded)
            }
            Err(TrySendError::Disconnected(_)) => Err(SequencerError::Disconnected),
        }
    }

    /// Cancel a resting order and wait for the result.
    pub fn cancel(&self, order_id: OrderId) -> Result<Order, SequencerError> {
        let (reply, pending) = reply_channel();
        self.commands
            .send(Command::Cancel { order_id, reply })
            .map_err(|_| SequencerError::Disconnected)?;
        pending.wait()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<BookSnapshot> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Best bid in the latest snapshot.
    pub fn best_bid(&self) -> Option<Price> {
        self.snapshot().best_bid
    }

    /// Best ask in the latest snapshot.
    pub fn best_ask(&self) -> Option<Price> {
        self.snapshot().best_ask
    }

    /// Published depth of one side, best first.
    pub fn depth(&self, side: Side) -> Vec<DepthLevel> {
        self.snapshot().depth(side).to_vec()
    }

    /// Instrument this sequencer serves.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }
}

fn reply_channel<T>() -> (Reply<T>, Pending<T>) {
    let (reply, receiver) = bounded(1);
    (reply, Pending { reply: receiver })
}

/// Owner of the sequencer thread.
///
/// Dropping it stops the thread after the commands already queued ahead of
/// the stop request have been applied.
pub struct Sequencer {
    handle: SequencerHandle,
    thread: Option<JoinHandle<MatchingEngine>>,
}

impl Sequencer {
    /// Move `engine` onto a new sequencer thread.
    pub fn start(engine: MatchingEngine, config: SequencerConfig) -> Result<Self, SequencerError> {
        let (commands, receiver) = bounded(config.queue_capacity.max(1));
        let published: Published = Arc::new(RwLock::new(Arc::new(engine.snapshot(config.snapshot_depth))));
        let instrument: Arc<str> = Arc::from(config.instrument.as_str());

        let thread = {
            let published = Arc::clone(&published);
            let instrument = Arc::clone(&instrument);
            let depth = config.snapshot_depth;
            thread::Builder::new()
                .name(format!("sequencer-{}", instrument))
                .spawn(move || run(engine, receiver, published, depth, instrument))?
        };

        info!(instrument = %config.instrument, queue_capacity = config.queue_capacity, "sequencer started");
        Ok(Self {
            handle: SequencerHandle { commands, published, instrument },
            thread: Some(thread),
        })
    }

    /// A new producer/reader endpoint.
    pub fn handle(&self) -> SequencerHandle {
        self.handle.clone()
    }

    /// Stop the thread and take the engine back.
    ///
    /// Commands enqueued before this call are applied first. Commands that
    /// other handles enqueue afterwards fail with `Disconnected`.
    pub fn shutdown(mut self) -> Result<MatchingEngine, SequencerError> {
        self.stop().ok_or(SequencerError::Disconnected)?
    }

    fn stop(&mut self) -> Option<Result<MatchingEngine, SequencerError>> {
        let thread = self.thread.take()?;
        // A send error means the thread already exited; join reports why.
        let _ = self.handle.commands.send(Command::Shutdown);
        Some(thread.join().map_err(|_| SequencerError::Panicked))
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        if let Some(Err(err)) = self.stop() {
            warn!(instrument = %self.handle.instrument, %err, "sequencer stopped abnormally");
        }
    }
}

/// The single consumer loop.
fn run(
    mut engine: MatchingEngine,
    commands: Receiver<Command>,
    published: Published,
    depth: usize,
    instrument: Arc<str>,
) -> MatchingEngine {
    let mut processed = 0u64;

    while let Ok(command) = commands.recv() {
        let revision = engine.revision();
        // Publish before replying: a caller's next read must see its own command.
        match command {
            Command::Submit { request, reply } => {
                let result = engine.submit(request);
                publish(&engine, revision, &published, depth);
                // The caller may have given up waiting; the command still applies.
                let _ = reply.send(result);
            }
            Command::Cancel { order_id, reply } => {
                let result = engine.cancel(order_id);
                publish(&engine, revision, &published, depth);
                let _ = reply.send(result);
            }
            Command::Shutdown => break,
        }
        processed += 1;
    }

    debug!(instrument = %instrument, processed, "sequencer queue drained");
    info!(instrument = %instrument, resting = engine.order_count(), "sequencer stopped");
    engine
}

/// Swap in a fresh snapshot if the engine moved past `revision`.
fn publish(engine: &MatchingEngine, revision: u64, published: &Published, depth: usize) {
    if engine.revision() == revision {
        return;
    }
    let snapshot = Arc::new(engine.snapshot(depth));
    *published.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
}
