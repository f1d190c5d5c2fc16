//! # Meridian Sequencer
//!
//! Serializes all mutation of one instrument's `MatchingEngine` through a
//! single consumer thread.
//!
//! Producers on any thread enqueue commands into a bounded channel; the
//! sequencer thread applies them one at a time, so a submission's matching
//! and resting steps are never interleaved with another command. After each
//! mutation the thread publishes an immutable `BookSnapshot` that readers
//! load without touching the engine.

mod config;
mod error;
mod sequencer;

pub use config::SequencerConfig;
pub use error::SequencerError;
pub use sequencer::{Pending, Sequencer, SequencerHandle};
