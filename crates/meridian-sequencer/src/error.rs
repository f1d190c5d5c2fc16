use meridian_core::EngineError;
use thiserror::Error;

/// Errors surfaced to sequencer callers.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// The engine refused the command.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The command queue is full.
    #[error("sequencer queue is full")]
    Overloaded,
    /// The sequencer thread is gone.
    #[error("sequencer is not running")]
    Disconnected,
    /// The OS refused to start the sequencer thread.
    #[error("failed to spawn sequencer thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The sequencer thread panicked; its engine is lost.
    #[error("sequencer thread panicked")]
    Panicked,
}
