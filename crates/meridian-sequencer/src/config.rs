use serde::{Deserialize, Serialize};

/// Sequencer settings for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Instrument name, used for the thread name and log fields.
    pub instrument: String,
    /// Bound of the command queue. A full queue makes `try_submit` fail
    /// with `Overloaded` and `submit` block.
    pub queue_capacity: usize,
    /// Levels per side kept in published snapshots.
    pub snapshot_depth: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            instrument: "MERIDIAN".to_string(),
            queue_capacity: 4096,
            snapshot_depth: 10,
        }
    }
}
