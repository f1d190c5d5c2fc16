//! Engine sizing configuration.

use serde::{Deserialize, Serialize};

/// Initial capacities for the engine's arenas.
///
/// These are sizing hints only; every structure grows on demand, so a
/// too-small value costs reallocations and never a rejected order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resting orders to reserve room for.
    pub order_capacity: usize,
    /// Price levels per side to reserve room for.
    pub level_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            order_capacity: 1 << 16,
            level_capacity: 1 << 10,
        }
    }
}
