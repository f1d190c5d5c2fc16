//! Layered replay configuration.

use std::path::Path;

use meridian_core::EngineConfig;
use meridian_sequencer::SequencerConfig;
use serde::{Deserialize, Serialize};

/// Environment prefix; `MERIDIAN__ENGINE__ORDER_CAPACITY=1000` overrides
/// `engine.order_capacity`.
pub const ENV_PREFIX: &str = "MERIDIAN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub engine: EngineConfig,
    pub sequencer: SequencerConfig,
}

impl ReplayConfig {
    /// Defaults, overlaid by an optional file, overlaid by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
