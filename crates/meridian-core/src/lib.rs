//! # Meridian Core
//!
//! Single-instrument limit order book and price-time priority matching engine.
//!
//! ## Design Principles
//! - Integer tick prices (no floats)
//! - Orders and levels live in arenas addressed by small handles
//! - An order knows its level, so cancellation never searches
//! - Single writer: all mutation takes `&mut MatchingEngine`

pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod level;
pub mod order;
pub mod pool;

pub use book::{prices_cross, BookSide, DepthLevel, LevelHandle, OrderBook};
pub use config::EngineConfig;
pub use engine::{BookSnapshot, FillStatus, MatchingEngine, Submission, Trade};
pub use error::{EngineError, InvariantViolation, RejectReason};
pub use fixed::{Price, Quantity};
pub use level::PriceLevel;
pub use order::{Order, OrderId, OrderRequest, Side};
pub use pool::{OrderHandle, OrderPool};
