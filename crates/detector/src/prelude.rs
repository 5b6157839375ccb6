//! Prelude for the detector crate.

// Re-export commonly used types and traits from this crate.
pub use crate::graph::{ArbitrageGraph, GraphSnapshot, PositionId, Transfer};
pub use crate::search::{Algorithm, SearchConfig, SearchEngine, SearchOutcome, VolatilityMode};

// Re-export relevant items from the common crate.
pub use common::errors::ArbError;
pub use common::types::{Asset, ExchangeId, Opportunity, PositionKey, Price, Route};

// Re-export external crates that are widely used within the detector modules.
pub use rust_decimal::Decimal;
