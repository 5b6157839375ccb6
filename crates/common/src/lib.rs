//! # Stablecoin Arbitrage Common Crate
//!
//! This crate provides the shared data types and error definitions used
//! across the arbitrage-detector workspace.

/// Module for common error types.
pub mod errors;

/// Module for common data structures and types.
pub mod types;

// Re-export key items for easier access.
pub use errors::ArbError;
pub use types::{Asset, ExchangeId, Opportunity, PositionKey, Price, Quantity, Route};
