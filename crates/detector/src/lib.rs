//! # Arbitrage Detector Crate
//!
//! This crate is responsible for detecting cyclical arbitrage opportunities
//! among stablecoin positions held across multiple exchanges. Positions are
//! the nodes of a weighted directed graph, transfers are its edges, and three
//! frontier-search strategies hunt the graph for cycles whose captured spread
//! beats their cumulative fee and volatility cost.

pub mod builder;
pub mod cost;
pub mod dedup;
pub mod graph;
pub mod orchestrator;
pub mod prelude;
pub mod search;
pub mod sizing;
pub mod trackers;

// Re-export the main entry points for easy access.
pub use builder::{BuilderConfig, GraphBuilder};
pub use dedup::OpportunityDeduplicator;
pub use graph::{ArbitrageGraph, GraphSnapshot, Transfer};
pub use orchestrator::{BatchResult, TwoLevelSearchOrchestrator};
pub use search::{Algorithm, SearchConfig, SearchEngine, SearchOutcome, VolatilityMode};
pub use sizing::{FeeTier, Sizing, VolumeOptimizer};
pub use trackers::{RiskTrackers, TransferTimeTracker, VolatilityTracker};
