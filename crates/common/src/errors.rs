use thiserror::Error;

/// Common error types for the arbitrage detector.
///
/// Only fatal conditions are errors. Recoverable conditions, such as an
/// infeasible transfer during graph construction or an exhausted search
/// budget, are represented as skipped edges and a `partial` result flag.
#[derive(Error, Debug, PartialEq)]
pub enum ArbError {
    /// Represents an invalid configuration value, rejected before any search runs.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Represents a non-positive price reported for a position. The node is
    /// rejected, never silently defaulted.
    #[error("Invalid price for {key}: {price}")]
    InvalidPrice { key: String, price: String },

    /// Represents a transfer the graph cannot hold, such as a self-loop.
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Represents a price source failing to supply a quote.
    #[error("Price unavailable for {asset} on {exchange}")]
    PriceUnavailable { exchange: String, asset: String },

    /// Represents an item not being found.
    #[error("Item not found: {0}")]
    NotFound(String),
}
