//! Pure cost model combining transaction fees and volatility risk.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Static volatility factor applied when no tracker supplies an adaptive one.
pub const DEFAULT_VOLATILITY_FACTOR: Decimal = dec!(0.1);

/// Coefficient converting a transfer-time estimate (seconds) into a risk cost
/// for the search heuristic.
pub const DEFAULT_TIME_RISK_COEFFICIENT: Decimal = dec!(0.001);

/// Fee cost of a transfer: the fee rate applied to the source-side notional.
pub fn fee_component(source_price: Decimal, fee_rate: Decimal) -> Decimal {
    fee_rate * source_price
}

/// Volatility-risk cost of a transfer, proportional to the price divergence
/// between its endpoints.
pub fn volatility_component(
    source_price: Decimal,
    target_price: Decimal,
    volatility_factor: Decimal,
) -> Decimal {
    (source_price - target_price).abs() * volatility_factor
}

/// Total edge weight. Zero price divergence degenerates to fee-only cost.
pub fn edge_cost(
    source_price: Decimal,
    target_price: Decimal,
    fee_rate: Decimal,
    volatility_factor: Decimal,
) -> Decimal {
    fee_component(source_price, fee_rate)
        + volatility_component(source_price, target_price, volatility_factor)
}

/// The spread captured by one hop: the absolute price divergence between its
/// endpoints. Summed over a cycle, this is the gross gain that costs are
/// subtracted from.
pub fn hop_gain(source_price: Decimal, target_price: Decimal) -> Decimal {
    (source_price - target_price).abs()
}
