use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Represents a price, typically using a high-precision decimal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(pub Decimal);

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a quantity of an asset, typically using a high-precision decimal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quantity(pub Decimal);

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a stablecoin, identified by a symbol string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asset(pub String);

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Asset {
    fn from(s: &str) -> Self {
        Asset(s.to_uppercase())
    }
}

/// Represents a unique identifier for an exchange.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExchangeId(pub String);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        ExchangeId(s.to_string())
    }
}

/// Identifies a position: one stablecoin held on one exchange.
///
/// Ordering is lexicographic (exchange first, then asset), which the sparse
/// builder and cycle canonicalization rely on for deterministic output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    /// The exchange holding the position.
    pub exchange: ExchangeId,
    /// The stablecoin held.
    pub asset: Asset,
}

impl PositionKey {
    /// Creates a new position key.
    pub fn new(exchange: impl Into<ExchangeId>, asset: impl Into<Asset>) -> Self {
        PositionKey {
            exchange: exchange.into(),
            asset: asset.into(),
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.asset)
    }
}

/// An ordered transfer route between two positions, used to key transfer-time
/// statistics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Route {
    pub source: PositionKey,
    pub target: PositionKey,
}

impl Route {
    /// Creates a new route.
    pub fn new(source: PositionKey, target: PositionKey) -> Self {
        Route { source, target }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// A profitable arbitrage cycle emitted by the search engine.
///
/// Immutable once created: the path starts and ends at the same position,
/// and `net_profit = gross spread - (total_fee + total_volatility_cost)` is
/// strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Unique identifier for this opportunity.
    pub id: Uuid,
    /// The cycle, with `path[0] == path[path.len() - 1]`.
    pub path: Vec<PositionKey>,
    /// Sum of fee costs over every hop.
    pub total_fee: Decimal,
    /// Sum of volatility-risk costs over every hop.
    pub total_volatility_cost: Decimal,
    /// Gross spread minus total costs.
    pub net_profit: Decimal,
    /// Net profit per unit of capital at the start position.
    pub roi: Decimal,
    /// Name of the search algorithm that produced the cycle.
    pub algorithm: String,
    /// True when the producing search bailed out on its expansion budget.
    pub partial: bool,
    /// When the opportunity was found.
    pub timestamp: DateTime<Utc>,
}

impl Opportunity {
    /// Number of hops in the cycle.
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// The open cycle rotated to start at its lexicographically smallest
    /// position. Two cycles that are rotations of each other canonicalize to
    /// the same sequence; different visiting orders do not.
    pub fn canonical_cycle(&self) -> Vec<&PositionKey> {
        if self.path.len() < 2 {
            return self.path.iter().collect();
        }
        // Drop the closing repetition of the start node.
        let open = &self.path[..self.path.len() - 1];
        let pivot = open
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, _)| i)
            .unwrap_or(0);
        open.iter().cycle().skip(pivot).take(open.len()).collect()
    }

    /// Hashes the canonical cycle. Rotations of the same cycle share a digest.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        for key in self.canonical_cycle() {
            hasher.update(key.exchange.0.as_bytes());
            hasher.update(&[0]);
            hasher.update(key.asset.0.as_bytes());
            hasher.update(&[0]);
        }
        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key(exchange: &str, asset: &str) -> PositionKey {
        PositionKey::new(exchange, asset)
    }

    fn opportunity_with_path(path: Vec<PositionKey>) -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            path,
            total_fee: dec!(0.004),
            total_volatility_cost: dec!(0.004),
            net_profit: dec!(0.032),
            roi: dec!(0.032),
            algorithm: "cost_optimal".to_string(),
            partial: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_price_display() {
        let price = Price(dec!(1.0003));
        assert_eq!(format!("{}", price), "1.0003");
    }

    #[test]
    fn test_asset_display_and_from_str() {
        let asset = Asset::from("usdt");
        assert_eq!(asset, Asset("USDT".to_string()));
        assert_eq!(format!("{}", asset), "USDT");
    }

    #[test]
    fn test_exchange_id_from_str() {
        let exchange = ExchangeId::from("kraken");
        assert_eq!(exchange, ExchangeId("kraken".to_string()));
    }

    #[test]
    fn test_position_key_display() {
        assert_eq!(format!("{}", key("kraken", "usdt")), "kraken:USDT");
    }

    #[test]
    fn test_position_key_ordering() {
        let a = key("coinbase", "USDT");
        let b = key("kraken", "USDC");
        let c = key("kraken", "USDT");
        assert!(a < b); // exchange first
        assert!(b < c); // then asset
    }

    #[test]
    fn test_route_display() {
        let route = Route::new(key("kraken", "USDT"), key("coinbase", "USDT"));
        assert_eq!(format!("{}", route), "kraken:USDT -> coinbase:USDT");
    }

    #[test]
    fn test_canonical_cycle_rotation_invariant() {
        let a = key("coinbase", "USDC");
        let b = key("kraken", "USDT");
        let c = key("kraken", "USDC");

        let opp1 = opportunity_with_path(vec![b.clone(), a.clone(), c.clone(), b.clone()]);
        let opp2 = opportunity_with_path(vec![a.clone(), c.clone(), b.clone(), a.clone()]);

        let canon1: Vec<_> = opp1.canonical_cycle().into_iter().cloned().collect();
        let canon2: Vec<_> = opp2.canonical_cycle().into_iter().cloned().collect();
        assert_eq!(canon1, canon2);
        assert_eq!(canon1[0], a); // smallest key leads

        assert_eq!(opp1.digest(), opp2.digest());
    }

    #[test]
    fn test_distinct_orders_have_distinct_digests() {
        let a = key("binance", "DAI");
        let b = key("coinbase", "USDC");
        let c = key("kraken", "USDT");

        let forward = opportunity_with_path(vec![a.clone(), b.clone(), c.clone(), a.clone()]);
        let backward = opportunity_with_path(vec![a.clone(), c.clone(), b.clone(), a.clone()]);
        assert_ne!(forward.digest(), backward.digest());
    }

    #[test]
    fn test_hops() {
        let a = key("kraken", "USDT");
        let b = key("coinbase", "USDT");
        let opp = opportunity_with_path(vec![a.clone(), b, a]);
        assert_eq!(opp.hops(), 2);
    }
}
