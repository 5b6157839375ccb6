//! Cross-search opportunity deduplication.

use common::Opportunity;
use std::collections::HashSet;

/// Remembers the canonical digest of every opportunity seen so far.
///
/// Two opportunities are duplicates exactly when their cycles are rotations
/// of each other; the same positions visited in a different order are
/// distinct. Digests are retained for the deduplicator's lifetime, one per
/// batch in practice.
#[derive(Debug, Default)]
pub struct OpportunityDeduplicator {
    seen: HashSet<[u8; 32]>,
}

impl OpportunityDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the opportunity and reports whether it was already known.
    pub fn is_duplicate(&mut self, opportunity: &Opportunity) -> bool {
        !self.seen.insert(opportunity.digest())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::PositionKey;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn opportunity(path: Vec<PositionKey>) -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            path,
            total_fee: Decimal::ZERO,
            total_volatility_cost: Decimal::ZERO,
            net_profit: Decimal::ONE,
            roi: Decimal::ONE,
            algorithm: "cost_optimal".to_string(),
            partial: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_rotations_are_duplicates() {
        let a = PositionKey::new("coinbase", "USDC");
        let b = PositionKey::new("kraken", "USDT");
        let c = PositionKey::new("kraken", "USDC");
        let mut dedup = OpportunityDeduplicator::new();

        let first = opportunity(vec![a.clone(), b.clone(), c.clone(), a.clone()]);
        let rotated = opportunity(vec![b.clone(), c.clone(), a.clone(), b.clone()]);
        assert!(!dedup.is_duplicate(&first));
        assert!(dedup.is_duplicate(&rotated));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_reversed_order_is_distinct() {
        let a = PositionKey::new("binance", "DAI");
        let b = PositionKey::new("coinbase", "USDC");
        let c = PositionKey::new("kraken", "USDT");
        let mut dedup = OpportunityDeduplicator::new();

        let forward = opportunity(vec![a.clone(), b.clone(), c.clone(), a.clone()]);
        let backward = opportunity(vec![a.clone(), c.clone(), b.clone(), a.clone()]);
        assert!(!dedup.is_duplicate(&forward));
        assert!(!dedup.is_duplicate(&backward));
        assert_eq!(dedup.len(), 2);
    }
}
