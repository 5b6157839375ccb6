//! Batch scanning: graph construction, fan-out search, aggregation.

use crate::config::{ConfigError, ScanConfig, SearchSettings};
use common::ArbError;
use detector::{
    BatchResult, GraphBuilder, RiskTrackers, SearchEngine, TwoLevelSearchOrchestrator,
};
use price_source::SourceRegistry;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Detector(#[from] ArbError),

    #[error("search task failed: {0}")]
    TaskFailed(String),
}

/// Runs detection batches over a source registry.
///
/// Each scan builds a fresh graph from current source data, freezes a
/// snapshot, fans one search task out per start position and aggregates the
/// outcomes. Risk trackers persist across scans, so adaptive volatility
/// factors sharpen as price history accumulates.
pub struct Scanner {
    registry: SourceRegistry,
    settings: SearchSettings,
    trackers: Arc<RiskTrackers>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("settings", &self.settings)
            .field("trackers", &self.trackers)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    pub fn new(registry: SourceRegistry, settings: SearchSettings) -> Self {
        Scanner {
            registry,
            settings,
            trackers: Arc::new(RiskTrackers::new()),
        }
    }

    /// Builds a scanner from a validated configuration.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Scanner::new(config.registry(), config.search.clone()))
    }

    pub fn trackers(&self) -> &Arc<RiskTrackers> {
        &self.trackers
    }

    /// Runs one detection batch.
    pub async fn scan(&self) -> Result<BatchResult, ScanError> {
        let builder = GraphBuilder::new(self.settings.builder_config())?
            .with_trackers(Arc::clone(&self.trackers));
        let graph = builder.build(&self.registry)?;
        let snapshot = Arc::new(graph.snapshot());

        // Feed this batch's prices into the volatility history for the next.
        for (key, price) in snapshot.positions() {
            self.trackers.volatility.update_price(key, price.0)?;
        }

        let engine = SearchEngine::new(self.settings.search_config())?
            .with_trackers(Arc::clone(&self.trackers));

        let starts = TwoLevelSearchOrchestrator::start_positions(&snapshot);
        log::info!(
            "scanning {} positions from {} starts",
            snapshot.node_count(),
            starts.len()
        );

        let mut handles = Vec::with_capacity(starts.len());
        for start in starts {
            let snapshot = Arc::clone(&snapshot);
            let engine = engine.clone();
            handles.push(tokio::spawn(
                async move { engine.search(&snapshot, &start) },
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            let outcome = joined.map_err(|e| ScanError::TaskFailed(e.to_string()))??;
            outcomes.push(outcome);
        }

        let result = TwoLevelSearchOrchestrator::aggregate(outcomes);
        log::info!(
            "scan complete: {} opportunities from {} searches",
            result.opportunities.len(),
            result.searches
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlgorithmSetting, ExchangeConfig, VolatilityFactorSetting};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn exchange(name: &str, usdt: Decimal, usdc: Decimal) -> ExchangeConfig {
        ExchangeConfig {
            name: name.to_string(),
            fee_rate: Some(dec!(0.001)),
            transfer_time_secs: None,
            prices: [
                ("USDT".to_string(), usdt),
                ("USDC".to_string(), usdc),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn dislocated_config() -> ScanConfig {
        ScanConfig {
            exchanges: vec![
                exchange("kraken", dec!(1.00), dec!(0.99)),
                exchange("coinbase", dec!(1.00), dec!(1.01)),
            ],
            search: SearchSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_scan_finds_dislocation_opportunities() {
        let scanner = Scanner::from_config(&dislocated_config()).unwrap();
        let result = scanner.scan().await.unwrap();

        assert!(!result.partial);
        assert_eq!(result.searches, 4);
        assert!(!result.opportunities.is_empty());
        for opp in &result.opportunities {
            assert_eq!(opp.path.first(), opp.path.last());
            assert!(opp.net_profit > Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn test_scan_flat_market_finds_nothing() {
        let config = ScanConfig {
            exchanges: vec![
                exchange("kraken", dec!(1.00), dec!(1.00)),
                exchange("coinbase", dec!(1.00), dec!(1.00)),
            ],
            search: SearchSettings::default(),
        };
        let scanner = Scanner::from_config(&config).unwrap();
        let result = scanner.scan().await.unwrap();
        assert!(result.opportunities.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_scans_accumulate_volatility_history() {
        let mut config = dislocated_config();
        config.search.volatility_factor =
            VolatilityFactorSetting::Named("adaptive".to_string());
        let scanner = Scanner::from_config(&config).unwrap();

        scanner.scan().await.unwrap();
        scanner.scan().await.unwrap();

        let key = common::PositionKey::new("kraken", "USDT");
        // Two scans of static prices leave one recorded return.
        assert_eq!(scanner.trackers().volatility.volatility(&key), Decimal::ZERO);
        // The adaptive factor still floors at half the base.
        assert!(scanner.trackers().volatility.factor(&key, dec!(0.1)) > Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = dislocated_config();
        config.search.max_depth = 0;
        let err = Scanner::from_config(&config).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[tokio::test]
    async fn test_node_budget_marks_scan_partial() {
        let mut config = dislocated_config();
        config.search.node_budget = Some(1);
        let scanner = Scanner::from_config(&config).unwrap();
        let result = scanner.scan().await.unwrap();
        assert!(result.partial);
    }
}
