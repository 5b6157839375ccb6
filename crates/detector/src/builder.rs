//! Builds the arbitrage graph from registered price sources.

use crate::cost::{self, DEFAULT_VOLATILITY_FACTOR};
use crate::prelude::*;
use crate::trackers::RiskTrackers;
use price_source::SourceRegistry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    /// Volatility factor frozen into every built edge, or the adaptive base
    /// when trackers are attached.
    pub volatility: VolatilityMode,
    /// When set, keep only the k cheapest outgoing transfers per position.
    /// `None` builds the dense graph.
    pub max_edges_per_node: Option<usize>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            volatility: VolatilityMode::Fixed(DEFAULT_VOLATILITY_FACTOR),
            max_edges_per_node: None,
        }
    }
}

/// Constructs an [`ArbitrageGraph`] from a [`SourceRegistry`].
///
/// One `price_table` call per source per build; everything else works off
/// cached tables and supported-asset sets. Infeasible transfers are skipped,
/// never errors.
#[derive(Debug)]
pub struct GraphBuilder {
    config: BuilderConfig,
    trackers: Option<Arc<RiskTrackers>>,
}

impl GraphBuilder {
    pub fn new(config: BuilderConfig) -> Result<Self, ArbError> {
        if let Some(k) = config.max_edges_per_node {
            if k < 1 {
                return Err(ArbError::InvalidConfiguration(
                    "max_edges_per_node must be at least 1".to_string(),
                ));
            }
        }
        let base = match config.volatility {
            VolatilityMode::Fixed(f) => f,
            VolatilityMode::Adaptive { base } => base,
        };
        if base < Decimal::ZERO {
            return Err(ArbError::InvalidConfiguration(format!(
                "volatility factor must be non-negative, got {base}"
            )));
        }
        Ok(GraphBuilder {
            config,
            trackers: None,
        })
    }

    /// Attaches risk trackers so adaptive volatility factors use realized
    /// per-position volatility.
    pub fn with_trackers(mut self, trackers: Arc<RiskTrackers>) -> Self {
        self.trackers = Some(trackers);
        self
    }

    fn factor_for(&self, target: &PositionKey) -> Decimal {
        match self.config.volatility {
            VolatilityMode::Fixed(factor) => factor,
            VolatilityMode::Adaptive { base } => match &self.trackers {
                Some(trackers) => trackers.volatility.factor(target, base),
                None => base,
            },
        }
    }

    /// Builds the graph: one node per (exchange, asset) the sources price,
    /// one transfer per feasible ordered node pair. A transfer is feasible
    /// within an exchange always, and across exchanges when the target
    /// exchange supports the target asset.
    pub fn build(&self, registry: &SourceRegistry) -> Result<ArbitrageGraph, ArbError> {
        let mut graph = ArbitrageGraph::new();

        // One price_table call per source; tables and supported sets are
        // reused for the whole build.
        let mut tables: Vec<(ExchangeId, BTreeMap<Asset, Price>)> = Vec::new();
        let mut supported: BTreeMap<ExchangeId, BTreeSet<Asset>> = BTreeMap::new();
        for source in registry.iter() {
            let exchange = source.exchange_id().clone();
            supported.insert(exchange.clone(), source.supported_assets());
            tables.push((exchange, source.price_table()?));
        }

        let mut nodes: Vec<PositionKey> = Vec::new();
        for (exchange, table) in &tables {
            for (asset, price) in table {
                let key = PositionKey {
                    exchange: exchange.clone(),
                    asset: asset.clone(),
                };
                graph.add_node(key.clone(), *price)?;
                nodes.push(key);
            }
        }

        for source_key in &nodes {
            let source = registry
                .get(&source_key.exchange)
                .ok_or_else(|| ArbError::NotFound(source_key.exchange.to_string()))?;
            let source_price = graph
                .price(source_key)
                .ok_or_else(|| ArbError::NotFound(source_key.to_string()))?
                .0;

            // (weight, fee_rate, target) triples; the full tuple is the sort
            // key, so sparse selection is deterministic.
            let mut candidates: Vec<(Decimal, Decimal, PositionKey, Decimal, Decimal)> =
                Vec::new();
            for target_key in &nodes {
                if target_key == source_key {
                    continue;
                }
                let cross_exchange = target_key.exchange != source_key.exchange;
                if cross_exchange
                    && !supported
                        .get(&target_key.exchange)
                        .is_some_and(|assets| assets.contains(&target_key.asset))
                {
                    log::debug!("skipping infeasible transfer {source_key} -> {target_key}");
                    continue;
                }
                let fee_rate = source
                    .fee_schedule()
                    .rate(&source_key.asset, &target_key.asset);
                let transfer_time = source.transfer_time(&source_key.asset, &target_key.asset);
                let factor = self.factor_for(target_key);
                let target_price = graph
                    .price(target_key)
                    .ok_or_else(|| ArbError::NotFound(target_key.to_string()))?
                    .0;
                let weight = cost::edge_cost(source_price, target_price, fee_rate, factor);
                candidates.push((weight, fee_rate, target_key.clone(), transfer_time, factor));
            }

            if let Some(k) = self.config.max_edges_per_node {
                candidates.sort_by(|a, b| {
                    a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)).then_with(|| a.2.cmp(&b.2))
                });
                candidates.truncate(k);
            }

            for (_, fee_rate, target_key, transfer_time, factor) in candidates {
                graph.add_edge(source_key, &target_key, fee_rate, transfer_time, factor)?;
            }
        }

        log::info!(
            "built arbitrage graph: {} positions, {} transfers",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use price_source::{FeeSchedule, PriceSource, StaticPriceSource};
    use rust_decimal_macros::dec;

    fn registry() -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(StaticPriceSource::new(
            "kraken",
            vec![
                (Asset::from("USDT"), Price(dec!(1.00))),
                (Asset::from("USDC"), Price(dec!(0.99))),
            ],
            dec!(0.001),
        )));
        registry.register(Arc::new(StaticPriceSource::new(
            "coinbase",
            vec![
                (Asset::from("USDT"), Price(dec!(1.00))),
                (Asset::from("USDC"), Price(dec!(1.01))),
            ],
            dec!(0.001),
        )));
        registry
    }

    fn builder(config: BuilderConfig) -> GraphBuilder {
        GraphBuilder::new(config).unwrap()
    }

    #[test]
    fn test_config_validation() {
        let err = GraphBuilder::new(BuilderConfig {
            max_edges_per_node: Some(0),
            ..BuilderConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ArbError::InvalidConfiguration(_)));

        let err = GraphBuilder::new(BuilderConfig {
            volatility: VolatilityMode::Fixed(dec!(-1)),
            ..BuilderConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ArbError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_dense_build_connects_every_pair() {
        let graph = builder(BuilderConfig::default()).build(&registry()).unwrap();
        assert_eq!(graph.node_count(), 4);
        // Every ordered pair is feasible here.
        assert_eq!(graph.edge_count(), 12);
    }

    #[test]
    fn test_empty_registry_builds_empty_graph() {
        let graph = builder(BuilderConfig::default())
            .build(&SourceRegistry::new())
            .unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_sparse_build_keeps_k_cheapest_deterministically() {
        let config = BuilderConfig {
            max_edges_per_node: Some(1),
            ..BuilderConfig::default()
        };
        let first = builder(config.clone()).build(&registry()).unwrap();
        let second = builder(config).build(&registry()).unwrap();

        assert_eq!(first.edge_count(), 4);
        for key in [
            PositionKey::new("kraken", "USDT"),
            PositionKey::new("kraken", "USDC"),
            PositionKey::new("coinbase", "USDT"),
            PositionKey::new("coinbase", "USDC"),
        ] {
            let pick = |g: &ArbitrageGraph| {
                g.neighbors(&key).map(|(t, _)| t.clone()).collect::<Vec<_>>()
            };
            assert_eq!(pick(&first).len(), 1);
            assert_eq!(pick(&first), pick(&second));
        }

        // kraken:USDT's cheapest neighbor is a zero-spread USDT position;
        // ties on weight and fee break on the target key, and
        // coinbase:USDT is the only such candidate.
        let (target, transfer) = first
            .neighbors(&PositionKey::new("kraken", "USDT"))
            .next()
            .unwrap();
        assert_eq!(*target, PositionKey::new("coinbase", "USDT"));
        assert_eq!(transfer.volatility_cost, Decimal::ZERO);
    }

    #[test]
    fn test_fee_overrides_flow_into_edges() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            StaticPriceSource::new(
                "kraken",
                vec![
                    (Asset::from("USDT"), Price(dec!(1.00))),
                    (Asset::from("USDC"), Price(dec!(1.00))),
                ],
                dec!(0.002),
            )
            .with_fee_schedule(
                FeeSchedule::flat(dec!(0.002)).with_override(
                    Asset::from("USDT"),
                    Asset::from("USDC"),
                    dec!(0.0005),
                ),
            ),
        ));
        let graph = builder(BuilderConfig::default()).build(&registry).unwrap();
        let (_, transfer) = graph
            .neighbors(&PositionKey::new("kraken", "USDT"))
            .next()
            .unwrap();
        assert_eq!(transfer.fee_rate, dec!(0.0005));
    }

    /// A source that prices an asset it does not accept for transfers in.
    struct RestrictedSource {
        inner: StaticPriceSource,
        accepted: BTreeSet<Asset>,
    }

    impl PriceSource for RestrictedSource {
        fn exchange_id(&self) -> &ExchangeId {
            self.inner.exchange_id()
        }
        fn price(&self, asset: &Asset) -> Result<Price, ArbError> {
            self.inner.price(asset)
        }
        fn price_table(&self) -> Result<BTreeMap<Asset, Price>, ArbError> {
            self.inner.price_table()
        }
        fn fee_schedule(&self) -> &FeeSchedule {
            self.inner.fee_schedule()
        }
        fn supported_assets(&self) -> BTreeSet<Asset> {
            self.accepted.clone()
        }
    }

    #[test]
    fn test_infeasible_cross_exchange_transfers_are_skipped() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(StaticPriceSource::new(
            "kraken",
            vec![(Asset::from("USDT"), Price(dec!(1.00)))],
            dec!(0.001),
        )));
        registry.register(Arc::new(RestrictedSource {
            inner: StaticPriceSource::new(
                "coinbase",
                vec![
                    (Asset::from("USDT"), Price(dec!(1.00))),
                    (Asset::from("USDC"), Price(dec!(1.01))),
                ],
                dec!(0.001),
            ),
            accepted: [Asset::from("USDT")].into_iter().collect(),
        }));

        let graph = builder(BuilderConfig::default()).build(&registry).unwrap();
        assert_eq!(graph.node_count(), 3);
        // kraken:USDT cannot reach coinbase:USDC, but coinbase's own
        // positions still connect to each other.
        let from_kraken: Vec<_> = graph
            .neighbors(&PositionKey::new("kraken", "USDT"))
            .map(|(t, _)| t.clone())
            .collect();
        assert_eq!(from_kraken, vec![PositionKey::new("coinbase", "USDT")]);
        let from_cb_usdt: Vec<_> = graph
            .neighbors(&PositionKey::new("coinbase", "USDT"))
            .map(|(t, _)| t.clone())
            .collect();
        assert!(from_cb_usdt.contains(&PositionKey::new("coinbase", "USDC")));
    }
}
