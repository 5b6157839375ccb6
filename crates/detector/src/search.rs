//! Frontier search for profitable cycles over a graph snapshot.
//!
//! Three strategies share one loop and differ only in how they prioritize
//! frontier entries: cost-optimal expands by accumulated cost alone,
//! heuristic adds a forward-risk estimate, and weighted scales that estimate
//! to trade thoroughness for speed.

use crate::cost::{self, DEFAULT_TIME_RISK_COEFFICIENT, DEFAULT_VOLATILITY_FACTOR};
use crate::prelude::*;
use crate::trackers::RiskTrackers;
use chrono::Utc;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Search strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Expand strictly by accumulated cost. Exhaustive within the depth cap.
    CostOptimal,
    /// Expand by accumulated cost plus a forward-risk estimate. The estimate
    /// is not a lower bound on the remaining cost, so the first cycle found
    /// is not guaranteed cheapest; all closures within the depth cap are
    /// still examined.
    Heuristic,
    /// Heuristic with the estimate scaled by a weight >= 1. Weight 1 behaves
    /// identically to [`Algorithm::Heuristic`].
    Weighted,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::CostOptimal => "cost_optimal",
            Algorithm::Heuristic => "heuristic",
            Algorithm::Weighted => "weighted",
        }
    }
}

/// How the per-node volatility factor in the forward-risk estimate is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolatilityMode {
    /// One factor for every position.
    Fixed(Decimal),
    /// Scale `base` by each position's realized volatility, when trackers
    /// are attached.
    Adaptive { base: Decimal },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Maximum number of hops in a cycle.
    pub max_depth: usize,
    pub algorithm: Algorithm,
    pub volatility: VolatilityMode,
    /// Heuristic scale for [`Algorithm::Weighted`]; ignored otherwise.
    pub weight: Decimal,
    /// Cap on node expansions per search; `None` is unbounded.
    pub node_budget: Option<usize>,
    /// Converts a transfer-time estimate (seconds) into a risk cost.
    pub time_risk_coefficient: Decimal,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_depth: 6,
            algorithm: Algorithm::CostOptimal,
            volatility: VolatilityMode::Fixed(DEFAULT_VOLATILITY_FACTOR),
            weight: Decimal::ONE,
            node_budget: None,
            time_risk_coefficient: DEFAULT_TIME_RISK_COEFFICIENT,
        }
    }
}

/// Result of one search from one start position.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Profitable cycles through the start position, net profit descending.
    pub opportunities: Vec<Opportunity>,
    /// True when the node budget ran out before the frontier emptied.
    pub partial: bool,
    /// Nodes expanded.
    pub expanded: usize,
}

/// A frontier entry. Ordered by `(priority, sequence)` so ties break in
/// insertion order and the search is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FrontierEntry {
    priority: Decimal,
    seq: u64,
    node: PositionId,
    depth: usize,
    cost: Decimal,
    gain: Decimal,
    fee: Decimal,
    volatility: Decimal,
    path: Vec<PositionId>,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs frontier searches against graph snapshots.
#[derive(Clone, Default)]
pub struct SearchEngine {
    config: SearchConfig,
    trackers: Option<Arc<RiskTrackers>>,
}

impl SearchEngine {
    /// Validates the configuration up front so a bad setting fails at
    /// construction, not mid-batch.
    pub fn new(config: SearchConfig) -> Result<Self, ArbError> {
        if config.max_depth < 2 {
            return Err(ArbError::InvalidConfiguration(format!(
                "max_depth must be at least 2, got {}",
                config.max_depth
            )));
        }
        if config.weight < Decimal::ONE {
            return Err(ArbError::InvalidConfiguration(format!(
                "heuristic weight must be at least 1, got {}",
                config.weight
            )));
        }
        let factor = match config.volatility {
            VolatilityMode::Fixed(f) => f,
            VolatilityMode::Adaptive { base } => base,
        };
        if factor < Decimal::ZERO {
            return Err(ArbError::InvalidConfiguration(format!(
                "volatility factor must be non-negative, got {factor}"
            )));
        }
        if config.time_risk_coefficient < Decimal::ZERO {
            return Err(ArbError::InvalidConfiguration(format!(
                "time risk coefficient must be non-negative, got {}",
                config.time_risk_coefficient
            )));
        }
        Ok(SearchEngine {
            config,
            trackers: None,
        })
    }

    /// Attaches risk trackers for adaptive volatility factors and learned
    /// transfer-time estimates.
    pub fn with_trackers(mut self, trackers: Arc<RiskTrackers>) -> Self {
        self.trackers = Some(trackers);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn volatility_factor(&self, key: &PositionKey) -> Decimal {
        match self.config.volatility {
            VolatilityMode::Fixed(factor) => factor,
            VolatilityMode::Adaptive { base } => match &self.trackers {
                Some(trackers) => trackers.volatility.factor(key, base),
                None => base,
            },
        }
    }

    fn transfer_time(&self, route: &Route, fallback: Decimal) -> Decimal {
        match &self.trackers {
            Some(trackers) => trackers.transfer_time.estimate_or(route, fallback),
            None => fallback,
        }
    }

    /// Forward-risk estimate for stepping onto `node`: transfer-time risk
    /// plus the divergence of `node`'s price from the start price, scaled by
    /// the node's volatility factor.
    fn estimate(
        &self,
        snapshot: &GraphSnapshot,
        route: &Route,
        node: PositionId,
        start_price: Decimal,
        edge_transfer_time: Decimal,
    ) -> Decimal {
        let time_risk =
            self.transfer_time(route, edge_transfer_time) * self.config.time_risk_coefficient;
        let divergence = (snapshot.price_of(node) - start_price).abs();
        time_risk + divergence * self.volatility_factor(snapshot.key(node))
    }

    /// Searches for profitable cycles through `start`.
    ///
    /// # Errors
    ///
    /// Returns [`ArbError::NotFound`] when `start` is not in the snapshot.
    pub fn search(
        &self,
        snapshot: &GraphSnapshot,
        start: &PositionKey,
    ) -> Result<SearchOutcome, ArbError> {
        let start_id = snapshot
            .id(start)
            .ok_or_else(|| ArbError::NotFound(start.to_string()))?;
        let start_price = snapshot.price_of(start_id);

        let mut frontier: BinaryHeap<Reverse<FrontierEntry>> = BinaryHeap::new();
        let mut visited: HashSet<(PositionId, usize)> = HashSet::new();
        let mut emitted: HashSet<[u8; 32]> = HashSet::new();
        let mut opportunities: Vec<Opportunity> = Vec::new();
        let mut seq: u64 = 0;
        let mut expanded: usize = 0;
        let mut partial = false;

        frontier.push(Reverse(FrontierEntry {
            priority: Decimal::ZERO,
            seq,
            node: start_id,
            depth: 0,
            cost: Decimal::ZERO,
            gain: Decimal::ZERO,
            fee: Decimal::ZERO,
            volatility: Decimal::ZERO,
            path: vec![start_id],
        }));

        while let Some(Reverse(entry)) = frontier.pop() {
            if !visited.insert((entry.node, entry.depth)) {
                continue;
            }

            if entry.node == start_id && entry.depth >= 2 {
                let net_profit = entry.gain - entry.cost;
                if net_profit > Decimal::ZERO {
                    let opportunity = Opportunity {
                        id: Uuid::new_v4(),
                        path: entry.path.iter().map(|&id| snapshot.key(id).clone()).collect(),
                        total_fee: entry.fee,
                        total_volatility_cost: entry.volatility,
                        net_profit,
                        roi: net_profit / start_price,
                        algorithm: self.config.algorithm.name().to_string(),
                        partial: false,
                        timestamp: Utc::now(),
                    };
                    if emitted.insert(opportunity.digest()) {
                        log::debug!(
                            "cycle through {start}: {} hops, net {}",
                            opportunity.hops(),
                            opportunity.net_profit
                        );
                        opportunities.push(opportunity);
                    }
                }
                continue;
            }

            if entry.depth >= self.config.max_depth {
                continue;
            }
            if let Some(budget) = self.config.node_budget {
                if expanded >= budget {
                    partial = true;
                    log::warn!(
                        "node budget {budget} exhausted searching from {start}, \
                         returning partial results"
                    );
                    break;
                }
            }
            expanded += 1;

            let source_price = snapshot.price_of(entry.node);
            for (next, transfer) in snapshot.neighbors_by_id(entry.node) {
                // Simple cycles only: an interior node may not repeat.
                if next != start_id && entry.path.contains(&next) {
                    continue;
                }
                let target_price = snapshot.price_of(next);
                let cost = entry.cost + transfer.weight;
                let gain = entry.gain + cost::hop_gain(source_price, target_price);
                let priority = match self.config.algorithm {
                    Algorithm::CostOptimal => cost,
                    Algorithm::Heuristic | Algorithm::Weighted => {
                        let route = Route::new(
                            snapshot.key(entry.node).clone(),
                            snapshot.key(next).clone(),
                        );
                        let h = self.estimate(
                            snapshot,
                            &route,
                            next,
                            start_price,
                            transfer.transfer_time,
                        );
                        let scale = match self.config.algorithm {
                            Algorithm::Weighted => self.config.weight,
                            _ => Decimal::ONE,
                        };
                        cost + scale * h
                    }
                };
                let mut path = entry.path.clone();
                path.push(next);
                seq += 1;
                frontier.push(Reverse(FrontierEntry {
                    priority,
                    seq,
                    node: next,
                    depth: entry.depth + 1,
                    cost,
                    gain,
                    fee: entry.fee + transfer.fee_cost,
                    volatility: entry.volatility + transfer.volatility_cost,
                    path,
                }));
            }
        }

        if partial {
            for opportunity in &mut opportunities {
                opportunity.partial = true;
            }
        }
        opportunities.sort_by(|a, b| b.net_profit.cmp(&a.net_profit));

        Ok(SearchOutcome {
            opportunities,
            partial,
            expanded,
        })
    }
}
