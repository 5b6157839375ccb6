//! Two-level batch orchestration: one bounded cycle search per start
//! position, then a global merge of everything the searches emitted.

use crate::dedup::OpportunityDeduplicator;
use crate::prelude::*;
use std::collections::BTreeSet;

/// Aggregated result of one batch over a snapshot.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Deduplicated opportunities, ranked best first.
    pub opportunities: Vec<Opportunity>,
    /// True when any constituent search hit its node budget.
    pub partial: bool,
    /// Searches run.
    pub searches: usize,
    /// Total nodes expanded across all searches.
    pub expanded: usize,
}

/// Runs one search per start position and merges the results.
///
/// The first level seeds a bounded search from every position that has an
/// outgoing transfer, so the batch covers every cycle the snapshot holds,
/// including cycles over assets listed on a single exchange. The second
/// level dedups rotations and ranks whatever the searches found.
pub struct TwoLevelSearchOrchestrator {
    engine: SearchEngine,
}

impl TwoLevelSearchOrchestrator {
    pub fn new(engine: SearchEngine) -> Self {
        TwoLevelSearchOrchestrator { engine }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// The deterministic start set for a snapshot: every position with at
    /// least one outgoing transfer. Positions without an outgoing transfer
    /// cannot open a cycle, so searching from them is pointless.
    pub fn start_positions(snapshot: &GraphSnapshot) -> Vec<PositionKey> {
        let mut starts: BTreeSet<PositionKey> = BTreeSet::new();
        for (key, _) in snapshot.positions() {
            let Some(id) = snapshot.id(key) else { continue };
            if snapshot.neighbors_by_id(id).next().is_some() {
                starts.insert(key.clone());
            }
        }
        starts.into_iter().collect()
    }

    /// Merges per-start outcomes: dedup by canonical cycle, then rank by net
    /// profit, then ROI, then shorter path.
    pub fn aggregate(outcomes: impl IntoIterator<Item = SearchOutcome>) -> BatchResult {
        let mut dedup = OpportunityDeduplicator::new();
        let mut opportunities: Vec<Opportunity> = Vec::new();
        let mut partial = false;
        let mut searches = 0;
        let mut expanded = 0;

        for outcome in outcomes {
            searches += 1;
            expanded += outcome.expanded;
            partial |= outcome.partial;
            for opportunity in outcome.opportunities {
                if !dedup.is_duplicate(&opportunity) {
                    opportunities.push(opportunity);
                }
            }
        }

        opportunities.sort_by(|a, b| {
            b.net_profit
                .cmp(&a.net_profit)
                .then_with(|| b.roi.cmp(&a.roi))
                .then_with(|| a.path.len().cmp(&b.path.len()))
        });

        BatchResult {
            opportunities,
            partial,
            searches,
            expanded,
        }
    }

    /// Runs the whole batch sequentially.
    pub fn run(&self, snapshot: &GraphSnapshot) -> Result<BatchResult, ArbError> {
        let starts = Self::start_positions(snapshot);
        log::info!("running batch over {} start positions", starts.len());

        let mut outcomes = Vec::with_capacity(starts.len());
        for start in &starts {
            outcomes.push(self.engine.search(snapshot, start)?);
        }
        let result = Self::aggregate(outcomes);
        log::info!(
            "batch complete: {} opportunities from {} searches ({} expansions)",
            result.opportunities.len(),
            result.searches,
            result.expanded
        );
        Ok(result)
    }
}
