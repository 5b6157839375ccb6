//! The arbitrage graph: positions as nodes, transfers as edges.

use crate::cost;
use crate::prelude::*;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::HashMap;

/// A copyable position identifier for use as a `DiGraphMap` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionId(u64);

impl PositionId {
    fn new(id: u64) -> Self {
        PositionId(id)
    }
}

/// A directed transfer between two positions. The transfer is the edge weight
/// in the `DiGraphMap`; its cost fields are recomputed on every price update
/// of either endpoint, so `weight` is never stale.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// Fee rate applied to the source-side notional.
    pub fee_rate: Decimal,
    /// Estimated transfer time in seconds.
    pub transfer_time: Decimal,
    /// Volatility factor frozen for this edge at add/update time.
    pub volatility_factor: Decimal,
    /// `fee_rate × source price`.
    pub fee_cost: Decimal,
    /// `|Δprice| × volatility_factor`.
    pub volatility_cost: Decimal,
    /// `fee_cost + volatility_cost`.
    pub weight: Decimal,
}

impl Transfer {
    fn priced(
        fee_rate: Decimal,
        transfer_time: Decimal,
        volatility_factor: Decimal,
        source_price: Decimal,
        target_price: Decimal,
    ) -> Self {
        let mut transfer = Transfer {
            fee_rate,
            transfer_time,
            volatility_factor,
            fee_cost: Decimal::ZERO,
            volatility_cost: Decimal::ZERO,
            weight: Decimal::ZERO,
        };
        transfer.reprice(source_price, target_price);
        transfer
    }

    fn reprice(&mut self, source_price: Decimal, target_price: Decimal) {
        self.fee_cost = cost::fee_component(source_price, self.fee_rate);
        self.volatility_cost =
            cost::volatility_component(source_price, target_price, self.volatility_factor);
        self.weight = self.fee_cost + self.volatility_cost;
    }
}

/// A directed weighted graph modeling the multi-exchange stablecoin
/// arbitrage environment. The graph exclusively owns the position set and
/// the adjacency; at most one transfer exists per ordered position pair.
#[derive(Debug, Clone, Default)]
pub struct ArbitrageGraph {
    graph: DiGraphMap<PositionId, Transfer>,
    keys: HashMap<PositionId, PositionKey>,
    ids: HashMap<PositionKey, PositionId>,
    prices: HashMap<PositionId, Price>,
    next_id: u64,
}

impl ArbitrageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create_id(&mut self, key: &PositionKey) -> PositionId {
        if let Some(&id) = self.ids.get(key) {
            id
        } else {
            let id = PositionId::new(self.next_id);
            self.next_id += 1;
            self.keys.insert(id, key.clone());
            self.ids.insert(key.clone(), id);
            self.graph.add_node(id);
            id
        }
    }

    /// Creates a position, or re-prices it when the key already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ArbError::InvalidPrice`] for a non-positive price. The node
    /// is rejected, never defaulted.
    pub fn add_node(&mut self, key: PositionKey, price: Price) -> Result<PositionId, ArbError> {
        if price.0 <= Decimal::ZERO {
            return Err(ArbError::InvalidPrice {
                key: key.to_string(),
                price: price.0.to_string(),
            });
        }
        if self.ids.contains_key(&key) {
            self.update_price(&key, price)?;
            Ok(self.ids[&key])
        } else {
            let id = self.get_or_create_id(&key);
            self.prices.insert(id, price);
            Ok(id)
        }
    }

    /// Adds a transfer between two existing positions, replacing any previous
    /// transfer for the same ordered pair.
    ///
    /// # Errors
    ///
    /// Fails with [`ArbError::InvalidTransfer`] on a self-loop,
    /// [`ArbError::InvalidConfiguration`] on a negative fee rate, and
    /// [`ArbError::NotFound`] when either endpoint is missing.
    pub fn add_edge(
        &mut self,
        source: &PositionKey,
        target: &PositionKey,
        fee_rate: Decimal,
        transfer_time: Decimal,
        volatility_factor: Decimal,
    ) -> Result<(), ArbError> {
        if source == target {
            return Err(ArbError::InvalidTransfer(format!(
                "self-loop on {source}"
            )));
        }
        if fee_rate < Decimal::ZERO {
            return Err(ArbError::InvalidConfiguration(format!(
                "negative fee rate {fee_rate} for {source} -> {target}"
            )));
        }
        let source_id = *self
            .ids
            .get(source)
            .ok_or_else(|| ArbError::NotFound(source.to_string()))?;
        let target_id = *self
            .ids
            .get(target)
            .ok_or_else(|| ArbError::NotFound(target.to_string()))?;

        let transfer = Transfer::priced(
            fee_rate,
            transfer_time,
            volatility_factor,
            self.prices[&source_id].0,
            self.prices[&target_id].0,
        );
        self.graph.add_edge(source_id, target_id, transfer);
        Ok(())
    }

    /// Re-prices a position and recomputes the weight of every incident
    /// transfer, incoming and outgoing. O(degree).
    pub fn update_price(&mut self, key: &PositionKey, price: Price) -> Result<(), ArbError> {
        if price.0 <= Decimal::ZERO {
            return Err(ArbError::InvalidPrice {
                key: key.to_string(),
                price: price.0.to_string(),
            });
        }
        let id = *self
            .ids
            .get(key)
            .ok_or_else(|| ArbError::NotFound(key.to_string()))?;
        self.prices.insert(id, price);

        let mut incident: Vec<(PositionId, PositionId)> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .map(|succ| (id, succ))
            .collect();
        incident.extend(
            self.graph
                .neighbors_directed(id, Direction::Incoming)
                .map(|pred| (pred, id)),
        );

        for (source_id, target_id) in incident {
            let source_price = self.prices[&source_id].0;
            let target_price = self.prices[&target_id].0;
            if let Some(transfer) = self.graph.edge_weight_mut(source_id, target_id) {
                transfer.reprice(source_price, target_price);
            }
        }
        Ok(())
    }

    /// Applies a batch of price updates. Keys the graph does not hold are
    /// skipped.
    pub fn update_prices(
        &mut self,
        updates: impl IntoIterator<Item = (PositionKey, Price)>,
    ) -> Result<(), ArbError> {
        for (key, price) in updates {
            if self.ids.contains_key(&key) {
                self.update_price(&key, price)?;
            } else {
                log::debug!("skipping price update for unknown position {key}");
            }
        }
        Ok(())
    }

    /// Returns a lazy, restartable iterator over the outgoing transfers of a
    /// position. Empty when the key is unknown.
    pub fn neighbors<'a>(
        &'a self,
        key: &PositionKey,
    ) -> Box<dyn Iterator<Item = (&'a PositionKey, &'a Transfer)> + 'a> {
        if let Some(&id) = self.ids.get(key) {
            Box::new(
                self.graph
                    .edges(id)
                    .map(|(_, target_id, transfer)| (&self.keys[&target_id], transfer)),
            )
        } else {
            Box::new(std::iter::empty())
        }
    }

    /// Current price of a position.
    pub fn price(&self, key: &PositionKey) -> Option<Price> {
        self.ids.get(key).map(|id| self.prices[id])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns an immutable snapshot of the current graph state. Searches run
    /// against snapshots; live updates never mutate a frozen batch.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            graph: self.graph.clone(),
            keys: self.keys.clone(),
            ids: self.ids.clone(),
            prices: self.prices.clone(),
        }
    }
}

/// An immutable copy of the graph, consumed by search batches.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    graph: DiGraphMap<PositionId, Transfer>,
    keys: HashMap<PositionId, PositionKey>,
    ids: HashMap<PositionKey, PositionId>,
    prices: HashMap<PositionId, Price>,
}

impl GraphSnapshot {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Resolves a key to its node id.
    pub fn id(&self, key: &PositionKey) -> Option<PositionId> {
        self.ids.get(key).copied()
    }

    /// The key behind a node id.
    pub fn key(&self, id: PositionId) -> &PositionKey {
        &self.keys[&id]
    }

    /// The price behind a node id.
    pub fn price_of(&self, id: PositionId) -> Decimal {
        self.prices[&id].0
    }

    /// Current price of a position.
    pub fn price(&self, key: &PositionKey) -> Option<Price> {
        self.ids.get(key).map(|id| self.prices[id])
    }

    /// Outgoing transfers of a node.
    pub fn neighbors_by_id(
        &self,
        id: PositionId,
    ) -> impl Iterator<Item = (PositionId, &Transfer)> + '_ {
        self.graph
            .edges(id)
            .map(|(_, target_id, transfer)| (target_id, transfer))
    }

    /// All positions with their prices.
    pub fn positions(&self) -> impl Iterator<Item = (&PositionKey, Price)> + '_ {
        self.keys.iter().map(|(id, key)| (key, self.prices[id]))
    }

    /// All transfers as (source key, target key, transfer).
    pub fn all_edges(
        &self,
    ) -> impl Iterator<Item = (&PositionKey, &PositionKey, &Transfer)> + '_ {
        self.graph
            .all_edges()
            .map(|(source_id, target_id, transfer)| {
                (&self.keys[&source_id], &self.keys[&target_id], transfer)
            })
    }
}
