//! Capability interface for exchange price sources.
//!
//! The detector consumes prices, fee schedules and supported-asset lists
//! through the [`PriceSource`] trait. Implementations do whatever fetching
//! they need *before* a graph build starts; every method here is synchronous
//! and must not block on I/O. Concrete sources are selected through a
//! [`SourceRegistry`] rather than an inheritance hierarchy.

use common::{ArbError, Asset, ExchangeId, Price};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Default transfer-time estimate, in seconds, when a source has no better data.
pub const DEFAULT_TRANSFER_TIME_SECS: Decimal = dec!(60);

/// A transfer-fee table for one exchange.
///
/// Fees are rates applied to the source-side notional. A negative rate is a
/// configuration error and is rejected by the graph builder before any search.
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    default_rate: Decimal,
    overrides: HashMap<(Asset, Asset), Decimal>,
}

impl FeeSchedule {
    /// Creates a schedule with a flat rate for every transfer.
    pub fn flat(default_rate: Decimal) -> Self {
        FeeSchedule {
            default_rate,
            overrides: HashMap::new(),
        }
    }

    /// Sets a rate override for a specific ordered asset pair.
    pub fn with_override(mut self, source: Asset, target: Asset, rate: Decimal) -> Self {
        self.overrides.insert((source, target), rate);
        self
    }

    /// The fee rate for transferring `source` into `target`.
    pub fn rate(&self, source: &Asset, target: &Asset) -> Decimal {
        self.overrides
            .get(&(source.clone(), target.clone()))
            .copied()
            .unwrap_or(self.default_rate)
    }
}

/// A source of current prices and fees for one exchange.
pub trait PriceSource: Send + Sync {
    /// The exchange this source reports for.
    fn exchange_id(&self) -> &ExchangeId;

    /// Current price of one stablecoin in the reference fiat currency.
    fn price(&self, asset: &Asset) -> Result<Price, ArbError>;

    /// The full current price table. The graph builder calls this once per
    /// source per build and caches the result.
    fn price_table(&self) -> Result<BTreeMap<Asset, Price>, ArbError>;

    /// The exchange's transfer-fee schedule.
    fn fee_schedule(&self) -> &FeeSchedule;

    /// Stablecoins this exchange supports.
    fn supported_assets(&self) -> BTreeSet<Asset>;

    /// Estimated transfer time in seconds for an asset-to-asset move
    /// originating on this exchange.
    fn transfer_time(&self, _source: &Asset, _target: &Asset) -> Decimal {
        DEFAULT_TRANSFER_TIME_SECS
    }
}

/// A fixed-table price source, used for tests and synthetic scenarios.
#[derive(Debug, Clone)]
pub struct StaticPriceSource {
    exchange: ExchangeId,
    prices: BTreeMap<Asset, Price>,
    fees: FeeSchedule,
    transfer_time: Decimal,
}

impl StaticPriceSource {
    /// Creates a static source with a flat fee rate and the default transfer time.
    pub fn new(
        exchange: impl Into<ExchangeId>,
        prices: impl IntoIterator<Item = (Asset, Price)>,
        fee_rate: Decimal,
    ) -> Self {
        StaticPriceSource {
            exchange: exchange.into(),
            prices: prices.into_iter().collect(),
            fees: FeeSchedule::flat(fee_rate),
            transfer_time: DEFAULT_TRANSFER_TIME_SECS,
        }
    }

    /// Replaces the fee schedule.
    pub fn with_fee_schedule(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    /// Sets the transfer-time estimate in seconds.
    pub fn with_transfer_time(mut self, seconds: Decimal) -> Self {
        self.transfer_time = seconds;
        self
    }
}

impl PriceSource for StaticPriceSource {
    fn exchange_id(&self) -> &ExchangeId {
        &self.exchange
    }

    fn price(&self, asset: &Asset) -> Result<Price, ArbError> {
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| ArbError::PriceUnavailable {
                exchange: self.exchange.0.clone(),
                asset: asset.0.clone(),
            })
    }

    fn price_table(&self) -> Result<BTreeMap<Asset, Price>, ArbError> {
        Ok(self.prices.clone())
    }

    fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    fn supported_assets(&self) -> BTreeSet<Asset> {
        self.prices.keys().cloned().collect()
    }

    fn transfer_time(&self, _source: &Asset, _target: &Asset) -> Decimal {
        self.transfer_time
    }
}

/// A registry of price sources, keyed by exchange.
///
/// Sources are kept in insertion order so graph construction walks exchanges
/// deterministically.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        SourceRegistry {
            sources: Vec::new(),
        }
    }

    /// Registers a source. A source re-registered for the same exchange
    /// replaces the earlier one.
    pub fn register(&mut self, source: Arc<dyn PriceSource>) {
        if let Some(existing) = self
            .sources
            .iter_mut()
            .find(|s| s.exchange_id() == source.exchange_id())
        {
            *existing = source;
        } else {
            self.sources.push(source);
        }
    }

    /// Looks up the source for an exchange.
    pub fn get(&self, exchange: &ExchangeId) -> Option<&Arc<dyn PriceSource>> {
        self.sources.iter().find(|s| s.exchange_id() == exchange)
    }

    /// Iterates over all registered sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PriceSource>> {
        self.sources.iter()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True when no sources are registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
