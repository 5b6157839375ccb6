//! Rolling risk trackers feeding the cost model and the search heuristic.

use common::{ArbError, PositionKey, Route};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Number of recent relative returns retained per position.
pub const VOLATILITY_WINDOW: usize = 100;

/// Number of recent transfer-time observations retained per route.
pub const TRANSFER_TIME_WINDOW: usize = 50;

/// Fallback transfer-time estimate (seconds) for routes with no history.
pub const DEFAULT_TRANSFER_TIME_ESTIMATE: Decimal = dec!(60);

/// Realized volatility the adaptive factor is normalized against.
const VOLATILITY_BASELINE: Decimal = dec!(0.01);

/// Floor multiplier for the adaptive volatility factor.
const FACTOR_FLOOR: Decimal = dec!(0.5);

#[derive(Debug, Default)]
struct ReturnWindow {
    last_price: Option<Decimal>,
    returns: VecDeque<Decimal>,
}

/// Tracks realized volatility per position as the population standard
/// deviation of a rolling window of relative price returns.
///
/// Methods take `&self` so a tracker can be shared behind an `Arc` between
/// the feed that records observations and the searches that read them.
#[derive(Debug, Default)]
pub struct VolatilityTracker {
    windows: RwLock<HashMap<PositionKey, ReturnWindow>>,
}

impl VolatilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a price observation. The first observation per position only
    /// seeds the window; returns accumulate from the second one on.
    pub fn update_price(&self, key: &PositionKey, price: Decimal) -> Result<(), ArbError> {
        if price <= Decimal::ZERO {
            return Err(ArbError::InvalidPrice {
                key: key.to_string(),
                price: price.to_string(),
            });
        }
        let mut windows = self.windows.write().expect("volatility lock poisoned");
        let window = windows.entry(key.clone()).or_default();
        if let Some(last) = window.last_price {
            window.returns.push_back((price - last) / last);
            if window.returns.len() > VOLATILITY_WINDOW {
                window.returns.pop_front();
            }
        }
        window.last_price = Some(price);
        Ok(())
    }

    /// Realized volatility of a position. Zero until at least two returns
    /// have been recorded.
    pub fn volatility(&self, key: &PositionKey) -> Decimal {
        let windows = self.windows.read().expect("volatility lock poisoned");
        let Some(window) = windows.get(key) else {
            return Decimal::ZERO;
        };
        let n = window.returns.len();
        if n < 2 {
            return Decimal::ZERO;
        }
        let count = Decimal::from(n as u64);
        let mean: Decimal = window.returns.iter().sum::<Decimal>() / count;
        let variance: Decimal = window
            .returns
            .iter()
            .map(|r| (*r - mean) * (*r - mean))
            .sum::<Decimal>()
            / count;
        variance.sqrt().unwrap_or(Decimal::ZERO)
    }

    /// Scales a base volatility factor by realized volatility relative to the
    /// baseline, floored at half the base so calm markets never zero out the
    /// risk term.
    pub fn factor(&self, key: &PositionKey, base: Decimal) -> Decimal {
        let scaled = base * self.volatility(key) / VOLATILITY_BASELINE;
        scaled.max(base * FACTOR_FLOOR)
    }
}

/// Tracks observed transfer durations per directed route and estimates the
/// worst plausible duration as a nearest-rank 95th percentile.
#[derive(Debug, Default)]
pub struct TransferTimeTracker {
    windows: RwLock<HashMap<Route, VecDeque<Decimal>>>,
}

impl TransferTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observed transfer duration in seconds.
    pub fn record(&self, route: &Route, seconds: Decimal) -> Result<(), ArbError> {
        if seconds <= Decimal::ZERO {
            return Err(ArbError::InvalidTransfer(format!(
                "non-positive transfer time {seconds} for {} -> {}",
                route.source, route.target
            )));
        }
        let mut windows = self.windows.write().expect("transfer-time lock poisoned");
        let window = windows.entry(route.clone()).or_default();
        window.push_back(seconds);
        if window.len() > TRANSFER_TIME_WINDOW {
            window.pop_front();
        }
        Ok(())
    }

    /// Nearest-rank P95 of the recorded durations, or `None` for an unseen
    /// route.
    pub fn estimate(&self, route: &Route) -> Option<Decimal> {
        let windows = self.windows.read().expect("transfer-time lock poisoned");
        let window = windows.get(route)?;
        if window.is_empty() {
            return None;
        }
        let mut sorted: Vec<Decimal> = window.iter().copied().collect();
        sorted.sort_unstable();
        let rank = (95 * sorted.len()).div_ceil(100);
        Some(sorted[rank - 1])
    }

    /// Like [`estimate`](Self::estimate), falling back to `default` for
    /// unseen routes.
    pub fn estimate_or(&self, route: &Route, default: Decimal) -> Decimal {
        self.estimate(route).unwrap_or(default)
    }

    pub fn has_samples(&self, route: &Route) -> bool {
        let windows = self.windows.read().expect("transfer-time lock poisoned");
        windows.get(route).is_some_and(|w| !w.is_empty())
    }
}

/// Both risk trackers bundled for handing to a search engine.
#[derive(Debug, Default)]
pub struct RiskTrackers {
    pub volatility: VolatilityTracker,
    pub transfer_time: TransferTimeTracker,
}

impl RiskTrackers {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PositionKey {
        PositionKey::new("kraken", "USDT")
    }

    fn route() -> Route {
        Route {
            source: PositionKey::new("kraken", "USDT"),
            target: PositionKey::new("coinbase", "USDT"),
        }
    }

    #[test]
    fn test_volatility_rejects_non_positive_price() {
        let tracker = VolatilityTracker::new();
        assert!(tracker.update_price(&key(), Decimal::ZERO).is_err());
        assert!(tracker.update_price(&key(), dec!(-1)).is_err());
    }

    #[test]
    fn test_volatility_is_zero_below_two_returns() {
        let tracker = VolatilityTracker::new();
        assert_eq!(tracker.volatility(&key()), Decimal::ZERO);
        tracker.update_price(&key(), dec!(1.00)).unwrap();
        tracker.update_price(&key(), dec!(1.01)).unwrap();
        // One return so far.
        assert_eq!(tracker.volatility(&key()), Decimal::ZERO);
    }

    #[test]
    fn test_volatility_of_constant_prices_is_zero() {
        let tracker = VolatilityTracker::new();
        for _ in 0..10 {
            tracker.update_price(&key(), dec!(1.00)).unwrap();
        }
        assert_eq!(tracker.volatility(&key()), Decimal::ZERO);
    }

    #[test]
    fn test_volatility_grows_with_swings() {
        let calm = VolatilityTracker::new();
        let wild = VolatilityTracker::new();
        for i in 0..20 {
            let wobble = if i % 2 == 0 { dec!(0.001) } else { dec!(-0.001) };
            calm.update_price(&key(), dec!(1.00) + wobble).unwrap();
            wild.update_price(&key(), dec!(1.00) + wobble * dec!(50)).unwrap();
        }
        assert!(wild.volatility(&key()) > calm.volatility(&key()));
    }

    #[test]
    fn test_window_caps_at_limit() {
        let tracker = VolatilityTracker::new();
        for i in 0..(VOLATILITY_WINDOW * 2) {
            let price = dec!(1.00) + Decimal::from(i as u64) * dec!(0.0001);
            tracker.update_price(&key(), price).unwrap();
        }
        let windows = tracker.windows.read().unwrap();
        assert_eq!(windows[&key()].returns.len(), VOLATILITY_WINDOW);
    }

    #[test]
    fn test_adaptive_factor_scales_and_floors() {
        let tracker = VolatilityTracker::new();
        // No history: factor floors at half the base.
        assert_eq!(tracker.factor(&key(), dec!(0.1)), dec!(0.05));

        let wild = VolatilityTracker::new();
        for i in 0..20 {
            let wobble = if i % 2 == 0 { dec!(0.05) } else { dec!(-0.05) };
            wild.update_price(&key(), dec!(1.00) + wobble).unwrap();
        }
        assert!(wild.factor(&key(), dec!(0.1)) > dec!(0.1));
    }

    #[test]
    fn test_transfer_time_rejects_non_positive_duration() {
        let tracker = TransferTimeTracker::new();
        let err = tracker.record(&route(), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, ArbError::InvalidTransfer(_)));
    }

    #[test]
    fn test_transfer_time_p95_nearest_rank() {
        let tracker = TransferTimeTracker::new();
        for seconds in [dec!(10), dec!(10), dec!(10), dec!(10), dec!(100)] {
            tracker.record(&route(), seconds).unwrap();
        }
        assert_eq!(tracker.estimate(&route()), Some(dec!(100)));
    }

    #[test]
    fn test_transfer_time_unseen_route_falls_back() {
        let tracker = TransferTimeTracker::new();
        assert_eq!(tracker.estimate(&route()), None);
        assert_eq!(
            tracker.estimate_or(&route(), DEFAULT_TRANSFER_TIME_ESTIMATE),
            dec!(60)
        );
        assert!(!tracker.has_samples(&route()));
    }

    #[test]
    fn test_transfer_time_window_caps_at_limit() {
        let tracker = TransferTimeTracker::new();
        for _ in 0..(TRANSFER_TIME_WINDOW * 2) {
            tracker.record(&route(), dec!(30)).unwrap();
        }
        let windows = tracker.windows.read().unwrap();
        assert_eq!(windows[&route()].len(), TRANSFER_TIME_WINDOW);
    }
}
