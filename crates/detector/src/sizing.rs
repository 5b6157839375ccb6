//! Volume sizing for detected opportunities under tiered fees.

use common::{ArbError, Opportunity};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One fee tier: the rate charged per hop for volumes at or above
/// `min_volume`, up to the next tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeTier {
    pub min_volume: Decimal,
    pub rate: Decimal,
}

/// The chosen trade volume and the net profit it yields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub volume: Decimal,
    pub net_profit: Decimal,
}

/// Picks the profit-maximizing volume for an opportunity given a tiered fee
/// schedule and an available-funds cap.
///
/// Within a tier, profit is linear in volume, so the maximum over the
/// feasible range is attained at a tier boundary or at the cap; the
/// optimizer evaluates exactly those candidates.
#[derive(Debug, Clone)]
pub struct VolumeOptimizer {
    tiers: Vec<FeeTier>,
}

impl Default for VolumeOptimizer {
    fn default() -> Self {
        VolumeOptimizer {
            tiers: vec![
                FeeTier { min_volume: dec!(0), rate: dec!(0.001) },
                FeeTier { min_volume: dec!(1000), rate: dec!(0.0005) },
                FeeTier { min_volume: dec!(10000), rate: dec!(0.0002) },
                FeeTier { min_volume: dec!(100000), rate: dec!(0.0001) },
            ],
        }
    }
}

impl VolumeOptimizer {
    /// Creates an optimizer over a custom schedule. Tiers must start at zero
    /// volume, ascend strictly, and carry non-negative rates.
    pub fn new(tiers: Vec<FeeTier>) -> Result<Self, ArbError> {
        if tiers.is_empty() {
            return Err(ArbError::InvalidConfiguration(
                "fee schedule needs at least one tier".to_string(),
            ));
        }
        if tiers[0].min_volume != Decimal::ZERO {
            return Err(ArbError::InvalidConfiguration(
                "first fee tier must start at zero volume".to_string(),
            ));
        }
        for pair in tiers.windows(2) {
            if pair[1].min_volume <= pair[0].min_volume {
                return Err(ArbError::InvalidConfiguration(format!(
                    "fee tiers must ascend strictly, got {} after {}",
                    pair[1].min_volume, pair[0].min_volume
                )));
            }
        }
        if let Some(tier) = tiers.iter().find(|t| t.rate < Decimal::ZERO) {
            return Err(ArbError::InvalidConfiguration(format!(
                "negative fee rate {} in tier at volume {}",
                tier.rate, tier.min_volume
            )));
        }
        Ok(VolumeOptimizer { tiers })
    }

    /// The per-hop fee rate applying to a given volume.
    pub fn effective_fee(&self, volume: Decimal) -> Decimal {
        self.tiers
            .iter()
            .rev()
            .find(|tier| tier.min_volume <= volume)
            .map(|tier| tier.rate)
            .unwrap_or(self.tiers[0].rate)
    }

    /// Finds the volume maximizing
    /// `(gross_margin_rate - hops x effective_fee(volume)) x volume` within
    /// the available funds. `None` when no positive volume turns a profit.
    pub fn optimize(
        &self,
        gross_margin_rate: Decimal,
        hops: usize,
        available: Decimal,
    ) -> Option<Sizing> {
        if available <= Decimal::ZERO {
            return None;
        }
        let hops = Decimal::from(hops as u64);

        let mut candidates: Vec<Decimal> = self
            .tiers
            .iter()
            .map(|tier| tier.min_volume)
            .filter(|v| *v > Decimal::ZERO && *v <= available)
            .collect();
        candidates.push(available);

        let mut best: Option<Sizing> = None;
        for volume in candidates {
            let net_profit = (gross_margin_rate - hops * self.effective_fee(volume)) * volume;
            if net_profit > Decimal::ZERO
                && best.map_or(true, |b| net_profit > b.net_profit)
            {
                best = Some(Sizing { volume, net_profit });
            }
        }
        best
    }

    /// Sizes a detected opportunity. The opportunity's per-unit margin before
    /// fees is `net_profit + total_fee`; volatility cost stays subtracted
    /// since tiering only changes the fee side.
    pub fn optimize_for(&self, opportunity: &Opportunity, available: Decimal) -> Option<Sizing> {
        let gross_margin_rate = opportunity.net_profit + opportunity.total_fee;
        self.optimize(gross_margin_rate, opportunity.hops(), available)
    }
}
