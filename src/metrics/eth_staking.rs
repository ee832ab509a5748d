//! ETH staking rate (total staked / total supply, as a percentage).
//!
//! Production would combine Etherscan (total supply) with Beaconcha.in
//! (total staked). Until those keys are provisioned this serves the frozen
//! snapshot values the markets were written against.

use super::Metric;
use tracing::info;

/// Snapshot figures, early-2026 projection.
const TOTAL_STAKED_ETH: f64 = 34_500_000.0;
const TOTAL_SUPPLY_ETH: f64 = 120_000_000.0;

pub struct EthStakingRate;

#[async_trait::async_trait]
impl Metric for EthStakingRate {
    fn name(&self) -> &'static str {
        "eth_staking_rate"
    }

    async fn measure(&self) -> Option<f64> {
        info!("📸 Taking snapshot of ETH staking data...");
        let staking_rate = (TOTAL_STAKED_ETH / TOTAL_SUPPLY_ETH) * 100.0;
        info!("📊 Snapshot value: {:.2}%", staking_rate);
        Some(staking_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_rate_is_28_75_percent() {
        let value = EthStakingRate.measure().await.unwrap();
        assert!((value - 28.75).abs() < 1e-9);
    }
}
