//! Outcome measurement sources.
//!
//! Each market names a [`MetricType`]; the registry maps that tag to a
//! [`Metric`] implementation. A metric never raises past this boundary: any
//! fetch failure comes back as `None` and the worker retries the market on
//! its next tick.

mod coingecko;
mod eth_staking;
mod generic;

pub use coingecko::CoinGeckoPrice;
pub use eth_staking::EthStakingRate;
pub use generic::GenericMetric;

use crate::models::MetricType;
use std::collections::HashMap;
use tracing::info;

#[async_trait::async_trait]
pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;

    /// Take a snapshot measurement. `None` means the value could not be
    /// fetched (or the metric is manual-resolution only).
    async fn measure(&self) -> Option<f64>;
}

pub struct MetricRegistry {
    metrics: HashMap<MetricType, Box<dyn Metric>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            metrics: HashMap::new(),
        }
    }

    /// Registry with every built-in metric handler.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(MetricType::EthStakingRate, Box::new(EthStakingRate));
        registry.register(MetricType::EthPrice, Box::new(CoinGeckoPrice::eth()));
        registry.register(MetricType::BtcPrice, Box::new(CoinGeckoPrice::btc()));
        registry.register(MetricType::Generic, Box::new(GenericMetric));
        registry
    }

    pub fn register(&mut self, metric_type: MetricType, metric: Box<dyn Metric>) {
        info!("✅ Registered metric: {}", metric.name());
        self.metrics.insert(metric_type, metric);
    }

    pub fn get(&self, metric_type: MetricType) -> Option<&dyn Metric> {
        self.metrics.get(&metric_type).map(|m| m.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.metrics.values().map(|m| m.name()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
