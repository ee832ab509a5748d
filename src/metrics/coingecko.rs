//! Spot prices from the CoinGecko simple-price endpoint.

use super::Metric;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

pub struct CoinGeckoPrice {
    client: Client,
    /// CoinGecko asset id, e.g. `"ethereum"`.
    asset_id: &'static str,
    metric_name: &'static str,
}

impl CoinGeckoPrice {
    fn new(asset_id: &'static str, metric_name: &'static str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            asset_id,
            metric_name,
        }
    }

    pub fn eth() -> Self {
        Self::new("ethereum", "eth_price")
    }

    pub fn btc() -> Self {
        Self::new("bitcoin", "btc_price")
    }

    async fn fetch_usd_price(&self) -> anyhow::Result<f64> {
        let url = format!(
            "https://api.coingecko.com/api/v3/simple/price?ids={}&vs_currencies=usd",
            self.asset_id
        );

        let body: Value = self.client.get(&url).send().await?.json().await?;

        body.get(self.asset_id)
            .and_then(|asset| asset.get("usd"))
            .and_then(|price| price.as_f64())
            .ok_or_else(|| anyhow::anyhow!("unexpected CoinGecko response shape: {body}"))
    }
}

#[async_trait::async_trait]
impl Metric for CoinGeckoPrice {
    fn name(&self) -> &'static str {
        self.metric_name
    }

    async fn measure(&self) -> Option<f64> {
        info!("📸 Taking snapshot of {} price data...", self.asset_id);
        match self.fetch_usd_price().await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!("❌ Error fetching {} price: {e:#}", self.asset_id);
                None
            }
        }
    }
}
