//! Resolution worker.
//!
//! Polls the market store on a fixed cadence and drives every due market
//! through measure -> decide -> pipeline -> mark-resolved. One logical
//! worker, strictly sequential: the oracle key authorizes at most one
//! outcome per market and double-submission must be impossible, so markets
//! are never resolved concurrently.
//!
//! The tick is a plain function over `(now, pending markets)`; scheduling is
//! just a sleep around it, which keeps the decision logic testable without
//! real time passing.

use crate::metrics::MetricRegistry;
use crate::models::{Market, Outcome};
use crate::pipeline::{NodeQuery, Prover, TransactionPipeline};
use crate::store::MarketStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Markets eligible for resolution this tick: pending and past deadline.
pub fn due_markets(now: i64, pending: &[Market]) -> Vec<&Market> {
    pending.iter().filter(|m| m.is_due(now)).collect()
}

/// What one tick did, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ResolutionWorker<N, P> {
    store: Arc<MarketStore>,
    registry: Arc<MetricRegistry>,
    pipeline: TransactionPipeline<N, P>,
    poll_interval: Duration,
}

impl<N: NodeQuery, P: Prover> ResolutionWorker<N, P> {
    pub fn new(
        store: Arc<MarketStore>,
        registry: Arc<MetricRegistry>,
        pipeline: TransactionPipeline<N, P>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            pipeline,
            poll_interval,
        }
    }

    /// Run forever. Per-market failures are logged and retried next tick;
    /// only external termination stops the loop.
    pub async fn run(self) -> Result<()> {
        info!("🤖 Oracle worker is running and monitoring pending markets...");
        loop {
            let now = chrono::Utc::now().timestamp();
            match self.tick(now).await {
                Ok(report) if report.due > 0 => {
                    info!(
                        "⏱️ Tick: {} due, {} resolved, {} skipped, {} failed",
                        report.due, report.resolved, report.skipped, report.failed
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("worker tick failed: {e:#}"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Resolve every due market once. A market is marked resolved if and
    /// only if its pipeline call succeeded; any failure leaves it pending
    /// for the next tick and never blocks the other markets.
    pub async fn tick(&self, now: i64) -> Result<TickReport> {
        let pending = self.store.list_pending()?;
        let due = due_markets(now, &pending);

        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        for market in due {
            info!("⏰ Deadline reached for market: {}", market.market_id);

            let Some(metric) = self.registry.get(market.metric_type) else {
                warn!(
                    "❌ No handler for metric type {} (market {})",
                    market.metric_type.as_str(),
                    market.market_id
                );
                report.skipped += 1;
                continue;
            };

            let Some(value) = metric.measure().await else {
                info!(
                    "⚠️ Could not fetch {} for market {}, retrying next loop...",
                    metric.name(),
                    market.market_id
                );
                report.skipped += 1;
                continue;
            };

            let winning_option = Outcome::decide(value, market.threshold);

            match self.pipeline.resolve(&market.market_id, winning_option).await {
                Ok(execution_id) => {
                    // A failed store write must not abort the remaining
                    // markets; the next tick re-resolves and the network
                    // deduplicates the resubmission by execution id.
                    if let Err(e) = self.store.mark_resolved(&market.market_id) {
                        warn!(
                            "❌ Failed to record resolution for market {}: {e:#}",
                            market.market_id
                        );
                    }
                    info!(
                        "✅ Market {} resolved as {} (execution {})",
                        market.market_id,
                        winning_option.label(),
                        execution_id
                    );
                    report.resolved += 1;
                }
                Err(e) => {
                    warn!(
                        "❌ Resolution failed for market {} at stage {}: {e}",
                        market.market_id,
                        e.stage()
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
