use super::Metric;
use tracing::warn;

/// Metric for markets without an automatic data source. Always measures
/// `None`, so the worker skips the market and an operator resolves it through
/// the CLI.
pub struct GenericMetric;

#[async_trait::async_trait]
impl Metric for GenericMetric {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn measure(&self) -> Option<f64> {
        warn!("⚠️ Generic metric - requires manual resolution");
        None
    }
}
