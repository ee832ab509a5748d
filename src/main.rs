//! Oracle CLI: run the settlement worker, serve the market API, and manage
//! markets from the command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use prediction_oracle::{
    api,
    config::OracleConfig,
    metrics::MetricRegistry,
    models::{Market, MarketStatus, MetricType, Outcome},
    pipeline::{field, NodeQuery, TransactionPipeline},
    store::MarketStore,
    worker::ResolutionWorker,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "oracle",
    version,
    about = "Settlement oracle for prediction markets on Aleo"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the resolution worker loop.
    Run {
        /// Also serve the market HTTP API alongside the worker.
        #[arg(long)]
        with_api: bool,
    },
    /// Serve the market HTTP API only.
    Serve,
    /// Register a new market.
    CreateMarket {
        /// Market title; also the source of the on-chain pool key.
        title: String,
        /// Resolution threshold the metric is compared against.
        threshold: f64,
        /// Resolution deadline, unix seconds.
        deadline: i64,
        /// Metric type (eth_staking_rate, eth_price, btc_price, generic).
        #[arg(short, long, default_value = "eth_staking_rate")]
        metric: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List registered markets.
    List {
        /// Filter by status (pending | resolved).
        #[arg(long)]
        status: Option<String>,
        /// Also check whether each pool exists on-chain.
        #[arg(long)]
        on_chain: bool,
    },
    /// Resolve one market manually through the full pipeline.
    Resolve {
        market_id: String,
        /// Winning option number: 1 = YES, 2 = NO.
        option: u64,
    },
    /// List registered metric handlers.
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = OracleConfig::from_env()?;
    let store = Arc::new(MarketStore::new(&config.database_path)?);

    match cli.command {
        Command::Run { with_api } => {
            if !config.has_credentials() {
                // The worker still runs: due markets are skipped with a
                // diagnostic until the operator provides credentials.
                tracing::warn!("❌ Missing ORACLE_PRIVATE_KEY or ALEO_NODE_URL in environment");
            }

            if with_api {
                let api_store = store.clone();
                let port = config.api_port;
                tokio::spawn(async move {
                    if let Err(e) = api::serve(api_store, port).await {
                        tracing::error!("market API exited: {e:#}");
                    }
                });
            }

            let pipeline = TransactionPipeline::from_config(&config)?;
            let registry = Arc::new(MetricRegistry::with_defaults());
            let worker = ResolutionWorker::new(
                store,
                registry,
                pipeline,
                Duration::from_secs(config.poll_interval_secs),
            );
            worker.run().await
        }

        Command::Serve => api::serve(store, config.api_port).await,

        Command::CreateMarket {
            title,
            threshold,
            deadline,
            metric,
            description,
        } => {
            let metric_type = MetricType::parse(&metric)
                .with_context(|| format!("unknown metric type: {metric}"))?;

            let market_id = if field::is_field_literal(&title) {
                title.clone()
            } else {
                field::string_to_field(&title)
            };

            let market = Market::new(market_id.clone(), deadline, threshold, metric_type)
                .with_title(title)
                .with_description(description);
            store.add_market(&market)?;

            info!(
                "📝 Market {} registered for snapshot at {}",
                market_id, deadline
            );
            Ok(())
        }

        Command::List { status, on_chain } => {
            let markets = match status.as_deref() {
                None => store.list_all()?,
                Some(tag) => {
                    let status = MarketStatus::parse(tag)
                        .with_context(|| format!("unknown status: {tag}"))?;
                    store.list_by_status(status)?
                }
            };

            let pipeline = if on_chain {
                Some(TransactionPipeline::from_config(&config)?)
            } else {
                None
            };

            for market in &markets {
                let mut line = format!(
                    "{}  [{}]  deadline={}  threshold={}  metric={}",
                    market.market_id,
                    market.status.as_str(),
                    market.deadline,
                    market.threshold,
                    market.metric_type.as_str()
                );

                if let Some(pipeline) = &pipeline {
                    let node = pipeline
                        .node()
                        .context("ALEO_NODE_URL is required for --on-chain")?;
                    let pool = node
                        .get_mapping_value(&config.program_id, "pools", &market.market_id)
                        .await?;
                    line.push_str(if pool.is_some() {
                        "  on-chain=yes"
                    } else {
                        "  on-chain=no"
                    });
                }

                println!("{line}");
            }

            if markets.is_empty() {
                println!("no markets");
            }
            Ok(())
        }

        Command::Resolve { market_id, option } => {
            let Some(winning_option) = Outcome::from_option_number(option) else {
                bail!("option must be 1 (YES) or 2 (NO)");
            };

            let pipeline = TransactionPipeline::from_config(&config)?;
            let execution_id = pipeline
                .resolve(&market_id, winning_option)
                .await
                .with_context(|| format!("resolution failed for market {market_id}"))?;

            if store.mark_resolved(&market_id)? {
                info!(
                    "✅ Market {} resolved as {} (execution {})",
                    market_id,
                    winning_option.label(),
                    execution_id
                );
            } else {
                tracing::warn!(
                    "⚠️ Market {} is not pending in the local store (missing or already resolved); transaction {} was still broadcast",
                    market_id,
                    execution_id
                );
            }
            Ok(())
        }

        Command::Metrics => {
            let registry = MetricRegistry::with_defaults();
            for name in registry.names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prediction_oracle=info,oracle=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
