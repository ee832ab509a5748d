//! End-to-end tests for the resolution worker: store, metric registry and
//! transaction pipeline wired together against a stub node.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use prediction_oracle::{
    metrics::{Metric, MetricRegistry},
    models::{Market, MarketStatus, MetricType},
    pipeline::{
        prover::{Authorization, Execution, FeeProof, PreparedState, Program},
        ExecutionId, HmacProver, NodeQuery, PrivateKey, Prover, Transaction, TransactionPipeline,
    },
    store::MarketStore,
    worker::ResolutionWorker,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SAMPLE_KEY: &str = "APrivateKey1zkp8CZNn3yeCseEtxuVPbDCwSyhGW6yZKUYKfgXmcpoGPWH";
const PROGRAM_SOURCE: &str =
    "program prediction.aleo;\n\nfunction resolve_pool:\n    input r0 as field.public;\n    input r1 as u64.public;\n";

#[derive(Clone)]
struct StubNode {
    accept_broadcasts: Arc<AtomicBool>,
    broadcasts: Arc<Mutex<Vec<Transaction>>>,
}

impl StubNode {
    fn new() -> Self {
        Self {
            accept_broadcasts: Arc::new(AtomicBool::new(true)),
            broadcasts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn broadcast_inputs(&self) -> Vec<Vec<String>> {
        self.broadcasts
            .lock()
            .iter()
            .map(|tx| tx.execution.inputs.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl NodeQuery for StubNode {
    async fn get_program(&self, _program_id: &str) -> Result<String> {
        Ok(PROGRAM_SOURCE.to_string())
    }

    async fn latest_state_root(&self) -> Result<String> {
        Ok("sr1stub".to_string())
    }

    async fn get_mapping_value(
        &self,
        _program_id: &str,
        _mapping: &str,
        _key: &str,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    async fn broadcast(&self, transaction: &Transaction) -> Result<String> {
        self.broadcasts.lock().push(transaction.clone());
        if self.accept_broadcasts.load(Ordering::SeqCst) {
            Ok(transaction.execution_id().to_string())
        } else {
            Err(anyhow!("broadcast rejected (429): node congested"))
        }
    }
}

/// Prover whose execution proofs never pass the local verification gate.
struct UnsoundProver;

impl Prover for UnsoundProver {
    fn authorize(
        &self,
        key: &PrivateKey,
        program: &Program,
        function: &str,
        inputs: &[String],
    ) -> Result<Authorization> {
        HmacProver.authorize(key, program, function, inputs)
    }

    fn execute(&self, authorization: &Authorization, state: &PreparedState) -> Result<Execution> {
        HmacProver.execute(authorization, state)
    }

    fn verify_execution(&self, _execution: &Execution) -> Result<()> {
        Err(anyhow!("execution proof does not match its transcript"))
    }

    fn authorize_fee(
        &self,
        key: &PrivateKey,
        amount_microcredits: u64,
        execution_id: &ExecutionId,
    ) -> Result<Authorization> {
        HmacProver.authorize_fee(key, amount_microcredits, execution_id)
    }

    fn prove_fee(
        &self,
        authorization: &Authorization,
        amount_microcredits: u64,
        execution_id: &ExecutionId,
        state: &PreparedState,
    ) -> Result<FeeProof> {
        HmacProver.prove_fee(authorization, amount_microcredits, execution_id, state)
    }

    fn verify_fee(&self, fee: &FeeProof, execution_id: &ExecutionId) -> Result<()> {
        HmacProver.verify_fee(fee, execution_id)
    }
}

/// Metric that serves a canned reading (or none at all).
struct FixedMetric(Option<f64>);

#[async_trait::async_trait]
impl Metric for FixedMetric {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn measure(&self) -> Option<f64> {
        self.0
    }
}

fn worker_with(
    reading: Option<f64>,
) -> (ResolutionWorker<StubNode, HmacProver>, Arc<MarketStore>, StubNode) {
    let store = Arc::new(MarketStore::new(":memory:").unwrap());

    let mut registry = MetricRegistry::new();
    registry.register(MetricType::EthStakingRate, Box::new(FixedMetric(reading)));

    let node = StubNode::new();
    let pipeline =
        TransactionPipeline::new(Some(node.clone()), Some(SAMPLE_KEY.parse().unwrap()), HmacProver);

    let worker = ResolutionWorker::new(
        store.clone(),
        Arc::new(registry),
        pipeline,
        Duration::from_secs(60),
    );
    (worker, store, node)
}

fn due_market() -> Market {
    // Deadline one second in the (test-clock) past.
    Market::new("1field".into(), 999, 30.0, MetricType::EthStakingRate)
}

const NOW: i64 = 1_000;

#[tokio::test]
async fn reading_below_threshold_resolves_no() {
    let (worker, store, node) = worker_with(Some(28.75));
    store.add_market(&due_market()).unwrap();

    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.resolved, 1);

    assert_eq!(
        node.broadcast_inputs(),
        vec![vec!["1field".to_string(), "2u64".to_string()]]
    );
    assert_eq!(
        store.get("1field").unwrap().unwrap().status,
        MarketStatus::Resolved
    );
}

#[tokio::test]
async fn reading_above_threshold_resolves_yes() {
    let (worker, store, node) = worker_with(Some(33.0));
    store.add_market(&due_market()).unwrap();

    worker.tick(NOW).await.unwrap();

    assert_eq!(
        node.broadcast_inputs(),
        vec![vec!["1field".to_string(), "1u64".to_string()]]
    );
    assert_eq!(
        store.get("1field").unwrap().unwrap().status,
        MarketStatus::Resolved
    );
}

#[tokio::test]
async fn missing_measurement_skips_without_touching_pipeline_or_store() {
    let (worker, store, node) = worker_with(None);
    store.add_market(&due_market()).unwrap();

    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.resolved, 0);

    assert!(node.broadcasts.lock().is_empty());
    assert_eq!(
        store.get("1field").unwrap().unwrap().status,
        MarketStatus::Pending
    );
}

#[tokio::test]
async fn rejected_broadcast_leaves_market_pending_and_next_tick_retries() {
    let (worker, store, node) = worker_with(Some(28.75));
    store.add_market(&due_market()).unwrap();

    node.accept_broadcasts.store(false, Ordering::SeqCst);
    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.resolved, 0);
    assert_eq!(
        store.get("1field").unwrap().unwrap().status,
        MarketStatus::Pending
    );

    // The next iteration repeats fetch + decide + pipeline from scratch.
    node.accept_broadcasts.store(true, Ordering::SeqCst);
    let report = worker.tick(NOW + 60).await.unwrap();
    assert_eq!(report.resolved, 1);

    let inputs = node.broadcast_inputs();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0], inputs[1]);
    assert_eq!(
        store.get("1field").unwrap().unwrap().status,
        MarketStatus::Resolved
    );
}

#[tokio::test]
async fn future_deadline_is_excluded_from_the_tick() {
    let (worker, store, node) = worker_with(Some(33.0));
    let market = Market::new("2field".into(), NOW + 1, 30.0, MetricType::EthStakingRate);
    store.add_market(&market).unwrap();

    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.due, 0);
    assert!(node.broadcasts.lock().is_empty());
    assert_eq!(
        store.get("2field").unwrap().unwrap().status,
        MarketStatus::Pending
    );
}

#[tokio::test]
async fn resolved_market_is_never_picked_up_again() {
    let (worker, store, node) = worker_with(Some(33.0));
    store.add_market(&due_market()).unwrap();

    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.resolved, 1);

    let report = worker.tick(NOW + 60).await.unwrap();
    assert_eq!(report.due, 0);
    assert_eq!(node.broadcasts.lock().len(), 1);
}

#[tokio::test]
async fn one_failing_market_does_not_block_the_others() {
    let (worker, store, node) = worker_with(Some(33.0));
    // Not a valid field literal: its pipeline call fails at authorize.
    let bad = Market::new("not-a-field".into(), 999, 30.0, MetricType::EthStakingRate);
    store.add_market(&bad).unwrap();
    store.add_market(&due_market()).unwrap();

    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.due, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.resolved, 1);

    assert_eq!(
        store.get("1field").unwrap().unwrap().status,
        MarketStatus::Resolved
    );
    assert_eq!(
        store.get("not-a-field").unwrap().unwrap().status,
        MarketStatus::Pending
    );
    assert_eq!(node.broadcasts.lock().len(), 1);
}

#[tokio::test]
async fn failed_proof_verification_leaves_market_pending() {
    let store = Arc::new(MarketStore::new(":memory:").unwrap());
    store.add_market(&due_market()).unwrap();

    let mut registry = MetricRegistry::new();
    registry.register(MetricType::EthStakingRate, Box::new(FixedMetric(Some(33.0))));

    let node = StubNode::new();
    let pipeline = TransactionPipeline::new(
        Some(node.clone()),
        Some(SAMPLE_KEY.parse().unwrap()),
        UnsoundProver,
    );
    let worker = ResolutionWorker::new(
        store.clone(),
        Arc::new(registry),
        pipeline,
        Duration::from_secs(60),
    );

    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.resolved, 0);

    // The broken proof never left the process and the market stays pending.
    assert!(node.broadcasts.lock().is_empty());
    assert_eq!(
        store.get("1field").unwrap().unwrap().status,
        MarketStatus::Pending
    );
}

#[tokio::test]
async fn store_write_failure_does_not_abort_the_tick() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("markets.db");
    let path = path.to_str().unwrap();

    let store = Arc::new(MarketStore::new(path).unwrap());
    store
        .add_market(&Market::new("1field".into(), 999, 30.0, MetricType::EthStakingRate))
        .unwrap();
    store
        .add_market(&Market::new("2field".into(), 998, 30.0, MetricType::EthStakingRate))
        .unwrap();

    // Reject every UPDATE while reads keep working, so recording a
    // resolution fails after its broadcast succeeded.
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER markets_read_only BEFORE UPDATE ON markets
         BEGIN SELECT RAISE(ABORT, 'database is locked'); END;",
    )
    .unwrap();

    let mut registry = MetricRegistry::new();
    registry.register(MetricType::EthStakingRate, Box::new(FixedMetric(Some(33.0))));

    let node = StubNode::new();
    let pipeline = TransactionPipeline::new(
        Some(node.clone()),
        Some(SAMPLE_KEY.parse().unwrap()),
        HmacProver,
    );
    let worker = ResolutionWorker::new(
        store.clone(),
        Arc::new(registry),
        pipeline,
        Duration::from_secs(60),
    );

    // Both markets still go through the pipeline; the failed writes are
    // logged, not propagated.
    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.due, 2);
    assert_eq!(report.resolved, 2);
    assert_eq!(node.broadcasts.lock().len(), 2);
}

#[tokio::test]
async fn generic_markets_wait_for_manual_resolution() {
    let store = Arc::new(MarketStore::new(":memory:").unwrap());
    let node = StubNode::new();
    let pipeline =
        TransactionPipeline::new(Some(node.clone()), Some(SAMPLE_KEY.parse().unwrap()), HmacProver);
    let worker = ResolutionWorker::new(
        store.clone(),
        Arc::new(MetricRegistry::with_defaults()),
        pipeline,
        Duration::from_secs(60),
    );

    let market = Market::new("3field".into(), 999, 1.0, MetricType::Generic);
    store.add_market(&market).unwrap();

    let report = worker.tick(NOW).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(node.broadcasts.lock().is_empty());
}
