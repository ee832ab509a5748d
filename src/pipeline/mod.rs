//! Transaction authoring and submission pipeline.
//!
//! Turns `(market_id, winning_option)` into a broadcast `resolve_pool`
//! transaction, or fails cleanly without touching anything outside the
//! network. Stages run strictly in order - load program, authorize, prove,
//! self-verify, fee-prove, fee-self-verify, assemble, broadcast - and every
//! stage before broadcast is local or read-only, so a failed attempt can
//! always be retried from scratch.

pub mod error;
pub mod field;
pub mod keys;
pub mod node;
pub mod prover;
pub mod stages;

pub use error::PipelineError;
pub use keys::PrivateKey;
pub use node::{NodeQuery, RestNodeClient};
pub use prover::{ExecutionId, HmacProver, Prover};
pub use stages::Transaction;

use crate::config::{OracleConfig, RESOLVE_FUNCTION};
use crate::models::Outcome;
use prover::{Execution, PreparedState, Program};
use stages::LoadedProgram;
use tracing::{debug, info};

/// How the fee amount is chosen for a resolution.
#[derive(Debug, Clone, Copy)]
pub enum FeePolicy {
    /// Flat amount in microcredits.
    Fixed(u64),
    /// Estimate from the execution's input footprint. Coarse, but keyed to
    /// the actual execution rather than a constant.
    Estimated { base: u64, per_input_byte: u64 },
}

impl FeePolicy {
    pub fn amount(&self, execution: &Execution) -> u64 {
        match self {
            FeePolicy::Fixed(amount) => *amount,
            FeePolicy::Estimated {
                base,
                per_input_byte,
            } => {
                let input_bytes: u64 = execution.inputs.iter().map(|i| i.len() as u64).sum();
                base + per_input_byte * input_bytes
            }
        }
    }
}

pub struct TransactionPipeline<N, P> {
    node: Option<N>,
    signer: Option<PrivateKey>,
    prover: P,
    program_id: String,
    fee_policy: FeePolicy,
}

impl TransactionPipeline<RestNodeClient, HmacProver> {
    /// Production pipeline from process configuration. Missing credentials
    /// are tolerated here and rejected per-call; a malformed key is a
    /// startup defect and fails immediately.
    pub fn from_config(config: &OracleConfig) -> anyhow::Result<Self> {
        let signer = match &config.private_key {
            Some(raw) => Some(raw.parse::<PrivateKey>()?),
            None => None,
        };
        let node = config.node_url.as_deref().map(RestNodeClient::new);

        Ok(Self {
            node,
            signer,
            prover: HmacProver,
            program_id: config.program_id.clone(),
            fee_policy: FeePolicy::Fixed(config.resolve_fee_microcredits),
        })
    }
}

impl<N: NodeQuery, P: Prover> TransactionPipeline<N, P> {
    pub fn new(node: Option<N>, signer: Option<PrivateKey>, prover: P) -> Self {
        Self {
            node,
            signer,
            prover,
            program_id: crate::config::DEFAULT_PROGRAM_ID.to_string(),
            fee_policy: FeePolicy::Fixed(crate::config::DEFAULT_RESOLVE_FEE_MICROCREDITS),
        }
    }

    pub fn with_program(mut self, program_id: &str) -> Self {
        self.program_id = program_id.to_string();
        self
    }

    pub fn with_fee_policy(mut self, fee_policy: FeePolicy) -> Self {
        self.fee_policy = fee_policy;
        self
    }

    pub fn node(&self) -> Option<&N> {
        self.node.as_ref()
    }

    /// Build, prove, fee-fund and broadcast one resolution.
    ///
    /// On success exactly one transaction has been broadcast; on any error
    /// none has, so the caller must leave the market pending and may retry
    /// the whole call verbatim.
    pub async fn resolve(
        &self,
        market_id: &str,
        winning_option: Outcome,
    ) -> Result<ExecutionId, PipelineError> {
        let node = self.node.as_ref().ok_or_else(|| {
            PipelineError::Configuration("ALEO_NODE_URL is not configured".into())
        })?;
        let key = self.signer.as_ref().ok_or_else(|| {
            PipelineError::Configuration("ORACLE_PRIVATE_KEY is not configured".into())
        })?;

        // 1. Load the program from the network.
        info!("📡 Fetching program {} from the network...", self.program_id);
        let source = node
            .get_program(&self.program_id)
            .await
            .map_err(|e| PipelineError::Protocol(format!("{e:#}")))?;
        let program = Program::parse(&self.program_id, &source)
            .map_err(|e| PipelineError::Protocol(format!("{e:#}")))?;

        // 2. Authorize the resolution call.
        info!(
            "🚀 Authorizing resolution for market {} with option {}...",
            market_id,
            winning_option.option_number()
        );
        if !field::is_field_literal(market_id) {
            return Err(PipelineError::Input(format!(
                "market id `{market_id}` is not a field literal"
            )));
        }
        let inputs = vec![market_id.to_string(), winning_option.as_input_literal()];
        let authorized =
            LoadedProgram::new(program).authorize(&self.prover, key, RESOLVE_FUNCTION, inputs)?;

        // 3. Prepare against live state, execute and prove.
        info!("🔧 Generating execution proof...");
        let state = self.prepare(node).await?;
        let proved = authorized.prove(&self.prover, &state)?;

        // 4. Self-verify before the execution goes anywhere near the network.
        let verified = proved.verify(&self.prover)?;

        // 5-6. Authorize, prove and self-verify the fee, bound to this
        // execution id. State is re-prepared; the first root may be stale by
        // the time proving finishes.
        let amount = self.fee_policy.amount(verified.execution());
        debug!(amount_microcredits = amount, "funding fee");
        let fee_state = self.prepare(node).await?;
        let fee_verified = verified
            .prove_fee(&self.prover, key, amount, &fee_state)?
            .verify_fee(&self.prover)?;

        // 7-8. Assemble and broadcast.
        let transaction = fee_verified.assemble();
        let execution_id = transaction.execution_id().clone();
        info!("📡 Broadcasting transaction {execution_id}...");

        let accepted = node
            .broadcast(&transaction)
            .await
            .map_err(|e| PipelineError::Broadcast(format!("{e:#}")))?;

        info!("✅ Transaction broadcasted! ID: {accepted}");
        Ok(execution_id)
    }

    async fn prepare(&self, node: &N) -> Result<PreparedState, PipelineError> {
        let state_root = node
            .latest_state_root()
            .await
            .map_err(|e| PipelineError::Proof {
                stage: "prepare",
                message: format!("{e:#}"),
            })?;
        Ok(PreparedState::new(state_root))
    }
}
