//! Proving backend.
//!
//! The pipeline only ever talks to [`Prover`]; the concrete backend decides
//! what an authorization, an execution proof and a fee proof physically are.
//! [`HmacProver`] is the shipped backend: it signs authorizations with
//! HMAC-SHA256 under the oracle key and commits executions with SHA-256
//! transcript digests, which keeps every pipeline gate (including both local
//! verification steps) real and deterministic. A zero-knowledge backend
//! implements the same trait.

use super::keys::PrivateKey;
use anyhow::{anyhow, bail, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Program id paying the network fee.
pub const FEE_PROGRAM_ID: &str = "credits.aleo";
pub const FEE_FUNCTION: &str = "fee_public";

/// A program fetched from the network and loaded locally.
#[derive(Debug, Clone)]
pub struct Program {
    id: String,
    source: String,
}

impl Program {
    /// Load program source, checking that it actually declares `id`.
    pub fn parse(id: &str, source: &str) -> Result<Self> {
        let header = format!("program {id};");
        if !source.contains(&header) {
            bail!("source does not declare `{header}`");
        }
        Ok(Self {
            id: id.to_string(),
            source: source.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn defines_function(&self, name: &str) -> bool {
        self.source.contains(&format!("function {name}"))
    }
}

/// On-chain state an execution is prepared against. Stale roots invalidate
/// the preparation, so a retry re-fetches rather than reusing this.
#[derive(Debug, Clone)]
pub struct PreparedState {
    pub state_root: String,
}

impl PreparedState {
    pub fn new(state_root: String) -> Self {
        Self { state_root }
    }
}

/// A signed, not-yet-executed intent to call one function with fixed inputs.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub program_id: String,
    pub function: String,
    pub inputs: Vec<String>,
    /// Hex HMAC-SHA256 over the canonical request, keyed by the oracle key.
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The proved result of running an authorized call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub program_id: String,
    pub function: String,
    pub inputs: Vec<String>,
    pub state_root: String,
    pub signature: String,
    pub proof: String,
}

/// Proof of fee payment, bound to one execution id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeProof {
    pub execution_id: ExecutionId,
    pub amount_microcredits: u64,
    pub state_root: String,
    pub signature: String,
    pub proof: String,
}

pub trait Prover: Send + Sync {
    /// Stage 2: bind the call to the oracle key. Local, no network I/O.
    fn authorize(
        &self,
        key: &PrivateKey,
        program: &Program,
        function: &str,
        inputs: &[String],
    ) -> Result<Authorization>;

    /// Stage 3: run the authorized call against prepared state and prove it.
    fn execute(&self, authorization: &Authorization, state: &PreparedState) -> Result<Execution>;

    /// Stage 4: local sanity gate before the execution is ever broadcast.
    fn verify_execution(&self, execution: &Execution) -> Result<()>;

    /// Stage 5a: authorize public fee payment for one execution.
    fn authorize_fee(
        &self,
        key: &PrivateKey,
        amount_microcredits: u64,
        execution_id: &ExecutionId,
    ) -> Result<Authorization>;

    /// Stage 5b: prove the fee against prepared state.
    fn prove_fee(
        &self,
        authorization: &Authorization,
        amount_microcredits: u64,
        execution_id: &ExecutionId,
        state: &PreparedState,
    ) -> Result<FeeProof>;

    /// Stage 6: check the fee proof and its execution binding locally.
    fn verify_fee(&self, fee: &FeeProof, execution_id: &ExecutionId) -> Result<()>;
}

/// Deterministic MAC/digest backend (see module docs).
#[derive(Debug, Clone, Default)]
pub struct HmacProver;

impl HmacProver {
    fn sign(key: &PrivateKey, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&key.seed())
            .map_err(|e| anyhow!("HMAC key error: {e}"))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn canonical_request(program_id: &str, function: &str, inputs: &[String]) -> String {
        format!("{program_id}/{function}({})", inputs.join(","))
    }

    fn execution_transcript(
        id: &ExecutionId,
        program_id: &str,
        function: &str,
        inputs: &[String],
        state_root: &str,
        signature: &str,
    ) -> String {
        format!(
            "execution:{id}:{}:{state_root}:{signature}",
            Self::canonical_request(program_id, function, inputs)
        )
    }

    fn fee_transcript(
        execution_id: &ExecutionId,
        amount_microcredits: u64,
        state_root: &str,
        signature: &str,
    ) -> String {
        format!("fee:{execution_id}:{amount_microcredits}:{state_root}:{signature}")
    }

    fn digest(message: &str) -> String {
        hex::encode(Sha256::digest(message.as_bytes()))
    }
}

impl Prover for HmacProver {
    fn authorize(
        &self,
        key: &PrivateKey,
        program: &Program,
        function: &str,
        inputs: &[String],
    ) -> Result<Authorization> {
        if !program.defines_function(function) {
            bail!("program {} has no function {function}", program.id());
        }

        let request = Self::canonical_request(program.id(), function, inputs);
        let signature = Self::sign(key, &request)?;

        Ok(Authorization {
            program_id: program.id().to_string(),
            function: function.to_string(),
            inputs: inputs.to_vec(),
            signature,
        })
    }

    fn execute(&self, authorization: &Authorization, state: &PreparedState) -> Result<Execution> {
        let id = ExecutionId(Self::digest(&format!(
            "{}:{}",
            authorization.signature, state.state_root
        )));

        let proof = Self::digest(&Self::execution_transcript(
            &id,
            &authorization.program_id,
            &authorization.function,
            &authorization.inputs,
            &state.state_root,
            &authorization.signature,
        ));

        Ok(Execution {
            id,
            program_id: authorization.program_id.clone(),
            function: authorization.function.clone(),
            inputs: authorization.inputs.clone(),
            state_root: state.state_root.clone(),
            signature: authorization.signature.clone(),
            proof,
        })
    }

    fn verify_execution(&self, execution: &Execution) -> Result<()> {
        let expected = Self::digest(&Self::execution_transcript(
            &execution.id,
            &execution.program_id,
            &execution.function,
            &execution.inputs,
            &execution.state_root,
            &execution.signature,
        ));

        if execution.proof != expected {
            bail!("execution proof does not match its transcript");
        }
        Ok(())
    }

    fn authorize_fee(
        &self,
        key: &PrivateKey,
        amount_microcredits: u64,
        execution_id: &ExecutionId,
    ) -> Result<Authorization> {
        let inputs = vec![
            format!("{amount_microcredits}u64"),
            execution_id.as_str().to_string(),
        ];
        let request = Self::canonical_request(FEE_PROGRAM_ID, FEE_FUNCTION, &inputs);
        let signature = Self::sign(key, &request)?;

        Ok(Authorization {
            program_id: FEE_PROGRAM_ID.to_string(),
            function: FEE_FUNCTION.to_string(),
            inputs,
            signature,
        })
    }

    fn prove_fee(
        &self,
        authorization: &Authorization,
        amount_microcredits: u64,
        execution_id: &ExecutionId,
        state: &PreparedState,
    ) -> Result<FeeProof> {
        let proof = Self::digest(&Self::fee_transcript(
            execution_id,
            amount_microcredits,
            &state.state_root,
            &authorization.signature,
        ));

        Ok(FeeProof {
            execution_id: execution_id.clone(),
            amount_microcredits,
            state_root: state.state_root.clone(),
            signature: authorization.signature.clone(),
            proof,
        })
    }

    fn verify_fee(&self, fee: &FeeProof, execution_id: &ExecutionId) -> Result<()> {
        if &fee.execution_id != execution_id {
            bail!(
                "fee proof bound to execution {}, expected {execution_id}",
                fee.execution_id
            );
        }

        let expected = Self::digest(&Self::fee_transcript(
            &fee.execution_id,
            fee.amount_microcredits,
            &fee.state_root,
            &fee.signature,
        ));

        if fee.proof != expected {
            bail!("fee proof does not match its transcript");
        }
        Ok(())
    }
}
