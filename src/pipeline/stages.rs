//! Typed resolution stages.
//!
//! Each stage struct owns the output of the previous transition and is the
//! only way to reach the next one, so a failed or skipped stage cannot flow
//! into broadcast: a `Transaction` can only be built from an execution and a
//! fee proof that both passed their local verification gates.

use super::error::PipelineError;
use super::keys::PrivateKey;
use super::prover::{Execution, ExecutionId, FeeProof, PreparedState, Program, Prover};
use serde::{Deserialize, Serialize};

pub struct LoadedProgram {
    program: Program,
}

impl LoadedProgram {
    pub fn new(program: Program) -> Self {
        Self { program }
    }

    pub fn authorize<P: Prover>(
        self,
        prover: &P,
        key: &PrivateKey,
        function: &str,
        inputs: Vec<String>,
    ) -> Result<AuthorizedCall, PipelineError> {
        let authorization = prover
            .authorize(key, &self.program, function, &inputs)
            .map_err(|e| PipelineError::Input(format!("{e:#}")))?;
        Ok(AuthorizedCall { authorization })
    }
}

pub struct AuthorizedCall {
    authorization: super::prover::Authorization,
}

impl AuthorizedCall {
    pub fn prove<P: Prover>(
        self,
        prover: &P,
        state: &PreparedState,
    ) -> Result<ProvedExecution, PipelineError> {
        let execution = prover
            .execute(&self.authorization, state)
            .map_err(|e| PipelineError::Proof {
                stage: "prove-execution",
                message: format!("{e:#}"),
            })?;
        Ok(ProvedExecution { execution })
    }
}

pub struct ProvedExecution {
    execution: Execution,
}

impl ProvedExecution {
    pub fn verify<P: Prover>(self, prover: &P) -> Result<VerifiedExecution, PipelineError> {
        prover
            .verify_execution(&self.execution)
            .map_err(|e| PipelineError::Proof {
                stage: "verify-execution",
                message: format!("{e:#}"),
            })?;
        Ok(VerifiedExecution {
            execution: self.execution,
        })
    }
}

pub struct VerifiedExecution {
    execution: Execution,
}

impl VerifiedExecution {
    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    pub fn prove_fee<P: Prover>(
        self,
        prover: &P,
        key: &PrivateKey,
        amount_microcredits: u64,
        state: &PreparedState,
    ) -> Result<FeeProved, PipelineError> {
        let authorization = prover
            .authorize_fee(key, amount_microcredits, &self.execution.id)
            .map_err(|e| PipelineError::Proof {
                stage: "authorize-fee",
                message: format!("{e:#}"),
            })?;

        let fee = prover
            .prove_fee(&authorization, amount_microcredits, &self.execution.id, state)
            .map_err(|e| PipelineError::Proof {
                stage: "prove-fee",
                message: format!("{e:#}"),
            })?;

        Ok(FeeProved {
            execution: self.execution,
            fee,
        })
    }
}

pub struct FeeProved {
    execution: Execution,
    fee: FeeProof,
}

impl FeeProved {
    pub fn verify_fee<P: Prover>(self, prover: &P) -> Result<FeeVerified, PipelineError> {
        prover
            .verify_fee(&self.fee, &self.execution.id)
            .map_err(|e| PipelineError::Proof {
                stage: "verify-fee",
                message: format!("{e:#}"),
            })?;
        Ok(FeeVerified {
            execution: self.execution,
            fee: self.fee,
        })
    }
}

pub struct FeeVerified {
    execution: Execution,
    fee: FeeProof,
}

impl FeeVerified {
    /// Stage 7: combine verified execution and fee proof. Infallible; the
    /// hard work already happened at the verification gates.
    pub fn assemble(self) -> Transaction {
        Transaction {
            execution: self.execution,
            fee: self.fee,
        }
    }
}

/// The unit submitted to the network: a verified execution plus its fee
/// proof, keyed by the execution id. Immutable once assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub execution: Execution,
    pub fee: FeeProof,
}

impl Transaction {
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution.id
    }
}
