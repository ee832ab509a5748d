use thiserror::Error;

/// Failure of a single resolution attempt, tagged with the stage that broke.
///
/// Every variant leaves the network untouched except [`Broadcast`], which
/// fires only after both proofs self-verified - so a failed attempt is always
/// safe to retry from scratch on the next tick.
///
/// [`Broadcast`]: PipelineError::Broadcast
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Oracle credential or node endpoint missing; resolution cannot even
    /// start. Fatal to the call, not to the worker.
    #[error("configuration: {0}")]
    Configuration(String),

    /// Program fetch or parse failed.
    #[error("protocol: {0}")]
    Protocol(String),

    /// Malformed call input (market id not a field literal, unknown function).
    #[error("input: {0}")]
    Input(String),

    /// Authorization, proving or local verification failed, at either the
    /// execution or the fee stage.
    #[error("proof ({stage}): {message}")]
    Proof {
        stage: &'static str,
        message: String,
    },

    /// The node rejected or failed to accept an otherwise valid transaction.
    /// Retriable: nothing before broadcast has external effects and the
    /// network deduplicates resubmissions by execution id.
    #[error("broadcast: {0}")]
    Broadcast(String),
}

impl PipelineError {
    /// Short stage tag for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Protocol(_) => "load-program",
            PipelineError::Input(_) => "authorize",
            PipelineError::Proof { stage, .. } => *stage,
            PipelineError::Broadcast(_) => "broadcast",
        }
    }

    pub fn is_retriable(&self) -> bool {
        // Everything short of a credential problem reproduces cleanly from
        // scratch; configuration needs operator action first.
        !matches!(self, PipelineError::Configuration(_))
    }
}
