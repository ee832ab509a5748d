//! Process configuration.
//!
//! Everything is read once at startup into an immutable [`OracleConfig`] and
//! passed by reference from there; the oracle private key never lives in
//! global state and is redacted from `Debug` output.

use std::fmt;

/// On-chain program the oracle settles against.
pub const DEFAULT_PROGRAM_ID: &str = "prediction.aleo";

/// Settlement entrypoint: `resolve_pool(market_id: field, winning_option: u64)`.
pub const RESOLVE_FUNCTION: &str = "resolve_pool";

/// Flat fee charged for a resolution, in microcredits. Overridable via
/// `RESOLVE_FEE_MICROCREDITS`.
pub const DEFAULT_RESOLVE_FEE_MICROCREDITS: u64 = 100_000;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Clone)]
pub struct OracleConfig {
    /// Oracle signing key (`APrivateKey1...`). Absent in read-only
    /// deployments; the pipeline refuses to run without it.
    pub private_key: Option<String>,
    /// Base URL of the Aleo node REST endpoint.
    pub node_url: Option<String>,
    pub program_id: String,
    pub database_path: String,
    pub poll_interval_secs: u64,
    pub api_port: u16,
    pub resolve_fee_microcredits: u64,
}

impl OracleConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let private_key = std::env::var("ORACLE_PRIVATE_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let node_url = std::env::var("ALEO_NODE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let program_id =
            std::env::var("PROGRAM_ID").unwrap_or_else(|_| DEFAULT_PROGRAM_ID.to_string());

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./oracle.db".to_string());

        let poll_interval_secs = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let api_port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let resolve_fee_microcredits = std::env::var("RESOLVE_FEE_MICROCREDITS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RESOLVE_FEE_MICROCREDITS);

        Ok(Self {
            private_key,
            node_url,
            program_id,
            database_path,
            poll_interval_secs,
            api_port,
            resolve_fee_microcredits,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.private_key.is_some() && self.node_url.is_some()
    }
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("node_url", &self.node_url)
            .field("program_id", &self.program_id)
            .field("database_path", &self.database_path)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("api_port", &self.api_port)
            .field("resolve_fee_microcredits", &self.resolve_fee_microcredits)
            .finish()
    }
}
