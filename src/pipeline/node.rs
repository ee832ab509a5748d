//! Query interface to an Aleo node.
//!
//! The node is a black box behind its REST API: the pipeline fetches program
//! source and live state through it and pushes the finished transaction back.
//! The trait seam keeps the pipeline testable without a network.

use super::stages::Transaction;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const NETWORK_PATH: &str = "testnet3";

#[async_trait::async_trait]
pub trait NodeQuery: Send + Sync {
    /// Fetch a program's source text by id.
    async fn get_program(&self, program_id: &str) -> Result<String>;

    /// Latest state root; executions are prepared against it and go stale
    /// with it.
    async fn latest_state_root(&self) -> Result<String>;

    /// Read a public mapping entry, `None` when the key is absent.
    async fn get_mapping_value(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> Result<Option<String>>;

    /// Submit a transaction. Ok carries the accepted transaction id; any
    /// non-success response is an error.
    async fn broadcast(&self, transaction: &Transaction) -> Result<String>;
}

/// `NodeQuery` over the node's REST endpoint.
pub struct RestNodeClient {
    client: Client,
    base_url: String,
}

impl RestNodeClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, NETWORK_PATH, path)
    }

    /// The node wraps string payloads in JSON quotes; accept either shape.
    fn unwrap_json_string(body: &str) -> String {
        serde_json::from_str::<String>(body).unwrap_or_else(|_| body.to_string())
    }
}

#[async_trait::async_trait]
impl NodeQuery for RestNodeClient {
    async fn get_program(&self, program_id: &str) -> Result<String> {
        let url = self.url(&format!("program/{program_id}"));
        debug!(url = %url, "fetching program source");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("program request failed")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("program fetch failed ({status}): {body}"));
        }

        Ok(Self::unwrap_json_string(&body))
    }

    async fn latest_state_root(&self) -> Result<String> {
        let url = self.url("latest/stateRoot");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("state root request failed")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("state root fetch failed ({status}): {body}"));
        }

        Ok(Self::unwrap_json_string(&body))
    }

    async fn get_mapping_value(
        &self,
        program_id: &str,
        mapping: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let url = self.url(&format!("program/{program_id}/mapping/{mapping}/{key}"));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("mapping request failed")?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }

        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("mapping fetch failed ({status}): {body}"));
        }

        let value = Self::unwrap_json_string(&body);
        if value == "null" || value.is_empty() {
            return Ok(None);
        }
        Ok(Some(value))
    }

    async fn broadcast(&self, transaction: &Transaction) -> Result<String> {
        let url = self.url("transaction/broadcast");
        debug!(url = %url, execution_id = %transaction.execution_id(), "broadcasting transaction");

        let response = self
            .client
            .post(&url)
            .json(transaction)
            .send()
            .await
            .context("broadcast request failed")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("broadcast rejected ({status}): {body}"));
        }

        Ok(Self::unwrap_json_string(&body).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_rooted_at_the_network_path() {
        let node = RestNodeClient::new("https://api.explorer.aleo.org/v1/");
        assert_eq!(
            node.url("program/prediction.aleo"),
            "https://api.explorer.aleo.org/v1/testnet3/program/prediction.aleo"
        );
        assert_eq!(
            node.url("transaction/broadcast"),
            "https://api.explorer.aleo.org/v1/testnet3/transaction/broadcast"
        );
    }

    #[test]
    fn unwraps_json_quoted_payloads() {
        assert_eq!(
            RestNodeClient::unwrap_json_string("\"at1abc\""),
            "at1abc".to_string()
        );
        assert_eq!(
            RestNodeClient::unwrap_json_string("program prediction.aleo;"),
            "program prediction.aleo;".to_string()
        );
    }
}
