use crate::encoding::{fmt_address, fmt_h256, parse_h256};
use crate::types::UserOperationReceipt;
use anyhow::{anyhow, Context, Result};
use ethers::types::{Address, H256};
use serde_json::Value;
use std::time::{Duration, Instant};

/// ERC-4337 bundler JSON-RPC client.
#[derive(Debug, Clone)]
pub struct BundlerClient {
    url: String,
    http: reqwest::Client,
    poll_interval: Duration,
}

impl BundlerClient {
    pub fn new(url: String, poll_interval: Duration) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
            poll_interval,
        }
    }

    pub async fn supported_entry_points(&self) -> Result<Vec<Address>> {
        let res = self
            .rpc("eth_supportedEntryPoints", serde_json::json!([]))
            .await
            .context("eth_supportedEntryPoints failed")?;
        serde_json::from_value(res).context("unexpected eth_supportedEntryPoints result")
    }

    pub async fn send_user_operation(&self, user_op: Value, entrypoint: Address) -> Result<H256> {
        let params = serde_json::json!([user_op, fmt_address(entrypoint)]);
        let res = self
            .rpc("eth_sendUserOperation", params)
            .await
            .context("eth_sendUserOperation failed")?;
        parse_userop_hash(&res)
    }

    /// Poll for a receipt until timeout. A zero timeout waits forever.
    ///
    /// Transport and RPC errors are retried on the next tick; a receipt that does not
    /// decode fails immediately.
    pub async fn wait_user_operation_receipt(
        &self,
        user_op_hash: H256,
        timeout: Duration,
    ) -> Result<UserOperationReceipt> {
        let start = Instant::now();
        let params = serde_json::json!([fmt_h256(user_op_hash)]);
        loop {
            if !timeout.is_zero() && start.elapsed() > timeout {
                return Err(anyhow!(
                    "timed out waiting for userOp {} receipt after {:?}",
                    fmt_h256(user_op_hash),
                    timeout
                ));
            }

            match self.rpc("eth_getUserOperationReceipt", params.clone()).await {
                Ok(res) => {
                    if let Some(receipt) = decode_receipt(res)? {
                        return Ok(receipt);
                    }
                }
                Err(e) => {
                    // public testnet bundlers drop requests now and then; keep polling
                    tracing::warn!(error = %e, "bundler receipt poll error");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        tracing::debug!(method, "bundler rpc");
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("POST {method} to bundler failed"))?;

        let status = resp.status();
        let body: Value = resp.json().await.context("failed to decode JSON")?;

        if !status.is_success() {
            return Err(anyhow!("HTTP {}: {}", status, body));
        }

        if let Some(err) = body.get("error") {
            return Err(anyhow!("RPC error: {}", err));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| anyhow!("missing result field"))
    }
}

/// `None` while the operation is still pending.
fn decode_receipt(res: Value) -> Result<Option<UserOperationReceipt>> {
    if res.is_null() {
        return Ok(None);
    }
    serde_json::from_value(res)
        .map(Some)
        .context("malformed userOp receipt")
}

fn parse_userop_hash(res: &Value) -> Result<H256> {
    // Usually a bare string; some providers wrap it in an object.
    let hash_str = if let Some(s) = res.as_str() {
        s
    } else if let Some(s) = res.get("result").and_then(|v| v.as_str()) {
        s
    } else if let Some(s) = res.get("userOpHash").and_then(|v| v.as_str()) {
        s
    } else {
        return Err(anyhow!(
            "unexpected eth_sendUserOperation result shape: {}",
            res
        ));
    };

    parse_h256(hash_str)
}
