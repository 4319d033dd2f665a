use crate::encoding::{self, quantity_field};
use crate::types::UserOperation;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde_json::Value;

/// Hook an account client runs on every pending UserOperation before signing.
///
/// Implementations fill in `paymasterAndData` and whatever gas fields the sponsor
/// wants to control.
#[async_trait]
pub trait SponsorUserOperation: Send + Sync {
    async fn sponsor_user_operation(&self, op: UserOperation) -> Result<UserOperation>;
}

/// Sponsoring paymaster web service (`zd_sponsorUserOperation`).
#[derive(Debug, Clone)]
pub struct PaymasterClient {
    url: String,
    http: reqwest::Client,
    entrypoint: Address,
    chain_id: u64,
}

impl PaymasterClient {
    pub fn new(url: String, entrypoint: Address, chain_id: u64) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
            entrypoint,
            chain_id,
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
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
            .with_context(|| format!("POST {method} to paymaster failed"))?;

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

#[async_trait]
impl SponsorUserOperation for PaymasterClient {
    async fn sponsor_user_operation(&self, op: UserOperation) -> Result<UserOperation> {
        tracing::info!(sender = ?op.sender, nonce = %op.nonce, "requesting paymaster sponsorship");
        let params = build_params(&op, self.entrypoint, self.chain_id);
        let res = self
            .rpc("zd_sponsorUserOperation", params)
            .await
            .context("zd_sponsorUserOperation failed")?;
        apply_sponsorship(op, &res)
    }
}

fn build_params(op: &UserOperation, entrypoint: Address, chain_id: u64) -> Value {
    serde_json::json!([{
        "chainId": chain_id,
        "userOp": encoding::user_op_to_json(op),
        "entryPointAddress": encoding::fmt_address(entrypoint),
    }])
}

/// Copies the sponsor's answer onto the pending operation.
///
/// `paymasterAndData` is mandatory; gas and fee fields replace the local values
/// only when the service returns them.
fn apply_sponsorship(mut op: UserOperation, res: &Value) -> Result<UserOperation> {
    let pm = res
        .get("paymasterAndData")
        .and_then(|x| x.as_str())
        .ok_or_else(|| anyhow!("sponsor result missing paymasterAndData: {res}"))?;
    op.paymaster_and_data =
        encoding::parse_bytes(pm).context("invalid hex in paymasterAndData")?;

    let overlay = |target: &mut U256, key: &str| -> Result<()> {
        if let Some(v) = quantity_field(res, key)? {
            *target = v;
        }
        Ok(())
    };
    overlay(&mut op.call_gas_limit, "callGasLimit")?;
    overlay(&mut op.verification_gas_limit, "verificationGasLimit")?;
    overlay(&mut op.pre_verification_gas, "preVerificationGas")?;
    overlay(&mut op.max_fee_per_gas, "maxFeePerGas")?;
    overlay(&mut op.max_priority_fee_per_gas, "maxPriorityFeePerGas")?;

    Ok(op)
}
