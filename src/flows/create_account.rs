use super::kernel_client;
use crate::config::Config;
use crate::sdk::{AccountClient, KernelSdk};
use crate::types::Call;
use anyhow::Result;

/// Single-owner account: print its address, send one transaction and one explicit UserOperation.
pub async fn run<S: KernelSdk>(sdk: &S, config: &Config) -> Result<()> {
    let client = kernel_client(sdk, config).await?;

    println!("My account: {:?}", client.address());

    let txn_hash = client.send_transaction(Call::noop()).await?;
    println!("txn hash: {:?}", txn_hash);

    let user_op_hash = client
        .send_user_operation(client.encode_call_data(&Call::noop()))
        .await?;
    println!("userOp hash: {:?}", user_op_hash);

    Ok(())
}
