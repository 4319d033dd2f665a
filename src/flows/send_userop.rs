use super::kernel_client;
use crate::config::Config;
use crate::sdk::{AccountClient, KernelSdk};
use crate::types::Call;
use anyhow::Result;

pub async fn run<S: KernelSdk>(sdk: &S, config: &Config) -> Result<()> {
    let client = kernel_client(sdk, config).await?;

    println!("Account address: {:?}", client.address());

    let user_op_hash = client
        .send_user_operation(client.encode_call_data(&Call::noop()))
        .await?;

    println!("UserOp hash: {:?}", user_op_hash);

    Ok(())
}
