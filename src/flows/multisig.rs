use crate::sdk::{AccountClient, KernelSdk};
use crate::signer::generate_signer;
use crate::types::{Call, MultisigConfig, SignerWeight};
use crate::validator::update_config_call;
use anyhow::Result;
use ethers::prelude::*;

const THRESHOLD: u32 = 100;
const WEIGHT: u32 = 50;

fn weighted(signers: &[&LocalWallet]) -> MultisigConfig {
    MultisigConfig::new(
        THRESHOLD,
        signers
            .iter()
            .map(|s| SignerWeight {
                address: s.address(),
                weight: WEIGHT,
            })
            .collect(),
    )
}

fn format_signers(signers: &[SignerWeight]) -> String {
    let parts: Vec<String> = signers.iter().map(|s| s.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Two-of-three weighted multisig: create with signers 1 and 2, add signer 3 on-chain, then
/// authorize with every qualifying subset against the same account.
pub async fn run<S: KernelSdk>(sdk: &S, chain_id: u64) -> Result<()> {
    let signer1 = generate_signer(chain_id)?;
    let signer2 = generate_signer(chain_id)?;
    let signer3 = generate_signer(chain_id)?;
    println!("signer1: {:?}", signer1.address());
    println!("signer2: {:?}", signer2.address());
    println!("signer3: {:?}", signer3.address());

    let client = sdk
        .weighted_client(
            vec![signer1.clone(), signer2.clone()],
            Some(weighted(&[&signer1, &signer2])),
            None,
        )
        .await?;
    let account = client.address();
    println!("My account: {:?}", account);

    println!("sending userOp with signer 1 and 2...");
    let op1_hash = client.send_user_operation(Bytes::default()).await?;
    client.wait_for_user_operation_receipt(op1_hash).await?;
    println!("userOp sent");

    let current = sdk.current_signers(account).await?;
    println!("current signers: {}", format_signers(&current));

    println!("sending second userOp with signer 1 and 2...");
    client.send_transaction(Call::noop()).await?;
    println!("second userOp sent");

    let storage_before = sdk.weighted_storage(account).await?;
    println!("weighted storage: {}", storage_before);

    println!("updating config to add signer 3...");
    let update = update_config_call(
        sdk.weighted_validator(),
        &weighted(&[&signer1, &signer2, &signer3]),
    );
    client.send_transaction(update).await?;
    println!("userOp sent");

    let storage_after = sdk.weighted_storage(account).await?;
    println!("new weighted storage: {}", storage_after);

    let client_123 = sdk
        .weighted_client(
            vec![signer1.clone(), signer2.clone(), signer3.clone()],
            None,
            Some(account),
        )
        .await?;
    println!("sending userOp with signer 1, 2 and 3...");
    client_123.send_transaction(Call::noop()).await?;
    println!("userOp sent");

    println!("sending userOp with signer 1 and 2 again...");
    client.send_transaction(Call::noop()).await?;
    println!("userOp sent");

    let client_23 = sdk
        .weighted_client(vec![signer2.clone(), signer3.clone()], None, Some(account))
        .await?;
    println!("sending userOp with signer 2 and 3...");
    client_23.send_transaction(Call::noop()).await?;
    println!("userOp sent");

    let client_13 = sdk
        .weighted_client(vec![signer1, signer3], None, Some(account))
        .await?;
    println!("sending userOp with signer 1 and 3...");
    client_13.send_transaction(Call::noop()).await?;
    println!("userOp sent");

    Ok(())
}
