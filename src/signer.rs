use anyhow::{anyhow, Context, Result};
use ethers::prelude::*;
use rand::rngs::OsRng;
use rand::RngCore;
use std::str::FromStr;

pub fn signer_from_key(private_key: &str, chain_id: u64) -> Result<LocalWallet> {
    let wallet = LocalWallet::from_str(private_key.trim()).context("invalid private key")?;
    Ok(wallet.with_chain_id(chain_id))
}

/// Fresh ephemeral signer. The key never leaves the process.
pub fn generate_signer(chain_id: u64) -> Result<LocalWallet> {
    let mut rng = OsRng;
    // Very low probability of an out-of-range key; retry until one is accepted.
    for _ in 0..64 {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if bytes.iter().all(|b| *b == 0) {
            continue;
        }
        if let Ok(wallet) = LocalWallet::from_bytes(&bytes) {
            return Ok(wallet.with_chain_id(chain_id));
        }
    }
    Err(anyhow!(
        "failed to generate a valid random private key after multiple attempts"
    ))
}
