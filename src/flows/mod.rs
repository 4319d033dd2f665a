//! The three demo sequences. Each one is a straight line of awaited calls against a
//! [`KernelSdk`]; any error ends the run.

pub mod create_account;
pub mod multisig;
pub mod send_userop;

#[cfg(test)]
mod testing;

use crate::config::{Config, Overrides};
use crate::sdk::KernelSdk;
use crate::signer::signer_from_key;
use anyhow::Result;

/// Loads the config and only then builds the SDK.
///
/// A missing connection value fails here, before `connect` runs or any request is made.
pub fn bootstrap<L, C, S>(lookup: L, overrides: &Overrides, connect: C) -> Result<(Config, S)>
where
    L: Fn(&str) -> Option<String>,
    C: FnOnce(&Config) -> Result<S>,
{
    let mut config = Config::from_lookup(lookup)?;
    config.apply(overrides);
    tracing::debug!(?config, "configuration loaded");
    let sdk = connect(&config)?;
    Ok((config, sdk))
}

/// Shared helper: the ECDSA account client owned by `PRIVATE_KEY`.
pub async fn kernel_client<S: KernelSdk>(sdk: &S, config: &Config) -> Result<S::Client> {
    let signer = signer_from_key(&config.private_key, config.chain_id)?;
    sdk.ecdsa_client(signer).await
}
