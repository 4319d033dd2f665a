mod bundler;
mod config;
mod contracts;
mod encoding;
mod flows;
mod kernel;
mod paymaster;
#[cfg(test)]
mod rpc_stub;
mod sdk;
mod signer;
mod types;
mod validator;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Overrides;
use sdk::RpcSdk;

#[derive(Parser, Debug)]
#[command(name = "kernel-aa", version, about = "Kernel smart account demos")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Override CHAIN_ID.
    #[arg(long, global = true)]
    chain_id: Option<u64>,

    /// Max seconds to wait for a userOp receipt. Use 0 to disable timeout.
    #[arg(long, global = true)]
    max_wait_seconds: Option<u64>,

    /// Skip the chain id / EntryPoint sanity check before running.
    #[arg(long, global = true, default_value_t = false)]
    skip_network_check: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a single-owner ECDSA account, then send a transaction and a UserOperation.
    CreateAccount,

    /// Weighted multisig: create with two signers, add a third, sign with every qualifying subset.
    Multisig,

    /// Send one UserOperation from the PRIVATE_KEY account.
    SendUserop,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        // stdout carries the demo output
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        chain_id: cli.chain_id,
        max_wait_seconds: cli.max_wait_seconds,
    };

    let (config, sdk) =
        flows::bootstrap(|key| std::env::var(key).ok(), &overrides, RpcSdk::connect)?;

    if !cli.skip_network_check {
        sdk.check_network().await?;
    }

    match cli.cmd {
        Command::CreateAccount => flows::create_account::run(&sdk, &config).await,
        Command::Multisig => flows::multisig::run(&sdk, config.chain_id).await,
        Command::SendUserop => flows::send_userop::run(&sdk, &config).await,
    }
}
