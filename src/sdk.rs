use crate::bundler::BundlerClient;
use crate::config::{Config, Contracts};
use crate::kernel::{encode_execute, KernelAccount, KernelAccountClient};
use crate::paymaster::{PaymasterClient, SponsorUserOperation};
use crate::types::{Call, MultisigConfig, SignerWeight, UserOperationReceipt, WeightedStorage};
use crate::validator::{self, EcdsaValidator, Validator, WeightedEcdsaValidator};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// What the demo flows need from a smart account client.
#[async_trait]
pub trait AccountClient: Send + Sync {
    fn address(&self) -> Address;

    fn encode_call_data(&self, call: &Call) -> Bytes;

    async fn send_user_operation(&self, call_data: Bytes) -> Result<H256>;

    async fn wait_for_user_operation_receipt(&self, hash: H256) -> Result<UserOperationReceipt>;

    /// Runs `call` through a UserOperation and returns the bundle transaction hash.
    async fn send_transaction(&self, call: Call) -> Result<H256> {
        let call_data = self.encode_call_data(&call);
        let hash = self.send_user_operation(call_data).await?;
        let receipt = self.wait_for_user_operation_receipt(hash).await?;
        Ok(receipt.receipt.transaction_hash)
    }
}

/// Client factory and contract reads used by the flows.
#[async_trait]
pub trait KernelSdk: Send + Sync {
    type Client: AccountClient;

    /// Client for a single-owner ECDSA account.
    async fn ecdsa_client(&self, signer: LocalWallet) -> Result<Self::Client>;

    /// Client for a weighted multisig account.
    ///
    /// `config` is required to derive a new account; `deployed` binds the client to an
    /// existing account instead.
    async fn weighted_client(
        &self,
        signers: Vec<LocalWallet>,
        config: Option<MultisigConfig>,
        deployed: Option<Address>,
    ) -> Result<Self::Client>;

    fn weighted_validator(&self) -> Address;

    async fn current_signers(&self, account: Address) -> Result<Vec<SignerWeight>>;

    async fn weighted_storage(&self, account: Address) -> Result<WeightedStorage>;
}

#[async_trait]
impl<M: Middleware + 'static> AccountClient for KernelAccountClient<M> {
    fn address(&self) -> Address {
        self.account().address()
    }

    fn encode_call_data(&self, call: &Call) -> Bytes {
        encode_execute(call)
    }

    async fn send_user_operation(&self, call_data: Bytes) -> Result<H256> {
        KernelAccountClient::send_user_operation(self, call_data).await
    }

    async fn wait_for_user_operation_receipt(&self, hash: H256) -> Result<UserOperationReceipt> {
        KernelAccountClient::wait_for_user_operation_receipt(self, hash).await
    }
}

/// JSON-RPC backed implementation: chain reads go through the bundler endpoint,
/// sponsorship through the paymaster endpoint.
pub struct RpcSdk {
    provider: Arc<Provider<Http>>,
    bundler: BundlerClient,
    sponsor: Arc<dyn SponsorUserOperation>,
    contracts: Contracts,
    chain_id: u64,
    account_index: U256,
    receipt_timeout: Duration,
}

impl RpcSdk {
    pub fn connect(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.bundler_rpc.as_str())
            .map_err(|e| anyhow!("invalid BUNDLER_RPC url: {e}"))?
            .interval(Duration::from_millis(350));

        Ok(Self {
            provider: Arc::new(provider),
            bundler: BundlerClient::new(config.bundler_rpc.clone(), config.receipt_poll_interval),
            sponsor: Arc::new(PaymasterClient::new(
                config.paymaster_rpc.clone(),
                config.contracts.entrypoint,
                config.chain_id,
            )),
            contracts: config.contracts,
            chain_id: config.chain_id,
            account_index: config.account_index,
            receipt_timeout: config.receipt_timeout,
        })
    }

    /// Warns early when the bundler does not serve the configured chain or EntryPoint.
    pub async fn check_network(&self) -> Result<()> {
        let chain_id = self.provider.get_chainid().await?.as_u64();
        if chain_id != self.chain_id {
            return Err(anyhow!(
                "chainId mismatch: configured {}, RPC returned {}",
                self.chain_id,
                chain_id
            ));
        }
        match self.bundler.supported_entry_points().await {
            Ok(eps) if !eps.contains(&self.contracts.entrypoint) => {
                tracing::warn!(
                    entrypoint = ?self.contracts.entrypoint,
                    supported = ?eps,
                    "bundler does not list the configured EntryPoint"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "eth_supportedEntryPoints unavailable"),
        }
        Ok(())
    }

    fn client_for(&self, account: KernelAccount<Provider<Http>>) -> KernelAccountClient<Provider<Http>> {
        KernelAccountClient::new(
            account,
            self.provider.clone(),
            self.bundler.clone(),
            self.sponsor.clone(),
            self.chain_id,
            self.receipt_timeout,
        )
    }
}

#[async_trait]
impl KernelSdk for RpcSdk {
    type Client = KernelAccountClient<Provider<Http>>;

    async fn ecdsa_client(&self, signer: LocalWallet) -> Result<Self::Client> {
        let validator: Arc<dyn Validator> =
            Arc::new(EcdsaValidator::new(self.contracts.ecdsa_validator, signer));
        let account = KernelAccount::counterfactual(
            self.provider.clone(),
            self.contracts,
            validator,
            self.account_index,
        )
        .await?;
        Ok(self.client_for(account))
    }

    async fn weighted_client(
        &self,
        signers: Vec<LocalWallet>,
        config: Option<MultisigConfig>,
        deployed: Option<Address>,
    ) -> Result<Self::Client> {
        let validator =
            WeightedEcdsaValidator::new(self.contracts.weighted_validator, config, signers)?;
        tracing::debug!(signers = ?validator.signer_addresses(), ?deployed, "weighted client");
        let validator: Arc<dyn Validator> = Arc::new(validator);

        let account = match deployed {
            Some(address) => {
                KernelAccount::deployed(self.provider.clone(), self.contracts, validator, address)
            }
            None => {
                KernelAccount::counterfactual(
                    self.provider.clone(),
                    self.contracts,
                    validator,
                    self.account_index,
                )
                .await?
            }
        };
        Ok(self.client_for(account))
    }

    fn weighted_validator(&self) -> Address {
        self.contracts.weighted_validator
    }

    async fn current_signers(&self, account: Address) -> Result<Vec<SignerWeight>> {
        validator::current_signers(self.provider.clone(), self.contracts.weighted_validator, account)
            .await
    }

    async fn weighted_storage(&self, account: Address) -> Result<WeightedStorage> {
        validator::weighted_storage(self.provider.clone(), self.contracts.weighted_validator, account)
            .await
    }
}
