use crate::bundler::BundlerClient;
use crate::config::Contracts;
use crate::contracts::{CreateAccountCall, EntryPoint, ExecuteCall, InitializeCall, KernelFactory};
use crate::encoding::{self, fmt_h256};
use crate::paymaster::SponsorUserOperation;
use crate::types::{Call, UserOperation, UserOperationReceipt};
use crate::validator::Validator;
use anyhow::{anyhow, Context, Result};
use ethers::abi::AbiEncode;
use ethers::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Kernel v2 signature mode prefix selecting the sudo validator.
pub const SUDO_MODE: [u8; 4] = [0u8; 4];

const OPERATION_CALL: u8 = 0;

/// `execute(to, value, data, CALL)` on the account.
pub fn encode_execute(call: &Call) -> Bytes {
    let execute = ExecuteCall {
        to: call.to,
        value: call.value,
        data: call.data.clone(),
        operation: OPERATION_CALL,
    };
    Bytes::from(execute.encode())
}

/// `initialize(validator, enableData)`, the account's factory init payload.
pub fn encode_initialize(validator: &dyn Validator) -> Result<Bytes> {
    let initialize = InitializeCall {
        default_validator: validator.address(),
        data: validator.enable_data()?,
    };
    Ok(Bytes::from(initialize.encode()))
}

/// `factory ++ createAccount(implementation, initData, index)`.
pub fn encode_init_code(contracts: &Contracts, init_data: Bytes, index: U256) -> Bytes {
    let create = CreateAccountCall {
        implementation: contracts.kernel_implementation,
        data: init_data,
        index,
    }
    .encode();

    let mut v = Vec::with_capacity(20 + create.len());
    v.extend_from_slice(contracts.kernel_factory.as_bytes());
    v.extend_from_slice(&create);
    Bytes::from(v)
}

pub fn with_sudo_mode(signature: &Bytes) -> Bytes {
    let mut v = Vec::with_capacity(4 + signature.len());
    v.extend_from_slice(&SUDO_MODE);
    v.extend_from_slice(signature.as_ref());
    Bytes::from(v)
}

/// A Kernel v2 smart account driven by a single sudo validator.
pub struct KernelAccount<M> {
    client: Arc<M>,
    contracts: Contracts,
    validator: Arc<dyn Validator>,
    address: Address,
    index: U256,
    /// Factory init payload; `None` for accounts bound to an existing deployment.
    init_data: Option<Bytes>,
}

impl<M: Middleware + 'static> KernelAccount<M> {
    /// Counterfactual account for `validator`, derived through the factory.
    pub async fn counterfactual(
        client: Arc<M>,
        contracts: Contracts,
        validator: Arc<dyn Validator>,
        index: U256,
    ) -> Result<Self> {
        let init_data = encode_initialize(validator.as_ref())?;
        let factory = KernelFactory::new(contracts.kernel_factory, client.clone());
        let address = factory
            .get_account_address(init_data.clone(), index)
            .call()
            .await
            .context("factory.getAccountAddress failed")?;

        Ok(Self {
            client,
            contracts,
            validator,
            address,
            index,
            init_data: Some(init_data),
        })
    }

    /// Account bound to an address that is already deployed.
    pub fn deployed(
        client: Arc<M>,
        contracts: Contracts,
        validator: Arc<dyn Validator>,
        address: Address,
    ) -> Self {
        Self {
            client,
            contracts,
            validator,
            address,
            index: U256::zero(),
            init_data: None,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    pub async fn is_deployed(&self) -> Result<bool> {
        let code = self
            .client
            .get_code(self.address, None)
            .await
            .map_err(|e| anyhow!("eth_getCode failed: {e}"))?;
        Ok(!code.as_ref().is_empty())
    }

    /// Empty once the account has code on-chain.
    pub async fn init_code(&self) -> Result<Bytes> {
        if self.is_deployed().await? {
            return Ok(Bytes::default());
        }
        let init_data = self.init_data.clone().ok_or_else(|| {
            anyhow!(
                "account {:?} is not deployed and has no init config",
                self.address
            )
        })?;
        Ok(encode_init_code(&self.contracts, init_data, self.index))
    }

    pub async fn nonce(&self) -> Result<U256> {
        let entrypoint = EntryPoint::new(self.contracts.entrypoint, self.client.clone());
        let nonce = entrypoint
            .get_nonce(self.address, U256::zero())
            .call()
            .await
            .context("entryPoint.getNonce failed")?;
        Ok(nonce)
    }
}

/// Account client: assembles, sponsors, signs and submits UserOperations for one account.
///
/// Every operation goes through the sponsor hook, which supplies gas limits and
/// `paymasterAndData`.
pub struct KernelAccountClient<M> {
    account: KernelAccount<M>,
    provider: Arc<M>,
    bundler: BundlerClient,
    sponsor: Arc<dyn SponsorUserOperation>,
    entrypoint: Address,
    chain_id: u64,
    receipt_timeout: Duration,
}

impl<M: Middleware + 'static> KernelAccountClient<M> {
    pub fn new(
        account: KernelAccount<M>,
        provider: Arc<M>,
        bundler: BundlerClient,
        sponsor: Arc<dyn SponsorUserOperation>,
        chain_id: u64,
        receipt_timeout: Duration,
    ) -> Self {
        let entrypoint = account.contracts.entrypoint;
        Self {
            account,
            provider,
            bundler,
            sponsor,
            entrypoint,
            chain_id,
            receipt_timeout,
        }
    }

    pub fn account(&self) -> &KernelAccount<M> {
        &self.account
    }

    /// Fills sender, nonce, initCode, fees and a dummy signature.
    async fn prepare_user_operation(&self, call_data: Bytes) -> Result<UserOperation> {
        let (max_fee_per_gas, max_priority_fee_per_gas) = self
            .provider
            .estimate_eip1559_fees(None)
            .await
            .map_err(|e| anyhow!("failed to fetch fee data: {e}"))?;

        Ok(UserOperation {
            sender: self.account.address(),
            nonce: self.account.nonce().await?,
            init_code: self.account.init_code().await?,
            call_data,
            call_gas_limit: U256::zero(),
            verification_gas_limit: U256::zero(),
            pre_verification_gas: U256::zero(),
            max_fee_per_gas,
            max_priority_fee_per_gas,
            paymaster_and_data: Bytes::default(),
            signature: with_sudo_mode(&self.account.validator().dummy_signature()),
        })
    }

    pub async fn send_user_operation(&self, call_data: Bytes) -> Result<H256> {
        let op = self.prepare_user_operation(call_data).await?;

        // paymasterAndData is covered by the userOp hash
        let mut op = self
            .sponsor
            .sponsor_user_operation(op)
            .await
            .context("paymaster sponsorship failed")?;

        let user_op_hash = op.hash(self.entrypoint, self.chain_id);
        let signature =
            self.account
                .validator()
                .sign_user_operation(&op, user_op_hash, self.chain_id)?;
        op.signature = with_sudo_mode(&signature);

        tracing::debug!(
            user_op = %encoding::user_op_to_json(&op),
            "submitting user operation"
        );

        let sent = self
            .bundler
            .send_user_operation(encoding::user_op_to_json(&op), self.entrypoint)
            .await
            .context("bundler send failed")?;

        if sent != user_op_hash {
            tracing::warn!(
                local = %fmt_h256(user_op_hash),
                bundler = %fmt_h256(sent),
                "bundler returned a different userOpHash"
            );
        }
        tracing::info!(user_op_hash = %fmt_h256(sent), sender = ?op.sender, "user operation sent");

        Ok(sent)
    }

    pub async fn wait_for_user_operation_receipt(
        &self,
        user_op_hash: H256,
    ) -> Result<UserOperationReceipt> {
        let receipt = self
            .bundler
            .wait_user_operation_receipt(user_op_hash, self.receipt_timeout)
            .await
            .context("failed waiting for userOp receipt")?;
        tracing::info!(
            user_op_hash = %fmt_h256(receipt.user_op_hash),
            tx_hash = %fmt_h256(receipt.receipt.transaction_hash),
            block = ?receipt.receipt.block_number,
            "user operation included"
        );
        if !receipt.success {
            tracing::warn!(
                user_op_hash = %fmt_h256(user_op_hash),
                reason = receipt.reason.as_deref().unwrap_or(""),
                "user operation reverted"
            );
        }
        Ok(receipt)
    }
}
