use crate::contracts::{RenewCall, WeightedEcdsaValidatorContract};
use crate::types::{Call, MultisigConfig, SignerWeight, UserOperation, WeightedStorage};
use anyhow::{anyhow, Context, Result};
use ethers::abi::{self, AbiEncode, Token};
use ethers::prelude::*;
use ethers::utils::{hash_message, keccak256};
use std::sync::Arc;

// Placeholder ECDSA signature accepted by the validators during gas estimation.
const DUMMY_ECDSA_SIGNATURE: &str = "fffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";

const WEIGHTED_DOMAIN_NAME: &str = "WeightedECDSAValidator";
const WEIGHTED_DOMAIN_VERSION: &str = "0.0.2";

// Guards the signer-list walk against a corrupted list.
const MAX_GUARDIANS: usize = 256;

/// Authorization rule plugged into a Kernel account as its sudo validator.
pub trait Validator: Send + Sync {
    /// On-chain address of the validator plugin.
    fn address(&self) -> Address;

    /// Data passed to the plugin's `enable` when the account is initialized.
    fn enable_data(&self) -> Result<Bytes>;

    fn dummy_signature(&self) -> Bytes;

    fn sign_user_operation(
        &self,
        op: &UserOperation,
        user_op_hash: H256,
        chain_id: u64,
    ) -> Result<Bytes>;
}

fn dummy_ecdsa_signature() -> Vec<u8> {
    hex::decode(DUMMY_ECDSA_SIGNATURE).unwrap_or_else(|_| vec![0u8; 65])
}

/// EIP-191 personal-message signature over the raw 32-byte hash.
fn sign_personal(wallet: &LocalWallet, digest: H256) -> Result<Vec<u8>> {
    let sig = wallet
        .sign_hash(hash_message(digest.as_bytes()))
        .context("failed to sign userOpHash")?;
    Ok(sig.to_vec())
}

/// Single-owner ECDSA validator.
#[derive(Debug, Clone)]
pub struct EcdsaValidator {
    address: Address,
    signer: LocalWallet,
}

impl EcdsaValidator {
    pub fn new(address: Address, signer: LocalWallet) -> Self {
        Self { address, signer }
    }

    pub fn owner(&self) -> Address {
        self.signer.address()
    }
}

impl Validator for EcdsaValidator {
    fn address(&self) -> Address {
        self.address
    }

    fn enable_data(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.owner().as_bytes().to_vec()))
    }

    fn dummy_signature(&self) -> Bytes {
        Bytes::from(dummy_ecdsa_signature())
    }

    fn sign_user_operation(
        &self,
        _op: &UserOperation,
        user_op_hash: H256,
        _chain_id: u64,
    ) -> Result<Bytes> {
        Ok(Bytes::from(sign_personal(&self.signer, user_op_hash)?))
    }
}

/// Weighted ECDSA multisig validator.
///
/// `config` is only needed while the account is not deployed yet; a client for an
/// existing account just needs a qualifying set of signers.
#[derive(Debug, Clone)]
pub struct WeightedEcdsaValidator {
    address: Address,
    config: Option<MultisigConfig>,
    signers: Vec<LocalWallet>,
}

impl WeightedEcdsaValidator {
    pub fn new(
        address: Address,
        config: Option<MultisigConfig>,
        mut signers: Vec<LocalWallet>,
    ) -> Result<Self> {
        if signers.is_empty() {
            return Err(anyhow!("weighted validator needs at least one signer"));
        }
        signers.sort_by(|a, b| b.address().cmp(&a.address()));
        Ok(Self {
            address,
            config,
            signers,
        })
    }

    pub fn signer_addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    fn domain_separator(&self, chain_id: u64) -> [u8; 32] {
        let type_hash = keccak256(
            "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );
        keccak256(abi::encode(&[
            Token::FixedBytes(type_hash.to_vec()),
            Token::FixedBytes(keccak256(WEIGHTED_DOMAIN_NAME).to_vec()),
            Token::FixedBytes(keccak256(WEIGHTED_DOMAIN_VERSION).to_vec()),
            Token::Uint(U256::from(chain_id)),
            Token::Address(self.address),
        ]))
    }

    /// EIP-712 digest of `Approve(bytes32 callDataAndNonceHash)`.
    pub fn approval_digest(&self, op: &UserOperation, chain_id: u64) -> H256 {
        let type_hash = keccak256("Approve(bytes32 callDataAndNonceHash)");
        let struct_hash = keccak256(abi::encode(&[
            Token::FixedBytes(type_hash.to_vec()),
            Token::FixedBytes(call_data_and_nonce_hash(op).to_vec()),
        ]));

        let mut buf = Vec::with_capacity(66);
        buf.extend_from_slice(&[0x19, 0x01]);
        buf.extend_from_slice(&self.domain_separator(chain_id));
        buf.extend_from_slice(&struct_hash);
        H256(keccak256(buf))
    }
}

impl Validator for WeightedEcdsaValidator {
    fn address(&self) -> Address {
        self.address
    }

    fn enable_data(&self) -> Result<Bytes> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| anyhow!("weighted validator has no initial config to enable"))?;
        Ok(Bytes::from(encode_config(config)))
    }

    fn dummy_signature(&self) -> Bytes {
        let one = dummy_ecdsa_signature();
        Bytes::from(one.repeat(self.signers.len()))
    }

    fn sign_user_operation(
        &self,
        op: &UserOperation,
        user_op_hash: H256,
        chain_id: u64,
    ) -> Result<Bytes> {
        // Every signer but the last approves callData+nonce; the last one signs the userOp itself.
        let (last, approvers) = self
            .signers
            .split_last()
            .ok_or_else(|| anyhow!("weighted validator has no signers"))?;

        let approval = self.approval_digest(op, chain_id);
        let mut out = Vec::with_capacity(65 * self.signers.len());
        for signer in approvers {
            let sig = signer
                .sign_hash(approval)
                .context("failed to sign approval")?;
            out.extend_from_slice(&sig.to_vec());
        }
        out.extend_from_slice(&sign_personal(last, user_op_hash)?);
        Ok(Bytes::from(out))
    }
}

fn call_data_and_nonce_hash(op: &UserOperation) -> [u8; 32] {
    keccak256(abi::encode(&[
        Token::Address(op.sender),
        Token::Bytes(op.call_data.to_vec()),
        Token::Uint(op.nonce),
    ]))
}

/// `abi.encode(address[] guardians, uint24[] weights, uint24 threshold, uint48 delay)`.
pub fn encode_config(config: &MultisigConfig) -> Vec<u8> {
    let signers = config.sorted_signers();
    abi::encode(&[
        Token::Array(signers.iter().map(|s| Token::Address(s.address)).collect()),
        Token::Array(
            signers
                .iter()
                .map(|s| Token::Uint(U256::from(s.weight)))
                .collect(),
        ),
        Token::Uint(U256::from(config.threshold)),
        Token::Uint(U256::from(config.delay)),
    ])
}

/// Call that replaces the account's multisig configuration.
pub fn update_config_call(validator: Address, config: &MultisigConfig) -> Call {
    let signers = config.sorted_signers();
    let renew = RenewCall {
        guardians: signers.iter().map(|s| s.address).collect(),
        weights: signers.iter().map(|s| s.weight).collect(),
        threshold: config.threshold,
        delay: config.delay,
    };
    Call {
        to: validator,
        value: U256::zero(),
        data: Bytes::from(renew.encode()),
    }
}

pub async fn weighted_storage<M: Middleware + 'static>(
    client: Arc<M>,
    validator: Address,
    account: Address,
) -> Result<WeightedStorage> {
    let contract = WeightedEcdsaValidatorContract::new(validator, client);
    let (total_weight, threshold, delay, first_guardian) = contract
        .weighted_storage(account)
        .call()
        .await
        .context("validator.weightedStorage failed")?;
    Ok(WeightedStorage {
        total_weight,
        threshold,
        delay,
        first_guardian,
    })
}

/// Walks the validator's guardian list for `account`.
pub async fn current_signers<M: Middleware + 'static>(
    client: Arc<M>,
    validator: Address,
    account: Address,
) -> Result<Vec<SignerWeight>> {
    let storage = weighted_storage(client.clone(), validator, account).await?;
    let contract = WeightedEcdsaValidatorContract::new(validator, client);

    let mut signers = Vec::new();
    let mut cursor = storage.first_guardian;
    while !is_list_end(cursor, account) {
        if signers.len() >= MAX_GUARDIANS {
            return Err(anyhow!("guardian list for {account:?} does not terminate"));
        }
        let (weight, next) = contract
            .guardian(cursor, account)
            .call()
            .await
            .with_context(|| format!("validator.guardian({cursor:?}) failed"))?;
        signers.push(SignerWeight {
            address: cursor,
            weight,
        });
        cursor = next;
    }
    Ok(signers)
}

// The list is terminated by the account address itself; an unconfigured account reads as zero.
fn is_list_end(cursor: Address, account: Address) -> bool {
    cursor == account || cursor == Address::zero()
}
