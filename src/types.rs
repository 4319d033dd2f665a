use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256, U64};
use ethers::utils::keccak256;
use serde::Deserialize;
use std::fmt;

/// ERC-4337 UserOperation (EntryPoint v0.6 layout).
///
/// Note: EntryPoint v0.7 uses a *different* packed struct layout.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl UserOperation {
    /// `abi.encode` of every field except the signature, with the dynamic
    /// fields replaced by their keccak256 digest.
    pub fn pack_for_hash(&self) -> Vec<u8> {
        abi::encode(&[
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::FixedBytes(keccak256(self.init_code.as_ref()).to_vec()),
            Token::FixedBytes(keccak256(self.call_data.as_ref()).to_vec()),
            Token::Uint(self.call_gas_limit),
            Token::Uint(self.verification_gas_limit),
            Token::Uint(self.pre_verification_gas),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            Token::FixedBytes(keccak256(self.paymaster_and_data.as_ref()).to_vec()),
        ])
    }

    /// Same value `EntryPoint.getUserOpHash` returns on-chain.
    pub fn hash(&self, entrypoint: Address, chain_id: u64) -> H256 {
        let inner = keccak256(self.pack_for_hash());
        H256(keccak256(abi::encode(&[
            Token::FixedBytes(inner.to_vec()),
            Token::Address(entrypoint),
            Token::Uint(U256::from(chain_id)),
        ])))
    }
}

/// A single call executed by the smart account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Call {
    /// Zero-value call to the zero address with an empty payload.
    pub fn noop() -> Self {
        Self {
            to: Address::zero(),
            value: U256::zero(),
            data: Bytes::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignerWeight {
    pub address: Address,
    pub weight: u32,
}

impl fmt::Display for SignerWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (weight {})", self.address, self.weight)
    }
}

/// Weighted multisig configuration as stored by the validator contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigConfig {
    pub threshold: u32,
    /// Seconds a proposal must wait before execution. The demos always use 0.
    pub delay: u64,
    pub signers: Vec<SignerWeight>,
}

impl MultisigConfig {
    pub fn new(threshold: u32, signers: Vec<SignerWeight>) -> Self {
        Self {
            threshold,
            delay: 0,
            signers,
        }
    }

    /// Signers in the order the validator contract expects (descending address).
    pub fn sorted_signers(&self) -> Vec<SignerWeight> {
        let mut signers = self.signers.clone();
        signers.sort_by(|a, b| b.address.cmp(&a.address));
        signers
    }
}

/// Snapshot of `weightedStorage(account)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeightedStorage {
    pub total_weight: u32,
    pub threshold: u32,
    pub delay: u64,
    pub first_guardian: Address,
}

impl fmt::Display for WeightedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[totalWeight={}, threshold={}, delay={}, firstGuardian={:?}]",
            self.total_weight, self.threshold, self.delay, self.first_guardian
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: H256,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    pub receipt: ReceiptTransaction,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptTransaction {
    pub transaction_hash: H256,
    #[serde(default)]
    pub block_number: Option<U64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn noop_call_targets_zero_address() {
        let call = Call::noop();
        assert_eq!(call.to, Address::zero());
        assert!(call.value.is_zero());
        assert!(call.data.is_empty());
        assert_eq!(call, Call::noop());
    }

    #[test]
    fn hash_ignores_signature_but_binds_chain_and_entrypoint() {
        let entrypoint = Address::from_str("0x5FF137D4b0FDCd49DcA30c7CF57E578a026d2789").unwrap();
        let op = UserOperation {
            sender: Address::repeat_byte(0x11),
            nonce: U256::from(3),
            call_data: Bytes::from(vec![0xde, 0xad]),
            ..Default::default()
        };
        let mut signed = op.clone();
        signed.signature = Bytes::from(vec![1u8; 65]);

        let h = op.hash(entrypoint, 80001);
        assert_eq!(h, signed.hash(entrypoint, 80001));
        assert_ne!(h, op.hash(entrypoint, 1));
        assert_ne!(h, op.hash(Address::zero(), 80001));
    }

    #[test]
    fn pack_for_hash_is_ten_words() {
        let op = UserOperation::default();
        assert_eq!(op.pack_for_hash().len(), 10 * 32);
    }

    #[test]
    fn sorted_signers_descend_by_address() {
        let low = SignerWeight {
            address: Address::repeat_byte(0x01),
            weight: 50,
        };
        let high = SignerWeight {
            address: Address::repeat_byte(0xff),
            weight: 50,
        };
        let cfg = MultisigConfig::new(100, vec![low, high]);
        assert_eq!(cfg.sorted_signers(), vec![high, low]);
        assert_eq!(cfg.delay, 0);
    }

    #[test]
    fn receipt_deserializes_bundler_shape() {
        let v = json!({
            "userOpHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "sender": "0x2222222222222222222222222222222222222222",
            "success": true,
            "actualGasUsed": "0x1",
            "receipt": {
                "transactionHash": "0x3333333333333333333333333333333333333333333333333333333333333333",
                "blockNumber": "0x10"
            }
        });
        let r: UserOperationReceipt = serde_json::from_value(v).unwrap();
        assert!(r.success);
        assert_eq!(r.receipt.transaction_hash, H256::repeat_byte(0x33));
        assert_eq!(r.receipt.block_number, Some(U64::from(16)));
    }
}
