//! In-memory stand-in for the SDK that records every call in order.

use crate::config::Config;
use crate::contracts::ExecuteCall;
use crate::kernel::encode_execute;
use crate::sdk::{AccountClient, KernelSdk};
use crate::types::{
    Call, MultisigConfig, ReceiptTransaction, SignerWeight, UserOperationReceipt, WeightedStorage,
};
use anyhow::Result;
use async_trait::async_trait;
use ethers::abi::AbiDecode;
use ethers::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn config() -> Config {
    Config::from_lookup(|key| match key {
        "BUNDLER_RPC" => Some("https://bundler.example".to_string()),
        "PAYMASTER_RPC" => Some("https://paymaster.example".to_string()),
        "PRIVATE_KEY" => Some(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".to_string(),
        ),
        _ => None,
    })
    .unwrap()
}

pub fn account() -> Address {
    Address::repeat_byte(0xac)
}

pub fn validator_address() -> Address {
    Address::repeat_byte(0x80)
}

/// Call carried by an `execute` payload; `None` for anything else.
pub fn executed_call(call_data: &Bytes) -> Option<Call> {
    let execute = ExecuteCall::decode(call_data.as_ref()).ok()?;
    Some(Call {
        to: execute.to,
        value: execute.value,
        data: execute.data,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    EcdsaClient {
        client: usize,
        signer: Address,
    },
    WeightedClient {
        client: usize,
        signers: Vec<Address>,
        config: Option<MultisigConfig>,
        deployed: Option<Address>,
    },
    SendUserOperation {
        client: usize,
        call_data: Bytes,
        hash: H256,
    },
    WaitReceipt {
        client: usize,
        hash: H256,
    },
    CurrentSigners {
        account: Address,
    },
    WeightedStorage {
        account: Address,
    },
}

#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    hashes: Arc<AtomicU64>,
    clients: Arc<AtomicUsize>,
}

impl Recorder {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn next_hash(&self) -> H256 {
        H256::from_low_u64_be(self.hashes.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_client(&self) -> usize {
        self.clients.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct RecordingSdk {
    pub recorder: Recorder,
}

pub struct RecordingClient {
    id: usize,
    address: Address,
    recorder: Recorder,
}

#[async_trait]
impl AccountClient for RecordingClient {
    fn address(&self) -> Address {
        self.address
    }

    fn encode_call_data(&self, call: &Call) -> Bytes {
        encode_execute(call)
    }

    async fn send_user_operation(&self, call_data: Bytes) -> Result<H256> {
        let hash = self.recorder.next_hash();
        self.recorder.push(Event::SendUserOperation {
            client: self.id,
            call_data,
            hash,
        });
        Ok(hash)
    }

    async fn wait_for_user_operation_receipt(&self, hash: H256) -> Result<UserOperationReceipt> {
        self.recorder.push(Event::WaitReceipt {
            client: self.id,
            hash,
        });
        Ok(UserOperationReceipt {
            user_op_hash: hash,
            success: true,
            reason: None,
            receipt: ReceiptTransaction {
                transaction_hash: self.recorder.next_hash(),
                block_number: None,
            },
        })
    }
}

#[async_trait]
impl KernelSdk for RecordingSdk {
    type Client = RecordingClient;

    async fn ecdsa_client(&self, signer: LocalWallet) -> Result<Self::Client> {
        let id = self.recorder.next_client();
        self.recorder.push(Event::EcdsaClient {
            client: id,
            signer: signer.address(),
        });
        Ok(RecordingClient {
            id,
            address: account(),
            recorder: self.recorder.clone(),
        })
    }

    async fn weighted_client(
        &self,
        signers: Vec<LocalWallet>,
        config: Option<MultisigConfig>,
        deployed: Option<Address>,
    ) -> Result<Self::Client> {
        let id = self.recorder.next_client();
        self.recorder.push(Event::WeightedClient {
            client: id,
            signers: signers.iter().map(|s| s.address()).collect(),
            config,
            deployed,
        });
        Ok(RecordingClient {
            id,
            address: deployed.unwrap_or_else(account),
            recorder: self.recorder.clone(),
        })
    }

    fn weighted_validator(&self) -> Address {
        validator_address()
    }

    async fn current_signers(&self, account: Address) -> Result<Vec<SignerWeight>> {
        self.recorder.push(Event::CurrentSigners { account });
        Ok(Vec::new())
    }

    async fn weighted_storage(&self, account: Address) -> Result<WeightedStorage> {
        self.recorder.push(Event::WeightedStorage { account });
        Ok(WeightedStorage {
            total_weight: 100,
            threshold: 100,
            delay: 0,
            first_guardian: Address::zero(),
        })
    }
}
