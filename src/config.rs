use ethers::types::{Address, U256};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

pub const BUNDLER_RPC: &str = "BUNDLER_RPC";
pub const PAYMASTER_RPC: &str = "PAYMASTER_RPC";
pub const PRIVATE_KEY: &str = "PRIVATE_KEY";

// Polygon Mumbai + the Kernel v2 / EntryPoint v0.6 deployments the demos were written against.
const DEFAULT_CHAIN_ID: u64 = 80001;
const DEFAULT_ENTRYPOINT: &str = "0x5FF137D4b0FDCd49DcA30c7CF57E578a026d2789";
const DEFAULT_KERNEL_FACTORY: &str = "0x5de4839a76cf55d0c90e2061ef4386d962E15ae3";
const DEFAULT_KERNEL_IMPLEMENTATION: &str = "0xD3F582F6B4814E989Ee8E96bc3175320B5A540ab";
const DEFAULT_ECDSA_VALIDATOR: &str = "0xd9AB5096a832b9ce79914329DAEE236f8Eea0390";
const DEFAULT_WEIGHTED_VALIDATOR: &str = "0x8012D9ee59176Cb01a4aa80fCFE6f5E8bA58d4fb";

const DEFAULT_RECEIPT_TIMEOUT_SECONDS: u64 = 180;
const DEFAULT_RECEIPT_POLL_MILLIS: u64 = 1500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("BUNDLER_RPC or PAYMASTER_RPC or PRIVATE_KEY is not set")]
    Missing,

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Deployed contracts the client layer talks to.
#[derive(Debug, Clone, Copy)]
pub struct Contracts {
    pub entrypoint: Address,
    pub kernel_factory: Address,
    pub kernel_implementation: Address,
    pub ecdsa_validator: Address,
    pub weighted_validator: Address,
}

#[derive(Clone)]
pub struct Config {
    pub bundler_rpc: String,
    pub paymaster_rpc: String,
    pub private_key: String,
    pub chain_id: u64,
    pub contracts: Contracts,
    /// Kernel factory salt index for counterfactual addresses.
    pub account_index: U256,
    /// Zero disables the timeout.
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

// Keep the key out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bundler_rpc", &self.bundler_rpc)
            .field("paymaster_rpc", &self.paymaster_rpc)
            .field("private_key", &"<redacted>")
            .field("chain_id", &self.chain_id)
            .field("contracts", &self.contracts)
            .field("account_index", &self.account_index)
            .field("receipt_timeout", &self.receipt_timeout)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .finish()
    }
}

/// Command-line overrides layered on top of the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub chain_id: Option<u64>,
    pub max_wait_seconds: Option<u64>,
}

impl Config {
    /// Builds the config from an arbitrary key lookup.
    ///
    /// The three connection secrets are checked together before anything else is parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (bundler_rpc, paymaster_rpc, private_key) = match (
            required(BUNDLER_RPC),
            required(PAYMASTER_RPC),
            required(PRIVATE_KEY),
        ) {
            (Some(b), Some(p), Some(k)) => (b, p, k),
            _ => return Err(ConfigError::Missing),
        };

        let address = |key: &'static str, default: &str| -> Result<Address, ConfigError> {
            let raw = lookup(key).unwrap_or_else(|| default.to_string());
            Address::from_str(raw.trim()).map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        };

        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    key,
                    reason: e.to_string(),
                }),
                None => Ok(default),
            }
        };

        let contracts = Contracts {
            entrypoint: address("ENTRYPOINT_ADDRESS", DEFAULT_ENTRYPOINT)?,
            kernel_factory: address("KERNEL_FACTORY_ADDRESS", DEFAULT_KERNEL_FACTORY)?,
            kernel_implementation: address(
                "KERNEL_IMPLEMENTATION_ADDRESS",
                DEFAULT_KERNEL_IMPLEMENTATION,
            )?,
            ecdsa_validator: address("ECDSA_VALIDATOR_ADDRESS", DEFAULT_ECDSA_VALIDATOR)?,
            weighted_validator: address("WEIGHTED_VALIDATOR_ADDRESS", DEFAULT_WEIGHTED_VALIDATOR)?,
        };

        let poll_millis = number("RECEIPT_POLL_MILLIS", DEFAULT_RECEIPT_POLL_MILLIS)?;
        if poll_millis == 0 {
            return Err(ConfigError::Invalid {
                key: "RECEIPT_POLL_MILLIS",
                reason: "must be > 0".to_string(),
            });
        }

        Ok(Self {
            bundler_rpc,
            paymaster_rpc,
            private_key,
            chain_id: number("CHAIN_ID", DEFAULT_CHAIN_ID)?,
            contracts,
            account_index: U256::from(number("ACCOUNT_INDEX", 0)?),
            receipt_timeout: Duration::from_secs(number(
                "RECEIPT_TIMEOUT_SECONDS",
                DEFAULT_RECEIPT_TIMEOUT_SECONDS,
            )?),
            receipt_poll_interval: Duration::from_millis(poll_millis),
        })
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(chain_id) = overrides.chain_id {
            self.chain_id = chain_id;
        }
        if let Some(secs) = overrides.max_wait_seconds {
            self.receipt_timeout = Duration::from_secs(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (BUNDLER_RPC, "https://bundler.example"),
            (PAYMASTER_RPC, "https://paymaster.example"),
            (
                PRIVATE_KEY,
                "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
            ),
        ]
    }

    #[test]
    fn missing_everything_is_reported_with_fixed_message() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::Missing);
        assert_eq!(
            err.to_string(),
            "BUNDLER_RPC or PAYMASTER_RPC or PRIVATE_KEY is not set"
        );
    }

    #[test]
    fn any_single_missing_value_aborts() {
        for skip in [BUNDLER_RPC, PAYMASTER_RPC, PRIVATE_KEY] {
            let pairs: Vec<_> = required().into_iter().filter(|(k, _)| *k != skip).collect();
            let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert_eq!(err, ConfigError::Missing, "skipping {skip}");
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = required();
        pairs[1] = (PAYMASTER_RPC, "   ");
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Missing);
    }

    #[test]
    fn defaults_apply_when_optional_values_absent() {
        let cfg = Config::from_lookup(lookup_from(&required())).unwrap();
        assert_eq!(cfg.chain_id, 80001);
        assert_eq!(
            cfg.contracts.weighted_validator,
            Address::from_str(DEFAULT_WEIGHTED_VALIDATOR).unwrap()
        );
        assert_eq!(cfg.receipt_timeout, Duration::from_secs(180));
        assert!(cfg.account_index.is_zero());
    }

    #[test]
    fn malformed_optional_value_is_invalid() {
        let mut pairs = required();
        pairs.push(("WEIGHTED_VALIDATOR_ADDRESS", "0x1234"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "WEIGHTED_VALIDATOR_ADDRESS",
                ..
            }
        ));
    }

    #[test]
    fn overrides_replace_env_values() {
        let mut cfg = Config::from_lookup(lookup_from(&required())).unwrap();
        cfg.apply(&Overrides {
            chain_id: Some(11155111),
            max_wait_seconds: Some(0),
        });
        assert_eq!(cfg.chain_id, 11155111);
        assert_eq!(cfg.receipt_timeout, Duration::ZERO);
    }

    #[test]
    fn debug_output_redacts_private_key() {
        let cfg = Config::from_lookup(lookup_from(&required())).unwrap();
        let out = format!("{cfg:?}");
        assert!(out.contains("<redacted>"));
        assert!(!out.contains("4c0883a6"));
    }
}
