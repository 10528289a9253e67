// Per-chain immutable parameters.
//
// Loaded once at process start (or built from a preset), validated, then
// shared read-only by every component for the lifetime of the node.

use crate::error::ConfigError;
use crate::registry::{SystemContract, SystemRegistry};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Gas allowance granted to a single system call unless the chain overrides it.
pub const DEFAULT_SYSTEM_CALL_GAS_CAP: u64 = 50_000_000;

fn default_system_call_gas_cap() -> u64 {
    DEFAULT_SYSTEM_CALL_GAS_CAP
}

/// Congress consensus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CongressParams {
    /// Minimum seconds between consecutive blocks.
    pub period: u64,
    /// Blocks per epoch; epoch blocks carry the checkpoint validator list.
    pub epoch: u64,
}

/// A system contract upgrade scheduled at a block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledUpgrade {
    pub contract: SystemContract,
    /// Bytecode asset version to install.
    pub version: u32,
    pub block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub congress: CongressParams,
    /// Block at which legacy balances are migrated (exact-height fork).
    #[serde(default)]
    pub misard_block: Option<u64>,
    /// First block enforcing the contract-creation allow list and deny list.
    #[serde(default)]
    pub dev_verify_block: Option<u64>,
    #[serde(default)]
    pub upgrades: Vec<ScheduledUpgrade>,
    #[serde(default = "default_system_call_gas_cap")]
    pub system_call_gas_cap: u64,
    pub registry: SystemRegistry,
}

impl ChainConfig {
    /// True only at the exact migration height.
    pub fn is_misard(&self, number: u64) -> bool {
        self.misard_block == Some(number)
    }

    pub fn is_dev_verify_active(&self, number: u64) -> bool {
        matches!(self.dev_verify_block, Some(block) if number >= block)
    }

    pub fn is_epoch(&self, number: u64) -> bool {
        number % self.congress.epoch == 0
    }

    /// Upgrades activating exactly at `number`, in application order.
    pub fn upgrades_at(&self, number: u64) -> Vec<ScheduledUpgrade> {
        let mut due: Vec<ScheduledUpgrade> = self
            .upgrades
            .iter()
            .filter(|u| u.block == number)
            .copied()
            .collect();
        due.sort_by_key(|u| u.contract.upgrade_rank());
        due
    }

    /// Checks structural invariants; engines refuse to start on failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.congress.epoch == 0 {
            return Err(ConfigError::ZeroEpoch);
        }
        self.registry.validate()?;

        // Heights must strictly increase per contract, in declaration order.
        // This also rules out two upgrades of one contract at the same height.
        let mut last: BTreeMap<SystemContract, u64> = BTreeMap::new();
        for upgrade in &self.upgrades {
            if let Some(previous) = last.get(&upgrade.contract) {
                if upgrade.block <= *previous {
                    return Err(ConfigError::UpgradeOrdering {
                        contract: upgrade.contract,
                        previous: *previous,
                        next: upgrade.block,
                    });
                }
            }
            last.insert(upgrade.contract, upgrade.block);
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: ChainConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ChainConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let config = match ext.as_str() {
            "json" => Self::from_json_str(&raw)?,
            "yaml" | "yml" => Self::from_yaml_str(&raw)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        info!(
            "Loaded chain config from {} (chain id {}, {} scheduled upgrades)",
            path.display(),
            config.chain_id,
            config.upgrades.len()
        );
        Ok(config)
    }

    pub fn mainnet() -> Self {
        ChainConfig {
            chain_id: 20_180,
            congress: CongressParams {
                period: 3,
                epoch: 200,
            },
            misard_block: Some(2_950_000),
            dev_verify_block: Some(2_950_000),
            upgrades: vec![ScheduledUpgrade {
                contract: SystemContract::Punish,
                version: 2,
                block: 2_950_000,
            }],
            system_call_gas_cap: DEFAULT_SYSTEM_CALL_GAS_CAP,
            registry: SystemRegistry::mainnet(),
        }
    }

    /// Short-period chain with early forks, for local networks and tests.
    pub fn testnet() -> Self {
        ChainConfig {
            chain_id: 20_181,
            congress: CongressParams {
                period: 1,
                epoch: 10,
            },
            misard_block: Some(5),
            dev_verify_block: Some(5),
            upgrades: vec![ScheduledUpgrade {
                contract: SystemContract::Punish,
                version: 2,
                block: 5,
            }],
            system_call_gas_cap: DEFAULT_SYSTEM_CALL_GAS_CAP,
            registry: SystemRegistry::mainnet(),
        }
    }
}
