use crate::registry::SystemContract;
use crate::types::{Address, H256, U256};
use std::path::PathBuf;
use thiserror::Error;

/// Chain configuration and asset errors.
///
/// Every variant indicates a build or deployment mistake: block processing
/// must abort rather than continue with partially applied forks.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read chain config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON chain config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML chain config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported chain config format: {0}")]
    UnsupportedFormat(String),

    #[error("Congress epoch length must be non-zero")]
    ZeroEpoch,

    #[error("Migration source {0:?} is listed more than once")]
    DuplicateMigrationSource(Address),

    #[error("Migration account {0:?} is both a source and a destination")]
    ChainedMigration(Address),

    #[error("Upgrade of {contract} at block {next} does not come after block {previous}")]
    UpgradeOrdering {
        contract: SystemContract,
        previous: u64,
        next: u64,
    },

    #[error("No bytecode asset for {contract} v{version}")]
    MissingAsset {
        contract: SystemContract,
        version: u32,
    },

    #[error("Malformed bytecode asset {contract} v{version}: {reason}")]
    MalformedAsset {
        contract: SystemContract,
        version: u32,
        reason: String,
    },

    #[error("Bytecode asset {contract} v{version} hash mismatch: expected {expected:?}, got {actual:?}")]
    AssetHashMismatch {
        contract: SystemContract,
        version: u32,
        expected: H256,
        actual: H256,
    },

    #[error("Unknown method {method} in {contract} ABI")]
    UnknownMethod { contract: String, method: String },
}

/// State access errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Insufficient balance at {address:?}: have {balance}, need {required}")]
    InsufficientBalance {
        address: Address,
        balance: U256,
        required: U256,
    },

    #[error("Balance overflow at {address:?}: have {balance}, crediting {amount}")]
    BalanceOverflow {
        address: Address,
        balance: U256,
        amount: U256,
    },

    #[error("Invalid state snapshot id {0}")]
    InvalidSnapshot(usize),
}
