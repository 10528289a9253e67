use congress_core::{Address, ConfigError, CoreError, U256};
use congress_vm::{AbiError, VmError};
use thiserror::Error;

/// Consensus rule violations. The header or transaction is rejected; nothing
/// is written to state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown block")]
    UnknownBlock,

    #[error("Unknown ancestor of block {number}")]
    UnknownAncestor { number: u64 },

    #[error("Block {number} is in the future (time {time}, now {now})")]
    FutureBlock { number: u64, time: u64, now: u64 },

    #[error("Non-checkpoint block {number} carries validator data")]
    ExtraValidators { number: u64 },

    #[error("Invalid checkpoint validator list in block {number}")]
    InvalidCheckpointValidators { number: u64 },

    #[error("Missing signature")]
    MissingSignature,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Uncles not allowed")]
    UnclesNotAllowed,

    #[error("Invalid difficulty {difficulty} in block {number}")]
    InvalidDifficulty { number: u64, difficulty: U256 },

    #[error("Wrong difficulty in block {number}: expected {expected}, got {got}")]
    WrongDifficulty { number: u64, expected: U256, got: U256 },

    #[error("Gas used {used} exceeds gas limit {limit}")]
    GasUsedExceedsLimit { used: u64, limit: u64 },

    #[error("Invalid timestamp {time}: parent at {parent}, period {period}")]
    InvalidTimestamp { parent: u64, time: u64, period: u64 },

    #[error("Unauthorized signer {0:?}")]
    UnauthorizedSigner(Address),

    #[error("Coinbase {coinbase:?} does not match signer {signer:?}")]
    CoinbaseMismatch { coinbase: Address, signer: Address },

    #[error("Checkpoint validators of block {number} do not match the validator contract")]
    CheckpointMismatch { number: u64 },

    #[error("Unauthorized system transaction from {sender:?} to {to:?}")]
    UnauthorizedSystemTransaction { sender: Address, to: Address },

    #[error("Not a system transaction")]
    NotSystemTransaction,

    #[error("Address {0:?} is denied")]
    DeniedAddress(Address),

    #[error("Address {0:?} may not create contracts")]
    CreationNotAllowed(Address),

    #[error("No local signer authorized")]
    MissingLocalSigner,
}

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("Execution error: {0}")]
    Execution(#[from] VmError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State error: {0}")]
    State(#[from] CoreError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Async runtime error: {0}")]
    Runtime(String),
}

impl ConsensusError {
    /// Whether block processing must abort instead of rejecting the input.
    pub fn is_fatal(&self) -> bool {
        match self {
            ConsensusError::Configuration(_)
            | ConsensusError::Abi(_)
            | ConsensusError::Execution(_)
            | ConsensusError::State(_)
            | ConsensusError::Runtime(_) => true,
            ConsensusError::Validation(_) | ConsensusError::Cancelled => false,
        }
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            ConsensusError::Validation(e) => Some(e),
            _ => None,
        }
    }
}
