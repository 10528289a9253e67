use congress_core::{Address, CoreError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Invalid {contract} ABI: {reason}")]
    InvalidAbi { contract: String, reason: String },

    #[error("Unknown method {method} in {contract} ABI")]
    UnknownMethod { contract: String, method: String },

    #[error("Method {method} expects {expected} arguments, got {got}")]
    ArgumentCount {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("Argument {index} of {method} has the wrong type")]
    ArgumentType { method: String, index: usize },

    #[error("Malformed ABI data: {0}")]
    InvalidData(String),
}

/// Errors raised while executing a synthetic message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("Execution reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Reverted { reason: Option<String>, gas_used: u64 },

    #[error("Out of gas (allowance {gas_limit})")]
    OutOfGas { gas_limit: u64 },

    #[error("Execution halted: {0}")]
    Halted(String),

    #[error("State error: {0}")]
    State(#[from] CoreError),

    #[error("System messages cannot create contracts")]
    ContractCreation,

    #[error("Nonce mismatch for {address:?}: expected {expected}, got {got}")]
    NonceMismatch {
        address: Address,
        expected: u64,
        got: u64,
    },
}

impl VmError {
    /// True when the call itself failed inside the interpreter (revert, out
    /// of gas, halt), as opposed to failing before execution started.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            VmError::Reverted { .. } | VmError::OutOfGas { .. } | VmError::Halted(_)
        )
    }
}
