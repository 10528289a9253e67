// === System Message Layer ===
pub mod message;
pub mod executor;
pub mod interpreter;

// === ABI ===
pub mod abi;

pub mod errors;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use abi::{decode_revert_reason, ContractAbi, ParamType, Token};
pub use errors::{AbiError, VmError};
pub use executor::{ExecutionResult, MessageExecutor};
pub use interpreter::{BlockContext, CallFrame, CallOutcome, CallStatus, Interpreter};
pub use message::SyntheticMessage;
