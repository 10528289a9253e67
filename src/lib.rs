// === Congress PoSA engine ===
pub use congress_consensus;
pub use congress_core;
pub use congress_vm;

pub mod logging;
pub mod plan;

// === Re-exports for node integration ===
pub use congress_consensus::{Congress, ConsensusError, Engine, PoSA, SealScheme};
pub use congress_core::{ChainConfig, StateView};
pub use congress_vm::Interpreter;
