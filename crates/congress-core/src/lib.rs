// === Chain Primitives ===
pub mod types;
pub mod chain;

// === Configuration ===
pub mod config;
pub mod registry;

// === State Access ===
pub mod state;

pub mod error;

// === Re-exports for broader ecosystem access ===
pub use chain::{ChainHeaderReader, ChainReader, MemoryChain};
pub use config::{ChainConfig, CongressParams, ScheduledUpgrade, DEFAULT_SYSTEM_CALL_GAS_CAP};
pub use error::{ConfigError, CoreError};
pub use registry::{MigrationEntry, StoragePolicy, SystemContract, SystemRegistry};
pub use state::{Account, MemoryState, StateReader, StateView};
pub use types::*;
