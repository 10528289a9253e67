pub mod engine;
pub mod congress;
pub mod verify;
pub mod seal;
pub mod systemcontract;
pub mod migration;
pub mod errors;

pub use congress::{Congress, CongressEvmValidator};
pub use engine::{Engine, EvmExtraValidator, PoSA};
pub use errors::{ConsensusError, ValidationError};
pub use migration::{apply_migration, apply_migration_if_due, is_migration_applied};
pub use seal::{SealScheme, SealTask};
pub use systemcontract::{HardForkUpgrade, SystemCallContext, UpgradeUnit};
pub use verify::{HeaderVerifier, VerifyHeadersHandle, DIFF_IN_TURN, DIFF_NO_TURN};
