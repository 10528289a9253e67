//! System contracts: interactive ABIs, bytecode assets, hard-fork upgrade
//! units and the calls the engine makes into them.

pub mod abi;
pub mod assets;
pub mod calls;
pub mod upgrade;

pub use calls::SystemCallContext;
pub use upgrade::{HardForkUpgrade, UpgradeUnit};

use crate::errors::ConsensusError;
use congress_core::{ChainConfig, ChainHeaderReader, ConfigError, Header, StateView};
use congress_vm::MessageExecutor;
use log::info;

/// Resolves every scheduled upgrade, failing on the first one without a
/// usable bytecode asset.
pub fn resolve_upgrades(config: &ChainConfig) -> Result<Vec<UpgradeUnit>, ConfigError> {
    config
        .upgrades
        .iter()
        .map(|scheduled| {
            let unit = UpgradeUnit::from_schedule(scheduled, &config.registry)?;
            unit.bytecode()?;
            Ok(unit)
        })
        .collect()
}

/// Applies the upgrades activating at `header.number`, punishment contract
/// first. Returns how many were applied.
pub fn apply_system_contract_upgrades(
    config: &ChainConfig,
    header: &Header,
    chain: &dyn ChainHeaderReader,
    state: &mut dyn StateView,
    executor: &MessageExecutor,
) -> Result<usize, ConsensusError> {
    let due = config.upgrades_at(header.number);
    for scheduled in &due {
        let unit = UpgradeUnit::from_schedule(scheduled, &config.registry)?;
        info!("Applying system contract upgrade {} at block {}", unit.name(), header.number);
        unit.update(config, header.number, state)?;
        unit.execute(state, header, chain, config, executor)?;
    }
    Ok(due.len())
}
