//! Fork schedule reports for operators.

use congress_consensus::{ConsensusError, HardForkUpgrade};
use congress_consensus::systemcontract::{assets, resolve_upgrades};
use congress_core::{keccak256, Address, ChainConfig, SystemContract, H256};

/// One scheduled upgrade, resolved against the embedded bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpgrade {
    pub name: String,
    pub contract: SystemContract,
    pub address: Address,
    pub block: u64,
    pub code_hash: H256,
    pub code_size: usize,
}

/// An embedded bytecode asset and its verified hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReport {
    pub contract: SystemContract,
    pub version: u32,
    pub code_hash: H256,
    pub code_size: usize,
}

/// Validates `config` and resolves its upgrades in activation order.
pub fn upgrade_plan(config: &ChainConfig) -> Result<Vec<PlannedUpgrade>, ConsensusError> {
    config.validate()?;
    let mut plan = resolve_upgrades(config)?
        .into_iter()
        .map(|unit| -> Result<PlannedUpgrade, ConsensusError> {
            let code = unit.bytecode()?;
            Ok(PlannedUpgrade {
                name: unit.name().to_string(),
                contract: unit.contract(),
                address: unit.address(),
                block: unit.activation(),
                code_hash: keccak256(code),
                code_size: code.len(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    plan.sort_by_key(|p| p.block);
    Ok(plan)
}

/// Decodes and verifies every embedded asset.
pub fn asset_report() -> Result<Vec<AssetReport>, ConsensusError> {
    assets::all()
        .iter()
        .map(|asset| -> Result<AssetReport, ConsensusError> {
            let code = asset.bytecode()?;
            Ok(AssetReport {
                contract: asset.contract,
                version: asset.version,
                code_hash: keccak256(code),
                code_size: code.len(),
            })
        })
        .collect()
}
