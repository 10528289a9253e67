// PHASE 3: HARD-FORK UPGRADE UNITS
//
// SAFETY INVARIANTS:
// 1. update only replaces code at the target address; balance and storage
//    are left as they are, and installing the same bytecode twice is a no-op
// 2. execute issues exactly one initialization call per invocation; guarding
//    against repeated initialization is the target contract's job
// 3. An unknown initialization method is a configuration error, a reverted
//    initialization is an execution error; both are fatal for the block

use super::abi::{interactive_abi, METHOD_INITIALIZE};
use super::assets::{self, BytecodeAsset};
use crate::errors::ConsensusError;
use congress_core::{
    keccak256, Address, ChainConfig, ChainHeaderReader, ConfigError, Header, ScheduledUpgrade,
    StateView, SystemContract, SystemRegistry, U256,
};
use congress_vm::{AbiError, MessageExecutor, SyntheticMessage};
use log::{error, info};

/// One hard-fork step for one system contract.
pub trait HardForkUpgrade: Send + Sync {
    fn name(&self) -> &str;

    /// Installs the new bytecode at the target address.
    fn update(&self, config: &ChainConfig, height: u64, state: &mut dyn StateView) -> Result<(), ConsensusError>;

    /// Initializes the freshly installed contract with a call from the block producer.
    fn execute(
        &self,
        state: &mut dyn StateView,
        header: &Header,
        chain: &dyn ChainHeaderReader,
        config: &ChainConfig,
        executor: &MessageExecutor,
    ) -> Result<(), ConsensusError>;
}

/// Bytecode replacement plus `initialize()` for a scheduled upgrade.
pub struct UpgradeUnit {
    name: String,
    contract: SystemContract,
    address: Address,
    activation: u64,
    asset: &'static BytecodeAsset,
}

impl UpgradeUnit {
    /// Resolves a scheduled upgrade against the registry and the asset table.
    pub fn from_schedule(
        scheduled: &ScheduledUpgrade,
        registry: &SystemRegistry,
    ) -> Result<Self, ConfigError> {
        let asset = assets::lookup(scheduled.contract, scheduled.version)?;
        Ok(UpgradeUnit {
            name: format!("{}_v{}", scheduled.contract, scheduled.version),
            contract: scheduled.contract,
            address: registry.address_of(scheduled.contract),
            activation: scheduled.block,
            asset,
        })
    }

    pub fn contract(&self) -> SystemContract {
        self.contract
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn activation(&self) -> u64 {
        self.activation
    }

    pub fn bytecode(&self) -> Result<&'static [u8], ConfigError> {
        self.asset.bytecode()
    }
}

impl HardForkUpgrade for UpgradeUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&self, _config: &ChainConfig, height: u64, state: &mut dyn StateView) -> Result<(), ConsensusError> {
        let code = self.asset.bytecode()?;
        let code_hash = keccak256(code);
        if state.code_hash(&self.address) == code_hash {
            info!("{}: bytecode already installed at {:?}", self.name, self.address);
            return Ok(());
        }
        state.set_code(&self.address, code.to_vec());
        info!(
            "{}: installed {} bytes at {:?} (code hash {:?}) at block {}",
            self.name,
            code.len(),
            self.address,
            code_hash,
            height
        );
        Ok(())
    }

    fn execute(
        &self,
        state: &mut dyn StateView,
        header: &Header,
        chain: &dyn ChainHeaderReader,
        config: &ChainConfig,
        executor: &MessageExecutor,
    ) -> Result<(), ConsensusError> {
        let data = interactive_abi(self.contract)
            .and_then(|abi| abi.pack(METHOD_INITIALIZE, &[]))
            .map_err(|e| {
                error!("{}: can't pack initialize call: {}", self.name, e);
                match e {
                    AbiError::UnknownMethod { contract, method } => {
                        ConsensusError::Configuration(ConfigError::UnknownMethod { contract, method })
                    }
                    other => ConsensusError::Abi(other),
                }
            })?;

        let msg = SyntheticMessage::system_call(header.coinbase, self.address, U256::zero(), data);
        executor
            .execute_msg(&msg, state, header, chain, config)
            .map_err(|e| {
                error!("{}: initialize failed at block {}: {}", self.name, header.number, e);
                ConsensusError::Execution(e)
            })?;
        info!(
            "{}: initialized by {:?} at block {}",
            self.name, header.coinbase, header.number
        );
        Ok(())
    }
}
