// Recurring system calls made while finalizing blocks.

use super::abi::{
    interactive_abi, METHOD_DISTRIBUTE_BLOCK_REWARD, METHOD_GET_ACTIVE_VALIDATORS, METHOD_PUNISH,
};
use crate::errors::ConsensusError;
use congress_core::{Address, ChainConfig, ChainHeaderReader, Header, StateView, SystemContract, U256};
use congress_vm::{MessageExecutor, SyntheticMessage, Token};

/// Borrowed context shared by every system call of one block.
pub struct SystemCallContext<'a> {
    pub executor: &'a MessageExecutor,
    pub header: &'a Header,
    pub chain: &'a dyn ChainHeaderReader,
    pub config: &'a ChainConfig,
}

impl<'a> SystemCallContext<'a> {
    fn call(
        &self,
        state: &mut dyn StateView,
        contract: SystemContract,
        method: &str,
        args: &[Token],
        value: U256,
    ) -> Result<Vec<u8>, ConsensusError> {
        let data = interactive_abi(contract)?.pack(method, args)?;
        let to = self.config.registry.address_of(contract);
        let msg = SyntheticMessage::system_call(self.header.coinbase, to, value, data);
        Ok(self
            .executor
            .execute_msg(&msg, state, self.header, self.chain, self.config)?)
    }

    /// Records a missed block for `validator` in the punishment contract.
    pub fn punish(&self, state: &mut dyn StateView, validator: Address) -> Result<(), ConsensusError> {
        self.call(
            state,
            SystemContract::Punish,
            METHOD_PUNISH,
            &[Token::Address(validator)],
            U256::zero(),
        )
        .map(|_| ())
    }

    /// Hands `fee` (already credited to the coinbase) to the validators contract.
    pub fn distribute_block_reward(&self, state: &mut dyn StateView, fee: U256) -> Result<(), ConsensusError> {
        self.call(
            state,
            SystemContract::Validators,
            METHOD_DISTRIBUTE_BLOCK_REWARD,
            &[],
            fee,
        )
        .map(|_| ())
    }

    /// Reads the active validator set. Runs against a snapshot that is
    /// always reverted, so the call cannot change state.
    pub fn get_active_validators(&self, state: &mut dyn StateView) -> Result<Vec<Address>, ConsensusError> {
        let snapshot = state.snapshot();
        let output = self.call(
            state,
            SystemContract::Validators,
            METHOD_GET_ACTIVE_VALIDATORS,
            &[],
            U256::zero(),
        );
        state.revert_to_snapshot(snapshot)?;
        let tokens = interactive_abi(SystemContract::Validators)?
            .unpack(METHOD_GET_ACTIVE_VALIDATORS, &output?)?;
        Ok(tokens
            .into_iter()
            .next()
            .and_then(Token::into_array)
            .unwrap_or_default()
            .into_iter()
            .filter_map(Token::into_address)
            .collect())
    }
}
