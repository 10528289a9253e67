// PHASE 1: CONSENSUS ENGINE CONTRACT
// The interface the block-processing pipeline depends on.
//
// SAFETY: Every engine follows this per-block order:
// 1. Headers are verified before any state is touched
// 2. pre_handle runs before the first transaction
// 3. finalize runs after the last transaction
// 4. seal runs only on a finalized, assembled block
//
// Engines that are not proof-of-stake-authority implement `Engine` only.

use crate::errors::ConsensusError;
use crate::seal::SealTask;
use crate::verify::VerifyHeadersHandle;
use congress_core::{
    Address, Block, ChainHeaderReader, ChainReader, Header, Receipt, StateReader, StateView,
    Transaction, H256, U256,
};
use congress_vm::VmError;
use std::sync::Arc;

/// Algorithm-agnostic consensus engine.
pub trait Engine: Send + Sync {
    /// Address that minted the block, recovered from its seal.
    fn author(&self, header: &Header) -> Result<Address, ConsensusError>;

    /// Checks a header against its parent and the consensus rules. The seal
    /// (signer and difficulty) is checked only when `seal` is set.
    fn verify_header(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        seal: bool,
    ) -> Result<(), ConsensusError>;

    /// Verifies a batch concurrently. Results arrive in input order; parents
    /// may come from earlier headers in the same batch.
    fn verify_headers(
        &self,
        chain: Arc<dyn ChainHeaderReader>,
        headers: Vec<Header>,
        seals: Vec<bool>,
    ) -> Result<VerifyHeadersHandle, ConsensusError>;

    fn verify_uncles(&self, chain: &dyn ChainReader, block: &Block) -> Result<(), ConsensusError>;

    /// Fills the consensus fields of a locally produced header.
    fn prepare(&self, chain: &dyn ChainHeaderReader, header: &mut Header) -> Result<(), ConsensusError>;

    /// Post-transaction state changes for a received block. Does not
    /// assemble anything and never modifies the header.
    fn finalize(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        state: &mut dyn StateView,
        txs: &[Transaction],
        uncles: &[Header],
        receipts: &[Receipt],
    ) -> Result<(), ConsensusError>;

    /// Post-transaction state changes for a locally produced block, then
    /// assembles the block with its final state root.
    fn finalize_and_assemble(
        &self,
        chain: &dyn ChainHeaderReader,
        header: Header,
        state: &mut dyn StateView,
        txs: Vec<Transaction>,
        uncles: Vec<Header>,
        receipts: Vec<Receipt>,
    ) -> Result<Block, ConsensusError>;

    /// Starts sealing `block` in the background and returns immediately.
    fn seal(&self, chain: Arc<dyn ChainHeaderReader>, block: Block) -> Result<SealTask, ConsensusError>;

    fn seal_hash(&self, header: &Header) -> H256;

    fn calc_difficulty(&self, chain: &dyn ChainHeaderReader, time: u64, parent: &Header) -> U256;

    /// Stops all background work started by the engine.
    fn close(&self) -> Result<(), ConsensusError>;
}

/// Hooks consulted by the EVM collaborator during contract creation and calls.
pub trait EvmExtraValidator {
    fn can_create(&self, creator: &Address) -> bool;
    fn is_address_denied(&self, address: &Address) -> bool;
}

/// Proof-of-stake-authority extensions.
pub trait PoSA: Engine {
    /// Pre-transaction state changes: hard-fork upgrades and migrations due
    /// at `header.number`. Leaves state untouched when nothing is due.
    fn pre_handle(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        state: &mut dyn StateView,
    ) -> Result<(), ConsensusError>;

    /// Whether `tx` is a system transaction of the block `header` heads.
    /// Fails when `tx` claims system privileges its sender does not hold.
    fn is_sys_transaction(
        &self,
        sender: &Address,
        tx: &Transaction,
        header: &Header,
    ) -> Result<bool, ConsensusError>;

    /// Read-only contract-creation gate.
    fn can_create(&self, state: &dyn StateReader, address: &Address, height: u64) -> bool;

    fn validate_tx(
        &self,
        sender: &Address,
        tx: &Transaction,
        header: &Header,
        parent_state: &dyn StateReader,
    ) -> Result<(), ConsensusError>;

    fn create_evm_extra_validator<'a>(
        &'a self,
        header: &Header,
        parent_state: &'a dyn StateReader,
    ) -> Option<Box<dyn EvmExtraValidator + 'a>>;

    /// Re-executes a recorded system transaction, for tracing. Execution
    /// failures come back as the second element; anything else is an error.
    fn apply_sys_tx(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        state: &mut dyn StateView,
        tx_index: usize,
        sender: &Address,
        tx: &Transaction,
    ) -> Result<(Vec<u8>, Option<VmError>), ConsensusError>;
}
