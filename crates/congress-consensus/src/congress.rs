// PHASE 5: CONGRESS PROOF-OF-STAKE-AUTHORITY ENGINE
//
// SAFETY INVARIANTS:
// 1. pre_handle and finalize either complete or leave state exactly as they
//    found it (both run inside a state snapshot)
// 2. A failed punishment never halts the chain; every other failed system
//    call is fatal for the block
// 3. Fork upgrades and the balance migration apply at their exact heights only
// 4. Only the block producer may send fee-exempt transactions to system
//    contracts

use crate::engine::{Engine, EvmExtraValidator, PoSA};
use crate::errors::{ConsensusError, ValidationError};
use crate::migration::apply_migration_if_due;
use crate::seal::{SealScheme, SealTask};
use crate::systemcontract::{apply_system_contract_upgrades, resolve_upgrades, SystemCallContext};
use crate::verify::{in_turn_validator, HeaderVerifier, VerifyHeadersHandle, DIFF_IN_TURN, DIFF_NO_TURN};
use congress_core::{
    encode_validators, Address, Block, ChainConfig, ChainHeaderReader, ChainReader, Header, Receipt,
    StateReader, StateView, Transaction, EMPTY_UNCLES_HASH, H256, U256,
};
use congress_vm::{Interpreter, MessageExecutor, SyntheticMessage, VmError};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Per-slot unit of the random delay an out-of-turn producer waits.
pub const WIGGLE_TIME: Duration = Duration::from_millis(500);

/// Upper bound of the random out-of-turn sealing delay for a signer set
/// of `validators` members.
pub fn wiggle_window(validators: usize) -> Duration {
    let slots = u32::try_from(validators / 2 + 1).unwrap_or(u32::MAX);
    WIGGLE_TIME.saturating_mul(slots)
}

pub struct Congress {
    config: Arc<ChainConfig>,
    verifier: HeaderVerifier,
    executor: MessageExecutor,
    scheme: Arc<dyn SealScheme>,
    signer: RwLock<Option<Address>>,
    shutdown: CancellationToken,
}

impl Congress {
    /// Builds the engine. Fails when the chain config is invalid or a
    /// scheduled upgrade has no verified bytecode asset.
    pub fn new(
        config: ChainConfig,
        interpreter: Arc<dyn Interpreter>,
        scheme: Arc<dyn SealScheme>,
    ) -> Result<Self, ConsensusError> {
        config.validate()?;
        let units = resolve_upgrades(&config)?;
        info!(
            "Congress engine ready: chain {}, period {}s, epoch {}, {} scheduled upgrades",
            config.chain_id,
            config.congress.period,
            config.congress.epoch,
            units.len()
        );
        let config = Arc::new(config);
        Ok(Congress {
            verifier: HeaderVerifier::new(config.clone(), scheme.clone()),
            config,
            executor: MessageExecutor::new(interpreter),
            scheme,
            signer: RwLock::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    /// Sets the local signer used by prepare and seal.
    pub fn authorize(&self, signer: Address) {
        info!("Authorized local signer {:?}", signer);
        *self.signer.write() = Some(signer);
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn executor(&self) -> &MessageExecutor {
        &self.executor
    }

    fn local_signer(&self) -> Result<Address, ConsensusError> {
        self.signer
            .read()
            .ok_or_else(|| ValidationError::MissingLocalSigner.into())
    }

    fn call_context<'a>(&'a self, chain: &'a dyn ChainHeaderReader, header: &'a Header) -> SystemCallContext<'a> {
        SystemCallContext {
            executor: &self.executor,
            header,
            chain,
            config: &self.config,
        }
    }

    /// Runs `f` inside a snapshot, reverting it when `f` fails.
    fn atomically<T>(
        state: &mut dyn StateView,
        f: impl FnOnce(&mut dyn StateView) -> Result<T, ConsensusError>,
    ) -> Result<T, ConsensusError> {
        let snapshot = state.snapshot();
        match f(state) {
            Ok(value) => Ok(value),
            Err(e) => {
                state.revert_to_snapshot(snapshot)?;
                Err(e)
            }
        }
    }

    /// Punishment, fee distribution and the checkpoint check, in that order.
    /// With `assemble` set, the checkpoint list is written into `header`
    /// instead of checked against it.
    fn apply_block_duties(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &mut Header,
        state: &mut dyn StateView,
        assemble: bool,
    ) -> Result<(), ConsensusError> {
        let number = header.number;
        let snapshot_header = header.clone();
        let ctx = self.call_context(chain, &snapshot_header);

        if header.difficulty != U256::from(DIFF_IN_TURN) {
            let validators = self.verifier.authorized_validators(chain, number, &[])?;
            if let Some(in_turn) = in_turn_validator(number, &validators) {
                if in_turn != header.coinbase {
                    debug!("Punishing out-of-turn miss by {:?} at block {}", in_turn, number);
                    if let Err(e) = ctx.punish(state, in_turn) {
                        warn!("Failed to punish validator {:?} at block {}: {}", in_turn, number, e);
                    }
                }
            }
        }

        let recorder = self.config.registry.fee_recorder;
        let fee = state.balance(&recorder);
        if !fee.is_zero() {
            state.set_balance(&recorder, U256::zero());
            state.add_balance(&header.coinbase, fee)?;
            ctx.distribute_block_reward(state, fee).map_err(|e| {
                error!("Failed to distribute block reward at block {}: {}", number, e);
                e
            })?;
        }

        if self.config.is_epoch(number) {
            let mut active = ctx.get_active_validators(state)?;
            active.sort();
            if assemble {
                header.extra = encode_validators(&active);
            } else {
                let mut declared = header.checkpoint_validators().unwrap_or_default();
                declared.sort();
                if declared != active {
                    return Err(ValidationError::CheckpointMismatch { number }.into());
                }
            }
        }
        Ok(())
    }

    fn is_reserved_call(&self, tx: &Transaction) -> Option<Address> {
        tx.to.filter(|to| self.config.registry.is_system_contract(to))
    }
}

impl Engine for Congress {
    fn author(&self, header: &Header) -> Result<Address, ConsensusError> {
        self.verifier.recover_signer(header)
    }

    fn verify_header(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        seal: bool,
    ) -> Result<(), ConsensusError> {
        self.verifier.verify_header(chain, header, &[], seal)
    }

    fn verify_headers(
        &self,
        chain: Arc<dyn ChainHeaderReader>,
        headers: Vec<Header>,
        seals: Vec<bool>,
    ) -> Result<VerifyHeadersHandle, ConsensusError> {
        self.verifier.verify_headers(chain, headers, seals)
    }

    fn verify_uncles(&self, _chain: &dyn ChainReader, block: &Block) -> Result<(), ConsensusError> {
        if !block.uncles.is_empty() {
            return Err(ValidationError::UnclesNotAllowed.into());
        }
        Ok(())
    }

    fn prepare(&self, chain: &dyn ChainHeaderReader, header: &mut Header) -> Result<(), ConsensusError> {
        let number = header.number;
        if number == 0 {
            return Err(ValidationError::UnknownBlock.into());
        }
        let parent = chain
            .header(&header.parent_hash, number - 1)
            .ok_or(ValidationError::UnknownAncestor { number })?;
        let signer = self.local_signer()?;
        let validators = self.verifier.authorized_validators(chain, number, &[])?;

        header.coinbase = signer;
        header.difficulty = if in_turn_validator(number, &validators) == Some(signer) {
            U256::from(DIFF_IN_TURN)
        } else {
            U256::from(DIFF_NO_TURN)
        };
        header.extra = if self.config.is_epoch(number) {
            encode_validators(&validators)
        } else {
            Vec::new()
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        header.time = parent.time.saturating_add(self.config.congress.period).max(now);
        header.uncles_hash = EMPTY_UNCLES_HASH;
        header.seal.clear();
        Ok(())
    }

    fn finalize(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        state: &mut dyn StateView,
        _txs: &[Transaction],
        _uncles: &[Header],
        _receipts: &[Receipt],
    ) -> Result<(), ConsensusError> {
        let mut header = header.clone();
        Self::atomically(state, |state| {
            self.apply_block_duties(chain, &mut header, state, false)
        })
    }

    fn finalize_and_assemble(
        &self,
        chain: &dyn ChainHeaderReader,
        mut header: Header,
        state: &mut dyn StateView,
        txs: Vec<Transaction>,
        uncles: Vec<Header>,
        receipts: Vec<Receipt>,
    ) -> Result<Block, ConsensusError> {
        Self::atomically(state, |state| {
            self.apply_block_duties(chain, &mut header, state, true)
        })?;
        header.state_root = state.state_root();
        Ok(Block::new(header, txs, uncles, &receipts))
    }

    fn seal(&self, chain: Arc<dyn ChainHeaderReader>, block: Block) -> Result<SealTask, ConsensusError> {
        let header = block.header.clone();
        let number = header.number;
        if number == 0 {
            return Err(ValidationError::UnknownBlock.into());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConsensusError::Runtime(e.to_string()))?;
        let signer = self.local_signer()?;
        let validators = self
            .verifier
            .authorized_validators(chain.as_ref(), number, &[])?;
        if !validators.contains(&signer) {
            return Err(ValidationError::UnauthorizedSigner(signer).into());
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut delay = Duration::from_secs(header.time.saturating_sub(now));
        if header.difficulty == U256::from(DIFF_NO_TURN) {
            // Random share of the wiggle window, sized by the signer count.
            let window = wiggle_window(validators.len());
            delay += rand::thread_rng().gen_range(Duration::ZERO..window);
        }

        let (tx, rx) = mpsc::channel(1);
        let cancel = self.shutdown.child_token();
        let task_cancel = cancel.clone();
        let scheme = self.scheme.clone();
        let handle = runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = task_cancel.cancelled() => {
                    info!("Sealing of block {} discarded", number);
                }
                _ = tokio::time::sleep(delay) => {
                    let mut sealed = header;
                    match scheme.sign(&signer, &sealed.seal_hash()) {
                        Ok(signature) => {
                            sealed.seal = signature;
                            if tx.send(block.with_seal(sealed)).await.is_err() {
                                warn!("Sealed block {} dropped: no receiver", number);
                            }
                        }
                        Err(e) => error!("Failed to sign block {}: {}", number, e),
                    }
                }
            }
        });
        debug!("Sealing block {} after {:?}", number, delay);
        Ok(SealTask {
            results: rx,
            cancel,
            handle,
        })
    }

    fn seal_hash(&self, header: &Header) -> H256 {
        header.seal_hash()
    }

    fn calc_difficulty(&self, chain: &dyn ChainHeaderReader, _time: u64, parent: &Header) -> U256 {
        let number = parent.number + 1;
        let in_turn = match (self.local_signer(), self.verifier.authorized_validators(chain, number, &[])) {
            (Ok(signer), Ok(validators)) => in_turn_validator(number, &validators) == Some(signer),
            _ => false,
        };
        if in_turn {
            U256::from(DIFF_IN_TURN)
        } else {
            U256::from(DIFF_NO_TURN)
        }
    }

    fn close(&self) -> Result<(), ConsensusError> {
        self.shutdown.cancel();
        info!("Congress engine closed");
        Ok(())
    }
}

/// Contract-creation and deny-list hooks bound to one parent state.
pub struct CongressEvmValidator<'a> {
    engine: &'a Congress,
    state: &'a dyn StateReader,
    height: u64,
}

impl EvmExtraValidator for CongressEvmValidator<'_> {
    fn can_create(&self, creator: &Address) -> bool {
        self.engine.can_create(self.state, creator, self.height)
    }

    fn is_address_denied(&self, address: &Address) -> bool {
        let policy = &self.engine.config.registry.deny_list;
        policy.is_enabled(self.state) && policy.is_listed(self.state, address)
    }
}

impl PoSA for Congress {
    fn pre_handle(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        state: &mut dyn StateView,
    ) -> Result<(), ConsensusError> {
        let number = header.number;
        let upgrades_due = !self.config.upgrades_at(number).is_empty();
        if !upgrades_due && !self.config.is_misard(number) {
            return Ok(());
        }
        Self::atomically(state, |state| {
            let applied = apply_system_contract_upgrades(&self.config, header, chain, state, &self.executor)?;
            let migrated = apply_migration_if_due(&self.config, number, state);
            info!(
                "Pre-handled block {}: {} upgrades, migration {}",
                number,
                applied,
                if migrated { "applied" } else { "skipped" }
            );
            Ok(())
        })
    }

    fn is_sys_transaction(
        &self,
        sender: &Address,
        tx: &Transaction,
        header: &Header,
    ) -> Result<bool, ConsensusError> {
        let Some(to) = self.is_reserved_call(tx) else {
            return Ok(false);
        };
        if !tx.gas_price.is_zero() {
            return Ok(false);
        }
        if *sender != header.coinbase {
            return Err(ValidationError::UnauthorizedSystemTransaction { sender: *sender, to }.into());
        }
        Ok(true)
    }

    fn can_create(&self, state: &dyn StateReader, address: &Address, height: u64) -> bool {
        if !self.config.is_dev_verify_active(height) {
            return true;
        }
        let policy = &self.config.registry.developer_allowlist;
        !policy.is_enabled(state) || policy.is_listed(state, address)
    }

    fn validate_tx(
        &self,
        sender: &Address,
        tx: &Transaction,
        header: &Header,
        parent_state: &dyn StateReader,
    ) -> Result<(), ConsensusError> {
        self.is_sys_transaction(sender, tx, header)?;

        if let Some(validator) = self.create_evm_extra_validator(header, parent_state) {
            if validator.is_address_denied(sender) {
                return Err(ValidationError::DeniedAddress(*sender).into());
            }
            if let Some(to) = tx.to.filter(|to| validator.is_address_denied(to)) {
                return Err(ValidationError::DeniedAddress(to).into());
            }
            if tx.is_contract_creation() && !validator.can_create(sender) {
                return Err(ValidationError::CreationNotAllowed(*sender).into());
            }
        }
        Ok(())
    }

    fn create_evm_extra_validator<'a>(
        &'a self,
        header: &Header,
        parent_state: &'a dyn StateReader,
    ) -> Option<Box<dyn EvmExtraValidator + 'a>> {
        if !self.config.is_dev_verify_active(header.number) {
            return None;
        }
        Some(Box::new(CongressEvmValidator {
            engine: self,
            state: parent_state,
            height: header.number,
        }))
    }

    fn apply_sys_tx(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        state: &mut dyn StateView,
        tx_index: usize,
        sender: &Address,
        tx: &Transaction,
    ) -> Result<(Vec<u8>, Option<VmError>), ConsensusError> {
        if !self.is_sys_transaction(sender, tx, header)? {
            return Err(ValidationError::NotSystemTransaction.into());
        }
        let msg = SyntheticMessage::from_transaction(*sender, tx);
        debug!("Replaying system transaction {} ({:?}) of block {}", tx_index, tx.hash(), header.number);
        match self.executor.apply_msg(&msg, state, header, chain, &self.config) {
            Ok(result) => Ok((result.output, None)),
            Err(e) if e.is_execution_failure() => Ok((Vec::new(), Some(e))),
            Err(e) => Err(e.into()),
        }
    }
}
