// PHASE 2: HEADER VERIFICATION
//
// SAFETY INVARIANTS:
// 1. Verification is pure: no state access, no chain writes
// 2. Batch results are delivered in input order
// 3. After a batch is aborted no further result is handed out
// 4. The authorized signer set of block N is the checkpoint list in the
//    latest epoch block strictly below N (genesis for the first epoch)

use crate::errors::{ConsensusError, ValidationError};
use crate::seal::SealScheme;
use congress_core::{Address, ChainConfig, ChainHeaderReader, Header, EMPTY_UNCLES_HASH, U256};
use futures::stream::{self, StreamExt};
use log::debug;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Difficulty of a block signed by the in-turn validator.
pub const DIFF_IN_TURN: u64 = 2;
/// Difficulty of a block signed out of turn.
pub const DIFF_NO_TURN: u64 = 1;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// The validator expected to sign block `number`, given the sorted signer set.
pub fn in_turn_validator(number: u64, validators: &[Address]) -> Option<Address> {
    if validators.is_empty() {
        return None;
    }
    validators
        .get((number % validators.len() as u64) as usize)
        .copied()
}

/// Stateless header rules. Cheap to clone into verification workers.
#[derive(Clone)]
pub struct HeaderVerifier {
    config: Arc<ChainConfig>,
    scheme: Arc<dyn SealScheme>,
}

impl HeaderVerifier {
    pub fn new(config: Arc<ChainConfig>, scheme: Arc<dyn SealScheme>) -> Self {
        HeaderVerifier { config, scheme }
    }

    pub fn recover_signer(&self, header: &Header) -> Result<Address, ConsensusError> {
        if header.seal.is_empty() {
            return Err(ValidationError::MissingSignature.into());
        }
        self.scheme.recover(&header.seal_hash(), &header.seal)
    }

    /// Sorted signer set authorized to produce block `number`. `batch` holds
    /// not-yet-imported headers that take precedence over the chain.
    pub fn authorized_validators(
        &self,
        chain: &dyn ChainHeaderReader,
        number: u64,
        batch: &[Header],
    ) -> Result<Vec<Address>, ConsensusError> {
        let epoch = self.config.congress.epoch;
        let checkpoint = if number == 0 { 0 } else { (number - 1) / epoch * epoch };
        let header = batch
            .iter()
            .rev()
            .find(|h| h.number == checkpoint)
            .cloned()
            .or_else(|| chain.header_by_number(checkpoint))
            .ok_or(ValidationError::UnknownAncestor { number })?;
        let mut validators = header
            .checkpoint_validators()
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::InvalidCheckpointValidators { number: checkpoint })?;
        validators.sort();
        Ok(validators)
    }

    pub fn verify_header(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        parents: &[Header],
        seal: bool,
    ) -> Result<(), ConsensusError> {
        let number = header.number;
        if number == 0 {
            return Ok(());
        }

        let now = unix_now();
        if header.time > now {
            return Err(ValidationError::FutureBlock {
                number,
                time: header.time,
                now,
            }
            .into());
        }

        if self.config.is_epoch(number) {
            match header.checkpoint_validators() {
                Some(v) if !v.is_empty() => {}
                _ => return Err(ValidationError::InvalidCheckpointValidators { number }.into()),
            }
        } else if !header.extra.is_empty() {
            return Err(ValidationError::ExtraValidators { number }.into());
        }

        if header.seal.is_empty() {
            return Err(ValidationError::MissingSignature.into());
        }
        if header.uncles_hash != EMPTY_UNCLES_HASH {
            return Err(ValidationError::UnclesNotAllowed.into());
        }
        if header.difficulty != U256::from(DIFF_IN_TURN) && header.difficulty != U256::from(DIFF_NO_TURN) {
            return Err(ValidationError::InvalidDifficulty {
                number,
                difficulty: header.difficulty,
            }
            .into());
        }
        if header.gas_used > header.gas_limit {
            return Err(ValidationError::GasUsedExceedsLimit {
                used: header.gas_used,
                limit: header.gas_limit,
            }
            .into());
        }

        let parent = match parents.last() {
            Some(p) => Some(p.clone()),
            None => chain.header(&header.parent_hash, number - 1),
        }
        .filter(|p| p.number == number - 1 && p.hash() == header.parent_hash)
        .ok_or(ValidationError::UnknownAncestor { number })?;

        let period = self.config.congress.period;
        if header.time < parent.time.saturating_add(period) {
            return Err(ValidationError::InvalidTimestamp {
                parent: parent.time,
                time: header.time,
                period,
            }
            .into());
        }

        if seal {
            self.verify_seal(chain, header, parents)?;
        }
        Ok(())
    }

    fn verify_seal(
        &self,
        chain: &dyn ChainHeaderReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<(), ConsensusError> {
        let signer = self.recover_signer(header)?;
        if signer != header.coinbase {
            return Err(ValidationError::CoinbaseMismatch {
                coinbase: header.coinbase,
                signer,
            }
            .into());
        }
        let validators = self.authorized_validators(chain, header.number, parents)?;
        if !validators.contains(&signer) {
            return Err(ValidationError::UnauthorizedSigner(signer).into());
        }
        let expected = if in_turn_validator(header.number, &validators) == Some(signer) {
            U256::from(DIFF_IN_TURN)
        } else {
            U256::from(DIFF_NO_TURN)
        };
        if header.difficulty != expected {
            return Err(ValidationError::WrongDifficulty {
                number: header.number,
                expected,
                got: header.difficulty,
            }
            .into());
        }
        Ok(())
    }

    /// Verifies `headers[index]` on a blocking worker unless the batch was
    /// aborted while the job sat in the blocking pool queue.
    fn verify_queued(
        &self,
        chain: &dyn ChainHeaderReader,
        headers: &[Header],
        index: usize,
        seal: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ConsensusError> {
        if cancel.is_cancelled() {
            return Err(ConsensusError::Cancelled);
        }
        self.verify_header(chain, &headers[index], &headers[..index], seal)
    }

    /// Spawns a concurrent, order-preserving verification of `headers`.
    pub fn verify_headers(
        &self,
        chain: Arc<dyn ChainHeaderReader>,
        headers: Vec<Header>,
        seals: Vec<bool>,
    ) -> Result<VerifyHeadersHandle, ConsensusError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConsensusError::Runtime(e.to_string()))?;
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let total = headers.len();
        let (tx, rx) = mpsc::channel(total.max(1));
        let cancel = CancellationToken::new();
        let headers = Arc::new(headers);

        let jobs = (0..total).map({
            let verifier = self.clone();
            let cancel = cancel.clone();
            move |index| {
                let verifier = verifier.clone();
                let chain = chain.clone();
                let headers = headers.clone();
                let cancel = cancel.clone();
                let seal = seals.get(index).copied().unwrap_or(true);
                async move {
                    if cancel.is_cancelled() {
                        return Err(ConsensusError::Cancelled);
                    }
                    tokio::task::spawn_blocking(move || {
                        verifier.verify_queued(chain.as_ref(), &headers, index, seal, &cancel)
                    })
                    .await
                    .map_err(|e| ConsensusError::Runtime(e.to_string()))?
                }
            }
        });

        let driver_cancel = cancel.clone();
        let driver = runtime.spawn(async move {
            let mut results = Box::pin(stream::iter(jobs).buffered(workers));
            let mut delivered = 0usize;
            loop {
                tokio::select! {
                    biased;
                    _ = driver_cancel.cancelled() => break,
                    next = results.next() => match next {
                        Some(result) => {
                            tokio::select! {
                                biased;
                                _ = driver_cancel.cancelled() => break,
                                sent = tx.send(result) => {
                                    if sent.is_err() {
                                        break;
                                    }
                                    delivered += 1;
                                }
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!("Header batch verification finished: {}/{} results delivered", delivered, total);
        });

        Ok(VerifyHeadersHandle {
            results: rx,
            cancel,
            driver,
        })
    }
}

/// Result stream of a batch verification.
pub struct VerifyHeadersHandle {
    results: mpsc::Receiver<Result<(), ConsensusError>>,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

impl VerifyHeadersHandle {
    /// Next result in input order, or `None` once the batch is done or aborted.
    pub async fn next(&mut self) -> Option<Result<(), ConsensusError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.results.recv() => item,
        }
    }

    /// Stops verification; no result is handed out afterwards.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn abort_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drains every remaining result.
    pub async fn collect(mut self) -> Vec<Result<(), ConsensusError>> {
        let mut out = Vec::new();
        while let Some(result) = self.next().await {
            out.push(result);
        }
        out
    }

    /// Waits for the batch driver to exit.
    pub async fn join(self) -> Result<(), ConsensusError> {
        self.driver
            .await
            .map_err(|e| ConsensusError::Runtime(e.to_string()))
    }
}
