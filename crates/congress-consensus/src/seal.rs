// Block sealing.
//
// Signing is delegated to a `SealScheme` supplied by the node (key storage
// and signature recovery live outside the engine). A seal request runs as a
// background task and is cancelled through its token or by closing the
// engine.

use crate::errors::ConsensusError;
use congress_core::{Address, Block, H256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Signature scheme over seal hashes.
pub trait SealScheme: Send + Sync {
    fn sign(&self, signer: &Address, seal_hash: &H256) -> Result<Vec<u8>, ConsensusError>;

    /// Recovers the signer of `seal` over `seal_hash`.
    fn recover(&self, seal_hash: &H256, seal: &[u8]) -> Result<Address, ConsensusError>;
}

/// Handle to an in-flight seal request.
///
/// Yields zero or more sealed blocks. Cancelling stops the task before it
/// signs; a block already delivered stays delivered.
pub struct SealTask {
    pub(crate) results: mpsc::Receiver<Block>,
    pub(crate) cancel: CancellationToken,
    pub(crate) handle: JoinHandle<()>,
}

impl SealTask {
    pub async fn next(&mut self) -> Option<Block> {
        self.results.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the background task to exit.
    pub async fn join(self) -> Result<(), ConsensusError> {
        self.handle
            .await
            .map_err(|e| ConsensusError::Runtime(e.to_string()))
    }
}
