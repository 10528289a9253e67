// The bytecode interpreter seam.
//
// The engine never interprets bytecode itself. An `Interpreter` is supplied
// by the node and runs one top-level call against the state it is handed.
// Any state changes it makes are rolled back by the executor when the call
// does not succeed.

use congress_core::{Address, ChainConfig, ChainHeaderReader, Header, Log, StateView, H256, U256};

/// Block environment visible to executing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub coinbase: Address,
    pub time: u64,
    pub difficulty: U256,
    pub gas_limit: u64,
    pub parent_hash: H256,
    pub chain_id: u64,
}

impl BlockContext {
    pub fn new(header: &Header, config: &ChainConfig) -> Self {
        BlockContext {
            number: header.number,
            coinbase: header.coinbase,
            time: header.time,
            difficulty: header.difficulty,
            gas_limit: header.gas_limit,
            parent_hash: header.parent_hash,
            chain_id: config.chain_id,
        }
    }
}

/// One top-level call.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame<'a> {
    pub caller: Address,
    pub address: Address,
    pub value: U256,
    pub input: &'a [u8],
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Revert,
    OutOfGas,
    Halt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub status: CallStatus,
    pub output: Vec<u8>,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

impl CallOutcome {
    pub fn success(output: Vec<u8>, gas_used: u64) -> Self {
        CallOutcome {
            status: CallStatus::Success,
            output,
            gas_used,
            logs: Vec::new(),
        }
    }

    pub fn revert(output: Vec<u8>, gas_used: u64) -> Self {
        CallOutcome {
            status: CallStatus::Revert,
            output,
            gas_used,
            logs: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: Log) -> Self {
        self.logs.push(log);
        self
    }
}

pub trait Interpreter: Send + Sync {
    /// Runs the code deployed at `frame.address`. The value transfer has
    /// already been applied when this is called.
    fn call(
        &self,
        block: &BlockContext,
        chain: &dyn ChainHeaderReader,
        frame: &CallFrame<'_>,
        state: &mut dyn StateView,
    ) -> CallOutcome;
}
