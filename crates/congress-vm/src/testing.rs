//! Scripted stand-in for the bytecode interpreter.
//!
//! Handlers are registered per (contract, method signature) and receive the
//! call frame and the live state, so tests can model system contract
//! behaviour directly in Rust.

use crate::abi::{encode_revert_reason, selector};
use crate::interpreter::{BlockContext, CallFrame, CallOutcome, Interpreter};
use congress_core::{Address, ChainHeaderReader, StateView, U256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Handler = Arc<dyn Fn(&BlockContext, &CallFrame<'_>, &mut dyn StateView) -> CallOutcome + Send + Sync>;

/// A call observed by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub block: u64,
    pub caller: Address,
    pub address: Address,
    pub value: U256,
    pub input: Vec<u8>,
}

impl RecordedCall {
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|s| s.try_into().ok())
    }
}

#[derive(Default)]
pub struct ScriptedInterpreter {
    handlers: HashMap<(Address, [u8; 4]), Handler>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, address: Address, signature: &str, handler: F) -> Self
    where
        F: Fn(&BlockContext, &CallFrame<'_>, &mut dyn StateView) -> CallOutcome + Send + Sync + 'static,
    {
        self.handlers
            .insert((address, selector(signature)), Arc::new(handler));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls to `signature` on `address`.
    pub fn count(&self, address: Address, signature: &str) -> usize {
        let wanted = selector(signature);
        self.calls
            .lock()
            .iter()
            .filter(|c| c.address == address && c.selector() == Some(wanted))
            .count()
    }
}

impl Interpreter for ScriptedInterpreter {
    fn call(
        &self,
        block: &BlockContext,
        _chain: &dyn ChainHeaderReader,
        frame: &CallFrame<'_>,
        state: &mut dyn StateView,
    ) -> CallOutcome {
        self.calls.lock().push(RecordedCall {
            block: block.number,
            caller: frame.caller,
            address: frame.address,
            value: frame.value,
            input: frame.input.to_vec(),
        });
        let handler = frame
            .input
            .get(..4)
            .and_then(|s| <[u8; 4]>::try_from(s).ok())
            .and_then(|sel| self.handlers.get(&(frame.address, sel)));
        match handler {
            Some(handler) => (**handler)(block, frame, state),
            None => CallOutcome::revert(encode_revert_reason("function selector not recognized"), 0),
        }
    }
}
