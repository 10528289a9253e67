// PHASE 2: SYSTEM MESSAGE EXECUTION
//
// SAFETY INVARIANTS:
// 1. Gas is never charged to the sender and the sender's nonce never changes.
// 2. The allowance is clamped to the chain's system-call gas cap.
// 3. A failed call leaves no trace in state: value transfer, storage writes
//    and logs are all reverted to the pre-call snapshot.
// 4. A call to an address without code succeeds with empty output.

use crate::abi::decode_revert_reason;
use crate::errors::VmError;
use crate::interpreter::{BlockContext, CallFrame, CallStatus, Interpreter};
use crate::message::SyntheticMessage;
use congress_core::{ChainConfig, ChainHeaderReader, Header, Log, StateView, EMPTY_CODE_HASH};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub output: Vec<u8>,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

/// Runs synthetic messages against a mutable state.
#[derive(Clone)]
pub struct MessageExecutor {
    interpreter: Arc<dyn Interpreter>,
}

impl MessageExecutor {
    pub fn new(interpreter: Arc<dyn Interpreter>) -> Self {
        MessageExecutor { interpreter }
    }

    pub fn interpreter(&self) -> &Arc<dyn Interpreter> {
        &self.interpreter
    }

    /// Executes `msg` and returns the call's output.
    pub fn execute_msg(
        &self,
        msg: &SyntheticMessage,
        state: &mut dyn StateView,
        header: &Header,
        chain: &dyn ChainHeaderReader,
        config: &ChainConfig,
    ) -> Result<Vec<u8>, VmError> {
        self.apply_msg(msg, state, header, chain, config)
            .map(|result| result.output)
    }

    /// Like [`execute_msg`](Self::execute_msg) but reports gas and logs too.
    pub fn apply_msg(
        &self,
        msg: &SyntheticMessage,
        state: &mut dyn StateView,
        header: &Header,
        chain: &dyn ChainHeaderReader,
        config: &ChainConfig,
    ) -> Result<ExecutionResult, VmError> {
        let to = msg.to.ok_or(VmError::ContractCreation)?;
        let gas_limit = msg.gas_limit.min(config.system_call_gas_cap);

        if msg.check_nonce {
            let expected = state.nonce(&msg.from);
            if expected != msg.nonce {
                return Err(VmError::NonceMismatch {
                    address: msg.from,
                    expected,
                    got: msg.nonce,
                });
            }
        }

        counter!("congress_vm.system_calls", 1);
        let snapshot = state.snapshot();
        if let Err(e) = state.transfer(&msg.from, &to, msg.value) {
            state.revert_to_snapshot(snapshot)?;
            return Err(e.into());
        }

        if state.code_hash(&to) == EMPTY_CODE_HASH {
            debug!(contract = ?to, block = header.number, "System call to account without code");
            return Ok(ExecutionResult {
                output: Vec::new(),
                gas_used: 0,
                logs: Vec::new(),
            });
        }

        let block = BlockContext::new(header, config);
        let frame = CallFrame {
            caller: msg.from,
            address: to,
            value: msg.value,
            input: &msg.data,
            gas_limit,
        };
        let outcome = self.interpreter.call(&block, chain, &frame, state);

        match outcome.status {
            CallStatus::Success if outcome.gas_used <= gas_limit => {
                for log in &outcome.logs {
                    state.add_log(log.clone());
                }
                debug!(
                    contract = ?to,
                    selector = %hex::encode(msg.data.get(..4).unwrap_or_default()),
                    gas_used = outcome.gas_used,
                    "System call succeeded"
                );
                Ok(ExecutionResult {
                    output: outcome.output,
                    gas_used: outcome.gas_used,
                    logs: outcome.logs,
                })
            }
            CallStatus::Success | CallStatus::OutOfGas => {
                state.revert_to_snapshot(snapshot)?;
                counter!("congress_vm.system_call_failures", 1);
                warn!(contract = ?to, gas_limit, "System call ran out of gas");
                Err(VmError::OutOfGas { gas_limit })
            }
            CallStatus::Revert => {
                state.revert_to_snapshot(snapshot)?;
                counter!("congress_vm.system_call_failures", 1);
                let reason = decode_revert_reason(&outcome.output);
                warn!(contract = ?to, reason = ?reason, "System call reverted");
                Err(VmError::Reverted {
                    reason,
                    gas_used: outcome.gas_used,
                })
            }
            CallStatus::Halt(reason) => {
                state.revert_to_snapshot(snapshot)?;
                counter!("congress_vm.system_call_failures", 1);
                warn!(contract = ?to, %reason, "System call halted");
                Err(VmError::Halted(reason))
            }
        }
    }
}
