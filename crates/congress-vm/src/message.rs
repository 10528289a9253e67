use congress_core::{Address, Transaction, U256};

/// An unsigned call descriptor built by the protocol itself.
///
/// Never persisted and never part of the block's transaction list. System
/// messages are fee-exempt: the executor does not charge gas to `from`, does
/// not check its nonce unless `check_nonce` is set, and does not bump it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticMessage {
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    /// Requested allowance; the executor clamps it to the chain's system-call cap.
    pub gas_limit: u64,
    pub gas_price: U256,
    pub data: Vec<u8>,
    pub check_nonce: bool,
}

impl SyntheticMessage {
    /// A fee-exempt call with the largest allowance the chain permits.
    pub fn system_call(from: Address, to: Address, value: U256, data: Vec<u8>) -> Self {
        SyntheticMessage {
            from,
            to: Some(to),
            nonce: 0,
            value,
            gas_limit: u64::MAX,
            gas_price: U256::zero(),
            data,
            check_nonce: false,
        }
    }

    /// Rebuilds the message a recorded transaction carried, for replay.
    pub fn from_transaction(sender: Address, tx: &Transaction) -> Self {
        SyntheticMessage {
            from: sender,
            to: tx.to,
            nonce: tx.nonce,
            value: tx.value,
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price,
            data: tx.data.clone(),
            check_nonce: false,
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}
