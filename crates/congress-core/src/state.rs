// State access contract and an in-memory journaled implementation.
//
// SAFETY INVARIANTS:
// 1. Every mutation is journaled, so `revert_to_snapshot` restores the exact
//    pre-snapshot state (no partial writes survive a failed operation)
// 2. Iteration order is deterministic (BTreeMap), so `state_root` is identical
//    on every node for identical contents
// 3. Balances never go negative: `sub_balance` fails instead

use crate::error::CoreError;
use crate::types::{keccak256, Address, Log, EMPTY_CODE_HASH, H256, U256};
use log::trace;
use std::collections::BTreeMap;

/// Read-only storage access, the only capability policy checks need.
pub trait StateReader {
    fn get_state(&self, address: &Address, key: &H256) -> H256;
}

/// Mutable account state for one block's execution.
pub trait StateView: StateReader + Send {
    fn balance(&self, address: &Address) -> U256;
    fn set_balance(&mut self, address: &Address, amount: U256);
    fn nonce(&self, address: &Address) -> u64;
    fn set_nonce(&mut self, address: &Address, nonce: u64);
    fn code(&self, address: &Address) -> Vec<u8>;
    fn code_hash(&self, address: &Address) -> H256;
    fn set_code(&mut self, address: &Address, code: Vec<u8>);
    fn set_state(&mut self, address: &Address, key: H256, value: H256);
    fn add_log(&mut self, log: Log);

    /// Opens a revert point and returns its id.
    fn snapshot(&mut self) -> usize;
    /// Undoes every change made since `snapshot` returned `id`.
    fn revert_to_snapshot(&mut self, id: usize) -> Result<(), CoreError>;
    /// Commitment over the full account state.
    fn state_root(&self) -> H256;

    /// Credits `amount`. A credit that would overflow leaves the balance
    /// unchanged.
    fn add_balance(&mut self, address: &Address, amount: U256) -> Result<(), CoreError> {
        let current = self.balance(address);
        let credited = current
            .checked_add(amount)
            .ok_or(CoreError::BalanceOverflow {
                address: *address,
                balance: current,
                amount,
            })?;
        self.set_balance(address, credited);
        Ok(())
    }

    fn sub_balance(&mut self, address: &Address, amount: U256) -> Result<(), CoreError> {
        let current = self.balance(address);
        if current < amount {
            return Err(CoreError::InsufficientBalance {
                address: *address,
                balance: current,
                required: amount,
            });
        }
        self.set_balance(address, current - amount);
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: U256) -> Result<(), CoreError> {
        if amount.is_zero() {
            return Ok(());
        }
        if from != to && self.balance(to).checked_add(amount).is_none() {
            return Err(CoreError::BalanceOverflow {
                address: *to,
                balance: self.balance(to),
                amount,
            });
        }
        self.sub_balance(from, amount)?;
        self.add_balance(to, amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Vec<u8>,
    pub code_hash: H256,
    pub storage: BTreeMap<H256, H256>,
}

impl Default for Account {
    fn default() -> Self {
        Account {
            balance: U256::zero(),
            nonce: 0,
            code: Vec::new(),
            code_hash: EMPTY_CODE_HASH,
            storage: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum JournalEntry {
    Created(Address),
    Balance(Address, U256),
    Nonce(Address, u64),
    Code(Address, Vec<u8>, H256),
    Storage(Address, H256, Option<H256>),
    Log,
}

/// In-memory state with a geth-style journal.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    accounts: BTreeMap<Address, Account>,
    journal: Vec<JournalEntry>,
    snapshots: Vec<usize>,
    logs: Vec<Log>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from (address, balance) pairs.
    pub fn with_balances(balances: impl IntoIterator<Item = (Address, U256)>) -> Self {
        let mut state = MemoryState::new();
        for (address, balance) in balances {
            state.accounts.entry(address).or_default().balance = balance;
        }
        state
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Sum of every account balance.
    pub fn total_balance(&self) -> U256 {
        self.accounts
            .values()
            .fold(U256::zero(), |acc, a| acc.saturating_add(a.balance))
    }

    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Drops the journal, making the current contents the new baseline.
    pub fn commit(&mut self) {
        self.journal.clear();
        self.snapshots.clear();
    }

    fn account_mut(&mut self, address: &Address) -> &mut Account {
        if !self.accounts.contains_key(address) {
            self.journal.push(JournalEntry::Created(*address));
        }
        self.accounts.entry(*address).or_default()
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Created(address) => {
                self.accounts.remove(&address);
            }
            JournalEntry::Balance(address, prev) => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.balance = prev;
                }
            }
            JournalEntry::Nonce(address, prev) => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.nonce = prev;
                }
            }
            JournalEntry::Code(address, prev, prev_hash) => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.code = prev;
                    account.code_hash = prev_hash;
                }
            }
            JournalEntry::Storage(address, key, prev) => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    match prev {
                        Some(value) => account.storage.insert(key, value),
                        None => account.storage.remove(&key),
                    };
                }
            }
            JournalEntry::Log => {
                self.logs.pop();
            }
        }
    }
}

impl StateReader for MemoryState {
    fn get_state(&self, address: &Address, key: &H256) -> H256 {
        self.accounts
            .get(address)
            .and_then(|a| a.storage.get(key).copied())
            .unwrap_or_default()
    }
}

impl StateView for MemoryState {
    fn balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    fn set_balance(&mut self, address: &Address, amount: U256) {
        let account = self.account_mut(address);
        let prev = std::mem::replace(&mut account.balance, amount);
        self.journal.push(JournalEntry::Balance(*address, prev));
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    fn set_nonce(&mut self, address: &Address, nonce: u64) {
        let account = self.account_mut(address);
        let prev = std::mem::replace(&mut account.nonce, nonce);
        self.journal.push(JournalEntry::Nonce(*address, prev));
    }

    fn code(&self, address: &Address) -> Vec<u8> {
        self.accounts
            .get(address)
            .map(|a| a.code.clone())
            .unwrap_or_default()
    }

    fn code_hash(&self, address: &Address) -> H256 {
        self.accounts
            .get(address)
            .map(|a| a.code_hash)
            .unwrap_or(EMPTY_CODE_HASH)
    }

    fn set_code(&mut self, address: &Address, code: Vec<u8>) {
        let hash = keccak256(&code);
        let account = self.account_mut(address);
        let prev = std::mem::replace(&mut account.code, code);
        let prev_hash = std::mem::replace(&mut account.code_hash, hash);
        self.journal
            .push(JournalEntry::Code(*address, prev, prev_hash));
    }

    fn set_state(&mut self, address: &Address, key: H256, value: H256) {
        let account = self.account_mut(address);
        let prev = if value.is_zero() {
            account.storage.remove(&key)
        } else {
            account.storage.insert(key, value)
        };
        self.journal
            .push(JournalEntry::Storage(*address, key, prev));
    }

    fn add_log(&mut self, log: Log) {
        self.logs.push(log);
        self.journal.push(JournalEntry::Log);
    }

    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.journal.len());
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, id: usize) -> Result<(), CoreError> {
        let mark = *self
            .snapshots
            .get(id)
            .ok_or(CoreError::InvalidSnapshot(id))?;
        while self.journal.len() > mark {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        self.snapshots.truncate(id);
        trace!("Reverted state to snapshot {} (journal length {})", id, mark);
        Ok(())
    }

    fn state_root(&self) -> H256 {
        let mut buf = Vec::new();
        for (address, account) in &self.accounts {
            let mut balance = [0u8; 32];
            account.balance.to_big_endian(&mut balance);
            buf.extend_from_slice(address.as_bytes());
            buf.extend_from_slice(&balance);
            buf.extend_from_slice(&account.nonce.to_be_bytes());
            buf.extend_from_slice(account.code_hash.as_bytes());
            for (key, value) in &account.storage {
                buf.extend_from_slice(key.as_bytes());
                buf.extend_from_slice(value.as_bytes());
            }
        }
        keccak256(buf)
    }
}
