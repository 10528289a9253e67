#![allow(dead_code)]

use congress_consensus::{Congress, ConsensusError, SealScheme, ValidationError};
use congress_core::{
    address_to_word, encode_validators, keccak256, u256_to_word, word_to_u256, Address, Block,
    ChainConfig, ChainHeaderReader, Header, MemoryChain, MemoryState, StateReader, StateView, SystemRegistry, H256,
    U256,
};
use congress_vm::abi::encode_revert_reason;
use congress_vm::testing::ScriptedInterpreter;
use congress_vm::{CallOutcome, Token};
use std::sync::Arc;

pub const GENESIS_TIME: u64 = 1_000_000;
pub const GAS_LIMIT: u64 = 30_000_000;

/// Punish contract storage: initialized flag.
pub const INITIALIZED_SLOT: H256 = H256::zero();

/// Legacy punish bytecode present before the upgrade.
pub const PUNISH_V1_CODE: [u8; 4] = [0x60, 0x01, 0x60, 0x00];

/// Deterministic signature: signer address followed by a keyed tag.
pub struct TestSeal;

fn seal_tag(signer: &Address, seal_hash: &H256) -> H256 {
    keccak256([signer.as_bytes(), seal_hash.as_bytes()].concat())
}

impl SealScheme for TestSeal {
    fn sign(&self, signer: &Address, seal_hash: &H256) -> Result<Vec<u8>, ConsensusError> {
        let mut seal = signer.as_bytes().to_vec();
        seal.extend_from_slice(seal_tag(signer, seal_hash).as_bytes());
        Ok(seal)
    }

    fn recover(&self, seal_hash: &H256, seal: &[u8]) -> Result<Address, ConsensusError> {
        if seal.len() != 52 {
            return Err(ValidationError::InvalidSignature("bad seal length".into()).into());
        }
        let signer = Address::from_slice(&seal[..20]);
        if seal[20..] != *seal_tag(&signer, seal_hash).as_bytes() {
            return Err(ValidationError::InvalidSignature("tag mismatch".into()).into());
        }
        Ok(signer)
    }
}

pub fn validators() -> Vec<Address> {
    vec![
        Address::from_low_u64_be(0xa1),
        Address::from_low_u64_be(0xa2),
        Address::from_low_u64_be(0xa3),
    ]
}

pub fn in_turn(number: u64) -> Address {
    let validators = validators();
    validators[(number % validators.len() as u64) as usize]
}

pub fn out_of_turn(number: u64) -> Address {
    in_turn(number + 1)
}

/// Punish contract storage: missed-block counter of `validator`.
pub fn missed_blocks_slot(validator: &Address) -> H256 {
    let mut key = address_to_word(validator).as_bytes().to_vec();
    key.extend_from_slice(H256::from_low_u64_be(1).as_bytes());
    keccak256(key)
}

/// Rust models of the punish and validators contracts.
pub fn system_contracts(registry: &SystemRegistry, active: Vec<Address>) -> ScriptedInterpreter {
    let punish = registry.punish_contract;
    let vals = registry.validators_contract;
    ScriptedInterpreter::new()
        .on(punish, "initialize()", |_, frame, state| {
            if !state.get_state(&frame.address, &INITIALIZED_SLOT).is_zero() {
                return CallOutcome::revert(encode_revert_reason("Already initialized"), 3_000);
            }
            state.set_state(&frame.address, INITIALIZED_SLOT, H256::from_low_u64_be(1));
            CallOutcome::success(Vec::new(), 45_000)
        })
        .on(punish, "punish(address)", |block, frame, state| {
            if frame.caller != block.coinbase {
                return CallOutcome::revert(encode_revert_reason("Miner only"), 1_000);
            }
            let Some(raw) = frame.input.get(16..36) else {
                return CallOutcome::revert(Vec::new(), 1_000);
            };
            let slot = missed_blocks_slot(&Address::from_slice(raw));
            let missed = word_to_u256(&state.get_state(&frame.address, &slot));
            state.set_state(&frame.address, slot, u256_to_word(missed + U256::one()));
            CallOutcome::success(Vec::new(), 25_000)
        })
        .on(vals, "distributeBlockReward()", |_, _, _| {
            CallOutcome::success(Vec::new(), 30_000)
        })
        .on(vals, "getActiveValidators()", move |_, _, _| {
            let list = active.iter().copied().map(Token::Address).collect();
            CallOutcome::success(ethabi::encode(&[Token::Array(list)]), 10_000)
        })
}

pub fn genesis() -> Header {
    Header {
        number: 0,
        time: GENESIS_TIME,
        gas_limit: GAS_LIMIT,
        extra: encode_validators(&validators()),
        ..Default::default()
    }
}

/// System contracts deployed with their pre-fork code.
pub fn genesis_state(registry: &SystemRegistry) -> MemoryState {
    let mut state = MemoryState::new();
    state.set_code(&registry.validators_contract, vec![0x60, 0x80]);
    state.set_code(&registry.proposal_contract, vec![0x60, 0x80]);
    state.set_code(&registry.punish_contract, PUNISH_V1_CODE.to_vec());
    state.commit();
    state
}

pub struct Harness {
    pub config: ChainConfig,
    pub chain: Arc<MemoryChain>,
    pub engine: Congress,
    pub interpreter: Arc<ScriptedInterpreter>,
}

impl Harness {
    pub fn new(config: ChainConfig) -> Self {
        let interpreter = Arc::new(system_contracts(&config.registry, validators()));
        Self::with_interpreter(config, interpreter)
    }

    pub fn with_interpreter(config: ChainConfig, interpreter: Arc<ScriptedInterpreter>) -> Self {
        let engine = Congress::new(config.clone(), interpreter.clone(), Arc::new(TestSeal))
            .expect("engine");
        let chain = Arc::new(MemoryChain::new(
            config.clone(),
            Block::new(genesis(), vec![], vec![], &[]),
        ));
        Harness {
            config,
            chain,
            engine,
            interpreter,
        }
    }

    pub fn testnet() -> Self {
        Self::new(ChainConfig::testnet())
    }

    pub fn genesis(&self) -> Header {
        self.chain.header_by_number(0).expect("genesis")
    }

    /// The child of `parent` signed by `signer`, after `mutate` has been
    /// applied to the unsigned header.
    pub fn child_with(&self, parent: &Header, signer: Address, mutate: impl Fn(&mut Header)) -> Header {
        let number = parent.number + 1;
        let difficulty = if in_turn(number) == signer { 2 } else { 1 };
        let extra = if self.config.is_epoch(number) {
            encode_validators(&validators())
        } else {
            Vec::new()
        };
        let mut header = Header {
            parent_hash: parent.hash(),
            number,
            coinbase: signer,
            difficulty: U256::from(difficulty),
            time: parent.time + self.config.congress.period,
            gas_limit: GAS_LIMIT,
            extra,
            ..Default::default()
        };
        mutate(&mut header);
        header.seal = TestSeal.sign(&signer, &header.seal_hash()).expect("sign");
        header
    }

    pub fn child(&self, parent: &Header, signer: Address) -> Header {
        self.child_with(parent, signer, |_| {})
    }

    /// `count` in-turn headers on top of `parent`, not imported.
    pub fn extend(&self, parent: &Header, count: usize) -> Vec<Header> {
        self.extend_with(parent, count, |_| {})
    }

    pub fn extend_with(&self, parent: &Header, count: usize, mutate: impl Fn(&mut Header)) -> Vec<Header> {
        let mut headers: Vec<Header> = Vec::with_capacity(count);
        for _ in 0..count {
            let parent = headers.last().unwrap_or(parent);
            let number = parent.number + 1;
            let next = self.child_with(parent, in_turn(number), &mutate);
            headers.push(next);
        }
        headers
    }

    /// Imports in-turn headers up to (and including) `number`.
    pub fn import_to(&self, number: u64) -> Header {
        let mut head = self.genesis();
        while head.number < number {
            let next = self.child(&head, in_turn(head.number + 1));
            self.chain.insert_header(next.clone());
            head = next;
        }
        head
    }
}

/// Snapshot of every balance, for comparisons.
pub fn balances(state: &MemoryState) -> Vec<(Address, U256)> {
    state
        .accounts()
        .map(|(addr, account)| (*addr, account.balance))
        .filter(|(_, balance)| !balance.is_zero())
        .collect()
}
