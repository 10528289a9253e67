mod common;

use common::*;
use congress_consensus::systemcontract::abi::{interactive_abi, METHOD_PUNISH};
use congress_consensus::{ConsensusError, EvmExtraValidator, PoSA, ValidationError};
use congress_core::{
    Address, Header, MemoryState, StateReader, StateView, SystemContract, Transaction, H256, U256,
};
use congress_vm::{Token, VmError};

fn tx(to: Option<Address>, gas_price: u64, data: Vec<u8>) -> Transaction {
    Transaction {
        nonce: 0,
        gas_price: U256::from(gas_price),
        gas_limit: 1_000_000,
        to,
        value: U256::zero(),
        data,
        signature: Vec::new(),
    }
}

fn header_at(number: u64) -> Header {
    Header {
        number,
        coinbase: in_turn(number),
        time: GENESIS_TIME + number,
        ..Default::default()
    }
}

fn punish_call(validator: Address) -> Vec<u8> {
    interactive_abi(SystemContract::Punish)
        .unwrap()
        .pack(METHOD_PUNISH, &[Token::Address(validator)])
        .unwrap()
}

#[test]
fn test_system_transaction_classification() {
    let harness = Harness::testnet();
    let punish = harness.config.registry.punish_contract;
    let header = header_at(3);
    let producer = header.coinbase;

    let free = tx(Some(punish), 0, punish_call(in_turn(2)));
    assert!(harness.engine.is_sys_transaction(&producer, &free, &header).unwrap());

    // Paying gas makes it an ordinary call, even from the producer.
    let priced = tx(Some(punish), 1, punish_call(in_turn(2)));
    assert!(!harness.engine.is_sys_transaction(&producer, &priced, &header).unwrap());

    let ordinary = tx(Some(Address::repeat_byte(7)), 0, Vec::new());
    assert!(!harness.engine.is_sys_transaction(&producer, &ordinary, &header).unwrap());

    let creation = tx(None, 0, vec![0x60, 0x00]);
    assert!(!harness.engine.is_sys_transaction(&producer, &creation, &header).unwrap());
}

#[test]
fn test_unauthorized_fee_free_call_is_rejected() {
    let harness = Harness::testnet();
    let registry = &harness.config.registry;
    let header = header_at(3);
    let intruder = Address::from_low_u64_be(0xbad);
    let state = genesis_state(registry);

    for to in [
        registry.validators_contract,
        registry.punish_contract,
        registry.proposal_contract,
    ] {
        let call = tx(Some(to), 0, punish_call(in_turn(2)));
        let err = harness
            .engine
            .is_sys_transaction(&intruder, &call, &header)
            .unwrap_err();
        assert_eq!(
            err.validation(),
            Some(&ValidationError::UnauthorizedSystemTransaction { sender: intruder, to })
        );
        assert!(harness
            .engine
            .validate_tx(&intruder, &call, &header, &state)
            .is_err());
    }
}

#[test]
fn test_apply_sys_tx_replays_producer_calls() {
    let harness = Harness::testnet();
    let registry = harness.config.registry.clone();
    let punish = registry.punish_contract;
    let header = header_at(3);
    let producer = header.coinbase;
    let mut state = genesis_state(&registry);

    let call = tx(Some(punish), 0, punish_call(in_turn(2)));
    let (output, failure) = harness
        .engine
        .apply_sys_tx(harness.chain.as_ref(), &header, &mut state, 0, &producer, &call)
        .unwrap();
    assert!(output.is_empty());
    assert!(failure.is_none());
    assert!(!state.get_state(&punish, &missed_blocks_slot(&in_turn(2))).is_zero());
}

#[test]
fn test_apply_sys_tx_reports_reverts_without_failing() {
    let harness = Harness::testnet();
    let registry = harness.config.registry.clone();
    let header = header_at(3);
    let producer = header.coinbase;
    let mut state = genesis_state(&registry);
    let root = state.state_root();

    let call = tx(Some(registry.punish_contract), 0, vec![0xde, 0xad, 0xbe, 0xef]);
    let (output, failure) = harness
        .engine
        .apply_sys_tx(harness.chain.as_ref(), &header, &mut state, 1, &producer, &call)
        .unwrap();
    assert!(output.is_empty());
    match failure {
        Some(VmError::Reverted { reason, .. }) => {
            assert_eq!(reason.as_deref(), Some("function selector not recognized"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(state.state_root(), root);
}

#[test]
fn test_apply_sys_tx_refuses_ordinary_transactions() {
    let harness = Harness::testnet();
    let header = header_at(3);
    let producer = header.coinbase;
    let mut state = MemoryState::new();

    let call = tx(Some(Address::repeat_byte(7)), 0, Vec::new());
    let err = harness
        .engine
        .apply_sys_tx(harness.chain.as_ref(), &header, &mut state, 0, &producer, &call)
        .unwrap_err();
    assert_eq!(err.validation(), Some(&ValidationError::NotSystemTransaction));

    let intruder = Address::from_low_u64_be(0xbad);
    let reserved = tx(Some(harness.config.registry.punish_contract), 0, Vec::new());
    let err = harness
        .engine
        .apply_sys_tx(harness.chain.as_ref(), &header, &mut state, 0, &intruder, &reserved)
        .unwrap_err();
    assert!(matches!(
        err,
        ConsensusError::Validation(ValidationError::UnauthorizedSystemTransaction { .. })
    ));
}

#[test]
fn test_contract_creation_gated_after_dev_verify_fork() {
    let harness = Harness::testnet();
    let policy = harness.config.registry.developer_allowlist;
    let fork = harness.config.dev_verify_block.unwrap();
    let developer = Address::from_low_u64_be(0xd1);
    let stranger = Address::from_low_u64_be(0xd2);

    let mut state = genesis_state(&harness.config.registry);
    state.set_state(&policy.contract, policy.mapping_key(&developer), H256::from_low_u64_be(1));

    // Switch off: anyone may create.
    assert!(harness.engine.can_create(&state, &stranger, fork));

    state.set_state(&policy.contract, policy.switch_slot, H256::from_low_u64_be(1));
    assert!(harness.engine.can_create(&state, &developer, fork));
    assert!(!harness.engine.can_create(&state, &stranger, fork));
    // Before the fork the list is ignored.
    assert!(harness.engine.can_create(&state, &stranger, fork - 1));

    let creation = tx(None, 1, vec![0x60, 0x00]);
    let err = harness
        .engine
        .validate_tx(&stranger, &creation, &header_at(fork), &state)
        .unwrap_err();
    assert_eq!(err.validation(), Some(&ValidationError::CreationNotAllowed(stranger)));
    assert!(harness
        .engine
        .validate_tx(&developer, &creation, &header_at(fork), &state)
        .is_ok());
    assert!(harness
        .engine
        .validate_tx(&stranger, &creation, &header_at(fork - 1), &state)
        .is_ok());
}

#[test]
fn test_denied_addresses_rejected_after_dev_verify_fork() {
    let harness = Harness::testnet();
    let policy = harness.config.registry.deny_list;
    let fork = harness.config.dev_verify_block.unwrap();
    let banned = Address::from_low_u64_be(0xb1);
    let honest = Address::from_low_u64_be(0xb2);

    let mut state = genesis_state(&harness.config.registry);
    state.set_state(&policy.contract, policy.switch_slot, H256::from_low_u64_be(1));
    state.set_state(&policy.contract, policy.mapping_key(&banned), H256::from_low_u64_be(1));

    let from_banned = tx(Some(honest), 1, Vec::new());
    let to_banned = tx(Some(banned), 1, Vec::new());
    let header = header_at(fork);

    assert_eq!(
        harness
            .engine
            .validate_tx(&banned, &from_banned, &header, &state)
            .unwrap_err()
            .validation(),
        Some(&ValidationError::DeniedAddress(banned))
    );
    assert_eq!(
        harness
            .engine
            .validate_tx(&honest, &to_banned, &header, &state)
            .unwrap_err()
            .validation(),
        Some(&ValidationError::DeniedAddress(banned))
    );
    assert!(harness
        .engine
        .validate_tx(&honest, &from_banned, &header, &state)
        .is_ok());

    let validator = harness
        .engine
        .create_evm_extra_validator(&header, &state)
        .unwrap();
    assert!(validator.is_address_denied(&banned));
    assert!(!validator.is_address_denied(&honest));
}

#[test]
fn test_no_extra_validator_before_dev_verify_fork() {
    let harness = Harness::testnet();
    let fork = harness.config.dev_verify_block.unwrap();
    let state = MemoryState::new();
    assert!(harness
        .engine
        .create_evm_extra_validator(&header_at(fork - 1), &state)
        .is_none());
    assert!(harness
        .engine
        .create_evm_extra_validator(&header_at(fork), &state)
        .is_some());
}
