mod common;

use common::*;
use congress_consensus::congress::{wiggle_window, WIGGLE_TIME};
use congress_consensus::{ConsensusError, Engine, ValidationError, DIFF_IN_TURN, DIFF_NO_TURN};
use congress_core::{Block, Header, U256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn prepared(harness: &Harness, parent: &Header) -> Header {
    let mut header = Header {
        parent_hash: parent.hash(),
        number: parent.number + 1,
        gas_limit: GAS_LIMIT,
        ..Default::default()
    };
    harness
        .engine
        .prepare(harness.chain.as_ref(), &mut header)
        .unwrap();
    header
}

#[test]
fn test_prepare_fills_consensus_fields() {
    let harness = Harness::testnet();
    let genesis = harness.genesis();

    harness.engine.authorize(in_turn(1));
    let header = prepared(&harness, &genesis);
    assert_eq!(header.coinbase, in_turn(1));
    assert_eq!(header.difficulty, U256::from(DIFF_IN_TURN));
    assert!(header.extra.is_empty());
    assert!(header.time >= genesis.time + harness.config.congress.period);
    assert!(header.seal.is_empty());

    harness.engine.authorize(out_of_turn(1));
    let header = prepared(&harness, &genesis);
    assert_eq!(header.difficulty, U256::from(DIFF_NO_TURN));
    assert_eq!(
        harness.engine.calc_difficulty(harness.chain.as_ref(), header.time, &genesis),
        U256::from(DIFF_NO_TURN)
    );

    harness.engine.authorize(in_turn(1));
    assert_eq!(
        harness.engine.calc_difficulty(harness.chain.as_ref(), header.time, &genesis),
        U256::from(DIFF_IN_TURN)
    );
}

#[test]
fn test_prepare_epoch_block_carries_validators() {
    let harness = Harness::testnet();
    let head = harness.import_to(9);
    harness.engine.authorize(in_turn(10));
    let header = prepared(&harness, &head);
    assert_eq!(header.checkpoint_validators(), Some(validators()));
}

#[test]
fn test_prepare_saturates_timestamp_at_u64_max() {
    let harness = Harness::testnet();
    let genesis = harness.genesis();
    let parent = harness.child_with(&genesis, in_turn(1), |h| h.time = u64::MAX);
    harness.chain.insert_header(parent.clone());

    harness.engine.authorize(in_turn(2));
    let header = prepared(&harness, &parent);
    assert_eq!(header.number, 2);
    assert_eq!(header.time, u64::MAX);
}

#[test]
fn test_prepare_without_signer_fails() {
    let harness = Harness::testnet();
    let genesis = harness.genesis();
    let mut header = Header {
        parent_hash: genesis.hash(),
        number: 1,
        ..Default::default()
    };
    let err = harness
        .engine
        .prepare(harness.chain.as_ref(), &mut header)
        .unwrap_err();
    assert_eq!(err.validation(), Some(&ValidationError::MissingLocalSigner));
}

#[tokio::test]
async fn test_sealed_block_is_delivered_and_verifies() {
    let harness = Harness::testnet();
    let genesis = harness.genesis();
    harness.engine.authorize(in_turn(1));
    let header = prepared(&harness, &genesis);
    let block = Block::new(header, vec![], vec![], &[]);

    let mut task = harness.engine.seal(harness.chain.clone(), block.clone()).unwrap();
    let sealed = task.next().await.expect("sealed block");
    assert_eq!(sealed.header.seal_hash(), block.header.seal_hash());
    assert_eq!(harness.engine.author(&sealed.header).unwrap(), in_turn(1));
    harness
        .engine
        .verify_header(harness.chain.as_ref(), &sealed.header, true)
        .unwrap();
    assert!(task.next().await.is_none());
    task.join().await.unwrap();
}

#[test]
fn test_wiggle_window_grows_with_signer_count() {
    assert_eq!(wiggle_window(1), WIGGLE_TIME);
    assert_eq!(wiggle_window(3), WIGGLE_TIME * 2);
    assert_eq!(wiggle_window(21), Duration::from_millis(5_500));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_turn_seal_waits_within_wiggle_window() {
    let harness = Harness::testnet();
    let genesis = harness.genesis();
    harness.engine.authorize(out_of_turn(1));
    let header = prepared(&harness, &genesis);
    let until_time = Duration::from_secs(header.time.saturating_sub(unix_now()) + 1);
    let block = Block::new(header, vec![], vec![], &[]);

    let started = tokio::time::Instant::now();
    let mut task = harness.engine.seal(harness.chain.clone(), block).unwrap();
    let sealed = task.next().await.expect("sealed block");
    assert!(started.elapsed() < until_time + wiggle_window(validators().len()));
    assert_eq!(harness.engine.author(&sealed.header).unwrap(), out_of_turn(1));
}

#[tokio::test]
async fn test_cancelled_seal_yields_nothing() {
    let harness = Harness::testnet();
    let genesis = harness.genesis();
    harness.engine.authorize(in_turn(1));
    let mut header = prepared(&harness, &genesis);
    header.time = unix_now() + 3_600;
    let block = Block::new(header, vec![], vec![], &[]);

    let mut task = harness.engine.seal(harness.chain.clone(), block).unwrap();
    task.cancel();
    assert!(task.is_cancelled());
    let next = tokio::time::timeout(Duration::from_secs(5), task.next()).await;
    assert!(matches!(next, Ok(None)));
    task.join().await.unwrap();
}

#[tokio::test]
async fn test_close_cancels_pending_seals() {
    let harness = Harness::testnet();
    let genesis = harness.genesis();
    harness.engine.authorize(in_turn(1));
    let mut header = prepared(&harness, &genesis);
    header.time = unix_now() + 3_600;
    let block = Block::new(header, vec![], vec![], &[]);

    let mut task = harness.engine.seal(harness.chain.clone(), block).unwrap();
    harness.engine.close().unwrap();
    assert!(task.is_cancelled());
    assert!(task.next().await.is_none());
    task.join().await.unwrap();
}

#[tokio::test]
async fn test_seal_requires_an_authorized_signer() {
    let harness = Harness::testnet();
    let genesis = harness.genesis();
    let block = Block::new(harness.child(&genesis, in_turn(1)), vec![], vec![], &[]);

    let err = harness
        .engine
        .seal(harness.chain.clone(), block.clone())
        .err()
        .expect("no signer");
    assert_eq!(err.validation(), Some(&ValidationError::MissingLocalSigner));

    let stranger = congress_core::Address::from_low_u64_be(0xdead);
    harness.engine.authorize(stranger);
    let err = harness
        .engine
        .seal(harness.chain.clone(), block)
        .err()
        .expect("unauthorized");
    assert!(matches!(
        err,
        ConsensusError::Validation(ValidationError::UnauthorizedSigner(_))
    ));
}
