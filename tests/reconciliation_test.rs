//! Reconciliation Tests
//!
//! Exercises the background confirmation loop against a scripted status
//! adapter: timeouts, hung checks, hash replacement, dynamic fees and
//! emission rules.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

use chainflow::model::{
    AssetId, Chain, Transaction, TransactionChanges, TransactionState, TransactionType,
};
use chainflow::{
    MemoryStore, Reconciler, Registries, StaticChainConfig, TransactionRepository,
};
use common::{init_logging, Scripted, ScriptedStatus};

// ============================================================================
// Helper Functions
// ============================================================================

fn pending(chain: Chain, hash: &str, created_at: chrono::DateTime<Utc>) -> Transaction {
    Transaction::new(
        hash,
        AssetId::native(chain),
        "sender-address",
        "recipient-address",
        TransactionType::Transfer,
        "125000",
        created_at,
    )
    .with_fee(AssetId::native(chain), "1000")
    .with_memo(Some("invoice 42".to_string()))
}

struct Setup {
    status: Arc<ScriptedStatus>,
    repository: Arc<TransactionRepository>,
    reconciler: Reconciler,
}

fn setup(chains: &[Chain], chain_config: StaticChainConfig) -> Setup {
    init_logging();
    let status = Arc::new(ScriptedStatus::new(chains));
    let mut registries = Registries::new();
    registries.status.register(status.clone());

    let repository = Arc::new(TransactionRepository::new(Arc::new(MemoryStore::new())));
    let reconciler = Reconciler::new(
        repository.clone(),
        Arc::new(registries),
        Arc::new(chain_config),
    );
    Setup {
        status,
        repository,
        reconciler,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_timeout_fails_stale_pending_record() {
    let s = setup(
        &[Chain::Bitcoin],
        StaticChainConfig::new().with_timeout(Chain::Bitcoin, 120),
    );
    let t0 = Utc::now();
    s.repository
        .add_transaction(pending(Chain::Bitcoin, "aa11", t0))
        .await
        .unwrap();

    let changed = s
        .reconciler
        .run_cycle_at(t0 + ChronoDuration::seconds(60))
        .await
        .unwrap();
    assert!(changed.is_empty());

    let changed = s
        .reconciler
        .run_cycle_at(t0 + ChronoDuration::seconds(121))
        .await
        .unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].state, TransactionState::Failed);
    // Static-fee chain: the broadcast-time fee stands
    assert_eq!(changed[0].fee, "1000");
    assert_eq!(s.status.call_count(), 2);
}

#[tokio::test]
async fn test_terminal_answer_wins_over_timeout() {
    let s = setup(
        &[Chain::Bitcoin],
        StaticChainConfig::new().with_timeout(Chain::Bitcoin, 120),
    );
    let t0 = Utc::now();
    s.repository
        .add_transaction(pending(Chain::Bitcoin, "bb22", t0))
        .await
        .unwrap();
    s.status.answer(
        "bb22",
        Scripted::Answer(TransactionChanges::new(TransactionState::Confirmed)),
    );

    let changed = s
        .reconciler
        .run_cycle_at(t0 + ChronoDuration::seconds(500))
        .await
        .unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].state, TransactionState::Confirmed);
}

#[tokio::test]
async fn test_hung_check_does_not_block_the_cycle() {
    let s = setup(&[Chain::Bitcoin], StaticChainConfig::new());
    let now = Utc::now();
    s.repository
        .add_transaction(pending(Chain::Bitcoin, "hang", now))
        .await
        .unwrap();
    s.repository
        .add_transaction(pending(Chain::Bitcoin, "done", now))
        .await
        .unwrap();
    s.status.answer("hang", Scripted::Hang);
    s.status.answer(
        "done",
        Scripted::Answer(TransactionChanges::new(TransactionState::Reverted)),
    );

    let reconciler = s.reconciler.with_check_timeout(Duration::from_millis(200));
    let changed = tokio::time::timeout(Duration::from_secs(5), reconciler.run_cycle())
        .await
        .expect("cycle finished")
        .unwrap();

    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].hash, "done");
    assert_eq!(changed[0].state, TransactionState::Reverted);

    let hung = s
        .repository
        .get_transaction("bitcoin_hang")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hung.transaction.state, TransactionState::Pending);
}

#[tokio::test]
async fn test_failed_check_leaves_record_pending() {
    let s = setup(&[Chain::Bitcoin], StaticChainConfig::new());
    s.repository
        .add_transaction(pending(Chain::Bitcoin, "cc33", Utc::now()))
        .await
        .unwrap();
    s.status
        .answer("cc33", Scripted::Fail("connection reset".to_string()));

    assert!(s.reconciler.run_cycle().await.unwrap().is_empty());
    assert_eq!(s.repository.get_pending_transactions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_replaced_hash_rekeys_record() {
    let s = setup(&[Chain::Bitcoin], StaticChainConfig::new());
    s.repository
        .add_transaction(pending(Chain::Bitcoin, "old0", Utc::now()))
        .await
        .unwrap();
    s.status.answer(
        "old0",
        Scripted::Answer(TransactionChanges::pending().with_hash_change("old0", "new1")),
    );

    let changed = s.reconciler.run_cycle().await.unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].id, "bitcoin_new1");

    assert!(s
        .repository
        .get_transaction("bitcoin_old0")
        .await
        .unwrap()
        .is_none());
    let replaced = s
        .repository
        .get_transaction("bitcoin_new1")
        .await
        .unwrap()
        .unwrap()
        .transaction;
    assert_eq!(replaced.hash, "new1");
    assert_eq!(replaced.state, TransactionState::Pending);
    assert_eq!(replaced.from, "sender-address");
    assert_eq!(replaced.to, "recipient-address");
    assert_eq!(replaced.memo.as_deref(), Some("invoice 42"));
    assert_eq!(replaced.value, "125000");

    // The next cycle checks the new hash
    s.reconciler.run_cycle().await.unwrap();
    let calls = s.status.calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["old0".to_string(), "new1".to_string()]);
}

#[tokio::test]
async fn test_unchanged_cycle_emits_nothing() {
    let s = setup(&[Chain::Bitcoin], StaticChainConfig::new());
    let mut changes = s.repository.changed_transactions();
    s.repository
        .add_transaction(pending(Chain::Bitcoin, "dd44", Utc::now()))
        .await
        .unwrap();

    for _ in 0..3 {
        assert!(s.reconciler.run_cycle().await.unwrap().is_empty());
    }
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_one_batch_per_cycle() {
    let s = setup(&[Chain::Bitcoin], StaticChainConfig::new());
    let mut changes = s.repository.changed_transactions();
    for hash in ["e1", "e2", "e3"] {
        s.repository
            .add_transaction(pending(Chain::Bitcoin, hash, Utc::now()))
            .await
            .unwrap();
        s.status.answer(
            hash,
            Scripted::Answer(TransactionChanges::new(TransactionState::Confirmed)),
        );
    }

    let changed = s.reconciler.run_cycle().await.unwrap();
    assert_eq!(changed.len(), 3);

    let batch = changes.try_recv().unwrap();
    assert_eq!(batch.len(), 3);
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_reported_fee_kept_only_on_dynamic_fee_chains() {
    let s = setup(&[Chain::Ethereum, Chain::Bitcoin], StaticChainConfig::new());
    s.repository
        .add_transaction(pending(Chain::Ethereum, "0xeth", Utc::now()))
        .await
        .unwrap();
    s.repository
        .add_transaction(pending(Chain::Bitcoin, "btc", Utc::now()))
        .await
        .unwrap();
    s.status.answer(
        "0xeth",
        Scripted::Answer(TransactionChanges::new(TransactionState::Confirmed).with_fee(420u64)),
    );
    s.status.answer(
        "btc",
        Scripted::Answer(TransactionChanges::new(TransactionState::Confirmed).with_fee(420u64)),
    );

    s.reconciler.run_cycle().await.unwrap();

    let eth = s
        .repository
        .get_transaction("ethereum_0xeth")
        .await
        .unwrap()
        .unwrap()
        .transaction;
    assert_eq!(eth.state, TransactionState::Confirmed);
    assert_eq!(eth.fee, "420");

    let btc = s
        .repository
        .get_transaction("bitcoin_btc")
        .await
        .unwrap()
        .unwrap()
        .transaction;
    assert_eq!(btc.state, TransactionState::Confirmed);
    assert_eq!(btc.fee, "1000");
}

#[tokio::test]
async fn test_chain_without_status_adapter_stays_pending() {
    let s = setup(&[Chain::Bitcoin], StaticChainConfig::new());
    s.repository
        .add_transaction(pending(Chain::Xrp, "ABCDEF", Utc::now()))
        .await
        .unwrap();

    assert!(s.reconciler.run_cycle().await.unwrap().is_empty());
    let stored = s
        .repository
        .get_transaction("xrp_ABCDEF")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.transaction.state, TransactionState::Pending);
    assert_eq!(s.status.call_count(), 0);
}

#[tokio::test]
async fn test_record_terminated_during_check_is_not_overwritten() {
    let s = setup(&[Chain::Bitcoin], StaticChainConfig::new());
    let tx = pending(Chain::Bitcoin, "ff55", Utc::now());
    s.repository.add_transaction(tx.clone()).await.unwrap();

    // An import marks it Confirmed before this cycle's update lands
    s.repository
        .put_transactions(vec![tx.with_state(TransactionState::Confirmed)])
        .await
        .unwrap();
    let updates = vec![chainflow::transactions::TransactionUpdate::new(
        "bitcoin_ff55",
        TransactionChanges::new(TransactionState::Failed),
    )];
    assert!(s.repository.apply_updates(updates).await.unwrap().is_empty());

    let stored = s
        .repository
        .get_transaction("bitcoin_ff55")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.transaction.state, TransactionState::Confirmed);
}

#[tokio::test]
async fn test_panicking_check_does_not_stop_the_loop() {
    let s = setup(&[Chain::Bitcoin], StaticChainConfig::new());
    let now = Utc::now();
    for hash in ["boom", "ok01"] {
        s.repository
            .add_transaction(pending(Chain::Bitcoin, hash, now))
            .await
            .unwrap();
    }
    s.status.answer("boom", Scripted::Panic);
    s.status.answer(
        "ok01",
        Scripted::Answer(TransactionChanges::new(TransactionState::Confirmed)),
    );

    let changed = s.reconciler.run_cycle().await.unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].hash, "ok01");
    let boom = s
        .repository
        .get_transaction("bitcoin_boom")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(boom.transaction.state, TransactionState::Pending);

    // The spawned loop keeps polling the panicking record
    let calls_before = s.status.call_count();
    let reconciler = Arc::new(s.reconciler.with_interval(Duration::from_millis(20)));
    let handle = reconciler.spawn();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());
    assert!(s.status.call_count() >= calls_before + 2);
    handle.abort();
}
