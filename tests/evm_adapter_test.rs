//! EVM Adapter Tests
//!
//! Runs the EVM family adapter against an in-process JSON-RPC mock:
//! fee market, nonce, approvals, broadcast rejections, receipts and
//! node health.

mod common;

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use chainflow::model::{
    Account, AssetId, Chain, ConfirmParams, FeePriority, GasPrice, SignData, SwapData,
    TransactionState, TransactionType, TransferData,
};
use chainflow::signing::transaction_hash;
use chainflow::swap::{ApprovalData, QuoteData};
use chainflow::model::Transaction;
use chainflow::{
    build_registries, EngineConfig, EngineError, LocalSigner, MemoryStore, Reconciler,
    Registries, StaticChainConfig, StatusRequest, TransactionEngine, TransactionRepository,
};
use common::{init_logging, spawn_rpc, RpcState};

const KEY: [u8; 32] = [1u8; 32];
const SENDER: &str = "0x1111111111111111111111111111111111111111";
const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";
const ROUTER: &str = "0x3333333333333333333333333333333333333333";
const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const TX_HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";

const GWEI: u128 = 1_000_000_000;

// ============================================================================
// Helper Functions
// ============================================================================

struct Harness {
    rpc: Arc<RpcState>,
    url: String,
    engine: TransactionEngine,
    reconciler: Reconciler,
}

impl Harness {
    fn registries(&self) -> &Registries {
        self.engine.registries()
    }
}

/// Mock node at nonce 7 with a 2 gwei base fee and 2/3/4 wei tier tips
async fn harness() -> Harness {
    init_logging();
    let rpc = Arc::new(RpcState::default());
    rpc.set_result("eth_getTransactionCount", json!("0x7"));
    rpc.set_result(
        "eth_feeHistory",
        json!({
            "oldestBlock": "0x10",
            "baseFeePerGas": ["0x3b9aca00", "0x77359400"],
            "gasUsedRatio": [0.5],
            "reward": [["0x1", "0x2", "0x3"], ["0x3", "0x4", "0x5"]]
        }),
    );
    rpc.set_result("eth_sendRawTransaction", json!(TX_HASH));
    rpc.set_result("eth_chainId", json!("0x1"));
    rpc.set_result("eth_blockNumber", json!("0x12a05f2"));
    let url = spawn_rpc(rpc.clone()).await;

    let config = EngineConfig::default().with_node_url(Chain::Ethereum, url.clone());
    let chain_config = Arc::new(StaticChainConfig::new());
    let registries = Arc::new(
        build_registries(&config, Arc::new(LocalSigner::new()), chain_config.clone()).unwrap(),
    );
    let repository = Arc::new(TransactionRepository::new(Arc::new(MemoryStore::new())));

    Harness {
        rpc,
        url,
        engine: TransactionEngine::new(registries.clone(), repository.clone()),
        reconciler: Reconciler::new(repository, registries, chain_config),
    }
}

fn eth_transfer(value: u128) -> ConfirmParams {
    ConfirmParams::Transfer(TransferData {
        asset_id: AssetId::native(Chain::Ethereum),
        from: SENDER.to_string(),
        to: RECIPIENT.to_string(),
        value,
        memo: None,
    })
}

fn usdc_swap(gas_limit: Option<u64>) -> ConfirmParams {
    ConfirmParams::Swap(SwapData {
        from_asset: AssetId::token(Chain::Ethereum, USDC),
        to_asset: AssetId::native(Chain::Ethereum),
        from: SENDER.to_string(),
        destination: SENDER.to_string(),
        from_value: 2_500_000,
        to_value: 1_000_000_000_000_000,
        provider: "uniswap_v3".to_string(),
        data: QuoteData {
            to: ROUTER.to_string(),
            data: "0x04e45aaf".to_string(),
            value: 0,
            approval: Some(ApprovalData {
                token: USDC.to_string(),
                spender: ROUTER.to_string(),
                value: 2_500_000,
            }),
            gas_limit,
        },
    })
}

fn account() -> Account {
    Account::new(Chain::Ethereum, SENDER, "m/44'/60'/0'/0/0")
}

fn status_request(hash: &str) -> StatusRequest {
    StatusRequest {
        chain: Chain::Ethereum,
        hash: hash.to_string(),
        sender: SENDER.to_string(),
        created_at: Utc::now(),
    }
}

// ============================================================================
// Preload and signing
// ============================================================================

#[tokio::test]
async fn test_native_transfer_preload() {
    let h = harness().await;
    let params = h.engine.preload(&eth_transfer(GWEI)).await.unwrap();

    match &params.chain_data.data {
        SignData::Ethereum(data) => {
            assert_eq!(data.chain_id, 1);
            assert_eq!(data.nonce, 7);
            assert!(data.approval.is_none());
        }
        other => panic!("unexpected sign data {:?}", other),
    }

    assert_eq!(params.fees.len(), 3);
    let normal = params
        .fees
        .iter()
        .find(|fee| fee.priority == FeePriority::Normal)
        .unwrap();
    assert_eq!(normal.gas_limit, 21_000);
    assert_eq!(
        normal.gas_price,
        GasPrice::Eip1559 {
            max_fee_per_gas: 4 * GWEI + 3,
            priority_fee: 3,
        }
    );
    assert_eq!(normal.amount, (4 * GWEI + 3) * 21_000);

    // Plain transfers use the fixed gas limit
    assert!(h.rpc.calls_to("eth_estimateGas").is_empty());
    assert_eq!(h.rpc.calls_to("eth_getTransactionCount"), vec![json!([SENDER, "pending"])]);
}

#[tokio::test]
async fn test_send_records_pending_transfer() {
    let h = harness().await;
    let recorded = h
        .engine
        .send(&account(), &eth_transfer(GWEI), FeePriority::Fast, &KEY)
        .await
        .unwrap();

    assert_eq!(recorded.len(), 1);
    let tx = &recorded[0];
    assert_eq!(tx.id, format!("ethereum_{}", TX_HASH));
    assert_eq!(tx.state, TransactionState::Pending);
    assert_eq!(tx.transaction_type, TransactionType::Transfer);
    assert_eq!(tx.fee, ((4 * GWEI + 4) * 21_000).to_string());

    let sent = h.rpc.calls_to("eth_sendRawTransaction");
    assert_eq!(sent.len(), 1);
    let raw = sent[0][0].as_str().unwrap();
    // EIP-1559 typed envelope
    assert!(raw.starts_with("0x02"), "{}", raw);
    let bytes = hex::decode(raw.trim_start_matches("0x")).unwrap();
    assert_eq!(transaction_hash(&bytes).len(), 66);

    let stored = h
        .engine
        .repository()
        .get_transaction(&tx.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.transaction.to, RECIPIENT);
}

#[tokio::test]
async fn test_swap_needing_approval_signs_two_payloads() {
    let h = harness().await;
    h.rpc.set_result("eth_call", json!(format!("0x{}", "0".repeat(64))));
    h.rpc.set_result("eth_estimateGas", json!("0xea60"));

    let params = h
        .engine
        .preload(&usdc_swap(Some(200_000)))
        .await
        .unwrap()
        .select_fee(FeePriority::Normal)
        .unwrap();

    match &params.chain_data.data {
        SignData::Ethereum(data) => {
            assert_eq!(data.approval.as_ref().map(|a| a.value), Some(2_500_000));
            assert_eq!(data.approval_gas_limit, Some(60_000));
        }
        other => panic!("unexpected sign data {:?}", other),
    }
    let fee = params.fee().unwrap();
    assert_eq!(fee.gas_limit, 200_000);
    assert_eq!(fee.amount, (4 * GWEI + 3) * 260_000);

    let payloads = h.engine.sign(&params, &KEY).unwrap();
    assert_eq!(payloads.len(), 2);
    assert_ne!(payloads[0], payloads[1]);
    // Only the approval is estimated
    assert_eq!(h.rpc.calls_to("eth_estimateGas").len(), 1);
}

#[tokio::test]
async fn test_swap_with_sufficient_allowance_skips_approval() {
    let h = harness().await;
    h.rpc.set_result("eth_call", json!(format!("0x{:064x}", 10_000_000u128)));

    let params = h.engine.preload(&usdc_swap(Some(200_000))).await.unwrap();
    match &params.chain_data.data {
        SignData::Ethereum(data) => assert!(data.approval.is_none()),
        other => panic!("unexpected sign data {:?}", other),
    }
    let payloads = h
        .engine
        .sign(&params.select_fee(FeePriority::Slow).unwrap(), &KEY)
        .unwrap();
    assert_eq!(payloads.len(), 1);
}

#[tokio::test]
async fn test_swap_needing_approval_without_gas_limit_is_rejected() {
    let h = harness().await;
    h.rpc.set_result("eth_call", json!("0x"));
    h.rpc.set_result("eth_estimateGas", json!("0xea60"));

    let err = h.engine.preload(&usdc_swap(None)).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_sign_with_unselected_fees_is_rejected() {
    let h = harness().await;
    let params = h.engine.preload(&eth_transfer(GWEI)).await.unwrap();
    assert!(h.engine.sign(&params, &KEY).is_err());
}

// ============================================================================
// Broadcast, status and node health
// ============================================================================

#[tokio::test]
async fn test_broadcast_rejection_message_is_verbatim() {
    let h = harness().await;
    h.rpc.set_error("eth_sendRawTransaction", "nonce too low");

    let err = h
        .engine
        .send(&account(), &eth_transfer(GWEI), FeePriority::Normal, &KEY)
        .await
        .unwrap_err();
    match &err {
        EngineError::Remote(message) => assert_eq!(message, "nonce too low"),
        other => panic!("expected remote rejection, got {:?}", other),
    }
    assert_eq!(err.to_string(), "nonce too low");
    assert!(h.engine.repository().get_transactions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_receipt_maps_to_state_and_fee() {
    let h = harness().await;
    let status = &h.registries().status;

    h.rpc.set_result("eth_getTransactionReceipt", Value::Null);
    let changes = status.transaction_status(&status_request(TX_HASH)).await.unwrap();
    assert_eq!(changes.state, TransactionState::Pending);
    assert!(changes.fee.is_none());

    h.rpc.set_result(
        "eth_getTransactionReceipt",
        json!({ "status": "0x1", "gasUsed": "0x5208", "effectiveGasPrice": "0x3b9aca00" }),
    );
    let changes = status.transaction_status(&status_request(TX_HASH)).await.unwrap();
    assert_eq!(changes.state, TransactionState::Confirmed);
    assert_eq!(changes.fee.as_deref(), Some("21000000000000"));

    h.rpc.set_result(
        "eth_getTransactionReceipt",
        json!({ "status": "0x0", "gasUsed": "0x7530", "effectiveGasPrice": "0x1" }),
    );
    let changes = status.transaction_status(&status_request(TX_HASH)).await.unwrap();
    assert_eq!(changes.state, TransactionState::Reverted);
    assert_eq!(changes.fee.as_deref(), Some("30000"));
}

#[tokio::test]
async fn test_receipt_fee_overflow_is_a_network_error() {
    let h = harness().await;
    h.rpc.set_result(
        "eth_getTransactionReceipt",
        json!({
            "status": "0x1",
            "gasUsed": format!("0x{}", "f".repeat(64)),
            "effectiveGasPrice": "0x2"
        }),
    );
    let err = h
        .registries()
        .status
        .transaction_status(&status_request(TX_HASH))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Network(_)), "got {:?}", err);

    // Wider than u128 but within uint256 is still a valid fee
    h.rpc.set_result(
        "eth_getTransactionReceipt",
        json!({
            "status": "0x1",
            "gasUsed": format!("0x{:x}", u128::MAX),
            "effectiveGasPrice": "0x2"
        }),
    );
    let changes = h
        .registries()
        .status
        .transaction_status(&status_request(TX_HASH))
        .await
        .unwrap();
    assert_eq!(
        changes.fee.as_deref(),
        Some("680564733841876926926749214863536422910")
    );
}

#[tokio::test]
async fn test_reconciler_survives_overflowing_receipt() {
    let h = harness().await;
    let tx = Transaction::new(
        TX_HASH,
        AssetId::native(Chain::Ethereum),
        SENDER,
        RECIPIENT,
        TransactionType::Transfer,
        GWEI.to_string(),
        Utc::now(),
    );
    h.engine.repository().add_transaction(tx.clone()).await.unwrap();

    h.rpc.set_result(
        "eth_getTransactionReceipt",
        json!({
            "status": "0x1",
            "gasUsed": format!("0x{}", "f".repeat(64)),
            "effectiveGasPrice": "0xff"
        }),
    );
    assert!(h.reconciler.run_cycle().await.unwrap().is_empty());
    let stored = h.engine.repository().get_transaction(&tx.id).await.unwrap().unwrap();
    assert_eq!(stored.transaction.state, TransactionState::Pending);

    // The node recovers and the next cycle settles the record
    h.rpc.set_result(
        "eth_getTransactionReceipt",
        json!({ "status": "0x1", "gasUsed": "0x5208", "effectiveGasPrice": "0x3b9aca00" }),
    );
    let changed = h.reconciler.run_cycle().await.unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].state, TransactionState::Confirmed);
    assert_eq!(changed[0].fee, "21000000000000");
}

#[tokio::test]
async fn test_fee_history_overflow_is_rejected_at_preload() {
    let h = harness().await;
    h.rpc.set_result(
        "eth_feeHistory",
        json!({
            "oldestBlock": "0x10",
            "baseFeePerGas": [format!("0x{:x}", u128::MAX / 2)],
            "gasUsedRatio": [0.5],
            "reward": [["0x1", "0x2", "0x3"]]
        }),
    );
    let err = h.engine.preload(&eth_transfer(GWEI)).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_node_status_decodes_hex_quantities() {
    let h = harness().await;
    let status = h
        .engine
        .node_status(Chain::Ethereum, &h.url)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.chain_id, "1");
    assert_eq!(status.latest_block_number, 19_531_250);
}
