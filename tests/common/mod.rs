//! Shared test fixtures: in-process mock nodes and scripted adapters
//!
//! The mock Esplora speaks the same REST shapes as blockstream/mempool;
//! the mock JSON-RPC node answers canned results per method.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bitcoin::{Address, CompressedPublicKey, Network, PrivateKey};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chainflow::capability::{ChainAdapter, StatusChecker, StatusRequest};
use chainflow::model::{Chain, ChainType, TransactionChanges};
use chainflow::{EngineError, NativeSigner, SigningInput};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Bind to an ephemeral port and serve `router` in the background.
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    format!("http://{}", addr)
}

/// Regtest P2WPKH address owned by `key`
pub fn regtest_address(key: &[u8; 32]) -> String {
    let secp = bitcoin::secp256k1::Secp256k1::new();
    let sk = PrivateKey::from_slice(key, Network::Regtest).expect("valid key");
    let pk = CompressedPublicKey::from_private_key(&secp, &sk).expect("compressed key");
    Address::p2wpkh(&pk, Network::Regtest).to_string()
}

// ============================================================================
// Mock Esplora
// ============================================================================

#[derive(Default)]
pub struct EsploraState {
    pub tip_height: Mutex<u64>,
    pub fee_estimates: Mutex<Value>,
    pub utxos: Mutex<HashMap<String, Value>>,
    pub statuses: Mutex<HashMap<String, Value>>,
    pub broadcasts: Mutex<Vec<String>>,
}

impl EsploraState {
    pub fn confirm(&self, txid: &str, height: u64) {
        self.statuses.lock().unwrap().insert(
            txid.to_string(),
            json!({ "confirmed": true, "block_height": height }),
        );
    }
}

async fn tip_height(State(state): State<Arc<EsploraState>>) -> String {
    state.tip_height.lock().unwrap().to_string()
}

async fn fee_estimates(State(state): State<Arc<EsploraState>>) -> Json<Value> {
    Json(state.fee_estimates.lock().unwrap().clone())
}

async fn address_utxos(
    State(state): State<Arc<EsploraState>>,
    Path(address): Path<String>,
) -> Json<Value> {
    let utxos = state.utxos.lock().unwrap();
    Json(utxos.get(&address).cloned().unwrap_or_else(|| json!([])))
}

async fn tx_status(
    State(state): State<Arc<EsploraState>>,
    Path(txid): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let statuses = state.statuses.lock().unwrap();
    statuses
        .get(&txid)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn broadcast_tx(
    State(state): State<Arc<EsploraState>>,
    body: String,
) -> Result<String, (StatusCode, String)> {
    let bytes = hex::decode(body.trim())
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid hex: {}", e)))?;
    let tx: bitcoin::Transaction = bitcoin::consensus::encode::deserialize(&bytes).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("sendrawtransaction RPC error: {}", e),
        )
    })?;
    let txid = tx.compute_txid().to_string();
    state.broadcasts.lock().unwrap().push(txid.clone());
    Ok(txid)
}

pub async fn spawn_esplora(state: Arc<EsploraState>) -> String {
    let router = Router::new()
        .route("/blocks/tip/height", get(tip_height))
        .route("/fee-estimates", get(fee_estimates))
        .route("/address/:address/utxo", get(address_utxos))
        .route("/tx/:txid/status", get(tx_status))
        .route("/tx", post(broadcast_tx))
        .with_state(state);
    spawn_router(router).await
}

// ============================================================================
// Mock JSON-RPC node
// ============================================================================

#[derive(Default)]
pub struct RpcState {
    pub results: Mutex<HashMap<String, Value>>,
    pub errors: Mutex<HashMap<String, String>>,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl RpcState {
    pub fn set_result(&self, method: &str, result: Value) {
        self.results.lock().unwrap().insert(method.to_string(), result);
    }

    pub fn set_error(&self, method: &str, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .insert(method.to_string(), message.to_string());
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

async fn rpc_handler(State(state): State<Arc<RpcState>>, Json(body): Json<Value>) -> Json<Value> {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    state
        .calls
        .lock()
        .unwrap()
        .push((method.clone(), body["params"].clone()));

    if let Some(message) = state.errors.lock().unwrap().get(&method) {
        return Json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "error": { "code": -32000, "message": message },
        }));
    }
    match state.results.lock().unwrap().get(&method) {
        Some(result) => Json(json!({ "jsonrpc": "2.0", "id": body["id"], "result": result })),
        None => Json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "error": { "code": -32601, "message": format!("method {} not mocked", method) },
        })),
    }
}

pub async fn spawn_rpc(state: Arc<RpcState>) -> String {
    let router = Router::new().route("/", post(rpc_handler)).with_state(state);
    spawn_router(router).await
}

// ============================================================================
// Echo signer
// ============================================================================

/// Signs by serializing the input; remembers every request it was handed
#[derive(Default)]
pub struct EchoSigner {
    pub seen: Mutex<Vec<(ChainType, SigningInput)>>,
}

impl EchoSigner {
    pub fn last(&self) -> (ChainType, SigningInput) {
        self.seen.lock().unwrap().last().cloned().expect("signer was called")
    }
}

impl NativeSigner for EchoSigner {
    fn sign(
        &self,
        chain_type: ChainType,
        input: &SigningInput,
        _private_key: &[u8],
    ) -> Result<Vec<u8>, String> {
        self.seen.lock().unwrap().push((chain_type, input.clone()));
        serde_json::to_vec(input).map_err(|e| e.to_string())
    }
}

// ============================================================================
// Scripted status adapter
// ============================================================================

pub enum Scripted {
    Answer(TransactionChanges),
    Fail(String),
    Hang,
    Panic,
}

enum Outcome {
    Ready(Result<TransactionChanges, EngineError>),
    Hang,
    Panic,
}

/// Status checker whose answers are set per hash by the test
pub struct ScriptedStatus {
    pub chains: Vec<Chain>,
    pub answers: Mutex<HashMap<String, Scripted>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedStatus {
    pub fn new(chains: &[Chain]) -> Self {
        Self {
            chains: chains.to_vec(),
            answers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(&self, hash: &str, answer: Scripted) {
        self.answers.lock().unwrap().insert(hash.to_string(), answer);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ChainAdapter for ScriptedStatus {
    fn supports(&self, chain: Chain) -> bool {
        self.chains.contains(&chain)
    }
}

#[async_trait]
impl StatusChecker for ScriptedStatus {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        self.calls.lock().unwrap().push(request.hash.clone());
        // Decide under the lock, act after releasing it
        let outcome = {
            let answers = self.answers.lock().unwrap();
            match answers.get(&request.hash) {
                Some(Scripted::Answer(changes)) => Outcome::Ready(Ok(changes.clone())),
                Some(Scripted::Fail(message)) => {
                    Outcome::Ready(Err(EngineError::Network(message.clone())))
                }
                Some(Scripted::Hang) => Outcome::Hang,
                Some(Scripted::Panic) => Outcome::Panic,
                None => Outcome::Ready(Ok(TransactionChanges::pending())),
            }
        };
        match outcome {
            Outcome::Ready(result) => result,
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EngineError::Network("no answer".to_string()))
            }
            Outcome::Panic => panic!("status decoder blew up on {}", request.hash),
        }
    }
}
