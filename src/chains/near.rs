//! Near adapter over JSON-RPC
//!
//! Only native transfers. The signing nonce comes from the sender's first
//! full-access key; the block hash comes from the same query.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::capability::{
    Broadcaster, ChainAdapter, NodeHealth, Preloader, Signer, StatusChecker, StatusRequest,
};
use crate::error::EngineError;
use crate::model::{
    Account, Chain, ChainSignData, ChainType, ConfirmParams, Fee, FeePriority, GasPrice,
    NearSignData, NodeStatus, SignData, SignerParams, TransactionChanges, TransactionState,
    TransactionType,
};
use crate::network::JsonRpcClient;
use crate::signing::{sign_with, NativeSigner, NearSigningInput, SigningInput};

/// Gas burnt by a single transfer action, rounded up
pub const TRANSFER_GAS: u64 = 450_000_000_000;

#[derive(Debug, Deserialize)]
struct AccessKeyList {
    block_hash: String,
    keys: Vec<AccessKeyEntry>,
}

#[derive(Debug, Deserialize)]
struct AccessKeyEntry {
    public_key: String,
    access_key: AccessKey,
}

#[derive(Debug, Deserialize)]
struct AccessKey {
    nonce: u64,
    permission: Value,
}

#[derive(Debug, Deserialize)]
struct GasPriceResponse {
    gas_price: String,
}

fn full_access_key(list: &AccessKeyList) -> Option<&AccessKeyEntry> {
    list.keys
        .iter()
        .find(|entry| entry.access_key.permission.as_str() == Some("FullAccess"))
}

/// Sum of `tokens_burnt` across the transaction and all its receipts
fn tokens_burnt(result: &Value) -> u128 {
    let outcome = std::iter::once(&result["transaction_outcome"])
        .chain(result["receipts_outcome"].as_array().into_iter().flatten());
    outcome
        .filter_map(|o| o["outcome"]["tokens_burnt"].as_str())
        .filter_map(|burnt| burnt.parse::<u128>().ok())
        .sum()
}

fn final_state(status: &Value) -> TransactionState {
    if status.get("SuccessValue").is_some() {
        TransactionState::Confirmed
    } else if status.get("Failure").is_some() {
        TransactionState::Failed
    } else {
        TransactionState::Pending
    }
}

pub struct NearAdapter {
    rpc: JsonRpcClient,
    signer: Arc<dyn NativeSigner>,
}

impl NearAdapter {
    pub fn new(rpc: JsonRpcClient, signer: Arc<dyn NativeSigner>) -> Self {
        Self { rpc, signer }
    }

    async fn access_keys(&self, account_id: &str) -> Result<AccessKeyList, EngineError> {
        self.rpc
            .call(
                "query",
                json!({
                    "request_type": "view_access_key_list",
                    "finality": "final",
                    "account_id": account_id,
                }),
            )
            .await
    }

    async fn gas_price(&self) -> Result<u128, EngineError> {
        let response: GasPriceResponse = self.rpc.call("gas_price", json!([null])).await?;
        response
            .gas_price
            .parse()
            .map_err(|_| EngineError::Network(format!("Invalid gas price {}", response.gas_price)))
    }
}

impl ChainAdapter for NearAdapter {
    fn supports(&self, chain: Chain) -> bool {
        chain == Chain::Near
    }
}

#[async_trait]
impl Preloader for NearAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        match input {
            ConfirmParams::Transfer(data) if data.asset_id.is_native() => {}
            other => {
                return Err(EngineError::Validation(format!(
                    "{:?} is not supported on near",
                    other.transaction_type()
                )))
            }
        }

        let (keys, gas_price) =
            tokio::try_join!(self.access_keys(input.from()), self.gas_price())?;
        let key = full_access_key(&keys).ok_or_else(|| {
            EngineError::Validation(format!("{} has no full access key", input.from()))
        })?;

        let fee_asset = input.asset_id().native_asset();
        let fees = FeePriority::ALL
            .iter()
            .map(|priority| {
                Fee::new(
                    *priority,
                    fee_asset.clone(),
                    GasPrice::regular(gas_price),
                    TRANSFER_GAS,
                )
            })
            .collect();

        Ok(SignerParams::new(
            input.clone(),
            ChainSignData::new(
                Chain::Near,
                SignData::Near(NearSignData {
                    nonce: key.access_key.nonce + 1,
                    block_hash: keys.block_hash.clone(),
                    public_key: key.public_key.clone(),
                }),
            ),
            fees,
        ))
    }
}

impl Signer for NearAdapter {
    fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        params.ensure_chain_type(ChainType::Near)?;
        let data = match &params.chain_data.data {
            SignData::Near(data) => data,
            other => return Err(EngineError::chain_mismatch(ChainType::Near, other.chain_type())),
        };
        // Near charges from the attached gas at execution; no fee field to sign
        params.fee()?;

        let input = SigningInput::Near(NearSigningInput {
            signer_id: params.input.from().to_string(),
            receiver_id: params.input.to().to_string(),
            public_key: data.public_key.clone(),
            nonce: data.nonce,
            block_hash: data.block_hash.clone(),
            deposit: params.input.value(),
        });
        Ok(vec![sign_with(self.signer.as_ref(), ChainType::Near, &input, private_key)?])
    }
}

#[async_trait]
impl Broadcaster for NearAdapter {
    async fn broadcast(
        &self,
        _account: &Account,
        signed: &[u8],
        _transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(signed);
        self.rpc.call("broadcast_tx_async", json!([encoded])).await
    }
}

#[async_trait]
impl StatusChecker for NearAdapter {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        let result = match self
            .rpc
            .call_value("tx", json!([request.hash, request.sender]))
            .await
        {
            Ok(result) => result,
            Err(EngineError::Remote(message)) if message.contains("UNKNOWN_TRANSACTION") => {
                return Ok(TransactionChanges::pending())
            }
            Err(e) => return Err(e),
        };

        let state = final_state(&result["status"]);
        let mut changes = TransactionChanges::new(state);
        if state.is_terminal() {
            changes = changes.with_fee(tokens_burnt(&result));
        }
        Ok(changes)
    }
}

#[async_trait]
impl NodeHealth for NearAdapter {
    async fn node_status(&self, _chain: Chain, url: &str) -> Result<NodeStatus, EngineError> {
        let status = self.rpc.with_url(url).call_value("status", json!([])).await?;
        let height = status["sync_info"]["latest_block_height"]
            .as_u64()
            .ok_or_else(|| EngineError::Network("status has no latest block height".to_string()))?;
        Ok(NodeStatus {
            chain_id: status["chain_id"].as_str().unwrap_or_default().to_string(),
            latest_block_number: height,
            latency_ms: 0,
        })
    }
}
