//! XRP Ledger adapter over rippled JSON-RPC
//!
//! rippled reports failures inside `result` (`status: "error"`) rather than
//! as a JSON-RPC error object, so every call goes through [`XrpAdapter::call`].

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::capability::{
    Broadcaster, ChainAdapter, NodeHealth, Preloader, Signer, StatusChecker, StatusRequest,
};
use crate::error::EngineError;
use crate::model::{
    Account, Chain, ChainSignData, ChainType, ConfirmParams, Fee, FeePriority, NodeStatus,
    SignData, SignerParams, TransactionChanges, TransactionState, TransactionType, XrpSignData,
};
use crate::network::JsonRpcClient;
use crate::signing::{sign_with, NativeSigner, SigningInput, XrpSigningInput};

/// Ledgers a submitted transaction stays valid for
pub const LAST_LEDGER_OFFSET: u64 = 20;

const ACCEPTED_RESULTS: [&str; 2] = ["tesSUCCESS", "terQUEUED"];

pub struct XrpAdapter {
    rpc: JsonRpcClient,
    signer: Arc<dyn NativeSigner>,
}

fn drops_field(value: &Value, field: &str) -> Result<u64, EngineError> {
    value[field]
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value[field].as_u64())
        .ok_or_else(|| EngineError::Network(format!("Missing {} in rippled response", field)))
}

/// A numeric memo is a destination tag; anything else travels as a memo
fn split_memo(memo: Option<&str>) -> (Option<u32>, Option<String>) {
    match memo {
        Some(memo) => match memo.trim().parse::<u32>() {
            Ok(tag) => (Some(tag), None),
            Err(_) => (None, Some(memo.to_string())),
        },
        None => (None, None),
    }
}

impl XrpAdapter {
    pub fn new(rpc: JsonRpcClient, signer: Arc<dyn NativeSigner>) -> Self {
        Self { rpc, signer }
    }

    async fn call(&self, rpc: &JsonRpcClient, method: &str, params: Value) -> Result<Value, EngineError> {
        let result = rpc.call_value(method, json!([params])).await?;
        if result["status"].as_str() == Some("error") {
            let message = result["error_message"]
                .as_str()
                .or_else(|| result["error"].as_str())
                .unwrap_or("unknown rippled error");
            return Err(EngineError::Remote(message.to_string()));
        }
        Ok(result)
    }
}

impl ChainAdapter for XrpAdapter {
    fn supports(&self, chain: Chain) -> bool {
        chain == Chain::Xrp
    }
}

#[async_trait]
impl Preloader for XrpAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        match input {
            ConfirmParams::Transfer(data) if data.asset_id.is_native() => {}
            other => {
                return Err(EngineError::Validation(format!(
                    "{:?} is not supported on xrp",
                    other.transaction_type()
                )))
            }
        }

        let (account, ledger, fee) = tokio::try_join!(
            self.call(
                &self.rpc,
                "account_info",
                json!({ "account": input.from(), "ledger_index": "current" })
            ),
            self.call(&self.rpc, "ledger_current", json!({})),
            self.call(&self.rpc, "fee", json!({}))
        )?;

        let sequence = account["account_data"]["Sequence"]
            .as_u64()
            .ok_or_else(|| EngineError::Network("Missing account sequence".to_string()))?;
        let current_ledger = ledger["ledger_current_index"]
            .as_u64()
            .ok_or_else(|| EngineError::Network("Missing current ledger index".to_string()))?;

        let drops = &fee["drops"];
        let minimum = drops_field(drops, "minimum_fee")?;
        let open_ledger = drops_field(drops, "open_ledger_fee")?.max(minimum);
        let median = drops_field(drops, "median_fee")?.max(open_ledger);
        let fee_asset = input.asset_id().native_asset();
        let fees = FeePriority::ALL
            .iter()
            .zip([minimum, open_ledger, median])
            .map(|(priority, drops)| Fee::fixed(*priority, fee_asset.clone(), u128::from(drops)))
            .collect();

        Ok(SignerParams::new(
            input.clone(),
            ChainSignData::new(
                Chain::Xrp,
                SignData::Xrp(XrpSignData {
                    sequence,
                    last_ledger_sequence: current_ledger + LAST_LEDGER_OFFSET,
                }),
            ),
            fees,
        ))
    }
}

impl Signer for XrpAdapter {
    fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        params.ensure_chain_type(ChainType::Xrp)?;
        let data = match &params.chain_data.data {
            SignData::Xrp(data) => data,
            other => return Err(EngineError::chain_mismatch(ChainType::Xrp, other.chain_type())),
        };
        let fee = params.fee()?;
        let (destination_tag, memo) = split_memo(params.input.memo());

        let input = SigningInput::Xrp(XrpSigningInput {
            account: params.input.from().to_string(),
            destination: params.input.to().to_string(),
            amount_drops: u64::try_from(params.input.value())
                .map_err(|_| EngineError::Validation("Amount out of range".to_string()))?,
            fee_drops: u64::try_from(fee.amount)
                .map_err(|_| EngineError::Validation("Fee out of range".to_string()))?,
            sequence: data.sequence,
            last_ledger_sequence: data.last_ledger_sequence,
            destination_tag,
            memo,
        });
        Ok(vec![sign_with(self.signer.as_ref(), ChainType::Xrp, &input, private_key)?])
    }
}

#[async_trait]
impl Broadcaster for XrpAdapter {
    async fn broadcast(
        &self,
        _account: &Account,
        signed: &[u8],
        _transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        let result = self
            .call(
                &self.rpc,
                "submit",
                json!({ "tx_blob": hex::encode_upper(signed) }),
            )
            .await?;

        let engine_result = result["engine_result"].as_str().unwrap_or_default();
        if !ACCEPTED_RESULTS.contains(&engine_result) {
            let message = result["engine_result_message"]
                .as_str()
                .unwrap_or(engine_result);
            return Err(EngineError::Remote(message.to_string()));
        }
        result["tx_json"]["hash"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| EngineError::Network("submit response has no hash".to_string()))
    }
}

#[async_trait]
impl StatusChecker for XrpAdapter {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        let result = match self
            .call(&self.rpc, "tx", json!({ "transaction": request.hash }))
            .await
        {
            Ok(result) => result,
            Err(EngineError::Remote(message)) if message.contains("not found") => {
                return Ok(TransactionChanges::pending())
            }
            Err(e) => return Err(e),
        };

        if !result["validated"].as_bool().unwrap_or(false) {
            return Ok(TransactionChanges::pending());
        }
        let state = match result["meta"]["TransactionResult"].as_str() {
            Some("tesSUCCESS") => TransactionState::Confirmed,
            _ => TransactionState::Failed,
        };
        Ok(TransactionChanges::new(state))
    }
}

#[async_trait]
impl NodeHealth for XrpAdapter {
    async fn node_status(&self, _chain: Chain, url: &str) -> Result<NodeStatus, EngineError> {
        let rpc = self.rpc.with_url(url);
        let result = self.call(&rpc, "server_info", json!({})).await?;
        let info = &result["info"];
        Ok(NodeStatus {
            chain_id: info["network_id"].as_u64().unwrap_or(0).to_string(),
            latest_block_number: info["validated_ledger"]["seq"].as_u64().unwrap_or(0),
            latency_ms: 0,
        })
    }
}
