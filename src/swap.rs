//! Swap quote contract
//!
//! Quote aggregation lives in the native core. The engine only consumes the
//! request/response shapes below and treats resolved quote data as an
//! ordinary contract call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{amount, AssetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapMode {
    ExactIn,
    ExactOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteOptions {
    /// Slippage tolerance in basis points
    pub slippage_bps: u32,
    pub preferred_providers: Vec<String>,
}

impl Default for QuoteOptions {
    fn default() -> Self {
        Self {
            slippage_bps: 100,
            preferred_providers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub from_asset: AssetId,
    pub to_asset: AssetId,
    pub wallet_address: String,
    pub destination_address: String,
    #[serde(with = "amount")]
    pub value: u128,
    pub mode: SwapMode,
    pub options: QuoteOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub request: QuoteRequest,
    #[serde(with = "amount")]
    pub from_value: u128,
    #[serde(with = "amount")]
    pub to_value: u128,
    pub provider: String,
    /// Opaque provider payload passed back to `fetch_quote_data`
    pub route_data: serde_json::Value,
    pub eta_seconds: Option<u32>,
}

/// Allowance the swap router needs before it can pull the sold token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalData {
    pub token: String,
    pub spender: String,
    #[serde(with = "amount")]
    pub value: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteData {
    pub to: String,
    /// `0x`-prefixed hex calldata, or the chain's own encoding for non-EVM routes
    pub data: String,
    #[serde(with = "amount")]
    pub value: u128,
    pub approval: Option<ApprovalData>,
    pub gas_limit: Option<u64>,
}

#[async_trait]
pub trait SwapQuoteProvider: Send + Sync {
    async fn get_quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>, EngineError>;

    async fn fetch_quote_data(&self, quote: &Quote) -> Result<QuoteData, EngineError>;
}
