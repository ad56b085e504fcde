//! End-to-end transaction flow
//!
//! Preload → fee selection → sign → broadcast → record. Every step goes
//! through the capability registries; every successful broadcast is stored
//! as a Pending transaction before the next payload is sent.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::capability::Registries;
use crate::error::EngineError;
use crate::model::{
    Account, AssetId, Chain, ConfirmParams, FeePriority, NodeStatus, SignData, SignerParams,
    SwapData, Transaction, TransactionDirection, TransactionType,
};
use crate::swap::{Quote, SwapQuoteProvider};
use crate::transactions::TransactionRepository;

pub struct TransactionEngine {
    registries: Arc<Registries>,
    repository: Arc<TransactionRepository>,
}

impl TransactionEngine {
    pub fn new(registries: Arc<Registries>, repository: Arc<TransactionRepository>) -> Self {
        Self {
            registries,
            repository,
        }
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn repository(&self) -> &Arc<TransactionRepository> {
        &self.repository
    }

    pub async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        self.registries.preload.preload(input).await
    }

    /// `params` must already hold a single selected fee.
    pub fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        self.registries.signer.sign(params, private_key)
    }

    /// Broadcast payloads in order and record each one as Pending.
    ///
    /// Every payload before the last is a token approval. If a later payload
    /// is rejected, the earlier ones stay recorded and the rejection is
    /// returned.
    pub async fn broadcast(
        &self,
        account: &Account,
        params: &SignerParams,
        payloads: &[Vec<u8>],
    ) -> Result<Vec<Transaction>, EngineError> {
        if account.chain != params.chain() {
            return Err(EngineError::chain_mismatch(params.chain(), account.chain));
        }
        if payloads.is_empty() {
            return Err(EngineError::Validation("Nothing to broadcast".to_string()));
        }

        let main_index = payloads.len() - 1;
        let mut recorded = Vec::with_capacity(payloads.len());
        for (index, payload) in payloads.iter().enumerate() {
            let transaction_type = if index < main_index {
                TransactionType::TokenApproval
            } else {
                params.input.transaction_type()
            };
            let hash = self
                .registries
                .broadcast
                .broadcast(account, payload, transaction_type)
                .await?;
            log::info!("📡 Broadcast {:?} on {}: {}", transaction_type, account.chain, hash);

            let transaction = if index < main_index {
                approval_record(account, params, &hash)
            } else {
                main_record(account, params, &hash)?
            };
            self.repository.add_transaction(transaction.clone()).await?;
            recorded.push(transaction);
        }
        Ok(recorded)
    }

    /// Full flow for one intent at the given fee priority.
    pub async fn send(
        &self,
        account: &Account,
        input: &ConfirmParams,
        priority: FeePriority,
        private_key: &[u8],
    ) -> Result<Vec<Transaction>, EngineError> {
        let params = self.preload(input).await?.select_fee(priority)?;
        let payloads = self.sign(&params, private_key)?;
        self.broadcast(account, &params, &payloads).await
    }

    /// Resolve a quote into a swap intent ready for preload.
    pub async fn swap_params(
        &self,
        provider: &dyn SwapQuoteProvider,
        quote: &Quote,
    ) -> Result<ConfirmParams, EngineError> {
        let data = provider.fetch_quote_data(quote).await?;
        let request = &quote.request;
        Ok(ConfirmParams::Swap(SwapData {
            from_asset: request.from_asset.clone(),
            to_asset: request.to_asset.clone(),
            from: request.wallet_address.clone(),
            destination: request.destination_address.clone(),
            from_value: quote.from_value,
            to_value: quote.to_value,
            provider: quote.provider.clone(),
            data,
        }))
    }

    /// Node status for endpoint selection. A chain without a node adapter is
    /// an error; an unreachable node is `None`.
    pub async fn node_status(&self, chain: Chain, url: &str) -> Result<Option<NodeStatus>, EngineError> {
        match self.registries.node.node_status(chain, url).await {
            Ok(status) => Ok(Some(status)),
            Err(e @ EngineError::AdapterNotFound { .. }) => Err(e),
            Err(e) => {
                log::warn!("⚠️  Node {} for {} unavailable: {}", url, chain, e);
                Ok(None)
            }
        }
    }
}

fn main_record(
    account: &Account,
    params: &SignerParams,
    hash: &str,
) -> Result<Transaction, EngineError> {
    let input = &params.input;
    let fee = params.fee()?;
    let asset_id = input.asset_id();

    let mut transaction = Transaction::new(
        hash,
        asset_id.clone(),
        input.from(),
        input.to(),
        input.transaction_type(),
        input.value().to_string(),
        Utc::now(),
    )
    .with_fee(fee.fee_asset_id.clone(), fee.amount.to_string())
    .with_memo(input.memo().map(str::to_string))
    .with_contract(asset_id.token_id.clone())
    .with_direction(TransactionDirection::from_addresses(
        input.from(),
        input.to(),
        &account.address,
    ));

    if let ConfirmParams::Swap(swap) = input {
        transaction = transaction.with_metadata(Some(json!({
            "fromAsset": swap.from_asset,
            "fromValue": swap.from_value.to_string(),
            "toAsset": swap.to_asset,
            "toValue": swap.to_value.to_string(),
            "provider": swap.provider,
        })));
    }
    Ok(transaction)
}

fn approval_record(account: &Account, params: &SignerParams, hash: &str) -> Transaction {
    let chain = params.chain();
    let approval = match &params.chain_data.data {
        SignData::Ethereum(data) => data.approval.as_ref(),
        _ => None,
    };
    let (token, spender, value) = match approval {
        Some(approval) => (
            approval.token.clone(),
            approval.spender.clone(),
            approval.value.to_string(),
        ),
        None => (String::new(), params.input.to().to_string(), "0".to_string()),
    };

    Transaction::new(
        hash,
        AssetId::token(chain, token.clone()),
        account.address.clone(),
        spender,
        TransactionType::TokenApproval,
        value,
        Utc::now(),
    )
    .with_contract(Some(token).filter(|token| !token.is_empty()))
}
