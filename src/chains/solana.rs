//! Solana adapter over JSON-RPC
//!
//! Priority fees come from `getRecentPrioritizationFees`. SPL transfers to a
//! wallet without a token account carry the rent for creating one.

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
    Account, Chain, ChainSignData, ChainType, ConfirmParams, Fee, FeeOption, FeePriority,
    GasPrice, NodeStatus, SignData, SignerParams, SolanaSignData, TransactionChanges,
    TransactionState, TransactionType,
};
use crate::network::JsonRpcClient;
use crate::signing::{
    sign_with, NativeSigner, SigningInput, SolanaSigningInput, SolanaTokenTransfer,
};

/// Lamports per signature
pub const BASE_FEE_LAMPORTS: u64 = 5_000;
/// Rent-exempt minimum for a 165-byte token account
pub const TOKEN_ACCOUNT_RENT_LAMPORTS: u64 = 2_039_280;

const NATIVE_COMPUTE_UNITS: u64 = 1_000;
const TOKEN_COMPUTE_UNITS: u64 = 100_000;
const SWAP_COMPUTE_UNITS: u64 = 1_400_000;

#[derive(Debug, Deserialize)]
struct RpcContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrioritizationFee {
    prioritization_fee: u64,
}

#[derive(Debug, Deserialize)]
struct TokenAccount {
    pubkey: String,
    account: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
struct TokenAccountInfo {
    owner: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

/// Micro-lamport unit price per tier from recent fee samples (25th/50th/75th percentile)
fn priority_tiers(mut samples: Vec<u64>) -> [u64; 3] {
    if samples.is_empty() {
        return [0; 3];
    }
    samples.sort_unstable();
    let pick = |pct: usize| samples[(samples.len() - 1) * pct / 100];
    [pick(25), pick(50), pick(75)]
}

/// Base fee plus `unit_price` micro-lamports for each of `units` compute units
fn tier_fee_lamports(unit_price: u64, units: u64) -> u128 {
    u128::from(BASE_FEE_LAMPORTS) + u128::from(unit_price) * u128::from(units) / 1_000_000
}

fn compute_units(input: &ConfirmParams) -> u64 {
    match input {
        ConfirmParams::Swap(_) => SWAP_COMPUTE_UNITS,
        ConfirmParams::TokenTransfer(_) => TOKEN_COMPUTE_UNITS,
        ConfirmParams::Transfer(data) if !data.asset_id.is_native() => TOKEN_COMPUTE_UNITS,
        _ => NATIVE_COMPUTE_UNITS,
    }
}

pub struct SolanaAdapter {
    rpc: JsonRpcClient,
    signer: Arc<dyn NativeSigner>,
}

impl SolanaAdapter {
    pub fn new(rpc: JsonRpcClient, signer: Arc<dyn NativeSigner>) -> Self {
        Self { rpc, signer }
    }

    async fn latest_blockhash(&self) -> Result<String, EngineError> {
        let response: RpcContext<LatestBlockhash> = self
            .rpc
            .call("getLatestBlockhash", json!([{ "commitment": "finalized" }]))
            .await?;
        Ok(response.value.blockhash)
    }

    async fn prioritization_fees(&self, address: &str) -> Result<[u64; 3], EngineError> {
        let fees: Vec<PrioritizationFee> = self
            .rpc
            .call("getRecentPrioritizationFees", json!([[address]]))
            .await?;
        Ok(priority_tiers(
            fees.into_iter().map(|fee| fee.prioritization_fee).collect(),
        ))
    }

    async fn token_account(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Option<TokenAccount>, EngineError> {
        let response: RpcContext<Vec<TokenAccount>> = self
            .rpc
            .call(
                "getTokenAccountsByOwner",
                json!([owner, { "mint": mint }, { "encoding": "jsonParsed" }]),
            )
            .await?;
        Ok(response.value.into_iter().next())
    }

    async fn token_accounts(
        &self,
        input: &ConfirmParams,
    ) -> Result<(Option<String>, Option<String>, Option<String>), EngineError> {
        let transfer = match input {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => data,
            _ => return Ok((None, None, None)),
        };
        let mint = match &transfer.asset_id.token_id {
            Some(mint) => mint,
            None => return Ok((None, None, None)),
        };

        let (sender, recipient) = tokio::try_join!(
            self.token_account(&transfer.from, mint),
            self.token_account(&transfer.to, mint)
        )?;
        let sender = sender.ok_or_else(|| {
            EngineError::InsufficientFunds(format!("{} holds no {} token account", transfer.from, mint))
        })?;
        Ok((
            Some(sender.pubkey),
            recipient.map(|account| account.pubkey),
            Some(sender.account.owner),
        ))
    }

    async fn transaction_fee(&self, signature: &str) -> Result<Option<u64>, EngineError> {
        let tx: Option<Value> = self
            .rpc
            .call(
                "getTransaction",
                json!([signature, { "encoding": "json", "maxSupportedTransactionVersion": 0 }]),
            )
            .await?;
        Ok(tx.and_then(|tx| tx["meta"]["fee"].as_u64()))
    }
}

impl ChainAdapter for SolanaAdapter {
    fn supports(&self, chain: Chain) -> bool {
        chain == Chain::Solana
    }
}

#[async_trait]
impl Preloader for SolanaAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        if matches!(input, ConfirmParams::Stake(_) | ConfirmParams::ContractCall(_)) {
            return Err(EngineError::Validation(format!(
                "{:?} is not supported on solana",
                input.transaction_type()
            )));
        }

        let (recent_blockhash, tiers, (sender_token_address, recipient_token_address, token_program)) =
            tokio::try_join!(
                self.latest_blockhash(),
                self.prioritization_fees(input.from()),
                self.token_accounts(input)
            )?;

        let units = compute_units(input);
        let needs_account = sender_token_address.is_some() && recipient_token_address.is_none();
        let fee_asset = input.asset_id().native_asset();

        let fees = FeePriority::ALL
            .iter()
            .zip(tiers)
            .map(|(priority, unit_price)| {
                let mut fee = Fee::fixed(*priority, fee_asset.clone(), tier_fee_lamports(unit_price, units));
                fee.gas_price = GasPrice::regular(u128::from(unit_price));
                fee.gas_limit = units;
                if needs_account {
                    fee = fee.with_option(FeeOption::TokenAccountCreation, TOKEN_ACCOUNT_RENT_LAMPORTS);
                }
                fee
            })
            .collect();

        Ok(SignerParams::new(
            input.clone(),
            ChainSignData::new(
                Chain::Solana,
                SignData::Solana(SolanaSignData {
                    recent_blockhash,
                    sender_token_address,
                    recipient_token_address,
                    token_program,
                }),
            ),
            fees,
        ))
    }
}

impl Signer for SolanaAdapter {
    fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        params.ensure_chain_type(ChainType::Solana)?;
        let data = match &params.chain_data.data {
            SignData::Solana(data) => data,
            other => return Err(EngineError::chain_mismatch(ChainType::Solana, other.chain_type())),
        };
        let fee = params.fee()?;
        let value = u64::try_from(params.input.value())
            .map_err(|_| EngineError::Validation("Amount out of range".to_string()))?;

        let token = match (&params.input.asset_id().token_id, &data.sender_token_address) {
            (Some(mint), Some(sender)) if !matches!(params.input, ConfirmParams::Swap(_)) => {
                Some(SolanaTokenTransfer {
                    mint: mint.clone(),
                    sender_token_address: sender.clone(),
                    recipient_token_address: data.recipient_token_address.clone(),
                    token_program: data.token_program.clone().unwrap_or_default(),
                })
            }
            _ => None,
        };
        let encoded_transaction = match &params.input {
            ConfirmParams::Swap(swap) => Some(swap.data.data.clone()),
            _ => None,
        };

        let input = SigningInput::Solana(SolanaSigningInput {
            recent_blockhash: data.recent_blockhash.clone(),
            from: params.input.from().to_string(),
            to: params.input.to().to_string(),
            value,
            token,
            compute_unit_price: u64::try_from(fee.gas_price.max_per_unit()).unwrap_or(u64::MAX),
            compute_unit_limit: fee.gas_limit,
            memo: params.input.memo().map(str::to_string),
            encoded_transaction,
        });
        Ok(vec![sign_with(self.signer.as_ref(), ChainType::Solana, &input, private_key)?])
    }
}

#[async_trait]
impl Broadcaster for SolanaAdapter {
    async fn broadcast(
        &self,
        _account: &Account,
        signed: &[u8],
        _transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(signed);
        self.rpc
            .call(
                "sendTransaction",
                json!([encoded, { "encoding": "base64", "skipPreflight": false }]),
            )
            .await
    }
}

#[async_trait]
impl StatusChecker for SolanaAdapter {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        let response: RpcContext<Vec<Option<SignatureStatus>>> = self
            .rpc
            .call(
                "getSignatureStatuses",
                json!([[request.hash], { "searchTransactionHistory": true }]),
            )
            .await?;

        let state = match response.value.into_iter().next().flatten() {
            None => TransactionState::Pending,
            Some(status) if status.err.is_some() => TransactionState::Failed,
            Some(status) if status.confirmation_status.as_deref() == Some("finalized") => {
                TransactionState::Confirmed
            }
            Some(_) => TransactionState::Pending,
        };

        let mut changes = TransactionChanges::new(state);
        if state.is_terminal() {
            if let Some(fee) = self.transaction_fee(&request.hash).await? {
                changes = changes.with_fee(fee);
            }
        }
        Ok(changes)
    }
}

#[async_trait]
impl NodeHealth for SolanaAdapter {
    async fn node_status(&self, _chain: Chain, url: &str) -> Result<NodeStatus, EngineError> {
        let rpc = self.rpc.with_url(url);
        let (genesis, slot) = tokio::try_join!(
            rpc.call::<String>("getGenesisHash", json!([])),
            rpc.call::<u64>("getSlot", json!([{ "commitment": "finalized" }]))
        )?;
        Ok(NodeStatus {
            chain_id: genesis,
            latest_block_number: slot,
            latency_ms: 0,
        })
    }
}
