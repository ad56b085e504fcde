//! Cosmos SDK adapter over the LCD REST API
//!
//! Fees are flat per chain and message kind. Staking amounts are checked
//! against the chain's minimum before anything is signed.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::capability::{
    Broadcaster, ChainAdapter, NodeHealth, Preloader, Signer, StatusChecker, StatusRequest,
};
use crate::chain_config::ChainConfigProvider;
use crate::error::EngineError;
use crate::model::{
    Account, Chain, ChainSignData, ChainType, ConfirmParams, CosmosSignData, Fee, FeePriority,
    NodeStatus, SignData, SignerParams, StakeType, TransactionChanges, TransactionState,
    TransactionType,
};
use crate::network::RestClient;
use crate::signing::{sign_with, CosmosMessage, CosmosSigningInput, NativeSigner, SigningInput};

/// Gas price in thousandths of the fee denom
fn gas_price_milli(chain: Chain) -> u128 {
    match chain {
        Chain::Osmosis => 50,
        Chain::Celestia => 20,
        Chain::Injective => 500_000_000_000,
        _ => 25,
    }
}

/// Flat fee in the chain's fee denom, and gas limit, per message kind
fn fee_schedule(chain: Chain, input: &ConfirmParams) -> (u128, u64) {
    let gas_limit: u64 = match input {
        ConfirmParams::Stake(stake) => match stake.stake_type {
            StakeType::Delegate { .. } | StakeType::Undelegate { .. } => 250_000,
            StakeType::Redelegate { .. } => 350_000,
            StakeType::Withdraw { .. } => 150_000,
        },
        _ => 200_000,
    };
    (gas_price_milli(chain) * u128::from(gas_limit) / 1_000, gas_limit)
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: Value,
}

#[derive(Debug, Deserialize)]
struct TxResponseEnvelope {
    tx_response: TxResponse,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    height: String,
}

pub struct CosmosAdapter {
    chain: Chain,
    rest: RestClient,
    signer: Arc<dyn NativeSigner>,
    chain_config: Arc<dyn ChainConfigProvider>,
}

impl CosmosAdapter {
    pub fn new(
        chain: Chain,
        rest: RestClient,
        signer: Arc<dyn NativeSigner>,
        chain_config: Arc<dyn ChainConfigProvider>,
    ) -> Self {
        Self {
            chain,
            rest,
            signer,
            chain_config,
        }
    }

    fn network(&self) -> Result<(&'static str, &'static str), EngineError> {
        self.chain
            .cosmos_network()
            .ok_or_else(|| EngineError::family_mismatch(ChainType::Cosmos, self.chain))
    }

    async fn account(&self, address: &str) -> Result<(u64, u64), EngineError> {
        let response: AccountResponse = self
            .rest
            .get_json(&format!("/cosmos/auth/v1beta1/accounts/{}", address))
            .await?;
        // Injective and other eth-flavoured chains wrap the base account
        let account = response
            .account
            .get("base_account")
            .unwrap_or(&response.account);
        let number = parse_u64_field(account, "account_number")?;
        let sequence = parse_u64_field(account, "sequence")?;
        Ok((number, sequence))
    }

    fn validate_stake(&self, input: &ConfirmParams) -> Result<(), EngineError> {
        if let ConfirmParams::Stake(stake) = input {
            let needs_minimum = matches!(
                stake.stake_type,
                StakeType::Delegate { .. } | StakeType::Redelegate { .. }
            );
            let min = self.chain_config.chain_config(self.chain).min_stake_amount;
            if needs_minimum && stake.value < min {
                return Err(EngineError::Validation(format!(
                    "Minimum stake on {} is {}, got {}",
                    self.chain, min, stake.value
                )));
            }
        }
        Ok(())
    }

    fn messages(&self, input: &ConfirmParams, denom: &str) -> Result<Vec<CosmosMessage>, EngineError> {
        let message = match input {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => CosmosMessage::Send {
                from: data.from.clone(),
                to: data.to.clone(),
                amount: data.value,
                denom: data
                    .asset_id
                    .token_id
                    .clone()
                    .unwrap_or_else(|| denom.to_string()),
            },
            ConfirmParams::Stake(stake) => {
                let delegator = stake.from.clone();
                let denom = denom.to_string();
                match &stake.stake_type {
                    StakeType::Delegate { validator } => CosmosMessage::Delegate {
                        delegator,
                        validator: validator.clone(),
                        amount: stake.value,
                        denom,
                    },
                    StakeType::Undelegate { validator } => CosmosMessage::Undelegate {
                        delegator,
                        validator: validator.clone(),
                        amount: stake.value,
                        denom,
                    },
                    StakeType::Redelegate {
                        src_validator,
                        dst_validator,
                    } => CosmosMessage::Redelegate {
                        delegator,
                        src_validator: src_validator.clone(),
                        dst_validator: dst_validator.clone(),
                        amount: stake.value,
                        denom,
                    },
                    StakeType::Withdraw { validator } => CosmosMessage::WithdrawRewards {
                        delegator,
                        validator: validator.clone(),
                    },
                }
            }
            other => {
                return Err(EngineError::Validation(format!(
                    "{:?} is not supported on {}",
                    other.transaction_type(),
                    self.chain
                )))
            }
        };
        Ok(vec![message])
    }
}

fn parse_u64_field(value: &Value, field: &str) -> Result<u64, EngineError> {
    let raw = &value[field];
    raw.as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| raw.as_u64())
        .ok_or_else(|| EngineError::Network(format!("Account response missing {}", field)))
}

impl ChainAdapter for CosmosAdapter {
    fn supports(&self, chain: Chain) -> bool {
        chain == self.chain
    }
}

#[async_trait]
impl Preloader for CosmosAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        let (chain_id, denom) = self.network()?;
        self.validate_stake(input)?;
        // Fails early for intents this family cannot express
        self.messages(input, denom)?;

        let (account_number, sequence) = self.account(input.from()).await?;
        let (amount, gas_limit) = fee_schedule(self.chain, input);
        let fee_asset = input.asset_id().native_asset();

        let fees = FeePriority::ALL
            .iter()
            .map(|priority| {
                let mut fee = Fee::fixed(*priority, fee_asset.clone(), amount);
                fee.gas_limit = gas_limit;
                fee
            })
            .collect();

        Ok(SignerParams::new(
            input.clone(),
            ChainSignData::new(
                self.chain,
                SignData::Cosmos(CosmosSignData {
                    chain_id: chain_id.to_string(),
                    account_number,
                    sequence,
                }),
            ),
            fees,
        ))
    }
}

impl Signer for CosmosAdapter {
    fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        params.ensure_chain_type(ChainType::Cosmos)?;
        if params.chain() != self.chain {
            return Err(EngineError::chain_mismatch(self.chain, params.chain()));
        }
        let (chain_id, denom) = self.network()?;
        let data = match &params.chain_data.data {
            SignData::Cosmos(data) => data,
            other => return Err(EngineError::chain_mismatch(ChainType::Cosmos, other.chain_type())),
        };
        if data.chain_id != chain_id {
            return Err(EngineError::chain_mismatch(chain_id, &data.chain_id));
        }
        let fee = params.fee()?;

        let input = SigningInput::Cosmos(CosmosSigningInput {
            chain_id: data.chain_id.clone(),
            account_number: data.account_number,
            sequence: data.sequence,
            messages: self.messages(&params.input, denom)?,
            fee_amount: fee.amount,
            fee_denom: denom.to_string(),
            gas_limit: fee.gas_limit,
            memo: params.input.memo().map(str::to_string),
        });
        Ok(vec![sign_with(self.signer.as_ref(), ChainType::Cosmos, &input, private_key)?])
    }
}

#[async_trait]
impl Broadcaster for CosmosAdapter {
    async fn broadcast(
        &self,
        _account: &Account,
        signed: &[u8],
        _transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        let body = json!({
            "tx_bytes": base64::engine::general_purpose::STANDARD.encode(signed),
            "mode": "BROADCAST_MODE_SYNC",
        });
        let response: TxResponseEnvelope = self.rest.post_json("/cosmos/tx/v1beta1/txs", &body).await?;
        let tx = response.tx_response;
        if tx.code != 0 {
            return Err(EngineError::Remote(tx.raw_log));
        }
        Ok(tx.txhash)
    }
}

#[async_trait]
impl StatusChecker for CosmosAdapter {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        let response: Option<TxResponseEnvelope> = self
            .rest
            .get_json_opt(&format!("/cosmos/tx/v1beta1/txs/{}", request.hash))
            .await?;
        let state = match response {
            None => TransactionState::Pending,
            Some(envelope) if envelope.tx_response.height.is_empty() => TransactionState::Pending,
            Some(envelope) if envelope.tx_response.code == 0 => TransactionState::Confirmed,
            Some(_) => TransactionState::Failed,
        };
        Ok(TransactionChanges::new(state))
    }
}

#[async_trait]
impl NodeHealth for CosmosAdapter {
    async fn node_status(&self, _chain: Chain, url: &str) -> Result<NodeStatus, EngineError> {
        let block: Value = self
            .rest
            .with_base_url(url)
            .get_json("/cosmos/base/tendermint/v1beta1/blocks/latest")
            .await?;
        let header = &block["block"]["header"];
        let height = header["height"]
            .as_str()
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| EngineError::Network("Latest block has no height".to_string()))?;
        Ok(NodeStatus {
            chain_id: header["chain_id"].as_str().unwrap_or_default().to_string(),
            latest_block_number: height,
            latency_ms: 0,
        })
    }
}
