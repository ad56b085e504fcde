//! Stellar adapter over Horizon
//!
//! Payments to an account that does not exist yet are sent as a
//! create-account operation, which requires the base reserve.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use std::sync::Arc;

use crate::capability::{
    Broadcaster, ChainAdapter, NodeHealth, Preloader, Signer, StatusChecker, StatusRequest,
};
use crate::error::EngineError;
use crate::model::{
    Account, Chain, ChainSignData, ChainType, ConfirmParams, Fee, FeePriority,
    NodeStatus, SignData, SignerParams, StellarSignData, TransactionChanges, TransactionState,
    TransactionType,
};
use crate::network::RestClient;
use crate::signing::{sign_with, NativeSigner, SigningInput, StellarSigningInput};

pub const NETWORK_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
/// One XLM, the minimum starting balance of a new account
pub const ACCOUNT_CREATION_MINIMUM: u64 = 10_000_000;

#[derive(Debug, Deserialize)]
struct HorizonAccount {
    sequence: String,
}

#[derive(Debug, Deserialize)]
struct FeeStats {
    fee_charged: FeeCharged,
}

#[derive(Debug, Deserialize)]
struct FeeCharged {
    p10: String,
    p50: String,
    p90: String,
}

#[derive(Debug, Deserialize)]
struct HorizonTransaction {
    successful: bool,
    #[serde(default)]
    fee_charged: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct HorizonRoot {
    history_latest_ledger: u64,
    network_passphrase: String,
}

fn stroops(value: &str) -> Result<u64, EngineError> {
    value
        .parse()
        .map_err(|_| EngineError::Network(format!("Invalid fee value {}", value)))
}

pub struct StellarAdapter {
    rest: RestClient,
    signer: Arc<dyn NativeSigner>,
}

impl StellarAdapter {
    pub fn new(rest: RestClient, signer: Arc<dyn NativeSigner>) -> Self {
        Self { rest, signer }
    }
}

impl ChainAdapter for StellarAdapter {
    fn supports(&self, chain: Chain) -> bool {
        chain == Chain::Stellar
    }
}

#[async_trait]
impl Preloader for StellarAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        let transfer = match input {
            ConfirmParams::Transfer(data) if data.asset_id.is_native() => data,
            other => {
                return Err(EngineError::Validation(format!(
                    "{:?} is not supported on stellar",
                    other.transaction_type()
                )))
            }
        };

        let source_path = format!("/accounts/{}", transfer.from);
        let recipient_path = format!("/accounts/{}", transfer.to);
        let (source, recipient, stats) = tokio::try_join!(
            self.rest.get_json::<HorizonAccount>(&source_path),
            self.rest.get_json_opt::<HorizonAccount>(&recipient_path),
            self.rest.get_json::<FeeStats>("/fee_stats")
        )?;

        let sequence = source
            .sequence
            .parse::<u64>()
            .map_err(|_| EngineError::Network(format!("Invalid sequence {}", source.sequence)))?;
        let recipient_exists = recipient.is_some();
        if !recipient_exists && transfer.value < u128::from(ACCOUNT_CREATION_MINIMUM) {
            return Err(EngineError::Validation(format!(
                "{} does not exist; at least {} stroops are needed to create it",
                transfer.to, ACCOUNT_CREATION_MINIMUM
            )));
        }

        let tiers = [
            stroops(&stats.fee_charged.p10)?,
            stroops(&stats.fee_charged.p50)?,
            stroops(&stats.fee_charged.p90)?,
        ];
        let fee_asset = transfer.asset_id.native_asset();
        let fees = FeePriority::ALL
            .iter()
            .zip(tiers)
            .map(|(priority, amount)| Fee::fixed(*priority, fee_asset.clone(), u128::from(amount)))
            .collect();

        Ok(SignerParams::new(
            input.clone(),
            ChainSignData::new(
                Chain::Stellar,
                SignData::Stellar(StellarSignData {
                    sequence: sequence + 1,
                    recipient_exists,
                }),
            ),
            fees,
        ))
    }
}

impl Signer for StellarAdapter {
    fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        params.ensure_chain_type(ChainType::Stellar)?;
        let data = match &params.chain_data.data {
            SignData::Stellar(data) => data,
            other => return Err(EngineError::chain_mismatch(ChainType::Stellar, other.chain_type())),
        };
        let fee = params.fee()?;

        let input = SigningInput::Stellar(StellarSigningInput {
            source: params.input.from().to_string(),
            destination: params.input.to().to_string(),
            amount_stroops: u64::try_from(params.input.value())
                .map_err(|_| EngineError::Validation("Amount out of range".to_string()))?,
            fee_stroops: u64::try_from(fee.amount)
                .map_err(|_| EngineError::Validation("Fee out of range".to_string()))?,
            sequence: data.sequence,
            create_account: !data.recipient_exists,
            memo: params.input.memo().map(str::to_string),
            network_passphrase: NETWORK_PASSPHRASE.to_string(),
        });
        Ok(vec![sign_with(self.signer.as_ref(), ChainType::Stellar, &input, private_key)?])
    }
}

#[async_trait]
impl Broadcaster for StellarAdapter {
    async fn broadcast(
        &self,
        _account: &Account,
        signed: &[u8],
        _transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        let envelope = base64::engine::general_purpose::STANDARD.encode(signed);
        let response: SubmitResponse = self
            .rest
            .post_form("/transactions", &[("tx", envelope.as_str())])
            .await?;
        Ok(response.hash)
    }
}

#[async_trait]
impl StatusChecker for StellarAdapter {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        let tx: Option<HorizonTransaction> = self
            .rest
            .get_json_opt(&format!("/transactions/{}", request.hash))
            .await?;
        Ok(match tx {
            None => TransactionChanges::pending(),
            Some(tx) => {
                let state = if tx.successful {
                    TransactionState::Confirmed
                } else {
                    TransactionState::Failed
                };
                match tx.fee_charged {
                    Some(fee) => TransactionChanges::new(state).with_fee(fee),
                    None => TransactionChanges::new(state),
                }
            }
        })
    }
}

#[async_trait]
impl NodeHealth for StellarAdapter {
    async fn node_status(&self, _chain: Chain, url: &str) -> Result<NodeStatus, EngineError> {
        let root: HorizonRoot = self.rest.with_base_url(url).get_json("/").await?;
        Ok(NodeStatus {
            chain_id: root.network_passphrase,
            latest_block_number: root.history_latest_ledger,
            latency_ms: 0,
        })
    }
}
