//! Bitcoin family adapter backed by an Esplora endpoint
//!
//! Native P2WPKH transfers only. Fee tiers map to Esplora confirmation
//! targets: Slow 6 blocks, Normal 3, Fast 1.

pub mod builder;
pub mod esplora;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use self::builder::{estimate_vsize, plan_outputs, select_utxos};
use self::esplora::EsploraClient;
use crate::capability::{
    Broadcaster, ChainAdapter, NodeHealth, Preloader, Signer, StatusChecker, StatusRequest,
};
use crate::error::EngineError;
use crate::model::{
    Account, BitcoinSignData, Chain, ChainSignData, ChainType, ConfirmParams, Fee, FeePriority,
    GasPrice, NodeStatus, SignData, SignerParams, TransactionChanges, TransactionState,
    TransactionType,
};
use crate::signing::{sign_with, BitcoinSigningInput, NativeSigner, SigningInput};

pub fn fee_target(priority: FeePriority) -> &'static str {
    match priority {
        FeePriority::Slow => "6",
        FeePriority::Normal => "3",
        FeePriority::Fast => "1",
    }
}

pub struct BitcoinAdapter {
    chain: Chain,
    network: bitcoin::Network,
    esplora: EsploraClient,
    signer: Arc<dyn NativeSigner>,
}

impl BitcoinAdapter {
    pub fn new(
        chain: Chain,
        network: bitcoin::Network,
        esplora: EsploraClient,
        signer: Arc<dyn NativeSigner>,
    ) -> Self {
        Self {
            chain,
            network,
            esplora,
            signer,
        }
    }

    fn fee_rates(&self, estimates: &HashMap<String, f64>) -> Result<Vec<(FeePriority, u64)>, EngineError> {
        FeePriority::ALL
            .iter()
            .map(|priority| {
                let target = fee_target(*priority);
                let rate = estimates.get(target).ok_or_else(|| {
                    EngineError::Network(format!("Missing fee estimate for target {}", target))
                })?;
                Ok((*priority, (rate.ceil() as u64).max(1)))
            })
            .collect()
    }
}

impl ChainAdapter for BitcoinAdapter {
    fn supports(&self, chain: Chain) -> bool {
        chain == self.chain
    }
}

#[async_trait]
impl Preloader for BitcoinAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        let transfer = match input {
            ConfirmParams::Transfer(data) if data.asset_id.is_native() => data,
            other => {
                return Err(EngineError::Validation(format!(
                    "{:?} is not supported on {}",
                    other.transaction_type(),
                    self.chain
                )))
            }
        };
        let amount = u64::try_from(transfer.value)
            .map_err(|_| EngineError::Validation(format!("Amount {} out of range", transfer.value)))?;

        let (utxos, estimates) = tokio::try_join!(
            self.esplora.address_utxos(&transfer.from),
            self.esplora.fee_estimates()
        )?;
        let rates = self.fee_rates(&estimates)?;
        let fastest = rates.iter().map(|(_, rate)| *rate).max().unwrap_or(1);

        // Select against the fastest tier so any tier can be signed with the same inputs
        let selected = select_utxos(&utxos, amount, fastest)?;
        let vsize = estimate_vsize(selected.len(), 2);
        log::debug!(
            "Selected {} of {} UTXOs for {} sats ({} vB)",
            selected.len(),
            utxos.len(),
            amount,
            vsize
        );

        let fees = rates
            .into_iter()
            .map(|(priority, rate)| {
                Fee::new(priority, transfer.asset_id.clone(), GasPrice::regular(rate as u128), vsize)
            })
            .collect();

        Ok(SignerParams::new(
            input.clone(),
            ChainSignData::new(self.chain, SignData::Bitcoin(BitcoinSignData { utxos: selected })),
            fees,
        ))
    }
}

impl Signer for BitcoinAdapter {
    fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        params.ensure_chain_type(ChainType::Bitcoin)?;
        if params.chain() != self.chain {
            return Err(EngineError::chain_mismatch(self.chain, params.chain()));
        }
        let utxos = match &params.chain_data.data {
            SignData::Bitcoin(data) => &data.utxos,
            other => return Err(EngineError::chain_mismatch(ChainType::Bitcoin, other.chain_type())),
        };
        let fee = params.fee()?;
        let fee_rate = u64::try_from(fee.gas_price.max_per_unit())
            .map_err(|_| EngineError::Validation("Fee rate out of range".to_string()))?;
        let amount = u64::try_from(params.input.value())
            .map_err(|_| EngineError::Validation("Amount out of range".to_string()))?;

        let (outputs, _fee) = plan_outputs(
            utxos,
            params.input.to(),
            amount,
            params.input.from(),
            fee_rate,
        )?;

        let input = SigningInput::Bitcoin(BitcoinSigningInput {
            network: self.network,
            utxos: utxos.clone(),
            outputs,
        });
        let signed = sign_with(self.signer.as_ref(), ChainType::Bitcoin, &input, private_key)?;
        Ok(vec![signed])
    }
}

#[async_trait]
impl Broadcaster for BitcoinAdapter {
    async fn broadcast(
        &self,
        _account: &Account,
        signed: &[u8],
        _transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        self.esplora.broadcast(hex::encode(signed)).await
    }
}

#[async_trait]
impl StatusChecker for BitcoinAdapter {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        let state = match self.esplora.tx_status(&request.hash).await? {
            Some(status) if status.confirmed => TransactionState::Confirmed,
            _ => TransactionState::Pending,
        };
        Ok(TransactionChanges::new(state))
    }
}

#[async_trait]
impl NodeHealth for BitcoinAdapter {
    async fn node_status(&self, _chain: Chain, url: &str) -> Result<NodeStatus, EngineError> {
        let height = self.esplora.with_base_url(url).tip_height().await?;
        Ok(NodeStatus {
            chain_id: self.network.to_string(),
            latest_block_number: height,
            latency_ms: 0,
        })
    }
}
