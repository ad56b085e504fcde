//! Esplora REST client
//!
//! Response shapes follow the Esplora API (blockstream.info, mempool.space).

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::model::Utxo;
use crate::network::RestClient;

#[derive(Debug, Clone, Deserialize)]
pub struct UtxoResponse {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: TxStatusResponse,
}

/// `/tx/{txid}/status`
#[derive(Debug, Clone, Deserialize)]
pub struct TxStatusResponse {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct EsploraClient {
    rest: RestClient,
}

impl EsploraClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self::new(self.rest.with_base_url(base_url))
    }

    pub async fn address_utxos(&self, address: &str) -> Result<Vec<Utxo>, EngineError> {
        let path = format!("/address/{}/utxo", address);
        let (utxo_list, tip_height) = tokio::try_join!(
            self.rest.get_json::<Vec<UtxoResponse>>(&path),
            self.tip_height()
        )?;

        let utxos = utxo_list
            .into_iter()
            .map(|utxo| {
                let confirmations = match (utxo.status.confirmed, utxo.status.block_height) {
                    (true, Some(height)) if height > 0 && tip_height >= height => {
                        (tip_height - height + 1) as u32
                    }
                    _ => 0,
                };
                Utxo {
                    txid: utxo.txid,
                    vout: utxo.vout,
                    amount_sats: utxo.value,
                    address: address.to_string(),
                    confirmations,
                }
            })
            .collect();

        Ok(utxos)
    }

    /// Fee rate in sat/vB keyed by confirmation target (in blocks)
    pub async fn fee_estimates(&self) -> Result<HashMap<String, f64>, EngineError> {
        self.rest.get_json("/fee-estimates").await
    }

    pub async fn tip_height(&self) -> Result<u64, EngineError> {
        let text = self.rest.get_text("/blocks/tip/height").await?;
        text.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| {
                EngineError::Network(format!("Invalid tip height '{}': {}", text.trim(), e))
            })
    }

    /// Submit a raw transaction hex and return the txid
    pub async fn broadcast(&self, tx_hex: String) -> Result<String, EngineError> {
        log::debug!("Broadcasting transaction to: {}/tx", self.rest.base_url());
        let txid = self.rest.post_text("/tx", tx_hex).await?;
        Ok(txid.trim().to_string())
    }

    /// `None` when the node does not know the transaction (dropped or not yet seen)
    pub async fn tx_status(&self, txid: &str) -> Result<Option<TxStatusResponse>, EngineError> {
        self.rest
            .get_json_opt(&format!("/tx/{}/status", txid))
            .await
    }
}
