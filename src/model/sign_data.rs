//! Chain-resolved payloads produced by preload and consumed by sign

use serde::{Deserialize, Serialize};

use super::{Chain, ChainType, ConfirmParams, Fee, FeePriority};
use crate::error::EngineError;
use crate::swap::ApprovalData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub amount_sats: u64,
    pub address: String,
    pub confirmations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinSignData {
    pub utxos: Vec<Utxo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumSignData {
    pub chain_id: u64,
    pub nonce: u64,
    /// Set when a token allowance must be granted before the main call.
    /// The approval consumes `nonce`, the main call `nonce + 1`.
    pub approval: Option<ApprovalData>,
    pub approval_gas_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosSignData {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaSignData {
    pub recent_blockhash: String,
    pub sender_token_address: Option<String>,
    pub recipient_token_address: Option<String>,
    pub token_program: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrpSignData {
    pub sequence: u64,
    pub last_ledger_sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StellarSignData {
    pub sequence: u64,
    /// `false` means the payment has to be sent as a create-account operation
    pub recipient_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearSignData {
    pub nonce: u64,
    pub block_hash: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SignData {
    Bitcoin(BitcoinSignData),
    Ethereum(EthereumSignData),
    Cosmos(CosmosSignData),
    Solana(SolanaSignData),
    Xrp(XrpSignData),
    Stellar(StellarSignData),
    Near(NearSignData),
}

impl SignData {
    pub fn chain_type(&self) -> ChainType {
        match self {
            SignData::Bitcoin(_) => ChainType::Bitcoin,
            SignData::Ethereum(_) => ChainType::Ethereum,
            SignData::Cosmos(_) => ChainType::Cosmos,
            SignData::Solana(_) => ChainType::Solana,
            SignData::Xrp(_) => ChainType::Xrp,
            SignData::Stellar(_) => ChainType::Stellar,
            SignData::Near(_) => ChainType::Near,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSignData {
    pub chain: Chain,
    pub data: SignData,
}

impl ChainSignData {
    pub fn new(chain: Chain, data: SignData) -> Self {
        Self { chain, data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerParams {
    pub input: ConfirmParams,
    pub chain_data: ChainSignData,
    pub fees: Vec<Fee>,
}

impl SignerParams {
    pub fn new(input: ConfirmParams, chain_data: ChainSignData, fees: Vec<Fee>) -> Self {
        Self {
            input,
            chain_data,
            fees,
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain_data.chain
    }

    /// Keep only the fee candidate for `priority`.
    pub fn select_fee(mut self, priority: FeePriority) -> Result<Self, EngineError> {
        let fee = self
            .fees
            .iter()
            .find(|fee| fee.priority == priority)
            .cloned()
            .ok_or_else(|| {
                EngineError::Validation(format!("No {} fee offered for {}", priority, self.chain()))
            })?;
        self.fees = vec![fee];
        Ok(self)
    }

    /// The fee to sign with. Fails while more than one candidate remains.
    pub fn fee(&self) -> Result<&Fee, EngineError> {
        match self.fees.as_slice() {
            [fee] => Ok(fee),
            [] => Err(EngineError::Validation("No fee provided".to_string())),
            _ => Err(EngineError::Validation(
                "Select a fee priority before signing".to_string(),
            )),
        }
    }

    /// Check that the intent, the sign data and the adapter family agree.
    pub fn ensure_chain_type(&self, expected: ChainType) -> Result<(), EngineError> {
        let chain = self.chain_data.chain;
        if self.input.chain() != chain {
            return Err(EngineError::chain_mismatch(chain, self.input.chain()));
        }
        if chain.chain_type() != expected {
            return Err(EngineError::family_mismatch(expected, chain));
        }
        if self.chain_data.data.chain_type() != expected {
            return Err(EngineError::chain_mismatch(
                expected,
                self.chain_data.data.chain_type(),
            ));
        }
        Ok(())
    }
}
