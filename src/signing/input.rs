use serde::{Deserialize, Serialize};

use crate::model::{amount, ChainType, Utxo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedOutput {
    pub address: String,
    pub amount_sats: u64,
}

/// Fully planned P2WPKH spend: selected inputs and final outputs, change included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinSigningInput {
    pub network: bitcoin::Network,
    pub utxos: Vec<Utxo>,
    pub outputs: Vec<PlannedOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumSigningInput {
    pub chain_id: u64,
    pub nonce: u64,
    #[serde(with = "amount")]
    pub max_fee_per_gas: u128,
    #[serde(with = "amount")]
    pub max_priority_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: String,
    #[serde(with = "amount")]
    pub value: u128,
    /// Raw calldata
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CosmosMessage {
    Send {
        from: String,
        to: String,
        #[serde(with = "amount")]
        amount: u128,
        denom: String,
    },
    Delegate {
        delegator: String,
        validator: String,
        #[serde(with = "amount")]
        amount: u128,
        denom: String,
    },
    Undelegate {
        delegator: String,
        validator: String,
        #[serde(with = "amount")]
        amount: u128,
        denom: String,
    },
    Redelegate {
        delegator: String,
        src_validator: String,
        dst_validator: String,
        #[serde(with = "amount")]
        amount: u128,
        denom: String,
    },
    WithdrawRewards { delegator: String, validator: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosSigningInput {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub messages: Vec<CosmosMessage>,
    #[serde(with = "amount")]
    pub fee_amount: u128,
    pub fee_denom: String,
    pub gas_limit: u64,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaTokenTransfer {
    pub mint: String,
    pub sender_token_address: String,
    pub recipient_token_address: Option<String>,
    pub token_program: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaSigningInput {
    pub recent_blockhash: String,
    pub from: String,
    pub to: String,
    pub value: u64,
    pub token: Option<SolanaTokenTransfer>,
    pub compute_unit_price: u64,
    pub compute_unit_limit: u64,
    pub memo: Option<String>,
    /// Pre-built base64 transaction (swap routes); only the signature is added
    pub encoded_transaction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrpSigningInput {
    pub account: String,
    pub destination: String,
    pub amount_drops: u64,
    pub fee_drops: u64,
    pub sequence: u64,
    pub last_ledger_sequence: u64,
    pub destination_tag: Option<u32>,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StellarSigningInput {
    pub source: String,
    pub destination: String,
    pub amount_stroops: u64,
    pub fee_stroops: u64,
    pub sequence: u64,
    pub create_account: bool,
    pub memo: Option<String>,
    pub network_passphrase: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearSigningInput {
    pub signer_id: String,
    pub receiver_id: String,
    pub public_key: String,
    pub nonce: u64,
    pub block_hash: String,
    #[serde(with = "amount")]
    pub deposit: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "chainType", content = "input", rename_all = "camelCase")]
pub enum SigningInput {
    Bitcoin(BitcoinSigningInput),
    Ethereum(EthereumSigningInput),
    Cosmos(CosmosSigningInput),
    Solana(SolanaSigningInput),
    Xrp(XrpSigningInput),
    Stellar(StellarSigningInput),
    Near(NearSigningInput),
}

impl SigningInput {
    pub fn chain_type(&self) -> ChainType {
        match self {
            SigningInput::Bitcoin(_) => ChainType::Bitcoin,
            SigningInput::Ethereum(_) => ChainType::Ethereum,
            SigningInput::Cosmos(_) => ChainType::Cosmos,
            SigningInput::Solana(_) => ChainType::Solana,
            SigningInput::Xrp(_) => ChainType::Xrp,
            SigningInput::Stellar(_) => ChainType::Stellar,
            SigningInput::Near(_) => ChainType::Near,
        }
    }
}
