//! Intended operations handed to preload
//!
//! Each variant carries what is needed to preload it and to re-derive the
//! same transaction later from the stored record.

use serde::{Deserialize, Serialize};

use super::{amount, AssetId, Chain, TransactionType};
use crate::swap::QuoteData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferData {
    pub asset_id: AssetId,
    pub from: String,
    pub to: String,
    #[serde(with = "amount")]
    pub value: u128,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StakeType {
    Delegate { validator: String },
    Undelegate { validator: String },
    Redelegate {
        src_validator: String,
        dst_validator: String,
    },
    Withdraw { validator: String },
}

impl StakeType {
    /// Validator the operation is addressed to
    pub fn validator(&self) -> &str {
        match self {
            StakeType::Delegate { validator }
            | StakeType::Undelegate { validator }
            | StakeType::Withdraw { validator } => validator,
            StakeType::Redelegate { dst_validator, .. } => dst_validator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeData {
    pub asset_id: AssetId,
    pub from: String,
    pub stake_type: StakeType,
    #[serde(with = "amount")]
    pub value: u128,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapData {
    pub from_asset: AssetId,
    pub to_asset: AssetId,
    pub from: String,
    pub destination: String,
    #[serde(with = "amount")]
    pub from_value: u128,
    #[serde(with = "amount")]
    pub to_value: u128,
    pub provider: String,
    pub data: QuoteData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallData {
    pub chain: Chain,
    pub from: String,
    pub to: String,
    #[serde(with = "amount")]
    pub value: u128,
    /// `0x`-prefixed hex calldata
    pub data: String,
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ConfirmParams {
    Transfer(TransferData),
    TokenTransfer(TransferData),
    Stake(StakeData),
    Swap(SwapData),
    ContractCall(ContractCallData),
}

impl ConfirmParams {
    pub fn chain(&self) -> Chain {
        match self {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => {
                data.asset_id.chain
            }
            ConfirmParams::Stake(data) => data.asset_id.chain,
            ConfirmParams::Swap(data) => data.from_asset.chain,
            ConfirmParams::ContractCall(data) => data.chain,
        }
    }

    pub fn from(&self) -> &str {
        match self {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => &data.from,
            ConfirmParams::Stake(data) => &data.from,
            ConfirmParams::Swap(data) => &data.from,
            ConfirmParams::ContractCall(data) => &data.from,
        }
    }

    /// Counterparty recorded on the transaction
    pub fn to(&self) -> &str {
        match self {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => &data.to,
            ConfirmParams::Stake(data) => data.stake_type.validator(),
            ConfirmParams::Swap(data) => &data.data.to,
            ConfirmParams::ContractCall(data) => &data.to,
        }
    }

    pub fn asset_id(&self) -> AssetId {
        match self {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => {
                data.asset_id.clone()
            }
            ConfirmParams::Stake(data) => data.asset_id.clone(),
            ConfirmParams::Swap(data) => data.from_asset.clone(),
            ConfirmParams::ContractCall(data) => AssetId::native(data.chain),
        }
    }

    pub fn value(&self) -> u128 {
        match self {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => data.value,
            ConfirmParams::Stake(data) => data.value,
            ConfirmParams::Swap(data) => data.from_value,
            ConfirmParams::ContractCall(data) => data.value,
        }
    }

    pub fn memo(&self) -> Option<&str> {
        match self {
            ConfirmParams::Transfer(data) | ConfirmParams::TokenTransfer(data) => {
                data.memo.as_deref()
            }
            ConfirmParams::Stake(data) => data.memo.as_deref(),
            ConfirmParams::Swap(_) | ConfirmParams::ContractCall(_) => None,
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        match self {
            ConfirmParams::Transfer(_) | ConfirmParams::TokenTransfer(_) => {
                TransactionType::Transfer
            }
            ConfirmParams::Stake(data) => match data.stake_type {
                StakeType::Delegate { .. } => TransactionType::StakeDelegate,
                StakeType::Undelegate { .. } => TransactionType::StakeUndelegate,
                StakeType::Redelegate { .. } => TransactionType::StakeRedelegate,
                StakeType::Withdraw { .. } => TransactionType::StakeWithdraw,
            },
            ConfirmParams::Swap(_) => TransactionType::Swap,
            ConfirmParams::ContractCall(_) => TransactionType::SmartContractCall,
        }
    }
}
