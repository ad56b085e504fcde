use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{amount, AssetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeePriority {
    Slow,
    Normal,
    Fast,
}

impl FeePriority {
    pub const ALL: [FeePriority; 3] = [FeePriority::Slow, FeePriority::Normal, FeePriority::Fast];
}

impl fmt::Display for FeePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeePriority::Slow => f.write_str("slow"),
            FeePriority::Normal => f.write_str("normal"),
            FeePriority::Fast => f.write_str("fast"),
        }
    }
}

/// Per-unit price. For UTXO chains the unit is a virtual byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GasPrice {
    Regular {
        #[serde(with = "amount")]
        gas_price: u128,
    },
    Eip1559 {
        #[serde(with = "amount")]
        max_fee_per_gas: u128,
        #[serde(with = "amount")]
        priority_fee: u128,
    },
}

impl GasPrice {
    pub fn regular(gas_price: u128) -> Self {
        GasPrice::Regular { gas_price }
    }

    /// Upper bound paid per unit
    pub fn max_per_unit(&self) -> u128 {
        match self {
            GasPrice::Regular { gas_price } => *gas_price,
            GasPrice::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeOption {
    /// Rent for creating the recipient's associated token account (Solana)
    TokenAccountCreation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    pub priority: FeePriority,
    pub fee_asset_id: AssetId,
    #[serde(with = "amount")]
    pub amount: u128,
    pub gas_price: GasPrice,
    pub gas_limit: u64,
    #[serde(default)]
    pub options: BTreeMap<FeeOption, u64>,
}

impl Fee {
    /// Fee paying `gas_limit` units at the price's upper bound. The amount
    /// saturates at `u128::MAX`; adapters that take prices from a node check
    /// the product themselves before building the fee.
    pub fn new(
        priority: FeePriority,
        fee_asset_id: AssetId,
        gas_price: GasPrice,
        gas_limit: u64,
    ) -> Self {
        let amount = gas_price.max_per_unit().saturating_mul(u128::from(gas_limit));
        Self {
            priority,
            fee_asset_id,
            amount,
            gas_price,
            gas_limit,
            options: BTreeMap::new(),
        }
    }

    /// Flat fee with no meaningful per-unit price (Cosmos, XRP, Stellar)
    pub fn fixed(priority: FeePriority, fee_asset_id: AssetId, amount: u128) -> Self {
        Self {
            priority,
            fee_asset_id,
            amount,
            gas_price: GasPrice::regular(amount),
            gas_limit: 1,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, option: FeeOption, value: u64) -> Self {
        self.options.insert(option, value);
        self.amount = self.amount.saturating_add(u128::from(value));
        self
    }

    pub fn option(&self, option: FeeOption) -> Option<u64> {
        self.options.get(&option).copied()
    }
}
