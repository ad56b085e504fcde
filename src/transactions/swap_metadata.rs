use serde::{Deserialize, Serialize};

use crate::model::{AssetId, Transaction, TransactionType};

/// Both legs of a swap, decoded from a swap transaction's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapMetadata {
    pub from_asset: AssetId,
    pub from_value: String,
    pub to_asset: AssetId,
    pub to_value: String,
    #[serde(default)]
    pub provider: Option<String>,
}

impl SwapMetadata {
    /// `None` for non-swap transactions and for metadata that does not
    /// decode.
    pub fn from_transaction(transaction: &Transaction) -> Option<Self> {
        if transaction.transaction_type != TransactionType::Swap {
            return None;
        }
        let metadata = transaction.metadata.as_ref()?;
        match serde_json::from_value(metadata.clone()) {
            Ok(swap) => Some(swap),
            Err(e) => {
                log::debug!("Swap {} has unreadable metadata: {}", transaction.id, e);
                None
            }
        }
    }

    pub fn touches(&self, asset: &AssetId) -> bool {
        self.from_asset == *asset || self.to_asset == *asset
    }
}
