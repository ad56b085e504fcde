use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::swap_metadata::SwapMetadata;
use crate::error::StorageError;
use crate::model::Transaction;

/// A transaction row together with the swap metadata derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTransaction {
    pub transaction: Transaction,
    #[serde(default)]
    pub swap: Option<SwapMetadata>,
}

impl StoredTransaction {
    /// Wrap a transaction, deriving swap metadata from its opaque metadata field.
    pub fn new(transaction: Transaction) -> Self {
        let swap = SwapMetadata::from_transaction(&transaction);
        Self { transaction, swap }
    }

    pub fn id(&self) -> &str {
        &self.transaction.id
    }
}

/// Deletes and upserts applied together. Deletes run first, so a re-keyed
/// record can drop its old id and appear under the new one in one batch.
#[derive(Debug, Clone, Default)]
pub struct StoreBatch {
    pub delete: Vec<String>,
    pub upsert: Vec<StoredTransaction>,
}

impl StoreBatch {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.upsert.is_empty()
    }

    pub(crate) fn apply_to(self, rows: &mut BTreeMap<String, StoredTransaction>) {
        for id in self.delete {
            rows.remove(&id);
        }
        for row in self.upsert {
            rows.insert(row.transaction.id.clone(), row);
        }
    }
}

/// Abstract keyed store of transactions.
///
/// `apply` must be all-or-nothing: readers see either the whole batch or
/// none of it.
pub trait TransactionStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<StoredTransaction>, StorageError>;

    fn list(&self) -> Result<Vec<StoredTransaction>, StorageError>;

    fn apply(&self, batch: StoreBatch) -> Result<(), StorageError>;
}

/// In-memory store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<String, StoredTransaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<StoredTransaction>, StorageError> {
        let rows = self.rows.read().map_err(|_| StorageError::Poisoned)?;
        Ok(rows.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<StoredTransaction>, StorageError> {
        let rows = self.rows.read().map_err(|_| StorageError::Poisoned)?;
        Ok(rows.values().cloned().collect())
    }

    fn apply(&self, batch: StoreBatch) -> Result<(), StorageError> {
        let mut rows = self.rows.write().map_err(|_| StorageError::Poisoned)?;
        batch.apply_to(&mut rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetId, Chain, TransactionType};
    use chrono::Utc;

    fn tx(hash: &str) -> Transaction {
        Transaction::new(
            hash,
            AssetId::native(Chain::Bitcoin),
            "bc1qfrom",
            "bc1qto",
            TransactionType::Transfer,
            "1000",
            Utc::now(),
        )
    }

    #[test]
    fn test_delete_runs_before_upsert() {
        let store = MemoryStore::new();
        store
            .apply(StoreBatch {
                delete: vec![],
                upsert: vec![StoredTransaction::new(tx("a"))],
            })
            .unwrap();

        // Deleting and re-inserting the same id in one batch keeps the row
        store
            .apply(StoreBatch {
                delete: vec!["bitcoin_a".into()],
                upsert: vec![StoredTransaction::new(tx("a"))],
            })
            .unwrap();
        assert!(store.get("bitcoin_a").unwrap().is_some());

        store
            .apply(StoreBatch {
                delete: vec!["bitcoin_a".into()],
                upsert: vec![StoredTransaction::new(tx("b"))],
            })
            .unwrap();
        assert!(store.get("bitcoin_a").unwrap().is_none());
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
