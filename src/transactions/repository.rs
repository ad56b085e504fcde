use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use super::store::{StoreBatch, StoredTransaction, TransactionStore};
use crate::error::EngineError;
use crate::model::{AssetId, Transaction, TransactionChanges, TransactionState};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Status-check result addressed to a stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    pub id: String,
    pub changes: TransactionChanges,
}

impl TransactionUpdate {
    pub fn new(id: impl Into<String>, changes: TransactionChanges) -> Self {
        Self {
            id: id.into(),
            changes,
        }
    }
}

/// Apply a status diff to a record. Returns `None` when nothing changes.
///
/// Only state, hash (and therefore id) and fee are touched. A terminal
/// record is never moved.
pub fn apply_changes(current: &Transaction, changes: &TransactionChanges) -> Option<Transaction> {
    if !current.state.can_transition_to(changes.state) || current.state.is_terminal() {
        return None;
    }

    let mut next = match &changes.hash_change {
        Some(change) if change.new != current.hash => current.rekeyed(&change.new),
        _ => current.clone(),
    };
    next.state = changes.state;
    if let Some(fee) = &changes.fee {
        next.fee = fee.clone();
    }

    if next == *current {
        None
    } else {
        Some(next)
    }
}

/// Keep the loop-owned fields of a terminal record when an import tries to
/// overwrite it with an older view.
fn merge_incoming(existing: Option<&StoredTransaction>, incoming: Transaction) -> Transaction {
    match existing {
        Some(existing) if existing.transaction.state.is_terminal() => {
            let current = &existing.transaction;
            if incoming.state != current.state {
                log::debug!(
                    "Keeping {} state for {} over incoming {}",
                    current.state,
                    current.id,
                    incoming.state
                );
            }
            Transaction {
                state: current.state,
                fee: current.fee.clone(),
                fee_asset_id: current.fee_asset_id.clone(),
                ..incoming
            }
        }
        _ => incoming,
    }
}

/// Fold a re-keyed record into the row that already holds its new id.
fn merge_rekeyed(
    occupant: StoredTransaction,
    rekeyed: StoredTransaction,
    changes: &TransactionChanges,
) -> StoredTransaction {
    let changes = TransactionChanges {
        hash_change: None,
        ..changes.clone()
    };
    let transaction = apply_changes(&occupant.transaction, &changes)
        .unwrap_or_else(|| occupant.transaction.clone());
    StoredTransaction {
        transaction,
        swap: occupant.swap.or(rekeyed.swap),
    }
}

/// Facade over the transaction store.
///
/// Every write goes through one async lock, so a local broadcast and a
/// reconciliation batch touching the same record cannot lose each other's
/// update. Reconciliation batches are published on
/// [`changed_transactions`](Self::changed_transactions), one event per batch.
pub struct TransactionRepository {
    store: Arc<dyn TransactionStore>,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<Vec<Transaction>>,
}

impl TransactionRepository {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store,
            write_lock: Mutex::new(()),
            changes,
        }
    }

    /// Bulk upsert, e.g. from a chain-sync import.
    pub async fn put_transactions(&self, transactions: Vec<Transaction>) -> Result<(), EngineError> {
        if transactions.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;

        let mut batch = StoreBatch::default();
        for incoming in transactions {
            let existing = self.store.get(&incoming.id)?;
            let merged = merge_incoming(existing.as_ref(), incoming);
            batch.upsert.push(StoredTransaction::new(merged));
        }
        log::debug!("Storing {} transactions", batch.upsert.len());
        self.write(batch).await
    }

    /// Hand a batch to the store on the blocking pool. Callers hold the
    /// write lock.
    async fn write(&self, batch: StoreBatch) -> Result<(), EngineError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.apply(batch))
            .await
            .map_err(|e| EngineError::Internal(format!("Store write task failed: {}", e)))??;
        Ok(())
    }

    /// Record a transaction right after a local broadcast.
    pub async fn add_transaction(&self, transaction: Transaction) -> Result<(), EngineError> {
        log::info!("📝 Recorded {} ({})", transaction.id, transaction.state);
        self.put_transactions(vec![transaction]).await
    }

    /// Newest first, joined with swap metadata. With a filter, keeps
    /// transactions whose asset, or either side of whose swap, matches.
    pub async fn get_transactions(
        &self,
        asset_filter: Option<&AssetId>,
    ) -> Result<Vec<StoredTransaction>, EngineError> {
        let mut rows: Vec<StoredTransaction> = self
            .store
            .list()?
            .into_iter()
            .filter(|row| match asset_filter {
                None => true,
                Some(asset) => {
                    row.transaction.asset_id == *asset
                        || row.swap.as_ref().map_or(false, |swap| swap.touches(asset))
                }
            })
            .collect();
        rows.sort_by(|a, b| b.transaction.created_at.cmp(&a.transaction.created_at));
        Ok(rows)
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Option<StoredTransaction>, EngineError> {
        Ok(self.store.get(id)?)
    }

    pub async fn get_pending_transactions(&self) -> Result<Vec<Transaction>, EngineError> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .map(|row| row.transaction)
            .filter(|tx| tx.state == TransactionState::Pending)
            .collect())
    }

    /// Stream of reconciliation batches. Receivers that fall behind by more
    /// than the channel capacity observe `RecvError::Lagged`.
    pub fn changed_transactions(&self) -> broadcast::Receiver<Vec<Transaction>> {
        self.changes.subscribe()
    }

    /// Apply one cycle's updates as a single batch and publish the changed
    /// records once. Each update is applied to the record as stored now, not
    /// as it was when the status check started; missing or terminal records
    /// are skipped.
    ///
    /// A re-key onto an id that is already stored, or that an earlier update
    /// in the same batch produced, merges into that record: its fields are
    /// kept and only the new state and fee are applied to it.
    pub async fn apply_updates(
        &self,
        updates: Vec<TransactionUpdate>,
    ) -> Result<Vec<Transaction>, EngineError> {
        let _guard = self.write_lock.lock().await;

        let mut batch = StoreBatch::default();
        let mut changed: Vec<Transaction> = Vec::new();
        // id -> index into both `batch.upsert` and `changed`
        let mut staged: HashMap<String, usize> = HashMap::new();
        for update in updates {
            let current = match self.store.get(&update.id)? {
                Some(row) => row,
                None => {
                    log::debug!("{} disappeared before its update was applied", update.id);
                    continue;
                }
            };
            let next = match apply_changes(&current.transaction, &update.changes) {
                Some(next) => next,
                None => continue,
            };

            let mut row = StoredTransaction {
                transaction: next,
                swap: current.swap.clone(),
            };
            if row.transaction.id != current.transaction.id {
                log::info!("🔁 {} re-keyed to {}", current.transaction.id, row.transaction.id);
                batch.delete.push(current.transaction.id.clone());

                let occupant = match staged.get(&row.transaction.id) {
                    Some(index) => Some(batch.upsert[*index].clone()),
                    None => self.store.get(&row.transaction.id)?,
                };
                if let Some(occupant) = occupant {
                    log::warn!(
                        "⚠️  {} is already stored, merging {} into it",
                        occupant.transaction.id,
                        current.transaction.id
                    );
                    row = merge_rekeyed(occupant, row, &update.changes);
                }
            }

            match staged.get(&row.transaction.id) {
                Some(index) => {
                    changed[*index] = row.transaction.clone();
                    batch.upsert[*index] = row;
                }
                None => {
                    staged.insert(row.transaction.id.clone(), batch.upsert.len());
                    changed.push(row.transaction.clone());
                    batch.upsert.push(row);
                }
            }
        }

        if batch.is_empty() {
            return Ok(changed);
        }
        self.write(batch).await?;
        // No subscribers is fine
        let _ = self.changes.send(changed.clone());
        Ok(changed)
    }
}
