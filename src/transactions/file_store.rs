use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::store::{StoreBatch, StoredTransaction, TransactionStore};
use crate::error::StorageError;

/// JSON-file backed store.
///
/// The whole table is kept in memory and rewritten on every batch: the new
/// contents go to a sibling temp file which is then renamed over the old one,
/// so a crash mid-write leaves the previous table intact. `apply` blocks on
/// file I/O; [`TransactionRepository`](super::TransactionRepository) runs it
/// on tokio's blocking pool.
pub struct FileStore {
    path: PathBuf,
    rows: RwLock<BTreeMap<String, StoredTransaction>>,
}

impl FileStore {
    /// Open the store at `path`, creating parent directories. A missing file
    /// is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let rows = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let list: Vec<StoredTransaction> = if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)?
            };
            list.into_iter()
                .map(|row| (row.transaction.id.clone(), row))
                .collect()
        } else {
            BTreeMap::new()
        };
        log::debug!("Opened transaction store {} ({} rows)", path.display(), rows.len());

        Ok(Self {
            path,
            rows: RwLock::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, rows: &BTreeMap<String, StoredTransaction>) -> Result<(), StorageError> {
        let list: Vec<&StoredTransaction> = rows.values().collect();
        let json = serde_json::to_string_pretty(&list)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TransactionStore for FileStore {
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
        let mut next = rows.clone();
        batch.apply_to(&mut next);
        // Memory only moves forward once the file is on disk
        self.persist(&next)?;
        *rows = next;
        Ok(())
    }
}
