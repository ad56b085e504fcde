//! Transaction persistence and the pending-transaction reconciliation loop
//!
//! The store is an abstract keyed table ([`TransactionStore`]); the
//! [`TransactionRepository`] serializes writes to it and publishes change
//! batches; the [`Reconciler`] feeds it status updates on a fixed interval.

mod file_store;
mod reconciler;
mod repository;
mod store;
mod swap_metadata;

pub use file_store::FileStore;
pub use reconciler::{Reconciler, DEFAULT_CHECK_TIMEOUT, DEFAULT_INTERVAL};
pub use repository::{apply_changes, TransactionRepository, TransactionUpdate};
pub use store::{MemoryStore, StoreBatch, StoredTransaction, TransactionStore};
pub use swap_metadata::SwapMetadata;
