use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use super::repository::{TransactionRepository, TransactionUpdate};
use crate::capability::{Registries, StatusRequest};
use crate::chain_config::ChainConfigProvider;
use crate::error::EngineError;
use crate::model::{Transaction, TransactionChanges, TransactionState};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Background loop that moves Pending records toward a terminal state.
///
/// Each cycle takes one snapshot of the Pending records, checks them all
/// concurrently, runs the confirmation-timeout pass over the same snapshot,
/// and hands every resulting update to the repository as one batch.
pub struct Reconciler {
    repository: Arc<TransactionRepository>,
    registries: Arc<Registries>,
    chain_config: Arc<dyn ChainConfigProvider>,
    interval: Duration,
    check_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        repository: Arc<TransactionRepository>,
        registries: Arc<Registries>,
        chain_config: Arc<dyn ChainConfigProvider>,
    ) -> Self {
        Self {
            repository,
            registries,
            chain_config,
            interval: DEFAULT_INTERVAL,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Upper bound on a single status check. Keep it below the interval.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run forever, one cycle per interval. A failed cycle is logged and the
    /// next one runs as scheduled.
    pub async fn run(&self) {
        log::info!("🔄 Reconciliation every {}s", self.interval.as_secs());
        loop {
            if let Err(e) = self.run_cycle().await {
                log::error!("❌ Reconciliation cycle failed: {}", e);
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run_cycle(&self) -> Result<Vec<Transaction>, EngineError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// One cycle with an explicit clock for the timeout pass. Returns the
    /// records that changed, which are also what was emitted.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<Vec<Transaction>, EngineError> {
        let snapshot = self.repository.get_pending_transactions().await?;
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }
        log::debug!("Checking {} pending transactions", snapshot.len());

        let results = join_all(snapshot.iter().map(|tx| self.check(tx))).await;

        let updates: Vec<TransactionUpdate> = snapshot
            .iter()
            .zip(results)
            .filter_map(|(tx, result)| {
                let checked = match result {
                    Ok(changes) => Some(changes),
                    Err(e) if e.is_retryable() => {
                        log::warn!("⚠️  Status check for {} failed, retrying next cycle: {}", tx.id, e);
                        None
                    }
                    Err(e) => {
                        log::error!("❌ Status check for {} failed: {}", tx.id, e);
                        None
                    }
                };
                self.resolve(tx, checked, now)
                    .map(|changes| TransactionUpdate::new(tx.id.clone(), changes))
            })
            .collect();

        let changed = self.repository.apply_updates(updates).await?;
        if !changed.is_empty() {
            log::info!("✅ {} transactions updated", changed.len());
        }
        Ok(changed)
    }

    async fn check(&self, tx: &Transaction) -> Result<TransactionChanges, EngineError> {
        let request = StatusRequest {
            chain: tx.chain(),
            hash: tx.hash.clone(),
            sender: tx.from.clone(),
            created_at: tx.created_at,
        };
        let guarded = AssertUnwindSafe(self.registries.status.transaction_status(&request))
            .catch_unwind();
        match tokio::time::timeout(self.check_timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::Internal(format!(
                "status check for {} panicked",
                tx.id
            ))),
            Err(_) => Err(EngineError::Network(format!(
                "status check timed out after {}ms",
                self.check_timeout.as_millis()
            ))),
        }
    }

    /// Merge a status check result with the timeout rule.
    ///
    /// A terminal answer from the chain wins. Otherwise a record past its
    /// chain's confirmation timeout is failed, keeping any hash change the
    /// check reported. A reported fee is kept only on dynamic-fee chains.
    fn resolve(
        &self,
        tx: &Transaction,
        checked: Option<TransactionChanges>,
        now: DateTime<Utc>,
    ) -> Option<TransactionChanges> {
        let config = self.chain_config.chain_config(tx.chain());
        let timed_out = now
            .signed_duration_since(tx.created_at)
            .to_std()
            .map_or(false, |elapsed| elapsed > config.confirmation_timeout());

        let (mut changes, forced) = match checked {
            Some(changes) if changes.state.is_terminal() => (changes, false),
            Some(changes) if timed_out => (
                TransactionChanges {
                    state: TransactionState::Failed,
                    ..changes
                },
                true,
            ),
            None if timed_out => (TransactionChanges::new(TransactionState::Failed), true),
            Some(changes) => (changes, false),
            None => return None,
        };
        if forced {
            log::info!("⏱️  {} timed out after {}s", tx.id, config.confirmation_timeout_seconds);
        }
        if !config.dynamic_fee {
            changes.fee = None;
        }
        Some(changes)
    }
}
