use std::sync::Arc;

use chainflow::{
    build_registries, EngineConfig, FileStore, LocalSigner, Reconciler, StaticChainConfig,
    TransactionRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    // RUST_LOG=debug for per-call detail
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = EngineConfig::from_env();
    let chain_config = Arc::new(StaticChainConfig::new());
    let registries = Arc::new(build_registries(
        &config,
        Arc::new(LocalSigner::new()),
        chain_config.clone(),
    )?);

    let store = FileStore::open(&config.store_path)?;
    let repository = Arc::new(TransactionRepository::new(Arc::new(store)));
    let pending = repository.get_pending_transactions().await?;
    log::info!("Starting chainflow-watch with {} pending transactions", pending.len());

    let mut changes = repository.changed_transactions();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(batch) => {
                    for tx in batch {
                        log::info!("{} -> {} (fee {})", tx.id, tx.state, tx.fee);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("⚠️  Change log skipped {} batches", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let reconciler = Arc::new(
        Reconciler::new(repository, registries, chain_config)
            .with_interval(config.reconcile_interval)
            .with_check_timeout(config.status_check_timeout()),
    );
    let handle = reconciler.spawn();

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    handle.abort();
    Ok(())
}
