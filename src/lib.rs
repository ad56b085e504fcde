//! Chainflow: multi-chain transaction lifecycle engine
//!
//! One protocol abstraction drives transaction construction, signing,
//! broadcast and confirmation tracking across structurally different chains
//! (UTXO, EVM, Cosmos SDK, Solana, XRP, Stellar, Near).
//!
//! # Architecture
//!
//! - **Capabilities**: five narrow traits (preload, sign, broadcast, status,
//!   node health), each dispatched by chain through its own registry
//! - **Chain adapters**: one family per protocol, talking to raw node APIs
//! - **Transaction repository**: keyed store with serialized writes and a
//!   change stream
//! - **Reconciler**: background loop that moves Pending records to a terminal
//!   state or times them out
//!
//! # Example
//!
//! ```ignore
//! use chainflow::{build_registries, EngineConfig, FileStore, LocalSigner, Reconciler};
//!
//! let config = EngineConfig::from_env();
//! let registries = Arc::new(build_registries(&config, Arc::new(LocalSigner), chain_config.clone())?);
//! let repository = Arc::new(TransactionRepository::new(Arc::new(FileStore::open(&config.store_path)?)));
//!
//! let engine = TransactionEngine::new(registries.clone(), repository.clone());
//! let recorded = engine.send(&account, &intent, FeePriority::Normal, &private_key).await?;
//!
//! Arc::new(Reconciler::new(repository, registries, chain_config)).spawn();
//! ```

// Public modules
pub mod capability;
pub mod chain_config;
pub mod chains;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod network;
pub mod signing;
pub mod swap;
pub mod transactions;

// Re-exports for convenience
pub use capability::{
    AdapterRegistry, Broadcaster, ChainAdapter, NodeHealth, Preloader, Registries, Signer,
    StatusChecker, StatusRequest,
};
pub use chain_config::{ChainConfig, ChainConfigProvider, StaticChainConfig};
pub use chains::build_registries;
pub use config::EngineConfig;
pub use engine::TransactionEngine;
pub use error::{EngineError, StorageError};
pub use signing::{LocalSigner, NativeSigner, SigningInput};
pub use swap::{Quote, QuoteData, QuoteRequest, SwapQuoteProvider};
pub use transactions::{
    FileStore, MemoryStore, Reconciler, StoredTransaction, TransactionRepository,
    TransactionStore,
};

// Common result type
pub type Result<T> = std::result::Result<T, EngineError>;
