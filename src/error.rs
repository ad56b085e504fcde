//! Error types for the transaction lifecycle engine
//!
//! The variants follow the failure classes callers need to tell apart:
//! missing adapters, transport failures, validation failures, and remote
//! rejections whose message must reach the user untouched.

use thiserror::Error;

use crate::model::{Chain, ChainType};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No {capability} adapter registered for chain {chain}")]
    AdapterNotFound {
        capability: &'static str,
        chain: Chain,
    },

    #[error("{capability} is not implemented for chain {chain}")]
    NotImplemented {
        capability: &'static str,
        chain: Chain,
    },

    #[error("Chain mismatch: adapter for {expected} received data for {actual}")]
    ChainMismatch { expected: String, actual: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Rejection reported by the node. The message is kept verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn chain_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::ChainMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn family_mismatch(expected: ChainType, actual: Chain) -> Self {
        Self::chain_mismatch(expected, actual)
    }

    /// Transport failures are the only class a later attempt can fix on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EngineError::Network(format!("request timed out: {}", err))
        } else {
            EngineError::Network(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}
