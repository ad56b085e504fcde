//! Capability contracts
//!
//! Every chain family implements up to five narrow capabilities. Each one is
//! dispatched through its own [`AdapterRegistry`] keyed by
//! [`ChainAdapter::supports`].

mod registry;

pub use registry::{AdapterRegistry, Registries};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{
    Account, Chain, ConfirmParams, NodeStatus, SignerParams, TransactionChanges, TransactionType,
};

pub trait ChainAdapter: Send + Sync {
    fn supports(&self, chain: Chain) -> bool;
}

/// Fetches the chain state needed to sign an intent.
///
/// Implementations must not mutate shared state, and must return an error
/// instead of falling back to default nonce or fee data.
#[async_trait]
pub trait Preloader: ChainAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError>;
}

/// Turns resolved params into raw payloads. No I/O.
///
/// More than one payload is returned when the chain needs a preparatory
/// transaction (an ERC-20 approval before a swap); payloads are broadcast
/// in order.
pub trait Signer: ChainAdapter {
    fn sign(&self, params: &SignerParams, private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError>;
}

#[async_trait]
pub trait Broadcaster: ChainAdapter {
    /// Submit one signed payload and return the transaction hash.
    /// Node rejections come back as [`EngineError::Remote`] with the node's message.
    async fn broadcast(
        &self,
        account: &Account,
        signed: &[u8],
        transaction_type: TransactionType,
    ) -> Result<String, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub chain: Chain,
    pub hash: String,
    pub sender: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait StatusChecker: ChainAdapter {
    /// Read-only. Calling twice without chain progress yields the same changes.
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError>;
}

#[async_trait]
pub trait NodeHealth: ChainAdapter {
    async fn node_status(&self, chain: Chain, url: &str) -> Result<NodeStatus, EngineError>;
}
