use serde::{Deserialize, Serialize};

/// Health snapshot of a node endpoint, used to pick between endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub chain_id: String,
    pub latest_block_number: u64,
    pub latency_ms: u64,
}
