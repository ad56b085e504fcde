//! Raw network clients used by the chain adapters
//!
//! Every client is built with a request timeout so a stalled endpoint can
//! never hold up a reconciliation cycle.

mod http;
mod jsonrpc;

pub use http::RestClient;
pub use jsonrpc::JsonRpcClient;

use std::time::Duration;

use crate::error::EngineError;

pub fn build_client(timeout: Duration) -> Result<reqwest::Client, EngineError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EngineError::Internal(format!("Failed to build HTTP client: {}", e)))
}
