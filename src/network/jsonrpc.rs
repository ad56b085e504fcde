use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

/// JSON-RPC 2.0 client (EVM, Solana, rippled, Near).
#[derive(Clone, Debug)]
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
    /// Near nests the machine-readable reason here
    #[serde(default)]
    cause: Option<RpcErrorCause>,
}

#[derive(Deserialize)]
struct RpcErrorCause {
    #[serde(default)]
    name: String,
}

impl RpcError {
    fn into_message(self) -> String {
        match (self.cause, self.data) {
            (Some(cause), Some(Value::String(data))) => format!("{}: {}", cause.name, data),
            (Some(cause), _) => format!("{}: {}", cause.name, self.message),
            _ => self.message,
        }
    }
}

impl JsonRpcClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn with_url(&self, url: &str) -> Self {
        Self::new(self.client.clone(), url)
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, EngineError> {
        let value = self.call_value(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| EngineError::Network(format!("Unexpected {} response: {}", method, e)))
    }

    /// Raw `result` value. A JSON-RPC error object becomes
    /// [`EngineError::Remote`] carrying the node's message.
    pub async fn call_value(&self, method: &str, params: Value) -> Result<Value, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        log::debug!("RPC {} -> {}", method, self.url);

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed: RpcResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(EngineError::Remote(if text.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    text.trim().to_string()
                }))
            }
            Err(e) => {
                return Err(EngineError::Network(format!(
                    "Invalid JSON-RPC response to {}: {}",
                    method, e
                )))
            }
        };

        if let Some(error) = parsed.error {
            log::debug!("RPC {} failed with code {}", method, error.code);
            return Err(EngineError::Remote(error.into_message()));
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}
