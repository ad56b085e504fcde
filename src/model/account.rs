use serde::{Deserialize, Serialize};

use super::Chain;

/// Derived wallet account. Produced by key derivation outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub chain: Chain,
    pub address: String,
    pub derivation_path: String,
    pub extended_public_key: Option<String>,
}

impl Account {
    pub fn new(chain: Chain, address: impl Into<String>, derivation_path: impl Into<String>) -> Self {
        Self {
            chain,
            address: address.into(),
            derivation_path: derivation_path.into(),
            extended_public_key: None,
        }
    }
}
