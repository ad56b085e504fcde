use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::Chain;

/// Native coin (`token_id == None`) or contract asset on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId {
    pub chain: Chain,
    pub token_id: Option<String>,
}

impl AssetId {
    pub fn native(chain: Chain) -> Self {
        Self {
            chain,
            token_id: None,
        }
    }

    pub fn token(chain: Chain, token_id: impl Into<String>) -> Self {
        let token_id = token_id.into();
        Self {
            chain,
            token_id: if token_id.is_empty() {
                None
            } else {
                Some(token_id)
            },
        }
    }

    pub fn is_native(&self) -> bool {
        self.token_id.is_none()
    }

    pub fn native_asset(&self) -> AssetId {
        AssetId::native(self.chain)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token_id {
            Some(token) => write!(f, "{}_{}", self.chain, token),
            None => write!(f, "{}", self.chain),
        }
    }
}

impl FromStr for AssetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('_') {
            Some((chain, token)) => Ok(AssetId::token(chain.parse()?, token)),
            None => Ok(AssetId::native(s.parse()?)),
        }
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_regardless_of_construction() {
        let parsed: AssetId = "ethereum_0xdAC17F958D2ee523a2206206994597C13D831ec7"
            .parse()
            .unwrap();
        let built = AssetId::token(Chain::Ethereum, "0xdAC17F958D2ee523a2206206994597C13D831ec7");
        assert_eq!(parsed, built);
        assert_eq!(AssetId::token(Chain::Bitcoin, ""), AssetId::native(Chain::Bitcoin));
    }

    #[test]
    fn test_string_form() {
        assert_eq!(AssetId::native(Chain::Solana).to_string(), "solana");
        let json = serde_json::to_string(&AssetId::token(Chain::Cosmos, "ibc/27394FB0")).unwrap();
        assert_eq!(json, "\"cosmos_ibc/27394FB0\"");
        let back: AssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.token_id.as_deref(), Some("ibc/27394FB0"));
    }
}
