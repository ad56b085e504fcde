//! Supported chains and their protocol families

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Bitcoin,
    Litecoin,
    Ethereum,
    SmartChain,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    AvalancheC,
    Cosmos,
    Osmosis,
    Celestia,
    Injective,
    Solana,
    Xrp,
    Stellar,
    Near,
    Algorand,
    Cardano,
    Ton,
    Sui,
    Aptos,
    Tron,
}

/// Protocol family a chain belongs to. Adapters are written per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Bitcoin,
    Ethereum,
    Cosmos,
    Solana,
    Xrp,
    Stellar,
    Near,
    Algorand,
    Cardano,
    Ton,
    Sui,
    Aptos,
    Tron,
}

impl Chain {
    pub const ALL: [Chain; 23] = [
        Chain::Bitcoin,
        Chain::Litecoin,
        Chain::Ethereum,
        Chain::SmartChain,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Optimism,
        Chain::Base,
        Chain::AvalancheC,
        Chain::Cosmos,
        Chain::Osmosis,
        Chain::Celestia,
        Chain::Injective,
        Chain::Solana,
        Chain::Xrp,
        Chain::Stellar,
        Chain::Near,
        Chain::Algorand,
        Chain::Cardano,
        Chain::Ton,
        Chain::Sui,
        Chain::Aptos,
        Chain::Tron,
    ];

    pub fn chain_type(&self) -> ChainType {
        match self {
            Chain::Bitcoin | Chain::Litecoin => ChainType::Bitcoin,
            Chain::Ethereum
            | Chain::SmartChain
            | Chain::Polygon
            | Chain::Arbitrum
            | Chain::Optimism
            | Chain::Base
            | Chain::AvalancheC => ChainType::Ethereum,
            Chain::Cosmos | Chain::Osmosis | Chain::Celestia | Chain::Injective => {
                ChainType::Cosmos
            }
            Chain::Solana => ChainType::Solana,
            Chain::Xrp => ChainType::Xrp,
            Chain::Stellar => ChainType::Stellar,
            Chain::Near => ChainType::Near,
            Chain::Algorand => ChainType::Algorand,
            Chain::Cardano => ChainType::Cardano,
            Chain::Ton => ChainType::Ton,
            Chain::Sui => ChainType::Sui,
            Chain::Aptos => ChainType::Aptos,
            Chain::Tron => ChainType::Tron,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "bitcoin",
            Chain::Litecoin => "litecoin",
            Chain::Ethereum => "ethereum",
            Chain::SmartChain => "smartchain",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::AvalancheC => "avalanchec",
            Chain::Cosmos => "cosmos",
            Chain::Osmosis => "osmosis",
            Chain::Celestia => "celestia",
            Chain::Injective => "injective",
            Chain::Solana => "solana",
            Chain::Xrp => "xrp",
            Chain::Stellar => "stellar",
            Chain::Near => "near",
            Chain::Algorand => "algorand",
            Chain::Cardano => "cardano",
            Chain::Ton => "ton",
            Chain::Sui => "sui",
            Chain::Aptos => "aptos",
            Chain::Tron => "tron",
        }
    }

    /// EIP-155 chain id for EVM chains
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::SmartChain => Some(56),
            Chain::Polygon => Some(137),
            Chain::Arbitrum => Some(42161),
            Chain::Optimism => Some(10),
            Chain::Base => Some(8453),
            Chain::AvalancheC => Some(43114),
            _ => None,
        }
    }

    /// Cosmos SDK network id and fee denomination
    pub fn cosmos_network(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Chain::Cosmos => Some(("cosmoshub-4", "uatom")),
            Chain::Osmosis => Some(("osmosis-1", "uosmo")),
            Chain::Celestia => Some(("celestia", "utia")),
            Chain::Injective => Some(("injective-1", "inj")),
            _ => None,
        }
    }

    pub fn is_evm(&self) -> bool {
        self.chain_type() == ChainType::Ethereum
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Chain::ALL
            .iter()
            .copied()
            .find(|chain| chain.as_str() == lower)
            .ok_or_else(|| format!("Unknown chain: {}", s))
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainType::Bitcoin => "bitcoin",
            ChainType::Ethereum => "ethereum",
            ChainType::Cosmos => "cosmos",
            ChainType::Solana => "solana",
            ChainType::Xrp => "xrp",
            ChainType::Stellar => "stellar",
            ChainType::Near => "near",
            ChainType::Algorand => "algorand",
            ChainType::Cardano => "cardano",
            ChainType::Ton => "ton",
            ChainType::Sui => "sui",
            ChainType::Aptos => "aptos",
            ChainType::Tron => "tron",
        };
        f.write_str(name)
    }
}
