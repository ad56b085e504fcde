//! Per-chain static configuration
//!
//! In production these constants come from the embedded native core; the
//! bundled [`StaticChainConfig`] carries the same table for standalone use
//! and lets tests override single entries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::model::{Chain, ChainType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// A Pending transaction older than this is forced to Failed
    pub confirmation_timeout_seconds: u64,
    /// Smallest delegation accepted by the chain, in base units
    pub min_stake_amount: u128,
    /// Whether the fee known at broadcast time is only an estimate
    pub dynamic_fee: bool,
}

impl ChainConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_seconds)
    }
}

pub trait ChainConfigProvider: Send + Sync {
    fn chain_config(&self, chain: Chain) -> ChainConfig;

    /// Recommended validators per chain
    fn validators(&self) -> HashMap<Chain, Vec<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticChainConfig {
    overrides: HashMap<Chain, ChainConfig>,
    validators: HashMap<Chain, Vec<String>>,
}

impl StaticChainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, chain: Chain, config: ChainConfig) -> Self {
        self.overrides.insert(chain, config);
        self
    }

    pub fn with_timeout(self, chain: Chain, seconds: u64) -> Self {
        let mut config = default_config(chain);
        config.confirmation_timeout_seconds = seconds;
        self.with_override(chain, config)
    }

    pub fn with_validators(mut self, chain: Chain, validators: Vec<String>) -> Self {
        self.validators.insert(chain, validators);
        self
    }
}

impl ChainConfigProvider for StaticChainConfig {
    fn chain_config(&self, chain: Chain) -> ChainConfig {
        self.overrides
            .get(&chain)
            .cloned()
            .unwrap_or_else(|| default_config(chain))
    }

    fn validators(&self) -> HashMap<Chain, Vec<String>> {
        self.validators.clone()
    }
}

fn default_config(chain: Chain) -> ChainConfig {
    let confirmation_timeout_seconds = match chain {
        Chain::Bitcoin | Chain::Litecoin => 172_800,
        Chain::Ethereum => 3_600,
        Chain::SmartChain | Chain::Polygon | Chain::AvalancheC => 1_800,
        Chain::Arbitrum | Chain::Optimism | Chain::Base => 1_200,
        Chain::Solana => 300,
        Chain::Xrp | Chain::Stellar | Chain::Algorand => 600,
        Chain::Near | Chain::Ton | Chain::Sui | Chain::Aptos | Chain::Tron => 900,
        Chain::Cardano => 7_200,
        Chain::Cosmos | Chain::Osmosis | Chain::Celestia | Chain::Injective => 900,
    };

    let min_stake_amount = match chain {
        Chain::Cosmos | Chain::Osmosis | Chain::Celestia => 10_000,
        Chain::Injective => 10_000_000_000_000_000,
        Chain::Solana => 10_000_000,
        Chain::Near => 100_000_000_000_000_000_000_000,
        _ => 0,
    };

    let dynamic_fee = matches!(
        chain.chain_type(),
        ChainType::Ethereum | ChainType::Solana | ChainType::Near
    );

    ChainConfig {
        confirmation_timeout_seconds,
        min_stake_amount,
        dynamic_fee,
    }
}
