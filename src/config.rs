//! Engine configuration from environment variables
//!
//! Controls node endpoints, polling cadence and where the transaction store
//! lives. Defaults to public mainnet endpoints.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::Chain;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Bitcoin network used to parse and derive addresses
    pub bitcoin_network: bitcoin::Network,
    /// Delay between two reconciliation cycles
    pub reconcile_interval: Duration,
    /// Per-request timeout applied at the HTTP client
    pub request_timeout: Duration,
    /// JSON file backing the transaction store
    pub store_path: PathBuf,
    /// Node endpoint per chain
    pub node_urls: HashMap<Chain, String>,
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BITCOIN_NETWORK`: "bitcoin" (default), "signet", "testnet" or "regtest"
    /// - `RECONCILE_INTERVAL_SECS`: seconds between reconciliation cycles (default 10)
    /// - `REQUEST_TIMEOUT_SECS`: per-request timeout in seconds (default 15)
    /// - `TX_STORE_PATH`: transaction store file (default `./data/transactions.json`)
    /// - `NODE_URL_<CHAIN>`: endpoint override, e.g. `NODE_URL_ETHEREUM`
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Point Bitcoin at a local Esplora and poll every 2 seconds
    /// BITCOIN_NETWORK=regtest NODE_URL_BITCOIN=http://localhost:3000 \
    ///     RECONCILE_INTERVAL_SECS=2 cargo run --bin chainflow-watch
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let network_str = env::var("BITCOIN_NETWORK")
            .unwrap_or_else(|_| "bitcoin".to_string())
            .to_lowercase();
        let bitcoin_network = match network_str.as_str() {
            "bitcoin" | "mainnet" | "" => bitcoin::Network::Bitcoin,
            "signet" => bitcoin::Network::Signet,
            "testnet" => bitcoin::Network::Testnet,
            "regtest" => {
                log::info!("🔧 Using REGTEST network");
                bitcoin::Network::Regtest
            }
            other => {
                log::warn!("⚠️  Unknown network '{}', defaulting to mainnet", other);
                bitcoin::Network::Bitcoin
            }
        };

        let reconcile_interval = secs_var("RECONCILE_INTERVAL_SECS")
            .unwrap_or(defaults.reconcile_interval);
        let request_timeout =
            secs_var("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout);

        let store_path = env::var("TX_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);
        log::info!("💾 Transaction store: {}", store_path.display());

        let mut node_urls = defaults.node_urls;
        for chain in Chain::ALL {
            let key = format!("NODE_URL_{}", chain.as_str().to_uppercase());
            if let Ok(url) = env::var(&key) {
                log::info!("📡 {} node: {}", chain, url);
                node_urls.insert(chain, url);
            }
        }

        Self {
            bitcoin_network,
            reconcile_interval,
            request_timeout,
            store_path,
            node_urls,
        }
    }

    /// Bound on one status check inside a reconciliation cycle: the request
    /// timeout, capped at half the reconciliation interval
    pub fn status_check_timeout(&self) -> Duration {
        self.request_timeout.min(self.reconcile_interval / 2)
    }

    pub fn node_url(&self, chain: Chain) -> Option<&str> {
        self.node_urls.get(&chain).map(String::as_str)
    }

    pub fn with_node_url(mut self, chain: Chain, url: impl Into<String>) -> Self {
        self.node_urls.insert(chain, url.into());
        self
    }
}

fn secs_var(key: &str) -> Option<Duration> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            log::warn!("⚠️  Ignoring invalid {}='{}'", key, raw);
            None
        }
    }
}

fn default_node_url(chain: Chain) -> Option<&'static str> {
    let url = match chain {
        Chain::Bitcoin => "https://mempool.space/api",
        Chain::Ethereum => "https://ethereum-rpc.publicnode.com",
        Chain::SmartChain => "https://bsc-dataseed.bnbchain.org",
        Chain::Polygon => "https://polygon-rpc.com",
        Chain::Arbitrum => "https://arb1.arbitrum.io/rpc",
        Chain::Optimism => "https://mainnet.optimism.io",
        Chain::Base => "https://mainnet.base.org",
        Chain::AvalancheC => "https://api.avax.network/ext/bc/C/rpc",
        Chain::Cosmos => "https://cosmos-rest.publicnode.com",
        Chain::Osmosis => "https://osmosis-rest.publicnode.com",
        Chain::Celestia => "https://celestia-rest.publicnode.com",
        Chain::Injective => "https://injective-rest.publicnode.com",
        Chain::Solana => "https://api.mainnet-beta.solana.com",
        Chain::Xrp => "https://s1.ripple.com:51234",
        Chain::Stellar => "https://horizon.stellar.org",
        Chain::Near => "https://rpc.mainnet.near.org",
        _ => return None,
    };
    Some(url)
}

impl Default for EngineConfig {
    /// Mainnet endpoints, 10 s reconciliation, 15 s request timeout
    fn default() -> Self {
        let node_urls = Chain::ALL
            .iter()
            .filter_map(|chain| default_node_url(*chain).map(|url| (*chain, url.to_string())))
            .collect();
        Self {
            bitcoin_network: bitcoin::Network::Bitcoin,
            reconcile_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            store_path: PathBuf::from("./data/transactions.json"),
            node_urls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.reconcile_interval, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(matches!(config.bitcoin_network, bitcoin::Network::Bitcoin));
        assert_eq!(config.node_url(Chain::Bitcoin), Some("https://mempool.space/api"));
        assert_eq!(config.node_url(Chain::Tron), None);
    }

    #[test]
    fn test_status_check_timeout_stays_under_interval() {
        let config = EngineConfig::default();
        assert_eq!(config.status_check_timeout(), Duration::from_secs(5));

        let config = EngineConfig {
            reconcile_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(15),
            ..EngineConfig::default()
        };
        assert_eq!(config.status_check_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_node_url_override() {
        let config = EngineConfig::default().with_node_url(Chain::Polygon, "http://localhost:8545");
        assert_eq!(config.node_url(Chain::Polygon), Some("http://localhost:8545"));
    }
}
