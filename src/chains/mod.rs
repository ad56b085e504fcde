//! Per-family chain adapters and the wiring that registers them

pub mod bitcoin;
pub mod cosmos;
pub mod evm;
pub mod near;
pub mod solana;
pub mod stellar;
pub mod unsupported;
pub mod xrp;

use std::sync::Arc;

use self::bitcoin::esplora::EsploraClient;
use self::bitcoin::BitcoinAdapter;
use self::cosmos::CosmosAdapter;
use self::evm::EvmAdapter;
use self::near::NearAdapter;
use self::solana::SolanaAdapter;
use self::stellar::StellarAdapter;
use self::unsupported::UnsupportedAdapter;
use self::xrp::XrpAdapter;
use crate::capability::{ChainAdapter, Registries};
use crate::chain_config::ChainConfigProvider;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{Chain, ChainType};
use crate::network::{build_client, JsonRpcClient, RestClient};
use crate::signing::NativeSigner;

/// Build one adapter per configured chain and register it for all five
/// capabilities. Chains without a node URL are left unregistered.
pub fn build_registries(
    config: &EngineConfig,
    signer: Arc<dyn NativeSigner>,
    chain_config: Arc<dyn ChainConfigProvider>,
) -> Result<Registries, EngineError> {
    let client = build_client(config.request_timeout)?;
    let mut registries = Registries::new();
    let unsupported = UnsupportedAdapter::default();

    for chain in Chain::ALL {
        if unsupported.supports(chain) {
            continue;
        }
        let url = match config.node_url(chain) {
            Some(url) => url,
            None => {
                log::warn!("⚠️  No node URL for {}, adapter not registered", chain);
                continue;
            }
        };

        match chain.chain_type() {
            ChainType::Bitcoin => registries.register(Arc::new(BitcoinAdapter::new(
                chain,
                config.bitcoin_network,
                EsploraClient::new(RestClient::new(client.clone(), url)),
                signer.clone(),
            ))),
            ChainType::Ethereum => registries.register(Arc::new(EvmAdapter::new(
                chain,
                JsonRpcClient::new(client.clone(), url),
                signer.clone(),
            ))),
            ChainType::Cosmos => registries.register(Arc::new(CosmosAdapter::new(
                chain,
                RestClient::new(client.clone(), url),
                signer.clone(),
                chain_config.clone(),
            ))),
            ChainType::Solana => registries.register(Arc::new(SolanaAdapter::new(
                JsonRpcClient::new(client.clone(), url),
                signer.clone(),
            ))),
            ChainType::Xrp => registries.register(Arc::new(XrpAdapter::new(
                JsonRpcClient::new(client.clone(), url),
                signer.clone(),
            ))),
            ChainType::Stellar => registries.register(Arc::new(StellarAdapter::new(
                RestClient::new(client.clone(), url),
                signer.clone(),
            ))),
            ChainType::Near => registries.register(Arc::new(NearAdapter::new(
                JsonRpcClient::new(client.clone(), url),
                signer.clone(),
            ))),
            other => {
                log::warn!("⚠️  No adapter for {} family ({})", other, chain);
                continue;
            }
        }
        log::debug!("Registered {} adapter at {}", chain, url);
    }

    registries.register(Arc::new(unsupported));
    Ok(registries)
}
