//! Placeholder for chains that are modelled but have no adapter yet.
//!
//! Registering it keeps lookups for those chains from failing with
//! `AdapterNotFound`; every capability answers `NotImplemented` instead.

use async_trait::async_trait;

use crate::capability::{
    Broadcaster, ChainAdapter, NodeHealth, Preloader, Signer, StatusChecker, StatusRequest,
};
use crate::error::EngineError;
use crate::model::{
    Account, Chain, ConfirmParams, NodeStatus, SignerParams, TransactionChanges, TransactionType,
};

pub const UNSUPPORTED_CHAINS: [Chain; 7] = [
    Chain::Litecoin,
    Chain::Algorand,
    Chain::Cardano,
    Chain::Ton,
    Chain::Sui,
    Chain::Aptos,
    Chain::Tron,
];

pub struct UnsupportedAdapter {
    chains: Vec<Chain>,
}

impl UnsupportedAdapter {
    pub fn new(chains: impl IntoIterator<Item = Chain>) -> Self {
        Self {
            chains: chains.into_iter().collect(),
        }
    }
}

impl Default for UnsupportedAdapter {
    fn default() -> Self {
        Self::new(UNSUPPORTED_CHAINS)
    }
}

fn not_implemented<T>(capability: &'static str, chain: Chain) -> Result<T, EngineError> {
    Err(EngineError::NotImplemented { capability, chain })
}

impl ChainAdapter for UnsupportedAdapter {
    fn supports(&self, chain: Chain) -> bool {
        self.chains.contains(&chain)
    }
}

#[async_trait]
impl Preloader for UnsupportedAdapter {
    async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        not_implemented("preload", input.chain())
    }
}

impl Signer for UnsupportedAdapter {
    fn sign(&self, params: &SignerParams, _private_key: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        not_implemented("sign", params.chain())
    }
}

#[async_trait]
impl Broadcaster for UnsupportedAdapter {
    async fn broadcast(
        &self,
        account: &Account,
        _signed: &[u8],
        _transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        not_implemented("broadcast", account.chain)
    }
}

#[async_trait]
impl StatusChecker for UnsupportedAdapter {
    async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        not_implemented("status", request.chain)
    }
}

#[async_trait]
impl NodeHealth for UnsupportedAdapter {
    async fn node_status(&self, chain: Chain, _url: &str) -> Result<NodeStatus, EngineError> {
        not_implemented("node status", chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetId, TransferData};

    #[tokio::test]
    async fn test_reports_not_implemented() {
        let adapter = UnsupportedAdapter::default();
        assert!(adapter.supports(Chain::Tron));
        assert!(!adapter.supports(Chain::Bitcoin));

        let input = ConfirmParams::Transfer(TransferData {
            asset_id: AssetId::native(Chain::Tron),
            from: "TA".into(),
            to: "TB".into(),
            value: 1,
            memo: None,
        });
        let err = adapter.preload(&input).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotImplemented {
                capability: "preload",
                chain: Chain::Tron
            }
        ));
    }
}
