use std::sync::Arc;
use std::time::Instant;

use super::{
    Broadcaster, ChainAdapter, NodeHealth, Preloader, Signer, StatusChecker, StatusRequest,
};
use crate::error::EngineError;
use crate::model::{
    Account, Chain, ConfirmParams, NodeStatus, SignerParams, TransactionChanges, TransactionType,
};

/// Ordered list of adapters for one capability. The first adapter whose
/// `supports` accepts the chain wins.
pub struct AdapterRegistry<A: ?Sized> {
    capability: &'static str,
    adapters: Vec<Arc<A>>,
}

impl<A: ?Sized + ChainAdapter> AdapterRegistry<A> {
    pub fn new(capability: &'static str) -> Self {
        Self {
            capability,
            adapters: Vec::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<A>) {
        self.adapters.push(adapter);
    }

    pub fn capability(&self) -> &'static str {
        self.capability
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn supports(&self, chain: Chain) -> bool {
        self.adapters.iter().any(|adapter| adapter.supports(chain))
    }

    pub fn adapter_for(&self, chain: Chain) -> Result<&Arc<A>, EngineError> {
        self.adapters
            .iter()
            .find(|adapter| adapter.supports(chain))
            .ok_or(EngineError::AdapterNotFound {
                capability: self.capability,
                chain,
            })
    }
}

impl AdapterRegistry<dyn Preloader> {
    pub async fn preload(&self, input: &ConfirmParams) -> Result<SignerParams, EngineError> {
        let chain = input.chain();
        log::debug!("Preloading {:?} on {}", input.transaction_type(), chain);
        self.adapter_for(chain)?.preload(input).await
    }
}

impl AdapterRegistry<dyn Signer> {
    pub fn sign(
        &self,
        params: &SignerParams,
        private_key: &[u8],
    ) -> Result<Vec<Vec<u8>>, EngineError> {
        self.adapter_for(params.chain())?.sign(params, private_key)
    }
}

impl AdapterRegistry<dyn Broadcaster> {
    pub async fn broadcast(
        &self,
        account: &Account,
        signed: &[u8],
        transaction_type: TransactionType,
    ) -> Result<String, EngineError> {
        self.adapter_for(account.chain)?
            .broadcast(account, signed, transaction_type)
            .await
    }
}

impl AdapterRegistry<dyn StatusChecker> {
    pub async fn transaction_status(
        &self,
        request: &StatusRequest,
    ) -> Result<TransactionChanges, EngineError> {
        self.adapter_for(request.chain)?
            .transaction_status(request)
            .await
    }
}

impl AdapterRegistry<dyn NodeHealth> {
    /// Node status with the measured round-trip latency filled in.
    pub async fn node_status(&self, chain: Chain, url: &str) -> Result<NodeStatus, EngineError> {
        let adapter = self.adapter_for(chain)?;
        let started = Instant::now();
        let mut status = adapter.node_status(chain, url).await?;
        status.latency_ms = started.elapsed().as_millis() as u64;
        Ok(status)
    }
}

/// The five capability registries handed to application code.
pub struct Registries {
    pub preload: AdapterRegistry<dyn Preloader>,
    pub signer: AdapterRegistry<dyn Signer>,
    pub broadcast: AdapterRegistry<dyn Broadcaster>,
    pub status: AdapterRegistry<dyn StatusChecker>,
    pub node: AdapterRegistry<dyn NodeHealth>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            preload: AdapterRegistry::new("preload"),
            signer: AdapterRegistry::new("sign"),
            broadcast: AdapterRegistry::new("broadcast"),
            status: AdapterRegistry::new("status"),
            node: AdapterRegistry::new("node status"),
        }
    }

    /// Register an adapter that implements every capability.
    pub fn register<T>(&mut self, adapter: Arc<T>)
    where
        T: Preloader + Signer + Broadcaster + StatusChecker + NodeHealth + 'static,
    {
        self.preload.register(adapter.clone());
        self.signer.register(adapter.clone());
        self.broadcast.register(adapter.clone());
        self.status.register(adapter.clone());
        self.node.register(adapter);
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
