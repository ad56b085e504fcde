//! Signing primitive boundary
//!
//! Adapters build a typed [`SigningInput`] and hand it, together with the
//! private key, to a [`NativeSigner`]. This is the only call that ever sees
//! key material. Implementations are synchronous and side-effect free.

mod evm;
mod input;
mod utxo;

pub use evm::transaction_hash;
pub use input::{
    BitcoinSigningInput, CosmosMessage, CosmosSigningInput, EthereumSigningInput,
    NearSigningInput, PlannedOutput, SigningInput, SolanaSigningInput, SolanaTokenTransfer,
    StellarSigningInput, XrpSigningInput,
};

use crate::error::EngineError;
use crate::model::ChainType;

pub trait NativeSigner: Send + Sync {
    /// Returns the signed bytes, or the primitive's own error message.
    fn sign(
        &self,
        chain_type: ChainType,
        input: &SigningInput,
        private_key: &[u8],
    ) -> Result<Vec<u8>, String>;
}

/// Call the primitive and lift its error message into [`EngineError::Signing`]
/// unchanged.
pub fn sign_with(
    signer: &dyn NativeSigner,
    chain_type: ChainType,
    input: &SigningInput,
    private_key: &[u8],
) -> Result<Vec<u8>, EngineError> {
    if input.chain_type() != chain_type {
        return Err(EngineError::chain_mismatch(chain_type, input.chain_type()));
    }
    signer
        .sign(chain_type, input, private_key)
        .map_err(EngineError::Signing)
}

/// Bundled signer for secp256k1 families: Bitcoin P2WPKH and EIP-1559.
///
/// Other families need an external primitive; asking this signer for them
/// returns an error message instead of bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSigner;

impl LocalSigner {
    pub fn new() -> Self {
        Self
    }
}

impl NativeSigner for LocalSigner {
    fn sign(
        &self,
        chain_type: ChainType,
        input: &SigningInput,
        private_key: &[u8],
    ) -> Result<Vec<u8>, String> {
        match (chain_type, input) {
            (ChainType::Bitcoin, SigningInput::Bitcoin(input)) => {
                utxo::sign_p2wpkh(input, private_key)
            }
            (ChainType::Ethereum, SigningInput::Ethereum(input)) => {
                evm::sign_eip1559(input, private_key)
            }
            (expected, input) if expected != input.chain_type() => Err(format!(
                "Signing input for {} passed as {}",
                input.chain_type(),
                expected
            )),
            (chain_type, _) => Err(format!("No local signing support for {}", chain_type)),
        }
    }
}
