//! Chain-tagged data contracts shared by adapters, registries and the repository

pub mod amount;

mod account;
mod asset;
mod chain;
mod fee;
mod node;
mod params;
mod sign_data;
mod transaction;

pub use account::Account;
pub use asset::AssetId;
pub use chain::{Chain, ChainType};
pub use fee::{Fee, FeeOption, FeePriority, GasPrice};
pub use node::NodeStatus;
pub use params::{
    ConfirmParams, ContractCallData, StakeData, StakeType, SwapData, TransferData,
};
pub use sign_data::{
    BitcoinSignData, ChainSignData, CosmosSignData, EthereumSignData, NearSignData, SignData,
    SignerParams, SolanaSignData, StellarSignData, Utxo, XrpSignData,
};
pub use transaction::{
    HashChange, Transaction, TransactionChanges, TransactionDirection, TransactionState,
    TransactionType,
};
