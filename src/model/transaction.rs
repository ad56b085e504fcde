use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AssetId, Chain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Pending,
    Confirmed,
    Failed,
    Reverted,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionState::Pending)
    }

    /// Pending may move anywhere; terminal states are absorbing.
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        *self == TransactionState::Pending || *self == next
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionState::Pending => "pending",
            TransactionState::Confirmed => "confirmed",
            TransactionState::Failed => "failed",
            TransactionState::Reverted => "reverted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    Transfer,
    TokenApproval,
    StakeDelegate,
    StakeUndelegate,
    StakeRedelegate,
    StakeWithdraw,
    Swap,
    SmartContractCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionDirection {
    Incoming,
    Outgoing,
    SelfTransfer,
}

impl TransactionDirection {
    pub fn from_addresses(from: &str, to: &str, owner: &str) -> Self {
        let from_owner = from.eq_ignore_ascii_case(owner);
        let to_owner = to.eq_ignore_ascii_case(owner);
        match (from_owner, to_owner) {
            (true, true) => TransactionDirection::SelfTransfer,
            (false, true) => TransactionDirection::Incoming,
            _ => TransactionDirection::Outgoing,
        }
    }
}

/// Persisted transaction record. `id` is always `"<chain>_<hash>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub hash: String,
    pub asset_id: AssetId,
    pub fee_asset_id: AssetId,
    pub from: String,
    pub to: String,
    pub contract: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub state: TransactionState,
    pub fee: String,
    pub value: String,
    pub memo: Option<String>,
    pub direction: TransactionDirection,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn id_for(chain: Chain, hash: &str) -> String {
        format!("{}_{}", chain, hash)
    }

    /// New outgoing Pending record with a zero fee paid in the native coin.
    pub fn new(
        hash: impl Into<String>,
        asset_id: AssetId,
        from: impl Into<String>,
        to: impl Into<String>,
        transaction_type: TransactionType,
        value: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let hash = hash.into();
        Self {
            id: Self::id_for(asset_id.chain, &hash),
            hash,
            fee_asset_id: asset_id.native_asset(),
            asset_id,
            from: from.into(),
            to: to.into(),
            contract: None,
            transaction_type,
            state: TransactionState::Pending,
            fee: "0".to_string(),
            value: value.into(),
            memo: None,
            direction: TransactionDirection::Outgoing,
            metadata: None,
            created_at,
        }
    }

    pub fn with_fee(mut self, fee_asset_id: AssetId, fee: impl Into<String>) -> Self {
        self.fee_asset_id = fee_asset_id;
        self.fee = fee.into();
        self
    }

    pub fn with_state(mut self, state: TransactionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_memo(mut self, memo: Option<String>) -> Self {
        self.memo = memo;
        self
    }

    pub fn with_contract(mut self, contract: Option<String>) -> Self {
        self.contract = contract;
        self
    }

    pub fn with_direction(mut self, direction: TransactionDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn chain(&self) -> Chain {
        self.asset_id.chain
    }

    /// Copy of this record under a new hash, and therefore a new id.
    pub fn rekeyed(&self, hash: &str) -> Transaction {
        let mut tx = self.clone();
        tx.hash = hash.to_string();
        tx.id = Self::id_for(self.chain(), hash);
        tx
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChange {
    pub old: String,
    pub new: String,
}

/// Diff reported by a status check. Fields the check knows nothing about
/// (memo, direction, metadata) are never touched by applying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionChanges {
    pub state: TransactionState,
    pub hash_change: Option<HashChange>,
    pub fee: Option<String>,
}

impl TransactionChanges {
    pub fn new(state: TransactionState) -> Self {
        Self {
            state,
            hash_change: None,
            fee: None,
        }
    }

    pub fn pending() -> Self {
        Self::new(TransactionState::Pending)
    }

    pub fn with_hash_change(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.hash_change = Some(HashChange {
            old: old.into(),
            new: new.into(),
        });
        self
    }

    pub fn with_fee(mut self, fee: impl ToString) -> Self {
        self.fee = Some(fee.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_couples_chain_and_hash() {
        let tx = Transaction::new(
            "abc",
            AssetId::native(Chain::Bitcoin),
            "from",
            "to",
            TransactionType::Transfer,
            "1000",
            Utc::now(),
        );
        assert_eq!(tx.id, "bitcoin_abc");
        let moved = tx.rekeyed("def");
        assert_eq!(moved.id, "bitcoin_def");
        assert_eq!(moved.from, tx.from);
    }

    #[test]
    fn test_terminal_states_absorb() {
        assert!(TransactionState::Pending.can_transition_to(TransactionState::Confirmed));
        assert!(TransactionState::Pending.can_transition_to(TransactionState::Failed));
        assert!(!TransactionState::Confirmed.can_transition_to(TransactionState::Pending));
        assert!(!TransactionState::Failed.can_transition_to(TransactionState::Confirmed));
        assert!(TransactionState::Reverted.can_transition_to(TransactionState::Reverted));
    }

    #[test]
    fn test_direction() {
        assert_eq!(
            TransactionDirection::from_addresses("0xAbC", "0xdef", "0xabc"),
            TransactionDirection::Outgoing
        );
        assert_eq!(
            TransactionDirection::from_addresses("x", "me", "me"),
            TransactionDirection::Incoming
        );
        assert_eq!(
            TransactionDirection::from_addresses("me", "me", "me"),
            TransactionDirection::SelfTransfer
        );
    }
}
