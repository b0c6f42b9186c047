// Data models for the AA relayer: signed call batches and their lifecycle records

use alloy_primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ===== SIGNED REQUEST =====

/// One call inside a (possibly batched) AA transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Destination address; absent only for contract creation
    #[serde(default)]
    pub to: Option<Address>,
    /// Amount of native token forwarded with the call
    #[serde(default)]
    pub value: Option<U256>,
    /// Gas forwarded to this call by the invoker
    #[serde(default)]
    pub gas_limit: Option<U256>,
    /// Opaque call data
    #[serde(default)]
    pub input: Bytes,
}

/// The part of an AA transaction covered by the sender's signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Claimed sender; must equal the address recovered from the signature
    pub from: Address,
    /// Sender's invoker nonce
    #[serde(default)]
    pub nonce: u64,
    /// Calls executed atomically under one invocation
    #[serde(default)]
    pub payload: Vec<Payload>,
}

/// A signed batch as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AATransaction {
    pub transaction: Transaction,
    /// 65 bytes: r || s || v
    pub signature: Bytes,
}

impl AATransaction {
    /// Content identity of this transaction, recomputed from the signed fields
    pub fn id(&self) -> B256 {
        crate::invoker::transaction_id(&self.transaction)
    }

    pub fn from(&self) -> Address {
        self.transaction.from
    }
}

// ===== LIFECYCLE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AAStatus {
    /// Admitted and waiting in the pool
    Pending,
    /// Picked by the relayer loop, about to be broadcast
    Queued,
    /// Broadcast to the network, waiting for a receipt
    Sent,
    /// Receipt observed
    Mined,
    /// Rejected by the node, receipt lookup failed, or retries exhausted
    Failed,
}

impl AAStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AAStatus::Pending => "pending",
            AAStatus::Queued => "queued",
            AAStatus::Sent => "sent",
            AAStatus::Mined => "mined",
            AAStatus::Failed => "failed",
        }
    }

    /// Statuses that belong in the scheduling pool
    pub fn is_pending(&self) -> bool {
        matches!(self, AAStatus::Pending | AAStatus::Queued)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AAStatus::Mined | AAStatus::Failed)
    }
}

impl std::fmt::Display for AAStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network confirmation of the invoker call carrying a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AAReceipt {
    pub tx_hash: B256,
    pub block_hash: Option<B256>,
    pub block_number: u64,
    pub gas_used: u64,
    /// False when the invocation was included but reverted
    pub success: bool,
}

/// Persisted record: the signed request plus everything the relayer learned about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AAStateTransaction {
    pub id: B256,
    pub tx: AATransaction,
    pub status: AAStatus,
    /// Receipt polls consumed
    pub retries: u32,
    pub error: Option<String>,
    /// Hash of the broadcast envelope, once known
    pub tx_hash: Option<B256>,
    pub receipt: Option<AAReceipt>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AAStateTransaction {
    pub fn new(tx: AATransaction) -> Self {
        let now = Utc::now();
        Self {
            id: tx.id(),
            tx,
            status: AAStatus::Pending,
            retries: 0,
            error: None,
            tx_hash: None,
            receipt: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ===== HTTP BODIES =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTransactionResponse {
    pub success: bool,
    pub id: B256,
    pub status: AAStatus,
    /// True when the identity was already stored; resubmission is idempotent
    pub already_submitted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub relayer: Address,
    /// Signing domain clients must use
    pub invoker: Address,
    pub chain_id: u64,
    pub pool_size: usize,
}
