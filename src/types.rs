// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core types for bridge messages and their lifecycle

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Chain identifier, closed set of supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainId {
    Solana,
    Bnb,
    Eth,
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Solana => write!(f, "solana"),
            ChainId::Bnb => write!(f, "bnb"),
            ChainId::Eth => write!(f, "eth"),
        }
    }
}

impl FromStr for ChainId {
    type Err = String;

    // Accepts both the canonical names and the network aliases used by
    // deployments (e.g. "solana-devnet", "bnb-testnet").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solana" | "solana-devnet" | "solana-mainnet" => Ok(ChainId::Solana),
            "bnb" | "bnb-testnet" | "bnb-mainnet" | "bsc" => Ok(ChainId::Bnb),
            "eth" | "eth-sepolia" | "eth-mainnet" | "ethereum" => Ok(ChainId::Eth),
            other => Err(format!("unknown chain: {}", other)),
        }
    }
}

/// Globally unique bridge message identifier, assigned at creation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(format!("msg_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Batch identifier grouping messages for destination-chain submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

impl BatchId {
    pub fn generate() -> Self {
        Self(format!("batch_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validator identifier as registered in the key registry
pub type ValidatorId = String;

/// Lifecycle status of a bridge message
///
/// Transitions are strictly forward (`Pending -> Processing ->
/// ReadyToFinalize -> Completed`); any non-terminal state may transition to
/// `Failed`. No other edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Processing,
    ReadyToFinalize,
    Completed,
    Failed,
}

impl MessageStatus {
    /// Every lifecycle status, in pipeline order
    pub const ALL: [MessageStatus; 5] = [
        MessageStatus::Pending,
        MessageStatus::Processing,
        MessageStatus::ReadyToFinalize,
        MessageStatus::Completed,
        MessageStatus::Failed,
    ];

    /// Whether the edge `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, ReadyToFinalize)
                | (ReadyToFinalize, Completed)
                | (Pending, Failed)
                | (Processing, Failed)
                | (ReadyToFinalize, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Completed | MessageStatus::Failed)
    }

    /// Short string for metrics labels
    pub fn as_label(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Processing => "processing",
            MessageStatus::ReadyToFinalize => "ready_to_finalize",
            MessageStatus::Completed => "completed",
            MessageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// Current time in milliseconds since the unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A cross-chain transfer request as accepted by `POST /bridge/token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_chain: String,
    pub dest_chain: String,
    pub token_address: String,
    pub amount: u64,
    pub sender: String,
    pub recipient: String,
    /// Source-chain deposit transaction, if known at request time.
    /// When absent the message id is used as the adapter-visible reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_tx_hash: Option<String>,
}

/// The unit of work tracked by the relay
///
/// Owned exclusively by the `MessageStore`; all other components read
/// snapshots and propose transitions through the store's CAS API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub id: MessageId,
    pub source_chain: ChainId,
    pub dest_chain: ChainId,
    pub token_address: String,
    pub amount: u64,
    pub sender: String,
    pub recipient: String,
    /// Reference used to query the source chain for confirmation depth
    pub source_tx_ref: String,
    pub status: MessageStatus,
    /// Monotonically non-decreasing while `Pending`
    pub confirmations: u64,
    pub required_confirmations: u64,
    /// One entry per validator; a validator never contributes twice
    pub validator_signatures: BTreeMap<ValidatorId, String>,
    pub required_signatures: usize,
    pub batch_id: Option<BatchId>,
    /// Set exactly once, on transition to `Completed`
    pub dest_tx_hash: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub completed_at_ms: Option<u64>,
}

impl BridgeMessage {
    pub fn signature_count(&self) -> usize {
        self.validator_signatures.len()
    }

    pub fn has_confirmation_quorum(&self) -> bool {
        self.confirmations >= self.required_confirmations
    }

    pub fn has_signature_quorum(&self) -> bool {
        self.validator_signatures.len() >= self.required_signatures
    }
}

/// A validator's signed statement that it observed the source-chain deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub message_id: MessageId,
    pub validator_id: ValidatorId,
    /// Hex-encoded ed25519 signature over the canonical message digest
    pub signature: String,
}

/// Read-only projection returned by `GET /messages/:id/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStatusProjection {
    pub message_id: MessageId,
    pub status: MessageStatus,
    pub confirmations: u64,
    pub required_confirmations: u64,
    pub signature_count: usize,
    pub required_signatures: usize,
    pub batch_id: Option<BatchId>,
    pub dest_tx_hash: Option<String>,
    pub completed_at: Option<u64>,
    pub updated_at: u64,
}

impl From<&BridgeMessage> for MessageStatusProjection {
    fn from(msg: &BridgeMessage) -> Self {
        Self {
            message_id: msg.id.clone(),
            status: msg.status,
            confirmations: msg.confirmations,
            required_confirmations: msg.required_confirmations,
            signature_count: msg.signature_count(),
            required_signatures: msg.required_signatures,
            batch_id: msg.batch_id.clone(),
            dest_tx_hash: msg.dest_tx_hash.clone(),
            completed_at: msg.completed_at_ms,
            updated_at: msg.updated_at_ms,
        }
    }
}

/// Response body for `POST /bridge/token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeTokenResponse {
    pub message_id: MessageId,
    pub status: MessageStatus,
    pub confirmations: u64,
    pub required_confirmations: u64,
    pub created_at: u64,
}
