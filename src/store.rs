// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory message store with compare-and-transition semantics
//!
//! The store is the single writer of message state. Workers read snapshots,
//! decide, and propose a transition naming the status they observed; a
//! proposal whose expectation no longer holds is rejected with `Conflict`
//! and the message is left untouched. Lost updates are impossible because
//! every mutation runs under the write lock after re-checking the
//! expectation.

use crate::adapter::AdapterRegistry;
use crate::error::{BridgeError, BridgeResult};
use crate::types::{
    now_ms, BridgeMessage, ChainId, MessageId, MessageStatus, TransferRequest, ValidatorId,
};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct MessageStore {
    messages: RwLock<HashMap<MessageId, BridgeMessage>>,
}

impl MessageStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: RwLock::new(HashMap::new()),
        })
    }

    /// Validate a transfer request and admit it as a new `Pending` message.
    ///
    /// Validation happens before any state is created, so a rejected
    /// request leaves no trace.
    pub async fn create(
        &self,
        request: TransferRequest,
        adapters: &AdapterRegistry,
        required_confirmations: impl Fn(ChainId) -> u64,
        required_signatures: usize,
    ) -> BridgeResult<BridgeMessage> {
        let source_chain = ChainId::from_str(&request.source_chain)
            .map_err(BridgeError::InvalidRequest)?;
        let dest_chain =
            ChainId::from_str(&request.dest_chain).map_err(BridgeError::InvalidRequest)?;
        if source_chain == dest_chain {
            return Err(BridgeError::InvalidRequest(
                "source and destination chain must differ".to_string(),
            ));
        }
        if !adapters.supports(source_chain) {
            return Err(BridgeError::InvalidRequest(format!(
                "unsupported source chain: {}",
                source_chain
            )));
        }
        let dest_adapter = adapters.get(dest_chain).ok_or_else(|| {
            BridgeError::InvalidRequest(format!("unsupported destination chain: {}", dest_chain))
        })?;
        if request.amount == 0 {
            return Err(BridgeError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        if request.token_address.is_empty() {
            return Err(BridgeError::InvalidRequest(
                "token address must not be empty".to_string(),
            ));
        }
        if !dest_adapter.validate_address(&request.recipient) {
            return Err(BridgeError::InvalidRequest(format!(
                "recipient is not a valid {} address",
                dest_chain
            )));
        }

        let id = MessageId::generate();
        // Without an explicit deposit tx the message id doubles as the
        // adapter-visible reference.
        let source_tx_ref = request
            .deposit_tx_hash
            .clone()
            .unwrap_or_else(|| id.as_str().to_string());
        let now = now_ms();
        let message = BridgeMessage {
            id: id.clone(),
            source_chain,
            dest_chain,
            token_address: request.token_address,
            amount: request.amount,
            sender: request.sender,
            recipient: request.recipient,
            source_tx_ref,
            status: MessageStatus::Pending,
            confirmations: 0,
            required_confirmations: required_confirmations(source_chain),
            validator_signatures: BTreeMap::new(),
            required_signatures,
            batch_id: None,
            dest_tx_hash: None,
            failure_reason: None,
            created_at_ms: now,
            updated_at_ms: now,
            completed_at_ms: None,
        };

        let mut messages = self.messages.write().await;
        messages.insert(id.clone(), message.clone());
        info!(
            "[MessageStore] Created message {}: {} -> {}, amount {}",
            id, source_chain, dest_chain, message.amount
        );
        Ok(message)
    }

    pub async fn get(&self, id: &MessageId) -> Option<BridgeMessage> {
        self.messages.read().await.get(id).cloned()
    }

    /// Compare-and-transition: move `id` from `expected` to `next`,
    /// applying `mutate` to the message under the same write lock.
    ///
    /// Fails with `Conflict` if the message is no longer in `expected`, and
    /// with `InternalError` if the edge itself is illegal (a worker bug, not
    /// a race).
    pub async fn transition<F>(
        &self,
        id: &MessageId,
        expected: MessageStatus,
        next: MessageStatus,
        mutate: F,
    ) -> BridgeResult<BridgeMessage>
    where
        F: FnOnce(&mut BridgeMessage),
    {
        if !expected.can_transition_to(next) {
            return Err(BridgeError::InternalError(format!(
                "illegal transition {} -> {}",
                expected, next
            )));
        }
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| BridgeError::NotFound(id.clone()))?;
        if message.status != expected {
            return Err(BridgeError::Conflict {
                id: id.clone(),
                expected,
                actual: message.status,
            });
        }
        mutate(message);
        message.status = next;
        message.updated_at_ms = now_ms();
        if next == MessageStatus::Completed {
            message.completed_at_ms = Some(message.updated_at_ms);
        }
        debug!("[MessageStore] {} transitioned {} -> {}", id, expected, next);
        Ok(message.clone())
    }

    /// Record an observed confirmation depth for a `Pending` message.
    /// The stored count never decreases; a lower observation is ignored.
    pub async fn record_confirmations(
        &self,
        id: &MessageId,
        observed: u64,
    ) -> BridgeResult<BridgeMessage> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| BridgeError::NotFound(id.clone()))?;
        if message.status != MessageStatus::Pending {
            return Err(BridgeError::Conflict {
                id: id.clone(),
                expected: MessageStatus::Pending,
                actual: message.status,
            });
        }
        if observed > message.confirmations {
            message.confirmations = observed;
            message.updated_at_ms = now_ms();
        }
        Ok(message.clone())
    }

    /// Atomically add a validator signature to a `Processing` message.
    ///
    /// Messages outside `Processing` do not accept signatures: attestations
    /// arriving before confirmation quorum or after finalization begins are
    /// rejected with `UnknownMessage` so validators re-submit later.
    pub async fn add_signature(
        &self,
        id: &MessageId,
        validator: ValidatorId,
        signature: String,
    ) -> BridgeResult<BridgeMessage> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| BridgeError::UnknownMessage(id.clone()))?;
        if message.status != MessageStatus::Processing {
            return Err(BridgeError::UnknownMessage(id.clone()));
        }
        if message.validator_signatures.contains_key(&validator) {
            return Err(BridgeError::DuplicateSignature(validator));
        }
        message.validator_signatures.insert(validator, signature);
        message.updated_at_ms = now_ms();
        Ok(message.clone())
    }

    /// Snapshot of ids currently in the given status
    pub async fn ids_with_status(&self, status: MessageStatus) -> Vec<MessageId> {
        self.messages
            .read()
            .await
            .values()
            .filter(|m| m.status == status)
            .map(|m| m.id.clone())
            .collect()
    }

    pub async fn count_with_status(&self, status: MessageStatus) -> usize {
        self.messages
            .read()
            .await
            .values()
            .filter(|m| m.status == status)
            .count()
    }

    /// Message count for every lifecycle status, including zeroes, taken
    /// under one read lock so the counts are a consistent snapshot.
    pub async fn status_counts(&self) -> Vec<(MessageStatus, usize)> {
        let messages = self.messages.read().await;
        MessageStatus::ALL
            .iter()
            .map(|status| {
                (
                    *status,
                    messages.values().filter(|m| m.status == *status).count(),
                )
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}
