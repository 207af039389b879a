// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Validator signature aggregator
//!
//! Accepts attestations one at a time, verifies them against the validator
//! key registry, and promotes a message to `ReadyToFinalize` the moment its
//! signature quorum is met. Quorum crossing is a compare-and-transition on
//! the store, so concurrent attestations elect exactly one promotion.

use crate::crypto::{verify_attestation, ValidatorKeyRegistry};
use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use crate::store::MessageStore;
use crate::types::{Attestation, BatchId, BridgeMessage, ChainId, MessageStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Groups ready messages for the same destination chain into shared batches
///
/// Messages becoming ready within `window` of the batch's opening share its
/// id; the first message after the window opens a fresh batch. Batches are
/// a submission-grouping hint only, so the clock here is process-local.
#[derive(Debug)]
pub struct BatchAssigner {
    window: Duration,
    open_batches: Mutex<HashMap<ChainId, (BatchId, Instant)>>,
}

impl BatchAssigner {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            open_batches: Mutex::new(HashMap::new()),
        }
    }

    pub fn assign(&self, chain: ChainId) -> BatchId {
        let mut open = match self.open_batches.lock() {
            Ok(open) => open,
            Err(poisoned) => poisoned.into_inner(),
        };
        match open.get(&chain) {
            Some((batch, opened_at)) if opened_at.elapsed() < self.window => batch.clone(),
            _ => {
                let batch = BatchId::generate();
                open.insert(chain, (batch.clone(), Instant::now()));
                batch
            }
        }
    }
}

pub struct SignatureAggregator {
    store: Arc<MessageStore>,
    keys: ValidatorKeyRegistry,
    batcher: BatchAssigner,
    metrics: Arc<BridgeMetrics>,
}

impl SignatureAggregator {
    pub fn new(
        store: Arc<MessageStore>,
        keys: ValidatorKeyRegistry,
        batch_window: Duration,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            store,
            keys,
            batcher: BatchAssigner::new(batch_window),
            metrics,
        }
    }

    /// Verify and record one attestation, promoting the message when its
    /// quorum is met. Returns the message snapshot after the signature
    /// landed.
    pub async fn handle_attestation(
        &self,
        attestation: Attestation,
    ) -> BridgeResult<BridgeMessage> {
        self.metrics.attestations_received.inc();
        let result = self.handle_attestation_inner(attestation).await;
        match &result {
            Ok(_) => self.metrics.attestations_accepted.inc(),
            Err(e) => {
                self.metrics
                    .attestations_rejected
                    .with_label_values(&[e.error_type()])
                    .inc();
            }
        }
        result
    }

    async fn handle_attestation_inner(
        &self,
        attestation: Attestation,
    ) -> BridgeResult<BridgeMessage> {
        let id = attestation.message_id.clone();
        let message = self
            .store
            .get(&id)
            .await
            .ok_or_else(|| BridgeError::UnknownMessage(id.clone()))?;

        // Verify before touching state; a bad signature must not consume
        // the validator's slot.
        verify_attestation(&self.keys, &message, &attestation).map_err(|e| {
            warn!(
                "[SignatureAggregator] Rejected attestation for {} from {}: {:?}",
                id, attestation.validator_id, e
            );
            e
        })?;

        let updated = self
            .store
            .add_signature(&id, attestation.validator_id.clone(), attestation.signature)
            .await?;
        info!(
            "[SignatureAggregator] {} signature {}/{} from {}",
            id,
            updated.signature_count(),
            updated.required_signatures,
            attestation.validator_id
        );

        if !updated.has_signature_quorum() {
            return Ok(updated);
        }

        let batch = self.batcher.assign(updated.dest_chain);
        let promote = self
            .store
            .transition(
                &id,
                MessageStatus::Processing,
                MessageStatus::ReadyToFinalize,
                |m| {
                    m.batch_id = Some(batch.clone());
                },
            )
            .await;
        match promote {
            Ok(promoted) => {
                info!(
                    "[SignatureAggregator] {} reached signature quorum, ready to finalize in {}",
                    id, batch
                );
                self.metrics.signature_quorum_reached.inc();
                self.metrics
                    .batches_assigned
                    .with_label_values(&[&promoted.dest_chain.to_string()])
                    .inc();
                Ok(promoted)
            }
            // a concurrent attestation crossed quorum first; the signature
            // itself was recorded, so this attestation still succeeded
            Err(BridgeError::Conflict { .. }) => Ok(self
                .store
                .get(&id)
                .await
                .ok_or_else(|| BridgeError::NotFound(id.clone()))?),
            Err(e) => Err(e),
        }
    }
}
