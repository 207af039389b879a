// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Destination-chain finalizer
//!
//! Sweeps `ReadyToFinalize` messages and submits each one's finalization
//! transaction, carrying the aggregated validator signatures, to the
//! destination chain. Exactly-once delivery rests on three guards: the
//! in-flight set keeps one submission per message within this process, the
//! on-chain pre-check catches completions from a previous run, and the
//! final compare-and-transition refuses to complete a message twice.

use crate::adapter::AdapterRegistry;
use crate::error::BridgeError;
use crate::metrics::BridgeMetrics;
use crate::retry::RetryPolicy;
use crate::store::MessageStore;
use crate::types::{now_ms, BridgeMessage, MessageId, MessageStatus};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Finalizer {
    store: Arc<MessageStore>,
    adapters: AdapterRegistry,
    metrics: Arc<BridgeMetrics>,
    retry: RetryPolicy,
    poll_interval: Duration,
    in_flight: Mutex<HashSet<MessageId>>,
}

impl Finalizer {
    pub fn new(
        store: Arc<MessageStore>,
        adapters: AdapterRegistry,
        metrics: Arc<BridgeMetrics>,
        retry: RetryPolicy,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            adapters,
            metrics,
            retry,
            poll_interval,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!("[Finalizer] Starting, poll interval {:?}", self.poll_interval);
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[Finalizer] Shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// Pick up every ready message that is not already being finalized.
    /// Submissions run concurrently; the sweep returns once all of this
    /// round's submissions settle.
    pub async fn sweep_once(self: &Arc<Self>) {
        let ready = self.store.ids_with_status(MessageStatus::ReadyToFinalize).await;
        if ready.is_empty() {
            return;
        }

        let mut tasks = Vec::new();
        for id in ready {
            if !self.claim_in_flight(&id) {
                debug!("[Finalizer] {} already in flight, skipping", id);
                continue;
            }
            let finalizer = self.clone();
            tasks.push(tokio::spawn(async move {
                finalizer.finalize_message(&id).await;
                finalizer.release_in_flight(&id);
            }));
        }
        for task in tasks {
            if let Err(e) = task.await {
                error!("[Finalizer] Finalization task panicked: {:?}", e);
            }
        }
        for (status, count) in self.store.status_counts().await {
            self.metrics
                .messages_by_status
                .with_label_values(&[status.as_label()])
                .set(count as i64);
        }
    }

    fn claim_in_flight(&self, id: &MessageId) -> bool {
        let mut in_flight = match self.in_flight.lock() {
            Ok(in_flight) => in_flight,
            Err(poisoned) => poisoned.into_inner(),
        };
        in_flight.insert(id.clone())
    }

    fn release_in_flight(&self, id: &MessageId) {
        let mut in_flight = match self.in_flight.lock() {
            Ok(in_flight) => in_flight,
            Err(poisoned) => poisoned.into_inner(),
        };
        in_flight.remove(id);
    }

    async fn finalize_message(&self, id: &MessageId) {
        let Some(message) = self.store.get(id).await else {
            return;
        };
        if message.status != MessageStatus::ReadyToFinalize {
            return;
        }
        let Some(adapter) = self.adapters.get(message.dest_chain) else {
            // unreachable after create-time validation
            error!(
                "[Finalizer] No adapter for destination chain {} of {}",
                message.dest_chain, id
            );
            return;
        };

        // Pre-check: a previous run may have submitted and crashed before
        // recording the completion. The message id is the on-chain dedup
        // reference, so this check is authoritative and recovers the
        // destination hash of the earlier submission.
        match adapter.finalized_tx(message.id.as_str()).await {
            Ok(Some(dest_tx_hash)) => {
                info!(
                    "[Finalizer] {} already finalized on chain in tx {}, completing",
                    id, dest_tx_hash
                );
                self.metrics.finalizations_already_on_chain.inc();
                self.complete(&message, dest_tx_hash).await;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("[Finalizer] Pre-check failed for {}: {:?}, will submit", id, e);
            }
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let delay = self.retry.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.metrics.finalizations_submitted.inc();
            match adapter
                .submit_finalization(&message, &message.validator_signatures)
                .await
            {
                Ok(dest_tx_hash) => {
                    info!(
                        "[Finalizer] {} finalized on {} in tx {} (attempt {})",
                        id, message.dest_chain, dest_tx_hash, attempt
                    );
                    self.complete(&message, dest_tx_hash).await;
                    return;
                }
                Err(e) if e.is_transient() && !self.retry.is_exhausted(attempt) => {
                    warn!(
                        "[Finalizer] Submission attempt {} for {} failed: {:?}, retrying",
                        attempt, id, e
                    );
                    self.metrics.finalization_retries.inc();
                }
                Err(e) => {
                    error!(
                        "[Finalizer] Giving up on {} after {} attempts: {:?}",
                        id, attempt, e
                    );
                    self.fail(&message, &e.to_string()).await;
                    return;
                }
            }
        }
    }

    // A completed message always carries its destination hash; recovered
    // completions reuse the hash of the earlier on-chain submission.
    async fn complete(&self, message: &BridgeMessage, dest_tx_hash: String) {
        let result = self
            .store
            .transition(
                &message.id,
                MessageStatus::ReadyToFinalize,
                MessageStatus::Completed,
                |m| {
                    m.dest_tx_hash = Some(dest_tx_hash.clone());
                },
            )
            .await;
        match result {
            Ok(completed) => {
                self.metrics.finalizations_succeeded.inc();
                let elapsed_secs =
                    now_ms().saturating_sub(completed.created_at_ms) as f64 / 1000.0;
                self.metrics
                    .finalization_latency
                    .with_label_values(&[&completed.dest_chain.to_string()])
                    .observe(elapsed_secs);
            }
            // already completed elsewhere, delivery stays exactly-once
            Err(BridgeError::Conflict { .. }) => {}
            Err(e) => {
                error!("[Finalizer] Failed to complete {}: {:?}", message.id, e);
            }
        }
    }

    async fn fail(&self, message: &BridgeMessage, reason: &str) {
        let reason = reason.to_string();
        let result = self
            .store
            .transition(
                &message.id,
                MessageStatus::ReadyToFinalize,
                MessageStatus::Failed,
                |m| {
                    m.failure_reason = Some(reason.clone());
                },
            )
            .await;
        match result {
            Ok(_) => self.metrics.finalizations_failed.inc(),
            Err(BridgeError::Conflict { .. }) => {}
            Err(e) => error!("[Finalizer] Failed to fail {}: {:?}", message.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_registry_with, test_store_with_ready_message, MockChainAdapter};
    use crate::types::ChainId;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            multiplier: 2.0,
        }
    }

    async fn finalizer_with_mock() -> (Arc<Finalizer>, Arc<MessageStore>, Arc<MockChainAdapter>, MessageId)
    {
        let solana = Arc::new(MockChainAdapter::new(ChainId::Solana));
        let bnb = Arc::new(MockChainAdapter::new(ChainId::Bnb));
        let registry = test_registry_with(vec![solana, bnb.clone()]);
        let (store, id) = test_store_with_ready_message().await;
        let finalizer = Finalizer::new(
            store.clone(),
            registry,
            Arc::new(BridgeMetrics::new_for_testing()),
            fast_retry(),
            Duration::from_millis(10),
        );
        (finalizer, store, bnb, id)
    }

    #[tokio::test]
    async fn test_successful_finalization() {
        let (finalizer, store, _, id) = finalizer_with_mock().await;

        finalizer.sweep_once().await;
        let m = store.get(&id).await.unwrap();
        assert_eq!(m.status, MessageStatus::Completed);
        assert!(m.dest_tx_hash.is_some());
        assert!(m.completed_at_ms.is_some());
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let (finalizer, store, bnb, id) = finalizer_with_mock().await;
        bnb.fail_next_submissions(2);

        finalizer.sweep_once().await;
        let m = store.get(&id).await.unwrap();
        assert_eq!(m.status, MessageStatus::Completed);
        assert!(m.dest_tx_hash.is_some());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_message() {
        let (finalizer, store, bnb, id) = finalizer_with_mock().await;
        bnb.fail_next_submissions(usize::MAX);

        finalizer.sweep_once().await;
        let m = store.get(&id).await.unwrap();
        assert_eq!(m.status, MessageStatus::Failed);
        assert!(m.failure_reason.is_some());
        assert!(m.dest_tx_hash.is_none());
        assert_eq!(bnb.submission_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_rejection_fails_immediately() {
        let (finalizer, store, bnb, id) = finalizer_with_mock().await;
        bnb.reject_submissions();

        finalizer.sweep_once().await;
        let m = store.get(&id).await.unwrap();
        assert_eq!(m.status, MessageStatus::Failed);
        assert_eq!(bnb.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_already_on_chain_completes_without_submission() {
        let (finalizer, store, bnb, id) = finalizer_with_mock().await;
        let prior_tx = bnb.mark_finalized(id.as_str());

        finalizer.sweep_once().await;
        let m = store.get(&id).await.unwrap();
        assert_eq!(m.status, MessageStatus::Completed);
        assert_eq!(bnb.submission_count(), 0);
        // the completion carries the hash of the earlier submission
        assert_eq!(m.dest_tx_hash, Some(prior_tx));
    }

    #[tokio::test]
    async fn test_completed_messages_always_carry_dest_tx_hash() {
        let (finalizer, store, bnb, id) = finalizer_with_mock().await;
        bnb.mark_finalized(id.as_str());

        finalizer.sweep_once().await;
        let m = store.get(&id).await.unwrap();
        assert_eq!(m.status, MessageStatus::Completed);
        assert!(
            m.dest_tx_hash.is_some(),
            "completed message has no dest_tx_hash"
        );
    }

    #[tokio::test]
    async fn test_cancellation_leaves_messages_untouched() {
        let solana = Arc::new(MockChainAdapter::new(ChainId::Solana));
        let bnb = Arc::new(MockChainAdapter::new(ChainId::Bnb));
        let registry = test_registry_with(vec![solana, bnb.clone()]);
        // the message is still collecting signatures, so sweeps find nothing
        let (store, id) = crate::test_utils::test_store_with_processing_message().await;
        let finalizer = Finalizer::new(
            store.clone(),
            registry,
            Arc::new(BridgeMetrics::new_for_testing()),
            fast_retry(),
            Duration::from_millis(5),
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(finalizer.clone().run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(25)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            store.get(&id).await.unwrap().status,
            MessageStatus::Processing
        );
        assert_eq!(bnb.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_sweeps_submit_once() {
        let (finalizer, store, bnb, id) = finalizer_with_mock().await;

        finalizer.sweep_once().await;
        finalizer.sweep_once().await;
        finalizer.sweep_once().await;

        assert_eq!(store.get(&id).await.unwrap().status, MessageStatus::Completed);
        assert_eq!(bnb.submission_count(), 1);
    }
}
