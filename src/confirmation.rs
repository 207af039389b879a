// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Confirmation tracker
//!
//! Periodically sweeps `Pending` messages, queries each source chain for
//! the current confirmation depth of the deposit, and promotes messages
//! that reached quorum to `Processing`. Depth is polled, never subscribed:
//! a missed sweep only delays promotion, it cannot lose it.

use crate::adapter::AdapterRegistry;
use crate::error::BridgeError;
use crate::metrics::BridgeMetrics;
use crate::retry_with_max_elapsed_time;
use crate::store::MessageStore;
use crate::types::{now_ms, MessageId, MessageStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Cap on how long a single confirmation query may retry internally.
/// Kept short: a query that keeps failing simply defers to the next sweep.
const CONFIRMATION_QUERY_MAX_ELAPSED: Duration = Duration::from_secs(2);

pub struct ConfirmationTracker {
    store: Arc<MessageStore>,
    adapters: AdapterRegistry,
    metrics: Arc<BridgeMetrics>,
    poll_interval: Duration,
    max_pending_wait: Duration,
    query_permits: Arc<Semaphore>,
}

impl ConfirmationTracker {
    pub fn new(
        store: Arc<MessageStore>,
        adapters: AdapterRegistry,
        metrics: Arc<BridgeMetrics>,
        poll_interval: Duration,
        max_pending_wait: Duration,
        max_concurrent_queries: usize,
    ) -> Self {
        Self {
            store,
            adapters,
            metrics,
            poll_interval,
            max_pending_wait,
            query_permits: Arc::new(Semaphore::new(max_concurrent_queries)),
        }
    }

    /// Sweep loop, runs until the token is cancelled
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            "[ConfirmationTracker] Starting, poll interval {:?}",
            self.poll_interval
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[ConfirmationTracker] Shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// Process every currently pending message once. Each message is handled
    /// independently; one failing query never blocks the rest of the sweep.
    pub async fn sweep_once(&self) {
        let pending = self.store.ids_with_status(MessageStatus::Pending).await;
        if pending.is_empty() {
            return;
        }
        debug!("[ConfirmationTracker] Sweeping {} pending messages", pending.len());

        let mut tasks = Vec::with_capacity(pending.len());
        for id in pending {
            let permit = match self.query_permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                // closed only on shutdown
                Err(_) => return,
            };
            let tracker = self.clone_refs();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                tracker.check_message(&id).await;
            }));
        }
        for task in tasks {
            if let Err(e) = task.await {
                error!("[ConfirmationTracker] Sweep task panicked: {:?}", e);
            }
        }
        for (status, count) in self.store.status_counts().await {
            self.metrics
                .messages_by_status
                .with_label_values(&[status.as_label()])
                .set(count as i64);
        }
    }

    fn clone_refs(&self) -> ConfirmationTrackerRefs {
        ConfirmationTrackerRefs {
            store: self.store.clone(),
            adapters: self.adapters.clone(),
            metrics: self.metrics.clone(),
            max_pending_wait: self.max_pending_wait,
        }
    }
}

/// The per-message slice of the tracker, cheap to clone into sweep tasks
#[derive(Clone)]
struct ConfirmationTrackerRefs {
    store: Arc<MessageStore>,
    adapters: AdapterRegistry,
    metrics: Arc<BridgeMetrics>,
    max_pending_wait: Duration,
}

impl ConfirmationTrackerRefs {
    async fn check_message(&self, id: &MessageId) {
        let Some(message) = self.store.get(id).await else {
            return;
        };
        if message.status != MessageStatus::Pending {
            return;
        }

        // A message stuck pending past the deadline is failed, not retried
        // forever.
        let age = now_ms().saturating_sub(message.created_at_ms);
        if age > self.max_pending_wait.as_millis() as u64 {
            warn!(
                "[ConfirmationTracker] Message {} pending for {}ms, failing",
                id, age
            );
            let result = self
                .store
                .transition(id, MessageStatus::Pending, MessageStatus::Failed, |m| {
                    m.failure_reason =
                        Some("confirmation quorum not reached in time".to_string());
                })
                .await;
            match result {
                Ok(_) => self.metrics.messages_expired_pending.inc(),
                Err(BridgeError::Conflict { .. }) => {}
                Err(e) => error!("[ConfirmationTracker] Failed to expire {}: {:?}", id, e),
            }
            return;
        }

        let Some(adapter) = self.adapters.get(message.source_chain) else {
            // unreachable after create-time validation
            error!(
                "[ConfirmationTracker] No adapter for source chain {} of {}",
                message.source_chain, id
            );
            return;
        };

        let chain_label = message.source_chain.to_string();
        self.metrics
            .confirmation_queries
            .with_label_values(&[&chain_label])
            .inc();
        let observed = match retry_with_max_elapsed_time!(
            adapter.confirmation_count(&message.source_tx_ref),
            CONFIRMATION_QUERY_MAX_ELAPSED
        ) {
            Ok(Ok(observed)) => observed,
            Ok(Err(e)) | Err(e) => {
                self.metrics
                    .confirmation_query_errors
                    .with_label_values(&[&chain_label])
                    .inc();
                warn!(
                    "[ConfirmationTracker] Confirmation query failed for {}: {:?}",
                    id, e
                );
                return;
            }
        };

        let updated = match self.store.record_confirmations(id, observed).await {
            Ok(updated) => updated,
            // raced with another transition, next sweep resolves it
            Err(BridgeError::Conflict { .. }) | Err(BridgeError::NotFound(_)) => return,
            Err(e) => {
                error!(
                    "[ConfirmationTracker] Failed to record confirmations for {}: {:?}",
                    id, e
                );
                return;
            }
        };
        debug!(
            "[ConfirmationTracker] {}: {}/{} confirmations",
            id, updated.confirmations, updated.required_confirmations
        );

        if updated.has_confirmation_quorum() {
            let result = self
                .store
                .transition(id, MessageStatus::Pending, MessageStatus::Processing, |_| {})
                .await;
            match result {
                Ok(_) => {
                    info!(
                        "[ConfirmationTracker] {} reached confirmation quorum ({}/{}), now processing",
                        id, updated.confirmations, updated.required_confirmations
                    );
                    self.metrics.confirmation_quorum_reached.inc();
                }
                // another sweep won the promotion, nothing to do
                Err(BridgeError::Conflict { .. }) => {}
                Err(e) => {
                    error!("[ConfirmationTracker] Failed to promote {}: {:?}", id, e);
                }
            }
        }
    }
}
