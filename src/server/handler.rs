// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::adapter::AdapterRegistry;
use crate::aggregator::SignatureAggregator;
use crate::config::BridgeRelayConfig;
use crate::error::BridgeError;
use crate::metrics::BridgeMetrics;
use crate::store::MessageStore;
use crate::types::{
    Attestation, BridgeTokenResponse, MessageId, MessageStatusProjection, TransferRequest,
};
use async_trait::async_trait;
use axum::Json;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait BridgeRequestHandlerTrait {
    // Handles a request to bridge tokens across chains. Validates the
    // transfer and admits it as a new pending message.
    async fn handle_bridge_token(
        &self,
        request: TransferRequest,
    ) -> Result<Json<BridgeTokenResponse>, BridgeError>;
    // Handles a status query for a previously admitted message.
    async fn handle_message_status(
        &self,
        message_id: String,
    ) -> Result<Json<MessageStatusProjection>, BridgeError>;
    // Handles an incoming validator attestation for a message awaiting
    // signature quorum.
    async fn handle_attestation(
        &self,
        attestation: Attestation,
    ) -> Result<Json<MessageStatusProjection>, BridgeError>;
}

pub struct BridgeRequestHandler {
    store: Arc<MessageStore>,
    adapters: AdapterRegistry,
    aggregator: Arc<SignatureAggregator>,
    config: Arc<BridgeRelayConfig>,
    metrics: Arc<BridgeMetrics>,
}

impl BridgeRequestHandler {
    pub fn new(
        store: Arc<MessageStore>,
        adapters: AdapterRegistry,
        aggregator: Arc<SignatureAggregator>,
        config: Arc<BridgeRelayConfig>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            store,
            adapters,
            aggregator,
            config,
            metrics,
        }
    }
}

#[async_trait]
impl BridgeRequestHandlerTrait for BridgeRequestHandler {
    async fn handle_bridge_token(
        &self,
        request: TransferRequest,
    ) -> Result<Json<BridgeTokenResponse>, BridgeError> {
        let config = self.config.clone();
        let message = self
            .store
            .create(
                request,
                &self.adapters,
                |chain| config.required_confirmations_for(chain),
                config.required_signatures,
            )
            .await?;
        self.metrics.messages_created.inc();
        info!(
            "[BridgeRequestHandler] Admitted transfer {}: {} -> {}",
            message.id, message.source_chain, message.dest_chain
        );
        Ok(Json(BridgeTokenResponse {
            message_id: message.id,
            status: message.status,
            confirmations: message.confirmations,
            required_confirmations: message.required_confirmations,
            created_at: message.created_at_ms,
        }))
    }

    async fn handle_message_status(
        &self,
        message_id: String,
    ) -> Result<Json<MessageStatusProjection>, BridgeError> {
        let id = MessageId(message_id);
        let message = self
            .store
            .get(&id)
            .await
            .ok_or_else(|| BridgeError::NotFound(id))?;
        Ok(Json(MessageStatusProjection::from(&message)))
    }

    async fn handle_attestation(
        &self,
        attestation: Attestation,
    ) -> Result<Json<MessageStatusProjection>, BridgeError> {
        let message = self.aggregator.handle_attestation(attestation).await?;
        Ok(Json(MessageStatusProjection::from(&message)))
    }
}
