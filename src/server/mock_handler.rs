// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A mock implementation for `BridgeRequestHandlerTrait`
//! that handles requests according to preset behaviors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{BridgeError, BridgeResult};
use crate::types::{
    now_ms, Attestation, BridgeTokenResponse, MessageId, MessageStatus, MessageStatusProjection,
    TransferRequest,
};
use async_trait::async_trait;
use axum::Json;

use super::handler::BridgeRequestHandlerTrait;

#[derive(Clone, Default)]
pub struct BridgeRequestMockHandler {
    bridge_token_error: Arc<Mutex<Option<BridgeError>>>,
    attestation_error: Arc<Mutex<Option<BridgeError>>>,
    status_responses: Arc<Mutex<HashMap<String, BridgeResult<MessageStatusProjection>>>>,
    bridge_token_requests: Arc<Mutex<u64>>,
}

impl BridgeRequestMockHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bridge_token_error(&self, error: BridgeError) {
        *self.bridge_token_error.lock().unwrap() = Some(error);
    }

    pub fn set_attestation_error(&self, error: BridgeError) {
        *self.attestation_error.lock().unwrap() = Some(error);
    }

    pub fn set_status_response(
        &self,
        message_id: &str,
        response: BridgeResult<MessageStatusProjection>,
    ) {
        self.status_responses
            .lock()
            .unwrap()
            .insert(message_id.to_string(), response);
    }

    pub fn bridge_token_requests(&self) -> u64 {
        *self.bridge_token_requests.lock().unwrap()
    }
}

#[async_trait]
impl BridgeRequestHandlerTrait for BridgeRequestMockHandler {
    async fn handle_bridge_token(
        &self,
        _request: TransferRequest,
    ) -> Result<Json<BridgeTokenResponse>, BridgeError> {
        *self.bridge_token_requests.lock().unwrap() += 1;
        if let Some(error) = self.bridge_token_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(Json(BridgeTokenResponse {
            message_id: MessageId::generate(),
            status: MessageStatus::Pending,
            confirmations: 0,
            required_confirmations: 12,
            created_at: now_ms(),
        }))
    }

    async fn handle_message_status(
        &self,
        message_id: String,
    ) -> Result<Json<MessageStatusProjection>, BridgeError> {
        let responses = self.status_responses.lock().unwrap();
        match responses.get(&message_id) {
            Some(Ok(projection)) => Ok(Json(projection.clone())),
            Some(Err(e)) => Err(e.clone()),
            // Ok to panic in test
            None => panic!("No preset status response for message_id: {}", message_id),
        }
    }

    async fn handle_attestation(
        &self,
        attestation: Attestation,
    ) -> Result<Json<MessageStatusProjection>, BridgeError> {
        if let Some(error) = self.attestation_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(Json(MessageStatusProjection {
            message_id: attestation.message_id,
            status: MessageStatus::Processing,
            confirmations: 12,
            required_confirmations: 12,
            signature_count: 1,
            required_signatures: 2,
            batch_id: None,
            dest_tx_hash: None,
            completed_at: None,
            updated_at: now_ms(),
        }))
    }
}
