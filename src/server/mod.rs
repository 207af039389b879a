// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::with_metrics;
use crate::{
    error::BridgeError,
    metrics::BridgeMetrics,
    server::handler::{BridgeRequestHandler, BridgeRequestHandlerTrait},
    types::{Attestation, BridgeTokenResponse, MessageStatusProjection, TransferRequest},
};
use axum::{
    extract::{Path, State},
    Json,
};
use axum::{http::StatusCode, routing::get, routing::post, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, instrument};

pub mod handler;

#[cfg(test)]
pub(crate) mod mock_handler;

pub const APPLICATION_JSON: &str = "application/json";

pub const PING_PATH: &str = "/ping";
pub const BRIDGE_TOKEN_PATH: &str = "/bridge/token";
// axum 0.7 capture syntax
pub const MESSAGE_STATUS_PATH: &str = "/messages/:id/status";
pub const ATTESTATION_PATH: &str = "/attestations";

// Relay's public metadata that is accessible via the `/ping` endpoint.
// Be careful with what to put here, as it is public.
#[derive(serde::Serialize)]
pub struct BridgeNodePublicMetadata {
    pub version: &'static str,
}

impl BridgeNodePublicMetadata {
    pub fn new(version: &'static str) -> Self {
        Self { version }
    }

    pub fn empty_for_testing() -> Self {
        Self { version: "testing" }
    }
}

pub fn run_server(
    socket_address: &SocketAddr,
    handler: BridgeRequestHandler,
    metrics: Arc<BridgeMetrics>,
    metadata: Arc<BridgeNodePublicMetadata>,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    let socket_address = *socket_address;
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(socket_address).await?;
        info!("Bridge relay server listening on {}", socket_address);
        axum::serve(
            listener,
            make_router(Arc::new(handler), metrics, metadata).into_make_service(),
        )
        .await?;
        Ok(())
    })
}

pub(crate) fn make_router(
    handler: Arc<impl BridgeRequestHandlerTrait + Sync + Send + 'static>,
    metrics: Arc<BridgeMetrics>,
    metadata: Arc<BridgeNodePublicMetadata>,
) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route(PING_PATH, get(ping))
        .route(BRIDGE_TOKEN_PATH, post(handle_bridge_token))
        .route(MESSAGE_STATUS_PATH, get(handle_message_status))
        .route(ATTESTATION_PATH, post(handle_attestation))
        .with_state((handler, metrics, metadata))
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            BridgeError::InvalidRequest(_)
            | BridgeError::InvalidSignature(_)
            | BridgeError::UnknownValidator(_)
            | BridgeError::DuplicateSignature(_) => StatusCode::BAD_REQUEST,
            BridgeError::NotFound(_) | BridgeError::UnknownMessage(_) => StatusCode::NOT_FOUND,
            BridgeError::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "type": self.error_type(),
        });
        (status, Json(body)).into_response()
    }
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn ping(
    State((_, _, metadata)): State<(
        Arc<impl BridgeRequestHandlerTrait + Sync + Send>,
        Arc<BridgeMetrics>,
        Arc<BridgeNodePublicMetadata>,
    )>,
) -> Result<Json<Arc<BridgeNodePublicMetadata>>, BridgeError> {
    Ok(Json(metadata))
}

#[instrument(level = "error", skip_all)]
async fn handle_bridge_token(
    State((handler, metrics, _)): State<(
        Arc<impl BridgeRequestHandlerTrait + Sync + Send>,
        Arc<BridgeMetrics>,
        Arc<BridgeNodePublicMetadata>,
    )>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<BridgeTokenResponse>, BridgeError> {
    let future = async {
        let response = handler.handle_bridge_token(request).await?;
        Ok(response)
    };
    with_metrics!(metrics.clone(), "handle_bridge_token", future).await
}

#[instrument(level = "error", skip_all, fields(message_id = message_id))]
async fn handle_message_status(
    Path(message_id): Path<String>,
    State((handler, metrics, _)): State<(
        Arc<impl BridgeRequestHandlerTrait + Sync + Send>,
        Arc<BridgeMetrics>,
        Arc<BridgeNodePublicMetadata>,
    )>,
) -> Result<Json<MessageStatusProjection>, BridgeError> {
    let future = async {
        let response = handler.handle_message_status(message_id).await?;
        Ok(response)
    };
    with_metrics!(metrics.clone(), "handle_message_status", future).await
}

#[instrument(level = "error", skip_all, fields(message_id = %attestation.message_id, validator = %attestation.validator_id))]
async fn handle_attestation(
    State((handler, metrics, _)): State<(
        Arc<impl BridgeRequestHandlerTrait + Sync + Send>,
        Arc<BridgeMetrics>,
        Arc<BridgeNodePublicMetadata>,
    )>,
    Json(attestation): Json<Attestation>,
) -> Result<Json<MessageStatusProjection>, BridgeError> {
    let future = async {
        let response = handler.handle_attestation(attestation).await?;
        Ok(response)
    };
    with_metrics!(metrics.clone(), "handle_attestation", future).await
}

#[macro_export]
macro_rules! with_metrics {
    ($metrics:expr, $type_:expr, $func:expr) => {
        async move {
            info!("Received {} request", $type_);
            $metrics
                .requests_received
                .with_label_values(&[$type_])
                .inc();
            $metrics
                .requests_inflight
                .with_label_values(&[$type_])
                .inc();

            let result = $func.await;

            match &result {
                Ok(_) => {
                    info!("{} request succeeded", $type_);
                    $metrics.requests_ok.with_label_values(&[$type_]).inc();
                }
                Err(e) => {
                    info!("{} request failed: {:?}", $type_, e);
                    $metrics.err_requests.with_label_values(&[$type_]).inc();
                }
            }

            $metrics
                .requests_inflight
                .with_label_values(&[$type_])
                .dec();
            result
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::mock_handler::BridgeRequestMockHandler;
    use crate::test_utils::init_tracing;
    use crate::types::{MessageId, MessageStatus};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router(mock: BridgeRequestMockHandler) -> Router {
        make_router(
            Arc::new(mock),
            Arc::new(BridgeMetrics::new_for_testing()),
            Arc::new(BridgeNodePublicMetadata::empty_for_testing()),
        )
    }

    #[tokio::test]
    async fn test_health_and_ping() {
        init_tracing();
        let router = test_router(BridgeRequestMockHandler::new());

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::builder().uri(PING_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bridge_token_roundtrip() {
        init_tracing();
        let mock = BridgeRequestMockHandler::new();
        let router = test_router(mock);

        let body = serde_json::json!({
            "source_chain": "solana-devnet",
            "dest_chain": "bnb-testnet",
            "token_address": "0xtoken",
            "amount": 1000,
            "sender": "sender-addr",
            "recipient": "recipient-addr",
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(BRIDGE_TOKEN_PATH)
                    .header("content-type", APPLICATION_JSON)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: BridgeTokenResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.status, MessageStatus::Pending);
        assert!(parsed.message_id.as_str().starts_with("msg_"));
    }

    #[tokio::test]
    async fn test_status_not_found_maps_to_404() {
        init_tracing();
        let mock = BridgeRequestMockHandler::new();
        mock.set_status_response(
            "msg_missing",
            Err(BridgeError::NotFound(MessageId("msg_missing".to_string()))),
        );
        let router = test_router(mock);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/messages/msg_missing/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_request_maps_to_400() {
        init_tracing();
        let mock = BridgeRequestMockHandler::new();
        mock.set_bridge_token_error(BridgeError::InvalidRequest("amount must be positive".into()));
        let router = test_router(mock);

        let body = serde_json::json!({
            "source_chain": "solana",
            "dest_chain": "bnb",
            "token_address": "0xtoken",
            "amount": 0,
            "sender": "s",
            "recipient": "r",
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(BRIDGE_TOKEN_PATH)
                    .header("content-type", APPLICATION_JSON)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_attestation_rejection_maps_to_400() {
        init_tracing();
        let mock = BridgeRequestMockHandler::new();
        mock.set_attestation_error(BridgeError::InvalidSignature("val-1".to_string()));
        let router = test_router(mock);

        let body = serde_json::json!({
            "message_id": "msg_abc",
            "validator_id": "val-1",
            "signature": "00ff",
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(ATTESTATION_PATH)
                    .header("content-type", APPLICATION_JSON)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
