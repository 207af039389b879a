// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::types::{MessageId, MessageStatus, ValidatorId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // The transfer request was rejected before any state was created
    InvalidRequest(String),
    // Optimistic-concurrency race: the message was advanced by another
    // worker; contains the status observed at transition time
    Conflict {
        id: MessageId,
        expected: MessageStatus,
        actual: MessageStatus,
    },
    // The referenced message does not exist
    NotFound(MessageId),
    // Attestation references a message that does not exist or is not
    // accepting signatures
    UnknownMessage(MessageId),
    // Attestation signature did not verify against the validator's key
    InvalidSignature(ValidatorId),
    // The validator already contributed a signature for this message
    DuplicateSignature(ValidatorId),
    // The claimed validator is not in the key registry
    UnknownValidator(ValidatorId),
    // Transient chain adapter failure, retried with backoff
    AdapterTransient(String),
    // Non-retryable chain adapter failure
    AdapterPermanent(String),
    // Internal relay error
    InternalError(String),
    // Uncategorized error
    Generic(String),
}

impl BridgeError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::InvalidRequest(_) => "invalid_request",
            BridgeError::Conflict { .. } => "conflict",
            BridgeError::NotFound(_) => "not_found",
            BridgeError::UnknownMessage(_) => "unknown_message",
            BridgeError::InvalidSignature(_) => "invalid_signature",
            BridgeError::DuplicateSignature(_) => "duplicate_signature",
            BridgeError::UnknownValidator(_) => "unknown_validator",
            BridgeError::AdapterTransient(_) => "adapter_transient",
            BridgeError::AdapterPermanent(_) => "adapter_permanent",
            BridgeError::InternalError(_) => "internal_error",
            BridgeError::Generic(_) => "generic",
        }
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            BridgeError::Conflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "transition conflict on {}: expected status {}, found {}",
                id, expected, actual
            ),
            BridgeError::NotFound(id) => write!(f, "message not found: {}", id),
            BridgeError::UnknownMessage(id) => {
                write!(f, "message {} unknown or not accepting attestations", id)
            }
            BridgeError::InvalidSignature(v) => {
                write!(f, "invalid signature from validator {}", v)
            }
            BridgeError::DuplicateSignature(v) => {
                write!(f, "duplicate signature from validator {}", v)
            }
            BridgeError::UnknownValidator(v) => write!(f, "unknown validator {}", v),
            BridgeError::AdapterTransient(msg) => write!(f, "transient adapter error: {}", msg),
            BridgeError::AdapterPermanent(msg) => write!(f, "adapter error: {}", msg),
            BridgeError::InternalError(msg) => write!(f, "internal error: {}", msg),
            BridgeError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

pub type BridgeResult<T> = Result<T, BridgeError>;
