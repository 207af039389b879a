// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Attestation digests and validator signature verification

use crate::error::{BridgeError, BridgeResult};
use crate::types::{Attestation, BridgeMessage, ValidatorId};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;

/// Domain separator prepended to every attestation digest
const ATTESTATION_DOMAIN: &[u8] = b"BRIDGE_TOKEN_TRANSFER_V1";

/// Canonical digest a validator signs to attest a transfer
///
/// Binds the message id and the full transfer payload so a signature can
/// never be replayed for a different message, route, token or amount.
pub fn attestation_digest(msg: &BridgeMessage) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(ATTESTATION_DOMAIN);
    hasher.update(msg.id.as_str().as_bytes());
    hasher.update([msg.source_chain as u8]);
    hasher.update([msg.dest_chain as u8]);
    hasher.update(msg.token_address.as_bytes());
    hasher.update(msg.amount.to_be_bytes());
    hasher.update(msg.recipient.as_bytes());
    hasher.finalize().into()
}

/// Read-only registry of validator public keys
///
/// Built once at startup from configuration and shared across all
/// verifications without locking. Validator set rotation is an external
/// configuration swap, not a runtime mutation.
#[derive(Debug, Clone, Default)]
pub struct ValidatorKeyRegistry {
    keys: BTreeMap<ValidatorId, VerifyingKey>,
}

impl ValidatorKeyRegistry {
    pub fn new() -> Self {
        Self {
            keys: BTreeMap::new(),
        }
    }

    /// Build a registry from (validator id, hex-encoded ed25519 public key)
    /// pairs. Fails on malformed keys or duplicate validator ids.
    pub fn from_hex_entries(entries: &[(String, String)]) -> anyhow::Result<Self> {
        let mut keys = BTreeMap::new();
        for (id, key_hex) in entries {
            let bytes = hex::decode(key_hex.trim_start_matches("0x"))
                .map_err(|e| anyhow::anyhow!("validator {}: bad key hex: {}", id, e))?;
            let arr: [u8; 32] = bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("validator {}: key must be 32 bytes", id))?;
            let key = VerifyingKey::from_bytes(&arr)
                .map_err(|e| anyhow::anyhow!("validator {}: invalid ed25519 key: {}", id, e))?;
            if keys.insert(id.clone(), key).is_some() {
                anyhow::bail!("duplicate validator id in registry: {}", id);
            }
        }
        Ok(Self { keys })
    }

    pub fn public_key_of(&self, validator_id: &str) -> Option<&VerifyingKey> {
        self.keys.get(validator_id)
    }

    pub fn contains(&self, validator_id: &str) -> bool {
        self.keys.contains_key(validator_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Verify an attestation against the registry and the message it claims to
/// attest. Returns `UnknownValidator` if the signer is not registered and
/// `InvalidSignature` if the signature does not verify over the canonical
/// digest.
pub fn verify_attestation(
    registry: &ValidatorKeyRegistry,
    msg: &BridgeMessage,
    attestation: &Attestation,
) -> BridgeResult<()> {
    let key = registry
        .public_key_of(&attestation.validator_id)
        .ok_or_else(|| BridgeError::UnknownValidator(attestation.validator_id.clone()))?;

    let sig_bytes = hex::decode(attestation.signature.trim_start_matches("0x"))
        .map_err(|_| BridgeError::InvalidSignature(attestation.validator_id.clone()))?;
    let sig_arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| BridgeError::InvalidSignature(attestation.validator_id.clone()))?;
    let signature = Signature::from_bytes(&sig_arr);

    let digest = attestation_digest(msg);
    key.verify(&digest, &signature)
        .map_err(|_| BridgeError::InvalidSignature(attestation.validator_id.clone()))
}
