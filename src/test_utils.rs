// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures and mocks for unit and e2e tests

use crate::adapter::{AdapterError, AdapterRegistry, AdapterResult, ChainAdapter};
use crate::store::MessageStore;
use crate::types::{
    now_ms, BatchId, BridgeMessage, ChainId, MessageId, MessageStatus, TransferRequest,
    ValidatorId,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Chain adapter with preset, per-test behavior
#[derive(Debug)]
pub struct MockChainAdapter {
    chain: ChainId,
    confirmations: Mutex<HashMap<String, u64>>,
    failing_confirmation_queries: Mutex<usize>,
    failing_submissions: Mutex<usize>,
    reject_submissions: Mutex<bool>,
    submissions: Mutex<u64>,
    finalized: Mutex<HashMap<String, String>>,
}

impl MockChainAdapter {
    pub fn new(chain: ChainId) -> Self {
        Self {
            chain,
            confirmations: Mutex::new(HashMap::new()),
            failing_confirmation_queries: Mutex::new(0),
            failing_submissions: Mutex::new(0),
            reject_submissions: Mutex::new(false),
            submissions: Mutex::new(0),
            finalized: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_confirmations(&self, tx_ref: &str, depth: u64) {
        self.confirmations
            .lock()
            .unwrap()
            .insert(tx_ref.to_string(), depth);
    }

    pub fn fail_next_confirmation_queries(&self, count: usize) {
        *self.failing_confirmation_queries.lock().unwrap() = count;
    }

    pub fn fail_next_submissions(&self, count: usize) {
        *self.failing_submissions.lock().unwrap() = count;
    }

    pub fn reject_submissions(&self) {
        *self.reject_submissions.lock().unwrap() = true;
    }

    pub fn submission_count(&self) -> u64 {
        *self.submissions.lock().unwrap()
    }

    /// Simulate a finalization confirmed by a previous run
    pub fn mark_finalized(&self, tx_ref: &str) -> String {
        let tx_hash = format!("0x{}prior{}", self.chain, tx_ref);
        self.finalized
            .lock()
            .unwrap()
            .insert(tx_ref.to_string(), tx_hash.clone());
        tx_hash
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain
    }

    async fn confirmation_count(&self, tx_ref: &str) -> AdapterResult<u64> {
        {
            let mut failing = self.failing_confirmation_queries.lock().unwrap();
            if *failing > 0 {
                *failing = failing.saturating_sub(1);
                return Err(AdapterError::Rpc("injected query failure".to_string()));
            }
        }
        Ok(*self
            .confirmations
            .lock()
            .unwrap()
            .get(tx_ref)
            .unwrap_or(&0))
    }

    async fn submit_finalization(
        &self,
        message: &BridgeMessage,
        _signatures: &BTreeMap<ValidatorId, String>,
    ) -> AdapterResult<String> {
        *self.submissions.lock().unwrap() += 1;
        if *self.reject_submissions.lock().unwrap() {
            return Err(AdapterError::Rejected("injected rejection".to_string()));
        }
        {
            let mut failing = self.failing_submissions.lock().unwrap();
            if *failing > 0 {
                *failing = failing.saturating_sub(1);
                return Err(AdapterError::Rpc("injected submission failure".to_string()));
            }
        }
        let tx_hash = format!("0x{}tx{}", self.chain, message.id);
        self.finalized
            .lock()
            .unwrap()
            .insert(message.id.as_str().to_string(), tx_hash.clone());
        Ok(tx_hash)
    }

    async fn finalized_tx(&self, tx_ref: &str) -> AdapterResult<Option<String>> {
        Ok(self.finalized.lock().unwrap().get(tx_ref).cloned())
    }

    fn validate_address(&self, address: &str) -> bool {
        !address.is_empty()
    }
}

pub fn test_registry() -> AdapterRegistry {
    test_registry_with(vec![
        Arc::new(MockChainAdapter::new(ChainId::Solana)),
        Arc::new(MockChainAdapter::new(ChainId::Bnb)),
    ])
}

pub fn test_registry_with(adapters: Vec<Arc<MockChainAdapter>>) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for adapter in adapters {
        registry.register(adapter);
    }
    registry
}

pub fn test_request() -> TransferRequest {
    TransferRequest {
        source_chain: "solana-devnet".to_string(),
        dest_chain: "bnb-testnet".to_string(),
        token_address: "0xtoken".to_string(),
        amount: 1_000,
        sender: "sender-addr".to_string(),
        recipient: "recipient-addr".to_string(),
        deposit_tx_hash: None,
    }
}

pub fn test_message() -> BridgeMessage {
    let id = MessageId::generate();
    let now = now_ms();
    BridgeMessage {
        source_tx_ref: id.as_str().to_string(),
        id,
        source_chain: ChainId::Solana,
        dest_chain: ChainId::Bnb,
        token_address: "0xtoken".to_string(),
        amount: 1_000,
        sender: "sender-addr".to_string(),
        recipient: "recipient-addr".to_string(),
        status: MessageStatus::Pending,
        confirmations: 0,
        required_confirmations: 12,
        validator_signatures: BTreeMap::new(),
        required_signatures: 2,
        batch_id: None,
        dest_tx_hash: None,
        failure_reason: None,
        created_at_ms: now,
        updated_at_ms: now,
        completed_at_ms: None,
    }
}

pub async fn test_store_with_message() -> (Arc<MessageStore>, MessageId) {
    let store = MessageStore::new();
    let message = store
        .create(test_request(), &test_registry(), |_| 12, 2)
        .await
        .unwrap();
    (store, message.id)
}

pub async fn test_store_with_processing_message() -> (Arc<MessageStore>, MessageId) {
    let (store, id) = test_store_with_message().await;
    store
        .transition(&id, MessageStatus::Pending, MessageStatus::Processing, |m| {
            m.confirmations = m.required_confirmations;
        })
        .await
        .unwrap();
    (store, id)
}

pub async fn test_store_with_ready_message() -> (Arc<MessageStore>, MessageId) {
    let (store, id) = test_store_with_processing_message().await;
    store
        .add_signature(&id, "val-1".to_string(), "sig-1".to_string())
        .await
        .unwrap();
    store
        .add_signature(&id, "val-2".to_string(), "sig-2".to_string())
        .await
        .unwrap();
    store
        .transition(
            &id,
            MessageStatus::Processing,
            MessageStatus::ReadyToFinalize,
            |m| {
                m.batch_id = Some(BatchId::generate());
            },
        )
        .await
        .unwrap();
    (store, id)
}

/// Deterministic validator keypairs for attestation tests
pub mod test_validator {
    use crate::crypto::ValidatorKeyRegistry;
    use crate::types::{Attestation, BridgeMessage};
    use ed25519_dalek::{Signer, SigningKey};
    use sha3::{Digest, Keccak256};
    use std::collections::HashMap;

    /// Keys are derived from the validator id, so the same id always
    /// yields the same keypair across tests.
    pub fn signing_key_for(validator_id: &str) -> SigningKey {
        let mut hasher = Keccak256::new();
        hasher.update(b"test-validator-seed:");
        hasher.update(validator_id.as_bytes());
        let seed: [u8; 32] = hasher.finalize().into();
        SigningKey::from_bytes(&seed)
    }

    pub fn registry_with_signers(
        validator_ids: &[&str],
    ) -> (ValidatorKeyRegistry, HashMap<String, SigningKey>) {
        let mut signers = HashMap::new();
        let mut entries = Vec::new();
        for id in validator_ids {
            let key = signing_key_for(id);
            entries.push((id.to_string(), hex::encode(key.verifying_key().as_bytes())));
            signers.insert(id.to_string(), key);
        }
        let registry = ValidatorKeyRegistry::from_hex_entries(&entries).unwrap();
        (registry, signers)
    }

    pub fn sign(signer: &SigningKey, validator_id: &str, message: &BridgeMessage) -> Attestation {
        let digest = crate::crypto::attestation_digest(message);
        let signature = signer.sign(&digest);
        Attestation {
            message_id: message.id.clone(),
            validator_id: validator_id.to_string(),
            signature: hex::encode(signature.to_bytes()),
        }
    }
}
