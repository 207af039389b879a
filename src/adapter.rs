// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chain adapter trait and adapter registry
//!
//! The relay never constructs chain-specific transactions itself; it
//! delegates to one adapter per supported chain. Any adapter that can answer
//! "how many confirmations does tx X have" and submit a prepared
//! finalization is sufficient, with no assumption of subscription support.

use crate::error::BridgeError;
use crate::types::{BridgeMessage, ChainId, ValidatorId};
use async_trait::async_trait;
use sha3::{Digest, Keccak256};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors surfaced by chain adapters
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction not found: {0}")]
    TxNotFound(String),

    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Whether a retry can reasonably succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Rpc(_) | AdapterError::TxNotFound(_))
    }
}

impl From<AdapterError> for BridgeError {
    fn from(e: AdapterError) -> Self {
        if e.is_transient() {
            BridgeError::AdapterTransient(e.to_string())
        } else {
            BridgeError::AdapterPermanent(e.to_string())
        }
    }
}

/// Per-chain interface over deposit watching and transaction submission
///
/// One instance per supported chain. All methods are I/O bound and may be
/// cancelled on shutdown; cancellation never leaves partial relay state
/// because message transitions happen after the call returns.
#[async_trait]
pub trait ChainAdapter: Send + Sync + Debug {
    /// Chain this adapter serves
    fn chain_id(&self) -> ChainId;

    /// Current confirmation depth of the given transaction reference
    async fn confirmation_count(&self, tx_ref: &str) -> AdapterResult<u64>;

    /// Submit the finalization transaction carrying the accumulated
    /// validator signatures. Returns the destination transaction hash.
    async fn submit_finalization(
        &self,
        message: &BridgeMessage,
        signatures: &BTreeMap<ValidatorId, String>,
    ) -> AdapterResult<String>;

    /// Destination transaction hash of an already-confirmed finalization
    /// for the given reference, if one exists. Used for crash-safe
    /// resubmission checks.
    async fn finalized_tx(&self, tx_ref: &str) -> AdapterResult<Option<String>>;

    /// Chain-specific address format check
    fn validate_address(&self, address: &str) -> bool;
}

/// Adapter backed by the chain's block cadence instead of a live RPC node
///
/// Confirmation depth is derived from how long the deposit reference has
/// been observed, one confirmation per block interval. Finalizations are
/// recorded locally so resubmission checks behave like an on-chain dedup
/// registry. Swapping in a real RPC client is a drop-in replacement behind
/// `ChainAdapter`.
#[derive(Debug)]
pub struct BlockClockAdapter {
    chain: ChainId,
    block_interval: Duration,
    first_seen: Mutex<HashMap<String, Instant>>,
    finalized: Mutex<HashMap<String, String>>,
}

impl BlockClockAdapter {
    pub fn new(chain: ChainId, block_interval: Duration) -> Self {
        Self {
            chain,
            block_interval,
            first_seen: Mutex::new(HashMap::new()),
            finalized: Mutex::new(HashMap::new()),
        }
    }

    /// Typical block cadence of each supported chain
    pub fn default_block_interval(chain: ChainId) -> Duration {
        match chain {
            ChainId::Solana => Duration::from_millis(400),
            ChainId::Bnb => Duration::from_secs(3),
            ChainId::Eth => Duration::from_secs(12),
        }
    }

    fn lock_first_seen(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        match self.first_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_finalized(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.finalized.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ChainAdapter for BlockClockAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain
    }

    async fn confirmation_count(&self, tx_ref: &str) -> AdapterResult<u64> {
        let mut first_seen = self.lock_first_seen();
        let since = *first_seen
            .entry(tx_ref.to_string())
            .or_insert_with(Instant::now);
        Ok((since.elapsed().as_millis() / self.block_interval.as_millis().max(1)) as u64)
    }

    async fn submit_finalization(
        &self,
        message: &BridgeMessage,
        _signatures: &BTreeMap<ValidatorId, String>,
    ) -> AdapterResult<String> {
        let mut finalized = self.lock_finalized();
        if let Some(existing) = finalized.get(message.id.as_str()) {
            return Ok(existing.clone());
        }
        let mut hasher = Keccak256::new();
        hasher.update(self.chain.to_string().as_bytes());
        hasher.update(message.id.as_str().as_bytes());
        let tx_hash = format!("0x{}", hex::encode(hasher.finalize()));
        finalized.insert(message.id.as_str().to_string(), tx_hash.clone());
        Ok(tx_hash)
    }

    async fn finalized_tx(&self, tx_ref: &str) -> AdapterResult<Option<String>> {
        Ok(self.lock_finalized().get(tx_ref).cloned())
    }

    fn validate_address(&self, address: &str) -> bool {
        !address.is_empty() && !address.chars().any(char::is_whitespace)
    }
}

/// Read-only mapping from chain id to its adapter, built once at startup
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) {
        self.adapters.insert(adapter.chain_id(), adapter);
    }

    pub fn get(&self, chain: ChainId) -> Option<Arc<dyn ChainAdapter>> {
        self.adapters.get(&chain).cloned()
    }

    pub fn supports(&self, chain: ChainId) -> bool {
        self.adapters.contains_key(&chain)
    }

    pub fn chains(&self) -> Vec<ChainId> {
        self.adapters.keys().copied().collect()
    }
}
