// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::retry::RetryPolicy;
use crate::types::ChainId;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    // Rpc url for the chain fullnode, used for query stuff and submit transactions.
    pub rpc_url: String,
    // Confirmation depth a deposit must reach before attestation collection starts.
    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: u64,
}

fn default_required_confirmations() -> u64 {
    12
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorEntry {
    pub id: String,
    // Hex-encoded ed25519 public key
    pub public_key: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeRelayConfig {
    // The port that the server listens on.
    pub server_listen_port: u16,
    // The port that for metrics server.
    pub metrics_port: u16,
    // Per-chain settings, keyed by canonical chain name.
    pub chains: BTreeMap<ChainId, ChainConfig>,
    // Signature quorum size for finalization.
    #[serde(default = "default_required_signatures")]
    pub required_signatures: usize,
    // Validator set whose attestations are accepted.
    pub validators: Vec<ValidatorEntry>,
    // How often the confirmation tracker sweeps pending messages.
    #[serde(default = "default_confirmation_poll_interval_ms")]
    pub confirmation_poll_interval_ms: u64,
    // A message still pending after this long is failed.
    #[serde(default = "default_max_pending_wait_ms")]
    pub max_pending_wait_ms: u64,
    // Window during which ready messages for the same destination chain
    // share a batch id.
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
    // How often the finalizer sweeps ready messages.
    #[serde(default = "default_finalizer_poll_interval_ms")]
    pub finalizer_poll_interval_ms: u64,
    // Maximum concurrent source-chain confirmation queries.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_confirmation_queries: usize,
    #[serde(default)]
    pub finalizer_retry: RetryPolicy,
}

fn default_required_signatures() -> usize {
    2
}

fn default_confirmation_poll_interval_ms() -> u64 {
    2_000
}

fn default_max_pending_wait_ms() -> u64 {
    30 * 60 * 1_000
}

fn default_batch_window_ms() -> u64 {
    10_000
}

fn default_finalizer_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_concurrent_queries() -> usize {
    16
}

impl BridgeRelayConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Unable to parse config file {}", path.display()))?;
        config.validate()?;
        info!(
            "Loaded config from {}: {} chains, {} validators, quorum {}",
            path.display(),
            config.chains.len(),
            config.validators.len(),
            config.required_signatures
        );
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chains.is_empty() {
            anyhow::bail!("at least one chain must be configured");
        }
        if self.required_signatures == 0 {
            anyhow::bail!("required-signatures must be at least 1");
        }
        if self.validators.len() < self.required_signatures {
            anyhow::bail!(
                "validator set of {} cannot satisfy quorum of {}",
                self.validators.len(),
                self.required_signatures
            );
        }
        let mut seen = std::collections::HashSet::new();
        for v in &self.validators {
            if !seen.insert(v.id.as_str()) {
                anyhow::bail!("duplicate validator id: {}", v.id);
            }
        }
        Ok(())
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms)
    }

    pub fn max_pending_wait(&self) -> Duration {
        Duration::from_millis(self.max_pending_wait_ms)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn finalizer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.finalizer_poll_interval_ms)
    }

    pub fn required_confirmations_for(&self, chain: ChainId) -> u64 {
        self.chains
            .get(&chain)
            .map(|c| c.required_confirmations)
            .unwrap_or_else(default_required_confirmations)
    }

    pub fn validator_key_entries(&self) -> Vec<(String, String)> {
        self.validators
            .iter()
            .map(|v| (v.id.clone(), v.public_key.clone()))
            .collect()
    }
}
