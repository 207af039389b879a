// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::adapter::{AdapterRegistry, BlockClockAdapter};
use crate::aggregator::SignatureAggregator;
use crate::config::BridgeRelayConfig;
use crate::confirmation::ConfirmationTracker;
use crate::crypto::ValidatorKeyRegistry;
use crate::finalizer::Finalizer;
use crate::metrics::BridgeMetrics;
use crate::server::{handler::BridgeRequestHandler, run_server, BridgeNodePublicMetadata};
use crate::store::MessageStore;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wire up the store, workers and server, and return the server handle.
///
/// The cancellation token fans out to every background worker; cancelling
/// it drains the relay while the server handle keeps serving status reads.
pub async fn run_bridge_relay(
    config: BridgeRelayConfig,
    metadata: BridgeNodePublicMetadata,
    prometheus_registry: prometheus::Registry,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
    let config = Arc::new(config);
    let metrics = Arc::new(BridgeMetrics::new(&prometheus_registry));

    let keys = ValidatorKeyRegistry::from_hex_entries(&config.validator_key_entries())?;
    info!("Loaded {} validator keys", keys.len());

    let mut adapters = AdapterRegistry::new();
    for chain in config.chains.keys().copied() {
        adapters.register(Arc::new(BlockClockAdapter::new(
            chain,
            BlockClockAdapter::default_block_interval(chain),
        )));
    }
    info!("Registered adapters for chains: {:?}", adapters.chains());

    let store = MessageStore::new();
    let aggregator = Arc::new(SignatureAggregator::new(
        store.clone(),
        keys,
        config.batch_window(),
        metrics.clone(),
    ));

    let tracker = Arc::new(ConfirmationTracker::new(
        store.clone(),
        adapters.clone(),
        metrics.clone(),
        config.confirmation_poll_interval(),
        config.max_pending_wait(),
        config.max_concurrent_confirmation_queries,
    ));
    tokio::spawn(tracker.run(cancel.clone()));

    let finalizer = Finalizer::new(
        store.clone(),
        adapters.clone(),
        metrics.clone(),
        config.finalizer_retry.clone(),
        config.finalizer_poll_interval(),
    );
    tokio::spawn(finalizer.run(cancel.clone()));

    let socket_address = SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
        config.server_listen_port,
    );
    Ok(run_server(
        &socket_address,
        BridgeRequestHandler::new(store, adapters, aggregator, config, metrics.clone()),
        metrics,
        Arc::new(metadata),
    ))
}
