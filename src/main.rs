// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use bridge_relay::config::BridgeRelayConfig;
use bridge_relay::node::run_bridge_relay;
use bridge_relay::server::BridgeNodePublicMetadata;
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[clap(rename_all = "kebab-case")]
#[clap(name = env!("CARGO_BIN_NAME"))]
#[clap(version = VERSION)]
struct Args {
    #[clap(long)]
    pub config_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = BridgeRelayConfig::load(&args.config_path)?;

    let prometheus_registry = prometheus::Registry::new();
    let metrics_address =
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), config.metrics_port);
    start_metrics_server(metrics_address, prometheus_registry.clone());
    info!("Metrics server started at port {}", config.metrics_port);

    let metadata = BridgeNodePublicMetadata::new(VERSION);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown.cancel();
        }
    });

    let handle = run_bridge_relay(config, metadata, prometheus_registry, cancel).await?;
    handle
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {}", e))?
}

fn start_metrics_server(
    socket_address: SocketAddr,
    registry: prometheus::Registry,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        let router = axum::Router::new().route(
            "/metrics",
            axum::routing::get(move || {
                let registry = registry.clone();
                async move {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();
                    if encoder.encode(&registry.gather(), &mut buffer).is_err() {
                        return (
                            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                            String::new(),
                        );
                    }
                    (
                        axum::http::StatusCode::OK,
                        String::from_utf8_lossy(&buffer).into_owned(),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind(socket_address).await?;
        axum::serve(listener, router.into_make_service()).await?;
        Ok(())
    })
}
