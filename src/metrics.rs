// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_vec_with_registry, HistogramVec,
    IntCounter, IntCounterVec, IntGaugeVec, Registry,
};

const FINE_GRAINED_LATENCY_SEC_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.35, 0.4, 0.45, 0.5, 0.6, 0.7, 0.8, 0.9,
    1.0, 1.2, 1.4, 1.6, 1.8, 2.0, 2.5, 3.0, 3.5, 4.0, 5.0, 6.0, 6.5, 7.0, 7.5, 8.0, 8.5, 9.0, 9.5,
    10., 15., 20., 25., 30., 35., 40., 45., 50., 60., 70., 80., 90., 100., 120., 140., 160., 180.,
    200., 250., 300., 350., 400.,
];

#[derive(Clone, Debug)]
pub struct BridgeMetrics {
    pub(crate) requests_received: IntCounterVec,
    pub(crate) requests_ok: IntCounterVec,
    pub(crate) err_requests: IntCounterVec,
    pub(crate) requests_inflight: IntGaugeVec,

    pub(crate) messages_created: IntCounter,
    pub(crate) messages_by_status: IntGaugeVec,

    pub(crate) confirmation_queries: IntCounterVec,
    pub(crate) confirmation_query_errors: IntCounterVec,
    pub(crate) confirmation_quorum_reached: IntCounter,
    pub(crate) messages_expired_pending: IntCounter,

    pub(crate) attestations_received: IntCounter,
    pub(crate) attestations_accepted: IntCounter,
    pub(crate) attestations_rejected: IntCounterVec,
    pub(crate) signature_quorum_reached: IntCounter,

    pub(crate) finalizations_submitted: IntCounter,
    pub(crate) finalizations_succeeded: IntCounter,
    pub(crate) finalizations_failed: IntCounter,
    pub(crate) finalization_retries: IntCounter,
    pub(crate) finalizations_already_on_chain: IntCounter,
    pub(crate) finalization_latency: HistogramVec,

    pub(crate) batches_assigned: IntCounterVec,
}

impl BridgeMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            requests_received: register_int_counter_vec_with_registry!(
                "bridge_requests_received",
                "Total number of requests received in Server, by request type",
                &["type"],
                registry,
            )
            .unwrap(),
            requests_ok: register_int_counter_vec_with_registry!(
                "bridge_requests_ok",
                "Total number of ok requests, by request type",
                &["type"],
                registry,
            )
            .unwrap(),
            err_requests: register_int_counter_vec_with_registry!(
                "bridge_err_requests",
                "Total number of erred requests, by request type",
                &["type"],
                registry,
            )
            .unwrap(),
            requests_inflight: register_int_gauge_vec_with_registry!(
                "bridge_requests_inflight",
                "Total number of inflight requests, by request type",
                &["type"],
                registry,
            )
            .unwrap(),
            messages_created: register_int_counter_with_registry!(
                "bridge_messages_created",
                "Total number of bridge messages admitted by the transfer endpoint",
                registry,
            )
            .unwrap(),
            messages_by_status: register_int_gauge_vec_with_registry!(
                "bridge_messages_by_status",
                "Current number of messages in each lifecycle status",
                &["status"],
                registry,
            )
            .unwrap(),
            confirmation_queries: register_int_counter_vec_with_registry!(
                "bridge_confirmation_queries",
                "Total number of confirmation depth queries, by source chain",
                &["chain"],
                registry,
            )
            .unwrap(),
            confirmation_query_errors: register_int_counter_vec_with_registry!(
                "bridge_confirmation_query_errors",
                "Total number of failed confirmation depth queries, by source chain",
                &["chain"],
                registry,
            )
            .unwrap(),
            confirmation_quorum_reached: register_int_counter_with_registry!(
                "bridge_confirmation_quorum_reached",
                "Total number of messages that reached source-chain confirmation quorum",
                registry,
            )
            .unwrap(),
            messages_expired_pending: register_int_counter_with_registry!(
                "bridge_messages_expired_pending",
                "Total number of messages failed for exceeding the pending confirmation window",
                registry,
            )
            .unwrap(),
            attestations_received: register_int_counter_with_registry!(
                "bridge_attestations_received",
                "Total number of validator attestations received",
                registry,
            )
            .unwrap(),
            attestations_accepted: register_int_counter_with_registry!(
                "bridge_attestations_accepted",
                "Total number of validator attestations accepted",
                registry,
            )
            .unwrap(),
            attestations_rejected: register_int_counter_vec_with_registry!(
                "bridge_attestations_rejected",
                "Total number of rejected validator attestations, by reason",
                &["reason"],
                registry,
            )
            .unwrap(),
            signature_quorum_reached: register_int_counter_with_registry!(
                "bridge_signature_quorum_reached",
                "Total number of messages that reached validator signature quorum",
                registry,
            )
            .unwrap(),
            finalizations_submitted: register_int_counter_with_registry!(
                "bridge_finalizations_submitted",
                "Total number of finalization transactions submitted to destination chains",
                registry,
            )
            .unwrap(),
            finalizations_succeeded: register_int_counter_with_registry!(
                "bridge_finalizations_succeeded",
                "Total number of finalization transactions confirmed on destination chains",
                registry,
            )
            .unwrap(),
            finalizations_failed: register_int_counter_with_registry!(
                "bridge_finalizations_failed",
                "Total number of messages failed after exhausting finalization retries",
                registry,
            )
            .unwrap(),
            finalization_retries: register_int_counter_with_registry!(
                "bridge_finalization_retries",
                "Total number of finalization submission retries",
                registry,
            )
            .unwrap(),
            finalizations_already_on_chain: register_int_counter_with_registry!(
                "bridge_finalizations_already_on_chain",
                "Total number of finalizations found already confirmed before submission",
                registry,
            )
            .unwrap(),
            finalization_latency: register_histogram_vec_with_registry!(
                "bridge_finalization_latency",
                "Latency from message creation to completed finalization, by destination chain",
                &["chain"],
                FINE_GRAINED_LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            batches_assigned: register_int_counter_vec_with_registry!(
                "bridge_batches_assigned",
                "Total number of messages assigned to a batch, by destination chain",
                &["chain"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}
