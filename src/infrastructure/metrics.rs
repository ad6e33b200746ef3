// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let addr: SocketAddr = "0.0.0.0:9000".parse().expect("Invalid metrics address");

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = builder.with_http_listener(addr).install() {
        tracing::warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!(
        "crawlkeep_sessions_created_total",
        "Engine instances constructed by the session registry"
    );
    describe_counter!(
        "crawlkeep_sessions_removed_total",
        "Sessions explicitly detached from the registry"
    );
    describe_counter!(
        "crawlkeep_sessions_evicted_total",
        "Sessions removed by the idle sweeper"
    );
    describe_counter!(
        "crawlkeep_jobs_resumed_total",
        "Crawl jobs resumed from a checkpoint"
    );
    describe_counter!(
        "crawlkeep_jobs_drained_total",
        "Crawl jobs checkpointed and paused during shutdown"
    );

    info!("Metrics exporter listening on {}", addr);
}
