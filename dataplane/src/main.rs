// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

mod args;
mod capture;
mod config;
mod sink;

use std::net::SocketAddr;
use std::sync::Arc;

use args::{CmdArgs, Parser};
use flow_export::FlowExporter;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_env_filter(EnvFilter::new("debug"))
        .init();
}

fn install_metrics(addr: SocketAddr) {
    if let Err(error) = PrometheusBuilder::new().with_http_listener(addr).install() {
        error!(%error, %addr, "failed to install prometheus exporter, metrics will not be served");
        return;
    }
    flow_export::metrics::init_metrics();
    info!(%addr, "prometheus metrics exporter listening");
}

#[tokio::main]
async fn main() {
    init_logging();
    info!("starting flow-export dataplane");

    let (stop_tx, stop_rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || stop_tx.send(()).expect("error sending SIGINT signal"))
        .expect("failed to set SIGINT handler");

    let args = CmdArgs::parse();
    let config = config::resolve(&args);
    info!(?config, "effective configuration");

    install_metrics(args.metrics_address());

    let exporter = Arc::new(FlowExporter::new(config));
    capture::spawn_capture_threads(&args.interfaces(), exporter.table());

    let bind_addr = SocketAddr::from((config.exporter_ip, config.exporter_port));
    let collector_addr = SocketAddr::from((config.collector_ip, config.collector_port));
    let (channel_sink, rx) = sink::ChannelSink::new();
    tokio::spawn(sink::run_writer(bind_addr, collector_addr, rx));

    let scan_period_ms = config.scan_period_ms;
    let tick_exporter = Arc::clone(&exporter);
    let ticker = tokio::spawn(async move {
        tick_exporter.run_periodic(&channel_sink, scan_period_ms).await
    });

    tokio::task::spawn_blocking(move || {
        stop_rx.recv().expect("failed to receive stop signal");
    })
    .await
    .expect("signal-wait task panicked");

    ticker.abort();
    info!("shutting down flow-export dataplane");
}
