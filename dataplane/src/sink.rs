// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Egress glue: a [`DatagramSink`] backed by a bounded `tokio::sync::mpsc`
//! channel, drained by a dedicated UDP socket writer task.

use std::net::SocketAddr;

use flow_export::error::FlowExportError;
use flow_export::{DatagramSink, IpfixDatagram};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Bound on the channel between `FlowExporter::tick` and the UDP writer
/// task. Sized generously relative to `MAX_RECORDS_PER_MESSAGE` chunking;
/// a full channel means the writer task is falling behind the collector.
const CHANNEL_CAPACITY: usize = 64;

/// Pushes assembled datagrams onto a channel for an async writer task to
/// transmit. `send` is synchronous by the `DatagramSink` contract, so a full
/// channel is reported as backpressure rather than awaited.
pub(crate) struct ChannelSink {
    tx: mpsc::Sender<IpfixDatagram>,
}

impl ChannelSink {
    pub(crate) fn new() -> (Self, mpsc::Receiver<IpfixDatagram>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }
}

impl DatagramSink for ChannelSink {
    fn send(&self, datagram: &IpfixDatagram) -> Result<(), FlowExportError> {
        self.tx
            .try_send(datagram.clone())
            .map_err(|_| FlowExportError::TransmitBackpressure {
                attempt: 1,
                max_attempts: 3,
            })
    }
}

/// Drains `rx` onto a UDP socket bound to `bind_addr` and connected to
/// `collector_addr`, so every `send` targets the configured collector
/// without repeating the address on each call.
pub(crate) async fn run_writer(
    bind_addr: SocketAddr,
    collector_addr: SocketAddr,
    mut rx: mpsc::Receiver<IpfixDatagram>,
) {
    let socket = match UdpSocket::bind(bind_addr).await {
        Ok(socket) => socket,
        Err(error) => {
            warn!(%error, %bind_addr, "failed to bind exporter UDP socket, datagrams will be dropped");
            return;
        }
    };
    if let Err(error) = socket.connect(collector_addr).await {
        warn!(%error, %collector_addr, "failed to connect exporter UDP socket, datagrams will be dropped");
        return;
    }

    while let Some(datagram) = rx.recv().await {
        match socket.send(datagram.message_bytes()).await {
            Ok(sent) => debug!(sent, "transmitted ipfix datagram"),
            Err(error) => warn!(%error, "failed to transmit ipfix datagram"),
        }
    }
}
