// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Kernel packet capture: one `AF_PACKET` socket per interface, each read by
//! its own thread and fed straight into a [`FlowAccounter`] instance sharing
//! the process-wide flow table.
//!
//! Trimmed from the original gateway dataplane's kernel driver: there is no
//! outgoing interface here, since flow accounting observes traffic rather
//! than forwarding it, so the dispatcher/worker-sharding machinery built
//! around `oif` selection does not apply. Each interface simply taps its own
//! traffic directly.

use std::io::{self, Read};
use std::sync::Arc;
use std::thread;

use afpacket::sync::RawPacketStream;
use flow_export::FlowAccounter;
use flow_export::table::FlowTable;
use net::buffer::test_buffer::TestBuffer;
use net::packet::Packet;
use net::packet::meta::InterfaceId;
use pipeline::NetworkFunction;
use tracing::{debug, error, warn};

/// Spawn one capture thread per named interface. Interfaces that fail to
/// open are logged and skipped; capture continues on the rest.
pub(crate) fn spawn_capture_threads(interfaces: &[String], table: &Arc<FlowTable>) {
    if interfaces.is_empty() {
        warn!("no interfaces specified; no traffic will be accounted");
        return;
    }

    for (ifindex, name) in interfaces.iter().enumerate() {
        let name = name.clone();
        let table = Arc::clone(table);
        #[allow(clippy::cast_possible_truncation)]
        let ifindex = ifindex as u32;

        let spawned = thread::Builder::new()
            .name(format!("flow-capture-{name}"))
            .spawn(move || capture_loop(ifindex, &name, table));
        if let Err(error) = spawned {
            error!(%error, interface = %name, "failed to spawn capture thread");
        }
    }
}

fn capture_loop(ifindex: u32, name: &str, table: Arc<FlowTable>) {
    let mut sock = match RawPacketStream::new() {
        Ok(sock) => sock,
        Err(error) => {
            error!(%error, interface = name, "failed to open raw packet socket");
            return;
        }
    };
    if let Err(error) = sock.bind(name) {
        error!(%error, interface = name, "failed to bind raw packet socket");
        return;
    }

    let mut accounter = FlowAccounter::new(table);
    let mut raw = [0u8; 2048];

    loop {
        match sock.read(&mut raw) {
            Ok(0) => continue,
            Ok(bytes) => {
                let buf = TestBuffer::from_raw_data(&raw[..bytes]);
                match Packet::new(buf) {
                    Ok(mut packet) => {
                        packet.get_meta_mut().iif = InterfaceId::new(ifindex);
                        // tap only: drain the pipeline's output, nothing is forwarded
                        for _ in accounter.process(std::iter::once(packet)) {}
                    }
                    Err(error) => {
                        debug!(%error, interface = name, "dropped unparseable frame");
                    }
                }
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => continue,
            Err(error) => {
                error!(%error, interface = name, "capture read failed, stopping this interface");
                return;
            }
        }
    }
}
