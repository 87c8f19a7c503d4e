// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The flow accounter: a fast-path network function that observes every
//! packet and updates the flow table, without ever dropping or mutating it.

use std::sync::Arc;

use net::buffer::PacketBufferMut;
use net::headers::TryIpv4;
use net::packet::Packet;
use pipeline::NetworkFunction;

use crate::clock::wall_clock_ms;
use crate::key::build_flow_key;
use crate::metrics;
use crate::table::FlowTable;

/// Updates the flow table from observed packets, grounded in
/// `pipeline::sample_nfs::InspectHeaders`'s `.inspect()`-based pattern: the
/// forwarding iterator passes through unchanged, flow accounting is a pure
/// side effect.
pub struct FlowAccounter {
    table: Arc<FlowTable>,
}

impl FlowAccounter {
    #[must_use]
    pub fn new(table: Arc<FlowTable>) -> Self {
        Self { table }
    }
}

impl<Buf: PacketBufferMut> NetworkFunction<Buf> for FlowAccounter {
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        input.inspect(move |packet| {
            let Some(key) = build_flow_key(packet) else {
                return;
            };
            let Some(ipv4) = packet.try_ipv4() else {
                return;
            };
            let octets = u64::from(ipv4.total_len());
            let now_ms = wall_clock_ms();

            match self.table.account(key, now_ms, octets) {
                Ok(()) => metrics::record_accounted(octets),
                Err(_) => metrics::record_table_full(),
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use net::packet::test_utils::build_test_udp_ipv4_packet;

    #[test]
    fn accounting_never_drops_packets() {
        let table = Arc::new(FlowTable::new(16));
        let mut accounter = FlowAccounter::new(Arc::clone(&table));

        let packets = vec![
            build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1000, 53),
            build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1000, 53),
        ];
        let out: Vec<_> = accounter.process(packets.into_iter()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_flows_get_distinct_records() {
        let table = Arc::new(FlowTable::new(16));
        let mut accounter = FlowAccounter::new(Arc::clone(&table));

        let packets = vec![
            build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1000, 80),
            build_test_udp_ipv4_packet("10.0.0.2", "10.0.0.1", 80, 1000),
        ];
        let _: Vec<_> = accounter.process(packets.into_iter()).collect();
        assert_eq!(table.len(), 2);
    }
}
