// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Wraps encoded IPFIX data sets in a v10 message header, then in UDP/IPv4
//! transport headers, producing a complete datagram ready for transmission.

use std::num::NonZero;
use std::sync::atomic::{AtomicU32, Ordering};

use net::checksum::Checksum;
use net::ip::NextHeader;
use net::ipv4::Ipv4;
use net::ipv4::addr::UnicastIpv4Addr;
use net::parse::DeParse;
use net::udp::Udp;
use net::udp::port::UdpPort;

use crate::config::FlowExportConfig;
use crate::error::FlowExportError;

/// IPFIX v10 message header width, in octets.
const MESSAGE_HEADER_LEN: usize = 16;
const IPFIX_VERSION: u16 = 10;

/// An assembled IPv4/UDP/IPFIX datagram, ready to hand to a [`crate::exporter::DatagramSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpfixDatagram {
    pub bytes: Vec<u8>,
}

impl IpfixDatagram {
    /// The IPFIX message itself, with the simulated IPv4/UDP transport
    /// headers stripped off.
    ///
    /// Both headers are always fixed-width (no IPv4 options, no UDP payload
    /// checksum), so the prefix length never varies. A sink transmitting
    /// over a real connected UDP socket wants this slice, since the kernel
    /// builds its own transport headers; `bytes` in full is the self-contained
    /// image used for wire-format verification.
    #[must_use]
    pub fn message_bytes(&self) -> &[u8] {
        let prefix = Ipv4::MIN_LEN.get() as usize + Udp::MIN_LENGTH.get() as usize;
        &self.bytes[prefix..]
    }
}

/// Builds complete IPFIX v10 datagrams from already-encoded data sets.
///
/// Owns the process-wide sequence counter mandated by RFC 7011: a
/// monotonically increasing count of previously exported *data records*
/// (not datagrams or messages), reset only on restart. The counter value
/// assigned to a message's header is the value *before* the increment, and
/// the increment advances by the number of data records the message itself
/// carries.
#[derive(Debug)]
pub struct DatagramBuilder {
    sequence_number: AtomicU32,
}

impl Default for DatagramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sequence_number: AtomicU32::new(0),
        }
    }

    /// Wrap one encoded Data Set (one or more data records already rendered
    /// to bytes by [`crate::encoder::encode_data_set`]) in an IPFIX message
    /// header, then a UDP header, then an IPv4 header with a real RFC 791
    /// checksum.
    ///
    /// `records_in_set` is the number of data records the set carries; it
    /// advances the sequence counter by that amount, not by one.
    ///
    /// # Errors
    ///
    /// Returns [`FlowExportError::EncodeBufferTooSmall`] only if internal
    /// invariants about header sizing are violated; unreachable in practice
    /// since both the UDP and IPv4 headers here are always fixed-width
    /// (no options).
    pub fn build(
        &self,
        config: &FlowExportConfig,
        data_set: &[u8],
        records_in_set: u32,
        export_time_secs: u32,
    ) -> Result<IpfixDatagram, FlowExportError> {
        let sequence_number = self
            .sequence_number
            .fetch_add(records_in_set, Ordering::SeqCst);

        let message_len = MESSAGE_HEADER_LEN + data_set.len();
        let mut message = Vec::with_capacity(message_len);
        message.extend_from_slice(&IPFIX_VERSION.to_be_bytes());
        message.extend_from_slice(&(message_len as u16).to_be_bytes());
        message.extend_from_slice(&export_time_secs.to_be_bytes());
        message.extend_from_slice(&sequence_number.to_be_bytes());
        message.extend_from_slice(&config.observation_domain_id.to_be_bytes());
        message.extend_from_slice(data_set);

        let udp_bytes = build_udp(config, &message)?;

        let mut payload = udp_bytes;
        payload.extend_from_slice(&message);

        let ipv4_bytes = build_ipv4(config, payload.len())?;

        let mut datagram = Vec::with_capacity(ipv4_bytes.len() + payload.len());
        datagram.extend_from_slice(&ipv4_bytes);
        datagram.extend_from_slice(&payload);

        Ok(IpfixDatagram { bytes: datagram })
    }
}

fn build_udp(config: &FlowExportConfig, message: &[u8]) -> Result<Vec<u8>, FlowExportError> {
    let source = UdpPort::new_checked(config.exporter_port).map_err(|_| {
        FlowExportError::MalformedHeader {
            reason: "exporter_port must be nonzero",
        }
    })?;
    let destination = UdpPort::new_checked(config.collector_port).map_err(|_| {
        FlowExportError::MalformedHeader {
            reason: "collector_port must be nonzero",
        }
    })?;

    let mut udp = Udp::new(source, destination);
    let total_len = Udp::MIN_LENGTH.get() as usize + message.len();
    let udp_len = u16::try_from(total_len)
        .ok()
        .and_then(NonZero::new)
        .ok_or(FlowExportError::EncodeBufferTooSmall {
            need: total_len,
            have: u16::MAX as usize,
        })?;
    #[allow(unsafe_code)]
    unsafe {
        udp.set_length(udp_len);
    }
    // Checksum left at zero: valid for UDP over IPv4 per RFC 768, and
    // `Udp::deparse` writes only the 8-octet header with no payload checksum.

    let mut buf = vec![0u8; Udp::MIN_LENGTH.get() as usize];
    udp.deparse(&mut buf)
        .map_err(|_| FlowExportError::EncodeBufferTooSmall {
            need: Udp::MIN_LENGTH.get() as usize,
            have: buf.len(),
        })?;
    Ok(buf)
}

fn build_ipv4(config: &FlowExportConfig, udp_payload_len: usize) -> Result<Vec<u8>, FlowExportError> {
    let mut ipv4 = Ipv4::default();
    ipv4.set_source(UnicastIpv4Addr::new(config.exporter_ip).map_err(|_| {
        FlowExportError::MalformedHeader {
            reason: "exporter_ip must not be multicast",
        }
    })?);
    ipv4.set_destination(config.collector_ip);
    ipv4.set_ttl(64);
    #[allow(unsafe_code)]
    unsafe {
        ipv4.set_next_header(NextHeader::UDP);
    }

    let payload_len = u16::try_from(udp_payload_len).map_err(|_| {
        FlowExportError::EncodeBufferTooSmall {
            need: udp_payload_len,
            have: u16::MAX as usize,
        }
    })?;
    ipv4.set_payload_len(payload_len)
        .map_err(|_| FlowExportError::EncodeBufferTooSmall {
            need: payload_len as usize + Ipv4::MIN_LEN.get() as usize,
            have: u16::MAX as usize,
        })?;

    let checksum = ipv4
        .compute_checksum(&())
        .unwrap_or_else(|()| unreachable!("Ipv4::compute_checksum is infallible"));
    ipv4.set_checksum(checksum)
        .unwrap_or_else(|()| unreachable!("Ipv4::set_checksum is infallible"));

    let header_len = Ipv4::MIN_LEN.get() as usize;
    let mut buf = vec![0u8; header_len];
    ipv4.deparse(&mut buf)
        .map_err(|_| FlowExportError::EncodeBufferTooSmall {
            need: header_len,
            have: buf.len(),
        })?;
    Ok(buf)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::FlowExportConfig;
    use crate::encoder::encode_data_set;
    use crate::key::test_support::fabricate;
    use crate::record::FlowRecord;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    fn test_config() -> FlowExportConfig {
        FlowExportConfig::builder()
            .exporter_ip(Ipv4Addr::new(10, 0, 0, 1))
            .exporter_port(9_995u16)
            .collector_ip(Ipv4Addr::new(10, 0, 0, 2))
            .build()
            .unwrap()
    }

    #[test]
    fn builds_well_formed_ipv4_udp_envelope() {
        let config = test_config();
        let data_set = encode_data_set(&[(fabricate(1), FlowRecord::new(0, 10))]).unwrap();
        let builder = DatagramBuilder::new();
        let datagram = builder.build(&config, &data_set, 1, 1_700_000_000).unwrap();

        // version 4, IHL 5
        assert_eq!(datagram.bytes[0] >> 4, 4);
        assert_eq!(datagram.bytes[0] & 0x0F, 5);
        let total_len = u16::from_be_bytes([datagram.bytes[2], datagram.bytes[3]]);
        assert_eq!(total_len as usize, datagram.bytes.len());
        assert_eq!(datagram.bytes[8], 64); // ttl
        assert_eq!(datagram.bytes[9], 17); // protocol = UDP
        assert_eq!(&datagram.bytes[12..16], &[10, 0, 0, 1]);
        assert_eq!(&datagram.bytes[16..20], &[10, 0, 0, 2]);

        let checksum = u16::from_be_bytes([datagram.bytes[10], datagram.bytes[11]]);
        assert_ne!(checksum, 0, "a real RFC 791 checksum must be computed");

        let udp = &datagram.bytes[20..28];
        assert_eq!(u16::from_be_bytes([udp[0], udp[1]]), 9_995);
        assert_eq!(u16::from_be_bytes([udp[2], udp[3]]), 4739);

        let ipfix = &datagram.bytes[28..];
        assert_eq!(u16::from_be_bytes([ipfix[0], ipfix[1]]), 10);
        assert_eq!(datagram.message_bytes(), ipfix);
    }

    #[test]
    fn sequence_counts_records_not_datagrams() {
        let config = test_config();
        let builder = DatagramBuilder::new();
        let record = FlowRecord::new(0, 10);

        let set_one = encode_data_set(&[(fabricate(1), record)]).unwrap();
        let dg1 = builder.build(&config, &set_one, 1, 0).unwrap();

        let set_two = encode_data_set(&[(fabricate(2), record), (fabricate(3), record)]).unwrap();
        let dg2 = builder.build(&config, &set_two, 2, 0).unwrap();

        let set_three = encode_data_set(&[(fabricate(4), record), (fabricate(5), record)]).unwrap();
        let dg3 = builder.build(&config, &set_three, 2, 0).unwrap();

        let seq = |dg: &IpfixDatagram| {
            let ipfix = &dg.bytes[28..];
            u32::from_be_bytes([ipfix[8], ipfix[9], ipfix[10], ipfix[11]])
        };
        assert_eq!(seq(&dg1), 0);
        assert_eq!(seq(&dg2), 1);
        assert_eq!(seq(&dg3), 3);
    }
}
