// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Canonical flow identifier, extracted from an observed IPv4 header.

use net::headers::{TryIpv4, TryTcp, TryUdp};

/// A unidirectional flow's identifying 5-tuple, padded to a fixed width so it
/// can key a hash table directly.
///
/// `src_port`/`dst_port` are zero when the protocol is neither TCP nor UDP.
/// Flows are kept directionally distinct: A→B and B→A are different keys.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    src_ip: u32,
    dst_ip: u32,
    protocol: u8,
    _pad0: [u8; 3],
    src_port: u16,
    dst_port: u16,
    _pad1: [u8; 4],
}

const _: () = assert!(core::mem::size_of::<FlowKey>() >= 18);

impl FlowKey {
    #[must_use]
    pub const fn src_ip(&self) -> u32 {
        self.src_ip
    }

    #[must_use]
    pub const fn dst_ip(&self) -> u32 {
        self.dst_ip
    }

    #[must_use]
    pub const fn protocol(&self) -> u8 {
        self.protocol
    }

    #[must_use]
    pub const fn src_port(&self) -> u16 {
        self.src_port
    }

    #[must_use]
    pub const fn dst_port(&self) -> u16 {
        self.dst_port
    }
}

/// Builds a [`FlowKey`] from anything exposing the read-only IPv4 (and, when
/// present, TCP/UDP) accessors `net::headers` provides for parsed packets.
///
/// Returns `None` only when no IPv4 header is present; any other protocol is
/// accepted with both ports set to zero, per the key-builder contract.
pub fn build_flow_key<T>(headers: &T) -> Option<FlowKey>
where
    T: TryIpv4 + TryTcp + TryUdp,
{
    let ipv4 = headers.try_ipv4()?;
    let src_ip = u32::from(ipv4.source().inner());
    let dst_ip = u32::from(ipv4.destination());
    let protocol = ipv4.protocol().0;

    let (src_port, dst_port) = if protocol == etherparse::IpNumber::TCP.0 {
        headers
            .try_tcp()
            .map_or((0, 0), |tcp| (u16::from(tcp.source()), u16::from(tcp.destination())))
    } else if protocol == etherparse::IpNumber::UDP.0 {
        headers
            .try_udp()
            .map_or((0, 0), |udp| (u16::from(udp.source()), u16::from(udp.destination())))
    } else {
        (0, 0)
    };

    Some(FlowKey {
        src_ip,
        dst_ip,
        protocol,
        _pad0: [0; 3],
        src_port,
        dst_port,
        _pad1: [0; 4],
    })
}

/// Test-only key fabrication, for unit tests in sibling modules that need
/// distinct, reproducible keys without routing synthetic packets through
/// [`build_flow_key`].
#[cfg(test)]
pub(crate) mod test_support {
    use super::FlowKey;

    pub(crate) fn fabricate(src_port: u16) -> FlowKey {
        FlowKey {
            src_ip: 0x0a00_0001,
            dst_ip: 0x0a00_0002,
            protocol: 17,
            _pad0: [0; 3],
            src_port,
            dst_port: 53,
            _pad1: [0; 4],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use net::eth::Eth;
    use net::eth::ethtype::EthType;
    use net::eth::mac::{DestinationMac, Mac, SourceMac};
    use net::headers::{Headers, Net, Transport};
    use net::ip::NextHeader;
    use net::ipv4::Ipv4;
    use net::ipv4::addr::UnicastIpv4Addr;
    use net::udp::Udp;
    use net::udp::port::UdpPort;
    use std::net::Ipv4Addr;

    fn udp_headers(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, sport: u16, dport: u16) -> Headers {
        let mut ipv4 = Ipv4::default();
        ipv4.set_source(UnicastIpv4Addr::new(src_ip).unwrap());
        ipv4.set_destination(dst_ip);
        ipv4.set_ttl(64);
        unsafe {
            ipv4.set_next_header(NextHeader::UDP);
        }

        let mut udp = Udp::empty();
        udp.set_source(UdpPort::new_checked(sport).unwrap());
        udp.set_destination(UdpPort::new_checked(dport).unwrap());

        let mut headers = Headers::new();
        headers.set_eth(Eth::new(
            SourceMac::new(Mac([0x2, 0, 0, 0, 0, 1])).unwrap(),
            DestinationMac::new(Mac([0x2, 0, 0, 0, 0, 2])).unwrap(),
            EthType::IPV4,
        ));
        headers.net = Some(Net::Ipv4(ipv4));
        headers.transport = Some(Transport::Udp(udp));
        headers
    }

    #[test]
    fn builds_key_from_udp_headers() {
        let headers = udp_headers(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            1000,
            53,
        );
        let key = build_flow_key(&headers).expect("ipv4 present");
        assert_eq!(key.src_ip(), u32::from(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(key.dst_ip(), u32::from(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(key.protocol(), etherparse::IpNumber::UDP.0);
        assert_eq!(key.src_port(), 1000);
        assert_eq!(key.dst_port(), 53);
    }

    #[test]
    fn directionality_is_preserved() {
        let a_to_b = udp_headers(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            1000,
            80,
        );
        let b_to_a = udp_headers(
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 1),
            80,
            1000,
        );
        let key_a = build_flow_key(&a_to_b).unwrap();
        let key_b = build_flow_key(&b_to_a).unwrap();
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn non_tcp_udp_protocol_zeroes_ports() {
        let mut ipv4 = Ipv4::default();
        ipv4.set_source(UnicastIpv4Addr::new(Ipv4Addr::new(1, 2, 3, 4)).unwrap());
        ipv4.set_destination(Ipv4Addr::new(5, 6, 7, 8));
        unsafe {
            ipv4.set_next_header(NextHeader::ICMP);
        }
        let mut headers = Headers::new();
        headers.net = Some(Net::Ipv4(ipv4));

        let key = build_flow_key(&headers).unwrap();
        assert_eq!(key.src_port(), 0);
        assert_eq!(key.dst_port(), 0);
    }
}
