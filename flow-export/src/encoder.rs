// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Converts expired flow records into IPFIX v10 data sets.

use crate::error::FlowExportError;
use crate::key::FlowKey;
use crate::record::FlowRecord;
use crate::template::{RECORD_LEN, TEMPLATE_ID};

/// Set-header width: 2-octet set ID + 2-octet length.
const SET_HEADER_LEN: u16 = 4;

/// Encode one flow's key and record into a single 45-octet data record,
/// written into `out` in the field order the template declares.
///
/// # Errors
///
/// Returns [`FlowExportError::EncodeBufferTooSmall`] if `out` is not exactly
/// [`RECORD_LEN`] octets; unreachable by construction since every call site
/// sizes its buffer to the constant.
fn encode_record(key: &FlowKey, record: &FlowRecord, out: &mut [u8]) -> Result<(), FlowExportError> {
    if out.len() != RECORD_LEN as usize {
        return Err(FlowExportError::EncodeBufferTooSmall {
            need: RECORD_LEN as usize,
            have: out.len(),
        });
    }

    out[0..4].copy_from_slice(&key.src_ip().to_be_bytes());
    out[4..8].copy_from_slice(&key.dst_ip().to_be_bytes());
    out[8] = key.protocol();
    out[9..11].copy_from_slice(&key.src_port().to_be_bytes());
    out[11..13].copy_from_slice(&key.dst_port().to_be_bytes());
    out[13..21].copy_from_slice(&record.flow_start_ms.to_be_bytes());
    out[21..29].copy_from_slice(&record.flow_end_ms.to_be_bytes());
    out[29..37].copy_from_slice(&record.octet_count.to_be_bytes());
    out[37..45].copy_from_slice(&record.packet_count.to_be_bytes());
    Ok(())
}

/// Encode one or more expired flows into a single IPFIX Data Set: a 4-octet
/// set header (`set_id = 1`, `length` including the header) followed by one
/// fixed-width data record per flow.
///
/// # Errors
///
/// Propagates [`FlowExportError::EncodeBufferTooSmall`] from [`encode_record`]; unreachable in practice.
pub fn encode_data_set(flows: &[(FlowKey, FlowRecord)]) -> Result<Vec<u8>, FlowExportError> {
    let body_len = flows.len() * RECORD_LEN as usize;
    let set_len = SET_HEADER_LEN as usize + body_len;
    let mut out = Vec::with_capacity(set_len);

    out.extend_from_slice(&TEMPLATE_ID.to_be_bytes());
    out.extend_from_slice(&(set_len as u16).to_be_bytes());

    let mut record_buf = [0u8; RECORD_LEN as usize];
    for (key, record) in flows {
        encode_record(key, record, &mut record_buf)?;
        out.extend_from_slice(&record_buf);
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::key::build_flow_key;
    use net::eth::Eth;
    use net::eth::ethtype::EthType;
    use net::eth::mac::{DestinationMac, Mac, SourceMac};
    use net::headers::{Headers, Net, Transport};
    use net::ip::NextHeader;
    use net::ipv4::Ipv4;
    use net::ipv4::addr::UnicastIpv4Addr;
    use net::parse::Parse;
    use net::tcp::Tcp;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    /// Hand-assembles a minimal 20-octet TCP header (sport=80, dport=443,
    /// all other fields zero) since `Tcp` exposes no public constructor
    /// outside of parsing real bytes.
    fn tcp_header(sport: u16, dport: u16) -> Tcp {
        let mut bytes = [0u8; 20];
        bytes[0..2].copy_from_slice(&sport.to_be_bytes());
        bytes[2..4].copy_from_slice(&dport.to_be_bytes());
        bytes[12] = 0x50; // data offset = 5 words, no options
        let (tcp, _) = Tcp::parse(&bytes).unwrap();
        tcp
    }

    fn wire_format_scenario_key() -> FlowKey {
        let mut ipv4 = Ipv4::default();
        ipv4.set_source(UnicastIpv4Addr::new(Ipv4Addr::new(1, 2, 3, 4)).unwrap());
        ipv4.set_destination(Ipv4Addr::new(5, 6, 7, 8));
        unsafe {
            ipv4.set_next_header(NextHeader::TCP);
        }

        let tcp = tcp_header(80, 443);

        let mut headers = Headers::new();
        headers.set_eth(Eth::new(
            SourceMac::new(Mac([0x2, 0, 0, 0, 0, 1])).unwrap(),
            DestinationMac::new(Mac([0x2, 0, 0, 0, 0, 2])).unwrap(),
            EthType::IPV4,
        ));
        headers.net = Some(Net::Ipv4(ipv4));
        headers.transport = Some(Transport::Tcp(tcp));

        build_flow_key(&headers).unwrap()
    }

    #[test]
    fn wire_format_matches_scenario_vector() {
        let key = wire_format_scenario_key();
        let record = FlowRecord {
            flow_start_ms: 0x1122_3344,
            flow_end_ms: 0x5566_7788,
            octet_count: 0x0AAA_AAAA,
            packet_count: 0x03,
        };

        let encoded = encode_data_set(&[(key, record)]).unwrap();

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x00, 0x01, 0x00, 0x31,
            0x01, 0x02, 0x03, 0x04,
            0x05, 0x06, 0x07, 0x08,
            0x06,
            0x00, 0x50,
            0x01, 0xBB,
            0x00, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44,
            0x00, 0x00, 0x00, 0x00, 0x55, 0x66, 0x77, 0x88,
            0x00, 0x00, 0x00, 0x00, 0x0A, 0xAA, 0xAA, 0xAA,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03,
        ];

        assert_eq!(encoded, expected);
    }

    #[test]
    fn set_length_accounts_for_multiple_records() {
        let key = wire_format_scenario_key();
        let record = FlowRecord::new(0, 0);
        let encoded = encode_data_set(&[(key, record), (key, record)]).unwrap();
        assert_eq!(encoded.len(), 4 + 2 * 45);
        assert_eq!(u16::from_be_bytes([encoded[2], encoded[3]]), 4 + 2 * 45);
    }

    #[test]
    fn rejects_wrongly_sized_buffer() {
        let key = wire_format_scenario_key();
        let record = FlowRecord::new(0, 0);
        let mut undersized = [0u8; 10];
        let err = encode_record(&key, &record, &mut undersized).unwrap_err();
        assert_eq!(
            err,
            FlowExportError::EncodeBufferTooSmall { need: 45, have: 10 }
        );
    }
}
