// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The IPFIX v10 template registry: a single, immutable template describing
//! every exported data record.

/// One field of the active template: its IPFIX information element ID and
/// its fixed on-wire width in octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ipfix_id: u16,
    pub len: u16,
}

/// This core emits exactly one template, ID 1, whose nine fields and their
/// order and widths are fixed. Retransmitting the template set to the
/// collector is out of scope; this table only drives encoding.
pub const TEMPLATE_ID: u16 = 1;

pub const FIELDS: [FieldDescriptor; 9] = [
    FieldDescriptor {
        name: "sourceIPv4Address",
        ipfix_id: 8,
        len: 4,
    },
    FieldDescriptor {
        name: "destinationIPv4Address",
        ipfix_id: 12,
        len: 4,
    },
    FieldDescriptor {
        name: "protocolIdentifier",
        ipfix_id: 4,
        len: 1,
    },
    FieldDescriptor {
        name: "sourceTransportPort",
        ipfix_id: 7,
        len: 2,
    },
    FieldDescriptor {
        name: "destinationTransportPort",
        ipfix_id: 11,
        len: 2,
    },
    FieldDescriptor {
        name: "flowStartMilliseconds",
        ipfix_id: 152,
        len: 8,
    },
    FieldDescriptor {
        name: "flowEndMilliseconds",
        ipfix_id: 153,
        len: 8,
    },
    FieldDescriptor {
        name: "octetDeltaCount",
        ipfix_id: 1,
        len: 8,
    },
    FieldDescriptor {
        name: "packetDeltaCount",
        ipfix_id: 2,
        len: 8,
    },
];

/// Fixed width, in octets, of one data record under the active template.
pub const RECORD_LEN: u16 = {
    let mut total = 0u16;
    let mut i = 0;
    while i < FIELDS.len() {
        total += FIELDS[i].len;
        i += 1;
    }
    total
};

const _: () = assert!(RECORD_LEN == 45);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_len_matches_field_table() {
        let sum: u16 = FIELDS.iter().map(|f| f.len).sum();
        assert_eq!(sum, RECORD_LEN);
        assert_eq!(RECORD_LEN, 45);
    }

    #[test]
    fn field_order_matches_specification() {
        let ids: Vec<u16> = FIELDS.iter().map(|f| f.ipfix_id).collect();
        assert_eq!(ids, vec![8, 12, 4, 7, 11, 152, 153, 1, 2]);
    }
}
