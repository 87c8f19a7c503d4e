// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Metric names and registration for the flow accounting and export engine.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Packets successfully accounted on the fast path.
pub const FLOWS_ACCOUNTED_PKTS: &str = "flow_export_accounted_pkts";
/// Octets successfully accounted on the fast path.
pub const FLOWS_ACCOUNTED_BYTES: &str = "flow_export_accounted_octets";
/// Packets dropped from accounting because the table was full.
pub const FLOWS_TABLE_FULL_DROPS: &str = "flow_export_table_full_drops";
/// Live entries currently held by the flow table.
pub const FLOW_TABLE_LEN: &str = "flow_export_table_len";
/// Flows idle-evicted by the expiration scanner.
pub const FLOWS_IDLE_EXPIRED: &str = "flow_export_idle_expired";
/// Flows active-rotated by the expiration scanner.
pub const FLOWS_ACTIVE_EXPIRED: &str = "flow_export_active_expired";
/// IPFIX datagrams successfully handed to the egress sink.
pub const DATAGRAMS_SENT: &str = "flow_export_datagrams_sent";
/// Datagrams dropped from the pending queue after exhausting retries.
pub const DATAGRAMS_DROPPED: &str = "flow_export_datagrams_dropped";

/// Register metric descriptions once at startup.
pub fn init_metrics() {
    describe_counter!(FLOWS_ACCOUNTED_PKTS, "Packets accounted by the flow table");
    describe_counter!(
        FLOWS_ACCOUNTED_BYTES,
        "Octets accounted by the flow table"
    );
    describe_counter!(
        FLOWS_TABLE_FULL_DROPS,
        "Packets dropped from accounting because the flow table was full"
    );
    describe_gauge!(FLOW_TABLE_LEN, "Live entries currently in the flow table");
    describe_counter!(FLOWS_IDLE_EXPIRED, "Flows idle-evicted by the scanner");
    describe_counter!(FLOWS_ACTIVE_EXPIRED, "Flows active-rotated by the scanner");
    describe_counter!(DATAGRAMS_SENT, "IPFIX datagrams handed to the egress sink");
    describe_counter!(
        DATAGRAMS_DROPPED,
        "Datagrams dropped after exhausting the retry budget"
    );
}

pub fn record_accounted(octets: u64) {
    counter!(FLOWS_ACCOUNTED_PKTS).increment(1);
    counter!(FLOWS_ACCOUNTED_BYTES).increment(octets);
}

pub fn record_table_full() {
    counter!(FLOWS_TABLE_FULL_DROPS).increment(1);
}

pub fn record_table_len(len: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!(FLOW_TABLE_LEN).set(len as f64);
}

pub fn record_expirations(idle: usize, active: usize) {
    if idle > 0 {
        counter!(FLOWS_IDLE_EXPIRED).increment(idle as u64);
    }
    if active > 0 {
        counter!(FLOWS_ACTIVE_EXPIRED).increment(active as u64);
    }
}

pub fn record_datagram_sent() {
    counter!(DATAGRAMS_SENT).increment(1);
}

pub fn record_datagram_dropped() {
    counter!(DATAGRAMS_DROPPED).increment(1);
}
