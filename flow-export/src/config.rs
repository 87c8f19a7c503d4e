// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Startup configuration for the flow accounting and export engine.

use std::net::Ipv4Addr;

use derive_builder::Builder;

/// Default collector port assigned to IPFIX by IANA.
pub const DEFAULT_COLLECTOR_PORT: u16 = 4739;

/// Process-wide, validated startup configuration. Every field has a sane
/// default, so `FlowExportConfigBuilder::default().build()` never fails.
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowExportConfig {
    /// Source IPv4 address stamped on every exported datagram.
    #[builder(setter(into), default = "Ipv4Addr::UNSPECIFIED")]
    pub exporter_ip: Ipv4Addr,

    /// UDP source port used for every exported datagram.
    #[builder(default = "9_995")]
    pub exporter_port: u16,

    /// Collector's IPv4 address.
    #[builder(setter(into), default = "Ipv4Addr::UNSPECIFIED")]
    pub collector_ip: Ipv4Addr,

    /// Collector's UDP port.
    #[builder(default = "DEFAULT_COLLECTOR_PORT")]
    pub collector_port: u16,

    /// A flow with no traffic for this long is idle-expired and removed.
    #[builder(default = "10_000")]
    pub idle_timeout_ms: u64,

    /// A flow still live after this long is active-expired: snapshotted and rotated in place.
    #[builder(default = "30_000")]
    pub active_timeout_ms: u64,

    /// Period between expiration scanner ticks.
    #[builder(default = "10_000")]
    pub scan_period_ms: u64,

    /// IPFIX observation domain ID stamped on every message header.
    #[builder(default = "0")]
    pub observation_domain_id: u32,

    /// Maximum number of live flow records the table will hold concurrently.
    #[builder(default = "1 << 20")]
    pub flow_table_capacity: usize,
}

impl FlowExportConfig {
    #[must_use]
    pub fn builder() -> FlowExportConfigBuilder {
        FlowExportConfigBuilder::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_builder_never_fails() {
        let config = FlowExportConfig::builder().build().unwrap();
        assert_eq!(config.exporter_port, 9_995);
        assert_eq!(config.collector_port, DEFAULT_COLLECTOR_PORT);
        assert_eq!(config.idle_timeout_ms, 10_000);
        assert_eq!(config.active_timeout_ms, 30_000);
        assert_eq!(config.scan_period_ms, 10_000);
        assert_eq!(config.observation_domain_id, 0);
        assert_eq!(config.flow_table_capacity, 1 << 20);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = FlowExportConfig::builder()
            .exporter_ip(Ipv4Addr::new(10, 0, 0, 1))
            .exporter_port(9999u16)
            .collector_ip(Ipv4Addr::new(10, 0, 0, 2))
            .build()
            .unwrap();
        assert_eq!(config.exporter_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(config.exporter_port, 9999);
        assert_eq!(config.collector_ip, Ipv4Addr::new(10, 0, 0, 2));
    }
}
