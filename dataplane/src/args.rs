// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![allow(unused)]

pub(crate) use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Command-line configuration for the flow accounting and IPFIX export
/// process. Mirrors the surviving fields of the original gateway
/// dataplane's argument set: no DPDK/EAL parameters, no gRPC management
/// address, no interface driver selection beyond the kernel capture
/// interfaces themselves.
#[derive(Parser)]
#[command(name = "flow-export dataplane")]
#[command(version = "1.0")]
#[command(about = "Flow accounting and IPFIX (NetFlow v10) export", long_about = None)]
pub(crate) struct CmdArgs {
    /// Kernel interfaces to capture packets from. Passing `ANY` captures on
    /// every interface the kernel reports.
    #[arg(long, value_name = "NAME")]
    interface: Vec<String>,

    /// Optional YAML config file providing defaults; CLI flags that are
    /// explicitly passed override the file's values.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "IPV4")]
    exporter_ip: Option<Ipv4Addr>,

    #[arg(long, value_name = "PORT")]
    exporter_port: Option<u16>,

    #[arg(long, value_name = "IPV4")]
    collector_ip: Option<Ipv4Addr>,

    #[arg(long, value_name = "PORT")]
    collector_port: Option<u16>,

    #[arg(long, value_name = "MS")]
    idle_timeout_ms: Option<u64>,

    #[arg(long, value_name = "MS")]
    active_timeout_ms: Option<u64>,

    #[arg(long, value_name = "MS")]
    scan_period_ms: Option<u64>,

    #[arg(long, value_name = "ID")]
    observation_domain_id: Option<u32>,

    #[arg(long, value_name = "N")]
    flow_table_capacity: Option<usize>,

    /// Prometheus metrics server bind address.
    #[arg(
        long,
        value_name = "ADDRESS",
        default_value_t = SocketAddr::from(([127, 0, 0, 1], 9090)),
        help = "Bind address and port for the Prometheus metrics HTTP endpoint"
    )]
    metrics_address: SocketAddr,
}

impl CmdArgs {
    pub(crate) fn interfaces(&self) -> Vec<String> {
        self.interface.clone()
    }

    pub(crate) fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub(crate) fn metrics_address(&self) -> SocketAddr {
        self.metrics_address
    }

    pub(crate) fn exporter_ip(&self) -> Option<Ipv4Addr> {
        self.exporter_ip
    }
    pub(crate) fn exporter_port(&self) -> Option<u16> {
        self.exporter_port
    }
    pub(crate) fn collector_ip(&self) -> Option<Ipv4Addr> {
        self.collector_ip
    }
    pub(crate) fn collector_port(&self) -> Option<u16> {
        self.collector_port
    }
    pub(crate) fn idle_timeout_ms(&self) -> Option<u64> {
        self.idle_timeout_ms
    }
    pub(crate) fn active_timeout_ms(&self) -> Option<u64> {
        self.active_timeout_ms
    }
    pub(crate) fn scan_period_ms(&self) -> Option<u64> {
        self.scan_period_ms
    }
    pub(crate) fn observation_domain_id(&self) -> Option<u32> {
        self.observation_domain_id
    }
    pub(crate) fn flow_table_capacity(&self) -> Option<usize> {
        self.flow_table_capacity
    }
}
