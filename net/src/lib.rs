#![deny(missing_docs, clippy::all, clippy::pedantic)] // yeah, I'm that guy.  I'm not sorry.
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Do you know where your towel is?
#![deny(unsafe_code)] // narrow, audited exceptions use `#[allow(unsafe_code)]` locally

//! A library for working with and strictly validating network data

#[cfg(all(kani, feature = "_fake_kani"))]
compile_error!("kani should not be used with internal _fake_kani feature.");

pub mod addr_parse_error;
pub mod buffer;
pub mod checksum;
pub mod eth;
pub mod headers;
pub mod icmp4;
pub mod icmp6;
pub mod icmp_any;
pub mod ip;
pub mod ip_auth;
pub mod ipv4;
pub mod ipv6;
pub mod packet;
pub mod parse;
pub mod tcp;
pub mod udp;
pub mod vlan;
pub mod vxlan;
