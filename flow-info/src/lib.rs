// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub mod flow_info;
pub mod flow_info_item;

pub use atomic_instant_full::AtomicInstant;
pub use flow_info::*;
pub use flow_info_item::*;
