// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Clock glue: wall-clock milliseconds for flow timestamps, shared with the
//! monotonic scheduler that drives the scan period.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Flow timestamps on the wire are always wall-clock, never monotonic, even
/// though the scan period itself may be driven by a monotonic timer.
#[must_use]
pub fn wall_clock_ms() -> u64 {
    #[allow(clippy::cast_possible_truncation)]
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current wall-clock time in whole seconds since the Unix epoch, the unit
/// the IPFIX message header's `export_time` field uses.
#[must_use]
pub fn wall_clock_secs() -> u32 {
    #[allow(clippy::cast_possible_truncation)]
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wall_clock_is_monotonic_enough_for_a_tight_loop() {
        let first = wall_clock_ms();
        let second = wall_clock_ms();
        assert!(second >= first);
    }

    #[test]
    fn seconds_and_millis_agree() {
        let ms = wall_clock_ms();
        let secs = wall_clock_secs();
        assert!(u64::from(secs) <= ms / 1000 + 1);
    }
}
