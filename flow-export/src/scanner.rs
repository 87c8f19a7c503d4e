// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The expiration scanner: the slow path's periodic walk over the flow table.

use tracing::{debug, trace};

use crate::key::FlowKey;
use crate::record::FlowRecord;
use crate::table::FlowTable;

/// Which condition of §4.4 caused a record to expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryKind {
    /// No traffic for `idle_timeout_ms`; the record was removed from the table.
    Idle,
    /// Still live past `active_timeout_ms`; the record was snapshotted and rotated in place.
    Active,
}

/// A flow snapshot pulled out of the table by expiration, paired with the
/// key it belonged to so the encoder can build a complete data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredFlow {
    pub key: FlowKey,
    pub record: FlowRecord,
    pub kind: ExpiryKind,
}

/// Walks the table once, classifying each record as idle-expired,
/// active-expired, or live.
///
/// Two-phase by construction: the table is snapshotted first (dropping any
/// iterator over its shards) and mutated second, avoiding reentrant shard
/// locking in [`FlowTable`]. Idle wins the tie-break when both the idle and
/// active conditions hold; the boundary is strict `<` so a record exactly
/// `idle_timeout_ms` old is not yet expired.
#[tracing::instrument(skip(table), fields(idle_timeout_ms, active_timeout_ms))]
pub fn scan(
    table: &FlowTable,
    now_ms: u64,
    idle_timeout_ms: u64,
    active_timeout_ms: u64,
) -> Vec<ExpiredFlow> {
    let snapshot = table.snapshot();
    trace!(records = snapshot.len(), "scanning flow table");

    let mut idle_expired = Vec::new();
    let mut active_expired = Vec::new();

    for (key, record) in snapshot {
        if record.flow_end_ms.saturating_add(idle_timeout_ms) < now_ms {
            idle_expired.push(ExpiredFlow {
                key,
                record,
                kind: ExpiryKind::Idle,
            });
        } else if record.flow_start_ms.saturating_add(active_timeout_ms) < now_ms {
            active_expired.push(ExpiredFlow {
                key,
                record,
                kind: ExpiryKind::Active,
            });
        }
    }

    for expired in &idle_expired {
        table.remove(&expired.key);
    }
    for expired in &active_expired {
        table.reset(&expired.key, now_ms);
    }

    if !idle_expired.is_empty() || !active_expired.is_empty() {
        debug!(
            idle = idle_expired.len(),
            active = active_expired.len(),
            "flows expired"
        );
    }

    idle_expired.into_iter().chain(active_expired).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::key::test_support::fabricate;

    #[test]
    fn idle_expiry_removes_record() {
        let table = FlowTable::new(16);
        let key = fabricate(1);
        table.account(key, 0, 100).unwrap();

        let expired = scan(&table, 10_001, 10_000, 30_000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].key, key);
        assert_eq!(expired[0].record.packet_count, 1);
        assert!(table.lookup(&key).is_none());
    }

    #[test]
    fn boundary_equal_is_not_expired() {
        let table = FlowTable::new(16);
        let key = fabricate(1);
        table.account(key, 0, 100).unwrap();

        let expired = scan(&table, 10_000, 10_000, 30_000);
        assert!(expired.is_empty());
        assert!(table.lookup(&key).is_some());
    }

    #[test]
    fn active_rotation_keeps_key_resets_counters() {
        let table = FlowTable::new(16);
        let key = fabricate(1);
        table.account(key, 0, 100).unwrap();
        table.account(key, 10_000, 100).unwrap();
        table.account(key, 20_000, 100).unwrap();
        table.account(key, 30_001, 100).unwrap();

        let expired = scan(&table, 30_001, 10_000, 30_000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].record.packet_count, 4);

        let live = table.lookup(&key).unwrap();
        assert_eq!(live.packet_count, 0);
        assert_eq!(live.octet_count, 0);
        assert_eq!(live.flow_start_ms, 30_001);
    }

    #[test]
    fn idle_wins_when_both_conditions_hold() {
        let table = FlowTable::new(16);
        let key = fabricate(1);
        // flow_start_ms = flow_end_ms = 0, so at a far enough now_ms both the
        // idle and active thresholds are exceeded simultaneously.
        table.account(key, 0, 100).unwrap();

        let expired = scan(&table, 100_000, 10_000, 30_000);
        assert_eq!(expired.len(), 1);
        assert!(table.lookup(&key).is_none(), "idle wins: record removed, not rotated");
    }
}
