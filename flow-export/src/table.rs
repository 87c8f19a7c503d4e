// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The flow table: a sharded, concurrently-accessible `FlowKey -> FlowRecord` map.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::FlowExportError;
use crate::key::FlowKey;
use crate::record::FlowRecord;

/// Maps live flow keys to their accounting state.
///
/// Backed by a [`DashMap`] so fast-path updates to distinct keys proceed
/// without a global lock, matching the choice `nat::stateful::sessions` makes
/// for the same concurrent-access tension. Capacity is enforced logically: an
/// atomic counter is checked before every insert since the map itself would
/// otherwise grow without bound.
#[derive(Debug)]
pub struct FlowTable {
    records: DashMap<FlowKey, FlowRecord>,
    capacity: usize,
    len: AtomicUsize,
}

impl FlowTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: DashMap::new(),
            capacity,
            len: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply one observed packet to the table: update the matching record if
    /// one exists, otherwise insert a new one, subject to `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowExportError::TableFull`] when the key is new and the
    /// table is already at capacity; the caller accounts the packet as
    /// dropped-from-accounting and forwarding continues unaffected.
    pub fn account(&self, key: FlowKey, now_ms: u64, octets: u64) -> Result<(), FlowExportError> {
        match self.records.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().account(now_ms, octets);
                Ok(())
            }
            Entry::Vacant(vacant) => {
                if self.len.load(Ordering::Relaxed) >= self.capacity {
                    return Err(FlowExportError::TableFull {
                        capacity: self.capacity,
                    });
                }
                vacant.insert(FlowRecord::new(now_ms, octets));
                self.len.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, key: &FlowKey) -> Option<FlowRecord> {
        self.records.get(key).map(|r| *r)
    }

    /// Insert or overwrite a record directly; used by tests and by the scanner's rotation path.
    pub fn insert(&self, key: FlowKey, record: FlowRecord) {
        if self.records.insert(key, record).is_none() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a key's record, if present. Idempotent.
    pub fn remove(&self, key: &FlowKey) -> Option<FlowRecord> {
        let removed = self.records.remove(key).map(|(_, record)| record);
        if removed.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Reset a live record's counters in place, keeping the key.
    pub fn reset(&self, key: &FlowKey, now_ms: u64) {
        if let Some(mut record) = self.records.get_mut(key) {
            record.rotate(now_ms);
        }
    }

    /// Snapshot every `(key, record)` pair currently in the table.
    ///
    /// Used by the scanner's first phase; callers must not assume the
    /// snapshot stays current once the fast path resumes.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(FlowKey, FlowRecord)> {
        self.records
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(src_port: u16) -> FlowKey {
        // Constructed indirectly via build_flow_key in key.rs tests; here we
        // only need distinct, reproducible keys, so we go through the public
        // accounting path with synthetic headers in higher-level tests. For
        // table-only tests we rely on FlowKey's Copy/Eq/Hash via round-tripping
        // through build_flow_key is unnecessary: we fabricate keys with the
        // same memory layout via transmute-free construction through the
        // crate's own constructor helper exposed for tests.
        crate::key::test_support::fabricate(src_port)
    }

    #[test]
    fn account_inserts_then_updates() {
        let table = FlowTable::new(16);
        let k = key(1);
        table.account(k, 1000, 100).unwrap();
        table.account(k, 1100, 100).unwrap();
        table.account(k, 1200, 100).unwrap();

        let record = table.lookup(&k).unwrap();
        assert_eq!(record.packet_count, 3);
        assert_eq!(record.octet_count, 300);
        assert_eq!(record.flow_start_ms, 1000);
        assert_eq!(record.flow_end_ms, 1200);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_keys_yield_distinct_records() {
        let table = FlowTable::new(16);
        table.account(key(1), 0, 10).unwrap();
        table.account(key(2), 0, 10).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn table_full_is_reported_and_does_not_insert() {
        let table = FlowTable::new(1);
        table.account(key(1), 0, 10).unwrap();
        let err = table.account(key(2), 0, 10).unwrap_err();
        assert_eq!(err, FlowExportError::TableFull { capacity: 1 });
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let table = FlowTable::new(16);
        let k = key(1);
        table.account(k, 0, 10).unwrap();
        assert!(table.remove(&k).is_some());
        assert!(table.remove(&k).is_none());
        assert!(table.lookup(&k).is_none());
    }
}
