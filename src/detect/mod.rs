// src/detect/mod.rs — New-slot detection against the previous snapshot

pub mod store;

use std::collections::HashSet;
use std::sync::Arc;

use crate::infra::errors::StoreError;
use crate::slots::SlotRecord;
use store::{FingerprintSet, SnapshotStore};

/// Result of comparing a listing's current slots with its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    /// Slots not present last time, in input order, one per fingerprint.
    pub new: Vec<SlotRecord>,
    /// False when the snapshot write failed; the old snapshot is intact
    /// and these slots will be reported again next cycle.
    pub snapshot_updated: bool,
}

pub struct ChangeDetector {
    store: Arc<dyn SnapshotStore>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Compare `current` with the stored snapshot, then replace the
    /// snapshot with `current`'s fingerprints.
    ///
    /// A read failure is returned as an error and nothing is written.
    pub fn diff(&self, listing_id: &str, current: &[SlotRecord]) -> Result<Diff, StoreError> {
        let previous = self.store.load(listing_id)?;
        let cold_start = previous.is_none();
        let previous = previous.unwrap_or_default();

        let mut emitted = HashSet::new();
        let new: Vec<SlotRecord> = current
            .iter()
            .filter(|r| !previous.contains(&r.fingerprint))
            .filter(|r| emitted.insert(r.fingerprint.as_str()))
            .cloned()
            .collect();

        let snapshot: FingerprintSet = current.iter().map(|r| r.fingerprint.clone()).collect();
        let snapshot_updated = match self.store.replace(listing_id, &snapshot) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(listing = listing_id, "Snapshot write failed: {}", e);
                false
            }
        };

        tracing::debug!(
            listing = listing_id,
            current = current.len(),
            previous = previous.len(),
            new = new.len(),
            cold_start,
            "Diff computed"
        );

        Ok(Diff {
            new,
            snapshot_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use store::MemorySnapshotStore;

    fn slot(day: u32, hour: u32) -> SlotRecord {
        SlotRecord::new(
            "r1",
            NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            Some(2),
        )
    }

    fn detector() -> ChangeDetector {
        ChangeDetector::new(Arc::new(MemorySnapshotStore::new()))
    }

    #[test]
    fn test_duplicates_in_input_emitted_once() {
        let d = detector();
        let diff = d.diff("r1", &[slot(1, 18), slot(1, 18), slot(2, 19)]).unwrap();
        assert_eq!(diff.new, vec![slot(1, 18), slot(2, 19)]);
    }

    #[test]
    fn test_order_preserved() {
        let d = detector();
        let diff = d.diff("r1", &[slot(3, 18), slot(1, 18), slot(2, 18)]).unwrap();
        let days: Vec<String> = diff.new.iter().map(|r| r.date_str()).collect();
        assert_eq!(days, vec!["2024-06-03", "2024-06-01", "2024-06-02"]);
    }

    struct FailingWrites(MemorySnapshotStore);

    impl SnapshotStore for FailingWrites {
        fn load(&self, id: &str) -> Result<Option<FingerprintSet>, StoreError> {
            self.0.load(id)
        }
        fn replace(&self, _: &str, _: &FingerprintSet) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn test_write_failure_reports_not_updated() {
        let d = ChangeDetector::new(Arc::new(FailingWrites(MemorySnapshotStore::new())));
        let first = d.diff("r1", &[slot(1, 18)]).unwrap();
        assert!(!first.snapshot_updated);
        // nothing persisted, so the slot is reported again
        let second = d.diff("r1", &[slot(1, 18)]).unwrap();
        assert_eq!(second.new.len(), 1);
    }

    struct FailingReads;

    impl SnapshotStore for FailingReads {
        fn load(&self, _: &str) -> Result<Option<FingerprintSet>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("permission denied")))
        }
        fn replace(&self, _: &str, _: &FingerprintSet) -> Result<(), StoreError> {
            panic!("must not write after a failed read");
        }
    }

    #[test]
    fn test_read_failure_is_error() {
        let d = ChangeDetector::new(Arc::new(FailingReads));
        assert!(d.diff("r1", &[slot(1, 18)]).is_err());
    }
}
