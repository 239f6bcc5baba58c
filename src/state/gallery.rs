use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::state::catalog::CatalogEntry;

/// A drawing that left the "current" slot and now lives in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GalleryEntry {
    /// Positional identifier (`drawing-{n}`), stable for a given catalog position.
    pub id: String,
    /// Artwork shown while this drawing was current.
    #[schema(value_type = String)]
    pub image: CatalogEntry,
    /// Display title, e.g. `Art #3`.
    pub name: String,
    /// Epoch milliseconds at which the drawing was retired.
    pub timestamp: u64,
}

impl GalleryEntry {
    /// Build the entry for the drawing shown at 1-based catalog `number`.
    pub fn positional(
        number: usize,
        image: CatalogEntry,
        title_prefix: &str,
        timestamp: u64,
    ) -> Self {
        Self {
            id: format!("drawing-{number}"),
            image,
            name: format!("{title_prefix} #{number}"),
            timestamp,
        }
    }
}

/// Bounded history of retired drawings, most recent first, unique by id.
#[derive(Debug, Clone)]
pub struct GalleryLedger {
    entries: IndexMap<String, GalleryEntry>,
    max: usize,
}

impl GalleryLedger {
    /// Empty ledger keeping at most `max` entries.
    pub fn new(max: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(max),
            max,
        }
    }

    /// Rebuild a ledger from an ordered (most recent first) list, dropping duplicates and overflow.
    pub fn from_entries(max: usize, entries: impl IntoIterator<Item = GalleryEntry>) -> Self {
        let mut ledger = Self::new(max);
        for entry in entries {
            if ledger.entries.len() >= max {
                break;
            }
            ledger.entries.entry(entry.id.clone()).or_insert(entry);
        }
        ledger
    }

    /// Prepend `entry` unless its id is already present. Returns whether it was inserted.
    pub fn record(&mut self, entry: GalleryEntry) -> bool {
        if self.entries.contains_key(&entry.id) {
            debug!(id = %entry.id, "drawing already in gallery; skipping duplicate");
            return false;
        }

        self.entries.shift_insert(0, entry.id.clone(), entry);
        self.entries.truncate(self.max);
        true
    }

    /// Ordered copy of the ledger for broadcasting.
    pub fn snapshot(&self) -> Vec<GalleryEntry> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn entry(number: usize) -> GalleryEntry {
        GalleryEntry::positional(
            number,
            CatalogEntry::new(format!("/drawings/{number}.png")),
            "Art",
            number as u64,
        )
    }

    #[test]
    fn record_prepends_and_truncates_oldest() {
        let mut ledger = GalleryLedger::new(2);
        assert!(ledger.record(entry(1)));
        assert!(ledger.record(entry(2)));
        assert!(ledger.record(entry(3)));

        let ids = ledger
            .snapshot()
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["drawing-3", "drawing-2"]);
    }

    #[test]
    fn duplicate_id_is_a_no_op() {
        let mut ledger = GalleryLedger::new(5);
        assert!(ledger.record(entry(1)));
        assert!(ledger.record(entry(2)));
        assert!(!ledger.record(entry(1)));

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "drawing-2");
    }

    #[test]
    fn positional_entry_has_stable_id_and_title() {
        let entry = entry(7);
        assert_eq!(entry.id, "drawing-7");
        assert_eq!(entry.name, "Art #7");
    }

    #[test]
    fn from_entries_deduplicates_and_caps() {
        let ledger = GalleryLedger::from_entries(2, vec![entry(3), entry(3), entry(2), entry(1)]);
        let ids = ledger
            .snapshot()
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["drawing-3", "drawing-2"]);
    }

    proptest! {
        #[test]
        fn ledger_stays_unique_and_bounded(
            max in 1usize..25,
            numbers in proptest::collection::vec(1usize..40, 0..200),
        ) {
            let mut ledger = GalleryLedger::new(max);
            for number in numbers {
                ledger.record(entry(number));
                let snapshot = ledger.snapshot();
                prop_assert!(snapshot.len() <= max);
                let ids = snapshot
                    .iter()
                    .map(|entry| entry.id.as_str())
                    .collect::<HashSet<_>>();
                prop_assert_eq!(ids.len(), snapshot.len());
            }
        }
    }
}
