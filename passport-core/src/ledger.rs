//! The stamp ledger: which landmarks the visitor has collected.
use serde::{Deserialize, Serialize};

use crate::content::{Content, RegionId};
use crate::storage::{KeyValueStore, StorageError};

/// Ordered set of collected landmark ids.
///
/// Insertion order is kept for display; duplicates are never stored. Ids that
/// no longer exist in the loaded content are kept but resolve to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StampLedger {
    ids: Vec<String>,
}

impl StampLedger {
    #[must_use]
    pub const fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Build a ledger from ids, dropping blanks and repeats.
    #[must_use]
    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut ledger = Self::new();
        for id in ids {
            ledger.collect(id);
        }
        ledger
    }

    #[must_use]
    pub fn has_stamp(&self, landmark_id: &str) -> bool {
        self.ids.iter().any(|id| id == landmark_id)
    }

    /// Record a stamp. Returns `false` when it was already present (or blank),
    /// in which case nothing changed and nothing needs persisting.
    pub fn collect(&mut self, landmark_id: impl Into<String>) -> bool {
        let id = landmark_id.into();
        if id.trim().is_empty() || self.has_stamp(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Empty the ledger. Returns `false` when it was already empty.
    pub fn reset_all(&mut self) -> bool {
        if self.ids.is_empty() {
            return false;
        }
        self.ids.clear();
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.ids.iter()
    }

    /// Number of stamps that resolve to a landmark in `content`.
    #[must_use]
    pub fn resolved_len(&self, content: &Content) -> usize {
        self.ids
            .iter()
            .filter(|id| content.contains_landmark(id))
            .count()
    }

    /// Write the ledger under `key` as a JSON array of ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be encoded or the store rejects it.
    pub fn persist<S>(&self, store: &S, key: &str) -> Result<(), StorageError>
    where
        S: KeyValueStore + ?Sized,
    {
        let encoded = serde_json::to_string(&self.ids)?;
        store.set(key, &encoded)
    }

    /// Read the ledger stored under `key`. Missing, unreadable, or malformed
    /// data yields an empty ledger.
    #[must_use]
    pub fn restore<S>(store: &S, key: &str) -> Self
    where
        S: KeyValueStore + ?Sized,
    {
        let raw = match store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::new(),
            Err(err) => {
                log::warn!("stamp ledger unreadable ({err}); starting empty");
                return Self::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Self::from_ids(ids),
            Err(err) => {
                log::warn!("stamp ledger malformed ({err}); starting empty");
                Self::new()
            }
        }
    }
}

impl<'a> IntoIterator for &'a StampLedger {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Display code printed under a landmark's collect action, e.g. `TW-NOR-TAI`.
#[must_use]
pub fn stamp_code(region: RegionId, landmark_id: &str) -> String {
    let region_part: String = region.as_str().chars().take(3).collect();
    let landmark_part: String = landmark_id.chars().take(3).collect();
    format!(
        "TW-{}-{}",
        region_part.to_uppercase(),
        landmark_part.to_uppercase()
    )
}

/// A collected stamp resolved against the loaded content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StampEntry {
    pub landmark_id: String,
    pub name: String,
    pub region: RegionId,
    pub accent_color: String,
    pub code: String,
}

/// What the passport book shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassportView {
    pub stamps: Vec<StampEntry>,
    pub required: usize,
}

impl PassportView {
    #[must_use]
    pub fn build(ledger: &StampLedger, content: &Content, required: usize) -> Self {
        let stamps = ledger
            .iter()
            .filter_map(|id| {
                let region = content.region_of(id)?;
                let landmark = region.landmarks.iter().find(|l| &l.id == id)?;
                Some(StampEntry {
                    landmark_id: landmark.id.clone(),
                    name: landmark.name.clone(),
                    region: region.id,
                    accent_color: region.accent_color.clone(),
                    code: stamp_code(region.id, &landmark.id),
                })
            })
            .collect();
        Self { stamps, required }
    }

    #[must_use]
    pub fn collected(&self) -> usize {
        self.stamps.len()
    }

    #[must_use]
    pub fn empty_slots(&self) -> usize {
        self.required.saturating_sub(self.stamps.len())
    }

    /// Completion in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.required == 0 {
            return 1.0;
        }
        let collected = u32::try_from(self.collected()).unwrap_or(u32::MAX);
        let required = u32::try_from(self.required).unwrap_or(u32::MAX);
        (f64::from(collected) / f64::from(required)).min(1.0)
    }

    /// Regions with at least one stamp, in display order.
    #[must_use]
    pub fn regions_visited(&self) -> Vec<RegionId> {
        let mut visited: Vec<RegionId> = self.stamps.iter().map(|s| s.region).collect();
        visited.sort_unstable();
        visited.dedup();
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const KEY: &str = "tw_odyssey_stamps";

    #[test]
    fn collect_is_idempotent() {
        let mut once = StampLedger::new();
        assert!(once.collect("taipei-101"));

        let mut twice = StampLedger::new();
        twice.collect("taipei-101");
        assert!(!twice.collect("taipei-101"));

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
        assert!(!twice.collect("  "));
    }

    #[test]
    fn iteration_follows_collection_order() {
        let mut ledger = StampLedger::new();
        ledger.collect("penghu");
        ledger.collect("taipei-101");
        ledger.collect("penghu");
        let ids: Vec<&str> = ledger.iter().map(String::as_str).collect();
        assert_eq!(ids, ["penghu", "taipei-101"]);
        assert_eq!((&ledger).into_iter().count(), 2);
    }

    #[test]
    fn reset_empties_and_reports_change() {
        let mut ledger = StampLedger::from_ids(["a", "b"]);
        assert!(ledger.reset_all());
        assert!(ledger.is_empty());
        assert!(!ledger.reset_all());
    }

    #[test]
    fn persist_then_restore_roundtrips() {
        let store = MemoryStore::new();
        let ledger = StampLedger::from_ids(["jiufen", "taroko", "kenting"]);
        ledger.persist(&store, KEY).unwrap();
        assert_eq!(StampLedger::restore(&store, KEY), ledger);
    }

    #[test]
    fn restore_tolerates_missing_and_malformed_data() {
        let store = MemoryStore::new();
        assert!(StampLedger::restore(&store, KEY).is_empty());

        for raw in ["{not json", "{\"a\":1}", "[1,2,3]", "\"taroko\""] {
            store.set(KEY, raw).unwrap();
            assert!(StampLedger::restore(&store, KEY).is_empty(), "{raw}");
        }
    }

    #[test]
    fn restore_drops_duplicates_from_storage() {
        let store = MemoryStore::new();
        store.set(KEY, r#"["a","b","a"]"#).unwrap();
        assert_eq!(StampLedger::restore(&store, KEY).ids(), ["a", "b"]);
    }

    #[test]
    fn stamp_code_uses_three_letter_prefixes() {
        assert_eq!(stamp_code(RegionId::North, "taipei-101"), "TW-NOR-TAI");
        assert_eq!(stamp_code(RegionId::East, "qi"), "TW-EAS-QI");
    }

    #[test]
    fn passport_view_skips_stale_ids() {
        let content = Content::load_default().unwrap();
        let ledger = StampLedger::from_ids(["penghu", "retired-landmark", "taipei-101"]);
        let view = PassportView::build(&ledger, &content, 12);

        let names: Vec<_> = view.stamps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Penghu Columns", "Taipei 101"]);
        assert_eq!(view.stamps[0].accent_color, "#8b5cf6");
        assert_eq!(view.empty_slots(), 10);
        assert_eq!(ledger.resolved_len(&content), 2);
        assert_eq!(view.regions_visited(), vec![RegionId::North, RegionId::Islands]);
        assert!((view.progress() - 2.0 / 12.0).abs() < f64::EPSILON);
    }
}
