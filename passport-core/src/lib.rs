//! Taiwan Odyssey Passport Engine
//!
//! Platform-agnostic progress and discovery rules for the travel passport:
//! region content with a remote overlay, the per-landmark quiz flow, the stamp
//! ledger, and the moon-block ritual that unlocks at full collection. This
//! crate has no UI or platform dependencies; storage and the remote data
//! service are reached through the traits below.

pub mod app;
pub mod config;
pub mod contest;
pub mod content;
pub mod discovery;
pub mod error;
pub mod ledger;
pub mod overlay;
pub mod remote;
pub mod ritual;
pub mod scheduler;
pub mod storage;

// Re-export commonly used types
pub use app::{AppEvent, AppTimer, PassportApp};
pub use config::{DEFAULT_RITUAL_THRESHOLD, PassportConfig, StorageKeys, Timings};
pub use contest::{ContestEntry, ContestError, ContestForm};
pub use content::{
    Content, ContentError, GalleryImage, Landmark, QuizQuestion, Region, RegionId, TagSet,
    ThemeColor,
};
pub use discovery::{
    CollectStep, DiscoveryError, DiscoveryPhase, DiscoverySession, DiscoveryTimer, GalleryCursor,
    Verdict,
};
pub use error::{PassportError, PassportResult};
pub use ledger::{PassportView, StampEntry, StampLedger, stamp_code};
pub use overlay::{Overlay, OverlayError, OverlayGuard};
pub use remote::{
    Fallback, MergeReport, RemoteLandmarkRecord, ingest_rows, load_content, overlay_merge,
};
pub use ritual::{
    BlockSide, DrawScript, RitualError, RitualOutcome, RitualRng, RitualSession, RitualStep, Toss,
    cast_blocks, classify, is_eligible,
};
pub use scheduler::{Fired, Scheduler, TimerHandle, ViewToken};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SessionFlags, StorageError};

/// Trait for the remote landmark table.
/// Platform-specific implementations should provide this
#[allow(async_fn_in_trait)]
pub trait ContentSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch every landmark row in one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote service cannot be reached or answers
    /// with something other than a list of rows.
    async fn fetch_landmarks(&self) -> Result<Vec<serde_json::Value>, Self::Error>;
}

/// Trait for the remote `bookings` table that receives contest entries.
#[allow(async_fn_in_trait)]
pub trait EntrySink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert one contest entry
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    async fn insert_entry(&self, entry: &ContestEntry) -> Result<(), Self::Error>;
}

/// Source with no remote rows; the shipped content is used as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContent;

impl ContentSource for StaticContent {
    type Error = std::convert::Infallible;

    async fn fetch_landmarks(&self) -> Result<Vec<serde_json::Value>, Self::Error> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct FixtureSource {
        rows: Option<Vec<Value>>,
        calls: Rc<RefCell<u32>>,
    }

    impl ContentSource for FixtureSource {
        type Error = std::io::Error;

        async fn fetch_landmarks(&self) -> Result<Vec<Value>, Self::Error> {
            *self.calls.borrow_mut() += 1;
            self.rows
                .clone()
                .ok_or_else(|| std::io::Error::other("landmarks table unreachable"))
        }
    }

    #[tokio::test]
    async fn fetch_failure_keeps_defaults() {
        let source = FixtureSource::default();
        let defaults = Content::load_default().unwrap();
        let (content, report) = load_content(defaults.clone(), &source).await;
        assert_eq!(content, defaults);
        assert!(matches!(report.fallback, Some(Fallback::FetchFailed(_))));
        assert_eq!(report.kept.len(), 5);
        assert_eq!(*source.calls.borrow(), 1);
    }

    #[tokio::test]
    async fn remote_rows_replace_their_region() {
        let source = FixtureSource {
            rows: Some(vec![
                json!({ "id": "yehliu", "region": "north", "title": "Yehliu Geopark" }),
                json!({ "region": "moon", "title": "Nowhere" }),
                json!(42),
            ]),
            ..FixtureSource::default()
        };
        let (content, report) = load_content(Content::load_default().unwrap(), &source).await;
        assert!(report.used_remote());
        assert_eq!(report.dropped, 2);
        let north = content.region(RegionId::North).unwrap();
        assert_eq!(north.landmarks.len(), 1);
        assert_eq!(north.landmarks[0].name, "Yehliu Geopark");
        assert_eq!(content.total_landmarks(), 11);
    }

    #[tokio::test]
    async fn static_content_bootstraps_the_app() {
        let app = PassportApp::bootstrap(
            &StaticContent,
            MemoryStore::new(),
            MemoryStore::new(),
            PassportConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(app.content().total_landmarks(), 15);
        assert_eq!(
            app.merge_report().unwrap().fallback,
            Some(Fallback::NoRecords)
        );
        assert_eq!(app.current_region().unwrap().id, RegionId::North);
    }
}
