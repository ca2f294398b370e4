//! Landmark sources and entry sinks the scenarios drive the engine with.
use anyhow::{Context, Result};
use passport_core::{ContentSource, ContestEntry, EntrySink};
use serde_json::Value;
use std::cell::RefCell;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("landmarks table unreachable")]
    Unreachable,
}

/// Serves a fixed set of remote rows, or fails every fetch.
#[derive(Debug, Clone, Default)]
pub struct RowSource {
    rows: Option<Vec<Value>>,
}

impl RowSource {
    #[must_use]
    pub const fn from_rows(rows: Vec<Value>) -> Self {
        Self { rows: Some(rows) }
    }

    #[must_use]
    pub const fn unreachable() -> Self {
        Self { rows: None }
    }

    /// Read a JSON array of landmark rows from disk.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or does not hold a JSON array.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let rows: Vec<Value> = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON array of rows", path.display()))?;
        Ok(Self::from_rows(rows))
    }

    #[must_use]
    pub fn row_count(&self) -> Option<usize> {
        self.rows.as_ref().map(Vec::len)
    }
}

impl ContentSource for RowSource {
    type Error = SourceError;

    async fn fetch_landmarks(&self) -> Result<Vec<Value>, Self::Error> {
        self.rows.clone().ok_or(SourceError::Unreachable)
    }
}

/// Keeps contest entries in memory so scenarios can inspect them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: RefCell<Vec<ContestEntry>>,
}

impl RecordingSink {
    #[must_use]
    pub fn entries(&self) -> Vec<ContestEntry> {
        self.entries.borrow().clone()
    }
}

impl EntrySink for RecordingSink {
    type Error = SourceError;

    async fn insert_entry(&self, entry: &ContestEntry) -> Result<(), Self::Error> {
        self.entries.borrow_mut().push(entry.clone());
        Ok(())
    }
}

/// Rows used by the remote overlay scenario when no file is supplied.
#[must_use]
pub fn fixture_rows() -> Vec<Value> {
    serde_json::json!([
        {
            "id": "yehliu",
            "region": "north",
            "title": "Yehliu Geopark",
            "description": "Wind-carved hoodoo stones on a cape facing the Pacific.",
            "gallery": [
                { "url": "https://images.example.tw/yehliu-queen.jpg", "caption": "Queen's Head" },
                { "url": "https://images.example.tw/yehliu-cape.jpg" }
            ],
            "specs": { "tags": ["Geology", "Coast"] }
        },
        {
            "region": "north",
            "title": "Tamsui Old Street"
        },
        {
            "id": "alishan",
            "region": "central",
            "title": "Alishan Forest Railway",
            "google_maps_url": "https://maps.example.tw/alishan"
        },
        { "region": "atlantis", "title": "Not in Taiwan" },
        { "title": "Missing region" },
        "not a row"
    ])
    .as_array()
    .cloned()
    .unwrap_or_default()
}
