//! Remote landmark rows and the region-granularity overlay merge.
//!
//! Rows arrive as loose JSON. They are validated and mapped into
//! [`Landmark`] values here; nothing past this module sees the raw shape.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::ContentSource;
use crate::content::{Content, GalleryImage, Landmark, RegionId, TagSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteImage {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteSpecs {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// One row of the remote `landmarks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLandmarkRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub region: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gallery: Option<Vec<RemoteImage>>,
    #[serde(default)]
    pub google_maps_url: Option<String>,
    #[serde(default)]
    pub specs: Option<RemoteSpecs>,
}

impl RemoteLandmarkRecord {
    /// Decode a single row.
    ///
    /// # Errors
    ///
    /// Returns an error when the row is not an object or lacks `region`/`title`.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Identifier used as the ledger key; falls back to a slug of the title.
    #[must_use]
    pub fn landmark_id(&self) -> String {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| slugify(&self.title), str::to_string)
    }

    #[must_use]
    pub fn into_landmark(self) -> Landmark {
        let id = self.landmark_id();
        let gallery: Vec<GalleryImage> = self
            .gallery
            .unwrap_or_default()
            .into_iter()
            .map(|img| GalleryImage {
                url: img.url,
                caption: img.caption.unwrap_or_default(),
            })
            .collect();
        let image = gallery
            .first()
            .map(|img| img.url.clone())
            .unwrap_or_default();
        let tags: TagSet = self
            .specs
            .and_then(|specs| specs.tags)
            .unwrap_or_default()
            .into_iter()
            .collect();
        Landmark {
            id,
            name: self.title,
            description: self.description.unwrap_or_default(),
            image,
            gallery,
            google_maps_url: self.google_maps_url,
            tags,
            quiz: None,
        }
    }
}

fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Decode raw rows, skipping the ones that do not fit the record shape.
#[must_use]
pub fn ingest_rows(rows: Vec<Value>) -> (Vec<RemoteLandmarkRecord>, usize) {
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for (index, row) in rows.into_iter().enumerate() {
        match RemoteLandmarkRecord::from_value(row) {
            Ok(record) if record.title.trim().is_empty() => {
                skipped += 1;
                log::warn!("remote landmark row {index} has an empty title; skipped");
            }
            Ok(record) if record.landmark_id().is_empty() => {
                skipped += 1;
                log::warn!(
                    "remote landmark row {index} (`{}`) has no id and no usable slug; skipped",
                    record.title
                );
            }
            Ok(record) => records.push(record),
            Err(err) => {
                skipped += 1;
                log::warn!("remote landmark row {index} is malformed ({err}); skipped");
            }
        }
    }
    (records, skipped)
}

/// Why the defaults were kept wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    FetchFailed(String),
    NoRecords,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Regions whose landmarks now come from the remote source.
    pub replaced: Vec<RegionId>,
    /// Regions left on their shipped landmarks.
    pub kept: Vec<RegionId>,
    /// Rows that were malformed, named an unknown region, or repeated an id.
    pub dropped: usize,
    pub fallback: Option<Fallback>,
}

impl MergeReport {
    fn fallback(content: &Content, reason: Fallback) -> Self {
        Self {
            replaced: Vec::new(),
            kept: content.region_ids().collect(),
            dropped: 0,
            fallback: Some(reason),
        }
    }

    #[must_use]
    pub fn used_remote(&self) -> bool {
        !self.replaced.is_empty()
    }
}

/// Replace each region's landmarks with its remote group, when it has one.
///
/// Regions without remote rows keep their shipped landmarks untouched. Remote
/// rows whose id is already taken are dropped instead.
pub fn overlay_merge(content: &mut Content, records: Vec<RemoteLandmarkRecord>) -> MergeReport {
    let mut groups: BTreeMap<RegionId, Vec<Landmark>> = BTreeMap::new();
    let mut report = MergeReport::default();

    for record in records {
        match record.region.parse::<RegionId>() {
            Ok(region) => groups
                .entry(region)
                .or_default()
                .push(record.into_landmark()),
            Err(_) => {
                report.dropped += 1;
                log::warn!(
                    "remote landmark `{}` names unknown region `{}`; dropped",
                    record.title,
                    record.region
                );
            }
        }
    }

    let (mut groups, repeated) = settle_groups(content, groups);
    report.dropped += repeated;

    for region in content.regions_mut() {
        match groups.remove(&region.id) {
            Some(landmarks) => {
                region.landmarks = landmarks;
                report.replaced.push(region.id);
            }
            None => report.kept.push(region.id),
        }
    }
    report
}

/// Drop remote landmarks whose id is held by a kept region or an earlier
/// remote row. A region left with no remote landmarks falls back to its
/// shipped ones, which can in turn claim ids, so this repeats until stable.
fn settle_groups(
    content: &Content,
    mut groups: BTreeMap<RegionId, Vec<Landmark>>,
) -> (BTreeMap<RegionId, Vec<Landmark>>, usize) {
    let mut abandoned = 0;
    loop {
        let mut repeats = Vec::new();
        let mut settled = BTreeMap::new();
        {
            let mut seen: HashSet<&str> = content
                .regions()
                .iter()
                .filter(|region| !groups.contains_key(&region.id))
                .flat_map(|region| region.landmarks.iter().map(|l| l.id.as_str()))
                .collect();
            for (&region, landmarks) in &groups {
                let unique: Vec<Landmark> = landmarks
                    .iter()
                    .filter(|landmark| {
                        let fresh = seen.insert(landmark.id.as_str());
                        if !fresh {
                            repeats.push((region, landmark.id.clone()));
                        }
                        fresh
                    })
                    .cloned()
                    .collect();
                settled.insert(region, unique);
            }
        }

        let emptied: Vec<RegionId> = settled
            .iter()
            .filter(|(_, landmarks)| landmarks.is_empty())
            .map(|(&region, _)| region)
            .collect();
        if emptied.is_empty() {
            for (region, id) in &repeats {
                log::warn!(
                    "remote landmark id `{id}` in region `{region}` is already taken; dropped"
                );
            }
            return (settled, abandoned + repeats.len());
        }
        for region in emptied {
            abandoned += groups.remove(&region).map_or(0, |rows| rows.len());
            log::warn!(
                "every remote landmark for `{region}` repeats a known id; keeping defaults"
            );
        }
    }
}

/// Fetch remote rows once and overlay them on `defaults`.
///
/// Fetch failures and empty results keep the defaults and are only logged.
pub async fn load_content<S>(mut defaults: Content, source: &S) -> (Content, MergeReport)
where
    S: ContentSource + ?Sized,
{
    let rows = match source.fetch_landmarks().await {
        Ok(rows) => rows,
        Err(err) => {
            log::info!("remote landmarks unavailable ({err}); using static defaults");
            let report = MergeReport::fallback(&defaults, Fallback::FetchFailed(err.to_string()));
            return (defaults, report);
        }
    };

    let (records, skipped) = ingest_rows(rows);
    if records.is_empty() {
        log::info!("no remote landmarks found; using static defaults");
        let mut report = MergeReport::fallback(&defaults, Fallback::NoRecords);
        report.dropped = skipped;
        return (defaults, report);
    }

    let mut report = overlay_merge(&mut defaults, records);
    report.dropped += skipped;
    log::debug!(
        "overlay merge replaced {:?}, kept {:?}, dropped {}",
        report.replaced,
        report.kept,
        report.dropped
    );
    (defaults, report)
}
