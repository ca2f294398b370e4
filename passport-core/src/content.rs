//! Regions, landmarks, and the quiz attached to each landmark.
use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_REGIONS_DATA: &str = include_str!("../data/regions.json");

/// Landmark tags stored inline for the common two-tag case.
pub type TagSet = SmallVec<[String; 4]>;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content data could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("region `{0}` appears more than once")]
    DuplicateRegion(RegionId),
    #[error("landmark id `{0}` is used by more than one landmark")]
    DuplicateLandmark(String),
    #[error("region `{region}` contains a landmark with an empty id")]
    EmptyLandmarkId { region: RegionId },
    #[error("quiz for `{landmark}` needs at least two options, found {options}")]
    TooFewOptions { landmark: String, options: usize },
    #[error("quiz for `{landmark}` marks option {index} correct but has only {options} options")]
    AnswerOutOfRange {
        landmark: String,
        index: usize,
        options: usize,
    },
    #[error("unknown region id `{0}`")]
    UnknownRegion(String),
}

/// The fixed set of regions, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionId {
    North,
    Central,
    East,
    South,
    Islands,
}

impl RegionId {
    pub const ALL: [Self; 5] = [
        Self::North,
        Self::Central,
        Self::East,
        Self::South,
        Self::Islands,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::Central => "central",
            Self::East => "east",
            Self::South => "south",
            Self::Islands => "islands",
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionId {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ContentError::UnknownRegion(s.to_string()))
    }
}

/// Theme palette used to tint a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeColor {
    Blue,
    Emerald,
    Cyan,
    Orange,
    Purple,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub url: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub fact: String,
}

impl QuizQuestion {
    #[must_use]
    pub const fn is_correct(&self, index: usize) -> bool {
        self.correct_answer == index
    }

    /// Check the question against the landmark it belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error when fewer than two options exist or the correct
    /// index does not point at an option.
    pub fn validate(&self, landmark: &str) -> Result<(), ContentError> {
        let options = self.options.len();
        if options < 2 {
            return Err(ContentError::TooFewOptions {
                landmark: landmark.to_string(),
                options,
            });
        }
        if self.correct_answer >= options {
            return Err(ContentError::AnswerOutOfRange {
                landmark: landmark.to_string(),
                index: self.correct_answer,
                options,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub gallery: Vec<GalleryImage>,
    #[serde(default)]
    pub google_maps_url: Option<String>,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default, deserialize_with = "first_quiz")]
    pub quiz: Option<QuizQuestion>,
}

impl Landmark {
    #[must_use]
    pub const fn has_quiz(&self) -> bool {
        self.quiz.is_some()
    }

    /// Image shown when no gallery entry is selected.
    #[must_use]
    pub fn cover_image(&self) -> &str {
        self.gallery
            .first()
            .map_or(self.image.as_str(), |img| img.url.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuizShape {
    One(QuizQuestion),
    Many(Vec<QuizQuestion>),
}

// Older datasets stored a list of questions; only the first one is ever asked.
fn first_quiz<'de, D>(deserializer: D) -> Result<Option<QuizQuestion>, D::Error>
where
    D: Deserializer<'de>,
{
    let shape = Option::<QuizShape>::deserialize(deserializer)?;
    Ok(match shape {
        Some(QuizShape::One(quiz)) => Some(quiz),
        Some(QuizShape::Many(list)) => list.into_iter().next(),
        None => None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub title: String,
    pub description: String,
    pub color: ThemeColor,
    pub accent_color: String,
    pub background_image: String,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

/// The loaded region dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Content {
    regions: Vec<Region>,
}

impl Content {
    /// Build content from regions, enforcing dataset invariants.
    ///
    /// # Errors
    ///
    /// Returns an error when region or landmark ids repeat, a landmark id is
    /// empty, or a quiz is malformed.
    pub fn new(regions: Vec<Region>) -> Result<Self, ContentError> {
        let content = Self { regions };
        content.validate()?;
        Ok(content)
    }

    /// Parse and validate a JSON array of regions.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or fails validation.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let regions: Vec<Region> = serde_json::from_str(json)?;
        Self::new(regions)
    }

    /// The dataset shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded dataset is invalid.
    pub fn load_default() -> Result<Self, ContentError> {
        Self::from_json(DEFAULT_REGIONS_DATA)
    }

    fn validate(&self) -> Result<(), ContentError> {
        let mut region_ids = HashSet::new();
        let mut landmark_ids = HashSet::new();
        for region in &self.regions {
            if !region_ids.insert(region.id) {
                return Err(ContentError::DuplicateRegion(region.id));
            }
            for landmark in &region.landmarks {
                if landmark.id.trim().is_empty() {
                    return Err(ContentError::EmptyLandmarkId { region: region.id });
                }
                if !landmark_ids.insert(landmark.id.as_str()) {
                    return Err(ContentError::DuplicateLandmark(landmark.id.clone()));
                }
                if let Some(quiz) = &landmark.quiz {
                    quiz.validate(&landmark.id)?;
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region_ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.iter().map(|r| r.id)
    }

    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn landmark(&self, id: &str) -> Option<&Landmark> {
        self.regions
            .iter()
            .flat_map(|r| r.landmarks.iter())
            .find(|l| l.id == id)
    }

    #[must_use]
    pub fn region_of(&self, landmark_id: &str) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.landmarks.iter().any(|l| l.id == landmark_id))
    }

    #[must_use]
    pub fn contains_landmark(&self, id: &str) -> bool {
        self.landmark(id).is_some()
    }

    #[must_use]
    pub fn total_landmarks(&self) -> usize {
        self.regions.iter().map(|r| r.landmarks.len()).sum()
    }

    pub(crate) fn regions_mut(&mut self) -> &mut [Region] {
        &mut self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(options: &[&str], correct: usize) -> QuizQuestion {
        QuizQuestion {
            id: "q1".into(),
            question: "?".into(),
            options: options.iter().map(|s| (*s).to_string()).collect(),
            correct_answer: correct,
            fact: "fact".into(),
        }
    }

    fn landmark(id: &str) -> Landmark {
        Landmark {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            image: String::new(),
            gallery: Vec::new(),
            google_maps_url: None,
            tags: TagSet::new(),
            quiz: None,
        }
    }

    fn region(id: RegionId, landmarks: Vec<Landmark>) -> Region {
        Region {
            id,
            name: id.to_string(),
            title: String::new(),
            description: String::new(),
            color: ThemeColor::Blue,
            accent_color: "#000000".into(),
            background_image: String::new(),
            landmarks,
        }
    }

    #[test]
    fn default_dataset_loads_and_validates() {
        let content = Content::load_default().unwrap();
        let ids: Vec<_> = content.region_ids().collect();
        assert_eq!(ids, RegionId::ALL.to_vec());
        assert_eq!(content.total_landmarks(), 15);
        let taipei = content.landmark("taipei-101").unwrap();
        assert_eq!(taipei.quiz.as_ref().unwrap().correct_answer, 1);
        assert_eq!(taipei.gallery.len(), 5);
        assert_eq!(
            content.region_of("penghu").map(|r| r.id),
            Some(RegionId::Islands)
        );
    }

    #[test]
    fn rejects_quiz_with_out_of_range_answer() {
        let mut lm = landmark("a");
        lm.quiz = Some(quiz(&["x", "y"], 2));
        let err = Content::new(vec![region(RegionId::North, vec![lm])]).unwrap_err();
        assert!(matches!(err, ContentError::AnswerOutOfRange { index: 2, .. }));
    }

    #[test]
    fn rejects_quiz_with_single_option() {
        let mut lm = landmark("a");
        lm.quiz = Some(quiz(&["only"], 0));
        let err = Content::new(vec![region(RegionId::North, vec![lm])]).unwrap_err();
        assert!(matches!(err, ContentError::TooFewOptions { options: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_ids_across_regions() {
        let err = Content::new(vec![
            region(RegionId::North, vec![landmark("dup")]),
            region(RegionId::South, vec![landmark("dup")]),
        ])
        .unwrap_err();
        assert!(matches!(err, ContentError::DuplicateLandmark(id) if id == "dup"));

        let err = Content::new(vec![
            region(RegionId::East, Vec::new()),
            region(RegionId::East, Vec::new()),
        ])
        .unwrap_err();
        assert!(matches!(err, ContentError::DuplicateRegion(RegionId::East)));
    }

    #[test]
    fn quiz_list_keeps_first_question() {
        let json = r#"{
            "id": "x",
            "name": "X",
            "quiz": [
                { "id": "q1", "question": "a?", "options": ["1", "2"], "correct_answer": 0, "fact": "f" },
                { "id": "q2", "question": "b?", "options": ["1", "2"], "correct_answer": 1, "fact": "g" }
            ]
        }"#;
        let lm: Landmark = serde_json::from_str(json).unwrap();
        assert_eq!(lm.quiz.unwrap().id, "q1");

        let bare: Landmark = serde_json::from_str(r#"{ "id": "y", "name": "Y" }"#).unwrap();
        assert!(bare.quiz.is_none());
        assert!(bare.tags.is_empty());
    }

    #[test]
    fn region_id_parses_exact_keys_only() {
        assert_eq!("islands".parse::<RegionId>().unwrap(), RegionId::Islands);
        assert!("Islands".parse::<RegionId>().is_err());
        assert!(" north ".parse::<RegionId>().is_err());
        assert!("atlantis".parse::<RegionId>().is_err());
    }

    #[test]
    fn cover_image_prefers_gallery() {
        let mut lm = landmark("a");
        lm.image = "/primary.jpg".into();
        assert_eq!(lm.cover_image(), "/primary.jpg");
        lm.gallery.push(GalleryImage {
            url: "/gallery.jpg".into(),
            caption: String::new(),
        });
        assert_eq!(lm.cover_image(), "/gallery.jpg");
    }
}
