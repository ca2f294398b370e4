//! Per-landmark discovery flow: details, optional quiz, then the stamp.
//!
//! A [`DiscoverySession`] lives while one landmark card is open. It never
//! touches the ledger or the clock itself; it reports what happened and which
//! follow-up timer the caller should schedule.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::content::{GalleryImage, Landmark, QuizQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DiscoveryPhase {
    Viewing,
    QuizOffered,
    AnswerPending { selected: usize },
    Correct { selected: usize },
    Incorrect { selected: usize },
    FactShown,
    Collected,
}

impl DiscoveryPhase {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Viewing => "viewing",
            Self::QuizOffered => "quiz_offered",
            Self::AnswerPending { .. } => "answer_pending",
            Self::Correct { .. } => "correct",
            Self::Incorrect { .. } => "incorrect",
            Self::FactShown => "fact_shown",
            Self::Collected => "collected",
        }
    }

    /// The locked option, if the quiz is showing one.
    #[must_use]
    pub const fn selected(self) -> Option<usize> {
        match self {
            Self::AnswerPending { selected }
            | Self::Correct { selected }
            | Self::Incorrect { selected } => Some(selected),
            _ => None,
        }
    }
}

impl fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Delayed transitions a session asks its owner to schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryTimer {
    RevealFact,
    ResetRetry,
    FinishCelebration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl Verdict {
    /// The timer that moves the quiz on after this verdict.
    #[must_use]
    pub const fn follow_up(self) -> DiscoveryTimer {
        match self {
            Self::Correct => DiscoveryTimer::RevealFact,
            Self::Incorrect => DiscoveryTimer::ResetRetry,
        }
    }
}

/// Result of pressing the collect action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStep {
    QuizOffered,
    Collected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("landmark `{0}` is already in the passport")]
    AlreadyCollected(String),
    #[error("cannot {action} while the card is {phase}")]
    WrongPhase {
        action: &'static str,
        phase: DiscoveryPhase,
    },
    #[error("the stamp celebration is still running")]
    Celebrating,
    #[error("option {index} does not exist; the quiz has {options} options")]
    OptionOutOfRange { index: usize, options: usize },
    #[error("gallery image {index} does not exist; the gallery has {len} images")]
    GalleryOutOfRange { index: usize, len: usize },
}

/// Wrap-around position in a landmark gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GalleryCursor {
    index: usize,
    len: usize,
}

impl GalleryCursor {
    #[must_use]
    pub const fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn next(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
        self.index
    }

    pub const fn prev(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
        self.index
    }

    /// Jump straight to a thumbnail.
    ///
    /// # Errors
    ///
    /// Returns an error when `index` is past the end of the gallery.
    pub const fn select(&mut self, index: usize) -> Result<usize, DiscoveryError> {
        if index >= self.len {
            return Err(DiscoveryError::GalleryOutOfRange {
                index,
                len: self.len,
            });
        }
        self.index = index;
        Ok(index)
    }
}

#[derive(Debug, Clone)]
pub struct DiscoverySession {
    landmark: Landmark,
    already_collected: bool,
    phase: DiscoveryPhase,
    quiz_passed: bool,
    celebrating: bool,
    gallery: GalleryCursor,
}

impl DiscoverySession {
    /// Open a card. Landmarks already in the passport open with collection
    /// disabled.
    #[must_use]
    pub fn open(landmark: Landmark, already_collected: bool) -> Self {
        let gallery = GalleryCursor::new(landmark.gallery.len());
        Self {
            landmark,
            already_collected,
            phase: DiscoveryPhase::Viewing,
            quiz_passed: false,
            celebrating: false,
            gallery,
        }
    }

    #[must_use]
    pub const fn landmark(&self) -> &Landmark {
        &self.landmark
    }

    #[must_use]
    pub fn landmark_id(&self) -> &str {
        &self.landmark.id
    }

    #[must_use]
    pub const fn phase(&self) -> DiscoveryPhase {
        self.phase
    }

    #[must_use]
    pub const fn quiz(&self) -> Option<&QuizQuestion> {
        self.landmark.quiz.as_ref()
    }

    #[must_use]
    pub const fn is_collected(&self) -> bool {
        self.already_collected || matches!(self.phase, DiscoveryPhase::Collected)
    }

    #[must_use]
    pub const fn is_celebrating(&self) -> bool {
        self.celebrating
    }

    #[must_use]
    pub const fn can_collect(&self) -> bool {
        !self.is_collected() && !self.celebrating && matches!(self.phase, DiscoveryPhase::Viewing)
    }

    /// The fact text, once the right answer has been revealed.
    #[must_use]
    pub fn fact(&self) -> Option<&str> {
        match self.phase {
            DiscoveryPhase::FactShown | DiscoveryPhase::Collected if self.quiz_passed => {
                self.quiz().map(|q| q.fact.as_str())
            }
            _ => None,
        }
    }

    fn wrong_phase(&self, action: &'static str) -> DiscoveryError {
        DiscoveryError::WrongPhase {
            action,
            phase: self.phase,
        }
    }

    fn enter_collected(&mut self) -> CollectStep {
        self.phase = DiscoveryPhase::Collected;
        self.celebrating = true;
        CollectStep::Collected
    }

    /// Collect from the details view. Offers the quiz first when one exists
    /// and has not been passed on this card.
    ///
    /// # Errors
    ///
    /// Fails when the landmark is already collected, the celebration is still
    /// running, or the card is not on its details view.
    pub fn press_collect(&mut self) -> Result<CollectStep, DiscoveryError> {
        if self.is_collected() {
            if self.celebrating {
                return Err(DiscoveryError::Celebrating);
            }
            return Err(DiscoveryError::AlreadyCollected(self.landmark.id.clone()));
        }
        if self.phase != DiscoveryPhase::Viewing {
            return Err(self.wrong_phase("collect"));
        }
        if self.landmark.has_quiz() && !self.quiz_passed {
            self.phase = DiscoveryPhase::QuizOffered;
            log::debug!("quiz offered for `{}`", self.landmark.id);
            return Ok(CollectStep::QuizOffered);
        }
        Ok(self.enter_collected())
    }

    /// Leave the quiz (or the revealed fact) and return to the details view.
    ///
    /// # Errors
    ///
    /// Fails while an answer is being judged or after collection.
    pub fn back_to_details(&mut self) -> Result<(), DiscoveryError> {
        match self.phase {
            DiscoveryPhase::QuizOffered | DiscoveryPhase::FactShown => {
                self.phase = DiscoveryPhase::Viewing;
                Ok(())
            }
            _ => Err(self.wrong_phase("go back to details")),
        }
    }

    /// Lock in an option.
    ///
    /// # Errors
    ///
    /// Fails outside `QuizOffered` or when `index` is not an option.
    pub fn select_option(&mut self, index: usize) -> Result<(), DiscoveryError> {
        if self.phase != DiscoveryPhase::QuizOffered {
            return Err(self.wrong_phase("answer"));
        }
        let Some(quiz) = self.landmark.quiz.as_ref() else {
            return Err(self.wrong_phase("answer"));
        };
        if index >= quiz.options.len() {
            return Err(DiscoveryError::OptionOutOfRange {
                index,
                options: quiz.options.len(),
            });
        }
        self.phase = DiscoveryPhase::AnswerPending { selected: index };
        Ok(())
    }

    /// Judge the locked option.
    ///
    /// # Errors
    ///
    /// Fails when no answer is pending.
    pub fn judge(&mut self) -> Result<Verdict, DiscoveryError> {
        let DiscoveryPhase::AnswerPending { selected } = self.phase else {
            return Err(self.wrong_phase("judge"));
        };
        let correct = self
            .landmark
            .quiz
            .as_ref()
            .is_some_and(|quiz| quiz.is_correct(selected));
        if correct {
            self.quiz_passed = true;
            self.phase = DiscoveryPhase::Correct { selected };
            Ok(Verdict::Correct)
        } else {
            self.phase = DiscoveryPhase::Incorrect { selected };
            Ok(Verdict::Incorrect)
        }
    }

    /// Apply a fired timer. Returns `false` when the timer no longer matches
    /// the current phase and was ignored.
    pub fn on_timer(&mut self, timer: DiscoveryTimer) -> bool {
        match (timer, self.phase) {
            (DiscoveryTimer::RevealFact, DiscoveryPhase::Correct { .. }) => {
                self.phase = DiscoveryPhase::FactShown;
                true
            }
            (DiscoveryTimer::ResetRetry, DiscoveryPhase::Incorrect { .. }) => {
                self.phase = DiscoveryPhase::QuizOffered;
                true
            }
            (DiscoveryTimer::FinishCelebration, DiscoveryPhase::Collected) if self.celebrating => {
                self.celebrating = false;
                true
            }
            _ => false,
        }
    }

    /// Take the stamp after the fact has been shown.
    ///
    /// # Errors
    ///
    /// Fails unless the fact is showing.
    pub fn claim(&mut self) -> Result<CollectStep, DiscoveryError> {
        if self.phase != DiscoveryPhase::FactShown {
            return Err(self.wrong_phase("claim the stamp"));
        }
        Ok(self.enter_collected())
    }

    #[must_use]
    pub const fn gallery(&self) -> &GalleryCursor {
        &self.gallery
    }

    pub const fn gallery_mut(&mut self) -> &mut GalleryCursor {
        &mut self.gallery
    }

    /// Image under the gallery cursor; the primary image when the gallery is
    /// empty.
    #[must_use]
    pub fn current_image(&self) -> &str {
        self.landmark
            .gallery
            .get(self.gallery.index())
            .map_or(self.landmark.image.as_str(), |img| img.url.as_str())
    }

    #[must_use]
    pub fn current_caption(&self) -> Option<&str> {
        self.landmark
            .gallery
            .get(self.gallery.index())
            .map(|img: &GalleryImage| img.caption.as_str())
            .filter(|caption| !caption.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;

    fn taipei() -> Landmark {
        Content::load_default()
            .unwrap()
            .landmark("taipei-101")
            .cloned()
            .unwrap()
    }

    fn without_quiz() -> Landmark {
        let mut lm = taipei();
        lm.id = "night-market".into();
        lm.quiz = None;
        lm.gallery.clear();
        lm
    }

    #[test]
    fn correct_answer_reveals_fact_then_collects() {
        let mut session = DiscoverySession::open(taipei(), false);
        assert!(session.can_collect());
        assert_eq!(session.press_collect().unwrap(), CollectStep::QuizOffered);

        session.select_option(1).unwrap();
        assert_eq!(session.phase(), DiscoveryPhase::AnswerPending { selected: 1 });
        assert_eq!(session.judge().unwrap(), Verdict::Correct);
        assert_eq!(session.phase().selected(), Some(1));
        assert!(session.fact().is_none());

        assert!(session.on_timer(DiscoveryTimer::RevealFact));
        assert_eq!(session.phase(), DiscoveryPhase::FactShown);
        assert!(session.fact().unwrap().contains("bamboo"));

        assert_eq!(session.claim().unwrap(), CollectStep::Collected);
        assert!(session.is_collected());
        assert!(session.is_celebrating());
        assert!(matches!(session.press_collect(), Err(DiscoveryError::Celebrating)));
        assert!(session.on_timer(DiscoveryTimer::FinishCelebration));
        assert!(matches!(
            session.press_collect(),
            Err(DiscoveryError::AlreadyCollected(_))
        ));
    }

    #[test]
    fn incorrect_answer_returns_to_quiz_with_selection_cleared() {
        let mut session = DiscoverySession::open(taipei(), false);
        session.press_collect().unwrap();
        session.select_option(0).unwrap();
        assert_eq!(session.judge().unwrap(), Verdict::Incorrect);
        assert_eq!(Verdict::Incorrect.follow_up(), DiscoveryTimer::ResetRetry);

        assert!(session.select_option(1).is_err());
        assert!(!session.on_timer(DiscoveryTimer::RevealFact));
        assert!(session.on_timer(DiscoveryTimer::ResetRetry));
        assert_eq!(session.phase(), DiscoveryPhase::QuizOffered);
        assert_eq!(session.phase().selected(), None);

        for _ in 0..3 {
            session.select_option(3).unwrap();
            session.judge().unwrap();
            session.on_timer(DiscoveryTimer::ResetRetry);
        }
        session.select_option(1).unwrap();
        assert_eq!(session.judge().unwrap(), Verdict::Correct);
    }

    #[test]
    fn landmark_without_quiz_collects_directly() {
        let mut session = DiscoverySession::open(without_quiz(), false);
        assert_eq!(session.press_collect().unwrap(), CollectStep::Collected);
        assert_eq!(session.phase(), DiscoveryPhase::Collected);
        assert!(session.fact().is_none());
    }

    #[test]
    fn already_collected_opens_with_collect_disabled() {
        let mut session = DiscoverySession::open(taipei(), true);
        assert_eq!(session.phase(), DiscoveryPhase::Viewing);
        assert!(!session.can_collect());
        assert!(matches!(
            session.press_collect(),
            Err(DiscoveryError::AlreadyCollected(id)) if id == "taipei-101"
        ));
    }

    #[test]
    fn back_to_details_keeps_a_passed_quiz() {
        let mut session = DiscoverySession::open(taipei(), false);
        session.press_collect().unwrap();
        session.back_to_details().unwrap();
        assert_eq!(session.phase(), DiscoveryPhase::Viewing);
        assert_eq!(session.press_collect().unwrap(), CollectStep::QuizOffered);

        session.select_option(1).unwrap();
        assert!(session.back_to_details().is_err());
        session.judge().unwrap();
        session.on_timer(DiscoveryTimer::RevealFact);
        session.back_to_details().unwrap();
        assert_eq!(session.press_collect().unwrap(), CollectStep::Collected);
    }

    #[test]
    fn option_index_is_bounds_checked() {
        let mut session = DiscoverySession::open(taipei(), false);
        assert!(matches!(
            session.select_option(0),
            Err(DiscoveryError::WrongPhase { phase: DiscoveryPhase::Viewing, .. })
        ));
        session.press_collect().unwrap();
        assert_eq!(
            session.select_option(4),
            Err(DiscoveryError::OptionOutOfRange { index: 4, options: 4 })
        );
    }

    #[test]
    fn gallery_cursor_wraps_both_ways() {
        let mut session = DiscoverySession::open(taipei(), false);
        assert_eq!(session.current_caption(), Some("The Bamboo Obelisk"));
        assert_eq!(session.gallery_mut().prev(), 4);
        assert_eq!(session.current_image(), "/images/taipei-101/05.png");
        assert_eq!(session.gallery_mut().next(), 0);
        assert_eq!(session.gallery_mut().select(2).unwrap(), 2);
        assert!(session.gallery_mut().select(5).is_err());

        let bare = DiscoverySession::open(without_quiz(), false);
        assert!(bare.gallery().is_empty());
        assert_eq!(bare.current_image(), "/images/taipei-101/01.jpg");
        let mut empty = GalleryCursor::new(0);
        assert_eq!(empty.next(), 0);
        assert_eq!(empty.prev(), 0);
    }
}
