//! Modal exclusivity: one overlay at a time, no nesting.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overlay {
    WelcomeBanner,
    Discovery,
    Passport,
    Ritual,
}

impl Overlay {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WelcomeBanner => "welcome banner",
            Self::Discovery => "landmark card",
            Self::Passport => "passport book",
            Self::Ritual => "ritual",
        }
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("cannot open the {requested} while the {active} is open")]
    Occupied { requested: Overlay, active: Overlay },
    #[error("region navigation is locked while the {0} is open")]
    NavigationLocked(Overlay),
    #[error("the {0} is not open")]
    NotOpen(Overlay),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayGuard {
    active: Option<Overlay>,
}

impl OverlayGuard {
    #[must_use]
    pub const fn new() -> Self {
        Self { active: None }
    }

    #[must_use]
    pub const fn active(&self) -> Option<Overlay> {
        self.active
    }

    #[must_use]
    pub fn is_open(&self, overlay: Overlay) -> bool {
        self.active == Some(overlay)
    }

    /// # Errors
    ///
    /// Fails when any overlay, including `overlay` itself, is already open.
    pub const fn open(&mut self, overlay: Overlay) -> Result<(), OverlayError> {
        if let Some(active) = self.active {
            return Err(OverlayError::Occupied {
                requested: overlay,
                active,
            });
        }
        self.active = Some(overlay);
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when `overlay` is not the one on screen.
    pub fn close(&mut self, overlay: Overlay) -> Result<(), OverlayError> {
        if self.active != Some(overlay) {
            return Err(OverlayError::NotOpen(overlay));
        }
        self.active = None;
        Ok(())
    }

    /// # Errors
    ///
    /// Fails while any overlay is open.
    pub const fn ensure_navigation(&self) -> Result<(), OverlayError> {
        match self.active {
            Some(active) => Err(OverlayError::NavigationLocked(active)),
            None => Ok(()),
        }
    }
}
