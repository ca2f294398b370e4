use thiserror::Error;

use crate::contest::ContestError;
use crate::content::ContentError;
use crate::discovery::DiscoveryError;
use crate::overlay::OverlayError;
use crate::ritual::RitualError;
use crate::storage::StorageError;

/// Any failure surfaced by [`crate::PassportApp`].
#[derive(Debug, Error)]
pub enum PassportError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Ritual(#[from] RitualError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error(transparent)]
    Contest(#[from] ContestError),
    #[error("no landmark with id `{0}`")]
    UnknownLandmark(String),
    #[error("no {0} is open")]
    NoActiveView(&'static str),
}

pub type PassportResult<T> = Result<T, PassportError>;
