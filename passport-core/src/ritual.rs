//! The moon-block ritual that unlocks once the passport is full.
//!
//! Two blocks are cast; each lands flat or round with equal odds. Mixed sides
//! mean the deity agrees (a win). Matching sides either laugh or cry at the
//! visitor, and both offer a fresh start.
use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSide {
    Flat,
    Round,
}

impl BlockSide {
    /// One fair draw.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Self::Flat
        } else {
            Self::Round
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Toss {
    pub first: BlockSide,
    pub second: BlockSide,
}

impl Toss {
    #[must_use]
    pub const fn new(first: BlockSide, second: BlockSide) -> Self {
        Self { first, second }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RitualOutcome {
    /// Holy Answer (Shèng Jiǎo).
    Win,
    /// Laughing Answer (Xiào Jiǎo).
    Laugh,
    /// Crying Answer (Kū Jiǎo).
    Cry,
}

impl RitualOutcome {
    pub const ALL: [Self; 3] = [Self::Win, Self::Laugh, Self::Cry];

    #[must_use]
    pub const fn offers_reset(self) -> bool {
        matches!(self, Self::Laugh | Self::Cry)
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Laugh => "laugh",
            Self::Cry => "cry",
        }
    }

    #[must_use]
    pub const fn headline(self) -> &'static str {
        match self {
            Self::Win => "Holy Answer (Shèng Jiǎo). The way is open.",
            Self::Laugh => "Laughing Answer (Xiào Jiǎo). The deity is laughing.",
            Self::Cry => "Crying Answer (Kū Jiǎo). The deity disagrees.",
        }
    }

    /// Long-run share of casts that land on this outcome.
    #[must_use]
    pub const fn expected_share(self) -> f64 {
        match self {
            Self::Win => 0.5,
            Self::Laugh | Self::Cry => 0.25,
        }
    }
}

impl fmt::Display for RitualOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[must_use]
pub const fn classify(toss: Toss) -> RitualOutcome {
    match (toss.first, toss.second) {
        (BlockSide::Flat, BlockSide::Flat) => RitualOutcome::Laugh,
        (BlockSide::Round, BlockSide::Round) => RitualOutcome::Cry,
        _ => RitualOutcome::Win,
    }
}

/// Draw both blocks independently.
pub fn cast_blocks<R: Rng + ?Sized>(rng: &mut R) -> Toss {
    let first = BlockSide::draw(rng);
    let second = BlockSide::draw(rng);
    Toss { first, second }
}

/// The ritual unlocks at exactly `threshold` stamps.
#[must_use]
pub const fn is_eligible(collected: usize, threshold: usize) -> bool {
    collected == threshold
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RitualError {
    #[error("the ritual needs {required} stamps, the passport holds {collected}")]
    NotEligible { collected: usize, required: usize },
    #[error("the blocks are still in the air")]
    CastInFlight,
    #[error("the blocks have already been cast; there is only one chance")]
    AlreadyCast,
    #[error("the ritual has not reached the casting step")]
    NotReady,
    #[error("no reset is on offer")]
    NoResetOffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RitualStep {
    #[default]
    Intro,
    Ready,
    Casting,
    Resolved { toss: Toss, outcome: RitualOutcome },
    Reset,
}

#[derive(Debug, Clone, Default)]
pub struct RitualSession {
    step: RitualStep,
}

impl RitualSession {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            step: RitualStep::Intro,
        }
    }

    #[must_use]
    pub const fn step(&self) -> RitualStep {
        self.step
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.step() == RitualStep::Casting
    }

    #[must_use]
    pub fn outcome(&self) -> Option<RitualOutcome> {
        match self.step() {
            RitualStep::Resolved { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    /// Leave the intro for the casting table.
    ///
    /// # Errors
    ///
    /// Fails once the ritual is past its intro.
    pub fn proceed(&mut self) -> Result<(), RitualError> {
        match self.step() {
            RitualStep::Intro => {
                self.step = RitualStep::Ready;
                Ok(())
            }
            RitualStep::Ready => Ok(()),
            RitualStep::Casting => Err(RitualError::CastInFlight),
            RitualStep::Resolved { .. } | RitualStep::Reset => Err(RitualError::AlreadyCast),
        }
    }

    /// Throw the blocks. The caller resolves the cast once the presentation
    /// delay has passed.
    ///
    /// # Errors
    ///
    /// Fails when a cast is in flight, a result already exists, or the intro
    /// has not been dismissed.
    pub fn begin_cast(&mut self) -> Result<(), RitualError> {
        match self.step() {
            RitualStep::Ready => {
                self.step = RitualStep::Casting;
                Ok(())
            }
            RitualStep::Intro => Err(RitualError::NotReady),
            RitualStep::Casting => Err(RitualError::CastInFlight),
            RitualStep::Resolved { .. } | RitualStep::Reset => Err(RitualError::AlreadyCast),
        }
    }

    /// Land the blocks in flight.
    ///
    /// # Errors
    ///
    /// Fails when no cast is in flight.
    pub fn resolve<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<(Toss, RitualOutcome), RitualError> {
        if self.step() != RitualStep::Casting {
            return Err(RitualError::NotReady);
        }
        let toss = cast_blocks(rng);
        let outcome = classify(toss);
        self.step = RitualStep::Resolved { toss, outcome };
        log::debug!("ritual resolved {toss:?} as {outcome}");
        Ok((toss, outcome))
    }

    /// Accept the fresh start offered by a laughing or crying answer. The
    /// caller empties the ledger.
    ///
    /// # Errors
    ///
    /// Fails unless the result on the table offers a reset.
    pub fn accept_reset(&mut self) -> Result<(), RitualError> {
        match self.step() {
            RitualStep::Resolved { outcome, .. } if outcome.offers_reset() => {
                self.step = RitualStep::Reset;
                Ok(())
            }
            _ => Err(RitualError::NoResetOffered),
        }
    }
}

/// Counting RNG stream for the ritual.
#[derive(Debug, Clone)]
pub struct RitualRng {
    rng: SmallRng,
    draws: u64,
}

impl RitualRng {
    /// Derive the ritual stream from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(derive_stream_seed(seed, b"ritual")),
            draws: 0,
        }
    }

    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
            draws: 0,
        }
    }

    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl RngCore for RitualRng {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Replays a fixed sequence of block sides, cycling when exhausted.
///
/// Useful for rehearsing a particular outcome in tests and demos.
#[derive(Debug, Clone)]
pub struct DrawScript {
    sides: VecDeque<BlockSide>,
}

impl DrawScript {
    #[must_use]
    pub fn new(sides: impl IntoIterator<Item = BlockSide>) -> Self {
        Self {
            sides: sides.into_iter().collect(),
        }
    }

    /// Script that lands on `outcome` every cast.
    #[must_use]
    pub fn for_outcome(outcome: RitualOutcome) -> Self {
        match outcome {
            RitualOutcome::Win => Self::new([BlockSide::Flat, BlockSide::Round]),
            RitualOutcome::Laugh => Self::new([BlockSide::Flat, BlockSide::Flat]),
            RitualOutcome::Cry => Self::new([BlockSide::Round, BlockSide::Round]),
        }
    }

    fn next_side(&mut self) -> BlockSide {
        let side = self.sides.pop_front().unwrap_or(BlockSide::Round);
        self.sides.push_back(side);
        side
    }
}

impl RngCore for DrawScript {
    fn next_u32(&mut self) -> u32 {
        // Only the high half is meaningful for a fair coin.
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        match self.next_side() {
            BlockSide::Flat => 0,
            BlockSide::Round => u64::MAX,
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
