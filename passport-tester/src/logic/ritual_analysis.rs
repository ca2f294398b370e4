use anyhow::{Result, ensure};
use passport_core::{RitualOutcome, RitualRng, cast_blocks, classify};
use serde::Serialize;

/// Smallest allowed deviation from the expected share.
const BASE_TOLERANCE: f64 = 0.02;
/// Allowed deviation in standard errors when the sample is small.
const SIGMA_BUDGET: f64 = 4.0;

/// Outcome tally for one seed's ritual stream.
#[derive(Debug, Clone, Serialize)]
pub struct RitualRecord {
    pub seed: u64,
    pub casts: usize,
    pub wins: usize,
    pub laughs: usize,
    pub cries: usize,
    pub draws: u64,
    pub tolerance: f64,
}

impl RitualRecord {
    #[must_use]
    pub const fn count(&self, outcome: RitualOutcome) -> usize {
        match outcome {
            RitualOutcome::Win => self.wins,
            RitualOutcome::Laugh => self.laughs,
            RitualOutcome::Cry => self.cries,
        }
    }

    #[must_use]
    pub fn share(&self, outcome: RitualOutcome) -> f64 {
        ratio(self.count(outcome), self.casts)
    }

    #[must_use]
    pub fn deviation(&self, outcome: RitualOutcome) -> f64 {
        (self.share(outcome) - outcome.expected_share()).abs()
    }

    #[must_use]
    pub fn max_deviation(&self) -> f64 {
        RitualOutcome::ALL
            .into_iter()
            .map(|outcome| self.deviation(outcome))
            .fold(0.0, f64::max)
    }

    #[must_use]
    pub fn within_tolerance(&self) -> bool {
        self.max_deviation() <= self.tolerance
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    let total = u32::try_from(total).unwrap_or(u32::MAX).max(1);
    f64::from(count) / f64::from(total)
}

/// Tolerance for `casts` samples: the base tolerance, widened for small runs.
#[must_use]
pub fn tolerance_for(casts: usize) -> f64 {
    let casts = f64::from(u32::try_from(casts).unwrap_or(u32::MAX).max(1));
    BASE_TOLERANCE.max(SIGMA_BUDGET * (0.25 / casts).sqrt())
}

/// Cast `casts` rituals per seed on the seed-derived stream.
#[must_use]
pub fn run_ritual_analysis(seeds: &[u64], casts: usize) -> Vec<RitualRecord> {
    seeds
        .iter()
        .map(|&seed| {
            let mut rng = RitualRng::from_user_seed(seed);
            let mut record = RitualRecord {
                seed,
                casts,
                wins: 0,
                laughs: 0,
                cries: 0,
                draws: 0,
                tolerance: tolerance_for(casts),
            };
            for _ in 0..casts {
                match classify(cast_blocks(&mut rng)) {
                    RitualOutcome::Win => record.wins += 1,
                    RitualOutcome::Laugh => record.laughs += 1,
                    RitualOutcome::Cry => record.cries += 1,
                }
            }
            record.draws = rng.draws();
            record
        })
        .collect()
}

/// Fail when a seed's outcome shares drift past tolerance or the stream
/// consumed an unexpected number of draws.
///
/// # Errors
///
/// Names the first offending seed.
pub fn validate_ritual_distribution(records: &[RitualRecord]) -> Result<()> {
    for record in records {
        let expected_draws = u64::try_from(record.casts).unwrap_or(u64::MAX) * 2;
        ensure!(
            record.draws == expected_draws,
            "Ritual stream for seed {} drew {} times for {} casts",
            record.seed,
            record.draws,
            record.casts
        );
        for outcome in RitualOutcome::ALL {
            ensure!(
                record.deviation(outcome) <= record.tolerance,
                "Ritual {} share for seed {} is {:.4}, expected {:.2} ± {:.4}",
                outcome.key(),
                record.seed,
                record.share(outcome),
                outcome.expected_share(),
                record.tolerance
            );
        }
    }
    Ok(())
}
