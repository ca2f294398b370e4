use anyhow::{Context, Result, bail, ensure};
use chrono::Utc;
use passport_core::{
    AppEvent, CollectStep, Content, ContestForm, DrawScript, KeyValueStore, MemoryStore,
    MergeReport, Overlay, PassportApp, PassportConfig, PassportResult, RitualOutcome, Verdict,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::source::{RecordingSink, RowSource, fixture_rows};

pub type TesterApp = PassportApp<MemoryStore, MemoryStore>;

/// Where a journey gets its landmark rows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPlan {
    /// The remote table answers with no rows.
    Shipped,
    /// The remote table answers with the fixture (or `--remote-records`) rows.
    Remote,
    /// Every fetch fails.
    Unreachable,
}

/// How the ritual blocks land.
#[derive(Clone, Copy)]
pub enum RitualPlan {
    /// Draw from the stream derived from the iteration seed.
    Seeded,
    /// Replay the sides that produce the chosen outcome.
    Scripted(fn(u64) -> RitualOutcome),
}

impl fmt::Debug for RitualPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seeded => f.write_str("Seeded"),
            Self::Scripted(_) => f.write_str("Scripted"),
        }
    }
}

pub type JourneyDriver = fn(&mut Journey) -> Result<()>;

/// Assertion hook run after a journey completes.
pub type SimulationExpectation =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationPlan {
    pub content: ContentPlan,
    pub ritual: RitualPlan,
    pub contest: Option<fn(u64) -> ContestForm>,
    pub driver: JourneyDriver,
    pub expectations: Vec<SimulationExpectation>,
}

impl fmt::Debug for SimulationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationPlan")
            .field("content", &self.content)
            .field("ritual", &self.ritual)
            .field("contest", &self.contest.is_some())
            .field("expectations", &self.expectations.len())
            .finish_non_exhaustive()
    }
}

impl SimulationPlan {
    #[must_use]
    pub fn new(driver: JourneyDriver) -> Self {
        Self {
            content: ContentPlan::Shipped,
            ritual: RitualPlan::Seeded,
            contest: None,
            driver,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_content(mut self, content: ContentPlan) -> Self {
        self.content = content;
        self
    }

    #[must_use]
    pub const fn with_ritual(mut self, ritual: RitualPlan) -> Self {
        self.ritual = ritual;
        self
    }

    #[must_use]
    pub fn with_contest(mut self, form: fn(u64) -> ContestForm) -> Self {
        self.contest = Some(form);
        self
    }

    #[must_use]
    pub fn with_expectation<F>(mut self, expectation: F) -> Self
    where
        F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
    {
        self.expectations.push(Arc::new(expectation));
        self
    }
}

/// Everything a journey left behind, for the expectations to inspect.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub threshold: usize,
    pub content: Content,
    pub merge: Option<MergeReport>,
    pub ledger: Vec<String>,
    pub persisted: Option<Vec<String>>,
    pub events: Vec<AppEvent>,
    pub steps: Vec<String>,
    pub refusals: Vec<String>,
    pub wrong_answers: usize,
    pub ritual_outcome: Option<RitualOutcome>,
    pub contest_entries: usize,
    pub contest_error: Option<String>,
    pub active_overlay: Option<Overlay>,
}

impl SimulationSummary {
    #[must_use]
    pub fn count_events(&self, matches: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|event| matches(event)).count()
    }

    #[must_use]
    pub fn stamps_collected(&self) -> usize {
        self.count_events(|event| matches!(event, AppEvent::StampCollected { .. }))
    }
}

/// A single headless visit: one app, one clock, one seeded visitor.
pub struct Journey {
    seed: u64,
    app: TesterApp,
    durable: MemoryStore,
    rng: SmallRng,
    events: Vec<AppEvent>,
    steps: Vec<String>,
    refusals: Vec<String>,
    wrong_answers: usize,
    ritual_outcome: Option<RitualOutcome>,
    verbose: bool,
}

impl Journey {
    #[must_use]
    pub fn new(seed: u64, app: TesterApp, durable: MemoryStore, verbose: bool) -> Self {
        Self {
            seed,
            app,
            durable,
            rng: SmallRng::seed_from_u64(seed),
            events: Vec::new(),
            steps: Vec::new(),
            refusals: Vec::new(),
            wrong_answers: 0,
            ritual_outcome: None,
            verbose,
        }
    }

    #[must_use]
    pub const fn app(&self) -> &TesterApp {
        &self.app
    }

    pub const fn app_mut(&mut self) -> &mut TesterApp {
        &mut self.app
    }

    pub fn note(&mut self, step: impl Into<String>) {
        let step = step.into();
        if self.verbose {
            println!("     · {step}");
        }
        self.steps.push(step);
    }

    pub fn advance(&mut self, elapsed: Duration) -> Vec<AppEvent> {
        let fired = self.app.advance(elapsed);
        self.events.extend(fired.iter().cloned());
        fired
    }

    /// Let the banner delay pass so the welcome banner comes up.
    pub fn await_banner(&mut self) {
        let delay = self.app.config().timings.welcome_delay();
        self.advance(delay);
    }

    /// # Errors
    ///
    /// Fails when the banner is not showing.
    pub fn close_banner(&mut self) -> Result<()> {
        self.app.close_banner().context("closing welcome banner")?;
        self.note("closed welcome banner");
        Ok(())
    }

    /// Record an action the engine is expected to refuse.
    ///
    /// # Errors
    ///
    /// Fails when the engine accepted the action instead.
    pub fn expect_refusal<T>(&mut self, label: &str, result: PassportResult<T>) -> Result<()> {
        match result {
            Ok(_) => bail!("{label} should have been refused"),
            Err(err) => {
                self.note(format!("{label} refused: {err}"));
                self.refusals.push(label.to_string());
                Ok(())
            }
        }
    }

    /// Every landmark id in a seed-dependent order.
    #[must_use]
    pub fn shuffled_landmarks(&mut self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .app
            .content()
            .regions()
            .iter()
            .flat_map(|region| region.landmarks.iter().map(|l| l.id.clone()))
            .collect();
        ids.shuffle(&mut self.rng);
        ids
    }

    /// Open a landmark, answer its quiz (after `wrong_first` misses), claim
    /// the stamp, and close the card. Returns the new stamp total.
    ///
    /// # Errors
    ///
    /// Fails when any step of the flow is refused or lands in the wrong phase.
    pub fn collect(&mut self, landmark_id: &str, wrong_first: usize) -> Result<usize> {
        self.app
            .open_landmark(landmark_id)
            .with_context(|| format!("opening {landmark_id}"))?;
        let quiz = self
            .app
            .discovery()
            .and_then(|session| session.quiz().cloned());
        let step = self.app.press_collect()?;

        match (step, quiz) {
            (CollectStep::QuizOffered, Some(quiz)) => {
                let mut wrong: Vec<usize> = (0..quiz.options.len())
                    .filter(|&index| !quiz.is_correct(index))
                    .collect();
                wrong.shuffle(&mut self.rng);
                for index in wrong.into_iter().take(wrong_first) {
                    let verdict = self.app.select_option(index)?;
                    ensure!(
                        verdict == Verdict::Incorrect,
                        "option {index} of {landmark_id} judged {verdict:?}"
                    );
                    self.wrong_answers += 1;
                    let retry = self.app.config().timings.retry_reset();
                    self.advance(retry);
                }
                let verdict = self.app.select_option(quiz.correct_answer)?;
                ensure!(
                    verdict == Verdict::Correct,
                    "correct answer of {landmark_id} judged {verdict:?}"
                );
                let reveal = self.app.config().timings.fact_reveal();
                self.advance(reveal);
                self.app.claim_stamp()?;
            }
            (CollectStep::Collected, _) => {}
            (step, quiz) => bail!(
                "{landmark_id} answered {step:?} with quiz present: {}",
                quiz.is_some()
            ),
        }

        let cleanup = self.app.config().timings.collect_cleanup();
        self.advance(cleanup);
        self.app.close_landmark()?;
        let total = self.app.ledger().len();
        self.note(format!("collected {landmark_id} ({total} stamps)"));
        Ok(total)
    }

    /// Collect landmarks in seed order until the ritual threshold is met.
    ///
    /// # Errors
    ///
    /// Fails when a collection fails or eligibility shows up early.
    pub fn collect_to_threshold(&mut self) -> Result<()> {
        let threshold = self.app.config().ritual_threshold;
        let ids = self.shuffled_landmarks();
        for id in ids.into_iter().take(threshold) {
            ensure!(
                !self.app.ritual_eligible(),
                "ritual unlocked at {} stamps",
                self.app.ledger().len()
            );
            self.collect(&id, 0)?;
        }
        ensure!(
            self.app.ritual_eligible(),
            "ritual still locked at {} stamps",
            self.app.ledger().len()
        );
        Ok(())
    }

    /// Open the ritual, cast, and wait out the suspense.
    ///
    /// # Errors
    ///
    /// Fails when the ritual cannot be opened or never resolves.
    pub fn cast_ritual(&mut self) -> Result<RitualOutcome> {
        self.app.open_ritual()?;
        self.app.proceed_ritual()?;
        self.app.cast_blocks()?;
        let suspense = self.app.config().timings.ritual_cast();
        self.advance(suspense);
        let outcome = self
            .app
            .ritual()
            .and_then(|ritual| ritual.outcome())
            .context("ritual did not resolve after the cast delay")?;
        self.note(format!("ritual answered {outcome}"));
        self.ritual_outcome = Some(outcome);
        Ok(outcome)
    }

    fn persisted(&self) -> Option<Vec<String>> {
        let key = &self.app.config().storage.stamps_key;
        let raw = self.durable.get(key).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    fn finish(mut self, contest: ContestTally) -> SimulationSummary {
        self.events.extend(self.app.take_events());
        let persisted = self.persisted();
        SimulationSummary {
            seed: self.seed,
            threshold: self.app.config().ritual_threshold,
            content: self.app.content().clone(),
            merge: self.app.merge_report().cloned(),
            ledger: self.app.ledger().ids().to_vec(),
            persisted,
            events: self.events,
            steps: self.steps,
            refusals: self.refusals,
            wrong_answers: self.wrong_answers,
            ritual_outcome: self.ritual_outcome,
            contest_entries: contest.entries,
            contest_error: contest.error,
            active_overlay: self.app.active_overlay(),
        }
    }
}

#[derive(Debug, Default)]
struct ContestTally {
    entries: usize,
    error: Option<String>,
}

/// Builds and drives journeys for a plan.
#[derive(Debug, Clone, Default)]
pub struct JourneyRunner {
    remote_rows: Option<RowSource>,
    verbose: bool,
}

impl JourneyRunner {
    #[must_use]
    pub const fn new(remote_rows: Option<RowSource>, verbose: bool) -> Self {
        Self {
            remote_rows,
            verbose,
        }
    }

    fn source_for(&self, plan: ContentPlan) -> RowSource {
        match plan {
            ContentPlan::Shipped => RowSource::from_rows(Vec::new()),
            ContentPlan::Remote => self
                .remote_rows
                .clone()
                .unwrap_or_else(|| RowSource::from_rows(fixture_rows())),
            ContentPlan::Unreachable => RowSource::unreachable(),
        }
    }

    /// Run one journey for `seed` and summarize it.
    ///
    /// # Errors
    ///
    /// Fails when bootstrapping fails or the plan's driver reports a problem.
    pub async fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let durable = MemoryStore::new();
        let source = self.source_for(plan.content);
        let app = PassportApp::bootstrap(
            &source,
            durable.clone(),
            MemoryStore::new(),
            PassportConfig::default(),
        )
        .await
        .context("bootstrapping passport")?;
        let app = match plan.ritual {
            RitualPlan::Seeded => app.with_ritual_seed(seed),
            RitualPlan::Scripted(pick) => app.with_ritual_rng(DrawScript::for_outcome(pick(seed))),
        };

        let mut journey = Journey::new(seed, app, durable, self.verbose);
        journey.await_banner();

        let mut tally = ContestTally::default();
        if let Some(form) = plan.contest {
            let sink = RecordingSink::default();
            match journey
                .app
                .submit_contest_entry(&sink, form(seed), Utc::now())
                .await
            {
                Ok(()) => journey.note("contest entry submitted"),
                Err(err) => tally.error = Some(err.to_string()),
            }
            tally.entries = sink.entries().len();
        }

        (plan.driver)(&mut journey)?;
        Ok(journey.finish(tally))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_taipei(journey: &mut Journey) -> Result<()> {
        journey.close_banner()?;
        journey.collect("taipei-101", 2)?;
        Ok(())
    }

    #[tokio::test]
    async fn runner_collects_through_the_quiz() {
        let plan = SimulationPlan::new(collect_taipei);
        let summary = JourneyRunner::default().run_plan(&plan, 7).await.unwrap();
        assert_eq!(summary.ledger, ["taipei-101"]);
        assert_eq!(summary.persisted, Some(vec!["taipei-101".to_string()]));
        assert_eq!(summary.wrong_answers, 2);
        assert_eq!(summary.stamps_collected(), 1);
        assert!(summary.events.contains(&AppEvent::WelcomeShown));
        assert_eq!(summary.active_overlay, None);
    }

    #[tokio::test]
    async fn driver_errors_surface() {
        fn refuse_nothing(journey: &mut Journey) -> Result<()> {
            let result = journey.app_mut().close_banner();
            journey.expect_refusal("closing an open banner", result)
        }
        let plan = SimulationPlan::new(refuse_nothing);
        let err = JourneyRunner::default()
            .run_plan(&plan, 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("should have been refused"));
    }

    #[tokio::test]
    async fn invalid_contest_form_keeps_banner_open() {
        fn no_op(_: &mut Journey) -> Result<()> {
            Ok(())
        }
        let plan = SimulationPlan::new(no_op)
            .with_contest(|_| ContestForm::new("", "nobody", ""));
        let summary = JourneyRunner::default().run_plan(&plan, 3).await.unwrap();
        assert_eq!(summary.contest_entries, 0);
        assert!(summary.contest_error.is_some());
        assert_eq!(summary.active_overlay, Some(Overlay::WelcomeBanner));
    }

    #[test]
    fn shuffled_order_is_stable_per_seed() {
        let app = |seed| {
            let durable = MemoryStore::new();
            Journey::new(
                seed,
                PassportApp::new(
                    Content::load_default().unwrap(),
                    durable.clone(),
                    MemoryStore::new(),
                    PassportConfig::default(),
                ),
                durable,
                false,
            )
        };
        let first = app(11).shuffled_landmarks();
        let again = app(11).shuffled_landmarks();
        assert_eq!(first, again);
        assert_eq!(first.len(), 15);
    }
}
