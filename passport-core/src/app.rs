//! The coordinator that owns every piece of passport state.
//!
//! Views, the clock, and storage all go through [`PassportApp`]. Delayed
//! transitions are scheduled against the view that asked for them, so closing
//! a view silently drops whatever it still had in flight.
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::time::Duration;

use crate::config::PassportConfig;
use crate::contest::{ContestError, ContestForm};
use crate::content::{Content, ContentError, Region, RegionId};
use crate::discovery::{CollectStep, DiscoverySession, DiscoveryTimer, Verdict};
use crate::error::{PassportError, PassportResult};
use crate::ledger::{PassportView, StampLedger};
use crate::overlay::{Overlay, OverlayGuard};
use crate::remote::{MergeReport, load_content};
use crate::ritual::{RitualError, RitualOutcome, RitualRng, RitualSession, Toss, is_eligible};
use crate::scheduler::{Fired, Scheduler, ViewToken};
use crate::storage::{KeyValueStore, SessionFlags};
use crate::{ContentSource, EntrySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTimer {
    ShowWelcome,
    Discovery(DiscoveryTimer),
    ResolveRitual,
}

/// Signals for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    WelcomeShown,
    FactRevealed { landmark_id: String },
    RetryReady { landmark_id: String },
    /// One-shot celebration signal for a freshly collected stamp.
    StampCollected { landmark_id: String, total: usize },
    CelebrationFinished { landmark_id: String },
    RitualResolved { toss: Toss, outcome: RitualOutcome },
    LedgerReset,
}

pub struct PassportApp<D, S> {
    config: PassportConfig,
    content: Content,
    merge: Option<MergeReport>,
    ledger: StampLedger,
    durable: D,
    flags: SessionFlags<S>,
    overlays: OverlayGuard,
    region_index: usize,
    welcome: Option<ViewToken>,
    discovery: Option<(ViewToken, DiscoverySession)>,
    ritual: Option<(ViewToken, RitualSession)>,
    ritual_rng: Box<dyn RngCore>,
    scheduler: Scheduler<AppTimer>,
    events: Vec<AppEvent>,
}

impl<D, S> PassportApp<D, S>
where
    D: KeyValueStore,
    S: KeyValueStore,
{
    /// Build the coordinator around already-loaded content and restore the
    /// ledger from durable storage.
    pub fn new(content: Content, durable: D, session: S, config: PassportConfig) -> Self {
        let ledger = StampLedger::restore(&durable, &config.storage.stamps_key);
        log::debug!("restored {} stamps", ledger.len());
        Self {
            config,
            content,
            merge: None,
            ledger,
            durable,
            flags: SessionFlags::new(session),
            overlays: OverlayGuard::new(),
            region_index: 0,
            welcome: None,
            discovery: None,
            ritual: None,
            ritual_rng: Box::new(RitualRng::from_entropy()),
            scheduler: Scheduler::new(),
            events: Vec::new(),
        }
    }

    /// Load the shipped content, overlay the remote rows, restore the ledger,
    /// and schedule the welcome banner.
    ///
    /// # Errors
    ///
    /// Returns an error only if the shipped dataset fails validation. Remote
    /// failures fall back to the shipped content.
    pub async fn bootstrap<C>(
        source: &C,
        durable: D,
        session: S,
        config: PassportConfig,
    ) -> PassportResult<Self>
    where
        C: ContentSource + ?Sized,
    {
        let defaults = Content::load_default()?;
        let (content, report) = load_content(defaults, source).await;
        let mut app = Self::new(content, durable, session, config);
        app.merge = Some(report);
        app.schedule_welcome();
        Ok(app)
    }

    /// Replace the ritual stream with one derived from `seed`.
    #[must_use]
    pub fn with_ritual_seed(self, seed: u64) -> Self {
        self.with_ritual_rng(RitualRng::from_user_seed(seed))
    }

    #[must_use]
    pub fn with_ritual_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.ritual_rng = Box::new(rng);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &PassportConfig {
        &self.config
    }

    #[must_use]
    pub const fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub const fn merge_report(&self) -> Option<&MergeReport> {
        self.merge.as_ref()
    }

    #[must_use]
    pub const fn ledger(&self) -> &StampLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn durable_store(&self) -> &D {
        &self.durable
    }

    #[must_use]
    pub const fn active_overlay(&self) -> Option<Overlay> {
        self.overlays.active()
    }

    #[must_use]
    pub const fn now(&self) -> Duration {
        self.scheduler.now()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending_len()
    }

    fn persist_ledger(&self) {
        if let Err(err) = self
            .ledger
            .persist(&self.durable, &self.config.storage.stamps_key)
        {
            log::warn!("stamp ledger not saved: {err}");
        }
    }

    // Regions

    #[must_use]
    pub fn current_region(&self) -> Option<&Region> {
        self.content.regions().get(self.region_index)
    }

    /// # Errors
    ///
    /// Fails while an overlay is open or when `id` is not in the content.
    pub fn select_region(&mut self, id: RegionId) -> PassportResult<&Region> {
        self.overlays.ensure_navigation()?;
        let index = self
            .content
            .regions()
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ContentError::UnknownRegion(id.to_string()))?;
        self.region_index = index;
        Ok(&self.content.regions()[index])
    }

    /// Advance to the next region, wrapping after the last.
    ///
    /// # Errors
    ///
    /// Fails while an overlay is open or when there are no regions.
    pub fn next_region(&mut self) -> PassportResult<&Region> {
        self.overlays.ensure_navigation()?;
        let regions = self.content.regions();
        if regions.is_empty() {
            return Err(ContentError::UnknownRegion("next".into()).into());
        }
        self.region_index = (self.region_index + 1) % regions.len();
        Ok(&regions[self.region_index])
    }

    // Welcome banner and contest

    /// Schedule the banner unless it was already dismissed this session.
    /// Returns whether anything was scheduled.
    pub fn schedule_welcome(&mut self) -> bool {
        if self.welcome.is_some() || self.flags.is_set(&self.config.storage.welcome_key) {
            return false;
        }
        let token = self.scheduler.issue_token();
        self.scheduler
            .schedule(token, self.config.timings.welcome_delay(), AppTimer::ShowWelcome);
        self.welcome = Some(token);
        true
    }

    #[must_use]
    pub fn banner_visible(&self) -> bool {
        self.overlays.is_open(Overlay::WelcomeBanner)
    }

    /// Dismiss the banner and remember that for the rest of the session.
    ///
    /// # Errors
    ///
    /// Fails when the banner is not open.
    pub fn close_banner(&mut self) -> PassportResult<()> {
        self.overlays.close(Overlay::WelcomeBanner)?;
        if let Some(token) = self.welcome.take() {
            self.scheduler.cancel_owner(token);
        }
        if let Err(err) = self.flags.set(&self.config.storage.welcome_key) {
            log::warn!("welcome flag not saved: {err}");
        }
        Ok(())
    }

    /// Validate and submit a contest entry. On success the banner closes; on
    /// failure it stays open so the visitor can retry.
    ///
    /// # Errors
    ///
    /// Fails when the banner is closed, the form is invalid, or the sink
    /// rejects the entry.
    pub async fn submit_contest_entry<E>(
        &mut self,
        sink: &E,
        form: ContestForm,
        now: DateTime<Utc>,
    ) -> PassportResult<()>
    where
        E: EntrySink + ?Sized,
    {
        if !self.banner_visible() {
            return Err(ContestError::BannerClosed.into());
        }
        form.validate()?;
        let entry = form.into_entry(self.ledger.len(), now);
        sink.insert_entry(&entry)
            .await
            .map_err(|err| ContestError::Write(err.to_string()))?;
        log::info!("contest entry saved for {}", entry.email);
        self.close_banner()
    }

    // Landmark discovery

    /// # Errors
    ///
    /// Fails for unknown ids or while another overlay is open.
    pub fn open_landmark(&mut self, landmark_id: &str) -> PassportResult<&DiscoverySession> {
        let landmark = self
            .content
            .landmark(landmark_id)
            .cloned()
            .ok_or_else(|| PassportError::UnknownLandmark(landmark_id.to_string()))?;
        self.overlays.open(Overlay::Discovery)?;
        let token = self.scheduler.issue_token();
        let collected = self.ledger.has_stamp(landmark_id);
        let (_, session) = self
            .discovery
            .insert((token, DiscoverySession::open(landmark, collected)));
        Ok(&*session)
    }

    #[must_use]
    pub fn discovery(&self) -> Option<&DiscoverySession> {
        self.discovery.as_ref().map(|(_, session)| session)
    }

    fn discovery_mut(&mut self) -> PassportResult<(ViewToken, &mut DiscoverySession)> {
        self.discovery
            .as_mut()
            .map(|(token, session)| (*token, session))
            .ok_or(PassportError::NoActiveView("landmark card"))
    }

    /// # Errors
    ///
    /// Fails without an open card or when the card refuses the action.
    pub fn press_collect(&mut self) -> PassportResult<CollectStep> {
        let (token, session) = self.discovery_mut()?;
        let step = session.press_collect()?;
        if step == CollectStep::Collected {
            let id = session.landmark_id().to_string();
            self.record_stamp(token, id);
        }
        Ok(step)
    }

    /// # Errors
    ///
    /// Fails without an open card or outside the quiz and fact views.
    pub fn back_to_details(&mut self) -> PassportResult<()> {
        let (_, session) = self.discovery_mut()?;
        session.back_to_details()?;
        Ok(())
    }

    /// Lock in and judge an answer, scheduling the follow-up transition.
    ///
    /// # Errors
    ///
    /// Fails without an open quiz or for an out-of-range option.
    pub fn select_option(&mut self, index: usize) -> PassportResult<Verdict> {
        let (token, session) = self.discovery_mut()?;
        session.select_option(index)?;
        let verdict = session.judge()?;
        let timer = verdict.follow_up();
        let delay = self.discovery_delay(timer);
        self.scheduler
            .schedule(token, delay, AppTimer::Discovery(timer));
        Ok(verdict)
    }

    /// Claim the stamp once the fact is showing. Returns the new stamp total.
    ///
    /// # Errors
    ///
    /// Fails without an open card or before the fact is revealed.
    pub fn claim_stamp(&mut self) -> PassportResult<usize> {
        let (token, session) = self.discovery_mut()?;
        session.claim()?;
        let id = session.landmark_id().to_string();
        self.record_stamp(token, id);
        Ok(self.ledger.len())
    }

    /// # Errors
    ///
    /// Fails without an open card.
    pub fn gallery_next(&mut self) -> PassportResult<usize> {
        let (_, session) = self.discovery_mut()?;
        Ok(session.gallery_mut().next())
    }

    /// # Errors
    ///
    /// Fails without an open card.
    pub fn gallery_prev(&mut self) -> PassportResult<usize> {
        let (_, session) = self.discovery_mut()?;
        Ok(session.gallery_mut().prev())
    }

    /// # Errors
    ///
    /// Fails without an open card or for an index past the gallery.
    pub fn gallery_select(&mut self, index: usize) -> PassportResult<usize> {
        let (_, session) = self.discovery_mut()?;
        Ok(session.gallery_mut().select(index)?)
    }

    /// Close the card and drop its pending transitions.
    ///
    /// # Errors
    ///
    /// Fails when no card is open.
    pub fn close_landmark(&mut self) -> PassportResult<()> {
        self.overlays.close(Overlay::Discovery)?;
        if let Some((token, session)) = self.discovery.take() {
            let dropped = self.scheduler.cancel_owner(token);
            log::debug!(
                "closed `{}` with {dropped} pending transitions",
                session.landmark_id()
            );
        }
        Ok(())
    }

    const fn discovery_delay(&self, timer: DiscoveryTimer) -> Duration {
        match timer {
            DiscoveryTimer::RevealFact => self.config.timings.fact_reveal(),
            DiscoveryTimer::ResetRetry => self.config.timings.retry_reset(),
            DiscoveryTimer::FinishCelebration => self.config.timings.collect_cleanup(),
        }
    }

    fn record_stamp(&mut self, token: ViewToken, landmark_id: String) {
        if self.ledger.collect(landmark_id.clone()) {
            self.persist_ledger();
        }
        let delay = self.discovery_delay(DiscoveryTimer::FinishCelebration);
        self.scheduler.schedule(
            token,
            delay,
            AppTimer::Discovery(DiscoveryTimer::FinishCelebration),
        );
        let total = self.ledger.len();
        log::info!("stamp `{landmark_id}` collected ({total} total)");
        self.events
            .push(AppEvent::StampCollected { landmark_id, total });
    }

    // Passport book

    #[must_use]
    pub fn passport_view(&self) -> PassportView {
        PassportView::build(&self.ledger, &self.content, self.config.ritual_threshold)
    }

    /// # Errors
    ///
    /// Fails while another overlay is open.
    pub fn open_passport(&mut self) -> PassportResult<PassportView> {
        self.overlays.open(Overlay::Passport)?;
        Ok(self.passport_view())
    }

    /// # Errors
    ///
    /// Fails when the passport is not open.
    pub fn close_passport(&mut self) -> PassportResult<()> {
        self.overlays.close(Overlay::Passport)?;
        Ok(())
    }

    // Ritual

    #[must_use]
    pub fn ritual_eligible(&self) -> bool {
        is_eligible(self.ledger.len(), self.config.ritual_threshold)
    }

    #[must_use]
    pub fn ritual(&self) -> Option<&RitualSession> {
        self.ritual.as_ref().map(|(_, session)| session)
    }

    fn ritual_mut(&mut self) -> PassportResult<(ViewToken, &mut RitualSession)> {
        self.ritual
            .as_mut()
            .map(|(token, session)| (*token, session))
            .ok_or(PassportError::NoActiveView("ritual"))
    }

    /// # Errors
    ///
    /// Fails unless the passport holds exactly the threshold of stamps and no
    /// other overlay is open.
    pub fn open_ritual(&mut self) -> PassportResult<&RitualSession> {
        if !self.ritual_eligible() {
            return Err(RitualError::NotEligible {
                collected: self.ledger.len(),
                required: self.config.ritual_threshold,
            }
            .into());
        }
        self.overlays.open(Overlay::Ritual)?;
        let token = self.scheduler.issue_token();
        let (_, session) = self.ritual.insert((token, RitualSession::new()));
        Ok(&*session)
    }

    /// # Errors
    ///
    /// Fails without an open ritual or once the blocks have been cast.
    pub fn proceed_ritual(&mut self) -> PassportResult<()> {
        let (_, session) = self.ritual_mut()?;
        session.proceed()?;
        Ok(())
    }

    /// Throw the blocks; they land after the cast delay.
    ///
    /// # Errors
    ///
    /// Fails without an open ritual, while blocks are in the air, or after the
    /// single cast has been used.
    pub fn cast_blocks(&mut self) -> PassportResult<()> {
        let (token, session) = self.ritual_mut()?;
        session.begin_cast()?;
        let delay = self.config.timings.ritual_cast();
        self.scheduler
            .schedule(token, delay, AppTimer::ResolveRitual);
        Ok(())
    }

    /// Accept the fresh start after a laughing or crying answer.
    ///
    /// # Errors
    ///
    /// Fails without an open ritual or when the result offers no reset.
    pub fn accept_reset(&mut self) -> PassportResult<()> {
        let (_, session) = self.ritual_mut()?;
        session.accept_reset()?;
        if self.ledger.reset_all() {
            self.persist_ledger();
        }
        log::info!("passport reset after the ritual");
        self.events.push(AppEvent::LedgerReset);
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when the ritual is not open.
    pub fn close_ritual(&mut self) -> PassportResult<()> {
        self.overlays.close(Overlay::Ritual)?;
        if let Some((token, _)) = self.ritual.take() {
            self.scheduler.cancel_owner(token);
        }
        Ok(())
    }

    // Clock

    /// Events raised by actions since the last drain.
    pub fn take_events(&mut self) -> Vec<AppEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run the clock forward, applying every transition that falls due, and
    /// return everything that happened since the last drain.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<AppEvent> {
        let deadline = self.scheduler.now() + elapsed;
        while let Some(fired) = self.scheduler.pop_due(deadline) {
            self.dispatch(fired);
        }
        self.scheduler.settle(deadline);
        self.take_events()
    }

    fn dispatch(&mut self, fired: Fired<AppTimer>) {
        match fired.event {
            AppTimer::ShowWelcome => self.fire_welcome(fired.owner),
            AppTimer::Discovery(timer) => self.fire_discovery(fired.owner, timer),
            AppTimer::ResolveRitual => self.fire_ritual(fired.owner),
        }
    }

    fn fire_welcome(&mut self, owner: ViewToken) {
        if self.welcome != Some(owner) {
            return;
        }
        if self.overlays.open(Overlay::WelcomeBanner).is_err() {
            // Something else is on screen; try again after the same delay.
            self.scheduler.schedule(
                owner,
                self.config.timings.welcome_delay(),
                AppTimer::ShowWelcome,
            );
            return;
        }
        self.events.push(AppEvent::WelcomeShown);
    }

    fn fire_discovery(&mut self, owner: ViewToken, timer: DiscoveryTimer) {
        let Some((token, session)) = self.discovery.as_mut() else {
            return;
        };
        if *token != owner || !session.on_timer(timer) {
            log::debug!("stale {timer:?} ignored");
            return;
        }
        let landmark_id = session.landmark_id().to_string();
        self.events.push(match timer {
            DiscoveryTimer::RevealFact => AppEvent::FactRevealed { landmark_id },
            DiscoveryTimer::ResetRetry => AppEvent::RetryReady { landmark_id },
            DiscoveryTimer::FinishCelebration => AppEvent::CelebrationFinished { landmark_id },
        });
    }

    fn fire_ritual(&mut self, owner: ViewToken) {
        let Some((token, session)) = self.ritual.as_mut() else {
            return;
        };
        if *token != owner {
            return;
        }
        match session.resolve(&mut *self.ritual_rng) {
            Ok((toss, outcome)) => {
                log::info!("ritual answered: {}", outcome.headline());
                self.events.push(AppEvent::RitualResolved { toss, outcome });
            }
            Err(err) => log::debug!("ritual timer ignored: {err}"),
        }
    }
}
