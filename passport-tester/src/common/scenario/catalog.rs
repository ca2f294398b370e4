use anyhow::{Context, Result, ensure};
use passport_core::{AppEvent, Content, ContestForm, Fallback, RitualOutcome};

use crate::common::scenario::TestScenario;
use crate::logic::{ContentPlan, Journey, RitualPlan, SimulationPlan, SimulationSummary};

pub struct CatalogEntry {
    pub key: &'static str,
    pub title: &'static str,
    pub plan: fn() -> SimulationPlan,
}

pub fn catalog_entries() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            key: "smoke",
            title: "Smoke Test",
            plan: smoke_plan,
        },
        CatalogEntry {
            key: "quiz-retry",
            title: "Quiz Retry Loop",
            plan: quiz_retry_plan,
        },
        CatalogEntry {
            key: "full-collection",
            title: "Full Collection and Ritual",
            plan: full_collection_plan,
        },
        CatalogEntry {
            key: "ritual-reset",
            title: "Ritual Reset",
            plan: ritual_reset_plan,
        },
        CatalogEntry {
            key: "overlay-exclusion",
            title: "Overlay Exclusion",
            plan: overlay_exclusion_plan,
        },
        CatalogEntry {
            key: "remote-overlay",
            title: "Remote Overlay Merge",
            plan: remote_overlay_plan,
        },
    ]
}

pub fn find_catalog_scenario(key: &str) -> Option<TestScenario> {
    catalog_entries()
        .into_iter()
        .find(|entry| entry.key == key)
        .map(|entry| TestScenario::simulation(entry.title, (entry.plan)()))
}

// Smoke: remote unreachable, contest entry, one stamp.

fn smoke_plan() -> SimulationPlan {
    SimulationPlan::new(smoke_journey)
        .with_content(ContentPlan::Unreachable)
        .with_contest(|seed| {
            ContestForm::new(
                format!("Visitor {seed}"),
                format!("visitor{seed}@example.tw"),
                "",
            )
        })
        .with_expectation(smoke_expectation)
}

fn smoke_journey(journey: &mut Journey) -> Result<()> {
    journey.collect("taipei-101", 0)?;
    Ok(())
}

fn smoke_expectation(summary: &SimulationSummary) -> Result<()> {
    let merge = summary.merge.as_ref().context("bootstrap left no merge report")?;
    ensure!(
        matches!(merge.fallback, Some(Fallback::FetchFailed(_))),
        "unreachable source should fall back, got {:?}",
        merge.fallback
    );
    ensure!(
        summary.content == Content::load_default()?,
        "fallback content differs from the shipped regions"
    );
    ensure!(
        summary.contest_entries == 1,
        "expected one contest entry, got {} ({:?})",
        summary.contest_entries,
        summary.contest_error
    );
    ensure!(summary.ledger == ["taipei-101"], "ledger {:?}", summary.ledger);
    ensure!(
        summary.persisted.as_deref() == Some(summary.ledger.as_slice()),
        "persisted ledger {:?} does not match",
        summary.persisted
    );
    for expected in [
        AppEvent::WelcomeShown,
        AppEvent::FactRevealed {
            landmark_id: "taipei-101".to_string(),
        },
        AppEvent::StampCollected {
            landmark_id: "taipei-101".to_string(),
            total: 1,
        },
        AppEvent::CelebrationFinished {
            landmark_id: "taipei-101".to_string(),
        },
    ] {
        ensure!(summary.events.contains(&expected), "missing {expected:?}");
    }
    Ok(())
}

// Quiz retry: exhaust every wrong answer before the right one.

fn quiz_retry_plan() -> SimulationPlan {
    SimulationPlan::new(quiz_retry_journey).with_expectation(quiz_retry_expectation)
}

fn quiz_retry_journey(journey: &mut Journey) -> Result<()> {
    journey.close_banner()?;
    let target = journey
        .shuffled_landmarks()
        .into_iter()
        .next()
        .context("no landmarks to visit")?;
    let options = journey
        .app()
        .content()
        .landmark(&target)
        .and_then(|landmark| landmark.quiz.as_ref())
        .map_or(1, |quiz| quiz.options.len());
    journey.collect(&target, options.saturating_sub(1))?;

    journey.app_mut().open_landmark(&target)?;
    let again = journey.app_mut().press_collect();
    journey.expect_refusal("collecting twice", again)?;
    journey.app_mut().close_landmark()?;
    Ok(())
}

fn quiz_retry_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(summary.ledger.len() == 1, "ledger {:?}", summary.ledger);
    ensure!(summary.wrong_answers >= 1, "no wrong answers were tried");
    let retries = summary.count_events(|event| matches!(event, AppEvent::RetryReady { .. }));
    ensure!(
        retries == summary.wrong_answers,
        "{retries} retries for {} wrong answers",
        summary.wrong_answers
    );
    let reveals = summary.count_events(|event| matches!(event, AppEvent::FactRevealed { .. }));
    ensure!(reveals == 1, "fact revealed {reveals} times");
    ensure!(
        summary.refusals == ["collecting twice"],
        "refusals {:?}",
        summary.refusals
    );
    ensure!(
        summary
            .merge
            .as_ref()
            .is_some_and(|merge| merge.fallback == Some(Fallback::NoRecords)),
        "empty remote table should keep the shipped regions"
    );
    Ok(())
}

// Full collection: reach the threshold and consult the blocks.

fn full_collection_plan() -> SimulationPlan {
    SimulationPlan::new(full_collection_journey).with_expectation(full_collection_expectation)
}

fn full_collection_journey(journey: &mut Journey) -> Result<()> {
    journey.close_banner()?;
    journey.collect_to_threshold()?;

    let view = journey.app_mut().open_passport()?;
    ensure!(
        view.empty_slots() == 0,
        "{} empty slots at the threshold",
        view.empty_slots()
    );
    journey.note(format!(
        "passport shows {} stamps across {} regions",
        view.collected(),
        view.regions_visited().len()
    ));
    journey.app_mut().close_passport()?;

    journey.cast_ritual()?;
    journey.app_mut().close_ritual()?;
    Ok(())
}

fn full_collection_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.ledger.len() == summary.threshold,
        "ledger holds {} of {}",
        summary.ledger.len(),
        summary.threshold
    );
    ensure!(
        summary
            .persisted
            .as_ref()
            .is_some_and(|ids| ids.len() == summary.threshold),
        "persisted ledger {:?}",
        summary.persisted
    );
    let totals: Vec<usize> = summary
        .events
        .iter()
        .filter_map(|event| match event {
            AppEvent::StampCollected { total, .. } => Some(*total),
            _ => None,
        })
        .collect();
    let expected: Vec<usize> = (1..=summary.threshold).collect();
    ensure!(totals == expected, "stamp totals {totals:?}");
    ensure!(
        summary.stamps_collected() == summary.threshold,
        "{} celebrations for {} stamps",
        summary.stamps_collected(),
        summary.threshold
    );
    ensure!(summary.ritual_outcome.is_some(), "ritual never resolved");
    let resolved =
        summary.count_events(|event| matches!(event, AppEvent::RitualResolved { .. }));
    ensure!(resolved == 1, "ritual resolved {resolved} times");
    Ok(())
}

// Ritual reset: a reset-offering answer empties the passport.

fn ritual_reset_plan() -> SimulationPlan {
    SimulationPlan::new(ritual_reset_journey)
        .with_ritual(RitualPlan::Scripted(reset_outcome_for))
        .with_expectation(ritual_reset_expectation)
}

fn reset_outcome_for(seed: u64) -> RitualOutcome {
    if seed % 2 == 0 {
        RitualOutcome::Laugh
    } else {
        RitualOutcome::Cry
    }
}

fn ritual_reset_journey(journey: &mut Journey) -> Result<()> {
    journey.close_banner()?;
    journey.collect_to_threshold()?;
    journey.cast_ritual()?;
    journey.app_mut().accept_reset()?;
    journey.app_mut().close_ritual()?;
    let reopened = journey.app_mut().open_ritual().map(|_| ());
    journey.expect_refusal("ritual after reset", reopened)?;
    Ok(())
}

fn ritual_reset_expectation(summary: &SimulationSummary) -> Result<()> {
    let outcome = summary.ritual_outcome.context("ritual never resolved")?;
    ensure!(
        outcome == reset_outcome_for(summary.seed),
        "scripted blocks answered {outcome}"
    );
    ensure!(outcome.offers_reset(), "{outcome} should offer a reset");
    ensure!(summary.ledger.is_empty(), "ledger {:?}", summary.ledger);
    ensure!(
        summary.persisted.as_ref().is_some_and(Vec::is_empty),
        "persisted ledger {:?}",
        summary.persisted
    );
    let resets = summary.count_events(|event| matches!(event, AppEvent::LedgerReset));
    ensure!(resets == 1, "ledger reset {resets} times");
    ensure!(
        summary.refusals == ["ritual after reset"],
        "refusals {:?}",
        summary.refusals
    );
    Ok(())
}

// Overlay exclusion: only one overlay at a time, and closing a card drops
// its pending transitions.

fn overlay_exclusion_plan() -> SimulationPlan {
    SimulationPlan::new(overlay_exclusion_journey).with_expectation(overlay_exclusion_expectation)
}

fn overlay_exclusion_journey(journey: &mut Journey) -> Result<()> {
    let target = journey
        .shuffled_landmarks()
        .into_iter()
        .next()
        .context("no landmarks to visit")?;

    let result = journey.app_mut().open_landmark(&target).map(|_| ());
    journey.expect_refusal("landmark over banner", result)?;
    let result = journey.app_mut().open_passport();
    journey.expect_refusal("passport over banner", result)?;
    let result = journey.app_mut().next_region().map(|_| ());
    journey.expect_refusal("region change under banner", result)?;
    journey.close_banner()?;

    let region = journey.app_mut().next_region()?.id;
    journey.note(format!("moved to {region}"));

    journey.app_mut().open_landmark(&target)?;
    let result = journey.app_mut().open_passport();
    journey.expect_refusal("passport over card", result)?;
    let result = journey.app_mut().open_ritual().map(|_| ());
    journey.expect_refusal("ritual over card", result)?;
    let result = journey.app_mut().close_banner();
    journey.expect_refusal("closing a closed banner", result)?;

    let answer = journey
        .app()
        .discovery()
        .and_then(|session| session.quiz())
        .map(|quiz| quiz.correct_answer);
    if let Some(answer) = answer {
        journey.app_mut().press_collect()?;
        journey.app_mut().select_option(answer)?;
        journey.note("closing the card before the fact shows");
    }
    journey.app_mut().close_landmark()?;
    let reveal = journey.app().config().timings.fact_reveal();
    journey.advance(reveal * 2);

    journey.app_mut().open_passport()?;
    let result = journey.app_mut().open_landmark(&target).map(|_| ());
    journey.expect_refusal("landmark over passport", result)?;
    journey.app_mut().close_passport()?;
    Ok(())
}

fn overlay_exclusion_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.refusals.len() == 7,
        "expected 7 refusals, got {:?}",
        summary.refusals
    );
    let reveals = summary.count_events(|event| matches!(event, AppEvent::FactRevealed { .. }));
    ensure!(reveals == 0, "a closed card still revealed its fact");
    ensure!(summary.ledger.is_empty(), "ledger {:?}", summary.ledger);
    ensure!(
        summary.active_overlay.is_none(),
        "{:?} left open",
        summary.active_overlay
    );
    Ok(())
}

// Remote overlay: remote regions replace shipped ones wholesale.

fn remote_overlay_plan() -> SimulationPlan {
    SimulationPlan::new(remote_overlay_journey)
        .with_content(ContentPlan::Remote)
        .with_expectation(remote_overlay_expectation)
}

fn remote_overlay_journey(journey: &mut Journey) -> Result<()> {
    journey.close_banner()?;
    let merge = journey
        .app()
        .merge_report()
        .cloned()
        .context("bootstrap left no merge report")?;

    let mut targets: Vec<String> = Vec::new();
    for region_id in &merge.replaced {
        if let Some(region) = journey.app().content().region(*region_id) {
            targets.extend(region.landmarks.iter().map(|l| l.id.clone()));
        }
    }
    let shipped = merge.kept.iter().find_map(|region_id| {
        journey
            .app()
            .content()
            .region(*region_id)
            .and_then(|region| region.landmarks.first())
            .map(|landmark| landmark.id.clone())
    });
    targets.extend(shipped);

    for id in targets {
        journey.collect(&id, 0)?;
    }
    Ok(())
}

fn remote_overlay_expectation(summary: &SimulationSummary) -> Result<()> {
    let merge = summary.merge.as_ref().context("bootstrap left no merge report")?;
    ensure!(
        merge.used_remote(),
        "remote rows were not applied: {:?}",
        merge.fallback
    );
    let defaults = Content::load_default()?;
    ensure!(
        summary.content.regions().len() == defaults.regions().len(),
        "region list changed shape"
    );
    for region_id in &merge.replaced {
        let region = summary
            .content
            .region(*region_id)
            .with_context(|| format!("{region_id} vanished"))?;
        ensure!(!region.landmarks.is_empty(), "{region_id} replaced by nothing");
        ensure!(
            region.landmarks.iter().all(|l| l.quiz.is_none()),
            "{region_id} kept a shipped quiz after replacement"
        );
    }
    for region_id in &merge.kept {
        ensure!(
            summary.content.region(*region_id) == defaults.region(*region_id),
            "{region_id} should keep its shipped landmarks"
        );
    }
    let replaced_total: usize = merge
        .replaced
        .iter()
        .filter_map(|id| summary.content.region(*id))
        .map(|region| region.landmarks.len())
        .sum();
    let expected = replaced_total + usize::from(!merge.kept.is_empty());
    ensure!(
        summary.ledger.len() == expected,
        "collected {} of {expected}",
        summary.ledger.len()
    );
    Ok(())
}
