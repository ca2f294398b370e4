pub mod catalog;

use crate::logic::SimulationPlan;
use catalog::find_catalog_scenario;

// Logic test scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

/// Look a scenario up by key or alias.
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = match name.to_lowercase().as_str() {
        "smoke" => "smoke",
        "quiz-retry" | "quiz" | "retry" => "quiz-retry",
        "full-collection" | "full" | "collection" => "full-collection",
        "ritual-reset" | "reset" => "ritual-reset",
        "overlay-exclusion" | "overlays" => "overlay-exclusion",
        "remote-overlay" | "remote" => "remote-overlay",
        _ => return None,
    };
    find_catalog_scenario(key)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    catalog::catalog_entries()
        .into_iter()
        .map(|entry| (entry.key, entry.title))
        .collect()
}
