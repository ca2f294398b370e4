pub mod journey;
pub mod reports;
pub mod ritual_analysis;
pub mod seeds;
pub mod tester;

pub use journey::{
    ContentPlan, Journey, JourneyRunner, RitualPlan, SimulationPlan, SimulationSummary,
};
pub use ritual_analysis::{RitualRecord, run_ritual_analysis, validate_ritual_distribution};
pub use seeds::resolve_seed_inputs;
pub use tester::*;
