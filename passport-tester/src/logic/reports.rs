use anyhow::Result;
use colored::Colorize;
use passport_core::RitualOutcome;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use super::{RitualRecord, ScenarioResult};

fn success_rate(results: &[ScenarioResult]) -> f64 {
    let passed = results.iter().filter(|r| r.passed).count();
    let passed = f64::from(u32::try_from(passed).unwrap_or(u32::MAX));
    let total = f64::from(u32::try_from(results.len()).unwrap_or(u32::MAX).max(1));
    passed / total * 100.0
}

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[ScenarioResult],
    ritual: &[RitualRecord],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Logic Test Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "==============================".cyan())?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "Total scenarios: {total_tests}")?;
    writeln!(out, "Passed: {}", passed_tests.to_string().green())?;
    writeln!(out, "Failed: {}", failed_tests.to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };

        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;

        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    let fastest = results.iter().min_by_key(|r| r.average_duration);
    let slowest = results.iter().max_by_key(|r| r.average_duration);
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        writeln!(
            out,
            "Fastest: {} ({:?})",
            fastest.scenario_name.green(),
            fastest.average_duration
        )?;
        writeln!(
            out,
            "Slowest: {} ({:?})",
            slowest.scenario_name.yellow(),
            slowest.average_duration
        )?;
    }

    if !ritual.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "🌙 Ritual Distribution".bright_magenta().bold())?;
        writeln!(out, "{}", "======================".magenta())?;
        for record in ritual {
            let status = if record.within_tolerance() {
                "✅".green()
            } else {
                "❌".red()
            };
            writeln!(
                out,
                "{} seed {}: {} casts | win {:.3} laugh {:.3} cry {:.3} | max drift {:.4} (± {:.4})",
                status,
                record.seed,
                record.casts,
                record.share(RitualOutcome::Win),
                record.share(RitualOutcome::Laugh),
                record.share(RitualOutcome::Cry),
                record.max_deviation(),
                record.tolerance
            )?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    scenarios: &'a [ScenarioResult],
    ritual: &'a [RitualRecord],
}

pub fn generate_json_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[ScenarioResult],
    ritual: &[RitualRecord],
) -> Result<()> {
    let json_output = if ritual.is_empty() {
        serde_json::to_string_pretty(results)?
    } else {
        serde_json::to_string_pretty(&JsonReport {
            scenarios: results,
            ritual,
        })?
    };
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[ScenarioResult],
    ritual: &[RitualRecord],
) -> Result<()> {
    writeln!(out, "# Passport Logic Test Results\n")?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenarios**: {total_tests}")?;
    writeln!(out, "- **Passed**: {passed_tests}")?;
    writeln!(out, "- **Failed**: {failed_tests}")?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    writeln!(out, "## Detailed Results\n")?;

    for result in results {
        let status = if result.passed { "✅" } else { "❌" };

        writeln!(
            out,
            "### {} {} (seed {})\n",
            status, result.scenario_name, result.seed
        )?;
        writeln!(
            out,
            "- **Iterations**: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "- **Average time**: {:?}", result.average_duration)?;

        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }

    if !ritual.is_empty() {
        writeln!(out, "## Ritual Distribution\n")?;
        writeln!(out, "| Seed | Casts | Win | Laugh | Cry | Max drift |")?;
        writeln!(out, "|---:|---:|---:|---:|---:|---:|")?;
        for record in ritual {
            writeln!(
                out,
                "| {} | {} | {:.3} | {:.3} | {:.3} | {:.4} |",
                record.seed,
                record.casts,
                record.share(RitualOutcome::Win),
                record.share(RitualOutcome::Laugh),
                record.share(RitualOutcome::Cry),
                record.max_deviation()
            )?;
        }
    }
    Ok(())
}
