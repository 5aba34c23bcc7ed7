/*!
 * Bakery Process Simulator - Main Entry Point
 *
 * Runs one simulation from the environment configuration:
 * - Loads `SimulationConfig` (BAKERY_SIM_* variables, optional JSON file)
 * - Drives every process NEW -> READY -> RUNNING -> TERMINATED
 * - Prints the final report as JSON and resets the system
 */

use bakery_sim::{init_tracing, Scheduler, SimulationConfig, TracingSink};
use miette::IntoDiagnostic;
use std::sync::Arc;
use tracing::info;

fn main() -> miette::Result<()> {
    init_tracing();

    let config = SimulationConfig::from_env()?;
    info!(
        processes = config.process_count,
        policy = config.dispatch_policy.as_str(),
        "Bakery process simulator starting"
    );

    let scheduler = Scheduler::from_config(config, Arc::new(TracingSink))?;
    let report = scheduler.run()?;

    println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    if !report.is_complete() {
        for failure in &report.failures {
            tracing::warn!(pid = failure.pid, error = %failure.error, "process failed");
        }
    }

    scheduler.reset()?;
    info!("system reset");
    Ok(())
}
