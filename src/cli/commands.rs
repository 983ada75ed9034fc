//! CLI command handlers.
//!
//! This module contains the execution logic for each CLI command.
//! Extracted to enable testing of command behavior.

use std::path::Path;
use std::process::ExitCode;

use crate::config::SimConfig;
use crate::engine::{run_trials, verify_reproducibility, SimEngine, TaskSet};
use crate::error::SimResult;

use super::args::SimOptions;
use super::output::{
    print_help, print_reproducibility, print_run_report, print_trial_summary, print_version,
};
use super::{Args, Command};

/// Main CLI entry point.
///
/// Dispatches to the appropriate command handler based on parsed arguments.
#[must_use]
pub fn run_cli(args: Args) -> ExitCode {
    match args.command {
        Command::Run {
            sim,
            trace_path,
            report_path,
        } => run_simulation(&sim, trace_path.as_deref(), report_path.as_deref()),
        Command::Verify { sim, runs } => verify(&sim, runs),
        Command::Trials { sim, trials } => trials_command(&sim, trials),
        Command::Validate { sim } => validate(&sim),
        Command::Help => {
            print_help();
            ExitCode::SUCCESS
        }
        Command::Version => {
            print_version();
            ExitCode::SUCCESS
        }
    }
}

/// Load the config (or defaults), apply overrides, and load the task set.
///
/// # Errors
///
/// Returns error if either file cannot be read or fails validation.
pub fn resolve(sim: &SimOptions) -> SimResult<(SimConfig, TaskSet)> {
    let mut config = match &sim.config_path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    if let Some(seed) = sim.seed {
        config.reproducibility.seed = seed;
    }
    if let Some(timeout) = sim.timeout {
        config.horizon.timeout = timeout;
    }
    if let Some(max_reexec) = sim.max_reexec {
        config.policy.max_reexec = max_reexec;
    }
    if let Some(min_success) = sim.min_success {
        config.policy.min_success = min_success;
    }
    config.check()?;

    let tasks = TaskSet::load(&sim.tasks_path)?;
    Ok((config, tasks))
}

fn fail(e: &impl std::fmt::Display) -> ExitCode {
    eprintln!("Error: {e}");
    ExitCode::from(1)
}

/// Run one simulation and print its summary.
///
/// Exits with 0 when no job instance was dropped, 2 when some were, and 1 on
/// error.
#[must_use]
pub fn run_simulation(sim: &SimOptions, trace_path: Option<&Path>, report_path: Option<&Path>) -> ExitCode {
    let (config, tasks) = match resolve(sim) {
        Ok(inputs) => inputs,
        Err(e) => return fail(&e),
    };

    println!("Running: {}\n", sim.tasks_path.display());
    let report = match SimEngine::new(&config, &tasks).and_then(SimEngine::run) {
        Ok(report) => report,
        Err(e) => return fail(&e),
    };
    print_run_report(&report, &tasks);

    if let Some(path) = trace_path {
        if let Err(e) = report.write_trace_jsonl(path) {
            return fail(&e);
        }
        println!("Trace written to {}", path.display());
    }
    if let Some(path) = report_path {
        if let Err(e) = report.write_json(path) {
            return fail(&e);
        }
        println!("Report written to {}", path.display());
    }

    if report.is_schedulable() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

/// Verify reproducibility across multiple same-seed runs.
#[must_use]
pub fn verify(sim: &SimOptions, runs: usize) -> ExitCode {
    let (config, tasks) = match resolve(sim) {
        Ok(inputs) => inputs,
        Err(e) => return fail(&e),
    };

    println!("Verifying reproducibility: {}", sim.tasks_path.display());
    println!("Runs: {runs}\n");

    match verify_reproducibility(&config, &tasks, runs) {
        Ok(summary) => {
            print_reproducibility(&summary);
            if summary.identical {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => fail(&e),
    }
}

/// Run independent trials and print the aggregate.
#[must_use]
pub fn trials_command(sim: &SimOptions, trials: usize) -> ExitCode {
    let (config, tasks) = match resolve(sim) {
        Ok(inputs) => inputs,
        Err(e) => return fail(&e),
    };

    match run_trials(&config, &tasks, trials) {
        Ok(summary) => {
            print_trial_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Validate inputs without running.
#[must_use]
pub fn validate(sim: &SimOptions) -> ExitCode {
    match resolve(sim) {
        Ok((config, tasks)) => {
            println!("✓ {} is valid", sim.tasks_path.display());
            println!("  Tasks:       {}", tasks.len());
            println!("  Utilization: {:.4}", tasks.utilization());
            println!("  Timeout:     {}", config.horizon.timeout);
            println!(
                "  Policy:      max_reexec {}, min_success {}",
                config.policy.max_reexec, config.policy.min_success
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("✗ Validation FAILED");
            fail(&e)
        }
    }
}
