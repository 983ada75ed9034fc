//! CLI output formatting.
//!
//! Rendering is split from printing so the text can be tested.

use std::fmt::Write as _;

use crate::engine::{ReproducibilitySummary, SimReport, TaskSet, TrialSummary};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Version line, including the git hash when the build captured one.
#[must_use]
pub fn version_string() -> String {
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => {
            let short = hash.get(..12).unwrap_or(hash);
            format!("edfsim {} ({short})", env!("CARGO_PKG_VERSION"))
        }
        _ => format!("edfsim {}", env!("CARGO_PKG_VERSION")),
    }
}

/// Print version information.
pub fn print_version() {
    println!("{}", version_string());
}

/// Print help message.
pub fn print_help() {
    println!(
        r"edfsim - EDF schedulability simulator with bounded re-execution

USAGE:
    edfsim <COMMAND> <tasks.yaml|tasks.json> [OPTIONS]

COMMANDS:
    run <tasks>                 Run one simulation and print the summary
        --trace <file.jsonl>    Write the event trace as JSON lines
        --report <file.json>    Write the full report as JSON

    verify <tasks>              Re-run with the same seed and compare trace digests
        --runs <N>              Number of verification runs (default: 3)

    trials <tasks>              Run independent trials on partitioned RNG streams
        --trials <N>            Number of trials (default: 100)

    validate <tasks>            Check the task set and config without running

    help                        Show this help message
    version                     Show version information

SIMULATION OPTIONS:
    -c, --config <sim.yaml>     Simulation config (seed, policy, horizon, jidoka)
    -s, --seed <N>              Override the master seed
    -t, --timeout <N>           Override the global timeout (ticks)
    -n, --nmax <N>              Override max re-executions per job instance
    -m, --min <N>               Override accepted executions required per job
    -v, --verbose               Debug logging
    -d, --debug                 Trace logging

EXAMPLES:
    edfsim run tasks.yaml -t 1000 -n 2 -m 1
    edfsim run tasks.yaml --config sim.yaml --trace trace.jsonl
    edfsim verify tasks.yaml --runs 5
    edfsim trials tasks.yaml --seed 7 --trials 500

RUST_LOG overrides the log filter when neither -v nor -d is given.
"
    );
}

/// Render the summary of one run.
#[must_use]
pub fn render_run_report(report: &SimReport, tasks: &TaskSet) -> String {
    let mut out = String::new();
    let verdict = if report.is_schedulable() {
        "✓ SCHEDULABLE"
    } else {
        "✗ NOT SCHEDULABLE"
    };

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Seed:        {}", report.seed);
    let _ = writeln!(out, "Timeout:     {}", report.timeout);
    let _ = writeln!(out, "Tasks:       {}", tasks.len());
    let _ = writeln!(out, "Utilization: {:.4}", report.utilization);
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(
        out,
        "  {:>6}  {:>8}  {:>10}  {:>8}",
        "task", "overrun", "violation", "expected"
    );
    for c in &report.counters {
        let _ = writeln!(
            out,
            "  {:>6}  {:>8}  {:>10}  {:>8}",
            c.task_id, c.num_overrun_drops, c.num_violation_drops, c.expected_total_job_instances
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  Events:           {}", report.events.len());
    let _ = writeln!(out, "  Clock advances:   {}", report.steps);
    let _ = writeln!(out, "  Degenerate steps: {}", report.degenerate_steps);
    let _ = writeln!(out, "  Trace digest:     {}", report.digest);
    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(out, "{verdict}");
    let _ = writeln!(out, "{RULE}");
    out
}

/// Print the summary of one run.
pub fn print_run_report(report: &SimReport, tasks: &TaskSet) {
    print!("{}", render_run_report(report, tasks));
}

/// Render a reproducibility check.
#[must_use]
pub fn render_reproducibility(summary: &ReproducibilitySummary) -> String {
    let mut out = String::new();
    let (sym, status) = if summary.identical {
        ("✓", "PASSED")
    } else {
        ("✗", "FAILED")
    };

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Reproducibility Check");
    let _ = writeln!(out, "{RULE}\n");
    let _ = writeln!(out, "  Runs:      {}", summary.runs);
    let _ = writeln!(out, "  Identical: {}", summary.identical);
    let _ = writeln!(out, "\n  Reference Digest: {}", summary.reference_digest);

    if summary.run_digests.len() > 1 {
        let _ = writeln!(out, "\n  Run Digests:");
        for (i, digest) in summary.run_digests.iter().enumerate() {
            let mark = if *digest == summary.reference_digest {
                "="
            } else {
                "!"
            };
            let _ = writeln!(out, "    Run {}: {digest} {mark}", i + 1);
        }
    }

    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(out, "{sym} Result: {status}");
    let _ = writeln!(out, "{RULE}");
    out
}

/// Print a reproducibility check.
pub fn print_reproducibility(summary: &ReproducibilitySummary) {
    print!("{}", render_reproducibility(summary));
}

/// Render a trial aggregate.
#[must_use]
pub fn render_trial_summary(summary: &TrialSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Seed:   {}", summary.seed);
    let _ = writeln!(out, "Trials: {}", summary.trials);
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(
        out,
        "  {:>6}  {:>10}  {:>10}  {:>10}",
        "task", "overruns", "violations", "jobs"
    );
    for stats in &summary.per_task {
        let jobs = stats.expected_jobs_per_trial * summary.trials as u64;
        let _ = writeln!(
            out,
            "  {:>6}  {:>10}  {:>10}  {:>10}",
            stats.task_id, stats.overrun_drops, stats.violation_drops, jobs
        );
    }

    let _ = writeln!(
        out,
        "\n  Schedulable trials: {}/{} ({:.2}%)",
        summary.schedulable_trials,
        summary.trials,
        summary.schedulable_fraction() * 100.0
    );
    let _ = writeln!(out, "{RULE}");
    out
}

/// Print a trial aggregate.
pub fn print_trial_summary(summary: &TrialSummary) {
    print!("{}", render_trial_summary(summary));
}
