//! Core simulation engine.
//!
//! Implements the preemptive EDF scheduling loop with:
//! - Deterministic RNG (PCG with partitioned seeds)
//! - Stable, first-match selection and preemption
//! - Bounded re-execution under a probabilistic fault model
//! - Jidoka guards for stop-on-error

pub mod clock;
pub mod fault;
pub mod jidoka;
pub mod policy;
pub mod rng;
pub mod scheduler;
pub mod state;
pub mod task;
pub mod trace;

use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use clock::SimClock;
pub use fault::{BernoulliOracle, FaultOracle, FaultOutcome, ScriptedOracle};
pub use jidoka::{JidokaConfig, JidokaGuard, JidokaViolation};
pub use policy::{ReexecPolicy, Reschedule};
pub use rng::SimRng;
pub use scheduler::{Boundary, Plan};
pub use state::{SimState, ViolationCounter};
pub use task::{Task, TaskId, TaskSet, TaskSpec};
pub use trace::{EventKind, EventLog, TraceEvent};

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};

/// Simulation time in integer ticks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SimTime {
    ticks: u64,
}

impl SimTime {
    /// Zero time (simulation start).
    pub const ZERO: Self = Self { ticks: 0 };

    /// Create time from ticks.
    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Get time as ticks.
    #[must_use]
    pub const fn as_ticks(&self) -> u64 {
        self.ticks
    }

    /// Add a duration, saturating at `u64::MAX`.
    #[must_use]
    pub const fn add_ticks(self, ticks: u64) -> Self {
        Self {
            ticks: self.ticks.saturating_add(ticks),
        }
    }

    /// Ticks from `earlier` to `self`, or `None` if `earlier` is later.
    #[must_use]
    pub const fn ticks_since(self, earlier: Self) -> Option<u64> {
        self.ticks.checked_sub(earlier.ticks)
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ticks)
    }
}

/// Result of one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No task was ready; the clock jumped ahead.
    Idle {
        /// Time the processor woke up.
        until: SimTime,
    },
    /// An execution completed.
    Completed {
        /// Task that ran.
        task: TaskId,
        /// Fault outcome of the execution.
        outcome: FaultOutcome,
        /// Reschedule decision taken.
        decision: Reschedule,
    },
    /// The running task was preempted.
    Paused {
        /// Task that was preempted.
        task: TaskId,
        /// Arriving task that preempts it.
        by: TaskId,
    },
    /// The running task reached its deadline.
    DeadlineMiss {
        /// Task that was dropped.
        task: TaskId,
        /// Reschedule decision taken.
        decision: Reschedule,
    },
    /// The timeout truncated the running task.
    TimedOut {
        /// Task that was running.
        task: TaskId,
    },
    /// The run is over; nothing happened.
    Finished,
}

/// Main simulation engine.
///
/// Owns the task arena, the clock, the fault oracle and the event log.
#[derive(Debug)]
pub struct SimEngine<O: FaultOracle = BernoulliOracle> {
    state: SimState,
    clock: SimClock,
    policy: ReexecPolicy,
    jidoka: JidokaGuard,
    oracle: O,
    log: EventLog,
    seed: u64,
    finished: bool,
}

impl SimEngine<BernoulliOracle> {
    /// Create an engine drawing faults from the configured seed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config or task set is invalid.
    pub fn new(config: &SimConfig, tasks: &TaskSet) -> SimResult<Self> {
        let oracle = BernoulliOracle::new(config.reproducibility.seed);
        Self::with_oracle(config, tasks, oracle)
    }
}

impl<O: FaultOracle> SimEngine<O> {
    /// Create an engine with a custom fault oracle.
    ///
    /// Emits the initial `schedule` event of every task at time zero.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config or task set is invalid.
    pub fn with_oracle(config: &SimConfig, tasks: &TaskSet, oracle: O) -> SimResult<Self> {
        config.check()?;
        tasks.check()?;

        let timeout = config.horizon.timeout;
        let state = SimState::new(tasks, timeout);
        let clock = SimClock::new(SimTime::from_ticks(timeout));

        let mut log = EventLog::new();
        for task in state.tasks() {
            log.record(TraceEvent::for_task(SimTime::ZERO, EventKind::Schedule, task))?;
        }

        Ok(Self {
            state,
            finished: clock.at_timeout(),
            clock,
            policy: config.reexec_policy(),
            jidoka: JidokaGuard::new(config.jidoka),
            oracle,
            log,
            seed: config.reproducibility.seed,
        })
    }

    /// Get current simulation time.
    #[must_use]
    pub const fn current_time(&self) -> SimTime {
        self.clock.current_time()
    }

    /// Get the scheduler state.
    #[must_use]
    pub const fn state(&self) -> &SimState {
        &self.state
    }

    /// Get the clock.
    #[must_use]
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Get the event log.
    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// Whether the clock has reached the timeout.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one scheduling step.
    ///
    /// # Errors
    ///
    /// Returns `SimError` if:
    /// - A temporal consistency fault occurs (logic defect)
    /// - A Jidoka invariant is violated after the step
    pub fn step(&mut self) -> SimResult<StepOutcome> {
        if self.finished {
            return Ok(StepOutcome::Finished);
        }

        let now = self.clock.current_time();
        let outcome = match scheduler::plan(self.state.tasks(), now, self.clock.timeout()) {
            Plan::Idle { until } => {
                self.log.record(TraceEvent::marker(now, EventKind::Idle))?;
                self.clock.advance_to(until)?;
                StepOutcome::Idle { until }
            }
            Plan::Run {
                task,
                until,
                boundary,
            } => self.run_task(task, until, boundary)?,
        };

        self.jidoka
            .check(&self.state, &self.clock, &self.policy)?;

        if self.clock.at_timeout() {
            let end = self.clock.current_time();
            self.log.record(TraceEvent::marker(end, EventKind::Timeout))?;
            self.finished = true;
            tracing::debug!(time = %end, drops = self.state.total_drops(), "timeout reached");
        }

        Ok(outcome)
    }

    fn run_task(&mut self, idx: usize, until: SimTime, boundary: Boundary) -> SimResult<StepOutcome> {
        let now = self.clock.current_time();
        let id = self.state.task(idx).id;
        self.log
            .record(TraceEvent::for_task(now, EventKind::Run, self.state.task(idx)))?;

        let elapsed = self.clock.advance_to(until)?;
        self.state.execute(idx, elapsed);
        self.jidoka.note_elapsed(id, now, elapsed);

        let outcome = match boundary {
            Boundary::Finish => {
                let outcome = self.oracle.sample(self.state.spec(idx));
                if outcome.is_accepted() {
                    self.state.task_mut(idx).num_success += 1;
                }
                self.log.record(
                    TraceEvent::for_task(until, EventKind::Finish, self.state.task(idx))
                        .with_outcome(outcome),
                )?;
                let decision =
                    self.policy
                        .apply(&mut self.state, idx, until, outcome.is_due(), &mut self.log)?;
                StepOutcome::Completed {
                    task: id,
                    outcome,
                    decision,
                }
            }
            Boundary::Preemption { by } => {
                self.log
                    .record(TraceEvent::for_task(until, EventKind::Pause, self.state.task(idx)))?;
                StepOutcome::Paused {
                    task: id,
                    by: self.state.task(by).id,
                }
            }
            Boundary::Deadline => {
                let decision = self
                    .policy
                    .apply(&mut self.state, idx, until, true, &mut self.log)?;
                StepOutcome::DeadlineMiss { task: id, decision }
            }
            Boundary::Timeout => {
                self.log.record(TraceEvent::for_task(
                    until,
                    EventKind::ExitTimeout,
                    self.state.task(idx),
                ))?;
                StepOutcome::TimedOut { task: id }
            }
        };
        Ok(outcome)
    }

    /// Run until the timeout and produce a report.
    ///
    /// # Errors
    ///
    /// Returns the first step error.
    pub fn run(mut self) -> SimResult<SimReport> {
        tracing::info!(
            seed = self.seed,
            timeout = %self.clock.timeout(),
            tasks = self.state.len(),
            "simulation start"
        );

        while !self.finished {
            self.step()?;
        }

        let report = self.into_report()?;
        tracing::info!(
            final_time = %report.final_time,
            events = report.events.len(),
            overruns = report.total_overruns(),
            violations = report.total_violations(),
            "simulation finished"
        );
        Ok(report)
    }

    /// Consume the engine into a report of its current state.
    ///
    /// # Errors
    ///
    /// Returns error if the trace digest cannot be computed.
    pub fn into_report(self) -> SimResult<SimReport> {
        let digest = self.log.digest()?;
        let utilization = self.state.specs().iter().map(TaskSpec::utilization).sum();
        Ok(SimReport {
            seed: self.seed,
            timeout: self.clock.timeout(),
            final_time: self.clock.current_time(),
            steps: self.clock.step_count(),
            degenerate_steps: self.jidoka.degenerate_steps(),
            utilization,
            counters: self.state.counters().to_vec(),
            events: self.log.into_events(),
            digest,
        })
    }
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimReport {
    /// Master seed.
    pub seed: u64,
    /// Global horizon.
    pub timeout: SimTime,
    /// Clock value when the run ended.
    pub final_time: SimTime,
    /// Clock advances taken.
    pub steps: u64,
    /// Zero-elapsed task steps.
    pub degenerate_steps: u64,
    /// Total utilization of the task set.
    pub utilization: f64,
    /// Per-task drop counters.
    pub counters: Vec<ViolationCounter>,
    /// Ordered event trace.
    pub events: Vec<TraceEvent>,
    /// BLAKE3 digest of the trace.
    pub digest: String,
}

impl SimReport {
    /// No job instance was dropped.
    #[must_use]
    pub fn is_schedulable(&self) -> bool {
        self.counters.iter().all(|c| c.total_drops() == 0)
    }

    /// Overrun drops over all tasks.
    #[must_use]
    pub fn total_overruns(&self) -> u64 {
        self.counters.iter().map(|c| c.num_overrun_drops).sum()
    }

    /// Violation drops over all tasks.
    #[must_use]
    pub fn total_violations(&self) -> u64 {
        self.counters.iter().map(|c| c.num_violation_drops).sum()
    }

    /// Events of a kind.
    pub fn events_of(&self, kind: EventKind) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Write the trace as JSON lines, one event per line.
    ///
    /// # Errors
    ///
    /// Returns error on I/O or encoding failure.
    pub fn write_trace_jsonl<P: AsRef<Path>>(&self, path: P) -> SimResult<()> {
        let mut out = BufWriter::new(std::fs::File::create(path)?);
        for event in &self.events {
            serde_json::to_writer(&mut out, event)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write the whole report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error on I/O or encoding failure.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> SimResult<()> {
        let out = BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(out, self)?;
        Ok(())
    }
}

/// Result of repeated same-seed runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproducibilitySummary {
    /// Number of runs.
    pub runs: usize,
    /// Whether every run produced the reference digest.
    pub identical: bool,
    /// Digest of the first run.
    pub reference_digest: String,
    /// Digest of every run.
    pub run_digests: Vec<String>,
}

/// Run the same configuration `runs` times and compare trace digests.
///
/// # Errors
///
/// Returns a configuration error for `runs == 0`, or the first run error.
pub fn verify_reproducibility(
    config: &SimConfig,
    tasks: &TaskSet,
    runs: usize,
) -> SimResult<ReproducibilitySummary> {
    if runs == 0 {
        return Err(SimError::config("verification needs at least one run"));
    }

    let run_digests = (0..runs)
        .map(|_| SimEngine::new(config, tasks)?.run().map(|r| r.digest))
        .collect::<SimResult<Vec<_>>>()?;
    let reference_digest = run_digests[0].clone();
    let identical = run_digests.iter().all(|d| *d == reference_digest);

    Ok(ReproducibilitySummary {
        runs,
        identical,
        reference_digest,
        run_digests,
    })
}

/// Per-task drop totals across trials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialTaskStats {
    /// Task id.
    pub task_id: TaskId,
    /// Overrun drops summed over trials.
    pub overrun_drops: u64,
    /// Violation drops summed over trials.
    pub violation_drops: u64,
    /// Expected job instances per trial.
    pub expected_jobs_per_trial: u64,
}

/// Aggregate of independent trials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSummary {
    /// Master seed.
    pub seed: u64,
    /// Number of trials.
    pub trials: usize,
    /// Trials without any drop.
    pub schedulable_trials: usize,
    /// Per-task totals, in input order.
    pub per_task: Vec<TrialTaskStats>,
}

impl TrialSummary {
    /// Fraction of trials without any drop.
    #[must_use]
    pub fn schedulable_fraction(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.schedulable_trials as f64 / self.trials as f64
    }
}

/// Run `trials` independent simulations on partitioned RNG streams.
///
/// Trial `i` always draws from stream `i + 1` of the master seed, so a
/// trial's trace does not depend on how many trials run.
///
/// # Errors
///
/// Returns a configuration error for `trials == 0`, or the first run error.
pub fn run_trials(config: &SimConfig, tasks: &TaskSet, trials: usize) -> SimResult<TrialSummary> {
    if trials == 0 {
        return Err(SimError::config("at least one trial is required"));
    }

    let seed = config.reproducibility.seed;
    let mut root = SimRng::new(seed);
    let mut per_task: Vec<TrialTaskStats> = tasks
        .iter()
        .map(|spec| TrialTaskStats {
            task_id: spec.id,
            overrun_drops: 0,
            violation_drops: 0,
            expected_jobs_per_trial: spec.expected_jobs(config.horizon.timeout),
        })
        .collect();
    let mut schedulable_trials = 0;

    for (i, rng) in root.partition(trials).into_iter().enumerate() {
        let report =
            SimEngine::with_oracle(config, tasks, BernoulliOracle::from_rng(rng))?.run()?;
        tracing::debug!(trial = i, digest = %report.digest, "trial finished");

        if report.is_schedulable() {
            schedulable_trials += 1;
        }
        for (stats, counter) in per_task.iter_mut().zip(&report.counters) {
            stats.overrun_drops += counter.num_overrun_drops;
            stats.violation_drops += counter.num_violation_drops;
        }
    }

    Ok(TrialSummary {
        seed,
        trials,
        schedulable_trials,
        per_task,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(timeout: u64, max_reexec: u32, min_success: u32) -> SimConfig {
        SimConfig::builder()
            .seed(42)
            .timeout(timeout)
            .max_reexec(max_reexec)
            .min_success(min_success)
            .build()
    }

    fn kinds(report: &SimReport) -> Vec<(u64, EventKind)> {
        report
            .events
            .iter()
            .map(|e| (e.time.as_ticks(), e.kind))
            .collect()
    }

    #[test]
    fn test_sim_time_basics() {
        let t = SimTime::from_ticks(10);
        assert_eq!(t.as_ticks(), 10);
        assert_eq!(t.add_ticks(5), SimTime::from_ticks(15));
        assert_eq!(t.ticks_since(SimTime::from_ticks(4)), Some(6));
        assert_eq!(SimTime::from_ticks(4).ticks_since(t), None);
        assert_eq!(SimTime::from_ticks(u64::MAX).add_ticks(1).as_ticks(), u64::MAX);
        assert_eq!(t.to_string(), "10");
        assert_eq!(SimTime::default(), SimTime::ZERO);
    }

    #[test]
    fn test_sim_time_ordering() {
        assert!(SimTime::from_ticks(1) < SimTime::from_ticks(2));
        assert_eq!(
            SimTime::from_ticks(3).max(SimTime::from_ticks(7)),
            SimTime::from_ticks(7)
        );
    }

    #[test]
    fn test_sim_time_serde_transparent() {
        let json = serde_json::to_string(&SimTime::from_ticks(12)).unwrap();
        assert_eq!(json, "12");
    }

    #[test]
    fn test_initial_schedule_events() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 1, 10), TaskSpec::new(1, 1, 5)]);
        let engine = SimEngine::new(&config(20, 0, 1), &tasks).unwrap();
        assert_eq!(engine.log().len(), 2);
        assert_eq!(engine.log().count(EventKind::Schedule), 2);
        assert_eq!(engine.current_time(), SimTime::ZERO);
        assert!(!engine.is_finished());
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 1, 10)]);
        assert!(SimEngine::new(&config(20, 0, 0), &tasks).is_err());
        assert!(SimEngine::new(&config(20, 0, 1), &TaskSet::default()).is_err());
    }

    #[test]
    fn test_zero_timeout_runs_nothing() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 1, 10)]);
        let report = SimEngine::new(&config(0, 0, 1), &tasks)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].kind, EventKind::Schedule);
        assert!(report.events_of(EventKind::Timeout).next().is_none());
        assert_eq!(report.final_time, SimTime::ZERO);
        assert_eq!(report.counters[0].expected_total_job_instances, 0);
    }

    #[test]
    fn test_no_fault_periodic_trace() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 5, 10)]);
        let report = SimEngine::new(&config(20, 0, 1), &tasks)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(
            kinds(&report),
            vec![
                (0, EventKind::Schedule),
                (0, EventKind::Run),
                (5, EventKind::Finish),
                (5, EventKind::Schedule),
                (5, EventKind::Idle),
                (10, EventKind::Run),
                (15, EventKind::Finish),
                (15, EventKind::Schedule),
                (15, EventKind::Idle),
                (20, EventKind::Timeout),
            ]
        );
        assert!(report.is_schedulable());
        assert_eq!(report.counters[0].expected_total_job_instances, 2);
    }

    #[test]
    fn test_step_outcomes() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 5, 10)]);
        let mut engine = SimEngine::new(&config(20, 0, 1), &tasks).unwrap();

        assert_eq!(
            engine.step().unwrap(),
            StepOutcome::Completed {
                task: TaskId(0),
                outcome: FaultOutcome::Benign,
                decision: Reschedule::NextPeriod,
            }
        );
        assert_eq!(
            engine.step().unwrap(),
            StepOutcome::Idle {
                until: SimTime::from_ticks(10)
            }
        );
        while !engine.is_finished() {
            engine.step().unwrap();
        }
        assert_eq!(engine.step().unwrap(), StepOutcome::Finished);
        assert_eq!(engine.current_time(), SimTime::from_ticks(20));
    }

    #[test]
    fn test_exit_timeout_truncates() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 8, 10)]);
        let report = SimEngine::new(&config(15, 0, 1), &tasks)
            .unwrap()
            .run()
            .unwrap();
        let tail: Vec<_> = kinds(&report).into_iter().rev().take(2).collect();
        assert_eq!(
            tail,
            vec![(15, EventKind::Timeout), (15, EventKind::ExitTimeout)]
        );
        let exit = report.events_of(EventKind::ExitTimeout).next().unwrap();
        assert_eq!(exit.remaining_exec_time, Some(3));
    }

    #[test]
    fn test_retry_then_success() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 2, 10)]);
        let oracle = ScriptedOracle::new(vec![FaultOutcome::Due, FaultOutcome::Benign]);
        let report = SimEngine::with_oracle(&config(10, 1, 1), &tasks, oracle)
            .unwrap()
            .run()
            .unwrap();

        let resched = report.events_of(EventKind::Reschedule).next().unwrap();
        assert_eq!(resched.time, SimTime::from_ticks(2));
        assert_eq!(resched.arrival_time, Some(SimTime::from_ticks(2)));
        assert_eq!(resched.num_reexec, Some(1));
        assert_eq!(report.events_of(EventKind::Finish).count(), 2);
        assert!(report.is_schedulable());
    }

    #[test]
    fn test_report_export() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 5, 10)]);
        let report = SimEngine::new(&config(20, 0, 1), &tasks)
            .unwrap()
            .run()
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("trace.jsonl");
        let json = dir.path().join("report.json");
        report.write_trace_jsonl(&trace).unwrap();
        report.write_json(&json).unwrap();

        let lines = std::fs::read_to_string(&trace).unwrap();
        assert_eq!(lines.lines().count(), report.events.len());
        let first: TraceEvent = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
        assert_eq!(first, report.events[0]);

        let back: SimReport =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(back.digest, report.digest);
    }

    #[test]
    fn test_verify_reproducibility() {
        let tasks = TaskSet::new(vec![
            TaskSpec::new(0, 3, 10).with_probabilities(0.3, 0.6),
            TaskSpec::new(1, 2, 7).with_probabilities(0.2, 0.7),
        ]);
        let summary = verify_reproducibility(&config(200, 2, 1), &tasks, 3).unwrap();
        assert!(summary.identical);
        assert_eq!(summary.run_digests.len(), 3);
        assert!(verify_reproducibility(&config(200, 2, 1), &tasks, 0).is_err());
    }

    #[test]
    fn test_run_trials() {
        let tasks = TaskSet::new(vec![TaskSpec::new(0, 5, 10).with_probabilities(1.0, 0.0)]);
        let summary = run_trials(&config(20, 0, 1), &tasks, 4).unwrap();
        assert_eq!(summary.trials, 4);
        assert_eq!(summary.schedulable_trials, 0);
        assert_eq!(summary.per_task[0].overrun_drops, 8);
        assert_eq!(summary.per_task[0].expected_jobs_per_trial, 2);
        assert!(summary.schedulable_fraction().abs() < f64::EPSILON);
    }
}
