//! Simulation state management.
//!
//! Tasks live in an indexed arena: `specs[i]`, `tasks[i]` and `counters[i]`
//! describe the same task for the whole run. Scheduling code passes indices
//! around, never references into the arena.

use serde::{Deserialize, Serialize};

use crate::engine::task::{Task, TaskId, TaskSet, TaskSpec};

/// Per-task drop tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounter {
    /// Task id.
    pub task_id: TaskId,
    /// Drops caused by an exhausted re-execution budget.
    pub num_overrun_drops: u64,
    /// Drops caused by reaching the deadline.
    pub num_violation_drops: u64,
    /// `floor(timeout / period)`.
    pub expected_total_job_instances: u64,
}

impl ViolationCounter {
    /// Fresh counter for `spec` under `timeout`.
    #[must_use]
    pub const fn new(spec: &TaskSpec, timeout: u64) -> Self {
        Self {
            task_id: spec.id,
            num_overrun_drops: 0,
            num_violation_drops: 0,
            expected_total_job_instances: spec.expected_jobs(timeout),
        }
    }

    /// Total drops of either kind.
    #[must_use]
    pub const fn total_drops(&self) -> u64 {
        self.num_overrun_drops + self.num_violation_drops
    }
}

/// Simulation state.
///
/// Contains everything the decision engine reads and mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimState {
    specs: Vec<TaskSpec>,
    tasks: Vec<Task>,
    counters: Vec<ViolationCounter>,
}

impl SimState {
    /// Build the initial state: one first job instance per spec.
    #[must_use]
    pub fn new(set: &TaskSet, timeout: u64) -> Self {
        let specs = set.tasks.clone();
        let tasks = specs.iter().map(Task::first_job).collect();
        let counters = specs
            .iter()
            .map(|spec| ViolationCounter::new(spec, timeout))
            .collect();
        Self {
            specs,
            tasks,
            counters,
        }
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Static specs, in input order.
    #[must_use]
    pub fn specs(&self) -> &[TaskSpec] {
        &self.specs
    }

    /// Current job records, in input order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Drop counters, in input order.
    #[must_use]
    pub fn counters(&self) -> &[ViolationCounter] {
        &self.counters
    }

    /// Spec at `idx`.
    #[must_use]
    pub fn spec(&self, idx: usize) -> &TaskSpec {
        &self.specs[idx]
    }

    /// Job record at `idx`.
    #[must_use]
    pub fn task(&self, idx: usize) -> &Task {
        &self.tasks[idx]
    }

    /// Mutable job record at `idx`.
    pub fn task_mut(&mut self, idx: usize) -> &mut Task {
        &mut self.tasks[idx]
    }

    /// Mutable counter at `idx`.
    pub fn counter_mut(&mut self, idx: usize) -> &mut ViolationCounter {
        &mut self.counters[idx]
    }

    /// Run `elapsed` ticks of the job at `idx`.
    ///
    /// Remaining work saturates at zero.
    pub fn execute(&mut self, idx: usize, elapsed: u64) {
        let task = &mut self.tasks[idx];
        task.remaining_exec_time = task.remaining_exec_time.saturating_sub(elapsed);
    }

    /// Sum of drops of both kinds over all tasks.
    #[must_use]
    pub fn total_drops(&self) -> u64 {
        self.counters.iter().map(ViolationCounter::total_drops).sum()
    }
}
