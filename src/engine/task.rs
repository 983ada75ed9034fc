//! Task model: static specs and mutable job-instance records.
//!
//! A [`TaskSpec`] is loaded once and never mutated. A [`Task`] tracks the
//! current job instance of one spec and is mutated only by the engine.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::SimTime;
use crate::error::{SimError, SimResult};

/// Tolerance when checking `due + benign <= 1`.
const PROBABILITY_EPSILON: f64 = 1e-9;

/// Externally supplied task identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static per-task parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
    /// Unique task id.
    pub id: TaskId,
    /// Nominal cost of one execution, in ticks.
    #[validate(range(min = 1))]
    pub execution_time: u64,
    /// Period, in ticks.
    #[validate(range(min = 1))]
    pub period: u64,
    /// Probability that a completed execution raises a DUE.
    #[validate(range(min = 0.0, max = 1.0))]
    pub due_probability: f64,
    /// Probability that a non-DUE execution is benign.
    #[validate(range(min = 0.0, max = 1.0))]
    pub benign_probability: f64,
    /// Arrival time of the first job instance.
    #[serde(default)]
    pub offset: u64,
    /// Absolute deadline of the first job instance (default `offset + period`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_deadline: Option<u64>,
}

impl TaskSpec {
    /// Create a fault-free spec released at time zero.
    #[must_use]
    pub const fn new(id: u32, execution_time: u64, period: u64) -> Self {
        Self {
            id: TaskId(id),
            execution_time,
            period,
            due_probability: 0.0,
            benign_probability: 1.0,
            offset: 0,
            initial_deadline: None,
        }
    }

    /// Set the fault probabilities.
    #[must_use]
    pub const fn with_probabilities(mut self, due: f64, benign: f64) -> Self {
        self.due_probability = due;
        self.benign_probability = benign;
        self
    }

    /// Set the first arrival time.
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the first absolute deadline.
    #[must_use]
    pub const fn with_initial_deadline(mut self, deadline: u64) -> Self {
        self.initial_deadline = Some(deadline);
        self
    }

    /// Arrival time of the first job instance.
    #[must_use]
    pub const fn first_arrival(&self) -> SimTime {
        SimTime::from_ticks(self.offset)
    }

    /// Deadline of the first job instance.
    #[must_use]
    pub fn first_deadline(&self) -> SimTime {
        SimTime::from_ticks(
            self.initial_deadline
                .unwrap_or_else(|| self.offset.saturating_add(self.period)),
        )
    }

    /// Processor utilization `C / T`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        self.execution_time as f64 / self.period as f64
    }

    /// Effective `(due, benign, sdc)` probabilities under the two-stage draw.
    ///
    /// The benign draw only happens when the DUE draw misses, so
    /// `benign = (1 - p_due) * p_benign` and the remainder is silent corruption.
    #[must_use]
    pub fn outcome_probabilities(&self) -> (f64, f64, f64) {
        let due = self.due_probability;
        let benign = (1.0 - due) * self.benign_probability;
        (due, benign, (1.0 - due - benign).max(0.0))
    }

    /// Job instances whose whole window fits in `timeout`: `floor(timeout / period)`.
    #[must_use]
    pub const fn expected_jobs(&self, timeout: u64) -> u64 {
        timeout / self.period
    }
}

/// Ordered, validated collection of task specs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TaskSet {
    /// Specs in input order. Input order is the EDF tie-break order.
    #[validate(nested)]
    pub tasks: Vec<TaskSpec>,
}

impl TaskSet {
    /// Create a task set from specs.
    #[must_use]
    pub const fn new(tasks: Vec<TaskSpec>) -> Self {
        Self { tasks }
    }

    /// Load a task set from a YAML or JSON file (by extension).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse a task set from YAML.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let set: Self = serde_yaml::from_str(yaml)?;
        set.check()?;
        Ok(set)
    }

    /// Parse a task set from JSON.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let set: Self = serde_json::from_str(json)?;
        set.check()?;
        Ok(set)
    }

    /// Run field and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn check(&self) -> SimResult<()> {
        if self.tasks.is_empty() {
            return Err(SimError::config("task set is empty"));
        }

        let mut seen = HashSet::with_capacity(self.tasks.len());
        for spec in &self.tasks {
            if spec.execution_time == 0 {
                return Err(SimError::config(format!(
                    "task {}: execution_time is 0, min_success can never be met",
                    spec.id
                )));
            }
            if spec.period == 0 {
                return Err(SimError::config(format!(
                    "task {}: period must be positive",
                    spec.id
                )));
            }
            for (name, p) in [
                ("due_probability", spec.due_probability),
                ("benign_probability", spec.benign_probability),
            ] {
                if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                    return Err(SimError::config(format!(
                        "task {}: {name} = {p} is not a probability in [0, 1]",
                        spec.id
                    )));
                }
            }
            if spec.due_probability + spec.benign_probability > 1.0 + PROBABILITY_EPSILON {
                return Err(SimError::config(format!(
                    "task {}: due_probability + benign_probability = {} exceeds 1",
                    spec.id,
                    spec.due_probability + spec.benign_probability
                )));
            }
            if spec.first_deadline() < spec.first_arrival() {
                return Err(SimError::config(format!(
                    "task {}: initial deadline {} precedes offset {}",
                    spec.id,
                    spec.first_deadline(),
                    spec.offset
                )));
            }
            if !seen.insert(spec.id) {
                return Err(SimError::config(format!("duplicate task id {}", spec.id)));
            }
        }

        self.validate()?;
        Ok(())
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate specs in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, TaskSpec> {
        self.tasks.iter()
    }

    /// Total utilization `sum(C / T)`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        self.tasks.iter().map(TaskSpec::utilization).sum()
    }
}

/// Lifecycle state of a job instance at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Not yet arrived.
    Pending,
    /// Arrived and waiting for the processor.
    Ready,
    /// Selected for execution this step.
    Running,
    /// Preempted with work retained.
    Paused,
    /// Execution finished and outcome applied.
    Completed,
    /// Deadline reached before completion.
    DroppedViolation,
    /// Re-execution budget exhausted.
    DroppedOverrun,
}

/// Mutable record of a task's current job instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task id.
    pub id: TaskId,
    /// Absolute deadline of the current job.
    pub deadline: SimTime,
    /// Arrival time of the current job (or of its latest retry).
    pub arrival_time: SimTime,
    /// Work left in the current execution.
    pub remaining_exec_time: u64,
    /// Re-executions of the current job instance.
    pub num_reexec: u32,
    /// Accepted executions of the current job instance.
    pub num_success: u32,
}

impl Task {
    /// First job instance of a spec.
    #[must_use]
    pub fn first_job(spec: &TaskSpec) -> Self {
        Self {
            id: spec.id,
            deadline: spec.first_deadline(),
            arrival_time: spec.first_arrival(),
            remaining_exec_time: spec.execution_time,
            num_reexec: 0,
            num_success: 0,
        }
    }

    /// Whether the job has arrived at `now`.
    #[must_use]
    pub fn is_ready(&self, now: SimTime) -> bool {
        self.arrival_time <= now
    }

    /// Pending or Ready, as seen from `now`.
    #[must_use]
    pub fn state_at(&self, now: SimTime) -> JobState {
        if self.is_ready(now) {
            JobState::Ready
        } else {
            JobState::Pending
        }
    }

    /// Completion time if the job ran uninterrupted from `now`.
    #[must_use]
    pub const fn finish_time(&self, now: SimTime) -> SimTime {
        now.add_ticks(self.remaining_exec_time)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_set() -> TaskSet {
        TaskSet::new(vec![
            TaskSpec::new(0, 5, 10),
            TaskSpec::new(1, 2, 20).with_probabilities(0.1, 0.8),
        ])
    }

    #[test]
    fn test_spec_defaults() {
        let spec = TaskSpec::new(3, 5, 10);
        assert_eq!(spec.first_arrival(), SimTime::ZERO);
        assert_eq!(spec.first_deadline(), SimTime::from_ticks(10));
        assert!((spec.utilization() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_spec_offset_and_deadline() {
        let spec = TaskSpec::new(1, 2, 100)
            .with_offset(10)
            .with_initial_deadline(15);
        assert_eq!(spec.first_arrival(), SimTime::from_ticks(10));
        assert_eq!(spec.first_deadline(), SimTime::from_ticks(15));

        let spec = TaskSpec::new(1, 2, 100).with_offset(10);
        assert_eq!(spec.first_deadline(), SimTime::from_ticks(110));
    }

    #[test]
    fn test_outcome_probabilities_two_stage() {
        let spec = TaskSpec::new(0, 1, 1).with_probabilities(0.5, 0.5);
        let (due, benign, sdc) = spec.outcome_probabilities();
        assert!((due - 0.5).abs() < 1e-12);
        assert!((benign - 0.25).abs() < 1e-12);
        assert!((sdc - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_expected_jobs_floor() {
        let spec = TaskSpec::new(0, 1, 7);
        assert_eq!(spec.expected_jobs(20), 2);
        assert_eq!(spec.expected_jobs(21), 3);
        assert_eq!(spec.expected_jobs(6), 0);
    }

    #[test]
    fn test_taskset_check_ok() {
        assert!(sample_set().check().is_ok());
        assert!((sample_set().utilization() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_taskset_empty_rejected() {
        let err = TaskSet::default().check().unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_zero_execution_time_rejected() {
        let set = TaskSet::new(vec![TaskSpec::new(0, 0, 10)]);
        let err = set.check().unwrap_err();
        assert!(err.to_string().contains("execution_time"));
    }

    #[test]
    fn test_zero_period_rejected() {
        let set = TaskSet::new(vec![TaskSpec::new(0, 1, 0).with_initial_deadline(5)]);
        let err = set.check().unwrap_err();
        assert!(err.to_string().contains("period"));
    }

    #[test]
    fn test_probability_sum_rejected() {
        let set = TaskSet::new(vec![TaskSpec::new(0, 1, 10).with_probabilities(0.6, 0.6)]);
        let err = set.check().unwrap_err();
        assert!(err.to_string().contains("exceeds 1"));
    }

    #[test]
    fn test_probability_range_rejected() {
        let set = TaskSet::new(vec![TaskSpec::new(0, 1, 10).with_probabilities(-0.1, 0.5)]);
        let err = set.check().unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
        assert!(err.to_string().contains("due_probability"));
    }

    #[test]
    fn test_nan_probability_rejected() {
        let yaml = r"
tasks:
  - id: 0
    execution_time: 2
    period: 10
    due_probability: .nan
    benign_probability: 0.5
";
        let err = TaskSet::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("due_probability"));

        let set = TaskSet::new(vec![
            TaskSpec::new(0, 1, 10).with_probabilities(0.1, f64::NAN)
        ]);
        let err = set.check().unwrap_err();
        assert!(err.to_string().contains("benign_probability"));
    }

    #[test]
    fn test_infinite_probability_rejected() {
        let set = TaskSet::new(vec![
            TaskSpec::new(0, 1, 10).with_probabilities(f64::INFINITY, 0.0)
        ]);
        assert!(set.check().is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let set = TaskSet::new(vec![TaskSpec::new(4, 1, 10), TaskSpec::new(4, 2, 20)]);
        let err = set.check().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_deadline_before_offset_rejected() {
        let set = TaskSet::new(vec![TaskSpec::new(0, 1, 10)
            .with_offset(10)
            .with_initial_deadline(5)]);
        assert!(set.check().is_err());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r"
tasks:
  - id: 0
    execution_time: 5
    period: 10
    due_probability: 0.01
    benign_probability: 0.9
  - id: 1
    execution_time: 2
    period: 100
    due_probability: 0.0
    benign_probability: 1.0
    offset: 10
    initial_deadline: 15
";
        let set = TaskSet::from_yaml(yaml).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.tasks[1].first_deadline(), SimTime::from_ticks(15));
    }

    #[test]
    fn test_from_yaml_unknown_field() {
        let yaml = r"
tasks:
  - id: 0
    execution_time: 5
    period: 10
    due_probability: 0.0
    benign_probability: 1.0
    priority: 3
";
        assert!(matches!(TaskSet::from_yaml(yaml), Err(SimError::YamlParse(_))));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"tasks":[{"id":2,"execution_time":3,"period":9,
            "due_probability":0.2,"benign_probability":0.5}]}"#;
        let set = TaskSet::from_json(json).unwrap();
        assert_eq!(set.tasks[0].id, TaskId(2));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("set.json");
        std::fs::write(
            &json_path,
            serde_json::to_string(&sample_set()).unwrap(),
        )
        .unwrap();
        assert_eq!(TaskSet::load(&json_path).unwrap(), sample_set());

        let yaml_path = dir.path().join("set.yaml");
        std::fs::write(&yaml_path, serde_yaml::to_string(&sample_set()).unwrap()).unwrap();
        assert_eq!(TaskSet::load(&yaml_path).unwrap(), sample_set());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            TaskSet::load("/nonexistent/set.yaml"),
            Err(SimError::Io(_))
        ));
    }

    #[test]
    fn test_task_first_job() {
        let spec = TaskSpec::new(9, 4, 12).with_offset(3);
        let task = Task::first_job(&spec);
        assert_eq!(task.id, TaskId(9));
        assert_eq!(task.arrival_time, SimTime::from_ticks(3));
        assert_eq!(task.deadline, SimTime::from_ticks(15));
        assert_eq!(task.remaining_exec_time, 4);
        assert_eq!(task.num_reexec, 0);
        assert_eq!(task.num_success, 0);
    }

    #[test]
    fn test_task_state_at() {
        let task = Task::first_job(&TaskSpec::new(0, 4, 12).with_offset(3));
        assert_eq!(task.state_at(SimTime::from_ticks(2)), JobState::Pending);
        assert_eq!(task.state_at(SimTime::from_ticks(3)), JobState::Ready);
        assert_eq!(task.finish_time(SimTime::from_ticks(3)), SimTime::from_ticks(7));
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(42).to_string(), "42");
    }
}
