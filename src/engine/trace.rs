//! Append-only scheduling event log.
//!
//! Events are recorded in emission order. The log rejects any event whose
//! time is earlier than the previous one, and any event after the terminal
//! `timeout` marker.

use serde::{Deserialize, Serialize};

use crate::engine::fault::FaultOutcome;
use crate::engine::task::{JobState, Task, TaskId};
use crate::engine::SimTime;
use crate::error::{SimError, SimResult};

/// Kind of scheduling event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A job instance was released (initial or next period).
    #[serde(rename = "schedule")]
    Schedule,
    /// The same job instance was queued for re-execution.
    #[serde(rename = "reschedule")]
    Reschedule,
    /// A task was selected to run this step.
    #[serde(rename = "run")]
    Run,
    /// No task was ready.
    #[serde(rename = "IDLE")]
    Idle,
    /// An execution completed; the event carries the fault outcome.
    #[serde(rename = "finish")]
    Finish,
    /// The running task was preempted.
    #[serde(rename = "pause")]
    Pause,
    /// A job was dropped at its deadline.
    #[serde(rename = "drop(violation)")]
    DropViolation,
    /// A job was dropped after exhausting its re-execution budget.
    #[serde(rename = "drop(overrun)")]
    DropOverrun,
    /// The timeout truncated the running task.
    #[serde(rename = "exit(timeout)")]
    ExitTimeout,
    /// Terminal marker: the clock reached the timeout.
    #[serde(rename = "timeout")]
    Timeout,
}

impl EventKind {
    /// Label used in traces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Reschedule => "reschedule",
            Self::Run => "run",
            Self::Idle => "IDLE",
            Self::Finish => "finish",
            Self::Pause => "pause",
            Self::DropViolation => "drop(violation)",
            Self::DropOverrun => "drop(overrun)",
            Self::ExitTimeout => "exit(timeout)",
            Self::Timeout => "timeout",
        }
    }

    /// Job state the event leaves its task in, if it concerns a task.
    #[must_use]
    pub const fn job_state(self) -> Option<JobState> {
        match self {
            Self::Schedule | Self::Reschedule => Some(JobState::Pending),
            Self::Run | Self::ExitTimeout => Some(JobState::Running),
            Self::Pause => Some(JobState::Paused),
            Self::Finish => Some(JobState::Completed),
            Self::DropViolation => Some(JobState::DroppedViolation),
            Self::DropOverrun => Some(JobState::DroppedOverrun),
            Self::Idle | Self::Timeout => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable trace entry.
///
/// Task fields are `None` for `IDLE` and `timeout` markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Emission time.
    pub time: SimTime,
    /// Event kind.
    pub kind: EventKind,
    /// Task concerned.
    pub task_id: Option<TaskId>,
    /// Arrival time of the task's job at emission.
    pub arrival_time: Option<SimTime>,
    /// Remaining execution time at emission.
    pub remaining_exec_time: Option<u64>,
    /// Deadline of the task's job at emission.
    pub deadline: Option<SimTime>,
    /// Fault outcome (only on `finish`).
    pub fault_outcome: Option<FaultOutcome>,
    /// Re-execution counter at emission.
    pub num_reexec: Option<u32>,
    /// Success counter at emission.
    pub num_success: Option<u32>,
}

impl TraceEvent {
    /// Marker event with no task payload.
    #[must_use]
    pub const fn marker(time: SimTime, kind: EventKind) -> Self {
        Self {
            time,
            kind,
            task_id: None,
            arrival_time: None,
            remaining_exec_time: None,
            deadline: None,
            fault_outcome: None,
            num_reexec: None,
            num_success: None,
        }
    }

    /// Event carrying a snapshot of `task`.
    #[must_use]
    pub const fn for_task(time: SimTime, kind: EventKind, task: &Task) -> Self {
        Self {
            time,
            kind,
            task_id: Some(task.id),
            arrival_time: Some(task.arrival_time),
            remaining_exec_time: Some(task.remaining_exec_time),
            deadline: Some(task.deadline),
            fault_outcome: None,
            num_reexec: Some(task.num_reexec),
            num_success: Some(task.num_success),
        }
    }

    /// Attach a fault outcome.
    #[must_use]
    pub const fn with_outcome(mut self, outcome: FaultOutcome) -> Self {
        self.fault_outcome = Some(outcome);
        self
    }
}

/// Append-only, time-ordered event log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<TraceEvent>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    ///
    /// # Errors
    ///
    /// Returns `TraceOrder` if the event is earlier than the last one or
    /// the log is already closed by a `timeout` marker.
    pub fn record(&mut self, event: TraceEvent) -> SimResult<()> {
        if let Some(last) = self.events.last() {
            if last.kind == EventKind::Timeout {
                return Err(SimError::TraceOrder(format!(
                    "{} at {} after terminal timeout",
                    event.kind, event.time
                )));
            }
            if event.time < last.time {
                return Err(SimError::TraceOrder(format!(
                    "{} at {} precedes {} at {}",
                    event.kind, event.time, last.kind, last.time
                )));
            }
        }

        tracing::debug!(
            time = %event.time,
            kind = %event.kind,
            task = ?event.task_id,
            state = ?event.kind.job_state(),
            "trace event"
        );
        self.events.push(event);
        Ok(())
    }

    /// All events in emission order.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consume the log.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the terminal `timeout` marker has been recorded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.events
            .last()
            .is_some_and(|e| e.kind == EventKind::Timeout)
    }

    /// Number of events of a kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Events concerning one task.
    pub fn for_task(&self, id: TaskId) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(move |e| e.task_id == Some(id))
    }

    /// BLAKE3 digest (hex) over the bincode encoding of every event.
    ///
    /// # Errors
    ///
    /// Returns error if an event cannot be encoded.
    pub fn digest(&self) -> SimResult<String> {
        let mut hasher = blake3::Hasher::new();
        for event in &self.events {
            let bytes =
                bincode::serialize(event).map_err(|e| SimError::serialization(e.to_string()))?;
            hasher.update(&bytes);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}
