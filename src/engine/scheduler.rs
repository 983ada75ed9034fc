//! EDF selection with deterministic ordering.
//!
//! Every decision is a pure function of the job records and the current
//! time:
//! - Ready tasks keep input order, so EDF ties go to the first one.
//! - Pending tasks are stable-sorted by arrival, so the preemption scan is
//!   first-match in arrival order.
//! - Boundary ties resolve as finish/preemption, then deadline, then timeout.

use serde::{Deserialize, Serialize};

use crate::engine::task::{JobState, Task};
use crate::engine::SimTime;

/// Arena indices split by readiness at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Arrived tasks, in input order.
    pub ready: Vec<usize>,
    /// Pending tasks, ascending arrival time (stable).
    pub not_ready: Vec<usize>,
}

/// Split tasks into ready and pending at `now`.
#[must_use]
pub fn partition(tasks: &[Task], now: SimTime) -> Partition {
    let (ready, mut not_ready): (Vec<usize>, Vec<usize>) =
        (0..tasks.len()).partition(|&i| tasks[i].state_at(now) == JobState::Ready);
    not_ready.sort_by_key(|&i| tasks[i].arrival_time);
    Partition { ready, not_ready }
}

/// Ready task with the earliest deadline; first in input order on ties.
#[must_use]
pub fn select_edf(tasks: &[Task], ready: &[usize]) -> Option<usize> {
    ready.iter().copied().min_by_key(|&i| tasks[i].deadline)
}

/// First pending task (arrival order) that would preempt `running`.
///
/// A candidate must have a strictly earlier deadline and arrive strictly
/// before `running` would finish.
#[must_use]
pub fn find_preemptor(
    tasks: &[Task],
    not_ready: &[usize],
    running: usize,
    now: SimTime,
) -> Option<usize> {
    let current = &tasks[running];
    let finish = current.finish_time(now);
    not_ready.iter().copied().find(|&i| {
        let t = &tasks[i];
        t.deadline < current.deadline && t.arrival_time < finish
    })
}

/// What ends the running task's step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// The execution completes.
    Finish,
    /// A higher-priority task arrives.
    Preemption {
        /// Arena index of the preemptor.
        by: usize,
    },
    /// The job's deadline is reached first.
    Deadline,
    /// The global timeout is reached first.
    Timeout,
}

/// Scheduling decision for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Nothing is ready; sleep until the next arrival or the timeout.
    Idle {
        /// Wake-up time.
        until: SimTime,
    },
    /// Run a task up to a boundary.
    Run {
        /// Arena index of the selected task.
        task: usize,
        /// Time the step ends.
        until: SimTime,
        /// Event that ends the step.
        boundary: Boundary,
    },
}

/// Pick the earliest of the primary boundary, the deadline and the timeout.
///
/// Ties resolve in that order.
#[must_use]
pub fn earliest_boundary(
    primary: (SimTime, Boundary),
    deadline: SimTime,
    timeout: SimTime,
) -> (SimTime, Boundary) {
    let until = primary.0.min(deadline).min(timeout);
    let boundary = if until == primary.0 {
        primary.1
    } else if until == deadline {
        Boundary::Deadline
    } else {
        Boundary::Timeout
    };
    (until, boundary)
}

/// Decide the next step at `now`.
#[must_use]
pub fn plan(tasks: &[Task], now: SimTime, timeout: SimTime) -> Plan {
    let Partition { ready, not_ready } = partition(tasks, now);

    let Some(running) = select_edf(tasks, &ready) else {
        let until = not_ready
            .first()
            .map_or(timeout, |&i| tasks[i].arrival_time.min(timeout));
        return Plan::Idle { until };
    };

    let task = &tasks[running];
    let primary = match find_preemptor(tasks, &not_ready, running, now) {
        Some(by) => (tasks[by].arrival_time, Boundary::Preemption { by }),
        None => (task.finish_time(now), Boundary::Finish),
    };
    let (until, boundary) = earliest_boundary(primary, task.deadline, timeout);

    tracing::debug!(
        now = %now,
        task = %task.id,
        deadline = %task.deadline,
        until = %until,
        ?boundary,
        "edf selection"
    );

    Plan::Run {
        task: running,
        until,
        boundary,
    }
}
