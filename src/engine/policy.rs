//! Bounded re-execution policy.
//!
//! Applied whenever a job instance completes an execution or reaches its
//! deadline. Decides between advancing to the next period, retrying the same
//! instance, or dropping it (violation or overrun) and then advancing.

use serde::{Deserialize, Serialize};

use crate::engine::state::SimState;
use crate::engine::task::{Task, TaskSpec};
use crate::engine::trace::{EventKind, EventLog, TraceEvent};
use crate::engine::SimTime;
use crate::error::{SimError, SimResult};

/// Outcome of one reschedule decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reschedule {
    /// Acceptance met: release the next job instance.
    NextPeriod,
    /// Re-execute the same job instance.
    Retry,
    /// Deadline reached: drop, then release the next instance.
    DropViolation,
    /// Budget exhausted: drop, then release the next instance.
    DropOverrun,
}

/// Re-execution budget and acceptance requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReexecPolicy {
    /// Maximum re-executions per job instance.
    pub max_reexec: u32,
    /// Accepted executions required before the next period.
    pub min_success: u32,
}

impl Default for ReexecPolicy {
    fn default() -> Self {
        Self {
            max_reexec: 0,
            min_success: 1,
        }
    }
}

impl ReexecPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_reexec: u32, min_success: u32) -> Self {
        Self {
            max_reexec,
            min_success,
        }
    }

    /// Decide what happens to `task` at `now`.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` if the job must be rescheduled after its
    /// deadline has already passed.
    pub fn decide(&self, task: &Task, now: SimTime, has_due: bool) -> SimResult<Reschedule> {
        if !has_due && task.num_success == self.min_success {
            return Ok(Reschedule::NextPeriod);
        }
        if task.num_reexec < self.max_reexec && now < task.deadline {
            return Ok(Reschedule::Retry);
        }
        if now == task.deadline {
            return Ok(Reschedule::DropViolation);
        }
        if now > task.deadline {
            return Err(SimError::DeadlineExceeded {
                task: task.id,
                time: now,
                deadline: task.deadline,
            });
        }
        Ok(Reschedule::DropOverrun)
    }

    /// Decide and apply the reschedule of the task at `idx`.
    ///
    /// Drop events snapshot the job before it is reset; the following
    /// `schedule` event describes the next instance.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` from [`Self::decide`] or a trace error.
    pub fn apply(
        &self,
        state: &mut SimState,
        idx: usize,
        now: SimTime,
        has_due: bool,
        log: &mut EventLog,
    ) -> SimResult<Reschedule> {
        let decision = self.decide(state.task(idx), now, has_due)?;
        tracing::debug!(
            task = %state.task(idx).id,
            now = %now,
            has_due,
            num_reexec = state.task(idx).num_reexec,
            num_success = state.task(idx).num_success,
            ?decision,
            "reschedule"
        );

        match decision {
            Reschedule::Retry => {
                let execution_time = state.spec(idx).execution_time;
                let task = state.task_mut(idx);
                task.arrival_time = now;
                task.num_reexec += 1;
                task.remaining_exec_time = execution_time;
                log.record(TraceEvent::for_task(now, EventKind::Reschedule, task))?;
                return Ok(decision);
            }
            Reschedule::DropViolation => {
                state.counter_mut(idx).num_violation_drops += 1;
                log.record(TraceEvent::for_task(
                    now,
                    EventKind::DropViolation,
                    state.task(idx),
                ))?;
            }
            Reschedule::DropOverrun => {
                state.counter_mut(idx).num_overrun_drops += 1;
                log.record(TraceEvent::for_task(
                    now,
                    EventKind::DropOverrun,
                    state.task(idx),
                ))?;
            }
            Reschedule::NextPeriod => {}
        }

        let spec = state.spec(idx).clone();
        let task = state.task_mut(idx);
        advance_period(task, &spec);
        log.record(TraceEvent::for_task(now, EventKind::Schedule, task))?;
        Ok(decision)
    }
}

/// Release the next job instance: it arrives at the old deadline.
pub fn advance_period(task: &mut Task, spec: &TaskSpec) {
    task.arrival_time = task.deadline;
    task.deadline = task.deadline.add_ticks(spec.period);
    task.remaining_exec_time = spec.execution_time;
    task.num_reexec = 0;
    task.num_success = 0;
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification: a retry never pushes num_reexec past the budget.
        #[test]
        fn prop_bounded_retries(
            max_reexec in 0u32..5,
            min_success in 1u32..4,
            num_reexec in 0u32..5,
            num_success in 0u32..4,
            now in 0u64..10,
            has_due in any::<bool>(),
        ) {
            prop_assume!(num_reexec <= max_reexec && num_success <= min_success);
            let policy = ReexecPolicy::new(max_reexec, min_success);
            let mut task = Task::first_job(&TaskSpec::new(0, 3, 10));
            task.num_reexec = num_reexec;
            task.num_success = num_success;

            if let Ok(Reschedule::Retry) = policy.decide(&task, SimTime::from_ticks(now), has_due) {
                prop_assert!(num_reexec < max_reexec);
            }
        }

        /// Falsification: a DUE never advances the period unless the budget or the deadline is spent.
        #[test]
        fn prop_acceptance_gate(
            max_reexec in 0u32..5,
            num_reexec in 0u32..5,
            now in 0u64..=10,
        ) {
            prop_assume!(num_reexec <= max_reexec);
            let policy = ReexecPolicy::new(max_reexec, 1);
            let mut task = Task::first_job(&TaskSpec::new(0, 3, 10));
            task.num_reexec = num_reexec;
            task.num_success = 1;

            let decision = policy.decide(&task, SimTime::from_ticks(now), true);
            prop_assert!(decision.is_ok());
            match decision.ok() {
                Some(Reschedule::NextPeriod) => prop_assert!(false, "DUE advanced the period"),
                Some(Reschedule::DropOverrun) => prop_assert_eq!(num_reexec, max_reexec),
                Some(Reschedule::DropViolation) => prop_assert_eq!(now, 10),
                _ => {}
            }
        }
    }
}
