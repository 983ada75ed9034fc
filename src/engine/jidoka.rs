//! Jidoka (自働化) - stop the line on a broken invariant.
//!
//! The guard runs after every simulation step and checks the data-model
//! invariants of the scheduler state:
//!
//! 1. **Horizon**: the clock never passes the timeout
//! 2. **Window**: every job arrives no later than its deadline
//! 3. **Conservation**: remaining work never exceeds the execution time
//! 4. **Budget**: `num_reexec <= max_reexec` and `num_success <= min_success`
//!
//! Degenerate steps (a selected task that makes no progress) are legal and
//! only counted and logged.

use serde::{Deserialize, Serialize};

use crate::engine::clock::SimClock;
use crate::engine::policy::ReexecPolicy;
use crate::engine::state::SimState;
use crate::engine::task::TaskId;
use crate::engine::SimTime;
use crate::error::{SimError, SimResult};

/// Jidoka violation types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JidokaViolation {
    /// Clock moved past the global timeout.
    ClockPastTimeout {
        /// Current time.
        time: SimTime,
        /// Global horizon.
        timeout: SimTime,
    },
    /// A job arrives after its own deadline.
    ArrivalAfterDeadline {
        /// Offending task.
        task: TaskId,
        /// Arrival time.
        arrival: SimTime,
        /// Deadline.
        deadline: SimTime,
    },
    /// More work remains than one execution costs.
    RemainingExceedsExecution {
        /// Offending task.
        task: TaskId,
        /// Remaining ticks.
        remaining: u64,
        /// Nominal execution time.
        execution_time: u64,
    },
    /// Re-executions exceed the budget.
    ReexecOverBudget {
        /// Offending task.
        task: TaskId,
        /// Observed re-executions.
        num_reexec: u32,
        /// Budget.
        max_reexec: u32,
    },
    /// Accepted executions exceed the requirement without a period change.
    SuccessOverRequirement {
        /// Offending task.
        task: TaskId,
        /// Observed successes.
        num_success: u32,
        /// Requirement.
        min_success: u32,
    },
}

impl JidokaViolation {
    /// Short invariant name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ClockPastTimeout { .. } => "horizon",
            Self::ArrivalAfterDeadline { .. } => "window",
            Self::RemainingExceedsExecution { .. } => "conservation",
            Self::ReexecOverBudget { .. } => "reexec_budget",
            Self::SuccessOverRequirement { .. } => "success_bound",
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::ClockPastTimeout { time, timeout } => {
                format!("clock {time} past timeout {timeout}")
            }
            Self::ArrivalAfterDeadline {
                task,
                arrival,
                deadline,
            } => format!("task {task} arrives at {arrival} after deadline {deadline}"),
            Self::RemainingExceedsExecution {
                task,
                remaining,
                execution_time,
            } => format!("task {task} has {remaining} ticks left of {execution_time}"),
            Self::ReexecOverBudget {
                task,
                num_reexec,
                max_reexec,
            } => format!("task {task} re-executed {num_reexec} times, budget {max_reexec}"),
            Self::SuccessOverRequirement {
                task,
                num_success,
                min_success,
            } => format!("task {task} holds {num_success} successes, requirement {min_success}"),
        }
    }
}

impl From<JidokaViolation> for SimError {
    fn from(v: JidokaViolation) -> Self {
        Self::invariant(v.name(), v.detail())
    }
}

/// Jidoka guard configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JidokaConfig {
    /// Check state invariants after every step.
    pub check_invariants: bool,
    /// Log a warning for zero-elapsed task steps.
    pub warn_degenerate_steps: bool,
}

impl Default for JidokaConfig {
    fn default() -> Self {
        Self {
            check_invariants: true,
            warn_degenerate_steps: true,
        }
    }
}

/// Jidoka guard for the scheduler state.
#[derive(Debug, Clone, Default)]
pub struct JidokaGuard {
    config: JidokaConfig,
    degenerate_steps: u64,
}

impl JidokaGuard {
    /// Create a new guard.
    #[must_use]
    pub const fn new(config: JidokaConfig) -> Self {
        Self {
            config,
            degenerate_steps: 0,
        }
    }

    /// Guard configuration.
    #[must_use]
    pub const fn config(&self) -> &JidokaConfig {
        &self.config
    }

    /// Zero-elapsed task steps seen so far.
    #[must_use]
    pub const fn degenerate_steps(&self) -> u64 {
        self.degenerate_steps
    }

    /// Record the elapsed time of a task step.
    pub fn note_elapsed(&mut self, task: TaskId, now: SimTime, elapsed: u64) {
        if elapsed > 0 {
            return;
        }
        self.degenerate_steps += 1;
        if self.config.warn_degenerate_steps {
            tracing::warn!(
                task = %task,
                time = %now,
                "task selected but no time elapses before the next boundary"
            );
        }
    }

    /// Check state invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a `SimError`.
    pub fn check(
        &self,
        state: &SimState,
        clock: &SimClock,
        policy: &ReexecPolicy,
    ) -> SimResult<()> {
        if !self.config.check_invariants {
            return Ok(());
        }
        self.find_violation(state, clock, policy)
            .map_or(Ok(()), |v| Err(v.into()))
    }

    /// First violated invariant, if any.
    #[must_use]
    pub fn find_violation(
        &self,
        state: &SimState,
        clock: &SimClock,
        policy: &ReexecPolicy,
    ) -> Option<JidokaViolation> {
        if clock.current_time() > clock.timeout() {
            return Some(JidokaViolation::ClockPastTimeout {
                time: clock.current_time(),
                timeout: clock.timeout(),
            });
        }

        state
            .specs()
            .iter()
            .zip(state.tasks())
            .find_map(|(spec, task)| {
                if task.arrival_time > task.deadline {
                    Some(JidokaViolation::ArrivalAfterDeadline {
                        task: task.id,
                        arrival: task.arrival_time,
                        deadline: task.deadline,
                    })
                } else if task.remaining_exec_time > spec.execution_time {
                    Some(JidokaViolation::RemainingExceedsExecution {
                        task: task.id,
                        remaining: task.remaining_exec_time,
                        execution_time: spec.execution_time,
                    })
                } else if task.num_reexec > policy.max_reexec {
                    Some(JidokaViolation::ReexecOverBudget {
                        task: task.id,
                        num_reexec: task.num_reexec,
                        max_reexec: policy.max_reexec,
                    })
                } else if task.num_success > policy.min_success {
                    Some(JidokaViolation::SuccessOverRequirement {
                        task: task.id,
                        num_success: task.num_success,
                        min_success: policy.min_success,
                    })
                } else {
                    None
                }
            })
    }
}
