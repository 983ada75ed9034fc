//! Error types for edfsim.
//!
//! Every fallible operation returns `Result<T, SimError>` instead of
//! panicking. Temporal consistency faults are logic defects: the engine
//! returns them immediately and the driver aborts the run.

use thiserror::Error;

use crate::engine::task::TaskId;
use crate::engine::SimTime;

/// Result type alias for edfsim operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all edfsim operations.
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Configuration Errors =====
    /// Invalid configuration parameter or task set.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing or encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // ===== Temporal Consistency Faults =====
    /// The clock was asked to move backward.
    #[error("Temporal fault: clock asked to move back from {current} to {requested}")]
    ClockBackward {
        /// Clock value before the request.
        current: SimTime,
        /// Requested target time.
        requested: SimTime,
    },

    /// An advance would move the clock past the global timeout.
    #[error("Temporal fault: time {time} exceeds timeout {timeout}")]
    TimeoutExceeded {
        /// Requested time.
        time: SimTime,
        /// Global horizon.
        timeout: SimTime,
    },

    /// The reschedule policy observed a job whose deadline already passed.
    #[error("Temporal fault: task {task} rescheduled at {time}, past its deadline {deadline}")]
    DeadlineExceeded {
        /// Offending task.
        task: TaskId,
        /// Current time.
        time: SimTime,
        /// Job deadline.
        deadline: SimTime,
    },

    // ===== Jidoka Violations =====
    /// A data-model invariant failed after a step.
    #[error("Jidoka: invariant '{name}' violated: {detail}")]
    InvariantViolation {
        /// Invariant name.
        name: String,
        /// What was observed.
        detail: String,
    },

    /// An event was appended out of time order or after the terminal event.
    #[error("Jidoka: event log order violated: {0}")]
    TraceOrder(String),

    // ===== I/O Errors =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create an invariant violation.
    #[must_use]
    pub fn invariant(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Check if this error is a temporal consistency fault (logic defect).
    #[must_use]
    pub const fn is_temporal_fault(&self) -> bool {
        matches!(
            self,
            Self::ClockBackward { .. } | Self::TimeoutExceeded { .. } | Self::DeadlineExceeded { .. }
        )
    }

    /// Check if this error was raised by the Jidoka guard.
    #[must_use]
    pub const fn is_jidoka_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. } | Self::TraceOrder(_))
    }
}
