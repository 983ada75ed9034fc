//! # edfsim
//!
//! Deterministic simulation of a preemptive, single-processor
//! Earliest-Deadline-First scheduler under a probabilistic fault model.
//!
//! Completed executions are classified as DUE, benign or silent corruption.
//! A bounded re-execution policy retries failed job instances; job
//! instances that exhaust the budget or reach their deadline are dropped
//! and counted. Every decision is appended to a time-ordered event log.
//!
//! ## Example
//!
//! ```rust
//! use edfsim::prelude::*;
//!
//! let config = SimConfig::builder()
//!     .seed(42)
//!     .timeout(20)
//!     .max_reexec(1)
//!     .min_success(1)
//!     .build();
//! let tasks = TaskSet::new(vec![TaskSpec::new(0, 5, 10)]);
//!
//! let report = SimEngine::new(&config, &tasks)?.run()?;
//! assert!(report.is_schedulable());
//! # Ok::<(), SimError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_const_for_fn,  // Many functions can't be const in stable Rust
)]

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{SimConfig, SimConfigBuilder};
    pub use crate::engine::fault::{BernoulliOracle, FaultOracle, FaultOutcome, ScriptedOracle};
    pub use crate::engine::jidoka::{JidokaConfig, JidokaGuard, JidokaViolation};
    pub use crate::engine::rng::SimRng;
    pub use crate::engine::task::{TaskId, TaskSet, TaskSpec};
    pub use crate::engine::trace::{EventKind, EventLog, TraceEvent};
    pub use crate::engine::{SimEngine, SimReport, SimState, SimTime, StepOutcome};
    pub use crate::error::{SimError, SimResult};
}

/// Re-export for public API
pub use error::{SimError, SimResult};
