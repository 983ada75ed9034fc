//! Fault oracle: outcome of a completed execution.
//!
//! The sampling protocol is two-stage: an independent DUE draw first, then,
//! only if it missed, an independent benign draw. Anything else is silent
//! data corruption. This is not a single categorical draw and must not be
//! collapsed into one, or traces stop matching for a given seed.

use serde::{Deserialize, Serialize};

use crate::engine::rng::SimRng;
use crate::engine::task::TaskSpec;

/// Outcome of one completed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultOutcome {
    /// Detected uncorrectable error: the execution is rejected.
    Due,
    /// No error.
    Benign,
    /// Undetected corruption. The scheduler cannot tell it from `Benign`.
    SilentCorruption,
}

impl FaultOutcome {
    /// Whether the scheduler observes a failure.
    #[must_use]
    pub const fn is_due(self) -> bool {
        matches!(self, Self::Due)
    }

    /// Whether the execution counts toward `min_success`.
    ///
    /// Silent corruption is accepted: it is undetectable by construction.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        !self.is_due()
    }
}

impl std::fmt::Display for FaultOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Due => "DUE",
            Self::Benign => "BENIGN",
            Self::SilentCorruption => "SDC",
        };
        f.write_str(s)
    }
}

/// Source of fault outcomes for completed executions.
pub trait FaultOracle {
    /// Draw the outcome of one completed execution of `spec`.
    fn sample(&mut self, spec: &TaskSpec) -> FaultOutcome;
}

/// Randomized oracle using independent Bernoulli draws.
#[derive(Debug, Clone)]
pub struct BernoulliOracle {
    rng: SimRng,
}

impl BernoulliOracle {
    /// Create an oracle from a master seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::from_rng(SimRng::new(seed))
    }

    /// Create an oracle over an existing generator (e.g. a trial partition).
    #[must_use]
    pub const fn from_rng(rng: SimRng) -> Self {
        Self { rng }
    }

    /// Get the underlying generator.
    #[must_use]
    pub const fn rng(&self) -> &SimRng {
        &self.rng
    }
}

impl FaultOracle for BernoulliOracle {
    fn sample(&mut self, spec: &TaskSpec) -> FaultOutcome {
        if self.rng.bernoulli(spec.due_probability) {
            FaultOutcome::Due
        } else if self.rng.bernoulli(spec.benign_probability) {
            FaultOutcome::Benign
        } else {
            FaultOutcome::SilentCorruption
        }
    }
}

/// Oracle replaying a fixed outcome sequence, cycling when exhausted.
///
/// An empty script always yields `Benign`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    outcomes: Vec<FaultOutcome>,
    cursor: usize,
}

impl ScriptedOracle {
    /// Create an oracle over `outcomes`.
    #[must_use]
    pub fn new(outcomes: impl Into<Vec<FaultOutcome>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            cursor: 0,
        }
    }
}

impl FaultOracle for ScriptedOracle {
    fn sample(&mut self, _spec: &TaskSpec) -> FaultOutcome {
        if self.outcomes.is_empty() {
            return FaultOutcome::Benign;
        }
        let outcome = self.outcomes[self.cursor % self.outcomes.len()];
        self.cursor += 1;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(due: f64, benign: f64) -> TaskSpec {
        TaskSpec::new(0, 1, 10).with_probabilities(due, benign)
    }

    #[test]
    fn test_certain_due() {
        let mut oracle = BernoulliOracle::new(42);
        for _ in 0..100 {
            assert_eq!(oracle.sample(&spec(1.0, 0.0)), FaultOutcome::Due);
        }
    }

    #[test]
    fn test_certain_benign() {
        let mut oracle = BernoulliOracle::new(42);
        for _ in 0..100 {
            assert_eq!(oracle.sample(&spec(0.0, 1.0)), FaultOutcome::Benign);
        }
    }

    #[test]
    fn test_certain_sdc() {
        let mut oracle = BernoulliOracle::new(42);
        for _ in 0..100 {
            assert_eq!(oracle.sample(&spec(0.0, 0.0)), FaultOutcome::SilentCorruption);
        }
    }

    #[test]
    fn test_two_stage_consumes_second_draw_only_on_miss() {
        // DUE hit: one draw consumed, so the next value matches the root's second draw.
        let mut oracle = BernoulliOracle::new(9);
        let mut mirror = SimRng::new(9);
        let _ = oracle.sample(&spec(1.0, 0.0));
        let _ = mirror.gen_f64();
        assert_eq!(oracle.rng().clone().gen_f64(), mirror.gen_f64());

        // DUE miss: two draws consumed.
        let mut oracle = BernoulliOracle::new(9);
        let mut mirror = SimRng::new(9);
        let _ = oracle.sample(&spec(0.0, 1.0));
        let _ = mirror.gen_f64();
        let _ = mirror.gen_f64();
        assert_eq!(oracle.rng().clone().gen_f64(), mirror.gen_f64());
    }

    #[test]
    fn test_two_stage_frequencies() {
        let s = spec(0.5, 0.5);
        let mut oracle = BernoulliOracle::new(1234);
        let n = 40_000;
        let mut counts = [0usize; 3];
        for _ in 0..n {
            match oracle.sample(&s) {
                FaultOutcome::Due => counts[0] += 1,
                FaultOutcome::Benign => counts[1] += 1,
                FaultOutcome::SilentCorruption => counts[2] += 1,
            }
        }
        let (due, benign, sdc) = s.outcome_probabilities();
        let expected = [due, benign, sdc];
        for (count, p) in counts.iter().zip(expected) {
            let freq = *count as f64 / f64::from(n);
            assert!((freq - p).abs() < 0.02, "freq {freq} vs expected {p}");
        }
    }

    #[test]
    fn test_sdc_is_accepted() {
        assert!(FaultOutcome::SilentCorruption.is_accepted());
        assert!(FaultOutcome::Benign.is_accepted());
        assert!(!FaultOutcome::Due.is_accepted());
    }

    #[test]
    fn test_display() {
        assert_eq!(FaultOutcome::Due.to_string(), "DUE");
        assert_eq!(FaultOutcome::Benign.to_string(), "BENIGN");
        assert_eq!(FaultOutcome::SilentCorruption.to_string(), "SDC");
    }

    #[test]
    fn test_scripted_cycles() {
        let mut oracle = ScriptedOracle::new(vec![FaultOutcome::Due, FaultOutcome::Benign]);
        let s = spec(0.0, 1.0);
        let drawn: Vec<_> = (0..5).map(|_| oracle.sample(&s)).collect();
        assert_eq!(
            drawn,
            vec![
                FaultOutcome::Due,
                FaultOutcome::Benign,
                FaultOutcome::Due,
                FaultOutcome::Benign,
                FaultOutcome::Due,
            ]
        );
    }

    #[test]
    fn test_scripted_empty_is_benign() {
        let mut oracle = ScriptedOracle::default();
        assert_eq!(oracle.sample(&spec(1.0, 0.0)), FaultOutcome::Benign);
    }
}
