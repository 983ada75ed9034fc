//! Configuration system with YAML schema and validation.
//!
//! Implements Poka-Yoke (mistake-proofing) through:
//! - Type-safe configuration structs
//! - Field validation via `validator`
//! - Runtime semantic validation

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::engine::jidoka::JidokaConfig;
use crate::engine::policy::ReexecPolicy;
use crate::error::{SimError, SimResult};

/// Top-level simulation configuration.
///
/// Loaded from YAML files with full schema validation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Simulation metadata.
    #[serde(default)]
    pub simulation: SimulationMeta,

    /// Reproducibility settings.
    #[serde(default)]
    pub reproducibility: ReproducibilityConfig,

    /// Re-execution policy.
    #[validate(nested)]
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Simulation horizon.
    #[serde(default)]
    pub horizon: HorizonConfig,

    /// Jidoka (stop-on-error) configuration.
    #[serde(default)]
    pub jidoka: JidokaConfig,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl SimConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Create a builder for configuration.
    #[must_use]
    pub fn builder() -> SimConfigBuilder {
        SimConfigBuilder::default()
    }

    /// Run field and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns the first constraint violation found.
    pub fn check(&self) -> SimResult<()> {
        self.validate_semantic()?;
        self.validate()?;
        Ok(())
    }

    /// Validate semantic constraints beyond schema.
    fn validate_semantic(&self) -> SimResult<()> {
        if self.policy.min_success == 0 {
            return Err(SimError::config(
                "min_success must be at least 1: a job instance needs one accepted execution",
            ));
        }
        Ok(())
    }

    /// The re-execution policy described by this configuration.
    #[must_use]
    pub const fn reexec_policy(&self) -> ReexecPolicy {
        ReexecPolicy::new(self.policy.max_reexec, self.policy.min_success)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            simulation: SimulationMeta::default(),
            reproducibility: ReproducibilityConfig::default(),
            policy: PolicyConfig::default(),
            horizon: HorizonConfig::default(),
            jidoka: JidokaConfig::default(),
        }
    }
}

/// Configuration builder for programmatic construction.
#[derive(Debug, Default)]
pub struct SimConfigBuilder {
    seed: Option<u64>,
    timeout: Option<u64>,
    max_reexec: Option<u32>,
    min_success: Option<u32>,
    jidoka: Option<JidokaConfig>,
}

impl SimConfigBuilder {
    /// Set the random seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the global timeout in ticks.
    #[must_use]
    pub const fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the re-execution budget.
    #[must_use]
    pub const fn max_reexec(mut self, max_reexec: u32) -> Self {
        self.max_reexec = Some(max_reexec);
        self
    }

    /// Set the accepted executions required per job instance.
    #[must_use]
    pub const fn min_success(mut self, min_success: u32) -> Self {
        self.min_success = Some(min_success);
        self
    }

    /// Set Jidoka configuration.
    #[must_use]
    pub const fn jidoka(mut self, config: JidokaConfig) -> Self {
        self.jidoka = Some(config);
        self
    }

    /// Build the configuration.
    ///
    /// Validation is deferred to [`SimConfig::check`].
    #[must_use]
    pub fn build(self) -> SimConfig {
        let mut config = SimConfig::default();

        if let Some(seed) = self.seed {
            config.reproducibility.seed = seed;
        }
        if let Some(timeout) = self.timeout {
            config.horizon.timeout = timeout;
        }
        if let Some(max_reexec) = self.max_reexec {
            config.policy.max_reexec = max_reexec;
        }
        if let Some(min_success) = self.min_success {
            config.policy.min_success = min_success;
        }
        if let Some(jidoka) = self.jidoka {
            config.jidoka = jidoka;
        }

        config
    }
}

/// Simulation metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationMeta {
    /// Simulation name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

/// Reproducibility settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReproducibilityConfig {
    /// Master seed for all RNG.
    pub seed: u64,
}

impl Default for ReproducibilityConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

/// Re-execution policy parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Maximum re-executions per job instance.
    #[serde(default)]
    pub max_reexec: u32,
    /// Accepted executions required before the next period.
    #[validate(range(min = 1))]
    #[serde(default = "default_min_success")]
    pub min_success: u32,
}

const fn default_min_success() -> u32 {
    1
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_reexec: 0,
            min_success: default_min_success(),
        }
    }
}

/// Simulation horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HorizonConfig {
    /// Global timeout in ticks. Zero runs nothing.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

const fn default_timeout() -> u64 {
    1000
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}
