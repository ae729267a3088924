//! Configuration for audits, verification, measurement and logging.
//!
//! Presets cover the common cases: [`LabConfig::quick`] for tests and smoke
//! runs, [`LabConfig::thorough`] for numbers worth publishing and
//! [`LabConfig::development`] when debugging an experiment.

use crate::error::{LabError, Result};
use crate::logging::LogLevel;
use std::time::Duration;

/// Complete configuration of a coordinator run.
#[derive(Debug, Clone, Default)]
pub struct LabConfig {
    /// Layout audit configuration
    pub layout: LayoutConfig,
    /// Correctness oracle configuration
    pub oracle: OracleConfig,
    /// Measurement harness configuration
    pub harness: HarnessConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Layout audit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Target pointer width in bytes
    pub pointer_width: usize,
}

/// Correctness oracle configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleConfig {
    /// Number of generated inputs every variant must agree on
    pub samples: u64,
}

/// When a measurement run stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Exactly this many timed invocations
    Iterations(u64),
    /// Invoke until this much time has been measured
    Time(Duration),
}

impl Budget {
    /// Reject budgets that would measure nothing.
    pub fn validate(&self) -> Result<()> {
        match self {
            Budget::Iterations(0) => Err(LabError::InvalidBudget {
                reason: "iteration budget must be greater than zero".to_string(),
            }),
            Budget::Time(limit) if limit.is_zero() => Err(LabError::InvalidBudget {
                reason: "time budget must be greater than zero".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Measurement harness configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Untimed invocations before the stopwatch is reset
    pub warmup_iterations: u64,
    /// Timed work per variant
    pub budget: Budget,
    /// Distinct inputs generated before timing and cycled through while timing
    pub input_pool: usize,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Minimum log level
    pub level: LogLevel,
    /// Log file path (None = console only)
    pub log_file: Option<std::path::PathBuf>,
    /// Use JSON format for logs
    pub json_format: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            pointer_width: std::mem::size_of::<usize>(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self { samples: 10_000 }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: 100,
            budget: Budget::Iterations(100_000),
            input_pool: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: LogLevel::Info,
            log_file: None,
            json_format: false,
        }
    }
}

impl LabConfig {
    /// Small budgets for tests and smoke runs.
    pub fn quick() -> Self {
        Self {
            oracle: OracleConfig { samples: 1_000 },
            harness: HarnessConfig {
                warmup_iterations: 10,
                budget: Budget::Iterations(1_000),
                input_pool: 1,
            },
            ..Default::default()
        }
    }

    /// Long, time-bounded runs with a full warm-up.
    pub fn thorough() -> Self {
        Self {
            oracle: OracleConfig { samples: 10_000 },
            harness: HarnessConfig {
                warmup_iterations: 10_000,
                budget: Budget::Time(Duration::from_secs(1)),
                input_pool: 1,
            },
            logging: LoggingConfig {
                enabled: true,
                level: LogLevel::Info,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Verbose logging with moderate budgets.
    pub fn development() -> Self {
        Self {
            oracle: OracleConfig { samples: 1_000 },
            harness: HarnessConfig {
                warmup_iterations: 10,
                budget: Budget::Iterations(10_000),
                input_pool: 16,
            },
            logging: LoggingConfig {
                enabled: true,
                level: LogLevel::Debug,
                log_file: Some("variant-lab.log".into()),
                json_format: false,
            },
            ..Default::default()
        }
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.layout.pointer_width.is_power_of_two() {
            return Err(LabError::InvalidConfig(format!(
                "pointer width {} is not a power of two",
                self.layout.pointer_width
            )));
        }

        if self.oracle.samples == 0 {
            return Err(LabError::InvalidConfig(
                "oracle samples must be greater than zero".to_string(),
            ));
        }

        self.harness.budget.validate()?;

        if self.harness.input_pool == 0 {
            return Err(LabError::InvalidConfig(
                "input pool must hold at least one input".to_string(),
            ));
        }

        // The harness draws its pool from the same indices the oracle checks
        if self.harness.input_pool as u64 > self.oracle.samples {
            return Err(LabError::InvalidConfig(format!(
                "input pool of {} exceeds the {} inputs the oracle verifies",
                self.harness.input_pool, self.oracle.samples
            )));
        }

        Ok(())
    }
}

/// Configuration builder for fluent configuration creation.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: LabConfig,
}

impl ConfigBuilder {
    /// Create a builder starting from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. a preset.
    pub fn from_config(config: LabConfig) -> Self {
        Self { config }
    }

    /// Set the target pointer width.
    pub fn pointer_width(mut self, bytes: usize) -> Self {
        self.config.layout.pointer_width = bytes;
        self
    }

    /// Set the number of oracle samples.
    pub fn samples(mut self, samples: u64) -> Self {
        self.config.oracle.samples = samples;
        self
    }

    /// Set the warm-up iteration count.
    pub fn warmup(mut self, iterations: u64) -> Self {
        self.config.harness.warmup_iterations = iterations;
        self
    }

    /// Set the measurement budget.
    pub fn budget(mut self, budget: Budget) -> Self {
        self.config.harness.budget = budget;
        self
    }

    /// Set the input pool size.
    pub fn input_pool(mut self, size: usize) -> Self {
        self.config.harness.input_pool = size;
        self
    }

    /// Set logging configuration.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Result<LabConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
