//! Warm-up-then-measure timing of a single verified variant.
//!
//! The harness only accepts a [`VerifiedGroup`], so a group the oracle has
//! not passed cannot be timed. Each run measures exactly one variant; inputs
//! are generated before the stopwatch starts and every result is written to
//! the caller's [`Sink`].

use std::fmt::Debug;
use std::time::Duration;

use crate::config::{Budget, HarnessConfig};
use crate::error::{LabError, Result};
use crate::oracle::VerifiedGroup;
use crate::perf::Stopwatch;
use crate::sink::Sink;
use crate::variant::{Strategy, Variant};

/// Iterations executed between clock reads under a time budget.
pub const TIME_CHECK_BATCH: u64 = 64;

/// Where a measurement belongs in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels<'a> {
    /// Experiment name
    pub experiment: &'a str,
    /// Subject name
    pub subject: &'a str,
}

impl<'a> Labels<'a> {
    /// Labels for one experiment/subject pair.
    pub fn new(experiment: &'a str, subject: &'a str) -> Self {
        Self {
            experiment,
            subject,
        }
    }
}

/// Raw result of one measurement run.
///
/// Created once per run and never mutated. The derived costs are computed
/// from the raw `(elapsed, iterations)` pair, which stays available for
/// other normalizations.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    experiment: String,
    subject: String,
    group: String,
    variant: String,
    strategy: Strategy,
    iterations: u64,
    elapsed: Duration,
}

impl Measurement {
    /// Experiment name.
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Subject name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Variant group name.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Variant name.
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Strategy of the measured variant.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Timed invocations.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Total timed duration.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Nanoseconds per invocation.
    pub fn cost_per_op_ns(&self) -> f64 {
        self.elapsed.as_nanos() as f64 / self.iterations as f64
    }

    /// Nanoseconds per unit when every invocation processes `units_per_op`
    /// units (bytes, parts, elements). Zero units yields `None`.
    pub fn cost_per_unit_ns(&self, units_per_op: u64) -> Option<f64> {
        (units_per_op > 0).then(|| self.cost_per_op_ns() / units_per_op as f64)
    }
}

/// Outcome of one variant within [`MeasurementHarness::measure_group`].
#[derive(Debug)]
pub struct VariantMeasurement {
    /// Variant name
    pub variant: String,
    /// Measurement, or the failure that aborted this variant's run
    pub result: Result<Measurement>,
}

/// Drives warm-up and timed invocation of one variant at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementHarness {
    config: HarnessConfig,
}

impl MeasurementHarness {
    /// Harness with the given configuration.
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Measure one variant of a verified group.
    ///
    /// Fails with [`LabError::InvalidBudget`] before touching the stopwatch
    /// when the budget is zero, and with
    /// [`LabError::VariantExecutionFailure`] when the variant fails during
    /// warm-up or timing; a failed run never yields a measurement.
    pub fn measure<I, O>(
        &self,
        labels: Labels<'_>,
        verified: &VerifiedGroup<'_, I, O>,
        variant: &str,
        generator: &dyn Fn(u64) -> I,
        sink: &mut Sink<O>,
    ) -> Result<Measurement>
    where
        I: Debug,
    {
        self.config.budget.validate()?;
        if self.config.input_pool == 0 {
            return Err(LabError::InvalidConfig(
                "input pool must hold at least one input".to_string(),
            ));
        }

        let group = verified.group();
        let variant = group.variant(variant).ok_or_else(|| {
            LabError::InvalidConfig(format!(
                "variant {} is not part of group {}",
                variant,
                group.name()
            ))
        })?;

        let inputs_checked = verified.record().inputs_checked;
        if self.config.input_pool as u64 > inputs_checked {
            return Err(LabError::InvalidConfig(format!(
                "input pool of {} exceeds the {} inputs verified for group {}",
                self.config.input_pool,
                inputs_checked,
                group.name()
            )));
        }

        let pool: Vec<I> = (0..self.config.input_pool as u64)
            .map(generator)
            .collect();
        let mut cursor = PoolCursor::new(pool.len());

        let mut watch = Stopwatch::new();
        watch.start();

        for _ in 0..self.config.warmup_iterations {
            step(variant, &pool[cursor.advance()], sink)?;
        }

        watch.reset();
        let iterations = match self.config.budget {
            Budget::Iterations(n) => {
                for _ in 0..n {
                    step(variant, &pool[cursor.advance()], sink)?;
                }
                n
            }
            Budget::Time(limit) => {
                let mut done = 0u64;
                loop {
                    for _ in 0..TIME_CHECK_BATCH {
                        step(variant, &pool[cursor.advance()], sink)?;
                    }
                    done += TIME_CHECK_BATCH;
                    if watch.elapsed() >= limit {
                        break done;
                    }
                }
            }
        };
        watch.stop();

        Ok(Measurement {
            experiment: labels.experiment.to_string(),
            subject: labels.subject.to_string(),
            group: group.name().to_string(),
            variant: variant.name().to_string(),
            strategy: variant.strategy(),
            iterations,
            elapsed: watch.elapsed(),
        })
    }

    /// Measure every variant of a verified group, one after another.
    ///
    /// Each variant gets a fresh sink. A failing variant records its error
    /// and the remaining variants are still measured. An invalid budget is
    /// rejected for the whole group up front.
    pub fn measure_group<I, O>(
        &self,
        labels: Labels<'_>,
        verified: &VerifiedGroup<'_, I, O>,
        generator: &dyn Fn(u64) -> I,
    ) -> Result<Vec<VariantMeasurement>>
    where
        I: Debug,
    {
        self.config.budget.validate()?;

        Ok(verified
            .variants()
            .iter()
            .map(|variant| {
                let mut sink = Sink::new();
                VariantMeasurement {
                    variant: variant.name().to_string(),
                    result: self.measure(labels, verified, variant.name(), generator, &mut sink),
                }
            })
            .collect())
    }
}

impl Default for MeasurementHarness {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}

/// Wrapping index into the input pool.
struct PoolCursor {
    next: usize,
    len: usize,
}

impl PoolCursor {
    fn new(len: usize) -> Self {
        Self { next: 0, len }
    }

    #[inline(always)]
    fn advance(&mut self) -> usize {
        let current = self.next;
        self.next += 1;
        if self.next == self.len {
            self.next = 0;
        }
        current
    }
}

#[inline(always)]
fn step<I: Debug, O>(variant: &Variant<I, O>, input: &I, sink: &mut Sink<O>) -> Result<()> {
    match variant.invoke(input) {
        Ok(output) => {
            sink.write(output);
            Ok(())
        }
        Err(failure) => Err(LabError::VariantExecutionFailure {
            variant: variant.name().to_string(),
            input: format!("{:?}", input),
            reason: failure.to_string(),
        }),
    }
}
