//! Behavioral equivalence check run before any timing.
//!
//! Timing a variant that computes something different from its siblings
//! compares nothing. [`CorrectnessOracle::verify`] runs every variant of a
//! group on the same deterministic inputs and stops at the first
//! disagreement. Only a [`VerifiedGroup`], which the oracle alone can
//! produce, is accepted by the measurement harness.

use std::fmt::Debug;

use crate::config::OracleConfig;
use crate::error::{LabError, Result};
use crate::variant::{Variant, VariantGroup};

/// Output type whose values can be compared across variants.
///
/// Integer, text and structural outputs compare exactly. Floating-point
/// outputs compare by bit pattern: every variant performs the same
/// operations in the same order, so identical bits are achievable and any
/// tolerance would hide real divergence.
pub trait Observation: Debug {
    /// Whether two outputs count as the same observable result.
    fn agrees_with(&self, other: &Self) -> bool;
}

macro_rules! exact_observation {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Observation for $ty {
                #[inline]
                fn agrees_with(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

exact_observation!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    String,
    &'static str,
);

impl Observation for f64 {
    fn agrees_with(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl Observation for f32 {
    fn agrees_with(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl<T: Observation> Observation for Option<T> {
    fn agrees_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.agrees_with(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: Observation> Observation for Vec<T> {
    fn agrees_with(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.agrees_with(b))
    }
}

impl<A: Observation, B: Observation> Observation for (A, B) {
    fn agrees_with(&self, other: &Self) -> bool {
        self.0.agrees_with(&other.0) && self.1.agrees_with(&other.1)
    }
}

/// What the oracle observed for a group that passed.
#[derive(Debug, Clone)]
pub struct CorrectnessRecord<O> {
    /// Group name
    pub group: String,
    /// Number of inputs every variant agreed on
    pub inputs_checked: u64,
    /// Each variant's output for the last checked input, in registration order
    pub outputs: Vec<(String, O)>,
}

impl<O> CorrectnessRecord<O> {
    /// Output a variant produced for the last checked input.
    pub fn output(&self, variant: &str) -> Option<&O> {
        self.outputs
            .iter()
            .find(|(name, _)| name == variant)
            .map(|(_, output)| output)
    }
}

/// A group whose variants were shown to agree.
///
/// Borrowing the group keeps the experiment's registration immutable while
/// the proof of agreement travels to the harness.
#[derive(Debug)]
pub struct VerifiedGroup<'g, I, O> {
    group: &'g VariantGroup<I, O>,
    record: CorrectnessRecord<O>,
}

impl<'g, I, O> VerifiedGroup<'g, I, O> {
    /// The verified group.
    pub fn group(&self) -> &'g VariantGroup<I, O> {
        self.group
    }

    /// Variants in registration order.
    pub fn variants(&self) -> &'g [Variant<I, O>] {
        self.group.variants()
    }

    /// Evidence collected during verification.
    pub fn record(&self) -> &CorrectnessRecord<O> {
        &self.record
    }
}

/// Runs every variant of a group on the same generated inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectnessOracle {
    samples: u64,
}

impl CorrectnessOracle {
    /// Inputs checked when no configuration says otherwise.
    pub const DEFAULT_SAMPLES: u64 = 10_000;

    /// Oracle checking `samples` inputs per group.
    pub fn new(samples: u64) -> Self {
        Self { samples }
    }

    /// Oracle configured from [`OracleConfig`].
    pub fn from_config(config: &OracleConfig) -> Self {
        Self::new(config.samples)
    }

    /// Number of inputs checked per group.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Verify that all variants agree on inputs `generator(0..samples)`.
    ///
    /// Inputs are derived from their index, so a pass or a failure reproduces
    /// exactly on every run.
    pub fn verify<'g, I, O>(
        &self,
        group: &'g VariantGroup<I, O>,
        generator: &dyn Fn(u64) -> I,
    ) -> Result<VerifiedGroup<'g, I, O>>
    where
        I: Debug,
        O: Observation,
    {
        if self.samples == 0 {
            return Err(LabError::InvalidConfig(
                "oracle samples must be greater than zero".to_string(),
            ));
        }

        let Some((reference, others)) = group.variants().split_first() else {
            return Err(LabError::EmptyGroup {
                group: group.name().to_string(),
            });
        };

        if let Some(name) = group.duplicate_name() {
            return Err(LabError::DuplicateName {
                kind: "variant",
                name: name.to_string(),
            });
        }

        let mut outputs = Vec::new();
        for index in 0..self.samples {
            let input = generator(index);
            let expected = run(reference, &input)?;

            let mut observed = Vec::with_capacity(others.len());
            for variant in others {
                let output = run(variant, &input)?;
                if !expected.agrees_with(&output) {
                    return Err(LabError::VariantDivergence {
                        group: group.name().to_string(),
                        variant_a: reference.name().to_string(),
                        variant_b: variant.name().to_string(),
                        input: format!("{:?}", input),
                        output_a: format!("{:?}", expected),
                        output_b: format!("{:?}", output),
                    });
                }
                observed.push((variant.name().to_string(), output));
            }

            if index + 1 == self.samples {
                outputs.push((reference.name().to_string(), expected));
                outputs.extend(observed);
            }
        }

        Ok(VerifiedGroup {
            group,
            record: CorrectnessRecord {
                group: group.name().to_string(),
                inputs_checked: self.samples,
                outputs,
            },
        })
    }
}

impl Default for CorrectnessOracle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SAMPLES)
    }
}

fn run<I: Debug, O>(variant: &Variant<I, O>, input: &I) -> Result<O> {
    variant
        .invoke(input)
        .map_err(|failure| LabError::VariantExecutionFailure {
            variant: variant.name().to_string(),
            input: format!("{:?}", input),
            reason: failure.to_string(),
        })
}
