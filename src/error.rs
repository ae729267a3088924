//! Error types and handling for variant-lab.
//!
//! Every failure the audit, oracle, harness and coordinator can produce is a
//! variant of [`LabError`]. Each one carries enough context (names, inputs,
//! expected and observed values) to reproduce the failure without re-running.

use thiserror::Error;

/// Result type alias for variant-lab operations.
pub type Result<T> = std::result::Result<T, LabError>;

/// Comprehensive error type for variant-lab operations.
///
/// Failures are scoped: the coordinator records them against the subject,
/// group or variant that produced them and carries on with the rest of the
/// experiment.
#[derive(Debug, Error)]
pub enum LabError {
    /// A subject's computed size disagrees with its declared size.
    #[error("layout mismatch for {subject}: expected {expected_size} bytes, computed {actual_size} bytes")]
    LayoutMismatch {
        /// Subject under audit
        subject: String,
        /// Size the experiment depends on
        expected_size: usize,
        /// Size produced by the layout computation
        actual_size: usize,
    },

    /// A single field landed at a different offset than declared.
    #[error("offset mismatch for {subject}.{field}: expected offset {expected}, computed {actual}")]
    OffsetMismatch {
        /// Subject under audit
        subject: String,
        /// Field whose offset drifted
        field: String,
        /// Declared offset
        expected: usize,
        /// Computed offset
        actual: usize,
    },

    /// Two variants of one group disagree on the output for an input.
    ///
    /// A divergent group is never measured.
    #[error(
        "variant divergence in {group}: {variant_a} -> {output_a}, {variant_b} -> {output_b} for input {input}"
    )]
    VariantDivergence {
        /// Variant group being verified
        group: String,
        /// Reference variant
        variant_a: String,
        /// Variant that disagreed with the reference
        variant_b: String,
        /// Debug rendering of the first offending input
        input: String,
        /// Reference output
        output_a: String,
        /// Disagreeing output
        output_b: String,
    },

    /// Zero iteration or time budget.
    #[error("invalid budget: {reason}")]
    InvalidBudget {
        /// What was wrong with the budget
        reason: String,
    },

    /// A variant failed while being verified or measured.
    #[error("variant {variant} failed on input {input}: {reason}")]
    VariantExecutionFailure {
        /// Variant that failed
        variant: String,
        /// Debug rendering of the input it failed on
        input: String,
        /// Failure reported by the variant body
        reason: String,
    },

    /// A group was registered without any variants.
    #[error("variant group {group} has no variants")]
    EmptyGroup {
        /// Empty group
        group: String,
    },

    /// A group refers to a subject the experiment never registered.
    #[error("group {group} refers to unknown subject {subject}")]
    UnknownSubject {
        /// Group with the dangling reference
        group: String,
        /// Missing subject
        subject: String,
    },

    /// Two registrations share a name where names must be unique.
    #[error("duplicate {kind} name: {name}")]
    DuplicateName {
        /// What kind of entity was duplicated (experiment, subject, variant, group)
        kind: &'static str,
        /// The duplicated name
        name: String,
    },

    /// A subject's audit failed, so its groups were not run.
    #[error("subject {subject} failed its layout audit; group not run")]
    SubjectBlocked {
        /// Subject whose audit failed
        subject: String,
    },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Standard I/O error.
    ///
    /// Raised while acquiring run-scoped resources such as null-device handles
    /// or temporary files, and by file log outputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A report could not be serialized.
    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LabError {
    /// Whether this error is one of the two correctness failures that make a
    /// comparison meaningless (as opposed to configuration or execution errors).
    pub fn is_correctness_failure(&self) -> bool {
        matches!(
            self,
            LabError::LayoutMismatch { .. }
                | LabError::OffsetMismatch { .. }
                | LabError::VariantDivergence { .. }
        )
    }
}

/// Failure returned by a variant body.
///
/// Kept deliberately small so variant bodies stay cheap; the oracle and the
/// harness attach the variant name and the input when converting it into
/// [`LabError::VariantExecutionFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct VariantFailure(pub String);

impl VariantFailure {
    /// Create a failure from any displayable reason.
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self(reason.to_string())
    }
}

impl From<std::io::Error> for VariantFailure {
    fn from(error: std::io::Error) -> Self {
        Self(error.to_string())
    }
}

// Reports and errors cross thread boundaries (spawned workers, async runtimes)
static_assertions::assert_impl_all!(LabError: Send, Sync);
static_assertions::assert_impl_all!(VariantFailure: Send, Sync, Clone);
