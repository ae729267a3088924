//! # Variant Lab: audit, verify, then measure
//!
//! A harness for micro-benchmarks that compare interchangeable
//! implementations ("variants") of the same operation. A timing is only
//! reported once two things have been established:
//!
//! - **Layout**: the value types under test have the size and field offsets
//!   the experiment assumes, checked against a layout model and, where the
//!   type is a Rust struct, against the compiler's own layout.
//! - **Equivalence**: every variant in a group produces the same observable
//!   output for the same deterministic inputs.
//!
//! Only then does the harness warm each variant up and time it under a fixed
//! iteration or time budget, writing every result to a [`Sink`] so the
//! optimizer cannot remove the work being timed.
//!
//! ## Quick Start
//!
//! ```rust
//! use variant_lab::{
//!     Coordinator, ConfigBuilder, Budget, Experiment, Strategy, Subject, Variant, VariantGroup,
//! };
//!
//! # fn main() -> variant_lab::Result<()> {
//! let doubles = VariantGroup::new("double")
//!     .with(Variant::infallible("add", Strategy::direct(), |x: &u64| x + x))
//!     .with(Variant::infallible("shift", Strategy::direct(), |x: &u64| x << 1));
//!
//! let experiment = Experiment::builder("arithmetic")
//!     .subject(Subject::opaque("u64"))
//!     .group("u64", doubles, |index| index)
//!     .build()?;
//!
//! let config = ConfigBuilder::new()
//!     .samples(100)
//!     .budget(Budget::Iterations(1_000))
//!     .build()?;
//! let mut coordinator = Coordinator::with_config(config)?;
//!
//! let report = coordinator.run(&experiment);
//! assert!(report.is_clean());
//! println!("{}", report.render_table());
//! # Ok(())
//! # }
//! ```
//!
//! ## Built-in experiments
//!
//! [`experiments::catalog`] registers the bundled experiments: receiver
//! passing, composite map keys, struct padding, string concatenation,
//! spawn-and-wait synchronization, and write paths.
//!
//! ## Failure model
//!
//! A subject whose layout audit fails blocks every group that depends on it.
//! A group whose variants diverge is reported with the first disagreeing
//! input and never timed. A variant that fails while being timed loses its
//! measurement; the rest of its group is still measured.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, rust_2018_idioms)]

// Building blocks
pub mod error;
pub mod layout; // Layout model and size audit
pub mod oracle; // Cross-variant equivalence checking
pub mod sink; // Anti-optimization sink
pub mod variant;

// Measurement and orchestration
pub mod config; // Configuration presets and builder
pub mod experiment; // Registration and the coordinator
pub mod experiments; // Built-in experiment catalog
pub mod harness; // Warm-up and timed measurement
pub mod logging; // Structured logging
pub mod perf; // Stopwatch and phase counters
pub mod report;

// Re-exports for convenience
pub use config::{
    Budget, ConfigBuilder, HarnessConfig, LabConfig, LayoutConfig, LoggingConfig, OracleConfig,
};
pub use error::{LabError, Result, VariantFailure};
pub use experiment::{Coordinator, Experiment, ExperimentBuilder, Registry, Subject};
pub use harness::{Labels, Measurement, MeasurementHarness, VariantMeasurement};
pub use layout::{
    compute_layout, ComputedLayout, FieldKind, FieldSpec, LayoutReport, NativeLayout, SizeAudit,
    SubjectLayout,
};
pub use logging::{LogLevel, Logger};
pub use oracle::{CorrectnessOracle, CorrectnessRecord, Observation, VerifiedGroup};
pub use perf::{PerfStats, PhaseRegistry, Stopwatch};
pub use report::{
    AuditStatus, ExperimentReport, FailureRow, GroupReport, GroupStatus, ReportRow, SubjectReport,
};
pub use sink::Sink;
pub use variant::{Dispatch, Inlining, Strategy, Variant, VariantGroup, VariantResult};
