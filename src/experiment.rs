//! Experiment registration and the coordinator that runs it.
//!
//! An [`Experiment`] is a set of subjects plus variant groups that operate on
//! them. The [`Coordinator`] runs one experiment at a time in three strictly
//! sequential phases:
//!
//! 1. audit every subject's layout,
//! 2. verify each group with the oracle (skipped when its subject failed),
//! 3. measure each verified group's variants one after another.
//!
//! Failures are recorded against the subject, group or variant that caused
//! them; the rest of the experiment still runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::time::Instant;

use crate::config::LabConfig;
use crate::error::{LabError, Result};
use crate::harness::{Labels, MeasurementHarness};
use crate::layout::{NativeLayout, SizeAudit, SubjectLayout};
use crate::logging::{self, LogEntry, LogLevel};
use crate::oracle::{CorrectnessOracle, Observation};
use crate::perf::{PerfStats, PhaseRegistry};
use crate::report::{AuditStatus, ExperimentReport, GroupReport, GroupStatus, SubjectReport};
use crate::variant::VariantGroup;

/// Input generator: deterministic function of the sample index.
pub type Generator<I> = Box<dyn Fn(u64) -> I + Send + Sync>;

/// A value type an experiment compares variants on.
#[derive(Debug, Clone)]
pub struct Subject {
    name: String,
    layout: Option<SubjectLayout>,
    native: Option<NativeLayout>,
}

impl Subject {
    /// Subject whose declared layout is audited against the layout model.
    pub fn audited(layout: SubjectLayout) -> Self {
        Self {
            name: layout.name.clone(),
            layout: Some(layout),
            native: None,
        }
    }

    /// Subject audited against the model and the compiler's actual layout.
    pub fn audited_native(layout: SubjectLayout, native: NativeLayout) -> Self {
        Self {
            native: Some(native),
            ..Self::audited(layout)
        }
    }

    /// Subject without a layout assumption (strings, handles, counts).
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: None,
            native: None,
        }
    }

    /// Subject name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared layout, if any.
    pub fn layout(&self) -> Option<&SubjectLayout> {
        self.layout.as_ref()
    }
}

/// Services a group needs while it runs.
struct RunContext<'a> {
    experiment: &'a str,
    oracle: &'a CorrectnessOracle,
    harness: &'a MeasurementHarness,
    phases: &'a mut PhaseRegistry,
}

/// Type-erased view of a registered group.
trait GroupRunner: Send + Sync {
    /// Report label: the subject name, or `a+b` for a cross-subject group.
    fn subject(&self) -> &str;
    fn requires(&self) -> &[String];
    fn name(&self) -> &str;
    fn units_per_op(&self) -> Option<u64>;
    fn run(&self, ctx: &mut RunContext<'_>) -> GroupStatus;
}

struct RegisteredGroup<I, O> {
    subject: String,
    requires: Vec<String>,
    group: VariantGroup<I, O>,
    generator: Generator<I>,
    units_per_op: Option<u64>,
}

impl<I, O> GroupRunner for RegisteredGroup<I, O>
where
    I: Debug + Send + Sync + 'static,
    O: Observation + Send + Sync + 'static,
{
    fn subject(&self) -> &str {
        &self.subject
    }

    fn requires(&self) -> &[String] {
        &self.requires
    }

    fn name(&self) -> &str {
        self.group.name()
    }

    fn units_per_op(&self) -> Option<u64> {
        self.units_per_op
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> GroupStatus {
        let oracle = ctx.oracle;
        let verified = match ctx
            .phases
            .time("oracle", || oracle.verify(&self.group, &*self.generator))
        {
            Ok(verified) => verified,
            Err(error) => return GroupStatus::Failed(error),
        };
        let inputs_checked = verified.record().inputs_checked;

        logging::log_entry(
            &LogEntry::new(LogLevel::Debug, "oracle", "variants agree")
                .with_experiment(ctx.experiment)
                .with_subject(&self.subject)
                .with_metadata("group", self.group.name())
                .with_metadata("inputs", &inputs_checked.to_string()),
        );

        let harness = ctx.harness;
        let labels = Labels::new(ctx.experiment, &self.subject);
        match ctx.phases.time("measure", || {
            harness.measure_group(labels, &verified, &*self.generator)
        }) {
            Ok(variants) => GroupStatus::Measured {
                inputs_checked,
                variants,
            },
            Err(error) => GroupStatus::Failed(error),
        }
    }
}

/// A named, immutable set of subjects and variant groups.
pub struct Experiment {
    name: String,
    subjects: Vec<Subject>,
    groups: Vec<Box<dyn GroupRunner>>,
}

impl Experiment {
    /// Start registering an experiment.
    pub fn builder(name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder {
            name: name.into(),
            subjects: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Experiment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subjects in registration order.
    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    /// `(subject, group)` names in registration order.
    pub fn group_names(&self) -> Vec<(&str, &str)> {
        self.groups.iter().map(|g| (g.subject(), g.name())).collect()
    }
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name)
            .field("subjects", &self.subjects)
            .field("groups", &self.group_names())
            .finish()
    }
}

/// Fluent registration of subjects and groups.
pub struct ExperimentBuilder {
    name: String,
    subjects: Vec<Subject>,
    groups: Vec<Box<dyn GroupRunner>>,
}

impl ExperimentBuilder {
    /// Register a subject.
    pub fn subject(mut self, subject: Subject) -> Self {
        self.subjects.push(subject);
        self
    }

    /// Register a variant group operating on `subject`.
    pub fn group<I, O, G>(self, subject: &str, group: VariantGroup<I, O>, generator: G) -> Self
    where
        I: Debug + Send + Sync + 'static,
        O: Observation + Send + Sync + 'static,
        G: Fn(u64) -> I + Send + Sync + 'static,
    {
        self.push_group(&[subject], group, Box::new(generator), None)
    }

    /// Register a group whose invocations each process `units_per_op` units
    /// (bytes, parts, elements), so the report can show a per-unit cost.
    pub fn group_with_units<I, O, G>(
        self,
        subject: &str,
        group: VariantGroup<I, O>,
        generator: G,
        units_per_op: u64,
    ) -> Self
    where
        I: Debug + Send + Sync + 'static,
        O: Observation + Send + Sync + 'static,
        G: Fn(u64) -> I + Send + Sync + 'static,
    {
        self.push_group(&[subject], group, Box::new(generator), Some(units_per_op))
    }

    /// Register a group whose variants compare several subjects against each
    /// other, e.g. the same records in two field orders. The group is blocked
    /// if any of them fails its audit.
    pub fn group_across<I, O, G>(
        self,
        subjects: &[&str],
        group: VariantGroup<I, O>,
        generator: G,
        units_per_op: Option<u64>,
    ) -> Self
    where
        I: Debug + Send + Sync + 'static,
        O: Observation + Send + Sync + 'static,
        G: Fn(u64) -> I + Send + Sync + 'static,
    {
        self.push_group(subjects, group, Box::new(generator), units_per_op)
    }

    fn push_group<I, O>(
        mut self,
        subjects: &[&str],
        group: VariantGroup<I, O>,
        generator: Generator<I>,
        units_per_op: Option<u64>,
    ) -> Self
    where
        I: Debug + Send + Sync + 'static,
        O: Observation + Send + Sync + 'static,
    {
        self.groups.push(Box::new(RegisteredGroup {
            subject: subjects.join("+"),
            requires: subjects.iter().map(|s| s.to_string()).collect(),
            group,
            generator,
            units_per_op,
        }));
        self
    }

    /// Finish registration.
    ///
    /// Subject names must be unique, group names unique per subject, and
    /// every group must refer to a registered subject.
    pub fn build(self) -> Result<Experiment> {
        let mut subjects = BTreeSet::new();
        for subject in &self.subjects {
            if !subjects.insert(subject.name.as_str()) {
                return Err(LabError::DuplicateName {
                    kind: "subject",
                    name: subject.name.clone(),
                });
            }
        }

        let mut groups = BTreeSet::new();
        for group in &self.groups {
            if group.requires().is_empty() {
                return Err(LabError::InvalidConfig(format!(
                    "group {} names no subject",
                    group.name()
                )));
            }
            if let Some(missing) = group
                .requires()
                .iter()
                .find(|s| !subjects.contains(s.as_str()))
            {
                return Err(LabError::UnknownSubject {
                    group: group.name().to_string(),
                    subject: missing.clone(),
                });
            }
            if !groups.insert((group.subject(), group.name())) {
                return Err(LabError::DuplicateName {
                    kind: "group",
                    name: format!("{}/{}", group.subject(), group.name()),
                });
            }
        }

        Ok(Experiment {
            name: self.name,
            subjects: self.subjects,
            groups: self.groups,
        })
    }
}

/// Experiment name to experiment; the registration surface.
#[derive(Debug, Default)]
pub struct Registry {
    experiments: BTreeMap<String, Experiment>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an experiment. Names must be unique.
    pub fn register(&mut self, experiment: Experiment) -> Result<()> {
        if self.experiments.contains_key(experiment.name()) {
            return Err(LabError::DuplicateName {
                kind: "experiment",
                name: experiment.name().to_string(),
            });
        }
        self.experiments
            .insert(experiment.name().to_string(), experiment);
        Ok(())
    }

    /// Look up an experiment.
    pub fn get(&self, name: &str) -> Option<&Experiment> {
        self.experiments.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.experiments.keys().map(String::as_str).collect()
    }

    /// Experiments sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments.values()
    }

    /// Number of registered experiments.
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

/// Runs experiments: audit, then verify, then measure.
#[derive(Debug)]
pub struct Coordinator {
    config: LabConfig,
    audit: SizeAudit,
    oracle: CorrectnessOracle,
    harness: MeasurementHarness,
    phases: PhaseRegistry,
}

impl Coordinator {
    /// Coordinator with the default configuration and logging left off.
    pub fn new() -> Self {
        Self::from_parts(LabConfig::default())
    }

    /// Validate `config`, apply its logging settings, and build a coordinator.
    ///
    /// Logging goes through the process-wide logger, so the most recently
    /// built coordinator decides where log lines go.
    pub fn with_config(config: LabConfig) -> Result<Self> {
        config.validate()?;
        let coordinator = Self::from_parts(config);

        crate::log_info!(
            "coordinator",
            "configured: pointer width {}, {} oracle samples, budget {:?}, input pool {}",
            coordinator.config.layout.pointer_width,
            coordinator.config.oracle.samples,
            coordinator.config.harness.budget,
            coordinator.config.harness.input_pool
        );

        Ok(coordinator)
    }

    fn from_parts(config: LabConfig) -> Self {
        logging::configure(&config.logging);

        Self {
            audit: SizeAudit::new(config.layout.pointer_width),
            oracle: CorrectnessOracle::from_config(&config.oracle),
            harness: MeasurementHarness::new(config.harness),
            phases: PhaseRegistry::new(),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Time spent per phase (`audit`, `oracle`, `measure`) across all runs.
    pub fn phase_stats(&self) -> BTreeMap<String, PerfStats> {
        self.phases.all_stats()
    }

    /// Run one experiment end to end.
    pub fn run(&mut self, experiment: &Experiment) -> ExperimentReport {
        crate::log_info!("coordinator", "running experiment {}", experiment.name());
        let started = Instant::now();

        let subjects: Vec<SubjectReport> = experiment
            .subjects
            .iter()
            .map(|subject| self.audit_subject(experiment.name(), subject))
            .collect();

        let mut groups = Vec::with_capacity(experiment.groups.len());
        for runner in &experiment.groups {
            let blocked_by = runner.requires().iter().find(|name| {
                !subjects
                    .iter()
                    .any(|s| &s.subject == *name && s.is_usable())
            });

            let status = if let Some(subject) = blocked_by {
                GroupStatus::Blocked(LabError::SubjectBlocked {
                    subject: subject.clone(),
                })
            } else {
                let mut ctx = RunContext {
                    experiment: experiment.name(),
                    oracle: &self.oracle,
                    harness: &self.harness,
                    phases: &mut self.phases,
                };
                runner.run(&mut ctx)
            };

            log_group(experiment.name(), runner.subject(), runner.name(), &status);

            groups.push(GroupReport {
                subject: runner.subject().to_string(),
                group: runner.name().to_string(),
                units_per_op: runner.units_per_op(),
                status,
            });
        }

        logging::log_timing("coordinator", experiment.name(), started.elapsed());

        ExperimentReport {
            experiment: experiment.name().to_string(),
            subjects,
            groups,
        }
    }

    /// Run a registered experiment by name.
    pub fn run_named(&mut self, registry: &Registry, name: &str) -> Result<ExperimentReport> {
        let experiment = registry
            .get(name)
            .ok_or_else(|| LabError::InvalidConfig(format!("no experiment named {}", name)))?;
        Ok(self.run(experiment))
    }

    /// Run every registered experiment, sorted by name.
    pub fn run_all(&mut self, registry: &Registry) -> Vec<ExperimentReport> {
        registry.iter().map(|experiment| self.run(experiment)).collect()
    }

    fn audit_subject(&mut self, experiment: &str, subject: &Subject) -> SubjectReport {
        let Some(layout) = &subject.layout else {
            return SubjectReport {
                subject: subject.name.clone(),
                status: AuditStatus::NotApplicable,
            };
        };

        let audit = self.audit;
        let native = subject
            .native
            .as_ref()
            .filter(|_| audit.pointer_width() == std::mem::size_of::<usize>());
        if subject.native.is_some() && native.is_none() {
            crate::log_warn!(
                "audit",
                "{}: compiler layout skipped for cross-width audit ({} bytes)",
                subject.name,
                audit.pointer_width()
            );
        }

        let result = self.phases.time("audit", || match native {
            Some(native) => audit.audit_native(layout, native),
            None => audit.audit(layout),
        });

        let status = match result {
            Ok(report) => {
                logging::log_entry(
                    &LogEntry::new(LogLevel::Debug, "audit", "layout confirmed")
                        .with_experiment(experiment)
                        .with_subject(&subject.name)
                        .with_metadata("size", &report.computed.size.to_string())
                        .with_metadata("native", &report.native_verified.to_string()),
                );
                AuditStatus::Passed(report)
            }
            Err(error) => {
                logging::log_entry(
                    &LogEntry::new(LogLevel::Error, "audit", &error.to_string())
                        .with_experiment(experiment)
                        .with_subject(&subject.name),
                );
                AuditStatus::Failed(error)
            }
        };

        SubjectReport {
            subject: subject.name.clone(),
            status,
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn log_group(experiment: &str, subject: &str, group: &str, status: &GroupStatus) {
    for entry in group_entries(experiment, subject, group, status) {
        logging::log_entry(&entry);
    }
}

/// Log entries describing one group's outcome, one per measured variant plus
/// a summary.
fn group_entries(
    experiment: &str,
    subject: &str,
    group: &str,
    status: &GroupStatus,
) -> Vec<LogEntry> {
    let scoped = |entry: LogEntry| {
        entry
            .with_experiment(experiment)
            .with_subject(subject)
            .with_metadata("group", group)
    };

    match status {
        GroupStatus::Blocked(error) => vec![scoped(LogEntry::new(
            LogLevel::Warn,
            "coordinator",
            &error.to_string(),
        ))],
        GroupStatus::Failed(error) => vec![scoped(LogEntry::new(
            LogLevel::Error,
            "coordinator",
            &error.to_string(),
        ))],
        GroupStatus::Measured { variants, .. } => {
            let mut entries: Vec<LogEntry> = variants
                .iter()
                .map(|outcome| {
                    let entry = match &outcome.result {
                        Ok(measurement) => LogEntry::new(LogLevel::Debug, "harness", "measured")
                            .with_metadata("iterations", &measurement.iterations().to_string())
                            .with_duration(measurement.elapsed()),
                        Err(error) => {
                            LogEntry::new(LogLevel::Error, "harness", &error.to_string())
                        }
                    };
                    scoped(entry).with_variant(&outcome.variant)
                })
                .collect();

            let failed = variants.iter().filter(|v| v.result.is_err()).count();
            let level = if failed == 0 {
                LogLevel::Info
            } else {
                LogLevel::Warn
            };
            entries.push(scoped(LogEntry::new(
                level,
                "coordinator",
                &format!("measured {} variants, {} failed", variants.len(), failed),
            )));
            entries
        }
    }
}

#[cfg(test)]
mod tests;
