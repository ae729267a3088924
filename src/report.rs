//! Per-experiment results: audit outcomes, group outcomes, and the flat rows
//! printed as a table or serialized as JSON.

use serde::Serialize;

use crate::error::{LabError, Result};
use crate::harness::{Measurement, VariantMeasurement};
use crate::layout::LayoutReport;

/// Outcome of auditing one subject.
#[derive(Debug)]
pub enum AuditStatus {
    /// Model, declaration and (when given) compiler layout agree
    Passed(LayoutReport),
    /// Subject carries no layout assumption
    NotApplicable,
    /// Layout drifted; the subject's groups are blocked
    Failed(LabError),
}

/// Audit record for one subject.
#[derive(Debug)]
pub struct SubjectReport {
    /// Subject name
    pub subject: String,
    /// Audit outcome
    pub status: AuditStatus,
}

impl SubjectReport {
    /// Whether the subject's groups may run.
    pub fn is_usable(&self) -> bool {
        !matches!(self.status, AuditStatus::Failed(_))
    }
}

/// Outcome of one variant group.
#[derive(Debug)]
pub enum GroupStatus {
    /// The group's subject failed its audit
    Blocked(LabError),
    /// The oracle rejected the group; nothing was measured
    Failed(LabError),
    /// The oracle passed and every variant was run through the harness
    Measured {
        /// Inputs every variant agreed on
        inputs_checked: u64,
        /// One entry per variant, in registration order
        variants: Vec<VariantMeasurement>,
    },
}

/// Record for one variant group.
#[derive(Debug)]
pub struct GroupReport {
    /// Subject the group operates on
    pub subject: String,
    /// Group name
    pub group: String,
    /// Units each invocation processes, for per-unit costs
    pub units_per_op: Option<u64>,
    /// Outcome
    pub status: GroupStatus,
}

impl GroupReport {
    /// Successful measurements of this group.
    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        let variants: &[VariantMeasurement] = match &self.status {
            GroupStatus::Measured { variants, .. } => variants,
            _ => &[],
        };
        variants.iter().filter_map(|v| v.result.as_ref().ok())
    }
}

/// Everything one coordinator run of an experiment produced.
#[derive(Debug)]
pub struct ExperimentReport {
    /// Experiment name
    pub experiment: String,
    /// Audit records in registration order
    pub subjects: Vec<SubjectReport>,
    /// Group records in registration order
    pub groups: Vec<GroupReport>,
}

/// One measured (subject, variant) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Experiment name
    pub experiment: String,
    /// Subject name
    pub subject: String,
    /// Group name
    pub group: String,
    /// Variant name
    pub variant: String,
    /// Dispatch/inlining tags
    pub strategy: String,
    /// Timed invocations
    pub iterations: u64,
    /// Total timed nanoseconds
    pub elapsed_ns: u64,
    /// Nanoseconds per invocation
    pub cost_per_op_ns: f64,
    /// Nanoseconds per processed unit, when the group declares units
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_unit_ns: Option<f64>,
}

impl ReportRow {
    fn from_measurement(measurement: &Measurement, units_per_op: Option<u64>) -> Self {
        Self {
            experiment: measurement.experiment().to_string(),
            subject: measurement.subject().to_string(),
            group: measurement.group().to_string(),
            variant: measurement.variant().to_string(),
            strategy: measurement.strategy().to_string(),
            iterations: measurement.iterations(),
            elapsed_ns: u64::try_from(measurement.elapsed().as_nanos()).unwrap_or(u64::MAX),
            cost_per_op_ns: measurement.cost_per_op_ns(),
            cost_per_unit_ns: units_per_op.and_then(|units| measurement.cost_per_unit_ns(units)),
        }
    }
}

/// One failure, scoped to where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRow {
    /// Experiment name
    pub experiment: String,
    /// Subject the failure is recorded against
    pub subject: String,
    /// Group, for group- and variant-scoped failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Variant, for variant-scoped failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Rendered error
    pub error: String,
}

impl ExperimentReport {
    /// Measurement rows in registration order.
    pub fn rows(&self) -> Vec<ReportRow> {
        self.groups
            .iter()
            .flat_map(|group| {
                group
                    .measurements()
                    .map(move |m| ReportRow::from_measurement(m, group.units_per_op))
            })
            .collect()
    }

    /// Every failure with its scope.
    pub fn failures(&self) -> Vec<FailureRow> {
        let mut failures = Vec::new();

        for subject in &self.subjects {
            if let AuditStatus::Failed(error) = &subject.status {
                failures.push(self.failure(&subject.subject, None, None, error));
            }
        }

        for group in &self.groups {
            match &group.status {
                GroupStatus::Blocked(error) | GroupStatus::Failed(error) => {
                    failures.push(self.failure(&group.subject, Some(&group.group), None, error));
                }
                GroupStatus::Measured { variants, .. } => {
                    for outcome in variants {
                        if let Err(error) = &outcome.result {
                            failures.push(self.failure(
                                &group.subject,
                                Some(&group.group),
                                Some(&outcome.variant),
                                error,
                            ));
                        }
                    }
                }
            }
        }

        failures
    }

    fn failure(
        &self,
        subject: &str,
        group: Option<&str>,
        variant: Option<&str>,
        error: &LabError,
    ) -> FailureRow {
        FailureRow {
            experiment: self.experiment.clone(),
            subject: subject.to_string(),
            group: group.map(str::to_string),
            variant: variant.map(str::to_string),
            error: error.to_string(),
        }
    }

    /// Whether every audit, oracle check and measurement succeeded.
    pub fn is_clean(&self) -> bool {
        self.subjects.iter().all(SubjectReport::is_usable)
            && self.groups.iter().all(|group| match &group.status {
                GroupStatus::Measured { variants, .. } => {
                    variants.iter().all(|v| v.result.is_ok())
                }
                _ => false,
            })
    }

    /// Look up a group record.
    pub fn group(&self, subject: &str, group: &str) -> Option<&GroupReport> {
        self.groups
            .iter()
            .find(|g| g.subject == subject && g.group == group)
    }

    /// Plain-text table of measurements followed by any failures.
    pub fn render_table(&self) -> String {
        let mut out = format!("== {} ==\n", self.experiment);
        out.push_str(&format!(
            "{:<18} {:<16} {:<18} {:<22} {:>12} {:>14} {:>12}\n",
            "subject", "group", "variant", "strategy", "iterations", "ns/op", "ns/unit"
        ));

        for row in self.rows() {
            let per_unit = row
                .cost_per_unit_ns
                .map(|ns| format!("{:.3}", ns))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "{:<18} {:<16} {:<18} {:<22} {:>12} {:>14.2} {:>12}\n",
                row.subject,
                row.group,
                row.variant,
                row.strategy,
                row.iterations,
                row.cost_per_op_ns,
                per_unit
            ));
        }

        let failures = self.failures();
        if !failures.is_empty() {
            out.push_str("failures:\n");
            for failure in failures {
                let scope = match (&failure.group, &failure.variant) {
                    (Some(group), Some(variant)) => {
                        format!("{}/{}/{}", failure.subject, group, variant)
                    }
                    (Some(group), None) => format!("{}/{}", failure.subject, group),
                    _ => failure.subject.clone(),
                };
                out.push_str(&format!("  {}: {}\n", scope, failure.error));
            }
        }

        out
    }

    /// Pretty-printed JSON with `rows` and `failures` arrays.
    pub fn to_json(&self) -> Result<String> {
        let document = serde_json::json!({
            "experiment": self.experiment,
            "rows": self.rows(),
            "failures": self.failures(),
        });
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Budget, HarnessConfig};
    use crate::harness::{Labels, MeasurementHarness};
    use crate::oracle::CorrectnessOracle;
    use crate::variant::{Strategy, Variant, VariantGroup};

    fn measured_group() -> GroupReport {
        let group: VariantGroup<u64, u64> = VariantGroup::new("double")
            .with(Variant::infallible("add", Strategy::direct(), |x: &u64| x + x))
            .with(Variant::infallible("shift", Strategy::direct(), |x: &u64| x << 1));
        let verified = CorrectnessOracle::new(8).verify(&group, &|i| i).unwrap();
        let harness = MeasurementHarness::new(HarnessConfig {
            warmup_iterations: 0,
            budget: Budget::Iterations(100),
            input_pool: 1,
        });
        let variants = harness
            .measure_group(Labels::new("demo", "u64"), &verified, &|i| i)
            .unwrap();

        GroupReport {
            subject: "u64".into(),
            group: "double".into(),
            units_per_op: Some(8),
            status: GroupStatus::Measured {
                inputs_checked: 8,
                variants,
            },
        }
    }

    fn report() -> ExperimentReport {
        ExperimentReport {
            experiment: "demo".into(),
            subjects: vec![
                SubjectReport {
                    subject: "u64".into(),
                    status: AuditStatus::NotApplicable,
                },
                SubjectReport {
                    subject: "drifted".into(),
                    status: AuditStatus::Failed(LabError::LayoutMismatch {
                        subject: "drifted".into(),
                        expected_size: 16,
                        actual_size: 24,
                    }),
                },
            ],
            groups: vec![
                measured_group(),
                GroupReport {
                    subject: "drifted".into(),
                    group: "traverse".into(),
                    units_per_op: None,
                    status: GroupStatus::Blocked(LabError::SubjectBlocked {
                        subject: "drifted".into(),
                    }),
                },
            ],
        }
    }

    #[test]
    fn rows_cover_measured_variants() {
        let rows = report().rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].variant, "add");
        assert_eq!(rows[1].variant, "shift");
        assert_eq!(rows[0].iterations, 100);
        assert_eq!(rows[0].strategy, "direct/inlined");
        assert!(rows[0].cost_per_unit_ns.is_some());
    }

    #[test]
    fn failures_are_scoped() {
        let report = report();
        let failures = report.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].subject, "drifted");
        assert!(failures[0].group.is_none());
        assert_eq!(failures[1].group.as_deref(), Some("traverse"));
        assert!(!report.is_clean());
        assert!(report.group("u64", "double").is_some());
    }

    #[test]
    fn table_lists_rows_and_failures() {
        let table = report().render_table();
        assert!(table.starts_with("== demo =="));
        assert!(table.contains("shift"));
        assert!(table.contains("failures:"));
        assert!(table.contains("drifted/traverse"));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        assert_eq!(json["experiment"], "demo");
        assert_eq!(json["rows"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["rows"][0]["group"], "double");
        assert_eq!(json["failures"].as_array().map(Vec::len), Some(2));
        assert!(json["failures"][0].get("variant").is_none());
    }
}
