use super::*;
use crate::config::{Budget, ConfigBuilder};
use crate::layout::FieldSpec;
use crate::variant::{Strategy, Variant};

fn quick() -> Coordinator {
    let config = ConfigBuilder::new()
        .samples(50)
        .warmup(2)
        .budget(Budget::Iterations(200))
        .build()
        .unwrap();
    Coordinator::with_config(config).unwrap()
}

fn pair() -> SubjectLayout {
    SubjectLayout::new("pair", 16)
        .field(FieldSpec::scalar("x", 8))
        .field(FieldSpec::scalar("y", 8))
        .offsets([0, 8])
}

fn drifted() -> SubjectLayout {
    // Declared as if the bool were packed after the i32
    SubjectLayout::new("drifted", 5)
        .field(FieldSpec::scalar("n", 4))
        .field(FieldSpec::scalar("flag", 1))
}

fn sum_group(name: &str) -> VariantGroup<(u64, u64), u64> {
    VariantGroup::new(name)
        .with(Variant::infallible("add", Strategy::direct(), |p: &(u64, u64)| {
            p.0 + p.1
        }))
        .with(Variant::infallible("fold", Strategy::direct(), |p: &(u64, u64)| {
            [p.0, p.1].iter().sum()
        }))
}

fn pairs(i: u64) -> (u64, u64) {
    (i, 7 * i)
}

mod registration {
    use super::*;

    #[test]
    fn unknown_subject_rejected() {
        let result = Experiment::builder("bad")
            .subject(Subject::audited(pair()))
            .group("missing", sum_group("sum"), pairs)
            .build();

        match result {
            Err(LabError::UnknownSubject { group, subject }) => {
                assert_eq!(group, "sum");
                assert_eq!(subject, "missing");
            }
            other => panic!("Expected UnknownSubject, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_subjects_and_groups_rejected() {
        assert!(matches!(
            Experiment::builder("dup")
                .subject(Subject::opaque("a"))
                .subject(Subject::opaque("a"))
                .build(),
            Err(LabError::DuplicateName {
                kind: "subject",
                ..
            })
        ));

        assert!(matches!(
            Experiment::builder("dup")
                .subject(Subject::opaque("a"))
                .group("a", sum_group("sum"), pairs)
                .group("a", sum_group("sum"), pairs)
                .build(),
            Err(LabError::DuplicateName { kind: "group", .. })
        ));
    }

    #[test]
    fn same_group_name_on_different_subjects() {
        let experiment = Experiment::builder("ok")
            .subject(Subject::opaque("a"))
            .subject(Subject::opaque("b"))
            .group("a", sum_group("sum"), pairs)
            .group("b", sum_group("sum"), pairs)
            .build()
            .unwrap();

        assert_eq!(experiment.group_names(), vec![("a", "sum"), ("b", "sum")]);
        assert_eq!(experiment.subjects().len(), 2);
    }

    #[test]
    fn registry_names_are_unique_and_sorted() {
        let mut registry = Registry::new();
        registry
            .register(Experiment::builder("zeta").build().unwrap())
            .unwrap();
        registry
            .register(Experiment::builder("alpha").build().unwrap())
            .unwrap();

        assert!(matches!(
            registry.register(Experiment::builder("zeta").build().unwrap()),
            Err(LabError::DuplicateName {
                kind: "experiment",
                ..
            })
        ));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("alpha").is_some());
    }
}

mod running {
    use super::*;

    #[test]
    fn clean_experiment_measures_every_variant() {
        let experiment = Experiment::builder("pairs")
            .subject(Subject::audited(pair()))
            .group("pair", sum_group("sum"), pairs)
            .build()
            .unwrap();

        let mut coordinator = quick();
        let report = coordinator.run(&experiment);

        assert!(report.is_clean(), "{}", report.render_table());
        assert!(matches!(report.subjects[0].status, AuditStatus::Passed(_)));

        let rows = report.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.iterations == 200));
        assert!(rows.iter().all(|row| row.experiment == "pairs"));

        let phases = coordinator.phase_stats();
        assert_eq!(phases.get("audit").map(|s| s.count), Some(1));
        assert_eq!(phases.get("oracle").map(|s| s.count), Some(1));
        assert_eq!(phases.get("measure").map(|s| s.count), Some(1));
    }

    #[test]
    fn audit_failure_blocks_only_its_subject() {
        let experiment = Experiment::builder("mixed")
            .subject(Subject::audited(drifted()))
            .subject(Subject::audited(pair()))
            .group("drifted", sum_group("sum"), pairs)
            .group("pair", sum_group("sum"), pairs)
            .build()
            .unwrap();

        let report = quick().run(&experiment);

        assert!(matches!(
            report.subjects[0].status,
            AuditStatus::Failed(LabError::LayoutMismatch {
                expected_size: 5,
                actual_size: 8,
                ..
            })
        ));
        assert!(matches!(
            report.group("drifted", "sum").map(|g| &g.status),
            Some(GroupStatus::Blocked(LabError::SubjectBlocked { .. }))
        ));
        assert_eq!(
            report
                .group("pair", "sum")
                .map(|g| g.measurements().count()),
            Some(2)
        );
        assert_eq!(report.rows().len(), 2);
        assert_eq!(report.failures().len(), 2);
    }

    #[test]
    fn divergent_group_is_never_measured() {
        let broken = sum_group("broken").with(Variant::infallible(
            "plus_one",
            Strategy::direct(),
            |p: &(u64, u64)| p.0 + p.1 + 1,
        ));
        let experiment = Experiment::builder("divergence")
            .subject(Subject::opaque("pair"))
            .group("pair", broken, pairs)
            .group("pair", sum_group("sum"), pairs)
            .build()
            .unwrap();

        let mut coordinator = quick();
        let report = coordinator.run(&experiment);

        match report.group("pair", "broken").map(|g| &g.status) {
            Some(GroupStatus::Failed(LabError::VariantDivergence {
                variant_b, input, ..
            })) => {
                assert_eq!(variant_b, "plus_one");
                assert_eq!(input, "(0, 0)");
            }
            other => panic!("Expected VariantDivergence, got {:?}", other),
        }
        assert_eq!(
            report
                .group("pair", "broken")
                .map(|g| g.measurements().count()),
            Some(0)
        );
        assert!(report.rows().iter().all(|row| row.group == "sum"));
        // Only the healthy group reached the harness
        assert_eq!(
            coordinator.phase_stats().get("measure").map(|s| s.count),
            Some(1)
        );
    }

    #[test]
    fn panicking_group_does_not_stop_later_groups() {
        let bad = sum_group("bad").with(Variant::infallible(
            "fragile",
            Strategy::direct(),
            |p: &(u64, u64)| {
                if p.0 == 5 {
                    panic!("cannot add {:?}", p);
                }
                p.0 + p.1
            },
        ));
        let experiment = Experiment::builder("panics")
            .subject(Subject::opaque("pair"))
            .group("pair", bad, pairs)
            .group("pair", sum_group("good"), pairs)
            .build()
            .unwrap();

        let report = quick().run(&experiment);

        match report.group("pair", "bad").map(|g| &g.status) {
            Some(GroupStatus::Failed(LabError::VariantExecutionFailure {
                variant,
                input,
                reason,
            })) => {
                assert_eq!(variant, "fragile");
                assert_eq!(input, "(5, 35)");
                assert!(reason.contains("cannot add (5, 35)"), "{}", reason);
            }
            other => panic!("Expected VariantExecutionFailure, got {:?}", other),
        }
        assert_eq!(
            report.group("pair", "good").map(|g| g.measurements().count()),
            Some(2)
        );
    }

    #[test]
    fn pool_beyond_verified_inputs_rejected() {
        let mut config = LabConfig::default();
        config.oracle.samples = 10;
        config.harness.input_pool = 64;
        assert!(matches!(
            Coordinator::with_config(config),
            Err(LabError::InvalidConfig(_))
        ));
        assert!(ConfigBuilder::new()
            .samples(10)
            .input_pool(64)
            .build()
            .is_err());
    }

    #[test]
    fn opaque_subjects_skip_the_audit() {
        let experiment = Experiment::builder("opaque")
            .subject(Subject::opaque("pair"))
            .group_with_units("pair", sum_group("sum"), pairs, 16)
            .build()
            .unwrap();

        let mut coordinator = quick();
        let report = coordinator.run(&experiment);

        assert!(matches!(
            report.subjects[0].status,
            AuditStatus::NotApplicable
        ));
        assert!(report.rows().iter().all(|row| row.cost_per_unit_ns.is_some()));
        assert!(coordinator.phase_stats().get("audit").is_none());
    }

    #[test]
    fn cross_subject_group_needs_every_subject() {
        let experiment = Experiment::builder("across")
            .subject(Subject::audited(pair()))
            .subject(Subject::audited(drifted()))
            .group_across(&["pair", "drifted"], sum_group("sum"), pairs, None)
            .group_across(&["pair"], sum_group("solo"), pairs, Some(2))
            .build()
            .unwrap();

        let report = quick().run(&experiment);

        match report.group("pair+drifted", "sum").map(|g| &g.status) {
            Some(GroupStatus::Blocked(LabError::SubjectBlocked { subject })) => {
                assert_eq!(subject, "drifted");
            }
            other => panic!("Expected SubjectBlocked, got {:?}", other),
        }
        assert_eq!(
            report.group("pair", "solo").map(|g| g.measurements().count()),
            Some(2)
        );

        assert!(matches!(
            Experiment::builder("across")
                .subject(Subject::opaque("pair"))
                .group_across(&["pair", "ghost"], sum_group("sum"), pairs, None)
                .build(),
            Err(LabError::UnknownSubject { .. })
        ));
    }

    #[test]
    fn run_named_and_run_all() {
        let mut registry = Registry::new();
        registry
            .register(
                Experiment::builder("pairs")
                    .subject(Subject::opaque("pair"))
                    .group("pair", sum_group("sum"), pairs)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let mut coordinator = quick();
        assert!(coordinator.run_named(&registry, "pairs").is_ok());
        assert!(matches!(
            coordinator.run_named(&registry, "nope"),
            Err(LabError::InvalidConfig(_))
        ));
        assert_eq!(coordinator.run_all(&registry).len(), 1);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = LabConfig::quick();
        config.harness.budget = Budget::Iterations(0);
        assert!(matches!(
            Coordinator::with_config(config),
            Err(LabError::InvalidBudget { .. })
        ));
    }
}

mod log_entries {
    use super::*;
    use crate::error::VariantFailure;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn failed_variant_entries_name_the_variant() {
        // Survives the 50 oracle samples, then fails while being timed
        let calls = Arc::new(AtomicU64::new(0));
        let flaky = sum_group("flaky").with(Variant::new(
            "exhausted",
            Strategy::direct(),
            move |p: &(u64, u64)| {
                if calls.fetch_add(1, Ordering::Relaxed) >= 60 {
                    Err(VariantFailure::new("out of tokens"))
                } else {
                    Ok(p.0 + p.1)
                }
            },
        ));
        let experiment = Experiment::builder("flaky")
            .subject(Subject::opaque("pair"))
            .group("pair", flaky, pairs)
            .build()
            .unwrap();

        let report = quick().run(&experiment);
        let status = &report.group("pair", "flaky").unwrap().status;
        let entries = group_entries("flaky", "pair", "flaky", status);

        // add, fold, exhausted, then the summary
        assert_eq!(entries.len(), 4);
        let failed: Vec<&LogEntry> = entries
            .iter()
            .filter(|e| e.level == LogLevel::Error)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].variant.as_deref(), Some("exhausted"));
        assert!(failed[0].message.contains("out of tokens"));
        assert_eq!(failed[0].experiment.as_deref(), Some("flaky"));
        assert_eq!(failed[0].metadata.get("group").map(String::as_str), Some("flaky"));

        let summary = &entries[3];
        assert_eq!(summary.level, LogLevel::Warn);
        assert!(summary.variant.is_none());
        assert_eq!(summary.message, "measured 3 variants, 1 failed");
    }
}
