use tlb_audit::{AuditConfig, FlushMode, FlushScope};
use tlbflush_data::config::RunConfig;
use tlbflush_data::host::{self, RunOutcome};

fn run(cpus: usize, audit: AuditConfig, flush_mode: FlushMode) -> RunOutcome {
    let config = RunConfig {
        cpus,
        audit,
        flush_mode,
        lockstep: false,
    };
    host::run(&config).unwrap()
}

// 1 controller + 2 writers, page-local invalidation.
fn scenario_a() -> AuditConfig {
    AuditConfig {
        rounds: 10,
        iterations: 1000,
        pool_size: 3,
        remaps_per_round: 50,
        flush_scope: FlushScope::Page,
        ..AuditConfig::default()
    }
}

#[test]
fn correct_flush_passes() {
    let outcome = run(3, scenario_a(), FlushMode::Honor);

    assert_eq!(0, outcome.exit_code);
    assert!(outcome.summary.passed());
    assert_eq!(0, outcome.summary.weird());
    assert_eq!(0, outcome.summary.lost_write_failures());
    assert_eq!(20, outcome.summary.verdicts.len());
    for round in 0..10 {
        assert_eq!(2, outcome.summary.round(round).count());
    }
    for verdict in &outcome.summary.verdicts {
        assert!(verdict.audit_ordered);
        assert!(verdict.remaps >= 50);
    }
}

#[test]
fn global_flush_passes() {
    let audit = AuditConfig {
        flush_scope: FlushScope::All,
        rounds: 3,
        ..scenario_a()
    };
    let outcome = run(5, audit, FlushMode::Honor);

    assert_eq!(0, outcome.exit_code);
    assert_eq!(0, outcome.summary.weird());
    assert_eq!(12, outcome.summary.verdicts.len());
}

#[test]
fn broken_flush_is_detected() {
    let mut config = RunConfig {
        cpus: 3,
        audit: AuditConfig {
            rounds: 3,
            iterations: 200,
            ..scenario_a()
        },
        ..RunConfig::default()
    };
    config.break_flush();
    let outcome = host::run(&config).unwrap();

    assert_eq!(1, outcome.exit_code);
    assert!(!outcome.summary.passed());
    // The writes happened, just in the wrong place.
    assert_eq!(0, outcome.summary.lost_write_failures());
    for round in 0..3 {
        assert_eq!(2, outcome.summary.round(round).count());
        for verdict in outcome.summary.round(round) {
            assert!(verdict.tally.weird > 0, "round {round}: {verdict:?}");
            assert!(verdict.audit_ordered);
        }
    }
}

#[test]
fn lockstep_correct_flush_passes() {
    let config = RunConfig {
        cpus: 3,
        audit: AuditConfig {
            rounds: 3,
            iterations: 200,
            ..scenario_a()
        },
        lockstep: true,
        ..RunConfig::default()
    };
    let outcome = host::run(&config).unwrap();

    assert_eq!(0, outcome.exit_code);
    assert_eq!(0, outcome.summary.weird());
    assert_eq!(0, outcome.summary.late());
}

#[test]
fn no_remaps_no_false_positives() {
    let audit = AuditConfig {
        rounds: 10,
        iterations: 1000,
        pool_size: 1,
        ..AuditConfig::default()
    };
    let outcome = run(3, audit, FlushMode::Honor);

    assert_eq!(0, outcome.exit_code);
    for verdict in &outcome.summary.verdicts {
        assert_eq!(0, verdict.tally.weird);
        assert_eq!(0, verdict.tally.late);
        assert_eq!(1000, verdict.tally.consistent);
    }
}

#[test]
fn full_audit_log() {
    let audit = AuditConfig {
        audit_capacity: 4,
        rounds: 3,
        ..scenario_a()
    };
    let outcome = run(3, audit, FlushMode::Honor);

    assert_eq!(0, outcome.exit_code);
    assert_eq!(0, outcome.summary.weird());
    for verdict in &outcome.summary.verdicts {
        assert_eq!(4, verdict.audited);
        assert!(verdict.remaps >= 50);
        assert!(verdict.dropped() > 0);
        assert_eq!(1000, verdict.tally.written());
    }
}

#[test]
fn setup_failures() {
    let config = RunConfig {
        cpus: 1,
        ..RunConfig::default()
    };
    assert!(host::run(&config).is_err());

    let config = RunConfig {
        audit: AuditConfig {
            rounds: 0,
            ..AuditConfig::default()
        },
        ..RunConfig::default()
    };
    assert!(host::run(&config).is_err());
}
