//! Multi-tick integration tests for the simulation host.
//!
//! These tests run whole simulations and check that the shared log stays
//! consistent under both maintenance orders, tight budgets and full regions.
//!
//! Run with: cargo test --release sim_integration

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::sync::Arc;

use hivelog::{
    Agent, Board, Layout, Location, MaintenanceOrder, ProductionPlan, Publish, Record, RecordLog,
    RegionKind, Role, SimConfig, SimError, Simulation, UnitKind, run_sim,
};

fn config(ticks: u32) -> SimConfig {
    SimConfig {
        ticks,
        width: 20,
        height: 20,
        ..SimConfig::default()
    }
}

#[test]
fn test_same_seed_same_result() {
    let config = config(80);
    let a = run_sim(12345, &config).unwrap();
    let b = run_sim(12345, &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_different_seeds_diverge() {
    let config = config(80);
    let a = run_sim(1, &config).unwrap();
    let b = run_sim(2, &config).unwrap();
    assert_ne!(a.checksum, b.checksum);
}

#[test]
fn test_no_violations_under_either_order() {
    for order in [MaintenanceOrder::First, MaintenanceOrder::Last] {
        for seed in 0..5 {
            let config = SimConfig {
                maintenance_order: order,
                ..config(120)
            };
            let result = run_sim(seed, &config).unwrap();
            assert_eq!(result.invariant_violations, 0, "seed {seed} {order:?}");
            assert_eq!(result.turn_errors, 0, "seed {seed} {order:?}");
            assert_eq!(result.ticks, 120);
        }
    }
}

#[test]
fn test_tight_budget_cuts_turns_without_corruption() {
    let config = SimConfig {
        op_budget: Some(40),
        source_spawn_chance: 0.5,
        ..config(100)
    };
    let mut cutoffs = 0;
    for seed in 0..4 {
        let result = run_sim(seed, &config).unwrap();
        assert_eq!(result.invariant_violations, 0, "seed {seed}");
        assert_eq!(result.turn_errors, 0, "seed {seed}");
        cutoffs += result.budget_cutoffs;
    }
    assert!(cutoffs > 0);
}

#[test]
fn test_tiny_regions_drop_publishes() {
    let config = SimConfig {
        layout: Layout::compact(6),
        source_spawn_chance: 0.8,
        max_sources: 10,
        ..config(60)
    };
    let result = run_sim(9, &config).unwrap();
    assert!(result.dropped_publishes > 0);
    assert!(result.peak_hazard_records <= 2);
    assert_eq!(result.invariant_violations, 0);
}

#[test]
fn test_ratio_gates_shape_the_mix() {
    let config = SimConfig {
        max_units: 200,
        produce_chance: 1.0,
        source_spawn_chance: 0.0,
        ..config(150)
    };
    let result = run_sim(3, &config).unwrap();
    let built = |kind| result.produced[&kind];
    assert!(built(UnitKind::Worker) >= 1);
    assert!(built(UnitKind::Barracks) >= 1);
    // Alive counts never exceed lifetime builds
    for kind in UnitKind::ALL {
        assert!(result.alive[&kind] <= result.produced[&kind], "{kind}");
    }
}

#[test]
fn test_stepping_matches_run_sim() {
    let config = config(30);
    let mut sim = Simulation::new(77, &config).unwrap();
    while !sim.is_finished() {
        sim.step().unwrap();
    }
    assert_eq!(sim.result().unwrap(), run_sim(77, &config).unwrap());
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"ticks": 12, "width": 10, "height": 10, "maintenance_order": "last", "op_budget": null}}"#
    )
    .unwrap();

    let config = SimConfig::load(file.path()).unwrap();
    assert_eq!(config.ticks, 12);
    assert_eq!(config.maintenance_order, MaintenanceOrder::Last);
    assert_eq!(config.op_budget, None);

    let result = run_sim(1, &config).unwrap();
    assert_eq!(result.ticks, 12);
    assert_eq!(result.budget_cutoffs, 0);
}

#[test]
fn test_missing_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SimConfig::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SimError::Config(_)));
}

/// Ten hazards at ticks 1..=10, maintenance at tick 3 with max age 2: the
/// tick-1 record is expired and compacted away, leaving nine records.
#[test]
fn test_expiry_and_compaction_scenario() {
    let layout = Layout::compact(30);
    let board = Board::new(layout.len);
    let mut log = RecordLog::new(board.clone(), layout);
    log.init().unwrap();

    for tick in 1..=10 {
        log.append(RegionKind::Hazard, Record::new(tick, Location::new(tick, tick)))
            .unwrap();
    }
    assert_eq!(log.end_offset(RegionKind::Hazard).unwrap(), 30);
    assert!(log.append(RegionKind::Hazard, Record::new(10, Location::new(0, 0))).is_err());

    let report = log.maintain(3, 2).unwrap();
    assert_eq!(report.hazard.expired, 1);
    assert_eq!(report.hazard.reclaimed, 1);
    assert_eq!(report.hazard.live, 9);

    let live = log.live_records(RegionKind::Hazard).unwrap();
    assert_eq!(live.len(), 9);
    assert_eq!(live[0].tick, 2);
    assert_eq!(log.end_offset(RegionKind::Hazard).unwrap(), 27);
}

/// A member publishes, the base syncs and sees it, a fumigator clears it,
/// and everyone converges.
#[test]
fn test_agents_converge_through_the_board() {
    let layout = Layout::compact(90);
    let board = Board::new(layout.len);
    let plan = Arc::new(ProductionPlan::default());
    let mut base = Agent::new(board.clone(), layout, Arc::clone(&plan), Role::Privileged);
    let mut scout = Agent::new(board.clone(), layout, Arc::clone(&plan), Role::Member);
    let mut cleaner = Agent::new(board.clone(), layout, plan, Role::Member);
    base.init_board().unwrap();

    board.set_tick(1);
    let hazard = Location::new(4, 4);
    assert_eq!(scout.publish_hazard(hazard).unwrap(), Publish::Appended(0));

    base.sync_working_set().unwrap();
    cleaner.sync_working_set().unwrap();
    assert!(base.is_known_hazard(hazard));
    assert!(cleaner.is_known_hazard(hazard));

    board.set_tick(2);
    assert!(matches!(cleaner.publish_cleared(hazard).unwrap(), Publish::Appended(_)));
    base.sync_working_set().unwrap();
    scout.sync_working_set().unwrap();
    assert!(!base.is_known_hazard(hazard));
    assert!(!scout.is_known_hazard(hazard));

    // Members may not maintain
    assert!(scout.run_maintenance().is_err());
    board.set_tick(10);
    let report = base.run_maintenance().unwrap();
    assert_eq!(report.hazard.expired, 1);
    assert_eq!(report.cleared.expired, 1);
}
