// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: host solve loop public API.
//!
//! Drives `solve_cpu` end to end across module boundaries: instance
//! construction, hyperparameter validation, tour construction, pheromone
//! feedback, stall accounting, and report invariants.

use formicary::aco::problem::{is_permutation, nearest_neighbour_cost, tour_length_f64};
use formicary::aco::{instances, solve_cpu, AcoConfig, CostMatrix};
use formicary::error::FormicaryError;
use formicary::tolerances;

#[test]
fn ring_converges_to_the_ring_walk() {
    let n = 16;
    let costs = instances::ring(n, 1.0, 50.0);
    // beta 3.0 makes adjacent edges 125000x more attractive than chords.
    let config = AcoConfig {
        beta: 3.0,
        ..AcoConfig::default()
    };

    let report = solve_cpu(&costs, &config).unwrap();
    assert!(
        (f64::from(report.best_cost) - n as f64).abs() < tolerances::KNOWN_OPTIMUM_ABS,
        "expected the ring walk of cost {n}, found {}",
        report.best_cost
    );
    assert!(is_permutation(&report.best_tour, n));
    assert_eq!(report.substrate, "cpu");
}

#[test]
fn reported_cost_reconciles_with_f64_recompute() {
    let costs = instances::random_euclidean(32, 21);
    let report = solve_cpu(&costs, &AcoConfig::default()).unwrap();

    let recomputed = tour_length_f64(&costs, &report.best_tour);
    let rel = tolerances::relative_error(f64::from(report.best_cost), recomputed);
    assert!(
        rel < tolerances::COST_RECOMPUTE_REL,
        "striped f32 sum drifted {rel:.2e} from the f64 recompute"
    );
}

#[test]
fn uniform_instance_stalls_after_threshold() {
    let costs = instances::uniform(12, 3.0);
    let config = AcoConfig::default();
    let report = solve_cpu(&costs, &config).unwrap();

    // First iteration improves on infinity, every later one ties.
    assert_eq!(report.iterations, 1 + config.stall_threshold);
    assert_eq!(report.stalled_iterations, config.stall_threshold);
    assert!((report.best_cost - 36.0).abs() < 1e-6);
    assert_eq!(report.progress.len(), report.iterations as usize);
}

#[test]
fn same_seed_reproduces_the_full_report() {
    let costs = instances::random_euclidean(20, 99);
    let config = AcoConfig::default();

    let first = solve_cpu(&costs, &config).unwrap();
    let second = solve_cpu(&costs, &config).unwrap();

    assert_eq!(first.iterations, second.iterations);
    assert_eq!(first.best_tour, second.best_tour);
    assert_eq!(first.best_cost.to_bits(), second.best_cost.to_bits());
    let bits = |p: &[f32]| p.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&first.progress), bits(&second.progress));
}

#[test]
fn max_iterations_caps_a_non_stalling_run() {
    let costs = instances::random_euclidean(24, 3);
    let config = AcoConfig {
        max_iterations: 5,
        stall_threshold: 1000,
        ..AcoConfig::default()
    };

    let report = solve_cpu(&costs, &config).unwrap();
    assert_eq!(report.iterations, 5);
    assert!(report.stalled_iterations < 1000);
}

#[test]
fn quick_test_profile_handles_striped_candidates() {
    // colony_width 8 on n=16 forces two candidate stripes per step.
    let costs = instances::random_euclidean(16, 77);
    let config = AcoConfig::quick_test();
    let report = solve_cpu(&costs, &config).unwrap();

    assert!(is_permutation(&report.best_tour, 16));
    let nn = nearest_neighbour_cost(&costs);
    assert!(
        f64::from(report.best_cost) < nn * 1.05,
        "best {} should sit near or below the nearest-neighbour bound {nn}",
        report.best_cost
    );
}

#[test]
fn zero_cost_edges_use_the_epsilon_guard() {
    // Cities 0 and 1 are coincident; their edge costs nothing and the
    // heuristic clamps to 1.0 instead of dividing by zero.
    let costs = CostMatrix::from_rows(&[
        vec![0.0, 0.0, 2.0, 3.0],
        vec![0.0, 0.0, 2.0, 3.0],
        vec![2.0, 2.0, 0.0, 1.0],
        vec![3.0, 3.0, 1.0, 0.0],
    ])
    .unwrap();

    let report = solve_cpu(&costs, &AcoConfig::default()).unwrap();
    assert!(is_permutation(&report.best_tour, 4));
    assert!(report.best_cost.is_finite());
}

#[test]
fn invalid_hyperparameters_are_rejected() {
    let costs = instances::uniform(8, 1.0);
    let config = AcoConfig {
        rho: 1.5,
        ..AcoConfig::default()
    };
    let err = solve_cpu(&costs, &config).unwrap_err();
    assert!(matches!(err, FormicaryError::Config(_)), "got {err:?}");
}

#[test]
fn undersized_colony_width_is_rejected() {
    let costs = instances::uniform(8, 1.0);
    let config = AcoConfig {
        colony_width: 2,
        ..AcoConfig::default()
    };
    let err = solve_cpu(&costs, &config).unwrap_err();
    assert!(matches!(err, FormicaryError::Config(_)), "got {err:?}");
}

#[test]
fn oversized_problems_are_rejected() {
    let costs = instances::uniform(150, 1.0);
    let err = solve_cpu(&costs, &AcoConfig::default()).unwrap_err();
    assert!(matches!(err, FormicaryError::Capacity(_)), "got {err:?}");
}
