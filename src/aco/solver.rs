// SPDX-License-Identifier: AGPL-3.0-only

//! Iterate-until-stalled solve loop (host substrate).
//!
//! Owns the persistent matrices and runs the per-iteration cycle: choice-info
//! recompute → tour construction (fresh run nonce) → pheromone update →
//! minimum-cost check → stall accounting. Stops once `stall_threshold`
//! consecutive iterations bring no strictly better tour, or at the safety
//! iteration cap. The GPU substrate (`crate::gpu::solver`) runs the same loop
//! against the same report type with the kernels doing the matrix work.

use std::time::Instant;

use serde::Serialize;

use crate::aco::config::{check_problem_size, AcoConfig};
use crate::aco::construction::construct_tours;
use crate::aco::pheromone::{choice_info, update_pheromone};
use crate::aco::problem::{heuristic_matrix, CostMatrix};
use crate::aco::rng::next_nonce;
use crate::error::FormicaryError;

/// Outcome of one solve: the best tour found and how the search went.
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    /// Which engine produced this ("cpu" or "gpu:<adapter>").
    pub substrate: String,
    /// City count.
    pub n_cities: usize,
    /// Best tour found — a permutation of 0..N anchored at its colony's city.
    pub best_tour: Vec<u32>,
    /// Length of the best tour, as the engine's f32 sum reports it.
    pub best_cost: f32,
    /// Iterations run before stopping.
    pub iterations: u32,
    /// Consecutive non-improving iterations at exit.
    pub stalled_iterations: u32,
    /// Per-iteration minimum tour cost, for convergence inspection.
    pub progress: Vec<f32>,
    /// Wall-clock solve time in milliseconds.
    pub wall_ms: f64,
}

/// Index and value of the cheapest tour this iteration (lowest colony wins ties).
pub(crate) fn min_cost(tour_costs: &[f32]) -> (usize, f32) {
    let mut k_min = 0usize;
    let mut c_min = tour_costs[0];
    for (k, &c) in tour_costs.iter().enumerate().skip(1) {
        if c < c_min {
            k_min = k;
            c_min = c;
        }
    }
    (k_min, c_min)
}

/// Solve a problem on the host engine.
///
/// # Errors
///
/// Returns [`FormicaryError::Config`] for out-of-domain hyperparameters and
/// [`FormicaryError::Capacity`] for problems outside the kernel size bounds
/// (the host engine enforces the same bounds so both substrates accept the
/// same problems).
pub fn solve_cpu(costs: &CostMatrix, config: &AcoConfig) -> Result<SolveReport, FormicaryError> {
    config.validate()?;
    let n = costs.n();
    check_problem_size(n)?;

    let started = Instant::now();
    let heuristic = heuristic_matrix(costs, config.beta);
    let mut pheromone = vec![1.0f32; n * n];
    let mut seed = config.seed;

    let mut best_cost = f32::INFINITY;
    let mut best_tour: Vec<u32> = Vec::new();
    let mut stall = 0u32;
    let mut iterations = 0u32;
    let mut progress = Vec::new();

    while stall < config.stall_threshold && iterations < config.max_iterations {
        let nonce = next_nonce(&mut seed);
        let choice = choice_info(&pheromone, &heuristic, config.alpha);
        let built = construct_tours(&choice, costs, config.colony_width, nonce);
        update_pheromone(&mut pheromone, &built.tours, &built.costs, config.rho);

        let (k_min, iter_min) = min_cost(&built.costs);
        progress.push(iter_min);
        if iter_min < best_cost {
            best_cost = iter_min;
            best_tour = built.tours[k_min * n..(k_min + 1) * n].to_vec();
            stall = 0;
        } else {
            stall += 1;
        }
        iterations += 1;
    }

    Ok(SolveReport {
        substrate: "cpu".into(),
        n_cities: n,
        best_tour,
        best_cost,
        iterations,
        stalled_iterations: stall,
        progress,
        wall_ms: started.elapsed().as_secs_f64() * 1e3,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aco::instances;
    use crate::aco::problem::is_permutation;

    #[test]
    fn rejects_invalid_hyperparameters_before_solving() {
        let costs = instances::uniform(5, 1.0);
        let config = AcoConfig {
            rho: 1.5,
            ..AcoConfig::quick_test()
        };
        let err = solve_cpu(&costs, &config).unwrap_err();
        assert!(matches!(err, FormicaryError::Config(_)));
    }

    #[test]
    fn rejects_oversized_problems() {
        let costs = instances::uniform(129, 1.0);
        let err = solve_cpu(&costs, &AcoConfig::quick_test()).unwrap_err();
        assert!(matches!(err, FormicaryError::Capacity(_)));
    }

    #[test]
    fn uniform_costs_stall_out_exactly() {
        // Every tour of a uniform instance costs n; the first iteration
        // improves on infinity, then the stall counter counts to threshold.
        let costs = instances::uniform(6, 1.0);
        let config = AcoConfig::quick_test();
        let report = solve_cpu(&costs, &config).unwrap();
        assert_eq!(
            report.iterations,
            1 + config.stall_threshold,
            "one improving iteration plus the full stall run"
        );
        assert_eq!(report.stalled_iterations, config.stall_threshold);
        assert!((report.best_cost - 6.0).abs() < 1e-5);
        assert_eq!(report.progress.len(), report.iterations as usize);
    }

    #[test]
    fn best_tour_is_a_valid_permutation() {
        let costs = instances::random_euclidean(12, 0xFEED);
        let report = solve_cpu(&costs, &AcoConfig::quick_test()).unwrap();
        assert!(
            is_permutation(&report.best_tour, 12),
            "best tour {:?} is not a permutation",
            report.best_tour
        );
    }

    #[test]
    fn progress_minimum_equals_best_cost() {
        let costs = instances::random_euclidean(10, 77);
        let report = solve_cpu(&costs, &AcoConfig::quick_test()).unwrap();
        let progress_min = report
            .progress
            .iter()
            .fold(f32::INFINITY, |acc, &c| acc.min(c));
        assert_eq!(
            progress_min.to_bits(),
            report.best_cost.to_bits(),
            "the reported best must be the running minimum of progress"
        );
    }

    #[test]
    fn identical_seeds_reproduce_identical_reports() {
        let costs = instances::random_euclidean(9, 123);
        let config = AcoConfig::quick_test();
        let a = solve_cpu(&costs, &config).unwrap();
        let b = solve_cpu(&costs, &config).unwrap();
        assert_eq!(a.best_tour, b.best_tour);
        assert_eq!(a.best_cost.to_bits(), b.best_cost.to_bits());
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.progress.len(), b.progress.len());
    }

    #[test]
    fn different_seeds_may_walk_different_paths() {
        let costs = instances::random_euclidean(10, 2024);
        let a = solve_cpu(
            &costs,
            &AcoConfig {
                seed: 1,
                ..AcoConfig::quick_test()
            },
        )
        .unwrap();
        let b = solve_cpu(
            &costs,
            &AcoConfig {
                seed: 2,
                ..AcoConfig::quick_test()
            },
        )
        .unwrap();
        // Both must be valid; the search paths almost surely differ.
        assert!(is_permutation(&a.best_tour, 10));
        assert!(is_permutation(&b.best_tour, 10));
    }

    #[test]
    fn max_iterations_caps_the_loop() {
        let costs = instances::random_euclidean(8, 5);
        let config = AcoConfig {
            max_iterations: 3,
            stall_threshold: 100,
            ..AcoConfig::quick_test()
        };
        let report = solve_cpu(&costs, &config).unwrap();
        assert_eq!(report.iterations, 3, "cap binds before the stall threshold");
    }
}
