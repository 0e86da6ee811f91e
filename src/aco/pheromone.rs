// SPDX-License-Identifier: AGPL-3.0-only

//! Pheromone cycle: choice-info recompute, deposit accumulation, evaporation.
//!
//! Host twins of the two matrix kernels. The deposit emulation visits each
//! cell's matching tour edges in the kernel's streaming order (tour-major,
//! then step), so f32 accumulation matches the device chunk scan; the final
//! write is the same fused multiply-add `new = fma(old, 1-rho, deposit)`.

use rayon::prelude::*;

/// Square tile edge of the pheromone-update dispatch; the kernel runs
/// `DEPOSIT_TILE × DEPOSIT_TILE` workers per group, one owned cell each.
pub const DEPOSIT_TILE: u32 = 16;

/// Recompute the choice-info matrix: `pheromone^alpha * heuristic`.
///
/// Read-only during tour construction; rebuilt from scratch every iteration.
#[must_use]
pub fn choice_info(pheromone: &[f32], heuristic: &[f32], alpha: f32) -> Vec<f32> {
    debug_assert_eq!(pheromone.len(), heuristic.len());
    pheromone
        .par_iter()
        .zip(heuristic.par_iter())
        .map(|(&p, &h)| p.powf(alpha) * h)
        .collect()
}

/// Apply one iteration of deposits and evaporation to the pheromone matrix.
///
/// Every tour deposits its quality `1/length` on each edge it traverses, in
/// both directions (cell (i,j) matches a traversal of i→j or j→i, keeping
/// the matrix symmetric for symmetric problems). Each cell then evaporates:
/// `new = (1-rho)*old + deposit` as one fused multiply-add. Tour rows must
/// be permutations; lengths of zero contribute no deposit.
pub fn update_pheromone(
    pheromone: &mut [f32],
    tours: &[u32],
    tour_costs: &[f32],
    rho: f32,
) {
    let n = tour_costs.len();
    debug_assert_eq!(tours.len(), n * n, "tours must be N×N");
    debug_assert_eq!(pheromone.len(), n * n, "pheromone must be N×N");

    // Quality per tour, computed once — the same single f32 division the
    // kernel performs per cached slot.
    let quality: Vec<f32> = tour_costs
        .iter()
        .map(|&len| if len > 0.0 { 1.0 / len } else { 0.0 })
        .collect();

    // Position of each city within each tour: tour k visits city
    // tours[k*n + s] at step s. A cell (i,j) can only match the edges
    // leaving i and leaving j, so each tour contributes at most two slots.
    let mut position = vec![0u32; n * n];
    for k in 0..n {
        for s in 0..n {
            let city = tours[k * n + s] as usize;
            position[k * n + city] = s as u32;
        }
    }

    let one_minus_rho = 1.0 - rho;
    pheromone
        .par_iter_mut()
        .enumerate()
        .for_each(|(cell, value)| {
            let i = cell / n;
            let j = cell % n;
            let mut deposit = 0.0f32;
            if i != j {
                for k in 0..n {
                    // Ascending slot order within the tour keeps the f32
                    // accumulation in the kernel's streaming order.
                    let si = position[k * n + i];
                    let sj = position[k * n + j];
                    let (first, second) = if si <= sj { (si, sj) } else { (sj, si) };
                    for s in [first, second] {
                        let s = s as usize;
                        let from = tours[k * n + s];
                        let to = tours[k * n + (s + 1) % n];
                        let matches = (from == i as u32 && to == j as u32)
                            || (from == j as u32 && to == i as u32);
                        if matches {
                            deposit += quality[k];
                        }
                    }
                }
            }
            *value = value.mul_add(one_minus_rho, deposit);
        });
}
