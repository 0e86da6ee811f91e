// SPDX-License-Identifier: AGPL-3.0-only

//! Synthetic problem instances with known structure.
//!
//! Every validation path needs problems whose optima are known by
//! construction rather than by running the solver. Three families cover the
//! cases the tests exercise:
//!
//! | Family             | Structure                          | Known optimum      |
//! |--------------------|------------------------------------|--------------------|
//! | `ring`             | cycle edges cheap, chords dear     | `n * adjacent`     |
//! | `uniform`          | every edge identical               | `n * cost`         |
//! | `random_euclidean` | points in the unit square          | (none, structural) |

use crate::aco::problem::CostMatrix;
use crate::aco::rng::lcg_step;

/// Cycle instance: consecutive cities (mod n) cost `adjacent`, all other
/// pairs cost `chord`. With `chord >> adjacent` the unique optimal tour walks
/// the ring in either direction for a length of `n * adjacent`.
///
/// # Panics
///
/// Panics if `n < 3`; a ring needs at least a triangle.
#[must_use]
pub fn ring(n: usize, adjacent: f32, chord: f32) -> CostMatrix {
    assert!(n >= 3, "a ring instance needs n >= 3, got {n}");
    let mut w = vec![0.0f32; n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let gap = (i as i64 - j as i64).unsigned_abs() as usize;
            w[i * n + j] = if gap == 1 || gap == n - 1 {
                adjacent
            } else {
                chord
            };
        }
    }
    CostMatrix::from_flat(n, w).expect("ring costs are finite and non-negative")
}

/// Degenerate instance where every tour has the same length `n * cost`.
/// Useful for pinning down stall-counter behaviour: no iteration can improve
/// on the first.
#[must_use]
pub fn uniform(n: usize, cost: f32) -> CostMatrix {
    let mut w = vec![cost; n * n];
    for i in 0..n {
        w[i * n + i] = 0.0;
    }
    CostMatrix::from_flat(n, w).expect("uniform costs are finite and non-negative")
}

/// Euclidean instance from `n` pseudo-random points in the unit square.
/// Deterministic in `seed`, so tests can reproduce exact matrices.
#[must_use]
pub fn random_euclidean(n: usize, seed: u64) -> CostMatrix {
    let mut state = seed;
    let mut unit = || {
        lcg_step(&mut state);
        // Top 53 bits give a f64 uniform in [0, 1).
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let points: Vec<(f64, f64)> = (0..n).map(|_| (unit(), unit())).collect();

    let mut w = vec![0.0f32; n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let dx = points[i].0 - points[j].0;
            let dy = points[i].1 - points[j].1;
            w[i * n + j] = (dx * dx + dy * dy).sqrt() as f32;
        }
    }
    CostMatrix::from_flat(n, w).expect("euclidean costs are finite and non-negative")
}
