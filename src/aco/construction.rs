// SPDX-License-Identifier: AGPL-3.0-only

//! Queen/Worker tour construction — host engine.
//!
//! One colony per starting city builds a Hamiltonian cycle through the state
//! machine `INIT → (SELECT_CANDIDATE → ADVANCE) × (N−1) → EXPORT_COST →
//! EXPORT_TOUR`. This module runs the protocol step-for-step as the WGSL
//! kernel does: the same stripe order, the same tree-reduction schedule, the
//! same f32 arithmetic, the same per-worker PRNG call pattern. Given the same
//! choice-info snapshot and run nonce, host tours match device tours
//! bit-for-bit.
//!
//! Roles are positional, not typed: "worker `lid`" is an index into the tabu
//! and PRNG arrays, "the queen" is the shared state block, and queen-only
//! actions are the emulation of the kernel's `local_index == 0` branches.
//! Colonies are independent, so they run under `rayon`; each colony's
//! emulation is sequential and deterministic regardless of scheduling.

use rayon::prelude::*;

use crate::aco::bitset::BitSet128;
use crate::aco::problem::CostMatrix;
use crate::aco::reduce::{reduce_max, reduce_sum};
use crate::aco::rng::FeistelRng;

/// Score carried by tabu, out-of-range, and idle lanes.
///
/// Strictly below every live score (live scores are products of
/// non-negatives), so a zero-valued random draw can never pull a visited
/// city into the selection.
pub const SCORE_TABU: f32 = -1.0;

/// Queen cache sentinel; below even [`SCORE_TABU`] so the first live stripe
/// maximum always improves it.
pub const CACHE_EMPTY: f32 = -2.0;

/// Best-candidate index sentinel; any real column wins the atomic-min.
pub const NO_CANDIDATE: u32 = u32::MAX;

/// Per-group coordinator state (the kernel's shared-memory block).
struct Queen {
    tour: Vec<u32>,
    scratch: Vec<f32>,
    best_value: f32,
    best_index: u32,
    current: u32,
}

/// All tours for one iteration: row k is colony k's permutation.
pub struct ConstructedTours {
    /// Flat N×N row-major tour matrix.
    pub tours: Vec<u32>,
    /// Per-colony tour length, as the kernel's strided f32 sum computes it.
    pub costs: Vec<f32>,
}

/// Build one tour per starting city against a choice-info snapshot.
///
/// `choice` is the flat N×N choice-info matrix; `nonce` is the per-iteration
/// run nonce every worker folds into its PRNG seed.
#[must_use]
pub fn construct_tours(
    choice: &[f32],
    costs: &CostMatrix,
    width: u32,
    nonce: u32,
) -> ConstructedTours {
    let n = costs.n();
    debug_assert_eq!(choice.len(), n * n, "choice-info must be N×N");

    let per_colony: Vec<(Vec<u32>, f32)> = (0..n as u32)
        .into_par_iter()
        .map(|colony| build_colony_tour(colony, choice, costs, width, nonce))
        .collect();

    let mut tours = vec![0u32; n * n];
    let mut tour_costs = vec![0.0f32; n];
    for (k, (tour, cost)) in per_colony.into_iter().enumerate() {
        tours[k * n..(k + 1) * n].copy_from_slice(&tour);
        tour_costs[k] = cost;
    }
    ConstructedTours {
        tours,
        costs: tour_costs,
    }
}

/// Run the full protocol for one colony.
fn build_colony_tour(
    colony: u32,
    choice: &[f32],
    costs: &CostMatrix,
    width: u32,
    nonce: u32,
) -> (Vec<u32>, f32) {
    let n = costs.n();
    let w = width as usize;
    let stripes = n.div_ceil(w);

    // INIT: per-worker state, then the queen block, exactly as worker 0 and
    // the striding owner of the start column set it up behind the first
    // barrier.
    let mut tabu = vec![BitSet128::new(); w];
    let mut rng: Vec<FeistelRng> = (0..width)
        .map(|lid| FeistelRng::new((colony * width + lid).wrapping_add(nonce)))
        .collect();
    let mut queen = Queen {
        tour: vec![0u32; n + 1],
        scratch: vec![0.0f32; w],
        best_value: CACHE_EMPTY,
        best_index: NO_CANDIDATE,
        current: colony,
    };
    queen.tour[0] = colony;
    tabu[colony as usize % w].set(colony);

    let mut lane_score = vec![0.0f32; w];

    for step in 1..n {
        // SELECT_CANDIDATE: one round per stripe until all N columns are
        // scanned.
        for stripe in 0..stripes {
            for lid in 0..w {
                let c = stripe * w + lid;
                let score = if c < n && !tabu[lid].test(c as u32) {
                    choice[queen.current as usize * n + c] * rng[lid].draw()
                } else {
                    SCORE_TABU
                };
                queen.scratch[lid] = score;
                lane_score[lid] = score;
            }
            let stripe_max = reduce_max(&mut queen.scratch);
            // Queen branch: accept only live maxima, reset the winner slot on
            // strict improvement so only new-maximum holders write below.
            if stripe_max >= 0.0 && stripe_max > queen.best_value {
                queen.best_value = stripe_max;
                queen.best_index = NO_CANDIDATE;
            }
            // Every worker holding the cached maximum writes its column via
            // atomic-min: the lowest index among exact ties wins, and a later
            // stripe that merely ties cannot steal (its columns are higher).
            for lid in 0..w {
                if lane_score[lid] >= 0.0 && lane_score[lid] == queen.best_value {
                    let c = (stripe * w + lid) as u32;
                    queen.best_index = queen.best_index.min(c);
                }
            }
        }

        // ADVANCE: the striding owner marks the winner visited; the queen
        // appends it, re-anchors, and clears the cache; every worker drops
        // its memoized draw so the next step samples fresh randomness.
        let next = queen.best_index;
        debug_assert!(
            next != NO_CANDIDATE && (next as usize) < n,
            "an unvisited city always exists at step {step}, selection is total"
        );
        tabu[next as usize % w].set(next);
        queen.tour[step] = next;
        queen.current = next;
        queen.best_value = CACHE_EMPTY;
        queen.best_index = NO_CANDIDATE;
        for r in &mut rng {
            r.discard_cached();
        }
    }

    // EXPORT_COST: strided per-worker partials over tour edges (closing edge
    // included), then the tree sum.
    for lid in 0..w {
        let mut partial = 0.0f32;
        let mut s = lid;
        while s < n {
            let from = queen.tour[s] as usize;
            let to = queen.tour[(s + 1) % n] as usize;
            partial += costs.at(from, to);
            s += w;
        }
        queen.scratch[lid] = partial;
    }
    let total = reduce_sum(&mut queen.scratch);

    // EXPORT_TOUR: the first N tour slots become the colony's row.
    queen.tour.truncate(n);
    (queen.tour, total)
}
