// SPDX-License-Identifier: AGPL-3.0-only

//! Problem data: cost matrix, derived heuristic, tour measurement.
//!
//! The engine consumes a ready-made [`CostMatrix`] (an external loader owns
//! problem-file parsing). Matrices are flat row-major `Vec<f32>` indexed
//! `i*n + j`, matching the storage-buffer layout the kernels read. The
//! diagonal is an unused sentinel. Validation arithmetic (tour recomputation,
//! baselines) runs in f64 on the host.

use crate::error::FormicaryError;
use crate::tolerances::ZERO_COST_EPSILON;

/// Immutable N×N edge-weight matrix with non-negative finite entries.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    n: usize,
    w: Vec<f32>,
}

impl CostMatrix {
    /// Build from a flat row-major buffer of length `n*n`.
    ///
    /// # Errors
    ///
    /// Returns [`FormicaryError::Config`] if the length does not match or
    /// any entry is negative or non-finite.
    pub fn from_flat(n: usize, w: Vec<f32>) -> Result<Self, FormicaryError> {
        if w.len() != n * n {
            return Err(FormicaryError::Config(format!(
                "cost matrix for {n} cities needs {} entries, got {}",
                n * n,
                w.len()
            )));
        }
        for (idx, &c) in w.iter().enumerate() {
            if !c.is_finite() || c < 0.0 {
                return Err(FormicaryError::Config(format!(
                    "cost[{}][{}] = {c} (edge weights must be finite and ≥ 0)",
                    idx / n,
                    idx % n
                )));
            }
        }
        Ok(Self { n, w })
    }

    /// Build from per-city rows.
    ///
    /// # Errors
    ///
    /// Returns [`FormicaryError::Config`] if any row length differs from the
    /// row count or an entry is out of domain.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, FormicaryError> {
        let n = rows.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(FormicaryError::Config(format!(
                    "row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
        }
        Self::from_flat(n, rows.concat())
    }

    /// City count.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Edge weight from city `i` to city `j`.
    #[must_use]
    pub fn at(&self, i: usize, j: usize) -> f32 {
        self.w[i * self.n + j]
    }

    /// Flat row-major view (upload-ready).
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.w
    }

    /// True when `cost[i][j] == cost[j][i]` for all pairs.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                if self.at(i, j) != self.at(j, i) {
                    return false;
                }
            }
        }
        true
    }
}

/// Static per-edge desirability derived solely from edge cost.
///
/// `1.0` on the diagonal; else `1.0` for near-zero costs (guarding the
/// reciprocal), else `(1/cost)^beta`. Values lie in [0,1] for unit-or-larger
/// edge weights. Computed once per solve.
#[must_use]
pub fn heuristic_matrix(costs: &CostMatrix, beta: f32) -> Vec<f32> {
    let n = costs.n();
    let mut h = vec![0.0f32; n * n];
    for i in 0..n {
        for j in 0..n {
            h[i * n + j] = if i == j {
                1.0
            } else {
                let c = costs.at(i, j);
                if c <= ZERO_COST_EPSILON {
                    1.0
                } else {
                    (1.0 / c).powf(beta)
                }
            };
        }
    }
    h
}

/// Total f64 length of a tour including the closing edge.
#[must_use]
pub fn tour_length_f64(costs: &CostMatrix, tour: &[u32]) -> f64 {
    let n = tour.len();
    let mut total = 0.0f64;
    for s in 0..n {
        let from = tour[s] as usize;
        let to = tour[(s + 1) % n] as usize;
        total += f64::from(costs.at(from, to));
    }
    total
}

/// True when `tour` visits every city in `0..n` exactly once.
#[must_use]
pub fn is_permutation(tour: &[u32], n: usize) -> bool {
    if tour.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &city in tour {
        let Some(slot) = seen.get_mut(city as usize) else {
            return false;
        };
        if *slot {
            return false;
        }
        *slot = true;
    }
    true
}

/// Multi-start nearest-neighbour tour length: the classical greedy baseline.
///
/// From every starting city, repeatedly walk to the cheapest unvisited city
/// (lowest index on cost ties), close the cycle, and keep the best total.
/// Used by the validation hosts to contextualize solver results.
#[must_use]
pub fn nearest_neighbour_cost(costs: &CostMatrix) -> f64 {
    let n = costs.n();
    let mut best = f64::INFINITY;
    for start in 0..n {
        let mut visited = vec![false; n];
        visited[start] = true;
        let mut current = start;
        let mut total = 0.0f64;
        for _ in 1..n {
            let mut next = usize::MAX;
            let mut next_cost = f32::INFINITY;
            for j in 0..n {
                if !visited[j] && costs.at(current, j) < next_cost {
                    next = j;
                    next_cost = costs.at(current, j);
                }
            }
            total += f64::from(next_cost);
            visited[next] = true;
            current = next;
        }
        total += f64::from(costs.at(current, start));
        if total < best {
            best = total;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square4() -> CostMatrix {
        // Four cities on a unit square: sides 1, diagonals √2.
        let d = std::f32::consts::SQRT_2;
        CostMatrix::from_rows(&[
            vec![0.0, 1.0, d, 1.0],
            vec![1.0, 0.0, 1.0, d],
            vec![d, 1.0, 0.0, 1.0],
            vec![1.0, d, 1.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn from_flat_rejects_wrong_length() {
        let err = CostMatrix::from_flat(3, vec![0.0; 8]).unwrap_err();
        assert!(err.to_string().contains("9 entries"));
    }

    #[test]
    fn from_flat_rejects_negative_edge() {
        let mut w = vec![1.0f32; 9];
        w[5] = -2.0;
        let err = CostMatrix::from_flat(3, w).unwrap_err();
        assert!(err.to_string().contains("cost[1][2]"));
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let err = CostMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0]]).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn square_instance_is_symmetric() {
        assert!(square4().is_symmetric());
    }

    #[test]
    fn heuristic_diagonal_and_reciprocal() {
        let costs = square4();
        let h = heuristic_matrix(&costs, 2.0);
        assert_eq!(h[0], 1.0, "diagonal entries are 1");
        assert!((h[1] - 1.0).abs() < 1e-6, "unit edge ⇒ heuristic 1");
        // Diagonal edge √2: (1/√2)² = 0.5.
        assert!((h[2] - 0.5).abs() < 1e-6, "√2 edge with beta=2 ⇒ 0.5");
    }

    #[test]
    fn heuristic_guards_near_zero_cost() {
        let costs =
            CostMatrix::from_rows(&[vec![0.0, 0.0], vec![0.0, 0.0]]).unwrap();
        let h = heuristic_matrix(&costs, 3.0);
        assert_eq!(h, vec![1.0; 4], "zero-cost edges map to maximal desirability");
    }

    #[test]
    fn tour_length_includes_closing_edge() {
        let costs = square4();
        let perimeter = tour_length_f64(&costs, &[0, 1, 2, 3]);
        assert!((perimeter - 4.0).abs() < 1e-6, "perimeter tour is 4, got {perimeter}");
        let crossed = tour_length_f64(&costs, &[0, 2, 1, 3]);
        let expected = 2.0 * f64::from(std::f32::consts::SQRT_2) + 2.0;
        assert!(
            (crossed - expected).abs() < 1e-6,
            "crossing tour is 2+2√2, got {crossed}"
        );
    }

    #[test]
    fn permutation_check() {
        assert!(is_permutation(&[2, 0, 1, 3], 4));
        assert!(!is_permutation(&[0, 1, 1, 3], 4), "duplicate city");
        assert!(!is_permutation(&[0, 1, 2], 4), "missing city");
        assert!(!is_permutation(&[0, 1, 2, 9], 4), "city out of range");
    }

    #[test]
    fn nearest_neighbour_on_square_is_perimeter() {
        let costs = square4();
        let nn = nearest_neighbour_cost(&costs);
        assert!((nn - 4.0).abs() < 1e-6, "greedy walks the perimeter, got {nn}");
    }
}
