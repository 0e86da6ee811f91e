// SPDX-License-Identifier: AGPL-3.0-only

//! Solver configuration: hyperparameters, domains, capacity checks.
//!
//! Hyperparameters are fixed for the duration of a solve. `validate()` runs
//! before any dispatch and reports domain violations as
//! [`FormicaryError::Config`]; the capacity checks run at dispatch
//! preparation and report hard size limits as [`FormicaryError::Capacity`]
//! (shared buffers are sized at kernel build, so an oversized problem is a
//! failure, never a silent truncation).

use crate::aco::bitset::BitSet128;
use crate::aco::pheromone::DEPOSIT_TILE;
use crate::error::FormicaryError;

/// Smallest accepted colony width (group size).
pub const MIN_COLONY_WIDTH: u32 = 4;

/// Largest accepted colony width; also the portable workgroup-invocation cap.
pub const MAX_COLONY_WIDTH: u32 = 256;

/// ACO hyperparameters and run controls.
#[derive(Debug, Clone)]
pub struct AcoConfig {
    /// Pheromone weight in the choice-info product (> 0).
    pub alpha: f32,
    /// Heuristic weight in `(1/cost)^beta` (> 0).
    pub beta: f32,
    /// Evaporation rate in (0, 1).
    pub rho: f32,
    /// Cooperating threads per colony; power of two in [4, 256].
    pub colony_width: u32,
    /// Consecutive non-improving iterations before stopping.
    pub stall_threshold: u32,
    /// Safety cap on total iterations.
    pub max_iterations: u32,
    /// Host seed driving the per-iteration nonce walk.
    pub seed: u64,
}

impl Default for AcoConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 2.0,
            rho: 0.5,
            colony_width: 64,
            stall_threshold: 8,
            max_iterations: 200,
            seed: 42,
        }
    }
}

impl AcoConfig {
    /// Small-width preset for fast deterministic test runs.
    #[must_use]
    pub fn quick_test() -> Self {
        Self {
            colony_width: 8,
            max_iterations: 60,
            ..Self::default()
        }
    }

    /// Check every hyperparameter domain.
    ///
    /// # Errors
    ///
    /// Returns [`FormicaryError::Config`] naming the first violated domain.
    pub fn validate(&self) -> Result<(), FormicaryError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(FormicaryError::Config(format!(
                "alpha must be finite and > 0, got {}",
                self.alpha
            )));
        }
        if !self.beta.is_finite() || self.beta <= 0.0 {
            return Err(FormicaryError::Config(format!(
                "beta must be finite and > 0, got {}",
                self.beta
            )));
        }
        if !self.rho.is_finite() || self.rho <= 0.0 || self.rho >= 1.0 {
            return Err(FormicaryError::Config(format!(
                "rho must lie in (0, 1), got {}",
                self.rho
            )));
        }
        if !self.colony_width.is_power_of_two()
            || self.colony_width < MIN_COLONY_WIDTH
            || self.colony_width > MAX_COLONY_WIDTH
        {
            return Err(FormicaryError::Config(format!(
                "colony width must be a power of two in [{MIN_COLONY_WIDTH}, {MAX_COLONY_WIDTH}], got {}",
                self.colony_width
            )));
        }
        if self.stall_threshold == 0 {
            return Err(FormicaryError::Config(
                "stall threshold must be ≥ 1".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(FormicaryError::Config(
                "max iterations must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// City-count bound shared by both substrates.
///
/// The tabu set is 128 bits, so more cities cannot be tracked; below two
/// cities there is no tour to build.
///
/// # Errors
///
/// Returns [`FormicaryError::Capacity`] outside [2, 128].
pub fn check_problem_size(n: usize) -> Result<(), FormicaryError> {
    if n < 2 {
        return Err(FormicaryError::Capacity(format!(
            "{n} cities — a tour needs at least 2"
        )));
    }
    if n > BitSet128::CAPACITY as usize {
        return Err(FormicaryError::Capacity(format!(
            "{n} cities exceed the {}-bit tabu set",
            BitSet128::CAPACITY
        )));
    }
    Ok(())
}

/// Workgroup shared-memory bytes the construction kernel declares for (n, width).
///
/// Tour buffer of n+1 u32, scratch of `width` f32, plus the queen scalars
/// (best value, best index, current city).
#[must_use]
pub fn construction_workgroup_bytes(n: usize, width: u32) -> u32 {
    4 * (n as u32 + 1) + 4 * width + 12
}

/// Workgroup shared-memory bytes the pheromone kernel declares.
///
/// Three chunk caches (edge from/to, quality) of one slot per worker.
#[must_use]
pub fn deposit_workgroup_bytes() -> u32 {
    3 * 4 * DEPOSIT_TILE * DEPOSIT_TILE
}

/// Device-facing capacity check run at dispatch preparation.
///
/// # Errors
///
/// Returns [`FormicaryError::Capacity`] when the problem size is out of
/// bounds, a kernel needs more invocations per workgroup than the device
/// allows, or the declared shared memory exceeds the device budget.
pub fn check_capacity(
    n: usize,
    width: u32,
    max_workgroup_storage: u32,
    max_workgroup_invocations: u32,
) -> Result<(), FormicaryError> {
    check_problem_size(n)?;
    let invocations = width.max(DEPOSIT_TILE * DEPOSIT_TILE);
    if invocations > max_workgroup_invocations {
        return Err(FormicaryError::Capacity(format!(
            "kernels need {invocations} invocations per workgroup, device allows {max_workgroup_invocations}"
        )));
    }
    let bytes = construction_workgroup_bytes(n, width).max(deposit_workgroup_bytes());
    if bytes > max_workgroup_storage {
        return Err(FormicaryError::Capacity(format!(
            "kernels need {bytes} B of workgroup memory for {n} cities at width {width}, device allows {max_workgroup_storage} B"
        )));
    }
    Ok(())
}
