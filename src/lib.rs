//! formicary — GPU-parallel ant colony optimization for symmetric TSP
//!
//! One colony per city, one workgroup per colony. Every iteration rebuilds
//! the choice-info matrix, constructs N tours in parallel, and applies the
//! evaporate-plus-deposit pheromone update; the loop stops after a
//! configurable run of non-improving iterations or a hard iteration cap.
//!
//! The host engine in [`aco`] and the WGSL kernels in [`gpu`] are
//! arithmetic twins: same stripe order, same reduction tree, same RNG
//! stream. Given the same choice-info bits the two substrates construct
//! identical tours, so validation can hold them to bit-level agreement
//! instead of tolerance-level agreement.
//!
//! ## Active modules
//!   - `aco` — host engine: visited-set bitmask, counter RNG, reductions,
//!     tour construction, pheromone update, solve loop
//!   - `gpu` — wgpu context, WGSL kernel sources, device solve loop
//!   - `error` — typed configuration and capacity errors
//!   - `tolerances` — validation thresholds shared by tests and binaries
//!   - `validation` — pass/fail harness behind the binaries' exit codes
//!
//! ## Validation binaries
//!   - `validate_solver` — CPU engine against instances with known optima
//!   - `aco_gpu` — device solve with CPU cross-check on the same instance

pub mod aco;
pub mod error;
pub mod gpu;
pub mod tolerances;
pub mod validation;
