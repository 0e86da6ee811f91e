// SPDX-License-Identifier: AGPL-3.0-only

//! Ant-colony tour construction and pheromone dynamics — host engine.
//!
//! Everything the GPU kernels do has an exact host twin here, arithmetic
//! order included, so kernel output can be checked for bit-level agreement
//! rather than tolerance-level agreement. The orchestration loop in
//! [`solver`] runs entirely on these twins; `crate::gpu` swaps the matrix
//! work onto compute pipelines without changing the loop.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `bitset` | 128-bit visited-city mask, four u32 words |
//! | `rng` | Counter-based block-cipher RNG, one stream per lane |
//! | `reduce` | Power-of-two halving reduction (max, sum) |
//! | `problem` | Cost matrix, heuristic matrix, tour-length checks |
//! | `config` | Hyperparameter domains and kernel capacity accounting |
//! | `construction` | Queen/worker tour construction, one colony per city |
//! | `pheromone` | Choice-info recompute and evaporate-plus-deposit update |
//! | `solver` | Iterate-until-stalled loop, [`solver::SolveReport`] |
//! | `instances` | Synthetic problems with known optima |

pub mod bitset;
pub mod config;
pub mod construction;
pub mod instances;
pub mod pheromone;
pub mod problem;
pub mod reduce;
pub mod rng;
pub mod solver;

pub use bitset::BitSet128;
pub use config::AcoConfig;
pub use construction::{construct_tours, ConstructedTours};
pub use pheromone::{choice_info, update_pheromone};
pub use problem::{heuristic_matrix, CostMatrix};
pub use solver::{solve_cpu, SolveReport};
