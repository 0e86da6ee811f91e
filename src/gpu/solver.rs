// SPDX-License-Identifier: AGPL-3.0-only

//! Device-resident ACO solve loop.
//!
//! The cost, heuristic, pheromone, and choice-info matrices live in GPU
//! storage buffers for the whole run. Each iteration is encoded as a single
//! command submission with three compute passes:
//!
//! ```text
//!   choice_info  ->  construction  ->  pheromone_update  ->  copy tour costs
//!   (n^2/256 wg)     (n workgroups)    (tiles x tiles wg)    (to staging)
//! ```
//!
//! Only the n per-colony tour costs come back to the host every iteration,
//! through a staging buffer reused across the run. The full tour matrix is
//! read back only when an iteration improves on the incumbent. The pheromone
//! matrix never leaves the device during a solve.
//!
//! [`run_choice_info`], [`run_construction`], and [`run_pheromone_update`]
//! dispatch one kernel in isolation against host-supplied inputs, so each
//! stage can be checked against its host twin independently.

use std::time::Instant;

use crate::aco::config::{check_capacity, AcoConfig};
use crate::aco::construction::ConstructedTours;
use crate::aco::pheromone::DEPOSIT_TILE;
use crate::aco::problem::{heuristic_matrix, CostMatrix};
use crate::aco::rng::next_nonce;
use crate::aco::solver::{min_cost, SolveReport};
use crate::error::FormicaryError;

use super::shaders;
use super::GpuContext;

// ═══════════════════════════════════════════════════════════════════════════
// Kernel parameters
// ═══════════════════════════════════════════════════════════════════════════

/// Uniform block shared by all three kernels (WGSL `Params`).
///
/// Rewritten in place before every iteration so the construction kernel sees
/// a fresh run nonce; `alpha` and `rho` stay constant for a given run.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct IterParams {
    nonce: u32,
    alpha: f32,
    rho: f32,
    pad: u32,
}

impl IterParams {
    fn new(nonce: u32, config: &AcoConfig) -> Self {
        Self {
            nonce,
            alpha: config.alpha,
            rho: config.rho,
            pad: 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Pipelines and persistent state
// ═══════════════════════════════════════════════════════════════════════════

/// The three compute pipelines, specialized for one (n, colony width) pair.
///
/// Shader sources carry the problem size as compile-time constants, so a new
/// problem size means a recompile. Compilation takes milliseconds and a solve
/// runs hundreds of dispatches against the same pipelines, so this is paid
/// once per [`solve_gpu`] call.
pub struct AcoPipelines {
    pub choice: wgpu::ComputePipeline,
    pub construct: wgpu::ComputePipeline,
    pub deposit: wgpu::ComputePipeline,
}

impl AcoPipelines {
    /// Compile all three kernels, after checking the requested geometry
    /// against what the device actually grants.
    ///
    /// # Errors
    /// Returns [`FormicaryError::Capacity`] when the problem size or colony
    /// width exceeds the device's workgroup storage or invocation limits.
    pub fn new(gpu: &GpuContext, n: usize, width: u32) -> Result<Self, FormicaryError> {
        let limits = gpu.device().limits();
        check_capacity(
            n,
            width,
            limits.max_compute_workgroup_storage_size,
            limits.max_compute_invocations_per_workgroup,
        )?;
        Ok(Self {
            choice: gpu.create_pipeline(&shaders::choice_info_source(n), "choice_info"),
            construct: gpu.create_pipeline(
                &shaders::construction_source(n, width),
                "tour_construction",
            ),
            deposit: gpu.create_pipeline(&shaders::deposit_source(n), "pheromone_update"),
        })
    }
}

/// GPU-resident solver state: every buffer and bind group the iteration loop
/// touches, created once and reused for the whole run.
pub struct AcoGpuState {
    n: usize,
    pub costs_buf: wgpu::Buffer,
    pub heuristic_buf: wgpu::Buffer,
    pub pheromone_buf: wgpu::Buffer,
    pub choice_buf: wgpu::Buffer,
    pub tours_buf: wgpu::Buffer,
    pub tour_costs_buf: wgpu::Buffer,
    pub params_buf: wgpu::Buffer,
    staging_costs: wgpu::Buffer,
    choice_bind: wgpu::BindGroup,
    construct_bind: wgpu::BindGroup,
    deposit_bind: wgpu::BindGroup,
}

impl AcoGpuState {
    /// Upload the problem and allocate working buffers.
    ///
    /// Pheromone starts at 1.0 everywhere. Bind groups are built here, in
    /// the binding order the shaders declare, and never rebuilt.
    #[must_use]
    pub fn new(
        gpu: &GpuContext,
        pipelines: &AcoPipelines,
        costs: &CostMatrix,
        heuristic: &[f32],
        config: &AcoConfig,
    ) -> Self {
        let n = costs.n();
        let cells = n * n;

        let costs_buf = gpu.create_f32_buffer(costs.as_slice(), "aco_costs");
        let heuristic_buf = gpu.create_f32_buffer(heuristic, "aco_heuristic");
        let pheromone_buf = gpu.create_f32_state_buffer(&vec![1.0f32; cells], "aco_pheromone");
        let choice_buf = gpu.create_f32_state_buffer(&vec![0.0f32; cells], "aco_choice_info");
        let tours_buf = gpu.create_u32_output_buffer(cells, "aco_tours");
        let tour_costs_buf = gpu.create_f32_output_buffer(n, "aco_tour_costs");
        let params = IterParams::new(0, config);
        let params_buf = gpu.create_uniform_buffer(bytemuck::bytes_of(&params), "aco_params");
        let staging_costs = gpu.create_staging_buffer(n * 4, "aco_tour_costs_staging");

        let choice_bind = gpu.create_bind_group(
            &pipelines.choice,
            &[&pheromone_buf, &heuristic_buf, &choice_buf, &params_buf],
        );
        let construct_bind = gpu.create_bind_group(
            &pipelines.construct,
            &[&choice_buf, &costs_buf, &tours_buf, &tour_costs_buf, &params_buf],
        );
        let deposit_bind = gpu.create_bind_group(
            &pipelines.deposit,
            &[&tours_buf, &tour_costs_buf, &pheromone_buf, &params_buf],
        );

        Self {
            n,
            costs_buf,
            heuristic_buf,
            pheromone_buf,
            choice_buf,
            tours_buf,
            tour_costs_buf,
            params_buf,
            staging_costs,
            choice_bind,
            construct_bind,
            deposit_bind,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Solve loop
// ═══════════════════════════════════════════════════════════════════════════

/// Run the full ACO loop on the GPU and return the best tour found.
///
/// Mirrors [`crate::aco::solve_cpu`] exactly: same hyperparameter
/// validation, same nonce sequence from `config.seed`, same stall counter
/// and iteration cap, same lowest-colony tie-break. With identical inputs
/// the two substrates walk the same search trajectory up to floating-point
/// differences in the device's `pow` (see `tests/integration_gpu.rs`).
///
/// # Errors
/// - [`FormicaryError::Config`] for out-of-range hyperparameters.
/// - [`FormicaryError::Capacity`] when n or the colony width exceeds what
///   the device can hold.
/// - [`FormicaryError::DeviceCreation`] if a readback fails.
pub fn solve_gpu(
    gpu: &GpuContext,
    costs: &CostMatrix,
    config: &AcoConfig,
) -> Result<SolveReport, FormicaryError> {
    config.validate()?;
    let n = costs.n();
    let started = Instant::now();

    let pipelines = AcoPipelines::new(gpu, n, config.colony_width)?;
    let heuristic = heuristic_matrix(costs, config.beta);
    let state = AcoGpuState::new(gpu, &pipelines, costs, &heuristic, config);

    let mut seed = config.seed;
    let mut best_cost = f32::INFINITY;
    let mut best_tour: Vec<u32> = Vec::new();
    let mut stall = 0u32;
    let mut iterations = 0u32;
    let mut progress = Vec::new();

    while stall < config.stall_threshold && iterations < config.max_iterations {
        let nonce = next_nonce(&mut seed);
        let tour_costs = run_iteration(gpu, &pipelines, &state, nonce, config)?;

        let (k_min, iter_min) = min_cost(&tour_costs);
        progress.push(iter_min);
        if iter_min < best_cost {
            best_cost = iter_min;
            let tours = gpu.read_back_u32(&state.tours_buf, n * n)?;
            best_tour = tours[k_min * n..(k_min + 1) * n].to_vec();
            stall = 0;
        } else {
            stall += 1;
        }
        iterations += 1;
    }

    Ok(SolveReport {
        substrate: format!("gpu:{}", gpu.adapter_name),
        n_cities: n,
        best_tour,
        best_cost,
        iterations,
        stalled_iterations: stall,
        progress,
        wall_ms: started.elapsed().as_secs_f64() * 1e3,
    })
}

/// Encode one iteration (three passes plus the tour-cost copy) into a single
/// submission and return the per-colony tour costs.
fn run_iteration(
    gpu: &GpuContext,
    pipelines: &AcoPipelines,
    state: &AcoGpuState,
    nonce: u32,
    config: &AcoConfig,
) -> Result<Vec<f32>, FormicaryError> {
    let params = IterParams::new(nonce, config);
    gpu.queue()
        .write_buffer(&state.params_buf, 0, bytemuck::bytes_of(&params));

    let n = state.n as u32;
    let cells = n * n;
    let tiles = n.div_ceil(DEPOSIT_TILE);

    let mut encoder = gpu.begin_encoder("aco_iteration");
    GpuContext::encode_pass(
        &mut encoder,
        &pipelines.choice,
        &state.choice_bind,
        cells.div_ceil(256),
    );
    GpuContext::encode_pass(&mut encoder, &pipelines.construct, &state.construct_bind, n);
    GpuContext::encode_pass_grid(
        &mut encoder,
        &pipelines.deposit,
        &state.deposit_bind,
        (tiles, tiles, 1),
    );
    encoder.copy_buffer_to_buffer(
        &state.tour_costs_buf,
        0,
        &state.staging_costs,
        0,
        u64::from(n) * 4,
    );
    gpu.submit_encoder(encoder);

    gpu.read_staging_f32(&state.staging_costs)
}

// ═══════════════════════════════════════════════════════════════════════════
// Single-kernel entry points
// ═══════════════════════════════════════════════════════════════════════════

/// Run the choice-info kernel once: `pheromone^alpha * heuristic`, elementwise.
///
/// The device `pow` is allowed a few ULP of slack relative to the host's
/// `powf`, so compare results with a relative tolerance rather than bitwise.
///
/// # Errors
/// [`FormicaryError::DeviceCreation`] if the readback fails.
pub fn run_choice_info(
    gpu: &GpuContext,
    pheromone: &[f32],
    heuristic: &[f32],
    n: usize,
    alpha: f32,
) -> Result<Vec<f32>, FormicaryError> {
    let cells = n * n;
    let pipeline = gpu.create_pipeline(&shaders::choice_info_source(n), "choice_info");

    let pheromone_buf = gpu.create_f32_buffer(pheromone, "choice_pheromone");
    let heuristic_buf = gpu.create_f32_buffer(heuristic, "choice_heuristic");
    let choice_buf = gpu.create_f32_output_buffer(cells, "choice_out");
    let params = IterParams {
        nonce: 0,
        alpha,
        rho: 0.0,
        pad: 0,
    };
    let params_buf = gpu.create_uniform_buffer(bytemuck::bytes_of(&params), "choice_params");

    let bind = gpu.create_bind_group(
        &pipeline,
        &[&pheromone_buf, &heuristic_buf, &choice_buf, &params_buf],
    );
    gpu.dispatch(&pipeline, &bind, (cells as u32).div_ceil(256));

    gpu.read_back_f32(&choice_buf, cells)
}

/// Run the construction kernel once against an explicit choice-info snapshot.
///
/// Every arithmetic operation in the kernel (multiply, compare, reduce,
/// divide, sum) is exactly rounded on both substrates, so with the same
/// choice-info bits and the same nonce this matches
/// [`crate::aco::construct_tours`] bit for bit.
///
/// # Errors
/// - [`FormicaryError::Capacity`] when n or `width` exceeds device limits.
/// - [`FormicaryError::DeviceCreation`] if a readback fails.
pub fn run_construction(
    gpu: &GpuContext,
    costs: &CostMatrix,
    choice: &[f32],
    width: u32,
    nonce: u32,
) -> Result<ConstructedTours, FormicaryError> {
    let n = costs.n();
    let limits = gpu.device().limits();
    check_capacity(
        n,
        width,
        limits.max_compute_workgroup_storage_size,
        limits.max_compute_invocations_per_workgroup,
    )?;
    let pipeline = gpu.create_pipeline(&shaders::construction_source(n, width), "tour_construction");

    let choice_buf = gpu.create_f32_buffer(choice, "construct_choice");
    let costs_buf = gpu.create_f32_buffer(costs.as_slice(), "construct_costs");
    let tours_buf = gpu.create_u32_output_buffer(n * n, "construct_tours");
    let tour_costs_buf = gpu.create_f32_output_buffer(n, "construct_tour_costs");
    let params = IterParams {
        nonce,
        alpha: 0.0,
        rho: 0.0,
        pad: 0,
    };
    let params_buf = gpu.create_uniform_buffer(bytemuck::bytes_of(&params), "construct_params");

    let bind = gpu.create_bind_group(
        &pipeline,
        &[&choice_buf, &costs_buf, &tours_buf, &tour_costs_buf, &params_buf],
    );
    gpu.dispatch(&pipeline, &bind, n as u32);

    Ok(ConstructedTours {
        tours: gpu.read_back_u32(&tours_buf, n * n)?,
        costs: gpu.read_back_f32(&tour_costs_buf, n)?,
    })
}

/// Run the pheromone-update kernel once and return the updated matrix.
///
/// Takes the current pheromone snapshot plus the iteration's tours and tour
/// costs; evaporation and deposit are fused in a single `fma` per cell, as
/// in [`crate::aco::update_pheromone`].
///
/// # Errors
/// [`FormicaryError::DeviceCreation`] if the readback fails.
pub fn run_pheromone_update(
    gpu: &GpuContext,
    pheromone: &[f32],
    tours: &[u32],
    tour_costs: &[f32],
    rho: f32,
) -> Result<Vec<f32>, FormicaryError> {
    let n = tour_costs.len();
    let cells = n * n;
    let pipeline = gpu.create_pipeline(&shaders::deposit_source(n), "pheromone_update");

    let tours_buf = gpu.create_u32_output_buffer(cells, "deposit_tours");
    gpu.upload_u32(&tours_buf, tours);
    let tour_costs_buf = gpu.create_f32_output_buffer(n, "deposit_tour_costs");
    gpu.upload_f32(&tour_costs_buf, tour_costs);
    let pheromone_buf = gpu.create_f32_state_buffer(pheromone, "deposit_pheromone");
    let params = IterParams {
        nonce: 0,
        alpha: 0.0,
        rho,
        pad: 0,
    };
    let params_buf = gpu.create_uniform_buffer(bytemuck::bytes_of(&params), "deposit_params");

    let bind = gpu.create_bind_group(
        &pipeline,
        &[&tours_buf, &tour_costs_buf, &pheromone_buf, &params_buf],
    );
    let tiles = (n as u32).div_ceil(DEPOSIT_TILE);
    let mut encoder = gpu.begin_encoder("pheromone_update_once");
    GpuContext::encode_pass_grid(&mut encoder, &pipeline, &bind, (tiles, tiles, 1));
    gpu.submit_encoder(encoder);

    gpu.read_back_f32(&pheromone_buf, cells)
}
