// SPDX-License-Identifier: AGPL-3.0-only

//! WGSL compute kernels for the three dispatch stages.
//!
//! The kernels are templates: problem size and colony width are baked in as
//! compile-time constants by token substitution before pipeline creation, so
//! shared-memory arrays get exact sizes and loop bounds stay uniform. Every
//! kernel is twinned by a host implementation in `crate::aco` that performs
//! the same f32 operations in the same order; the construction kernel is
//! twinned bit-for-bit (`aco::construction`), the matrix kernels to f32
//! rounding of `pow`.
//!
//! One uniform `Params` block is shared by all three kernels and rewritten
//! once per iteration with the fresh run nonce.

use crate::aco::pheromone::DEPOSIT_TILE;

/// Choice-info recompute: `choice[e] = pheromone[e]^alpha * heuristic[e]`.
///
/// One thread per matrix cell, flat over N² with a tail guard.
///
/// ## Binding layout
///
/// | binding | buffer | access |
/// |---------|--------|--------|
/// | 0 | `pheromone: array<f32>` (N²) | read |
/// | 1 | `heuristic: array<f32>` (N²) | read |
/// | 2 | `choice_info: array<f32>` (N²) | write |
/// | 3 | `params: Params` | uniform |
pub const WGSL_CHOICE_INFO: &str = r#"
struct Params {
    nonce: u32,
    alpha: f32,
    rho: f32,
    pad: u32,
}

@group(0) @binding(0) var<storage, read> pheromone: array<f32>;
@group(0) @binding(1) var<storage, read> heuristic: array<f32>;
@group(0) @binding(2) var<storage, read_write> choice_info: array<f32>;
@group(0) @binding(3) var<uniform> params: Params;

const CELLS: u32 = {{CELLS}}u;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let cell = gid.x;
    if (cell >= CELLS) {
        return;
    }
    choice_info[cell] = pow(pheromone[cell], params.alpha) * heuristic[cell];
}
"#;

/// Queen/worker tour construction: one workgroup per colony, `WIDTH` lanes.
///
/// Runs `INIT → (SELECT_CANDIDATE → ADVANCE) × (N−1) → EXPORT_COST →
/// EXPORT_TOUR` entirely inside the workgroup. Candidate columns are
/// scanned in stripes of `WIDTH`; each stripe's scores tree-reduce to a
/// maximum the lane-0 queen compares against its cached best, and every
/// holder of the cached maximum races `atomicMin` so the lowest column
/// wins exact ties. Lane-private state: a four-word tabu bitset and a
/// counter-based Feistel pair generator seeded `colony*WIDTH + lane + nonce`.
///
/// ## Binding layout
///
/// | binding | buffer | access |
/// |---------|--------|--------|
/// | 0 | `choice_info: array<f32>` (N²) | read |
/// | 1 | `costs: array<f32>` (N²) | read |
/// | 2 | `tours: array<u32>` (N²) | write |
/// | 3 | `tour_costs: array<f32>` (N) | write |
/// | 4 | `params: Params` | uniform |
pub const WGSL_CONSTRUCTION: &str = r#"
struct Params {
    nonce: u32,
    alpha: f32,
    rho: f32,
    pad: u32,
}

@group(0) @binding(0) var<storage, read> choice_info: array<f32>;
@group(0) @binding(1) var<storage, read> costs: array<f32>;
@group(0) @binding(2) var<storage, read_write> tours: array<u32>;
@group(0) @binding(3) var<storage, read_write> tour_costs: array<f32>;
@group(0) @binding(4) var<uniform> params: Params;

const N: u32 = {{N}}u;
const WIDTH: u32 = {{WIDTH}}u;
const STRIPES: u32 = {{STRIPES}}u;
const TOUR_LEN: u32 = {{TOUR_LEN}}u;

const FEISTEL_ROUNDS: u32 = 16u;
const FEISTEL_KEY0: u32 = 0xA341316Cu;
const FEISTEL_KEY1: u32 = 0xC8013EA4u;
const ROUND_DELTA: u32 = 0x9E3779B9u;
const U32_DIVISOR: f32 = 4294967295.0;

const SCORE_TABU: f32 = -1.0;
const CACHE_EMPTY: f32 = -2.0;
const NO_CANDIDATE: u32 = 0xFFFFFFFFu;

var<workgroup> tour: array<u32, TOUR_LEN>;
var<workgroup> scratch: array<f32, WIDTH>;
var<workgroup> best_value: f32;
var<workgroup> best_index: atomic<u32>;
var<workgroup> current_city: u32;

struct LaneRng {
    seed: u32,
    counter: u32,
    cached: f32,
    has_cached: u32,
}

fn rng_mix(counter: u32, seed: u32) -> vec2<u32> {
    var v0 = counter;
    var v1 = seed;
    var sum = 0u;
    for (var r = 0u; r < FEISTEL_ROUNDS; r++) {
        sum = sum + ROUND_DELTA;
        v0 = v0 + (((v1 << 4u) + FEISTEL_KEY0) ^ (v1 + sum) ^ ((v1 >> 5u) + FEISTEL_KEY1));
        v1 = v1 + (((v0 << 4u) + FEISTEL_KEY0) ^ (v0 + sum) ^ ((v0 >> 5u) + FEISTEL_KEY1));
    }
    return vec2<u32>(v0, v1);
}

// One raw invocation yields two draws; the second is cached so consecutive
// draws cost half as many mixes. ADVANCE clears the cache.
fn rng_draw(rng: ptr<function, LaneRng>) -> f32 {
    if ((*rng).has_cached == 1u) {
        (*rng).has_cached = 0u;
        return (*rng).cached;
    }
    let mixed = rng_mix((*rng).counter, (*rng).seed);
    (*rng).counter = (*rng).counter + 1u;
    (*rng).cached = f32(mixed.y) / U32_DIVISOR;
    (*rng).has_cached = 1u;
    return f32(mixed.x) / U32_DIVISOR;
}

fn tabu_set(words: ptr<function, array<u32, 4>>, city: u32) {
    if (city < 128u) {
        (*words)[city >> 5u] = (*words)[city >> 5u] | (1u << (city & 31u));
    }
}

fn tabu_test(words: ptr<function, array<u32, 4>>, city: u32) -> bool {
    return city < 128u && (((*words)[city >> 5u] >> (city & 31u)) & 1u) == 1u;
}

@compute @workgroup_size({{WIDTH}})
fn main(
    @builtin(workgroup_id) group_id: vec3<u32>,
    @builtin(local_invocation_id) local_id: vec3<u32>,
) {
    let colony = group_id.x;
    let lid = local_id.x;

    // INIT: lane-private tabu and RNG, then the queen block. The lane that
    // strides over the start column marks it visited.
    var tabu = array<u32, 4>(0u, 0u, 0u, 0u);
    var rng: LaneRng;
    rng.seed = colony * WIDTH + lid + params.nonce;
    rng.counter = 0u;
    rng.cached = 0.0;
    rng.has_cached = 0u;

    if (lid == 0u) {
        tour[0u] = colony;
        current_city = colony;
        best_value = CACHE_EMPTY;
        atomicStore(&best_index, NO_CANDIDATE);
    }
    if (lid == colony % WIDTH) {
        tabu_set(&tabu, colony);
    }
    workgroupBarrier();

    for (var step = 1u; step < N; step++) {
        // SELECT_CANDIDATE: stripe the N columns across WIDTH lanes.
        for (var stripe = 0u; stripe < STRIPES; stripe++) {
            let candidate = stripe * WIDTH + lid;
            var lane_score = SCORE_TABU;
            if (candidate < N && !tabu_test(&tabu, candidate)) {
                lane_score = choice_info[current_city * N + candidate] * rng_draw(&rng);
            }
            scratch[lid] = lane_score;

            var gap = WIDTH / 2u;
            while (gap > 0u) {
                workgroupBarrier();
                if (lid < gap) {
                    scratch[lid] = max(scratch[lid], scratch[lid + gap]);
                }
                gap = gap / 2u;
            }
            workgroupBarrier();

            // Queen: accept live maxima only; a strict improvement clears
            // the winner slot so stale holders cannot write below.
            if (lid == 0u) {
                let stripe_max = scratch[0u];
                if (stripe_max >= 0.0 && stripe_max > best_value) {
                    best_value = stripe_max;
                    atomicStore(&best_index, NO_CANDIDATE);
                }
            }
            workgroupBarrier();

            // Holders of the cached maximum race atomic-min: the lowest
            // column among exact ties wins, and a later stripe that merely
            // ties cannot steal (its columns are higher).
            if (lane_score >= 0.0 && lane_score == best_value) {
                atomicMin(&best_index, candidate);
            }
            workgroupBarrier();
        }

        // ADVANCE: mark the winner visited, append, re-anchor, drop
        // memoized draws. The winner slot is cleared behind a second
        // barrier, after every lane has loaded it.
        let next = atomicLoad(&best_index);
        if (lid == next % WIDTH) {
            tabu_set(&tabu, next);
        }
        if (lid == 0u) {
            tour[step] = next;
            current_city = next;
        }
        rng.has_cached = 0u;
        workgroupBarrier();

        if (lid == 0u) {
            best_value = CACHE_EMPTY;
            atomicStore(&best_index, NO_CANDIDATE);
        }
        workgroupBarrier();
    }

    // EXPORT_COST: strided per-lane partials over tour edges, closing edge
    // included, then the tree sum; the queen writes the total.
    var partial = 0.0;
    var s = lid;
    while (s < N) {
        let from_city = tour[s];
        let to_city = tour[(s + 1u) % N];
        partial = partial + costs[from_city * N + to_city];
        s = s + WIDTH;
    }
    scratch[lid] = partial;

    var gap = WIDTH / 2u;
    while (gap > 0u) {
        workgroupBarrier();
        if (lid < gap) {
            scratch[lid] = scratch[lid] + scratch[lid + gap];
        }
        gap = gap / 2u;
    }
    workgroupBarrier();
    if (lid == 0u) {
        tour_costs[colony] = scratch[0u];
    }

    // EXPORT_TOUR: strided scatter of the first N slots into row `colony`.
    s = lid;
    while (s < N) {
        tours[colony * N + s] = tour[s];
        s = s + WIDTH;
    }
}
"#;

/// Pheromone update: evaporate every cell, deposit every traversed edge.
///
/// Each 16×16 workgroup owns a tile of the matrix, one thread per cell.
/// The N² tour edges stream through three shared chunk caches (endpoints
/// and quality); every thread scans each cached chunk and accumulates
/// matching deposits in a register, then folds evaporation and deposit
/// into the cell with a single fused multiply-add. Edge order is tour-major
/// and slot-minor on every run, so per-cell sums are reproducible. An edge
/// matches cell (i, j) when it traverses the pair in either direction.
///
/// ## Binding layout
///
/// | binding | buffer | access |
/// |---------|--------|--------|
/// | 0 | `tours: array<u32>` (N²) | read |
/// | 1 | `tour_costs: array<f32>` (N) | read |
/// | 2 | `pheromone: array<f32>` (N²) | read + write |
/// | 3 | `params: Params` | uniform |
pub const WGSL_PHEROMONE_UPDATE: &str = r#"
struct Params {
    nonce: u32,
    alpha: f32,
    rho: f32,
    pad: u32,
}

@group(0) @binding(0) var<storage, read> tours: array<u32>;
@group(0) @binding(1) var<storage, read> tour_costs: array<f32>;
@group(0) @binding(2) var<storage, read_write> pheromone: array<f32>;
@group(0) @binding(3) var<uniform> params: Params;

const N: u32 = {{N}}u;
const TILE: u32 = 16u;
const CHUNK: u32 = 256u;
const EDGES: u32 = {{EDGES}}u;
const CHUNKS: u32 = {{CHUNKS}}u;
const NO_CITY: u32 = 0xFFFFFFFFu;

var<workgroup> edge_from: array<u32, CHUNK>;
var<workgroup> edge_to: array<u32, CHUNK>;
var<workgroup> edge_quality: array<f32, CHUNK>;

@compute @workgroup_size(16, 16)
fn main(
    @builtin(workgroup_id) group_id: vec3<u32>,
    @builtin(local_invocation_id) local_id: vec3<u32>,
) {
    let i = group_id.y * TILE + local_id.y;
    let j = group_id.x * TILE + local_id.x;
    let tid = local_id.y * TILE + local_id.x;

    var acc = 0.0;
    for (var chunk = 0u; chunk < CHUNKS; chunk++) {
        // Cooperative load: edge e = k*N + s is tour k's step-s edge; the
        // tail chunk parks a sentinel that matches no city.
        let e = chunk * CHUNK + tid;
        if (e < EDGES) {
            let k = e / N;
            let s = e % N;
            edge_from[tid] = tours[k * N + s];
            edge_to[tid] = tours[k * N + (s + 1u) % N];
            let len = tour_costs[k];
            var quality = 0.0;
            if (len > 0.0) {
                quality = 1.0 / len;
            }
            edge_quality[tid] = quality;
        } else {
            edge_from[tid] = NO_CITY;
            edge_to[tid] = NO_CITY;
            edge_quality[tid] = 0.0;
        }
        workgroupBarrier();

        for (var t = 0u; t < CHUNK; t++) {
            let from_city = edge_from[t];
            let to_city = edge_to[t];
            if ((from_city == i && to_city == j) || (from_city == j && to_city == i)) {
                acc = acc + edge_quality[t];
            }
        }
        workgroupBarrier();
    }

    if (i < N && j < N) {
        let cell = i * N + j;
        pheromone[cell] = fma(pheromone[cell], 1.0 - params.rho, acc);
    }
}
"#;

// ═══════════════════════════════════════════════════════════════════
// Template rendering
// ═══════════════════════════════════════════════════════════════════

fn render(template: &str, substitutions: &[(&str, String)]) -> String {
    let mut source = template.to_string();
    for (token, value) in substitutions {
        source = source.replace(token, value);
    }
    debug_assert!(
        !source.contains("{{"),
        "unsubstituted token left in shader source"
    );
    source
}

/// Render the choice-info kernel for an N-city problem.
#[must_use]
pub fn choice_info_source(n: usize) -> String {
    render(WGSL_CHOICE_INFO, &[("{{CELLS}}", (n * n).to_string())])
}

/// Render the construction kernel for an N-city problem at the given width.
#[must_use]
pub fn construction_source(n: usize, width: u32) -> String {
    let stripes = n.div_ceil(width as usize);
    render(
        WGSL_CONSTRUCTION,
        &[
            ("{{N}}", n.to_string()),
            ("{{WIDTH}}", width.to_string()),
            ("{{STRIPES}}", stripes.to_string()),
            ("{{TOUR_LEN}}", (n + 1).to_string()),
        ],
    )
}

/// Render the pheromone-update kernel for an N-city problem.
#[must_use]
pub fn deposit_source(n: usize) -> String {
    let edges = n * n;
    let chunk = (DEPOSIT_TILE * DEPOSIT_TILE) as usize;
    render(
        WGSL_PHEROMONE_UPDATE,
        &[
            ("{{N}}", n.to_string()),
            ("{{EDGES}}", edges.to_string()),
            ("{{CHUNKS}}", edges.div_ceil(chunk).to_string()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_sources_have_no_tokens_left() {
        for source in [
            choice_info_source(5),
            construction_source(5, 8),
            deposit_source(5),
        ] {
            assert!(
                !source.contains("{{") && !source.contains("}}"),
                "token survived substitution"
            );
        }
    }

    #[test]
    fn construction_constants_match_the_problem() {
        let source = construction_source(100, 64);
        assert!(source.contains("const N: u32 = 100u;"));
        assert!(source.contains("const WIDTH: u32 = 64u;"));
        assert!(source.contains("const STRIPES: u32 = 2u;"), "ceil(100/64)");
        assert!(source.contains("const TOUR_LEN: u32 = 101u;"));
        assert!(source.contains("@workgroup_size(64)"));
    }

    #[test]
    fn winner_reset_is_barrier_separated_from_the_load() {
        // Every lane loads the winner slot during ADVANCE; the queen's
        // reset store must sit in a later barrier interval, or a lane can
        // observe the cleared slot and skip its tabu marking.
        let source = construction_source(48, 64);
        let load = source.find("atomicLoad(&best_index)").expect("winner load");
        let tail = &source[load..];
        let reset = tail
            .find("atomicStore(&best_index, NO_CANDIDATE)")
            .expect("winner reset");
        let barrier = tail.find("workgroupBarrier()").expect("separating barrier");
        assert!(
            barrier < reset,
            "winner slot is cleared in the same barrier interval it is loaded"
        );
    }

    #[test]
    fn deposit_chunk_count_covers_all_edges() {
        let source = deposit_source(100);
        assert!(source.contains("const EDGES: u32 = 10000u;"));
        assert!(source.contains("const CHUNKS: u32 = 40u;"), "ceil(10000/256)");
        // A chunk-aligned edge count still rounds to a full cover.
        let aligned = deposit_source(16);
        assert!(aligned.contains("const CHUNKS: u32 = 1u;"), "256/256");
    }

    #[test]
    fn mixer_constants_agree_with_the_host_generator() {
        use crate::aco::rng::{FEISTEL_KEY0, FEISTEL_KEY1, ROUND_DELTA};
        let source = construction_source(8, 8);
        assert!(source.contains(&format!("const FEISTEL_KEY0: u32 = {FEISTEL_KEY0:#010X}u;")));
        assert!(source.contains(&format!("const FEISTEL_KEY1: u32 = {FEISTEL_KEY1:#010X}u;")));
        assert!(source.contains(&format!("const ROUND_DELTA: u32 = {ROUND_DELTA:#010X}u;")));
    }

    #[test]
    fn choice_cells_are_squared() {
        let source = choice_info_source(128);
        assert!(source.contains("const CELLS: u32 = 16384u;"));
    }
}
