// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: GPU kernels against their host twins.
//!
//! Every test here needs a working adapter and is ignored by default; run
//! them with `cargo test -- --ignored` on a machine with a GPU.
//!
//! Construction parity is bitwise: both substrates receive the same
//! choice-info bits (computed on the host) and the same run nonce, and
//! every kernel operation is exactly rounded on both sides. The choice-info
//! kernel is the one exception — the device `pow` may differ from the
//! host's `powf` in the last ULPs, so it gets a relative tolerance.

use formicary::aco::problem::{heuristic_matrix, is_permutation};
use formicary::aco::rng::next_nonce;
use formicary::aco::{choice_info, construct_tours, instances, update_pheromone, AcoConfig};
use formicary::error::FormicaryError;
use formicary::gpu::{
    run_choice_info, run_construction, run_pheromone_update, solve_gpu, GpuContext,
};
use formicary::tolerances;

fn gpu_context() -> Option<GpuContext> {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    match rt.block_on(GpuContext::new()) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

fn assert_bitwise(label: &str, device: &[f32], host: &[f32]) {
    assert_eq!(device.len(), host.len(), "{label}: length mismatch");
    for (i, (d, h)) in device.iter().zip(host.iter()).enumerate() {
        assert_eq!(
            d.to_bits(),
            h.to_bits(),
            "{label}: element {i} differs (device {d}, host {h})"
        );
    }
}

#[test]
#[ignore = "requires GPU"]
fn construction_matches_host_bit_for_bit() {
    let Some(gpu) = gpu_context() else { return };

    // n=48 at width 64 scans one partial stripe; n=20 at width 16 walks a
    // full stripe and then a four-lane tail stripe.
    let mut seed = 42u64;
    for (n, width, instance_seed) in [(48usize, 64u32, 5u64), (20, 16, 23)] {
        let costs = instances::random_euclidean(n, instance_seed);
        let heuristic = heuristic_matrix(&costs, 2.0);
        let choice = choice_info(&vec![1.0f32; n * n], &heuristic, 1.0);
        let nonce = next_nonce(&mut seed);

        let host = construct_tours(&choice, &costs, width, nonce);
        let device = run_construction(&gpu, &costs, &choice, width, nonce).unwrap();

        assert_eq!(device.tours, host.tours, "n={n}: tour matrices diverged");
        assert_bitwise(&format!("tour costs (n={n})"), &device.costs, &host.costs);
        for k in 0..n {
            assert!(
                is_permutation(&device.tours[k * n..(k + 1) * n], n),
                "n={n}: colony {k} produced a non-permutation"
            );
        }
    }
}

#[test]
#[ignore = "requires GPU"]
fn narrow_colonies_stripe_identically() {
    let Some(gpu) = gpu_context() else { return };

    // Width 8 on n=48 forces six candidate stripes per step, so the
    // cross-stripe running maximum and the lowest-index tie-break get real
    // work on both substrates.
    let n = 48;
    let costs = instances::random_euclidean(n, 31);
    let heuristic = heuristic_matrix(&costs, 2.0);
    let choice = choice_info(&vec![1.0f32; n * n], &heuristic, 1.0);
    let mut seed = 7u64;
    let nonce = next_nonce(&mut seed);

    let host = construct_tours(&choice, &costs, 8, nonce);
    let device = run_construction(&gpu, &costs, &choice, 8, nonce).unwrap();

    assert_eq!(device.tours, host.tours, "striped tour matrices diverged");
    assert_bitwise("striped tour costs", &device.costs, &host.costs);
}

#[test]
#[ignore = "requires GPU"]
fn choice_info_kernel_stays_within_tolerance() {
    let Some(gpu) = gpu_context() else { return };

    let n = 64;
    let costs = instances::random_euclidean(n, 13);
    let heuristic = heuristic_matrix(&costs, 2.0);
    let pheromone: Vec<f32> = (0..n * n).map(|i| 1.0 + (i % 7) as f32 * 0.125).collect();
    let alpha = 1.3;

    let host = choice_info(&pheromone, &heuristic, alpha);
    let device = run_choice_info(&gpu, &pheromone, &heuristic, n, alpha).unwrap();

    let max_rel = host
        .iter()
        .zip(device.iter())
        .map(|(h, d)| tolerances::relative_error(f64::from(*d), f64::from(*h)))
        .fold(0.0f64, f64::max);
    assert!(
        max_rel < tolerances::GPU_VS_CPU_REL,
        "device pow drifted {max_rel:.2e} from the host"
    );
}

#[test]
#[ignore = "requires GPU"]
fn pheromone_update_matches_host_bit_for_bit() {
    let Some(gpu) = gpu_context() else { return };

    // n=32 fills its 256-edge chunks exactly; n=20 leaves a tail chunk of
    // 144 live edges plus sentinel padding, under a ragged 2×2 tile grid
    // (20 = 16 + 4).
    let mut seed = 3u64;
    for (n, width, instance_seed) in [(32usize, 32u32, 19u64), (20, 16, 11)] {
        let costs = instances::random_euclidean(n, instance_seed);
        let heuristic = heuristic_matrix(&costs, 2.0);
        let pheromone: Vec<f32> = (0..n * n).map(|i| 0.5 + (i % 5) as f32 * 0.25).collect();
        let choice = choice_info(&pheromone, &heuristic, 1.0);
        let nonce = next_nonce(&mut seed);
        let built = construct_tours(&choice, &costs, width, nonce);

        let mut host = pheromone.clone();
        update_pheromone(&mut host, &built.tours, &built.costs, 0.5);
        let device =
            run_pheromone_update(&gpu, &pheromone, &built.tours, &built.costs, 0.5).unwrap();

        // The deposit scan walks edges in the same colony-major order on both
        // substrates and both fuse evaporate+deposit in one fma.
        assert_bitwise(&format!("updated pheromone (n={n})"), &device, &host);
    }
}

#[test]
#[ignore = "requires GPU"]
fn device_solve_finds_the_ring_walk() {
    let Some(gpu) = gpu_context() else { return };

    let n = 16;
    let costs = instances::ring(n, 1.0, 50.0);
    let config = AcoConfig {
        beta: 3.0,
        ..AcoConfig::default()
    };

    let report = solve_gpu(&gpu, &costs, &config).unwrap();
    assert!(
        (f64::from(report.best_cost) - n as f64).abs() < tolerances::KNOWN_OPTIMUM_ABS,
        "expected the ring walk of cost {n}, found {}",
        report.best_cost
    );
    assert!(is_permutation(&report.best_tour, n));
    assert!(
        report.substrate.starts_with("gpu:"),
        "substrate label should carry the adapter name, got {}",
        report.substrate
    );
}

#[test]
#[ignore = "requires GPU"]
fn device_solve_stalls_like_the_host() {
    let Some(gpu) = gpu_context() else { return };

    let costs = instances::uniform(12, 3.0);
    let config = AcoConfig::default();
    let report = solve_gpu(&gpu, &costs, &config).unwrap();

    assert_eq!(report.iterations, 1 + config.stall_threshold);
    assert_eq!(report.stalled_iterations, config.stall_threshold);
    assert!((report.best_cost - 36.0).abs() < 1e-6);
}

#[test]
#[ignore = "requires GPU"]
fn oversized_problems_fail_before_any_dispatch() {
    let Some(gpu) = gpu_context() else { return };

    let costs = instances::uniform(150, 1.0);
    let err = solve_gpu(&gpu, &costs, &AcoConfig::default()).unwrap_err();
    assert!(matches!(err, FormicaryError::Capacity(_)), "got {err:?}");
}
