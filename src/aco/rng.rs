// SPDX-License-Identifier: AGPL-3.0-only

//! Counter-based Feistel pair generator and the host-side nonce walk.
//!
//! Each worker thread owns one [`FeistelRng`] seeded with
//! `global_thread_id + run_nonce` (wrapping). A raw invocation mixes the
//! (counter, seed) block through 16 Feistel rounds against two fixed key
//! words with the usual golden-ratio round-sum schedule, yielding two
//! uniform f32 values. Each pair serves two consecutive logical draws —
//! one returned immediately, the second cached — halving invocations.
//!
//! The generator is a pure function of (seed, counter): no shared state
//! between threads, repeat runs reproduce pairs bit-for-bit. Statistically
//! adequate for selection sampling, not cryptographic.
//!
//! The WGSL construction kernel carries the identical mixer
//! (`src/gpu/shaders.rs`), so host emulation and device draws agree exactly.

/// Feistel mixing rounds per raw invocation.
pub const FEISTEL_ROUNDS: u32 = 16;

/// First fixed key word.
pub const FEISTEL_KEY0: u32 = 0xA341_316C;

/// Second fixed key word.
pub const FEISTEL_KEY1: u32 = 0xC801_3EA4;

/// Golden-ratio round-sum increment (same schedule as TEA).
pub const ROUND_DELTA: u32 = 0x9E37_79B9;

/// Divisor mapping a raw u32 to a float draw.
///
/// Nominally `2^32 − 1`; as an f32 the nearest representable value is
/// `2^32`, so raw words within ~128 of the top round to a draw of exactly
/// 1.0. Harmless for max-based selection, and identical in WGSL.
pub const U32_DIVISOR: f32 = 4_294_967_295.0;

/// Per-thread counter-based generator with a one-value pair cache.
#[derive(Debug, Clone)]
pub struct FeistelRng {
    seed: u32,
    counter: u32,
    cached: f32,
    has_cached: bool,
}

impl FeistelRng {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            counter: 0,
            cached: 0.0,
            has_cached: false,
        }
    }

    /// Mix one (counter, seed) block into two raw words.
    #[must_use]
    fn mix(counter: u32, seed: u32) -> (u32, u32) {
        let mut v0 = counter;
        let mut v1 = seed;
        let mut sum = 0u32;
        for _ in 0..FEISTEL_ROUNDS {
            sum = sum.wrapping_add(ROUND_DELTA);
            v0 = v0.wrapping_add(
                (v1 << 4).wrapping_add(FEISTEL_KEY0)
                    ^ v1.wrapping_add(sum)
                    ^ (v1 >> 5).wrapping_add(FEISTEL_KEY1),
            );
            v1 = v1.wrapping_add(
                (v0 << 4).wrapping_add(FEISTEL_KEY0)
                    ^ v0.wrapping_add(sum)
                    ^ (v0 >> 5).wrapping_add(FEISTEL_KEY1),
            );
        }
        (v0, v1)
    }

    /// One raw invocation: a pair of uniform f32 draws, counter advanced once.
    #[must_use]
    pub fn next_pair(&mut self) -> (f32, f32) {
        let (a, b) = Self::mix(self.counter, self.seed);
        self.counter = self.counter.wrapping_add(1);
        (uniform(a), uniform(b))
    }

    /// Next logical draw; every second draw is served from the cached half.
    pub fn draw(&mut self) -> f32 {
        if self.has_cached {
            self.has_cached = false;
            self.cached
        } else {
            let (a, b) = self.next_pair();
            self.cached = b;
            self.has_cached = true;
            a
        }
    }

    /// Drop the cached half so the next draw mixes a fresh block.
    ///
    /// Called at every ADVANCE so each selection step starts from fresh
    /// randomness regardless of how many draws the previous step consumed.
    pub fn discard_cached(&mut self) {
        self.has_cached = false;
    }

    /// Raw invocations performed so far.
    #[must_use]
    pub fn invocations(&self) -> u32 {
        self.counter
    }
}

#[inline]
fn uniform(raw: u32) -> f32 {
    raw as f32 / U32_DIVISOR
}

// ═══════════════════════════════════════════════════════════════════
// Host-side nonce walk (Knuth MMIX LCG)
// ═══════════════════════════════════════════════════════════════════

/// LCG multiplier (Knuth MMIX).
pub const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;

/// LCG increment (Knuth MMIX).
pub const LCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

/// Advance the host LCG state by one step.
#[inline]
pub fn lcg_step(seed: &mut u64) {
    *seed = seed
        .wrapping_mul(LCG_MULTIPLIER)
        .wrapping_add(LCG_INCREMENT);
}

/// Derive the next per-iteration run nonce from the host seed walk.
///
/// The orchestrator calls this once per iteration and passes the nonce into
/// the construction dispatch; every worker seeds its [`FeistelRng`] with
/// `global_thread_id + nonce`, keeping kernels pure and runs reproducible.
#[must_use]
pub fn next_nonce(seed: &mut u64) -> u32 {
    lcg_step(seed);
    (*seed >> 32) as u32
}
