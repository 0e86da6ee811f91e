// SPDX-License-Identifier: AGPL-3.0-only

//! Group-local tree reduction over a power-of-two buffer.
//!
//! The kernel-side reduction halves the live range each level, with a
//! barrier between levels: `buffer[idx] = op(buffer[idx], buffer[idx+half])`
//! for `idx < half`. This module performs the identical schedule on the
//! host, in the identical operand order, so f32 results match the WGSL
//! loop bit-for-bit on the same inputs. The buffer is clobbered; the
//! combined value lands in slot 0.
//!
//! Calling with a non-power-of-two length is a caller error (debug-asserted;
//! the colony width is validated to be a power of two long before any
//! reduction runs).

/// In-place tree reduction; returns the combined value from slot 0.
pub fn group_reduce(buffer: &mut [f32], op: impl Fn(f32, f32) -> f32) -> f32 {
    debug_assert!(
        buffer.len().is_power_of_two(),
        "group_reduce requires a power-of-two buffer, got {}",
        buffer.len()
    );
    let mut half = buffer.len() / 2;
    while half > 0 {
        for idx in 0..half {
            buffer[idx] = op(buffer[idx], buffer[idx + half]);
        }
        half /= 2;
    }
    buffer[0]
}

/// Maximum over the buffer (best-candidate selection).
pub fn reduce_max(buffer: &mut [f32]) -> f32 {
    group_reduce(buffer, f32::max)
}

/// Sum over the buffer (cost accumulation).
pub fn reduce_sum(buffer: &mut [f32]) -> f32 {
    group_reduce(buffer, |a, b| a + b)
}
