// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed 128-bit set backed by four u32 words.
//!
//! Serves as the per-worker tabu list during tour construction: bit `i` set
//! means city `i` is already part of the tour. The layout (word `i >> 5`,
//! bit `i & 31`) matches the `array<u32, 4>` rendition inside the WGSL
//! construction kernel, so host-side protocol emulation and the kernel agree
//! on every operation.
//!
//! Out-of-range indices (≥ 128) are silent no-ops rather than errors: the
//! kernel execution context cannot raise, and the capacity bound is enforced
//! separately at dispatch preparation.

/// Fixed-capacity bit set with O(1) set/clear/test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitSet128 {
    words: [u32; 4],
}

impl BitSet128 {
    /// Capacity in bits; also the hard upper bound on city count.
    pub const CAPACITY: u32 = 128;

    /// Empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: [0; 4] }
    }

    /// Set bit `i`. No-op for `i ≥ 128`.
    pub fn set(&mut self, i: u32) {
        if i < Self::CAPACITY {
            self.words[(i >> 5) as usize] |= 1 << (i & 31);
        }
    }

    /// Clear bit `i`. No-op for `i ≥ 128`.
    pub fn clear(&mut self, i: u32) {
        if i < Self::CAPACITY {
            self.words[(i >> 5) as usize] &= !(1 << (i & 31));
        }
    }

    /// Test bit `i`. Always false for `i ≥ 128`.
    #[must_use]
    pub fn test(&self, i: u32) -> bool {
        i < Self::CAPACITY && (self.words[(i >> 5) as usize] >> (i & 31)) & 1 == 1
    }

    /// Number of set bits.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_test_every_bit() {
        for i in 0..BitSet128::CAPACITY {
            let mut bits = BitSet128::new();
            bits.set(i);
            assert!(bits.test(i), "bit {i} must read back set");
            assert_eq!(bits.count(), 1, "exactly one bit set after set({i})");
        }
    }

    #[test]
    fn out_of_range_is_silent_noop() {
        let mut bits = BitSet128::new();
        for i in 0..BitSet128::CAPACITY {
            bits.set(i);
        }
        let full = bits;
        bits.set(200);
        bits.clear(200);
        assert!(!bits.test(200), "test past capacity is always false");
        assert_eq!(bits, full, "bits [0,127] unaffected by out-of-range ops");
    }

    #[test]
    fn clear_resets_single_bit() {
        let mut bits = BitSet128::new();
        bits.set(31);
        bits.set(32);
        bits.set(127);
        bits.clear(32);
        assert!(bits.test(31), "neighboring word-0 bit survives");
        assert!(!bits.test(32), "cleared bit reads back unset");
        assert!(bits.test(127), "high word survives");
        assert_eq!(bits.count(), 2);
    }

    #[test]
    fn default_is_empty() {
        let bits = BitSet128::default();
        assert_eq!(bits.count(), 0);
        for i in [0, 1, 63, 64, 127] {
            assert!(!bits.test(i), "fresh set has bit {i} clear");
        }
    }

    #[test]
    fn word_boundaries() {
        // Bits 31/32 and 95/96 straddle u32 word boundaries.
        let mut bits = BitSet128::new();
        for i in [31, 32, 95, 96] {
            bits.set(i);
        }
        for i in [31, 32, 95, 96] {
            assert!(bits.test(i), "boundary bit {i} set");
        }
        for i in [30, 33, 94, 97] {
            assert!(!bits.test(i), "adjacent bit {i} untouched");
        }
    }
}
