// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail harness for the validation binaries.
//!
//! Every formicary binary ends the same way:
//!   - explicit checks against the thresholds in [`crate::tolerances`]
//!   - a printed check list with observed and expected values
//!   - exit code 0 (all checks pass) or 1 (any check fails)
//!
//! [`ValidationHarness::check_bitwise`] is the solver-specific check:
//! construction runs on the two substrates are held to bit-for-bit
//! agreement, so it counts mismatching elements instead of measuring an
//! error magnitude.

use std::process;

use crate::tolerances;

/// How a check's threshold was applied.
#[derive(Debug, Clone, Copy)]
pub enum CheckKind {
    /// |observed - expected| < tolerance
    Absolute,
    /// |observed - expected| / |expected| < tolerance
    Relative,
    /// observed < threshold
    UpperBound,
    /// exact equality (iteration counts, bit patterns)
    Exact,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "abs"),
            Self::Relative => write!(f, "rel"),
            Self::UpperBound => write!(f, "<"),
            Self::Exact => write!(f, "=="),
        }
    }
}

/// One recorded check.
#[derive(Debug, Clone)]
pub struct Check {
    /// Human-readable label
    pub label: String,
    /// Whether this check passed
    pub passed: bool,
    /// Observed value
    pub observed: f64,
    /// Expected value or threshold
    pub expected: f64,
    /// Tolerance used (0.0 for exact checks)
    pub tolerance: f64,
    /// How the tolerance was applied
    pub kind: CheckKind,
}

/// Accumulates checks and turns them into a summary plus exit code.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    /// Name of the validation binary
    pub name: String,
    /// All checks performed
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    /// Create a new harness for a named validation binary.
    #[must_use = "validation harness must be used to run checks"]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    /// Absolute tolerance check: |observed - expected| < tolerance.
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = (observed - expected).abs() < tolerance;
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            expected,
            tolerance,
            kind: CheckKind::Absolute,
        });
    }

    /// Relative tolerance check: |observed - expected| / |expected| < tolerance.
    ///
    /// Falls back to an absolute comparison when `expected` is too close to
    /// zero to divide by.
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = if expected.abs() > tolerances::NEAR_ZERO_EXPECTED {
            ((observed - expected) / expected).abs() < tolerance
        } else {
            observed.abs() < tolerance
        };
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            expected,
            tolerance,
            kind: CheckKind::Relative,
        });
    }

    /// Upper-bound check: observed < threshold.
    pub fn check_upper(&mut self, label: &str, observed: f64, threshold: f64) {
        self.checks.push(Check {
            label: label.to_string(),
            passed: observed < threshold,
            observed,
            expected: threshold,
            tolerance: threshold,
            kind: CheckKind::UpperBound,
        });
    }

    /// Exact integer equality check (iteration counts, element counts).
    pub fn check_count(&mut self, label: &str, observed: u64, expected: u64) {
        self.checks.push(Check {
            label: label.to_string(),
            passed: observed == expected,
            observed: observed as f64,
            expected: expected as f64,
            tolerance: 0.0,
            kind: CheckKind::Exact,
        });
    }

    /// Boolean pass/fail check.
    pub fn check_bool(&mut self, label: &str, passed: bool) {
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed: f64::from(u8::from(passed)),
            expected: 1.0,
            tolerance: 0.0,
            kind: CheckKind::Exact,
        });
    }

    /// Bit-for-bit comparison of two f32 slices.
    ///
    /// The observed value is the number of mismatching elements (a length
    /// difference counts element-for-element); the check passes only at
    /// zero. `0.0` and `-0.0` compare as different bits, as do distinct
    /// NaN payloads.
    pub fn check_bitwise(&mut self, label: &str, observed: &[f32], expected: &[f32]) {
        let mismatches = observed
            .iter()
            .zip(expected.iter())
            .filter(|(a, b)| a.to_bits() != b.to_bits())
            .count()
            + observed.len().abs_diff(expected.len());
        self.checks.push(Check {
            label: label.to_string(),
            passed: mismatches == 0,
            observed: mismatches as f64,
            expected: 0.0,
            tolerance: 0.0,
            kind: CheckKind::Exact,
        });
    }

    /// Number of checks that passed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Total number of checks.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Whether all checks passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Print the check list and exit with the appropriate code.
    ///
    /// Exit 0 if all checks pass, exit 1 if any fails.
    pub fn finish(&self) -> ! {
        println!();
        println!(
            "═══ {} validation: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );

        for check in &self.checks {
            let icon = if check.passed { "✓" } else { "✗" };
            println!(
                "  {icon} {}: observed={:.6e}, expected={:.6e}, tol={:.2e} ({})",
                check.label, check.observed, check.expected, check.tolerance, check.kind
            );
        }

        if self.all_passed() {
            println!("ALL CHECKS PASSED");
            process::exit(0);
        } else {
            let failed: Vec<&str> = self
                .checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| c.label.as_str())
                .collect();
            println!("FAILED CHECKS: {}", failed.join(", "));
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_tracks_pass_fail() {
        let mut h = ValidationHarness::new("test");
        h.check_abs("exact", 6.0, 6.0, 1e-10);
        h.check_abs("close", 6.001, 6.0, 1e-2);
        h.check_abs("far", 7.0, 6.0, 1e-2);
        assert_eq!(h.passed_count(), 2);
        assert_eq!(h.total_count(), 3);
        assert!(!h.all_passed());
    }

    #[test]
    fn relative_check_handles_near_zero_expected() {
        let mut h = ValidationHarness::new("test");
        h.check_rel("near_zero", 1e-9, 0.0, 1e-5);
        assert!(h.checks[0].passed);
        h.check_rel("near_zero_fail", 1.0, 0.0, 1e-5);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn relative_check_scales_with_expected() {
        let mut h = ValidationHarness::new("test");
        h.check_rel("large_close", 1000.1, 1000.0, 1e-3);
        assert!(h.checks[0].passed);
        h.check_rel("large_far", 1100.0, 1000.0, 1e-3);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn upper_bound_is_strict() {
        let mut h = ValidationHarness::new("test");
        h.check_upper("below", 0.5, 1.0);
        h.check_upper("at", 1.0, 1.0);
        h.check_upper("above", 1.5, 1.0);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
        assert!(!h.checks[2].passed);
    }

    #[test]
    fn count_check_is_exact() {
        let mut h = ValidationHarness::new("test");
        h.check_count("iterations", 9, 9);
        h.check_count("off_by_one", 10, 9);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn bitwise_check_counts_mismatches() {
        let mut h = ValidationHarness::new("test");
        h.check_bitwise("identical", &[1.0, 2.5, -3.0], &[1.0, 2.5, -3.0]);
        assert!(h.checks[0].passed);

        h.check_bitwise("one_off", &[1.0, 2.5, 3.0], &[1.0, 2.5, 3.0000002]);
        assert!(!h.checks[1].passed);
        assert!((h.checks[1].observed - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bitwise_check_distinguishes_signed_zero() {
        let mut h = ValidationHarness::new("test");
        h.check_bitwise("signed_zero", &[0.0], &[-0.0]);
        assert!(!h.checks[0].passed);
    }

    #[test]
    fn bitwise_check_counts_length_difference() {
        let mut h = ValidationHarness::new("test");
        h.check_bitwise("short", &[1.0, 2.0], &[1.0, 2.0, 3.0]);
        assert!(!h.checks[0].passed);
        assert!((h.checks[0].observed - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bool_check_false_fails() {
        let mut h = ValidationHarness::new("test");
        h.check_bool("fail", false);
        assert!(!h.checks[0].passed);
        assert_eq!(h.passed_count(), 0);
    }

    #[test]
    fn empty_harness_passes_vacuously() {
        let h = ValidationHarness::new("empty");
        assert_eq!(h.total_count(), 0);
        assert!(h.all_passed());
    }

    #[test]
    fn check_kind_display() {
        assert_eq!(CheckKind::Absolute.to_string(), "abs");
        assert_eq!(CheckKind::Relative.to_string(), "rel");
        assert_eq!(CheckKind::UpperBound.to_string(), "<");
        assert_eq!(CheckKind::Exact.to_string(), "==");
    }
}
