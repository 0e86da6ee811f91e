// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for formicary solver and GPU operations.
//!
//! Replaces `Result<_, String>` in public APIs with a proper enum so callers
//! can pattern-match on failure modes (bad hyperparameters, capacity overrun,
//! device bring-up) rather than parsing opaque strings.

use std::fmt;

/// Errors arising from configuration, capacity checks, or GPU bring-up.
#[derive(Debug)]
pub enum FormicaryError {
    /// A hyperparameter is outside its domain (alpha/beta ≤ 0, rho ∉ (0,1),
    /// non-power-of-two colony width, zero thresholds). Detected before any
    /// dispatch; the solve is aborted.
    Config(String),

    /// The problem does not fit the fixed kernel capacities: city count
    /// outside [2, 128] (the tabu set is 128 bits) or the workgroup
    /// shared-memory bytes for the chosen width exceed the device budget.
    /// Detected at dispatch-preparation time; a hard failure, not a
    /// degraded mode, because shared buffers are sized at kernel build.
    Capacity(String),

    /// No compatible GPU adapter was found by wgpu.
    NoAdapter,

    /// GPU device creation or buffer mapping failed (wraps the underlying
    /// wgpu error message).
    DeviceCreation(String),
}

impl fmt::Display for FormicaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::Capacity(msg) => write!(f, "Problem exceeds kernel capacity: {msg}"),
            Self::NoAdapter => write!(f, "No GPU adapter found"),
            Self::DeviceCreation(e) => write!(f, "Failed to create GPU device: {e}"),
        }
    }
}

impl std::error::Error for FormicaryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_config() {
        let err = FormicaryError::Config("alpha must be > 0, got -1".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: alpha must be > 0, got -1"
        );
    }

    #[test]
    fn display_capacity() {
        let err = FormicaryError::Capacity("200 cities > 128-bit tabu set".into());
        assert!(err.to_string().starts_with("Problem exceeds kernel capacity"));
        assert!(err.to_string().contains("tabu"));
    }

    #[test]
    fn display_no_adapter() {
        let err = FormicaryError::NoAdapter;
        assert_eq!(err.to_string(), "No GPU adapter found");
    }

    #[test]
    fn display_device_creation() {
        let err = FormicaryError::DeviceCreation("wgpu error".into());
        assert_eq!(err.to_string(), "Failed to create GPU device: wgpu error");
    }

    #[test]
    fn error_trait_works() {
        let err = FormicaryError::NoAdapter;
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "No GPU adapter found");
    }
}
