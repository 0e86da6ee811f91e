// SPDX-License-Identifier: AGPL-3.0-only

//! GPU compute substrate for the solver kernels.
//!
//! Creates a wgpu device and provides buffer, dispatch, and pipeline
//! helpers for the three f32 compute kernels. No optional device features
//! are required: the kernels use baseline limits (256 invocations and
//! 16 KiB of workgroup storage per group), so any Vulkan/Metal/DX12
//! adapter that wgpu enumerates can run them.
//!
//! ## Adapter selection
//!
//! Set `FORMICARY_GPU_ADAPTER` to target a specific GPU:
//!
//! | Value | Behavior |
//! |-------|----------|
//! | `auto` or *(unset)* | Prefer a discrete GPU, else the first adapter |
//! | `0`, `1`, … | Select adapter by enumeration index |
//! | substring | Case-insensitive name match (e.g. `"titan"`, `"4070"`) |
//!
//! `FORMICARY_WGPU_BACKEND` (`vulkan`, `metal`, `dx12`) restricts the
//! backend; unset enumerates all. Use [`GpuContext::enumerate_adapters`]
//! to list available GPUs before selecting.
//!
//! ## Module structure
//!
//! - `adapter` — adapter discovery and selection
//! - `buffers` — f32/u32 buffer creation, upload, readback
//! - `dispatch` — command encoding and dispatch
//! - `shaders` — WGSL kernel templates and rendering
//! - `solver` — persistent solve state and the device solve loop

mod adapter;
mod buffers;
mod dispatch;
pub mod shaders;
pub mod solver;

pub use adapter::AdapterInfo;
pub use solver::{run_choice_info, run_construction, run_pheromone_update, solve_gpu};

use crate::error::FormicaryError;

/// Compute context: one device, one queue, one adapter's limits.
pub struct GpuContext {
    pub adapter_name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

// ── Core accessors ───────────────────────────────────────────────────

impl GpuContext {
    /// Access the underlying wgpu Device.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Access the underlying wgpu Queue.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

// ── Constructor ──────────────────────────────────────────────────────

impl GpuContext {
    /// Create the solver device on the selected adapter.
    ///
    /// Requests no optional features and default limits; the capacity
    /// check at pipeline build verifies the kernels fit what the device
    /// actually granted.
    ///
    /// # Errors
    ///
    /// Returns [`FormicaryError::NoAdapter`] if nothing matches the
    /// selector and [`FormicaryError::DeviceCreation`] if the device
    /// request fails.
    pub async fn new() -> Result<Self, FormicaryError> {
        let selected = adapter::select_adapter()?;
        let info = selected.get_info();

        let (device, queue) = selected
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("formicary solver device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| FormicaryError::DeviceCreation(e.to_string()))?;

        Ok(Self {
            adapter_name: info.name,
            backend: info.backend,
            device_type: info.device_type,
            device,
            queue,
        })
    }

    /// Enumerate all available GPU adapters.
    #[must_use]
    pub fn enumerate_adapters() -> Vec<AdapterInfo> {
        adapter::enumerate_adapters()
    }

    /// Print device capabilities.
    pub fn print_info(&self) {
        let limits = self.device.limits();
        println!("  GPU: {} ({:?}, {:?})", self.adapter_name, self.backend, self.device_type);
        println!(
            "  Workgroup storage: {} B, invocations: {}",
            limits.max_compute_workgroup_storage_size,
            limits.max_compute_invocations_per_workgroup
        );
    }

    /// Print all available adapters to stdout.
    pub fn print_available_adapters() {
        let adapters = Self::enumerate_adapters();
        println!("  Available GPU adapters:");
        for info in &adapters {
            println!("    {info}");
        }
        if adapters.is_empty() {
            println!("    (none found)");
        }
    }
}

// ── Pipeline creation ────────────────────────────────────────────────

impl GpuContext {
    /// Create a compute pipeline from rendered WGSL source.
    #[must_use]
    pub fn create_pipeline(&self, shader_source: &str, label: &str) -> wgpu::ComputePipeline {
        let shader_module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shader_source.into()),
            });

        self.device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &shader_module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
    }
}
