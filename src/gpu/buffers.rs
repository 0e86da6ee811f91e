// SPDX-License-Identifier: AGPL-3.0-only

//! GPU buffer creation, upload, and readback for f32/u32 solver data.

use super::GpuContext;
use crate::error::FormicaryError;

impl GpuContext {
    /// Create a storage buffer from f32 data (read-only).
    #[must_use]
    pub fn create_f32_buffer(&self, data: &[f32], label: &str) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            })
    }

    /// Create a storage buffer from f32 data that kernels read and write.
    ///
    /// Includes `COPY_DST` so host state (pheromone, choice-info) can be
    /// re-uploaded without rebuilding bind groups.
    #[must_use]
    pub fn create_f32_state_buffer(&self, data: &[f32], label: &str) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Create a writable storage buffer for f32 output.
    #[must_use]
    pub fn create_f32_output_buffer(&self, count: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (count * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a writable storage buffer for u32 output.
    #[must_use]
    pub fn create_u32_output_buffer(&self, count: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (count * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a staging buffer for reading results back to CPU.
    #[must_use]
    pub fn create_staging_buffer(&self, size: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer from raw bytes.
    ///
    /// Includes `COPY_DST` so the iteration parameters (run nonce) can be
    /// rewritten in place each dispatch round.
    #[must_use]
    pub fn create_uniform_buffer(&self, data: &[u8], label: &str) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: data,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Upload f32 data to a GPU buffer (overwrites from offset 0).
    pub fn upload_f32(&self, buffer: &wgpu::Buffer, data: &[f32]) {
        self.queue().write_buffer(buffer, 0, bytemuck::cast_slice(data));
    }

    /// Upload u32 data to a GPU buffer (overwrites from offset 0).
    pub fn upload_u32(&self, buffer: &wgpu::Buffer, data: &[u32]) {
        self.queue().write_buffer(buffer, 0, bytemuck::cast_slice(data));
    }

    /// Read back f32 data from a GPU buffer via staging copy.
    ///
    /// # Errors
    ///
    /// Returns [`FormicaryError::DeviceCreation`] if the GPU map callback
    /// fails or the channel is dropped.
    pub fn read_back_f32(
        &self,
        buffer: &wgpu::Buffer,
        count: usize,
    ) -> Result<Vec<f32>, FormicaryError> {
        let bytes = self.read_back_bytes(buffer, count * 4)?;
        Ok(mapped_bytes_to_f32(&bytes))
    }

    /// Read back u32 data from a GPU buffer via staging copy.
    ///
    /// # Errors
    ///
    /// Returns [`FormicaryError::DeviceCreation`] if the GPU map callback
    /// fails or the channel is dropped.
    pub fn read_back_u32(
        &self,
        buffer: &wgpu::Buffer,
        count: usize,
    ) -> Result<Vec<u32>, FormicaryError> {
        let bytes = self.read_back_bytes(buffer, count * 4)?;
        Ok(mapped_bytes_to_u32(&bytes))
    }

    /// Read f32 data from a staging buffer after submit + poll.
    ///
    /// Call this after [`Self::submit_encoder`] when the encoder included a
    /// `copy_buffer_to_buffer` into the staging buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FormicaryError::DeviceCreation`] if the GPU map callback
    /// fails or the channel is dropped.
    pub fn read_staging_f32(&self, staging: &wgpu::Buffer) -> Result<Vec<f32>, FormicaryError> {
        let bytes = self.read_staging_bytes(staging)?;
        Ok(mapped_bytes_to_f32(&bytes))
    }

    fn read_back_bytes(
        &self,
        buffer: &wgpu::Buffer,
        size: usize,
    ) -> Result<Vec<u8>, FormicaryError> {
        let staging = self.create_staging_buffer(size, "readback");
        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size as u64);
        self.queue().submit(std::iter::once(encoder.finish()));
        self.read_staging_bytes(&staging)
    }

    fn read_staging_bytes(&self, staging: &wgpu::Buffer) -> Result<Vec<u8>, FormicaryError> {
        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device().poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| {
                FormicaryError::DeviceCreation("GPU map callback: channel recv failed".into())
            })?
            .map_err(|e| FormicaryError::DeviceCreation(format!("GPU buffer mapping: {e}")))?;

        let data = slice.get_mapped_range();
        let bytes = data.to_vec();
        drop(data);
        staging.unmap();
        Ok(bytes)
    }
}

/// Convert mapped GPU buffer bytes to f32 values.
///
/// GPU mapped buffers are typically page-aligned, so `bytemuck::try_cast_slice`
/// will succeed. Falls back to manual byte conversion if alignment is wrong.
#[must_use]
pub fn mapped_bytes_to_f32(data: &[u8]) -> Vec<f32> {
    bytemuck::try_cast_slice(data).map_or_else(
        |_| {
            data.chunks_exact(4)
                .map(|chunk| {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(chunk);
                    f32::from_le_bytes(b)
                })
                .collect()
        },
        <[f32]>::to_vec,
    )
}

/// Convert mapped GPU buffer bytes to u32 values.
#[must_use]
pub fn mapped_bytes_to_u32(data: &[u8]) -> Vec<u32> {
    bytemuck::try_cast_slice(data).map_or_else(
        |_| {
            data.chunks_exact(4)
                .map(|chunk| {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(chunk);
                    u32::from_le_bytes(b)
                })
                .collect()
        },
        <[u32]>::to_vec,
    )
}
