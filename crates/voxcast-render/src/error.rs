//! Rendering error types.

use glam::UVec3;
use thiserror::Error;
use voxcast_core::VoxcastError;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// Volume exceeds the device's 3-D texture limit.
    #[error("volume {dims} exceeds the 3-D texture limit of {limit}")]
    VolumeTooLarge { dims: UVec3, limit: u32 },

    /// A GPU handle belongs to another device or was released.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// Surface lost.
    #[error("surface lost")]
    SurfaceLost,

    /// Surface outdated.
    #[error("surface outdated")]
    SurfaceOutdated,

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU")]
    Timeout,

    /// Reading pixels back from the GPU failed.
    #[error("GPU readback failed")]
    ReadbackFailed,
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for VoxcastError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::InvalidResource(reason) => VoxcastError::InvalidResourceReference(reason),
            other => VoxcastError::RenderError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_resource_maps_to_reference_error() {
        let err: VoxcastError = RenderError::InvalidResource("stale volume".into()).into();
        assert!(matches!(err, VoxcastError::InvalidResourceReference(_)));
    }

    #[test]
    fn test_other_errors_map_to_render_error() {
        let err: VoxcastError = RenderError::VolumeTooLarge {
            dims: UVec3::new(4096, 4096, 4096),
            limit: 2048,
        }
        .into();
        match err {
            VoxcastError::RenderError(msg) => assert!(msg.contains("2048")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
