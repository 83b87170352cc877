//! The graphics-device capability the renderer draws through.

use glam::{Mat4, UVec3, Vec3};
use voxcast_core::OpacityModel;

use crate::color_maps::ColormapDescriptor;
use crate::error::RenderResult;
use crate::volume_render::VolumeTexels;

/// Everything one ray-march draw needs besides the two textures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub proj: Mat4,
    /// Eye position in world space.
    pub eye: Vec3,
    /// Dimensions of the volume being drawn.
    pub volume_dims: UVec3,
    /// Step-size divisor.
    pub sampling_rate: f32,
    /// Alpha at which rays stop.
    pub termination_threshold: f32,
    /// Opacity source.
    pub opacity_model: OpacityModel,
    /// Opacity multiplier.
    pub opacity_scale: f32,
    /// Per-pixel ray start jitter.
    pub jitter: bool,
    /// Clear color behind the volume.
    pub background: Vec3,
}

/// A device that can hold volume and colormap textures and ray-march them.
///
/// Handles are opaque to callers. Drawing with a handle the device did not
/// create fails with [`RenderError::InvalidResource`](crate::RenderError::InvalidResource).
pub trait GraphicsDevice {
    /// Volume handle.
    type Volume;
    /// Colormap handle.
    type Colormap;

    /// Uploads a 3-D volume texture.
    fn upload_volume(&mut self, texels: &VolumeTexels) -> RenderResult<Self::Volume>;

    /// Uploads a colormap lookup texture.
    fn upload_colormap(&mut self, colormap: &ColormapDescriptor) -> RenderResult<Self::Colormap>;

    /// Clears the target, draws the bounding cube with the ray-march
    /// program and presents.
    ///
    /// Returns once the device has finished the frame, so callers can time
    /// the whole draw.
    fn draw_volume(
        &mut self,
        frame: &FrameParams,
        volume: &Self::Volume,
        colormap: &Self::Colormap,
    ) -> RenderResult<()>;

    /// Width over height of the render target.
    fn viewport_aspect(&self) -> f32;
}
