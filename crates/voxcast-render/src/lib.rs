//! Rendering backend for voxcast.
//!
//! This crate provides the wgpu side of the renderer:
//! - the [`GraphicsDevice`] capability and its wgpu implementation, [`RenderEngine`]
//! - the WGSL ray-march program and its uniform block
//! - volume texel preparation and colormap decoding
//! - the orbit [`CameraState`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel and texel math moves between integer and float freely
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod buffer;
pub mod camera;
pub mod color_maps;
pub mod device;
pub mod engine;
pub mod error;
pub mod screenshot;
pub mod shader;
pub mod volume_render;

pub use camera::{derive_matrices, CameraState, MIN_ORBIT_DISTANCE};
pub use color_maps::{
    ColorMap, ColorMapRegistry, ColormapDescriptor, COLOR_MAP_RESOLUTION, DEFAULT_COLOR_MAP,
};
pub use device::{FrameParams, GraphicsDevice};
pub use engine::RenderEngine;
pub use error::{RenderError, RenderResult};
pub use screenshot::{encode_png, save_image, ScreenshotError};
pub use shader::{ShaderBuilder, RAYMARCH_WGSL};
pub use volume_render::{GpuColormap, GpuVolume, RaymarchUniforms, TexelFormat, VolumeTexels};
