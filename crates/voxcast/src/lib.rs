//! voxcast: a GPU ray-marching viewer for dense scalar volumes.
//!
//! voxcast renders a 3-D voxel grid (a CT or MRI scan, a simulation field)
//! by casting one ray per pixel through a textured unit cube, sampling the
//! volume along it and compositing the samples front to back through a
//! colormap.
//!
//! # Quick Start
//!
//! ```no_run
//! use voxcast::*;
//!
//! fn main() -> Result<()> {
//!     let mut options = Options::default();
//!     options.data_dir = "data".into();
//!     options.volumes.push(MenuEntry::new("Skull", "skull_256x256x256_uint8.raw"));
//!
//!     // Opens a window; V and C cycle the volume and colormap menus.
//!     run(options)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`RendererContext`] owns the graphics device, the bound volume and
//!   colormap, the [`CameraState`] and the [`FrameScheduler`].
//! - Files load on background threads; results are swapped in on the
//!   render thread, so a frame never sees a half-uploaded resource.
//! - The scheduler ticks on a fixed cadence, throttles renders and adapts
//!   the sampling rate to hold a target frame time.
//!
//! # Volume files
//!
//! Raw volumes are named `<name>_<W>x<H>x<D>_<type>.raw` and hold exactly
//! `W * H * D * sizeof(type)` bytes, x fastest. Supported types are
//! `uint8`, `uint16` and `float32`.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Mouse deltas arrive as f64
#![allow(clippy::cast_possible_truncation)]

mod app;
mod context;
mod headless;
mod loader;

pub use app::{run, App};
pub use context::{ColormapSlot, RendererContext, RendererPhase, VolumeSlot};
pub use headless::{headless_context, render_to_file, render_to_image};
pub use loader::{
    AssetLoader, Fetcher, FileFetcher, GenerationGate, LoadCompletion, MemoryFetcher,
    PreparedVolume,
};

// Re-export core types
pub use voxcast_core::{
    parse_descriptor, AdaptiveSampling, DecodeError, FrameScheduler, MenuEntry, OpacityModel,
    Options, ParseError, RateChange, RayMarcher, RenderReadiness, Result, SamplingState,
    TickDecision, VolumeDescriptor, VolumeLayout, VoxcastError, VoxelType,
};

// Re-export render types
pub use voxcast_render::{
    derive_matrices, CameraState, ColorMap, ColorMapRegistry, ColormapDescriptor, FrameParams,
    GraphicsDevice, RenderEngine, RenderError, RenderResult, VolumeTexels, DEFAULT_COLOR_MAP,
};

// Re-export glam types for convenience
pub use voxcast_core::{Mat4, UVec3, Vec3, Vec4};
