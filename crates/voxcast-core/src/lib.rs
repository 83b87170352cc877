//! Core abstractions for voxcast.
//!
//! This crate holds everything that does not need a GPU:
//! - [`VolumeDescriptor`] parsing and voxel normalization
//! - the [`RayMarcher`] reference implementation of the shading numerics
//! - [`FrameScheduler`] with render readiness and adaptive sampling
//! - configuration [`Options`] and the error taxonomy

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Voxel indices and dimensions are converted between integer and float freely
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
// Options structs legitimately have several flags
#![allow(clippy::struct_excessive_bools)]

pub mod error;
pub mod geometry;
pub mod march;
pub mod options;
pub mod readiness;
pub mod sampling;
pub mod scheduler;
pub mod volume;

pub use error::{DecodeError, ParseError, Result, VoxcastError};
pub use geometry::{CUBE_STRIP, CUBE_STRIP_VERTEX_COUNT};
pub use march::{
    correct_opacity, intersect_unit_cube, step_size, Compositor, MarchResult, OpacityModel,
    RayMarcher, ScalarField, TransferFunction, DEFAULT_TERMINATION_THRESHOLD,
};
pub use options::{MenuEntry, Options};
pub use readiness::{ReadinessTracker, RenderReadiness};
pub use sampling::{AdaptiveSampling, RateChange, SamplingState};
pub use scheduler::{FrameScheduler, TickDecision};
pub use volume::{parse_descriptor, VolumeDescriptor, VolumeLayout, VoxelType};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec3, Vec4};
