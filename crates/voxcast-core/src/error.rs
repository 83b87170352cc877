//! Error types for voxcast.

use thiserror::Error;

/// Errors raised while turning a volume filename and byte buffer into a
/// [`VolumeDescriptor`](crate::volume::VolumeDescriptor).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The filename does not follow `name_<W>x<H>x<D>_<type>`.
    #[error("malformed volume filename '{0}', expected name_<W>x<H>x<D>_<type>.raw")]
    MalformedName(String),

    /// The byte count does not match the dimensions and voxel type.
    #[error("volume size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The voxel type suffix is not one we know how to upload.
    #[error("unsupported voxel type '{0}'")]
    UnsupportedVoxelType(String),
}

/// Errors raised while decoding a colormap image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The bytes are not a recognized image encoding.
    #[error("unsupported colormap image format")]
    UnsupportedFormat,

    /// The encoding was recognized but decoding failed.
    #[error("corrupt colormap image: {0}")]
    Corrupt(String),

    /// The image has no pixels.
    #[error("colormap image is empty")]
    Empty,
}

/// The main error type for voxcast operations.
#[derive(Error, Debug)]
pub enum VoxcastError {
    /// Volume filename or byte-count contract violated.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Colormap image could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Fetching volume or colormap bytes failed.
    #[error("fetch of '{path}' failed: {reason}")]
    FetchFailure { path: String, reason: String },

    /// A GPU handle was stale or belonged to another device.
    #[error("invalid resource reference: {0}")]
    InvalidResourceReference(String),

    /// Eye, center and up do not define a view.
    #[error("degenerate camera: {0}")]
    DegenerateCamera(&'static str),

    /// Configuration value out of range.
    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: &'static str, reason: String },

    /// Rendering error.
    #[error("render error: {0}")]
    RenderError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for voxcast operations.
pub type Result<T> = std::result::Result<T, VoxcastError>;
