//! Configuration options for voxcast.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::march::{OpacityModel, DEFAULT_TERMINATION_THRESHOLD};
use crate::sampling::AdaptiveSampling;
use crate::{Result, VoxcastError};

/// A labelled entry in a selection menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    /// Label shown to the user.
    pub label: String,
    /// File path, relative to [`Options::data_dir`] unless absolute.
    pub path: PathBuf,
}

impl MenuEntry {
    /// Creates a menu entry.
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

/// Configuration options for the renderer and its shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Scheduler tick cadence in milliseconds.
    pub tick_interval_ms: u64,

    /// Minimum time between two renders in milliseconds.
    pub throttle_interval_ms: u64,

    /// Frame time the adaptive sampling aims for.
    pub target_frame_time_ms: f32,

    /// Sampling rate at startup.
    pub initial_sampling_rate: f32,

    /// Lower bound for the sampling rate.
    pub min_sampling_rate: f32,

    /// Upper bound for the sampling rate.
    pub max_sampling_rate: f32,

    /// Multiplicative change per adaptive adjustment.
    pub sampling_step_factor: f32,

    /// Frames faster than `comfort_ratio * target` raise the rate.
    pub comfort_ratio: f32,

    /// Whether measured frame times adjust the sampling rate.
    pub adaptive_sampling_enabled: bool,

    /// Accumulated alpha at which a ray stops.
    pub termination_threshold: f32,

    /// How sample opacity is derived.
    pub opacity_model: OpacityModel,

    /// Multiplier applied to every sample's opacity.
    pub opacity_scale: f32,

    /// Jitter ray start positions per pixel.
    pub jitter: bool,

    /// Background color.
    pub background_color: Vec3,

    /// Vertical field of view in degrees.
    pub fov_degrees: f32,

    /// Near clip distance.
    pub near: f32,

    /// Far clip distance.
    pub far: f32,

    /// Window size in physical pixels.
    pub window_size: (u32, u32),

    /// Directory that relative menu paths are resolved against.
    pub data_dir: PathBuf,

    /// Volume selection menu.
    pub volumes: Vec<MenuEntry>,

    /// Colormap selection menu.
    pub colormaps: Vec<MenuEntry>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tick_interval_ms: 33,
            throttle_interval_ms: 33,
            target_frame_time_ms: 32.0,
            initial_sampling_rate: 1.0,
            min_sampling_rate: 0.25,
            max_sampling_rate: 4.0,
            sampling_step_factor: 1.1,
            comfort_ratio: 0.75,
            adaptive_sampling_enabled: true,
            termination_threshold: DEFAULT_TERMINATION_THRESHOLD,
            opacity_model: OpacityModel::ScalarRamp,
            opacity_scale: 1.0,
            jitter: true,
            background_color: Vec3::new(0.1, 0.1, 0.1),
            fov_degrees: 65.0,
            near: 0.01,
            far: 100.0,
            window_size: (1280, 720),
            data_dir: PathBuf::from("data"),
            volumes: Vec::new(),
            colormaps: Vec::new(),
        }
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> VoxcastError {
    VoxcastError::InvalidOption {
        name,
        reason: reason.into(),
    }
}

fn positive(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be positive, got {value}")))
    }
}

impl Options {
    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let options = Self::from_json_str(&json)?;
        log::info!("loaded options from {}", path.display());
        Ok(options)
    }

    /// Serializes options to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that every value is in range.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be at least 1 ms"));
        }
        positive("target_frame_time_ms", self.target_frame_time_ms)?;
        positive("initial_sampling_rate", self.initial_sampling_rate)?;
        positive("min_sampling_rate", self.min_sampling_rate)?;
        positive("max_sampling_rate", self.max_sampling_rate)?;
        if self.min_sampling_rate > self.max_sampling_rate {
            return Err(invalid(
                "min_sampling_rate",
                format!(
                    "{} exceeds max_sampling_rate {}",
                    self.min_sampling_rate, self.max_sampling_rate
                ),
            ));
        }
        if !(self.sampling_step_factor.is_finite() && self.sampling_step_factor > 1.0) {
            return Err(invalid("sampling_step_factor", "must be greater than 1"));
        }
        if !(self.comfort_ratio > 0.0 && self.comfort_ratio <= 1.0) {
            return Err(invalid("comfort_ratio", "must be in (0, 1]"));
        }
        if !(self.termination_threshold > 0.0 && self.termination_threshold <= 1.0) {
            return Err(invalid("termination_threshold", "must be in (0, 1]"));
        }
        if !(self.opacity_scale.is_finite() && self.opacity_scale >= 0.0) {
            return Err(invalid("opacity_scale", "must be non-negative"));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(invalid("fov_degrees", "must be in (0, 180)"));
        }
        positive("near", self.near)?;
        if !(self.far.is_finite() && self.far > self.near) {
            return Err(invalid("far", "must be greater than near"));
        }
        if self.window_size.0 == 0 || self.window_size.1 == 0 {
            return Err(invalid("window_size", "must be non-zero"));
        }
        Ok(())
    }

    /// The adaptive sampling policy described by these options.
    #[must_use]
    pub fn adaptive_sampling(&self) -> AdaptiveSampling {
        AdaptiveSampling {
            min_rate: self.min_sampling_rate,
            max_rate: self.max_sampling_rate,
            step_factor: self.sampling_step_factor,
            comfort_ratio: self.comfort_ratio,
        }
    }

    /// Resolves a menu path against [`data_dir`](Self::data_dir).
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}
