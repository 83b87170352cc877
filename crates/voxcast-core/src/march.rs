//! Reference ray marcher.
//!
//! This is the CPU definition of what `raymarch.wgsl` computes per pixel:
//! unit-cube clipping, fixed-step sampling, opacity correction and
//! front-to-back compositing with early ray termination.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Smallest step the marcher will take, in unit-cube lengths.
pub const MIN_STEP_SIZE: f32 = 1.0e-5;

/// Default alpha above which a ray stops accumulating.
pub const DEFAULT_TERMINATION_THRESHOLD: f32 = 0.95;

/// A scalar field over the unit cube `[0, 1]^3`.
pub trait ScalarField {
    /// Samples the field at `p`, returning a value in `[0, 1]`.
    fn sample(&self, p: Vec3) -> f32;
}

impl<F: Fn(Vec3) -> f32> ScalarField for F {
    fn sample(&self, p: Vec3) -> f32 {
        self(p)
    }
}

/// Maps a normalized scalar to RGBA (straight, not premultiplied).
pub trait TransferFunction {
    /// Looks up the color for scalar `t` in `[0, 1]`.
    fn lookup(&self, t: f32) -> Vec4;
}

/// How per-sample opacity is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OpacityModel {
    /// Opacity is the scalar value itself, scaled.
    #[default]
    ScalarRamp,
    /// Opacity is the colormap's alpha channel, scaled.
    Colormap,
}

impl OpacityModel {
    /// Index used by the shader uniform.
    #[must_use]
    pub fn to_index(self) -> u32 {
        match self {
            OpacityModel::ScalarRamp => 0,
            OpacityModel::Colormap => 1,
        }
    }
}

/// Step length along a ray: `1 / (max_dimension * sampling_rate)`.
///
/// Clamped to [`MIN_STEP_SIZE`] so a huge or non-finite rate never stalls
/// the march.
#[must_use]
pub fn step_size(max_dimension: u32, sampling_rate: f32) -> f32 {
    let denom = max_dimension.max(1) as f32 * sampling_rate;
    let step = 1.0 / denom;
    if step.is_finite() && step > MIN_STEP_SIZE {
        step
    } else {
        MIN_STEP_SIZE
    }
}

/// Intersects a ray with the unit cube `[0, 1]^3`.
///
/// Returns `(t_enter, t_exit)` with `t_enter` clamped to 0, or `None` if the
/// ray misses the cube or the cube is behind the origin.
#[must_use]
pub fn intersect_unit_cube(origin: Vec3, dir: Vec3) -> Option<(f32, f32)> {
    let inv = dir.recip();
    let t0 = (Vec3::ZERO - origin) * inv;
    let t1 = (Vec3::ONE - origin) * inv;
    let t_min = t0.min(t1);
    let t_max = t0.max(t1);
    let enter = t_min.max_element().max(0.0);
    let exit = t_max.min_element();
    if exit > enter && exit.is_finite() {
        Some((enter, exit))
    } else {
        None
    }
}

/// Front-to-back accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Compositor {
    /// Accumulated premultiplied color.
    pub color: Vec3,
    /// Accumulated alpha.
    pub alpha: f32,
}

impl Compositor {
    /// Adds one sample behind everything accumulated so far.
    pub fn accumulate(&mut self, color: Vec3, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        let remaining = 1.0 - self.alpha;
        self.color += remaining * opacity * color;
        self.alpha += remaining * opacity;
    }

    /// Whether alpha has reached `threshold`.
    #[must_use]
    pub fn is_saturated(&self, threshold: f32) -> bool {
        self.alpha >= threshold
    }

    /// Blends the accumulated result over an opaque background.
    #[must_use]
    pub fn over(&self, background: Vec3) -> Vec3 {
        self.color + (1.0 - self.alpha) * background
    }
}

/// Result of marching one ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchResult {
    /// Accumulated color and alpha.
    pub composite: Compositor,
    /// Number of samples taken.
    pub steps: u32,
    /// Whether the march stopped on the alpha threshold.
    pub terminated_early: bool,
}

/// Parameters of the marching loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayMarcher {
    /// Sampling rate; step length is `1 / (max_dimension * sampling_rate)`.
    pub sampling_rate: f32,
    /// Largest volume dimension.
    pub max_dimension: u32,
    /// Alpha at which the march stops.
    pub termination_threshold: f32,
    /// Opacity source.
    pub opacity_model: OpacityModel,
    /// Multiplier applied to raw opacity.
    pub opacity_scale: f32,
    /// Disables the threshold check (for comparing against full marches).
    pub early_termination: bool,
}

impl RayMarcher {
    /// Creates a marcher with default threshold and opacity settings.
    #[must_use]
    pub fn new(max_dimension: u32, sampling_rate: f32) -> Self {
        Self {
            sampling_rate,
            max_dimension,
            termination_threshold: DEFAULT_TERMINATION_THRESHOLD,
            opacity_model: OpacityModel::ScalarRamp,
            opacity_scale: 1.0,
            early_termination: true,
        }
    }

    /// Current step length.
    #[must_use]
    pub fn step(&self) -> f32 {
        step_size(self.max_dimension, self.sampling_rate)
    }

    /// Classifies a scalar into `(color, corrected opacity)`.
    pub fn classify(&self, scalar: f32, transfer: &impl TransferFunction) -> (Vec3, f32) {
        let rgba = transfer.lookup(scalar.clamp(0.0, 1.0));
        let raw = match self.opacity_model {
            OpacityModel::ScalarRamp => scalar,
            OpacityModel::Colormap => rgba.w,
        };
        let opacity = (raw * self.opacity_scale).clamp(0.0, 1.0);
        (rgba.truncate(), correct_opacity(opacity, self.sampling_rate))
    }

    /// Marches one ray through the unit cube.
    ///
    /// `dir` need not be normalized. Calls `observe` with the compositor
    /// state after every sample.
    pub fn march_observed(
        &self,
        field: &impl ScalarField,
        transfer: &impl TransferFunction,
        origin: Vec3,
        dir: Vec3,
        mut observe: impl FnMut(&Compositor),
    ) -> MarchResult {
        let mut composite = Compositor::default();
        let mut steps = 0;
        let mut terminated_early = false;

        let dir = dir.normalize_or_zero();
        let Some((t_enter, t_exit)) = intersect_unit_cube(origin, dir) else {
            return MarchResult {
                composite,
                steps,
                terminated_early,
            };
        };

        let dt = self.step();
        let mut t = t_enter;
        while t < t_exit {
            let p = origin + dir * t;
            let (color, opacity) = self.classify(field.sample(p), transfer);
            composite.accumulate(color, opacity);
            steps += 1;
            observe(&composite);

            if self.early_termination && composite.is_saturated(self.termination_threshold) {
                terminated_early = true;
                break;
            }
            t += dt;
        }

        MarchResult {
            composite,
            steps,
            terminated_early,
        }
    }

    /// Marches one ray through the unit cube.
    pub fn march(
        &self,
        field: &impl ScalarField,
        transfer: &impl TransferFunction,
        origin: Vec3,
        dir: Vec3,
    ) -> MarchResult {
        self.march_observed(field, transfer, origin, dir, |_| {})
    }
}

/// Rescales opacity so the integrated result is independent of the step
/// count: `1 - (1 - a)^(1 / rate)`.
#[must_use]
pub fn correct_opacity(opacity: f32, sampling_rate: f32) -> f32 {
    if opacity <= 0.0 {
        return 0.0;
    }
    let rate = sampling_rate.max(MIN_STEP_SIZE);
    1.0 - (1.0 - opacity.min(1.0)).powf(1.0 / rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Gray;

    impl TransferFunction for Gray {
        fn lookup(&self, t: f32) -> Vec4 {
            Vec4::new(t, t, t, 1.0)
        }
    }

    struct Tinted(Vec3);

    impl TransferFunction for Tinted {
        fn lookup(&self, _t: f32) -> Vec4 {
            self.0.extend(0.0)
        }
    }

    const EYE: Vec3 = Vec3::new(0.5, 0.5, 2.0);

    #[test]
    fn test_step_size() {
        assert!((step_size(256, 1.0) - 1.0 / 256.0).abs() < 1e-9);
        assert!((step_size(256, 2.0) - 1.0 / 512.0).abs() < 1e-9);
        assert_eq!(step_size(256, 0.0), MIN_STEP_SIZE);
        assert_eq!(step_size(256, f32::INFINITY), MIN_STEP_SIZE);
        assert_eq!(step_size(0, 1.0), 1.0);
    }

    #[test]
    fn test_intersect_unit_cube() {
        let (enter, exit) = intersect_unit_cube(EYE, Vec3::NEG_Z).unwrap();
        assert!((enter - 1.0).abs() < 1e-6);
        assert!((exit - 2.0).abs() < 1e-6);

        // Origin inside the cube starts at t = 0
        let (enter, exit) = intersect_unit_cube(Vec3::splat(0.5), Vec3::X).unwrap();
        assert_eq!(enter, 0.0);
        assert!((exit - 0.5).abs() < 1e-6);

        assert!(intersect_unit_cube(EYE, Vec3::Z).is_none());
        assert!(intersect_unit_cube(Vec3::new(2.0, 2.0, 2.0), Vec3::X).is_none());
    }

    #[test]
    fn test_zero_opacity_leaves_background() {
        let background = Vec3::new(0.2, 0.4, 0.6);
        for rate in [0.25, 0.5, 1.0, 2.0, 8.0] {
            let marcher = RayMarcher::new(32, rate);
            let result = marcher.march(&|_p: Vec3| 0.0, &Gray, EYE, Vec3::NEG_Z);
            assert!(result.steps > 0);
            assert_eq!(result.composite.alpha, 0.0);
            assert_eq!(result.composite.over(background), background);
        }
    }

    #[test]
    fn test_colormap_alpha_zero_leaves_background() {
        let mut marcher = RayMarcher::new(16, 1.0);
        marcher.opacity_model = OpacityModel::Colormap;
        let background = Vec3::ONE;
        let result = marcher.march(&|_p: Vec3| 0.8, &Tinted(Vec3::X), EYE, Vec3::NEG_Z);
        assert_eq!(result.composite.alpha, 0.0);
        assert_eq!(result.composite.over(background), background);
    }

    #[test]
    fn test_dense_volume_terminates_early() {
        let marcher = RayMarcher::new(64, 1.0);
        let result = marcher.march(&|_p: Vec3| 1.0, &Gray, EYE, Vec3::NEG_Z);
        assert!(result.terminated_early);
        assert_eq!(result.steps, 1);
        assert!(result.composite.alpha >= DEFAULT_TERMINATION_THRESHOLD);
    }

    #[test]
    fn test_miss_produces_nothing() {
        let marcher = RayMarcher::new(64, 1.0);
        let result = marcher.march(&|_p: Vec3| 1.0, &Gray, EYE, Vec3::Z);
        assert_eq!(result.steps, 0);
        assert_eq!(result.composite, Compositor::default());
    }

    #[test]
    fn test_opacity_correction() {
        assert_eq!(correct_opacity(0.0, 4.0), 0.0);
        assert!((correct_opacity(0.5, 1.0) - 0.5).abs() < 1e-6);
        // Two half-rate steps compose to one full-rate step
        let half = correct_opacity(0.5, 2.0);
        let mut c = Compositor::default();
        c.accumulate(Vec3::ONE, half);
        c.accumulate(Vec3::ONE, half);
        assert!((c.alpha - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_integrated_alpha_roughly_rate_independent() {
        let field = |_p: Vec3| 0.02;
        let coarse = RayMarcher::new(64, 1.0).march(&field, &Gray, EYE, Vec3::NEG_Z);
        let fine = RayMarcher::new(64, 4.0).march(&field, &Gray, EYE, Vec3::NEG_Z);
        assert!((coarse.composite.alpha - fine.composite.alpha).abs() < 0.05);
    }

    proptest! {
        #[test]
        fn prop_alpha_is_monotonic(
            values in proptest::collection::vec(0.0f32..=1.0, 1..32),
            rate in 0.1f32..4.0,
        ) {
            let n = values.len();
            let field = move |p: Vec3| {
                let i = ((1.0 - p.z) * n as f32) as usize;
                values[i.min(n - 1)]
            };
            let mut marcher = RayMarcher::new(n as u32, rate);
            marcher.early_termination = false;
            let mut last = 0.0f32;
            let mut monotonic = true;
            marcher.march_observed(&field, &Gray, EYE, Vec3::NEG_Z, |c| {
                monotonic &= c.alpha >= last;
                last = c.alpha;
            });
            prop_assert!(monotonic);
            prop_assert!(last <= 1.0);
        }

        #[test]
        fn prop_early_termination_stops_at_first_saturated_step(
            density in 0.05f32..=1.0,
            rate in 0.25f32..4.0,
        ) {
            let field = move |_p: Vec3| density;
            let early = RayMarcher::new(32, rate);
            let mut full = early;
            full.early_termination = false;

            let mut observed = 0u32;
            let a = early.march_observed(&field, &Gray, EYE, Vec3::NEG_Z, |_| observed += 1);

            let mut samples = 0u32;
            let mut first_saturated: Option<u32> = None;
            let b = full.march_observed(&field, &Gray, EYE, Vec3::NEG_Z, |c| {
                samples += 1;
                if first_saturated.is_none() && c.is_saturated(early.termination_threshold) {
                    first_saturated = Some(samples);
                }
            });

            prop_assert_eq!(observed, a.steps);
            if a.terminated_early {
                prop_assert!(a.composite.alpha >= early.termination_threshold);
                // No sample is taken after the first step crossing the threshold
                prop_assert_eq!(Some(a.steps), first_saturated);
                // The skipped tail can add at most the remaining transmittance
                let remaining = 1.0 - a.composite.alpha;
                prop_assert!(b.composite.alpha - a.composite.alpha <= remaining + 1e-5);
                let color_gap = (b.composite.color - a.composite.color).abs().max_element();
                prop_assert!(color_gap <= remaining + 1e-5);
            } else {
                prop_assert!(first_saturated.is_none());
                prop_assert_eq!(a.composite, b.composite);
            }
        }
    }
}
