//! Camera and view management.

use glam::{Mat4, Vec3};
use voxcast_core::{Options, Result, VoxcastError};

/// Closest the eye may get to the orbit center.
pub const MIN_ORBIT_DISTANCE: f32 = 0.1;

const EPSILON: f32 = 1.0e-6;

/// A perspective camera looking at a center point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Eye position in world space.
    pub eye: Vec3,
    /// Point the camera looks at (and orbits around).
    pub center: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Last known aspect ratio (width / height).
    pub aspect: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
}

impl Default for CameraState {
    /// Looks at the volume center `(0.5, 0.5, 0.5)` from `+Z`.
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.5, 0.5, 2.0),
            center: Vec3::splat(0.5),
            up: Vec3::Y,
            fov_y: 65.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.01,
            far: 100.0,
        }
    }
}

impl CameraState {
    /// Creates a camera with default lens settings.
    #[must_use]
    pub fn new(eye: Vec3, center: Vec3, up: Vec3) -> Self {
        Self {
            eye,
            center,
            up,
            ..Self::default()
        }
    }

    /// Creates the default orbit camera with the lens from `options`.
    #[must_use]
    pub fn from_options(options: &Options) -> Self {
        let (width, height) = options.window_size;
        Self {
            fov_y: options.fov_degrees.to_radians(),
            aspect: width.max(1) as f32 / height.max(1) as f32,
            near: options.near,
            far: options.far,
            ..Self::default()
        }
    }

    /// Checks that eye, center and up define a view.
    pub fn validate(&self) -> Result<()> {
        let finite = self.eye.is_finite()
            && self.center.is_finite()
            && self.up.is_finite()
            && self.fov_y.is_finite();
        if !finite {
            return Err(VoxcastError::DegenerateCamera("non-finite camera parameters"));
        }
        let view = self.center - self.eye;
        if view.length_squared() < EPSILON * EPSILON {
            return Err(VoxcastError::DegenerateCamera("eye coincides with center"));
        }
        if self.up.length_squared() < EPSILON * EPSILON {
            return Err(VoxcastError::DegenerateCamera("up vector is zero"));
        }
        if view.normalize().cross(self.up.normalize()).length_squared() < EPSILON {
            return Err(VoxcastError::DegenerateCamera(
                "up is parallel to the view direction",
            ));
        }
        Ok(())
    }

    /// Sets the aspect ratio.
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.center, self.up)
    }

    /// Returns the projection matrix for `aspect`.
    #[must_use]
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }

    /// Returns `(view, projection)` for the given viewport.
    ///
    /// The viewport aspect wins over the stored one, which may be stale
    /// after a resize.
    #[must_use]
    pub fn derive_matrices(&self, viewport_aspect: f32) -> (Mat4, Mat4) {
        (self.view_matrix(), self.projection_matrix(viewport_aspect))
    }

    /// Unit vector from the eye toward the center.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.center - self.eye).normalize_or_zero()
    }

    /// Unit vector to the right of the view direction.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or_zero()
    }

    /// Distance from eye to center.
    #[must_use]
    pub fn distance(&self) -> f32 {
        (self.eye - self.center).length()
    }

    /// Turntable orbit around the center.
    ///
    /// `delta_x` spins around the up axis, `delta_y` tilts; the polar angle
    /// stays clear of the poles so `up` never lines up with the view.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let radius = self.distance();
        if radius < EPSILON {
            return;
        }
        let offset = self.eye - self.center;
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta -= delta_x;
        phi = (phi - delta_y).clamp(0.01, std::f32::consts::PI - 0.01);

        self.eye = self.center
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }

    /// Moves eye and center together in the view plane.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.right() * delta_x + self.up * delta_y;
        self.eye += offset;
        self.center += offset;
    }

    /// Moves the eye toward the center by `delta` (negative moves away).
    pub fn zoom(&mut self, delta: f32) {
        let direction = self.forward();
        let new_distance = (self.distance() - delta).max(MIN_ORBIT_DISTANCE);
        self.eye = self.center - direction * new_distance;
    }
}

/// Returns `(view, projection)` for `camera` at `viewport_aspect`.
#[must_use]
pub fn derive_matrices(camera: &CameraState, viewport_aspect: f32) -> (Mat4, Mat4) {
    camera.derive_matrices(viewport_aspect)
}
