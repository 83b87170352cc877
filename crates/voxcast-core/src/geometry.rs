//! Bounding geometry for the ray-march pass.

/// Unit cube `[0, 1]^3` as a single 14-vertex triangle strip.
///
/// Rendered with front faces culled, so each fragment lies on a back face
/// and rays still start correctly when the eye is inside the cube.
pub const CUBE_STRIP: [[f32; 3]; 14] = [
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
    [0.0, 0.0, 0.0],
];

/// Number of vertices in [`CUBE_STRIP`].
pub const CUBE_STRIP_VERTEX_COUNT: u32 = 14;
