//! Headless rendering.
//!
//! Renders a volume to an image buffer or file without opening a window.
//! Useful for integration tests, batch processing and thumbnails.

use std::path::Path;

use pollster::FutureExt;
use voxcast_core::{Options, Result, VolumeDescriptor, VoxcastError};
use voxcast_render::{ColormapDescriptor, RenderEngine};

use crate::context::RendererContext;

/// Creates a headless context with `volume` and `colormap` already bound.
pub fn headless_context(
    volume: &VolumeDescriptor,
    colormap: &ColormapDescriptor,
    options: Options,
    width: u32,
    height: u32,
) -> Result<RendererContext<RenderEngine>> {
    let engine = RenderEngine::new_headless(width, height)
        .block_on()
        .map_err(|e| VoxcastError::RenderError(format!("failed to create headless engine: {e}")))?;
    let mut context = RendererContext::new(engine, options)?;
    context.load_volume_descriptor(volume)?;
    context.load_colormap_descriptor(colormap, "headless")?;
    Ok(context)
}

/// Renders one frame of `volume` and returns RGBA8 pixels.
///
/// The buffer holds `width * height * 4` bytes, row by row from the top
/// left. Adaptive sampling is disabled so the output only depends on
/// `options.initial_sampling_rate`.
///
/// # Example
/// ```no_run
/// use voxcast::*;
///
/// let volume = VolumeDescriptor::from_fn("sphere", UVec3::splat(32), |p| {
///     1.0 - (p - Vec3::splat(0.5)).length() * 2.0
/// });
/// let registry = ColorMapRegistry::new();
/// let colormap = ColormapDescriptor::from_color_map(registry.get("viridis").unwrap(), 256);
/// let pixels = render_to_image(&volume, &colormap, Options::default(), 320, 240).unwrap();
/// assert_eq!(pixels.len(), 320 * 240 * 4);
/// ```
pub fn render_to_image(
    volume: &VolumeDescriptor,
    colormap: &ColormapDescriptor,
    options: Options,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let _ = env_logger::try_init();
    let options = Options {
        adaptive_sampling_enabled: false,
        ..options
    };
    let mut context = headless_context(volume, colormap, options, width, height)?;
    let elapsed = context.render_frame()?;
    log::info!(
        "headless frame {}x{} in {:.2} ms",
        width,
        height,
        elapsed.as_secs_f64() * 1000.0
    );
    Ok(context.device().read_pixels()?)
}

/// Renders one frame of `volume` and saves it as PNG or JPEG.
pub fn render_to_file(
    path: impl AsRef<Path>,
    volume: &VolumeDescriptor,
    colormap: &ColormapDescriptor,
    options: Options,
    width: u32,
    height: u32,
) -> Result<()> {
    let data = render_to_image(volume, colormap, options, width, height)?;
    voxcast_render::save_image(path, &data, width, height)
        .map_err(|e| VoxcastError::RenderError(format!("failed to save image: {e}")))
}
