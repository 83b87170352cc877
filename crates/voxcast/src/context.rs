//! The renderer context: one owner for device, resources, camera and scheduler.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use voxcast_core::{
    FrameScheduler, Options, RenderReadiness, Result, TickDecision, VolumeDescriptor,
    VolumeLayout, VoxcastError,
};
use voxcast_render::{
    CameraState, ColorMapRegistry, ColormapDescriptor, FrameParams, GraphicsDevice, VolumeTexels,
    COLOR_MAP_RESOLUTION,
};

use crate::loader::{AssetLoader, FileFetcher, Fetcher, LoadCompletion, PreparedVolume};

/// Per-frame renderer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererPhase {
    /// Between frames, or waiting for resources.
    #[default]
    Idle,
    /// A draw is being issued.
    Rendering,
}

/// A bound volume: the device handle plus what it was built from.
pub struct VolumeSlot<V> {
    handle: V,
    layout: VolumeLayout,
}

impl<V> VolumeSlot<V> {
    /// Device handle.
    pub fn handle(&self) -> &V {
        &self.handle
    }

    /// Name, dimensions and voxel type.
    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }
}

/// A bound colormap.
pub struct ColormapSlot<C> {
    handle: C,
    source: String,
}

impl<C> ColormapSlot<C> {
    /// Device handle.
    pub fn handle(&self) -> &C {
        &self.handle
    }

    /// Path or built-in name the colormap came from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Owns everything the render loop touches.
///
/// Resource slots hold reference-counted handles. A frame clones both
/// `Arc`s before drawing, so replacing a slot mid-frame can never release
/// a handle the frame is still using, and a frame always sees one
/// consistent volume/colormap pair.
///
/// Frames are only drawn when something visible changed: a camera move, a
/// newly bound resource or a resized viewport. Anything reached through
/// [`camera_mut`](Self::camera_mut), [`device_mut`](Self::device_mut) or
/// [`scheduler_mut`](Self::scheduler_mut) counts as a change.
pub struct RendererContext<D: GraphicsDevice> {
    device: D,
    options: Options,
    camera: CameraState,
    scheduler: FrameScheduler,
    volume: Option<Arc<VolumeSlot<D::Volume>>>,
    colormap: Option<Arc<ColormapSlot<D::Colormap>>>,
    loader: AssetLoader,
    color_maps: ColorMapRegistry,
    phase: RendererPhase,
    frames_rendered: u64,
    needs_redraw: bool,
}

impl<D: GraphicsDevice> RendererContext<D> {
    /// Creates a context that reads files from disk.
    pub fn new(device: D, options: Options) -> Result<Self> {
        Self::with_fetcher(device, options, Arc::new(FileFetcher))
    }

    /// Creates a context with a custom byte source.
    pub fn with_fetcher(device: D, options: Options, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        options.validate()?;
        log::info!(
            "renderer context: tick {} ms, throttle {} ms, target frame {} ms",
            options.tick_interval_ms,
            options.throttle_interval_ms,
            options.target_frame_time_ms
        );
        Ok(Self {
            camera: CameraState::from_options(&options),
            scheduler: FrameScheduler::from_options(&options),
            device,
            options,
            volume: None,
            colormap: None,
            loader: AssetLoader::new(fetcher),
            color_maps: ColorMapRegistry::new(),
            phase: RendererPhase::Idle,
            frames_rendered: 0,
            needs_redraw: true,
        })
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Starts a background load of a volume file.
    ///
    /// Relative paths resolve against `Options::data_dir`. The current
    /// volume stays bound until the new one is uploaded.
    pub fn request_volume(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.options.resolve(path.as_ref());
        self.loader.request_volume(path)?;
        self.scheduler.readiness_mut().begin_upload();
        Ok(())
    }

    /// Starts a background load of a colormap image.
    pub fn request_colormap(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.options.resolve(path.as_ref());
        self.loader.request_colormap(path)?;
        self.scheduler.readiness_mut().begin_upload();
        Ok(())
    }

    /// Requests entry `index` of the volume menu.
    pub fn select_volume(&mut self, index: usize) -> Result<()> {
        let entry = self.options.volumes.get(index).ok_or_else(|| {
            VoxcastError::InvalidResourceReference(format!("no volume menu entry {index}"))
        })?;
        log::info!("selected volume '{}'", entry.label);
        let path = entry.path.clone();
        self.request_volume(path)
    }

    /// Requests entry `index` of the colormap menu.
    pub fn select_colormap(&mut self, index: usize) -> Result<()> {
        let entry = self.options.colormaps.get(index).ok_or_else(|| {
            VoxcastError::InvalidResourceReference(format!("no colormap menu entry {index}"))
        })?;
        log::info!("selected colormap '{}'", entry.label);
        let path = entry.path.clone();
        self.request_colormap(path)
    }

    /// Applies every finished background load. Returns how many were applied.
    pub fn poll_loads(&mut self) -> usize {
        let mut applied = 0;
        for completion in self.loader.drain() {
            if self.apply_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Blocks until every outstanding background load has been applied or
    /// discarded. Returns the first load error, if any.
    pub fn wait_for_loads(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(completion) = self.loader.wait_one() {
            if let Err(err) = self.apply_completion_result(completion) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Uploads an in-memory volume immediately, superseding any pending
    /// volume request.
    pub fn load_volume_descriptor(&mut self, volume: &VolumeDescriptor) -> Result<()> {
        self.loader.supersede_volume();
        self.scheduler.readiness_mut().begin_upload();
        let texels = VolumeTexels::from_descriptor(volume);
        self.install_volume(volume.layout().clone(), &texels)
    }

    /// Uploads an in-memory colormap immediately, superseding any pending
    /// colormap request.
    pub fn load_colormap_descriptor(
        &mut self,
        colormap: &ColormapDescriptor,
        source: &str,
    ) -> Result<()> {
        self.loader.supersede_colormap();
        self.scheduler.readiness_mut().begin_upload();
        self.install_colormap(colormap, source)
    }

    /// Binds one of the built-in colormaps by name.
    pub fn set_colormap_builtin(&mut self, name: &str) -> Result<()> {
        let map = self.color_maps.get(name).ok_or_else(|| {
            VoxcastError::InvalidResourceReference(format!("unknown colormap '{name}'"))
        })?;
        let descriptor = ColormapDescriptor::from_color_map(map, COLOR_MAP_RESOLUTION);
        self.load_colormap_descriptor(&descriptor, name)
    }

    fn apply_completion(&mut self, completion: LoadCompletion) -> bool {
        match self.apply_completion_result(completion) {
            Ok(applied) => applied,
            Err(err) => {
                log::warn!("load failed: {err}");
                false
            }
        }
    }

    /// `Ok(true)` if applied, `Ok(false)` if stale.
    fn apply_completion_result(&mut self, completion: LoadCompletion) -> Result<bool> {
        if !self.loader.is_current(&completion) {
            log::warn!(
                "discarding stale load (generation {})",
                completion.generation()
            );
            self.scheduler.readiness_mut().abort_upload();
            return Ok(false);
        }

        match completion {
            LoadCompletion::Volume { path, result, .. } => match result {
                Ok(PreparedVolume { layout, texels }) => {
                    self.install_volume(layout, &texels)?;
                    Ok(true)
                }
                Err(err) => {
                    self.scheduler.readiness_mut().abort_upload();
                    log::warn!("volume {} not loaded", path.display());
                    Err(err)
                }
            },
            LoadCompletion::Colormap { path, result, .. } => match result {
                Ok(descriptor) => {
                    self.install_colormap(&descriptor, &path.display().to_string())?;
                    Ok(true)
                }
                Err(err) => {
                    self.scheduler.readiness_mut().abort_upload();
                    log::warn!("colormap {} not loaded", path.display());
                    Err(err)
                }
            },
        }
    }

    fn install_volume(&mut self, layout: VolumeLayout, texels: &VolumeTexels) -> Result<()> {
        let handle = match self.device.upload_volume(texels) {
            Ok(handle) => handle,
            Err(err) => {
                self.scheduler.readiness_mut().abort_upload();
                return Err(err.into());
            }
        };
        log::info!(
            "volume '{}' uploaded ({}x{}x{} {})",
            layout.name,
            layout.dims.x,
            layout.dims.y,
            layout.dims.z,
            layout.voxel_type.name()
        );
        self.volume = Some(Arc::new(VolumeSlot { handle, layout }));
        self.scheduler.readiness_mut().volume_uploaded();
        self.needs_redraw = true;
        Ok(())
    }

    fn install_colormap(&mut self, colormap: &ColormapDescriptor, source: &str) -> Result<()> {
        let handle = match self.device.upload_colormap(colormap) {
            Ok(handle) => handle,
            Err(err) => {
                self.scheduler.readiness_mut().abort_upload();
                return Err(err.into());
            }
        };
        log::info!("colormap '{source}' uploaded ({} texels)", colormap.width());
        self.colormap = Some(Arc::new(ColormapSlot {
            handle,
            source: source.to_string(),
        }));
        self.scheduler.readiness_mut().colormap_uploaded();
        self.needs_redraw = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    /// One scheduler tick at `now`: applies finished loads, then renders if
    /// the scene changed and the scheduler says so. Render failures are
    /// logged and skip the frame.
    pub fn tick(&mut self, now: Instant) -> TickDecision {
        self.poll_loads();
        let decision = self.scheduler.tick_with_changes(now, self.needs_redraw);
        if decision == TickDecision::Render {
            if let Err(err) = self.render_frame() {
                log::warn!("frame skipped: {err}");
            }
        }
        decision
    }

    /// Draws one frame now, ignoring the throttle.
    ///
    /// Returns the measured frame time, which also feeds the adaptive
    /// sampling policy.
    pub fn render_frame(&mut self) -> Result<Duration> {
        let (Some(volume), Some(colormap)) = (self.volume.clone(), self.colormap.clone()) else {
            return Err(VoxcastError::InvalidResourceReference(
                "volume or colormap not bound".into(),
            ));
        };
        self.camera.validate()?;

        let aspect = self.device.viewport_aspect();
        let (view, proj) = self.camera.derive_matrices(aspect);
        let frame = FrameParams {
            view,
            proj,
            eye: self.camera.eye,
            volume_dims: volume.layout.dims,
            sampling_rate: self.scheduler.sampling_rate(),
            termination_threshold: self.options.termination_threshold,
            opacity_model: self.options.opacity_model,
            opacity_scale: self.options.opacity_scale,
            jitter: self.options.jitter,
            background: self.options.background_color,
        };

        self.phase = RendererPhase::Rendering;
        let start = Instant::now();
        let drawn = self
            .device
            .draw_volume(&frame, &volume.handle, &colormap.handle);
        self.phase = RendererPhase::Idle;
        drawn?;

        let elapsed = start.elapsed();
        self.frames_rendered += 1;
        self.needs_redraw = false;
        self.scheduler.record_frame_time(elapsed);
        Ok(elapsed)
    }

    /// Marks the frame stale so the next unthrottled tick draws it.
    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// True when the next ready tick will draw.
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Stops the scheduler. Pending loads may still finish but nothing is
    /// drawn afterwards.
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The camera.
    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Mutable camera for navigation. Marks the frame stale.
    pub fn camera_mut(&mut self) -> &mut CameraState {
        self.needs_redraw = true;
        &mut self.camera
    }

    /// The graphics device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable graphics device, e.g. for resizing. Marks the frame stale.
    pub fn device_mut(&mut self) -> &mut D {
        self.needs_redraw = true;
        &mut self.device
    }

    /// The options this context was built with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The frame scheduler.
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Mutable frame scheduler. Marks the frame stale.
    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler {
        self.needs_redraw = true;
        &mut self.scheduler
    }

    /// Current readiness.
    pub fn readiness(&self) -> RenderReadiness {
        self.scheduler.readiness()
    }

    /// Current per-frame phase.
    pub fn phase(&self) -> RendererPhase {
        self.phase
    }

    /// The bound volume, if any.
    pub fn volume(&self) -> Option<&VolumeSlot<D::Volume>> {
        self.volume.as_deref()
    }

    /// The bound colormap, if any.
    pub fn colormap(&self) -> Option<&ColormapSlot<D::Colormap>> {
        self.colormap.as_deref()
    }

    /// Names of the built-in colormaps.
    pub fn builtin_colormaps(&self) -> Vec<&str> {
        self.color_maps.names()
    }

    /// Number of frames drawn successfully.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Background loads not yet applied.
    pub fn pending_loads(&self) -> usize {
        self.loader.in_flight()
    }
}
