//! Renderer context tests against a recording graphics device.
//!
//! None of these need a GPU.

use std::sync::Arc;
use std::time::{Duration, Instant};

use voxcast::*;

#[derive(Debug, Clone)]
struct MockVolume {
    id: u64,
    dims: UVec3,
}

#[derive(Debug, Clone)]
struct MockColormap {
    id: u64,
}

#[derive(Debug, Clone)]
struct DrawRecord {
    volume_id: u64,
    volume_dims: UVec3,
    frame_dims: UVec3,
    colormap_id: u64,
    sampling_rate: f32,
}

#[derive(Default)]
struct RecordingDevice {
    next_id: u64,
    max_dimension: Option<u32>,
    /// How long each draw blocks, like a GPU that is still busy.
    draw_cost: Duration,
    draws: Vec<DrawRecord>,
}

impl GraphicsDevice for RecordingDevice {
    type Volume = MockVolume;
    type Colormap = MockColormap;

    fn upload_volume(&mut self, texels: &VolumeTexels) -> RenderResult<MockVolume> {
        let dims = texels.dims();
        if let Some(limit) = self.max_dimension {
            if dims.max_element() > limit {
                return Err(RenderError::VolumeTooLarge { dims, limit });
            }
        }
        self.next_id += 1;
        Ok(MockVolume {
            id: self.next_id,
            dims,
        })
    }

    fn upload_colormap(&mut self, _colormap: &ColormapDescriptor) -> RenderResult<MockColormap> {
        self.next_id += 1;
        Ok(MockColormap { id: self.next_id })
    }

    fn draw_volume(
        &mut self,
        frame: &FrameParams,
        volume: &MockVolume,
        colormap: &MockColormap,
    ) -> RenderResult<()> {
        if !self.draw_cost.is_zero() {
            std::thread::sleep(self.draw_cost);
        }
        self.draws.push(DrawRecord {
            volume_id: volume.id,
            volume_dims: volume.dims,
            frame_dims: frame.volume_dims,
            colormap_id: colormap.id,
            sampling_rate: frame.sampling_rate,
        });
        Ok(())
    }

    fn viewport_aspect(&self) -> f32 {
        4.0 / 3.0
    }
}

fn ramp(name: &str, dims: UVec3) -> VolumeDescriptor {
    VolumeDescriptor::from_fn(name, dims, |p| p.x)
}

fn context_with(files: &[(&str, Vec<u8>)], options: Options) -> RendererContext<RecordingDevice> {
    let fetcher = MemoryFetcher::new();
    for (path, bytes) in files {
        fetcher.insert(options.data_dir.join(path), bytes.clone());
    }
    RendererContext::with_fetcher(RecordingDevice::default(), options, Arc::new(fetcher))
        .expect("valid options")
}

fn ready_context() -> RendererContext<RecordingDevice> {
    let mut context = context_with(&[], Options::default());
    context
        .load_volume_descriptor(&ramp("first", UVec3::new(4, 4, 4)))
        .unwrap();
    context.set_colormap_builtin("viridis").unwrap();
    context
}

#[test]
fn not_ready_until_volume_and_colormap_bound() {
    let mut context = context_with(&[], Options::default());
    let start = Instant::now();
    assert_eq!(context.tick(start), TickDecision::NotReady);

    context
        .load_volume_descriptor(&ramp("only-volume", UVec3::splat(2)))
        .unwrap();
    assert_eq!(context.readiness(), RenderReadiness::NotReady);
    assert_eq!(
        context.tick(start + Duration::from_millis(40)),
        TickDecision::NotReady
    );
    assert!(context.device().draws.is_empty());
    assert!(matches!(
        context.render_frame(),
        Err(VoxcastError::InvalidResourceReference(_))
    ));

    context.set_colormap_builtin(DEFAULT_COLOR_MAP).unwrap();
    assert_eq!(context.readiness(), RenderReadiness::Ready);
    assert_eq!(
        context.tick(start + Duration::from_millis(80)),
        TickDecision::Render
    );
    assert_eq!(context.device().draws.len(), 1);
    assert_eq!(context.frames_rendered(), 1);
}

#[test]
fn frame_params_follow_bound_volume_and_options() {
    let mut context = ready_context();
    context.render_frame().unwrap();
    let draw = &context.device().draws[0];
    assert_eq!(draw.frame_dims, UVec3::new(4, 4, 4));
    assert_eq!(draw.sampling_rate, 1.0);
    assert_eq!(context.phase(), RendererPhase::Idle);
}

#[test]
fn swap_keeps_old_volume_until_new_one_is_uploaded() {
    let mut context = context_with(
        &[("second_8x4x2_uint8.raw", vec![128; 64])],
        Options::default(),
    );
    context
        .load_volume_descriptor(&ramp("first", UVec3::new(4, 4, 4)))
        .unwrap();
    context.set_colormap_builtin("viridis").unwrap();

    context.request_volume("second_8x4x2_uint8.raw").unwrap();
    assert_eq!(context.readiness(), RenderReadiness::Uploading);

    // Still drawing the first volume while the second one is in flight.
    context.render_frame().unwrap();
    assert_eq!(context.volume().unwrap().layout().name, "first");

    context.wait_for_loads().unwrap();
    assert_eq!(context.readiness(), RenderReadiness::Ready);
    assert_eq!(context.volume().unwrap().layout().name, "second");
    context.render_frame().unwrap();

    let draws = &context.device().draws;
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].volume_dims, UVec3::new(4, 4, 4));
    assert_eq!(draws[1].volume_dims, UVec3::new(8, 4, 2));
    assert_ne!(draws[0].volume_id, draws[1].volume_id);
    // A frame never pairs one volume's handle with another's dimensions.
    for draw in draws {
        assert_eq!(draw.volume_dims, draw.frame_dims);
    }
}

#[test]
fn stale_completions_are_discarded() {
    let mut context = context_with(
        &[
            ("older_2x2x2_uint8.raw", vec![1; 8]),
            ("newer_3x3x3_uint8.raw", vec![2; 27]),
        ],
        Options::default(),
    );
    context.set_colormap_builtin("blues").unwrap();
    context.request_volume("older_2x2x2_uint8.raw").unwrap();
    context.request_volume("newer_3x3x3_uint8.raw").unwrap();
    context.wait_for_loads().unwrap();

    assert_eq!(context.volume().unwrap().layout().name, "newer");
    assert_eq!(context.readiness(), RenderReadiness::Ready);
    assert_eq!(context.pending_loads(), 0);
}

#[test]
fn synchronous_load_supersedes_pending_request() {
    let mut context = context_with(
        &[("slow_2x2x2_uint8.raw", vec![1; 8])],
        Options::default(),
    );
    context.set_colormap_builtin("reds").unwrap();
    context.request_volume("slow_2x2x2_uint8.raw").unwrap();
    context
        .load_volume_descriptor(&ramp("direct", UVec3::splat(5)))
        .unwrap();
    context.wait_for_loads().unwrap();

    assert_eq!(context.volume().unwrap().layout().name, "direct");
    assert_eq!(context.readiness(), RenderReadiness::Ready);
}

#[test]
fn failed_load_keeps_prior_volume() {
    let mut context = context_with(
        &[("broken_2x2x2_uint8.raw", vec![0; 7])],
        Options::default(),
    );
    context
        .load_volume_descriptor(&ramp("good", UVec3::splat(2)))
        .unwrap();
    context.set_colormap_builtin("viridis").unwrap();

    context.request_volume("broken_2x2x2_uint8.raw").unwrap();
    let err = context.wait_for_loads().unwrap_err();
    assert!(matches!(
        err,
        VoxcastError::Parse(ParseError::SizeMismatch {
            expected: 8,
            actual: 7
        })
    ));
    assert_eq!(context.volume().unwrap().layout().name, "good");
    assert_eq!(context.readiness(), RenderReadiness::Ready);
}

#[test]
fn missing_file_leaves_context_not_ready() {
    let mut context = context_with(&[], Options::default());
    context.set_colormap_builtin("viridis").unwrap();
    context.request_volume("absent_4x4x4_uint8.raw").unwrap();
    let err = context.wait_for_loads().unwrap_err();
    assert!(matches!(err, VoxcastError::FetchFailure { .. }));
    assert_eq!(context.readiness(), RenderReadiness::NotReady);
}

#[test]
fn undecodable_colormap_is_reported() {
    let mut context = context_with(&[("garbage.png", vec![1, 2, 3, 4])], Options::default());
    context.request_colormap("garbage.png").unwrap();
    let err = context.wait_for_loads().unwrap_err();
    assert!(matches!(err, VoxcastError::Decode(_)));
    assert!(context.colormap().is_none());
}

#[test]
fn oversized_volume_upload_keeps_prior_state() {
    let mut context = ready_context();
    context.device_mut().max_dimension = Some(8);
    let err = context
        .load_volume_descriptor(&ramp("huge", UVec3::new(16, 2, 2)))
        .unwrap_err();
    assert!(matches!(err, VoxcastError::RenderError(_)));
    assert_eq!(context.volume().unwrap().layout().name, "first");
    assert_eq!(context.readiness(), RenderReadiness::Ready);
}

#[test]
fn throttle_limits_render_count() {
    let options = Options {
        tick_interval_ms: 10,
        throttle_interval_ms: 33,
        ..Options::default()
    };
    let mut context = context_with(&[], options);
    context
        .load_volume_descriptor(&ramp("throttled", UVec3::splat(2)))
        .unwrap();
    context.set_colormap_builtin("viridis").unwrap();

    let start = Instant::now();
    let renders = (0..10)
        .map(|i| {
            context.camera_mut().orbit(0.01, 0.0);
            context.tick(start + Duration::from_millis(10 * i))
        })
        .filter(|decision| *decision == TickDecision::Render)
        .count();
    assert!(renders <= 4, "rendered {renders} times");
    assert_eq!(context.device().draws.len(), renders);
}

#[test]
fn idle_ticks_draw_once_until_something_changes() {
    let mut context = ready_context();
    let start = Instant::now();
    assert!(context.needs_redraw());

    assert_eq!(context.tick(start), TickDecision::Render);
    assert_eq!(
        context.tick(start + Duration::from_millis(100)),
        TickDecision::Unchanged
    );
    assert_eq!(context.device().draws.len(), 1);
    assert!(!context.needs_redraw());

    context.camera_mut().orbit(0.1, 0.0);
    assert_eq!(
        context.tick(start + Duration::from_millis(200)),
        TickDecision::Render
    );
    assert_eq!(context.device().draws.len(), 2);

    // Binding a new colormap and resizing both count as changes.
    context.set_colormap_builtin("blues").unwrap();
    assert_eq!(
        context.tick(start + Duration::from_millis(300)),
        TickDecision::Render
    );
    context.device_mut();
    assert_eq!(
        context.tick(start + Duration::from_millis(400)),
        TickDecision::Render
    );
    assert_eq!(
        context.tick(start + Duration::from_millis(500)),
        TickDecision::Unchanged
    );
    assert_eq!(context.device().draws.len(), 4);
}

#[test]
fn degenerate_camera_skips_frame() {
    let mut context = ready_context();
    let center = context.camera().center;
    context.camera_mut().eye = center;

    assert_eq!(context.tick(Instant::now()), TickDecision::Render);
    assert!(context.device().draws.is_empty());
    assert!(matches!(
        context.render_frame(),
        Err(VoxcastError::DegenerateCamera(_))
    ));
}

#[test]
fn stopped_context_never_draws() {
    let mut context = ready_context();
    context.stop();
    assert_eq!(context.tick(Instant::now()), TickDecision::Stopped);
    assert!(context.device().draws.is_empty());
    assert_eq!(context.scheduler().next_deadline(Instant::now()), None);
}

#[test]
fn fast_frames_raise_sampling_rate() {
    let mut context = ready_context();
    for _ in 0..5 {
        context.render_frame().unwrap();
    }
    let draws = &context.device().draws;
    let first = draws[0].sampling_rate;
    let last = draws[draws.len() - 1].sampling_rate;
    assert!(last > first);
    assert!(last <= context.options().max_sampling_rate);
}

#[test]
fn slow_frames_lower_sampling_rate() {
    let mut context = ready_context();
    // Over the default 32 ms target.
    context.device_mut().draw_cost = Duration::from_millis(40);
    for _ in 0..3 {
        let elapsed = context.render_frame().unwrap();
        assert!(elapsed >= Duration::from_millis(40));
    }
    let draws = &context.device().draws;
    let first = draws[0].sampling_rate;
    let last = draws[draws.len() - 1].sampling_rate;
    assert!(last < first, "rate went from {first} to {last}");
    assert!(context.scheduler().sampling_rate() >= context.options().min_sampling_rate);
}

#[test]
fn menu_selection_resolves_against_data_dir() {
    let mut options = Options::default();
    options.data_dir = "volumes".into();
    options
        .volumes
        .push(MenuEntry::new("Tiny", "tiny_2x2x2_uint8.raw"));
    let mut context = context_with(&[("tiny_2x2x2_uint8.raw", vec![9; 8])], options);

    context.select_volume(0).unwrap();
    context.wait_for_loads().unwrap();
    assert_eq!(context.volume().unwrap().layout().name, "tiny");

    assert!(matches!(
        context.select_volume(3),
        Err(VoxcastError::InvalidResourceReference(_))
    ));
    assert!(matches!(
        context.set_colormap_builtin("no-such-map"),
        Err(VoxcastError::InvalidResourceReference(_))
    ));
}

#[test]
fn invalid_options_are_rejected() {
    let options = Options {
        min_sampling_rate: 2.0,
        max_sampling_rate: 1.0,
        ..Options::default()
    };
    let result = RendererContext::new(RecordingDevice::default(), options);
    assert!(matches!(result, Err(VoxcastError::InvalidOption { .. })));
}
