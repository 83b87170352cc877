//! Application window and event loop management.

use std::sync::Arc;
use std::time::Instant;

use pollster::FutureExt;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use voxcast_core::{Options, Result, VoxcastError};
use voxcast_render::{RenderEngine, DEFAULT_COLOR_MAP};

use crate::context::RendererContext;

/// The viewer application state.
pub struct App {
    options: Options,
    window: Option<Arc<Window>>,
    context: Option<RendererContext<RenderEngine>>,
    close_requested: bool,
    // Physical mouse state for camera control
    mouse_pos: (f64, f64),
    left_mouse_down: bool,
    right_mouse_down: bool,
    shift_down: bool,
    // Current menu positions
    volume_index: usize,
    colormap_index: usize,
}

impl App {
    /// Creates a new application.
    pub fn new(options: Options) -> Self {
        Self {
            options,
            window: None,
            context: None,
            close_requested: false,
            mouse_pos: (0.0, 0.0),
            left_mouse_down: false,
            right_mouse_down: false,
            shift_down: false,
            volume_index: 0,
            colormap_index: 0,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (width, height) = self.options.window_size;
        let window_attributes = Window::default_attributes()
            .with_title("voxcast")
            .with_inner_size(LogicalSize::new(width, height));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .map_err(|e| VoxcastError::RenderError(format!("failed to create window: {e}")))?,
        );

        let engine = RenderEngine::new_windowed(window.clone()).block_on()?;
        let mut context = RendererContext::new(engine, self.options.clone())?;

        if self.options.volumes.is_empty() {
            log::warn!("volume menu is empty; nothing to render until a volume is requested");
        } else {
            context.select_volume(self.volume_index)?;
        }
        if self.options.colormaps.is_empty() {
            context.set_colormap_builtin(DEFAULT_COLOR_MAP)?;
        } else {
            context.select_colormap(self.colormap_index)?;
        }

        self.window = Some(window);
        self.context = Some(context);
        Ok(())
    }

    fn cycle_volume(&mut self) {
        let count = self.options.volumes.len();
        let Some(context) = &mut self.context else {
            return;
        };
        if count == 0 {
            return;
        }
        self.volume_index = (self.volume_index + 1) % count;
        if let Err(err) = context.select_volume(self.volume_index) {
            log::warn!("volume selection failed: {err}");
        }
    }

    fn cycle_colormap(&mut self) {
        let Some(context) = &mut self.context else {
            return;
        };
        let result = if self.options.colormaps.is_empty() {
            let names: Vec<String> = context
                .builtin_colormaps()
                .into_iter()
                .map(str::to_string)
                .collect();
            self.colormap_index = (self.colormap_index + 1) % names.len().max(1);
            match names.get(self.colormap_index) {
                Some(name) => context.set_colormap_builtin(name),
                None => Ok(()),
            }
        } else {
            self.colormap_index = (self.colormap_index + 1) % self.options.colormaps.len();
            context.select_colormap(self.colormap_index)
        };
        if let Err(err) = result {
            log::warn!("colormap selection failed: {err}");
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            log::error!("failed to start viewer: {err}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                if let Some(context) = &mut self.context {
                    context.device_mut().resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(context) = &mut self.context {
                    context.request_redraw();
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.shift_down = modifiers.state().shift_key();
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.left_mouse_down = pressed,
                    MouseButton::Right => self.right_mouse_down = pressed,
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let delta_x = (position.x - self.mouse_pos.0) as f32;
                let delta_y = (position.y - self.mouse_pos.1) as f32;
                self.mouse_pos = (position.x, position.y);

                // Left drag orbits; shift+left or right drag pans
                let is_rotate = self.left_mouse_down && !self.shift_down;
                let is_pan = (self.left_mouse_down && self.shift_down) || self.right_mouse_down;
                if let Some(context) = self.context.as_mut().filter(|_| is_rotate || is_pan) {
                    let camera = context.camera_mut();
                    if is_rotate {
                        camera.orbit(delta_x * 0.01, delta_y * 0.01);
                    } else {
                        let scale = camera.distance() * 0.002;
                        camera.pan(-delta_x * scale, delta_y * scale);
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(context) = &mut self.context {
                    let scroll = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                    };
                    let camera = context.camera_mut();
                    let scale = camera.distance() * 0.1;
                    camera.zoom(scroll * scale);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape) => self.close_requested = true,
                        PhysicalKey::Code(KeyCode::KeyV) => self.cycle_volume(),
                        PhysicalKey::Code(KeyCode::KeyC) => self.cycle_colormap(),
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        if self.close_requested {
            if let Some(context) = &mut self.context {
                context.stop();
            }
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(context) = &mut self.context else {
            return;
        };
        let now = Instant::now();
        if context.scheduler().next_deadline(now).is_some_and(|d| d <= now) {
            context.tick(now);
        }
        match context.scheduler().next_deadline(Instant::now()) {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.exit(),
        }
    }
}

/// Opens a window and runs the viewer until it is closed.
pub fn run(options: Options) -> Result<()> {
    let _ = env_logger::try_init();
    options.validate()?;

    let event_loop = EventLoop::new()
        .map_err(|e| VoxcastError::RenderError(format!("failed to create event loop: {e}")))?;
    let mut app = App::new(options);

    event_loop
        .run_app(&mut app)
        .map_err(|e| VoxcastError::RenderError(format!("event loop error: {e}")))
}
