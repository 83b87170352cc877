//! The wgpu rendering engine.

mod pipeline;
mod readback;

use std::sync::Arc;

use voxcast_core::CUBE_STRIP;

use crate::buffer::{create_uniform_buffer, create_vertex_buffer, update_uniform_buffer};
use crate::color_maps::ColormapDescriptor;
use crate::device::{FrameParams, GraphicsDevice};
use crate::error::{RenderError, RenderResult};
use crate::volume_render::{
    create_linear_sampler, create_raymarch_bind_group, create_raymarch_bind_group_layout,
    next_resource_id, GpuColormap, GpuVolume, RaymarchUniforms, VolumeTexels,
};

/// Format of the offscreen target used by headless engines.
///
/// Linear, so stored bytes are the composited colors unchanged.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct BoundPair {
    volume_id: u64,
    colormap_id: u64,
    bind_group: wgpu::BindGroup,
}

/// The rendering engine backed by wgpu.
pub struct RenderEngine {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    /// The render surface (None for headless).
    pub surface: Option<wgpu::Surface<'static>>,
    /// Surface configuration; for headless engines this describes the
    /// offscreen target.
    pub surface_config: wgpu::SurfaceConfiguration,
    /// Current viewport width.
    pub width: u32,
    /// Current viewport height.
    pub height: u32,
    id: u64,
    offscreen: Option<wgpu::Texture>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    cube_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    bound: Option<BoundPair>,
}

impl RenderEngine {
    /// Creates a new windowed render engine.
    pub async fn new_windowed(window: Arc<winit::window::Window>) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = Self::request_device(&adapter, "voxcast device").await?;

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| RenderError::TextureCreationFailed("surface has no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        log::info!(
            "windowed engine on {} ({width}x{height}, {surface_format:?})",
            adapter.get_info().name
        );

        Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            Some(surface),
            surface_config,
        )
    }

    /// Creates a render engine that draws into an offscreen texture.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = Self::request_device(&adapter, "voxcast device (headless)").await?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: HEADLESS_FORMAT,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        log::info!(
            "headless engine on {} ({}x{})",
            adapter.get_info().name,
            surface_config.width,
            surface_config.height
        );

        Self::from_parts(instance, adapter, device, queue, None, surface_config)
    }

    async fn request_device(
        adapter: &wgpu::Adapter,
        label: &str,
    ) -> RenderResult<(wgpu::Device, wgpu::Queue)> {
        let adapter_limits = adapter.limits();
        // Large volumes need the adapter's full 3-D texture range.
        let limits = wgpu::Limits {
            max_texture_dimension_3d: adapter_limits.max_texture_dimension_3d,
            ..wgpu::Limits::default().using_resolution(adapter_limits)
        };
        Ok(adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?)
    }

    fn from_parts(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<wgpu::Surface<'static>>,
        surface_config: wgpu::SurfaceConfiguration,
    ) -> RenderResult<Self> {
        let bind_group_layout = create_raymarch_bind_group_layout(&device);
        let pipeline =
            pipeline::create_raymarch_pipeline(&device, &bind_group_layout, surface_config.format)?;
        let uniform_buffer = create_uniform_buffer(
            &device,
            &RaymarchUniforms::default(),
            Some("raymarch uniforms"),
        );
        let cube_buffer = create_vertex_buffer(&device, &CUBE_STRIP, Some("cube strip"));
        let sampler = create_linear_sampler(&device, "raymarch sampler");

        let offscreen = surface
            .is_none()
            .then(|| Self::create_offscreen(&device, &surface_config));

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            width: surface_config.width,
            height: surface_config.height,
            surface,
            surface_config,
            id: next_resource_id(),
            offscreen,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            cube_buffer,
            sampler,
            bound: None,
        })
    }

    fn create_offscreen(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
    ) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: config.format,
            usage: config.usage,
            view_formats: &[],
        })
    }

    /// Resizes the render target.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.width = width;
        self.height = height;
        self.surface_config.width = width;
        self.surface_config.height = height;

        if let Some(ref surface) = self.surface {
            surface.configure(&self.device, &self.surface_config);
        } else {
            self.offscreen = Some(Self::create_offscreen(&self.device, &self.surface_config));
        }
    }

    /// Returns the current viewport dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Blocks until every submitted command buffer has executed.
    fn wait_for_gpu(&self) -> RenderResult<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|_| RenderError::Timeout)?;
        Ok(())
    }

    fn check_owner(&self, device_id: u64, what: &str) -> RenderResult<()> {
        if device_id == self.id {
            Ok(())
        } else {
            Err(RenderError::InvalidResource(format!(
                "{what} was created by another device"
            )))
        }
    }

    fn bind_group_for(&mut self, volume: &GpuVolume, colormap: &GpuColormap) -> wgpu::BindGroup {
        if let Some(bound) = &self.bound {
            if bound.volume_id == volume.id && bound.colormap_id == colormap.id {
                return bound.bind_group.clone();
            }
        }
        let bind_group = create_raymarch_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            volume,
            colormap,
            &self.sampler,
        );
        self.bound = Some(BoundPair {
            volume_id: volume.id,
            colormap_id: colormap.id,
            bind_group: bind_group.clone(),
        });
        bind_group
    }

    fn encode_raymarch(
        &self,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
        background: glam::Vec3,
    ) -> wgpu::CommandBuffer {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("raymarch encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Raymarch Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(background.x),
                            g: f64::from(background.y),
                            b: f64::from(background.z),
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.cube_buffer.slice(..));
            render_pass.draw(0..voxcast_core::CUBE_STRIP_VERTEX_COUNT, 0..1);
        }

        encoder.finish()
    }

    fn acquire_surface_texture(&self, surface: &wgpu::Surface<'static>) -> RenderResult<wgpu::SurfaceTexture> {
        match surface.get_current_texture() {
            Ok(texture) => Ok(texture),
            Err(wgpu::SurfaceError::Lost) => {
                surface.configure(&self.device, &self.surface_config);
                Err(RenderError::SurfaceLost)
            }
            Err(wgpu::SurfaceError::Outdated) => {
                surface.configure(&self.device, &self.surface_config);
                Err(RenderError::SurfaceOutdated)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(RenderError::OutOfMemory),
            Err(wgpu::SurfaceError::Timeout) => Err(RenderError::Timeout),
            Err(other) => Err(RenderError::TextureCreationFailed(other.to_string())),
        }
    }
}

impl GraphicsDevice for RenderEngine {
    type Volume = GpuVolume;
    type Colormap = GpuColormap;

    fn upload_volume(&mut self, texels: &VolumeTexels) -> RenderResult<GpuVolume> {
        let volume = GpuVolume::upload(&self.device, &self.queue, self.id, texels)?;
        log::info!("uploaded volume {} ({:?})", volume.dims(), texels.format());
        Ok(volume)
    }

    fn upload_colormap(&mut self, colormap: &ColormapDescriptor) -> RenderResult<GpuColormap> {
        let gpu = GpuColormap::upload(&self.device, &self.queue, self.id, colormap)?;
        log::info!("uploaded colormap ({} texels)", gpu.width());
        Ok(gpu)
    }

    fn draw_volume(
        &mut self,
        frame: &FrameParams,
        volume: &GpuVolume,
        colormap: &GpuColormap,
    ) -> RenderResult<()> {
        self.check_owner(volume.device_id, "volume")?;
        self.check_owner(colormap.device_id, "colormap")?;
        if volume.dims() != frame.volume_dims {
            return Err(RenderError::InvalidResource(format!(
                "frame expects volume {} but handle holds {}",
                frame.volume_dims,
                volume.dims()
            )));
        }

        update_uniform_buffer(
            &self.queue,
            &self.uniform_buffer,
            &RaymarchUniforms::from_frame(frame),
        );
        let bind_group = self.bind_group_for(volume, colormap);

        if let Some(surface) = &self.surface {
            let output = self.acquire_surface_texture(surface)?;
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let commands = self.encode_raymarch(&view, &bind_group, frame.background);
            self.queue.submit(std::iter::once(commands));
            self.wait_for_gpu()?;
            output.present();
        } else if let Some(texture) = &self.offscreen {
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let commands = self.encode_raymarch(&view, &bind_group, frame.background);
            self.queue.submit(std::iter::once(commands));
            self.wait_for_gpu()?;
        }

        Ok(())
    }

    fn viewport_aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
