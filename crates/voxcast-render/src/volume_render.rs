//! GPU resources for volume ray marching: texel preparation, textures and
//! the uniform block shared with `raymarch.wgsl`.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{UVec3, Vec3};
use half::f16;
use voxcast_core::{step_size, VolumeDescriptor, VoxelType};

use crate::color_maps::ColormapDescriptor;
use crate::device::FrameParams;
use crate::error::{RenderError, RenderResult};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// GPU storage format of volume texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelFormat {
    /// One normalized byte per voxel.
    R8Unorm,
    /// One half-float per voxel, already normalized to `[0, 1]`.
    R16Float,
}

impl TexelFormat {
    /// Bytes per texel.
    #[must_use]
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TexelFormat::R8Unorm => 1,
            TexelFormat::R16Float => 2,
        }
    }

    /// Matching wgpu texture format. Both are filterable without extra
    /// device features.
    #[must_use]
    pub fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            TexelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TexelFormat::R16Float => wgpu::TextureFormat::R16Float,
        }
    }
}

/// Voxel data converted to an uploadable texel layout.
///
/// Built off the render thread so uploads are a single `write_texture`.
#[derive(Debug, Clone)]
pub struct VolumeTexels {
    dims: UVec3,
    format: TexelFormat,
    data: Vec<u8>,
}

impl VolumeTexels {
    /// Converts a volume. 8-bit volumes are copied as-is; 16-bit and float
    /// volumes are normalized and stored as `f16`.
    #[must_use]
    pub fn from_descriptor(volume: &VolumeDescriptor) -> Self {
        let dims = volume.dims();
        match volume.voxel_type() {
            VoxelType::Uint8 => Self {
                dims,
                format: TexelFormat::R8Unorm,
                data: volume.bytes().to_vec(),
            },
            VoxelType::Uint16 | VoxelType::Float32 => {
                let count = volume.layout().voxel_count();
                let mut data = Vec::with_capacity(count * 2);
                for i in 0..count {
                    let value = f16::from_f32(volume.normalized_at(i));
                    data.extend_from_slice(&value.to_le_bytes());
                }
                Self {
                    dims,
                    format: TexelFormat::R16Float,
                    data,
                }
            }
        }
    }

    /// Grid dimensions.
    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    /// Texel format.
    #[must_use]
    pub fn format(&self) -> TexelFormat {
        self.format
    }

    /// Texel bytes, x fastest.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Uniforms for the ray-march pass.
///
/// Layout matches `RaymarchUniforms` in `raymarch.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct RaymarchUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Eye position in the volume's unit-cube space.
    pub eye_object: [f32; 3],
    pub step_size: f32,
    pub volume_scale: [f32; 3],
    pub sampling_rate: f32,
    pub volume_dims: [f32; 3],
    pub termination_threshold: f32,
    pub opacity_model: u32,
    pub opacity_scale: f32,
    pub jitter: u32,
    pub _pad: u32,
}

impl Default for RaymarchUniforms {
    fn default() -> Self {
        Self {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            eye_object: [0.5, 0.5, 2.0],
            step_size: step_size(1, 1.0),
            volume_scale: [1.0; 3],
            sampling_rate: 1.0,
            volume_dims: [1.0; 3],
            termination_threshold: voxcast_core::DEFAULT_TERMINATION_THRESHOLD,
            opacity_model: 0,
            opacity_scale: 1.0,
            jitter: 0,
            _pad: 0,
        }
    }
}

impl RaymarchUniforms {
    /// Builds the uniform block for one frame.
    #[must_use]
    pub fn from_frame(frame: &FrameParams) -> Self {
        let scale = volume_scale(frame.volume_dims);
        let eye_object = world_to_volume(frame.eye, scale);
        let max_dim = frame.volume_dims.max_element();
        Self {
            view_proj: (frame.proj * frame.view).to_cols_array_2d(),
            eye_object: eye_object.to_array(),
            step_size: step_size(max_dim, frame.sampling_rate),
            volume_scale: scale.to_array(),
            sampling_rate: frame.sampling_rate,
            volume_dims: frame.volume_dims.as_vec3().to_array(),
            termination_threshold: frame.termination_threshold,
            opacity_model: frame.opacity_model.to_index(),
            opacity_scale: frame.opacity_scale,
            jitter: u32::from(frame.jitter),
            _pad: 0,
        }
    }
}

/// World-space size of the volume box; the longest axis is 1.
#[must_use]
pub fn volume_scale(dims: UVec3) -> Vec3 {
    let d = dims.as_vec3();
    d / d.max_element().max(1.0)
}

/// Maps a world position into the unit cube of a box of size `scale`
/// centered on `(0.5, 0.5, 0.5)`.
#[must_use]
pub fn world_to_volume(p: Vec3, scale: Vec3) -> Vec3 {
    let translation = Vec3::splat(0.5) - scale * 0.5;
    (p - translation) / scale
}

/// A volume resident on the GPU.
pub struct GpuVolume {
    pub(crate) id: u64,
    pub(crate) device_id: u64,
    dims: UVec3,
    _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

impl GpuVolume {
    /// Uploads `texels` as a 3-D texture.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        device_id: u64,
        texels: &VolumeTexels,
    ) -> RenderResult<Self> {
        let dims = texels.dims();
        let limit = device.limits().max_texture_dimension_3d;
        if dims.max_element() > limit {
            return Err(RenderError::VolumeTooLarge { dims, limit });
        }
        if dims.min_element() == 0 {
            return Err(RenderError::TextureCreationFailed(
                "volume has a zero dimension".into(),
            ));
        }

        let size = wgpu::Extent3d {
            width: dims.x,
            height: dims.y,
            depth_or_array_layers: dims.z,
        };
        let format = texels.format();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volume texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: format.wgpu_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texels.data(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dims.x * format.bytes_per_texel()),
                rows_per_image: Some(dims.y),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });

        Ok(Self {
            id: next_resource_id(),
            device_id,
            dims,
            _texture: texture,
            view,
        })
    }

    /// Grid dimensions.
    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }
}

/// A colormap resident on the GPU, stored as a `width x 1` 2-D texture so
/// it can be sampled with an explicit LOD inside the march loop.
pub struct GpuColormap {
    pub(crate) id: u64,
    pub(crate) device_id: u64,
    width: u32,
    _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

impl GpuColormap {
    /// Uploads `colormap` as a linear lookup texture, sampled as stored.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        device_id: u64,
        colormap: &ColormapDescriptor,
    ) -> RenderResult<Self> {
        let width = colormap.width();
        let limit = device.limits().max_texture_dimension_2d;
        if width > limit {
            return Err(RenderError::TextureCreationFailed(format!(
                "colormap width {width} exceeds limit {limit}"
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height: 1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("colormap texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            colormap.rgba(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: None,
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            id: next_resource_id(),
            device_id,
            width,
            _texture: texture,
            view,
        })
    }

    /// Number of texels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
}

/// Creates the linear clamp-to-edge sampler used for both textures.
pub fn create_linear_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Bind group layout: uniforms, volume texture + sampler, colormap
/// texture + sampler.
pub fn create_raymarch_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding, view_dimension| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    };
    let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("raymarch bind group layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(
                        std::mem::size_of::<RaymarchUniforms>() as u64
                    ),
                },
                count: None,
            },
            texture_entry(1, wgpu::TextureViewDimension::D3),
            sampler_entry(2),
            texture_entry(3, wgpu::TextureViewDimension::D2),
            sampler_entry(4),
        ],
    })
}

/// Binds one volume and one colormap for drawing.
pub fn create_raymarch_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    volume: &GpuVolume,
    colormap: &GpuColormap,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("raymarch bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&volume.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&colormap.view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
