use super::RenderEngine;
use crate::error::{RenderError, RenderResult};

impl RenderEngine {
    fn aligned_bytes_per_row(width: u32) -> u32 {
        let bytes_per_pixel = 4u32; // RGBA8
        let unaligned = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unaligned.div_ceil(align) * align
    }

    /// Reads the offscreen target back as tightly packed RGBA8.
    ///
    /// Only headless engines have an offscreen target; windowed engines
    /// return [`RenderError::ReadbackFailed`].
    pub fn read_pixels(&self) -> RenderResult<Vec<u8>> {
        let texture = self.offscreen.as_ref().ok_or(RenderError::ReadbackFailed)?;

        let bytes_per_row = Self::aligned_bytes_per_row(self.width);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: u64::from(bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|_| RenderError::Timeout)?;
        rx.recv()
            .map_err(|_| RenderError::ReadbackFailed)?
            .map_err(|_| RenderError::ReadbackFailed)?;

        // Strip row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * self.height as usize);
        for row in 0..self.height {
            let start = (row * bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }

        drop(data);
        buffer.unmap();

        Ok(pixels)
    }
}
