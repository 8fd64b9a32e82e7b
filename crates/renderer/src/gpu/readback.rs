use image::RgbaImage;

use crate::error::RenderError;

use super::context::Gpu;
use super::texture::IMAGE_FORMAT;

fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

/// Copies an RGBA8 texture back to the CPU, dropping the row padding the
/// copy requires.
pub fn read_texture(
    gpu: &Gpu,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<RgbaImage, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::Readback("readback size must be positive".into()));
    }
    if texture.format() != IMAGE_FORMAT {
        return Err(RenderError::Readback(format!(
            "unsupported readback format {:?}",
            texture.format()
        )));
    }

    let tight = (width * 4) as usize;
    let padded = padded_bytes_per_row(width);
    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size: u64::from(padded) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
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
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    gpu.device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| RenderError::Readback(err.to_string()))?;
    receiver
        .recv()
        .map_err(|_| RenderError::Readback("map_async callback dropped".into()))?
        .map_err(|err| RenderError::Readback(err.to_string()))?;

    let mut pixels = Vec::with_capacity(tight * height as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks_exact(padded as usize) {
            pixels.extend_from_slice(&row[..tight]);
        }
    }
    staging.unmap();

    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| RenderError::Readback("readback produced a short buffer".into()))
}
