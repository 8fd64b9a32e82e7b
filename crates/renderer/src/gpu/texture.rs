use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::error::RenderError;

use super::context::Gpu;

/// Format every uploaded image and offscreen target uses. Values are stored
/// without sRGB conversion so shader math sees the bytes as-is.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Texture view and sampler pair bound to one texture slot.
#[derive(Clone, Copy)]
pub struct TextureBinding<'a> {
    pub view: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
}

/// Linear filtering with clamp-to-edge addressing. Kernel filters rely on the
/// clamp at the borders and LUT sampling relies on the linear filter.
pub(crate) fn linear_clamp_sampler(gpu: &Gpu, label: &str) -> wgpu::Sampler {
    gpu.device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// An uploaded RGBA image.
pub struct ImageTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
}

impl ImageTexture {
    pub fn from_image(gpu: &Gpu, label: &str, image: &RgbaImage) -> Result<Self, RenderError> {
        let (width, height) = image.dimensions();
        check_dimensions(gpu, label, width, height)?;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: IMAGE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = linear_clamp_sampler(gpu, label);

        tracing::debug!(label, width, height, "uploaded image texture");
        Ok(Self {
            texture,
            view,
            sampler,
            width,
            height,
        })
    }

    /// 1x1 opaque black stand-in used until real content arrives.
    pub fn placeholder(gpu: &Gpu, label: &str) -> Result<Self, RenderError> {
        Self::from_image(gpu, label, &RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255])))
    }

    /// Replaces the contents in place when the size matches, otherwise
    /// reallocates. Returns true when the texture was reallocated.
    pub fn update(&mut self, gpu: &Gpu, label: &str, image: &RgbaImage) -> Result<bool, RenderError> {
        let (width, height) = image.dimensions();
        if (width, height) != (self.width, self.height) {
            let replacement = Self::from_image(gpu, label, image)?;
            self.texture.destroy();
            *self = replacement;
            return Ok(true);
        }

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(false)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn binding(&self) -> TextureBinding<'_> {
        TextureBinding {
            view: &self.view,
            sampler: &self.sampler,
        }
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

fn check_dimensions(gpu: &Gpu, label: &str, width: u32, height: u32) -> Result<(), RenderError> {
    let invalid = |reason: String| RenderError::InvalidImage {
        label: label.to_string(),
        width,
        height,
        reason,
    };
    if width == 0 || height == 0 {
        return Err(invalid("image is empty".to_string()));
    }
    let max = gpu.max_texture_dimension();
    if width > max || height > max {
        return Err(invalid(format!("GPU max texture dimension is {max}")));
    }
    Ok(())
}
