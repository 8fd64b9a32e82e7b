use crate::error::RenderError;

use super::context::Gpu;
use super::texture::{linear_clamp_sampler, TextureBinding};

struct Attachment {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Colour-renderable texture that a pass draws into and a later pass samples.
///
/// The target starts unallocated; [`OffscreenTarget::resize`] allocates it and
/// must be called on first use and whenever the visible surface changes size.
pub struct OffscreenTarget {
    label: String,
    format: wgpu::TextureFormat,
    sampler: wgpu::Sampler,
    attachment: Option<Attachment>,
    generation: u64,
}

impl OffscreenTarget {
    pub fn new(gpu: &Gpu, label: &str, format: wgpu::TextureFormat) -> Self {
        Self {
            label: label.to_string(),
            format,
            sampler: linear_clamp_sampler(gpu, label),
            attachment: None,
            generation: 0,
        }
    }

    /// Reallocates the attachment at `width` x `height`. Returns false and
    /// leaves the current attachment alone when the size is unchanged.
    ///
    /// On failure the previous attachment has already been released and the
    /// target is left unallocated.
    pub fn resize(&mut self, gpu: &Gpu, width: u32, height: u32) -> Result<bool, RenderError> {
        if let Some(current) = &self.attachment {
            if current.width == width && current.height == height {
                return Ok(false);
            }
        }

        if let Some(stale) = self.attachment.take() {
            stale.texture.destroy();
        }
        self.check_complete(gpu, width, height)?;

        let (texture, error) = gpu.validated(|| {
            gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&self.label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: self.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        });
        if let Some(error) = error {
            texture.destroy();
            return Err(self.incomplete(width, height, error.to_string()));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.attachment = Some(Attachment {
            texture,
            view,
            width,
            height,
        });
        self.generation += 1;
        tracing::debug!(
            label = %self.label,
            width,
            height,
            generation = self.generation,
            "allocated offscreen target"
        );
        Ok(true)
    }

    fn check_complete(&self, gpu: &Gpu, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(self.incomplete(width, height, "zero-sized attachment".to_string()));
        }
        let max = gpu.max_texture_dimension();
        if width > max || height > max {
            return Err(self.incomplete(
                width,
                height,
                format!("exceeds GPU max texture dimension {max}"),
            ));
        }
        if !gpu.supports_render_attachment(self.format) {
            return Err(self.incomplete(
                width,
                height,
                format!("{:?} is not colour-renderable on this adapter", self.format),
            ));
        }
        Ok(())
    }

    fn incomplete(&self, width: u32, height: u32, reason: String) -> RenderError {
        RenderError::IncompleteTarget {
            label: self.label.clone(),
            width,
            height,
            reason,
        }
    }

    /// Starts a pass that clears the target and draws into it. Dropping the
    /// returned pass ends it.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        clear: wgpu::Color,
    ) -> Result<wgpu::RenderPass<'e>, RenderError> {
        let attachment = self.attachment.as_ref().ok_or(RenderError::NotInitialized)?;
        Ok(begin_clear_pass(encoder, &self.label, &attachment.view, clear))
    }

    /// Sampling handle for the current attachment. The borrow ties it to this
    /// target, so it cannot outlive a resize.
    pub fn binding(&self) -> Option<TextureBinding<'_>> {
        self.attachment.as_ref().map(|attachment| TextureBinding {
            view: &attachment.view,
            sampler: &self.sampler,
        })
    }

    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.attachment.as_ref().map(|attachment| &attachment.texture)
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.attachment
            .as_ref()
            .map(|attachment| (attachment.width, attachment.height))
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Number of allocations so far; unchanged by no-op resizes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn release(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.texture.destroy();
        }
    }
}

/// Begins a single-attachment pass that clears `view` to `clear`.
pub(crate) fn begin_clear_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    view: &wgpu::TextureView,
    clear: wgpu::Color,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}
