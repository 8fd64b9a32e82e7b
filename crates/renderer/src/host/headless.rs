use image::RgbaImage;

use crate::error::RenderError;
use crate::gpu::{read_texture, Gpu, GpuOptions, OffscreenTarget, IMAGE_FORMAT};
use crate::pipelines::{FrameOutcome, FrameTarget, Renderer, TargetInfo};
use crate::types::RenderMode;

/// Result of a headless run: the last frame and what the renderer reported
/// for it.
#[derive(Debug)]
pub struct HeadlessFrame {
    pub image: RgbaImage,
    pub outcome: FrameOutcome,
}

/// Drives a [`Renderer`] into an offscreen texture and reads the result back.
pub struct HeadlessHost {
    gpu: Gpu,
}

impl HeadlessHost {
    pub fn new(options: &GpuOptions) -> Result<Self, RenderError> {
        let gpu = Gpu::headless(options)?;
        tracing::info!(
            adapter = %gpu.profile().name,
            backend = ?gpu.profile().backend,
            "headless host ready"
        );
        Ok(Self { gpu })
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    /// Initialises `renderer` for a `width`×`height` target, renders
    /// `frames` frames (at least one) and returns the last one. The renderer
    /// is released before returning, on success and failure alike.
    pub fn render(
        &self,
        renderer: &mut dyn Renderer,
        width: u32,
        height: u32,
        frames: u32,
    ) -> Result<HeadlessFrame, RenderError> {
        let result = self.render_frames(renderer, width, height, frames.max(1));
        renderer.release();
        result
    }

    fn render_frames(
        &self,
        renderer: &mut dyn Renderer,
        width: u32,
        height: u32,
        frames: u32,
    ) -> Result<HeadlessFrame, RenderError> {
        let mut target = OffscreenTarget::new(&self.gpu, "headless target", IMAGE_FORMAT);
        target.resize(&self.gpu, width, height)?;

        renderer.on_init(
            &self.gpu,
            TargetInfo {
                format: IMAGE_FORMAT,
                width,
                height,
            },
        )?;

        let view = target.binding().ok_or(RenderError::NotInitialized)?.view;
        let frame = FrameTarget {
            view,
            width,
            height,
            mode: RenderMode::Continuous,
        };
        let mut outcome = FrameOutcome::Waiting;
        for index in 0..frames {
            outcome = renderer.on_frame(&self.gpu, &frame)?;
            tracing::trace!(frame = index, ?outcome, "headless frame");
        }

        let texture = target.texture().ok_or(RenderError::NotInitialized)?;
        let image = read_texture(&self.gpu, texture, width, height)?;
        target.release();
        Ok(HeadlessFrame { image, outcome })
    }
}
