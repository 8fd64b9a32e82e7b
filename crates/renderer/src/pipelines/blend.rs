use std::sync::Arc;

use image::RgbaImage;

use crate::error::RenderError;
use crate::gpu::{Gpu, ImageTexture, QuadBuffer, ShaderProgram};
use crate::library::{ProgramSpec, ShaderLibrary};
use crate::params::BlendParameters;
use crate::sync::{ParamSlot, PendingSlot};
use crate::types::{BlendMode, RowOrder};

use super::capture::CaptureStage;
use super::{clear_frame, FrameOutcome, FrameTarget, Renderer, TargetInfo};

#[derive(Debug, Default)]
pub struct BlendControls {
    params: ParamSlot<BlendParameters>,
    base: PendingSlot<RgbaImage>,
    overlay: PendingSlot<RgbaImage>,
}

impl BlendControls {
    pub fn new(params: BlendParameters) -> Self {
        Self {
            params: ParamSlot::new(params),
            ..Self::default()
        }
    }

    pub fn parameters(&self) -> BlendParameters {
        self.params.get()
    }

    pub fn set_mode(&self, mode: BlendMode) {
        self.params.update(|params| params.with_mode(mode));
    }

    pub fn cycle_mode(&self) -> BlendMode {
        self.params
            .update(|params| params.with_mode(params.mode().next()))
            .mode()
    }

    /// Sets the mix factor; values outside `[0, 1]` are clamped.
    pub fn set_alpha(&self, alpha: f32) -> f32 {
        self.params.update(|params| params.with_alpha(alpha)).alpha()
    }

    /// Moves the mix factor by `delta`, clamping at the ends.
    pub fn nudge_alpha(&self, delta: f32) -> f32 {
        self.params
            .update(|params| params.with_alpha(params.alpha() + delta))
            .alpha()
    }

    pub fn load_base(&self, image: RgbaImage) {
        self.base.offer(image);
    }

    pub fn load_overlay(&self, image: RgbaImage) {
        self.overlay.offer(image);
    }
}

struct BlendResources {
    capture: CaptureStage,
    program: ShaderProgram,
    quad: QuadBuffer,
    base: Option<ImageTexture>,
    overlay: Option<ImageTexture>,
}

/// Composites an overlay image onto a base image with one of the
/// [`BlendMode`]s.
pub struct BlendPipeline {
    controls: Arc<BlendControls>,
    library: Arc<ShaderLibrary>,
    resources: Option<BlendResources>,
}

impl BlendPipeline {
    pub fn new(controls: Arc<BlendControls>, library: Arc<ShaderLibrary>) -> Self {
        Self {
            controls,
            library,
            resources: None,
        }
    }
}

fn upload(gpu: &Gpu, label: &str, slot: &mut Option<ImageTexture>, image: &RgbaImage) {
    let result = match slot.as_mut() {
        Some(texture) => texture.update(gpu, label, image).map(|_| ()),
        None => ImageTexture::from_image(gpu, label, image).map(|texture| *slot = Some(texture)),
    };
    if let Err(err) = result {
        tracing::warn!(label, error = %err, "blend image rejected; keeping previous image");
    }
}

impl Renderer for BlendPipeline {
    fn on_init(&mut self, gpu: &Gpu, target: TargetInfo) -> Result<(), RenderError> {
        self.release();
        let capture = CaptureStage::new(
            gpu,
            &self.library,
            RowOrder::TopDown,
            target.width,
            target.height,
        )?;
        let program = ShaderProgram::new(gpu, &self.library, &ProgramSpec::BLEND, target.format)?;
        self.resources = Some(BlendResources {
            capture,
            program,
            quad: QuadBuffer::for_rows(gpu, RowOrder::TopDown),
            base: None,
            overlay: None,
        });
        tracing::info!(width = target.width, height = target.height, "blend pipeline ready");
        Ok(())
    }

    fn on_resize(&mut self, gpu: &Gpu, width: u32, height: u32) -> Result<(), RenderError> {
        let resources = self.resources.as_mut().ok_or(RenderError::NotInitialized)?;
        resources.capture.resize(gpu, width, height)?;
        Ok(())
    }

    fn on_frame(&mut self, gpu: &Gpu, frame: &FrameTarget<'_>) -> Result<FrameOutcome, RenderError> {
        let resources = self.resources.as_mut().ok_or(RenderError::NotInitialized)?;

        if let Some(image) = self.controls.base.take() {
            upload(gpu, "blend base", &mut resources.base, &image);
        }
        if let Some(image) = self.controls.overlay.take() {
            upload(gpu, "blend overlay", &mut resources.overlay, &image);
        }

        let (Some(base), Some(overlay)) = (resources.base.as_ref(), resources.overlay.as_ref())
        else {
            clear_frame(gpu, frame, wgpu::Color::BLACK);
            return Ok(FrameOutcome::Waiting);
        };

        resources.capture.resize(gpu, frame.width, frame.height)?;

        let params = self.controls.params.get();
        resources
            .program
            .set_uniform("u_blend_mode", params.mode().shader_index());
        resources.program.set_uniform("u_alpha", params.alpha());
        resources.program.flush(&gpu.queue);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("blend encoder"),
            });
        resources.capture.encode(gpu, &mut encoder, base.binding())?;
        {
            let mut pass = crate::gpu::begin_clear_pass(
                &mut encoder,
                "blend pass",
                frame.view,
                wgpu::Color::BLACK,
            );
            resources.program.draw(
                gpu,
                &mut pass,
                &resources.quad,
                &[resources.capture.output()?, overlay.binding()],
            )?;
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(FrameOutcome::Drawn)
    }

    fn release(&mut self) {
        if let Some(mut resources) = self.resources.take() {
            resources.capture.release();
            for texture in [resources.base.take(), resources.overlay.take()]
                .into_iter()
                .flatten()
            {
                texture.destroy();
            }
            tracing::debug!("blend pipeline released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_updates_are_clamped() {
        let controls = BlendControls::default();
        assert_eq!(controls.set_alpha(1.4), 1.0);
        assert_eq!(controls.nudge_alpha(-0.25), 0.75);
        assert_eq!(controls.set_alpha(-2.0), 0.0);
        assert_eq!(controls.nudge_alpha(-0.1), 0.0);
        assert_eq!(controls.set_alpha(f32::NAN), 0.0);
    }

    #[test]
    fn mode_changes_keep_alpha() {
        let controls = BlendControls::new(BlendParameters::new(BlendMode::Alpha, 0.3));
        controls.set_mode(BlendMode::Overlay);
        assert_eq!(controls.parameters().mode(), BlendMode::Overlay);
        assert_eq!(controls.parameters().alpha(), 0.3);
        assert_eq!(controls.cycle_mode(), BlendMode::SoftLight);
        assert_eq!(controls.cycle_mode(), BlendMode::Alpha);
    }
}
