use std::sync::Arc;

use image::RgbaImage;

use crate::error::RenderError;
use crate::gpu::{Gpu, ImageTexture, QuadBuffer, ShaderProgram};
use crate::library::{ProgramSpec, ShaderLibrary};
use crate::params::FilterParameters;
use crate::sync::{ParamSlot, PendingSlot};
use crate::types::{FilterKind, RowOrder};

use super::capture::CaptureStage;
use super::{clear_frame, FrameOutcome, FrameTarget, Renderer, TargetInfo};

/// Thread-safe handle for steering a [`FilterPipeline`].
#[derive(Debug, Default)]
pub struct FilterControls {
    params: ParamSlot<FilterParameters>,
    source: PendingSlot<RgbaImage>,
}

impl FilterControls {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            params: ParamSlot::new(FilterParameters::new(kind)),
            source: PendingSlot::new(),
        }
    }

    /// Selects `kind`. Re-selecting the current filter changes nothing.
    pub fn select(&self, kind: FilterKind) -> bool {
        self.params.set_if_changed(FilterParameters::new(kind))
    }

    pub fn filter(&self) -> FilterKind {
        self.params.get().kind
    }

    /// Advances to the next filter and returns it.
    pub fn cycle(&self) -> FilterKind {
        self.params
            .update(|params| FilterParameters::new(params.kind.next()))
            .kind
    }

    /// Queues a new source image; the render thread uploads it next frame.
    pub fn load_image(&self, image: RgbaImage) {
        if self.source.offer(image).is_some() {
            tracing::debug!("replaced unconsumed source image");
        }
    }
}

struct FilterResources {
    capture: CaptureStage,
    program: ShaderProgram,
    quad: QuadBuffer,
    source: Option<ImageTexture>,
}

/// Two-pass filter: capture the source into an offscreen target, then run
/// the selected filter from that target onto the visible surface.
pub struct FilterPipeline {
    controls: Arc<FilterControls>,
    library: Arc<ShaderLibrary>,
    row_order: RowOrder,
    resources: Option<FilterResources>,
    last_version: Option<u64>,
}

impl FilterPipeline {
    pub fn new(controls: Arc<FilterControls>, library: Arc<ShaderLibrary>) -> Self {
        Self {
            controls,
            library,
            row_order: RowOrder::TopDown,
            resources: None,
            last_version: None,
        }
    }

    /// Row order of the images fed through the controls.
    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    pub fn controls(&self) -> Arc<FilterControls> {
        Arc::clone(&self.controls)
    }
}

impl Renderer for FilterPipeline {
    fn on_init(&mut self, gpu: &Gpu, target: TargetInfo) -> Result<(), RenderError> {
        self.release();
        let capture = CaptureStage::new(
            gpu,
            &self.library,
            self.row_order,
            target.width,
            target.height,
        )?;
        let program = ShaderProgram::new(gpu, &self.library, &ProgramSpec::FILTER, target.format)?;
        let quad = QuadBuffer::for_rows(gpu, RowOrder::TopDown);
        self.resources = Some(FilterResources {
            capture,
            program,
            quad,
            source: None,
        });
        tracing::info!(
            width = target.width,
            height = target.height,
            row_order = ?self.row_order,
            "filter pipeline ready"
        );
        Ok(())
    }

    fn on_resize(&mut self, gpu: &Gpu, width: u32, height: u32) -> Result<(), RenderError> {
        let resources = self.resources.as_mut().ok_or(RenderError::NotInitialized)?;
        resources.capture.resize(gpu, width, height)?;
        Ok(())
    }

    fn on_frame(&mut self, gpu: &Gpu, frame: &FrameTarget<'_>) -> Result<FrameOutcome, RenderError> {
        let resources = self.resources.as_mut().ok_or(RenderError::NotInitialized)?;

        if let Some(image) = self.controls.source.take() {
            let uploaded = match resources.source.as_mut() {
                Some(texture) => texture.update(gpu, "filter source", &image).map(|_| ()),
                None => ImageTexture::from_image(gpu, "filter source", &image)
                    .map(|texture| resources.source = Some(texture)),
            };
            if let Err(err) = uploaded {
                tracing::warn!(error = %err, "source image rejected; keeping previous source");
            }
        }

        let Some(source) = resources.source.as_ref() else {
            clear_frame(gpu, frame, wgpu::Color::BLACK);
            return Ok(FrameOutcome::Waiting);
        };

        resources.capture.resize(gpu, frame.width, frame.height)?;

        let (params, version) = self.controls.params.snapshot();
        if self.last_version != Some(version) {
            tracing::debug!(filter = %params.kind, version, "filter parameters changed");
            self.last_version = Some(version);
        }

        let (width, height) = resources
            .capture
            .target()
            .size()
            .ok_or(RenderError::NotInitialized)?;
        resources
            .program
            .set_uniform("u_texel_size", FilterParameters::texel_size(width, height));
        resources
            .program
            .set_uniform("u_filter_kind", params.kind.shader_index());
        resources.program.flush(&gpu.queue);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter encoder"),
            });
        resources.capture.encode(gpu, &mut encoder, source.binding())?;
        {
            let mut pass = crate::gpu::begin_clear_pass(
                &mut encoder,
                "filter pass",
                frame.view,
                wgpu::Color::BLACK,
            );
            resources.program.draw(
                gpu,
                &mut pass,
                &resources.quad,
                &[resources.capture.output()?],
            )?;
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(FrameOutcome::Drawn)
    }

    fn release(&mut self) {
        if let Some(mut resources) = self.resources.take() {
            resources.capture.release();
            if let Some(source) = resources.source.take() {
                source.destroy();
            }
            tracing::debug!("filter pipeline released");
        }
        self.last_version = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_select_and_cycle() {
        let controls = FilterControls::new(FilterKind::Identity);
        controls.select(FilterKind::Invert);
        assert_eq!(controls.filter(), FilterKind::Invert);
        assert_eq!(controls.cycle(), FilterKind::BoxBlur);
        assert_eq!(controls.filter(), FilterKind::BoxBlur);
    }

    #[test]
    fn reselecting_the_current_filter_is_a_no_op() {
        let controls = FilterControls::new(FilterKind::Identity);
        assert!(controls.select(FilterKind::Edge));
        let before = controls.params.snapshot();
        assert!(!controls.select(FilterKind::Edge));
        assert_eq!(controls.params.snapshot(), before);
    }

    #[test]
    fn only_latest_source_image_is_kept() {
        let controls = FilterControls::default();
        controls.load_image(RgbaImage::new(1, 1));
        controls.load_image(RgbaImage::new(2, 2));
        assert_eq!(controls.source.take().unwrap().dimensions(), (2, 2));
        assert!(controls.source.take().is_none());
    }

    #[test]
    fn release_before_init_is_harmless() {
        let mut pipeline = FilterPipeline::new(
            Arc::new(FilterControls::default()),
            Arc::new(ShaderLibrary::builtin()),
        );
        pipeline.release();
        pipeline.release();
        assert!(pipeline.resources.is_none());
    }
}
