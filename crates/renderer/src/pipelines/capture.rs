use crate::error::RenderError;
use crate::gpu::{
    Gpu, OffscreenTarget, QuadBuffer, ShaderProgram, TextureBinding, IMAGE_FORMAT,
};
use crate::library::{ProgramSpec, ShaderLibrary};
use crate::types::RowOrder;

/// Pass 1 of the two-pass pipelines: copies a source texture into an
/// offscreen target sized like the visible surface, correcting row order on
/// the way.
pub(crate) struct CaptureStage {
    program: ShaderProgram,
    quad: QuadBuffer,
    target: OffscreenTarget,
}

impl CaptureStage {
    pub fn new(
        gpu: &Gpu,
        library: &ShaderLibrary,
        row_order: RowOrder,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let program = ShaderProgram::new(gpu, library, &ProgramSpec::PASSTHROUGH, IMAGE_FORMAT)?;
        let quad = QuadBuffer::for_rows(gpu, row_order);
        let mut target = OffscreenTarget::new(gpu, "capture target", IMAGE_FORMAT);
        target.resize(gpu, width, height)?;
        Ok(Self {
            program,
            quad,
            target,
        })
    }

    pub fn resize(&mut self, gpu: &Gpu, width: u32, height: u32) -> Result<bool, RenderError> {
        self.target.resize(gpu, width, height)
    }

    pub fn encode(
        &self,
        gpu: &Gpu,
        encoder: &mut wgpu::CommandEncoder,
        source: TextureBinding<'_>,
    ) -> Result<(), RenderError> {
        let mut pass = self.target.begin_pass(encoder, wgpu::Color::BLACK)?;
        self.program.draw(gpu, &mut pass, &self.quad, &[source])
    }

    pub fn output(&self) -> Result<TextureBinding<'_>, RenderError> {
        self.target.binding().ok_or(RenderError::NotInitialized)
    }

    pub fn target(&self) -> &OffscreenTarget {
        &self.target
    }

    pub fn release(&mut self) {
        self.target.release();
    }
}
