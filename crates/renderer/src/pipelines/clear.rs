use std::sync::Arc;

use crate::error::RenderError;
use crate::gpu::Gpu;
use crate::params::ClearColor;
use crate::sync::ParamSlot;

use super::{clear_frame, FrameOutcome, FrameTarget, Renderer, TargetInfo};

#[derive(Debug, Default)]
pub struct ClearControls {
    color: ParamSlot<ClearColor>,
}

impl ClearControls {
    pub fn new(color: ClearColor) -> Self {
        Self {
            color: ParamSlot::new(color),
        }
    }

    pub fn color(&self) -> ClearColor {
        self.color.get()
    }

    pub fn set_color(&self, color: ClearColor) {
        self.color.set(color);
    }
}

/// Fills the target with a single colour.
pub struct ClearRenderer {
    controls: Arc<ClearControls>,
    ready: bool,
}

impl ClearRenderer {
    pub fn new(controls: Arc<ClearControls>) -> Self {
        Self {
            controls,
            ready: false,
        }
    }
}

impl Renderer for ClearRenderer {
    fn on_init(&mut self, _gpu: &Gpu, target: TargetInfo) -> Result<(), RenderError> {
        self.ready = true;
        tracing::info!(format = ?target.format, "clear renderer ready");
        Ok(())
    }

    fn on_resize(&mut self, _gpu: &Gpu, _width: u32, _height: u32) -> Result<(), RenderError> {
        Ok(())
    }

    fn on_frame(&mut self, gpu: &Gpu, frame: &FrameTarget<'_>) -> Result<FrameOutcome, RenderError> {
        if !self.ready {
            return Err(RenderError::NotInitialized);
        }
        clear_frame(gpu, frame, self.controls.color().to_wgpu());
        Ok(FrameOutcome::Drawn)
    }

    fn release(&mut self) {
        self.ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_is_clamped_on_the_way_in() {
        let controls = ClearControls::default();
        assert_eq!(controls.color(), ClearColor::default());
        controls.set_color(ClearColor::new(2.0, -1.0, 0.5, f32::NAN));
        assert_eq!(controls.color().components(), [1.0, 0.0, 0.5, 0.0]);
    }
}
