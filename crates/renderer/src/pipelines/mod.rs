//! Host-facing renderer interface and its implementations.
//!
//! A host (window or headless) owns the [`Gpu`] and the visible target and
//! drives one [`Renderer`] through `on_init`, `on_resize` and `on_frame`. All
//! GPU objects a renderer needs are created and destroyed inside those calls,
//! on the host's render thread. Control threads talk to a renderer only
//! through its `*Controls` handle.

use std::sync::Arc;

use crate::error::RenderError;
use crate::gpu::Gpu;
use crate::types::RenderMode;

mod blend;
mod capture;
mod clear;
mod filter;
mod lut;
mod spin;

pub use blend::{BlendControls, BlendPipeline};
pub use clear::{ClearControls, ClearRenderer};
pub use filter::{FilterControls, FilterPipeline};
pub use lut::{ExternalFrame, FrameSink, LutControls, LutPipeline};
pub use spin::{SpinControls, SpinRenderer};

/// Callback asking the host for another frame.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Visible target description handed to `on_init`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetInfo {
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// The texture a frame is composited into.
pub struct FrameTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub mode: RenderMode,
}

/// What a renderer did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The full frame was composited.
    Drawn,
    /// Inputs are not available yet; the target was cleared.
    Waiting,
    /// A transient failure dropped this frame; the next one retries.
    Skipped,
}

pub trait Renderer {
    /// One-time setup. Failures here are fatal for the renderer.
    fn on_init(&mut self, gpu: &Gpu, target: TargetInfo) -> Result<(), RenderError>;

    /// The visible target changed size.
    fn on_resize(&mut self, gpu: &Gpu, width: u32, height: u32) -> Result<(), RenderError>;

    /// Produces exactly one frame into `frame`.
    fn on_frame(&mut self, gpu: &Gpu, frame: &FrameTarget<'_>) -> Result<FrameOutcome, RenderError>;

    /// Drops every GPU object. Safe to call at any point and more than once.
    fn release(&mut self);

    /// Hands the renderer a way to request redraws from other threads.
    fn set_waker(&mut self, _waker: Waker) {}
}

/// Clears `frame` and submits, used when a renderer has nothing to draw.
pub(crate) fn clear_frame(gpu: &Gpu, frame: &FrameTarget<'_>, color: wgpu::Color) {
    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("clear encoder"),
        });
    drop(crate::gpu::begin_clear_pass(
        &mut encoder,
        "clear pass",
        frame.view,
        color,
    ));
    gpu.queue.submit(std::iter::once(encoder.finish()));
}
