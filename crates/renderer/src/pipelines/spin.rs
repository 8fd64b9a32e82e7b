use std::sync::Arc;
use std::time::Instant;

use glam::Mat4;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::error::RenderError;
use crate::gpu::{scaled, Gpu, ImageTexture, QuadBuffer, ShaderProgram, TOP_DOWN};
use crate::library::{ProgramSpec, ShaderLibrary};
use crate::params::ClearColor;
use crate::stats::FrameStats;
use crate::sync::{ParamSlot, PendingSlot};
use crate::types::RenderMode;

use super::{FrameOutcome, FrameTarget, Renderer, TargetInfo, Waker};

/// Degrees added per frame in continuous mode.
pub const CONTINUOUS_STEP_DEGREES: f32 = 2.0;

const QUAD_EXTENT: f32 = 0.5;

fn wrap_degrees(degrees: f32) -> f32 {
    if degrees.is_finite() {
        degrees.rem_euclid(360.0)
    } else {
        0.0
    }
}

/// Orthographic projection that keeps squares square on a `width`×`height`
/// target.
pub(crate) fn projection(width: u32, height: u32) -> Mat4 {
    let width = width.max(1) as f32;
    let height = height.max(1) as f32;
    if width >= height {
        let ratio = width / height;
        Mat4::orthographic_rh(-ratio, ratio, -1.0, 1.0, -1.0, 1.0)
    } else {
        let ratio = height / width;
        Mat4::orthographic_rh(-1.0, 1.0, -ratio, ratio, -1.0, 1.0)
    }
}

pub(crate) fn model_view_projection(width: u32, height: u32, degrees: f32) -> Mat4 {
    projection(width, height) * Mat4::from_rotation_z(degrees.to_radians())
}

fn checkerboard() -> RgbaImage {
    RgbaImage::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([240, 240, 240, 255])
        } else {
            Rgba([200, 60, 60, 255])
        }
    })
}

pub struct SpinControls {
    rotation: ParamSlot<f32>,
    fps: ParamSlot<f32>,
    image: PendingSlot<RgbaImage>,
    waker: Mutex<Option<Waker>>,
}

impl SpinControls {
    pub fn new() -> Self {
        Self {
            rotation: ParamSlot::new(0.0),
            fps: ParamSlot::new(0.0),
            image: PendingSlot::new(),
            waker: Mutex::new(None),
        }
    }

    /// Current rotation in degrees, always in `[0, 360)`.
    pub fn rotation(&self) -> f32 {
        self.rotation.get()
    }

    /// Rotates by `degrees` and asks the host for a redraw.
    pub fn step(&self, degrees: f32) -> f32 {
        let rotation = self.advance(degrees);
        self.wake();
        rotation
    }

    pub fn reset(&self) {
        self.rotation.set(0.0);
        self.wake();
    }

    /// Most recent frames-per-second measurement.
    pub fn fps(&self) -> f32 {
        self.fps.get()
    }

    pub fn load_image(&self, image: RgbaImage) {
        self.image.offer(image);
        self.wake();
    }

    fn advance(&self, degrees: f32) -> f32 {
        self.rotation
            .update(|rotation| wrap_degrees(rotation + degrees))
    }

    fn wake(&self) {
        let waker = self.waker.lock().clone();
        if let Some(wake) = waker {
            wake();
        }
    }
}

impl Default for SpinControls {
    fn default() -> Self {
        Self::new()
    }
}

struct SpinResources {
    program: ShaderProgram,
    quad: QuadBuffer,
    texture: ImageTexture,
}

/// Textured square rotating about the view axis.
pub struct SpinRenderer {
    controls: Arc<SpinControls>,
    library: Arc<ShaderLibrary>,
    background: ClearColor,
    resources: Option<SpinResources>,
    stats: FrameStats,
}

impl SpinRenderer {
    pub fn new(controls: Arc<SpinControls>, library: Arc<ShaderLibrary>) -> Self {
        Self {
            controls,
            library,
            background: ClearColor::default(),
            resources: None,
            stats: FrameStats::new(),
        }
    }

    pub fn with_background(mut self, background: ClearColor) -> Self {
        self.background = background;
        self
    }
}

impl Renderer for SpinRenderer {
    fn on_init(&mut self, gpu: &Gpu, target: TargetInfo) -> Result<(), RenderError> {
        self.release();
        let program = ShaderProgram::new(gpu, &self.library, &ProgramSpec::SPIN, target.format)?;
        let quad = QuadBuffer::new(gpu, "spin quad", &scaled(TOP_DOWN, QUAD_EXTENT));
        let texture = ImageTexture::from_image(gpu, "spin texture", &checkerboard())?;
        self.resources = Some(SpinResources {
            program,
            quad,
            texture,
        });
        self.stats = FrameStats::new();
        tracing::info!(width = target.width, height = target.height, "spin renderer ready");
        Ok(())
    }

    fn on_resize(&mut self, _gpu: &Gpu, _width: u32, _height: u32) -> Result<(), RenderError> {
        // The projection is rebuilt from the frame size every frame.
        Ok(())
    }

    fn on_frame(&mut self, gpu: &Gpu, frame: &FrameTarget<'_>) -> Result<FrameOutcome, RenderError> {
        let resources = self.resources.as_mut().ok_or(RenderError::NotInitialized)?;

        if let Some(image) = self.controls.image.take() {
            if let Err(err) = resources.texture.update(gpu, "spin texture", &image) {
                tracing::warn!(error = %err, "spin texture rejected; keeping previous image");
            }
        }

        let rotation = match frame.mode {
            RenderMode::Continuous => self.controls.advance(CONTINUOUS_STEP_DEGREES),
            RenderMode::OnDemand => self.controls.rotation(),
        };
        resources.program.set_uniform(
            "u_mvp",
            model_view_projection(frame.width, frame.height, rotation),
        );
        resources.program.flush(&gpu.queue);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("spin encoder"),
            });
        {
            let mut pass = crate::gpu::begin_clear_pass(
                &mut encoder,
                "spin pass",
                frame.view,
                self.background.to_wgpu(),
            );
            resources.program.draw(
                gpu,
                &mut pass,
                &resources.quad,
                &[resources.texture.binding()],
            )?;
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));

        if let Some(fps) = self.stats.record(Instant::now()) {
            self.controls.fps.set(fps);
        }
        Ok(FrameOutcome::Drawn)
    }

    fn release(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.texture.destroy();
            tracing::debug!("spin renderer released");
        }
    }

    fn set_waker(&mut self, waker: Waker) {
        *self.controls.waker.lock() = Some(waker);
    }
}
