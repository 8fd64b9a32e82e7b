use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::Mat4;
use image::RgbaImage;
use parking_lot::Mutex;

use crate::error::RenderError;
use crate::gpu::{Gpu, ImageTexture, QuadBuffer, ShaderProgram};
use crate::library::{ProgramSpec, ShaderLibrary};
use crate::lut::{identity_lut, LutCatalog, LutEntry, ALL_CATEGORY};
use crate::params::LutParameters;
use crate::sync::{ParamSlot, PendingSlot, ReadySignal};
use crate::types::RowOrder;

use super::{clear_frame, FrameOutcome, FrameTarget, Renderer, TargetInfo, Waker};

/// One frame from an external source such as a camera.
#[derive(Clone, Debug)]
pub struct ExternalFrame {
    pub image: RgbaImage,
    /// Applied to the quad's texture coordinates before sampling.
    pub tex_transform: Mat4,
}

impl ExternalFrame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            tex_transform: Mat4::IDENTITY,
        }
    }

    pub fn with_transform(mut self, tex_transform: Mat4) -> Self {
        self.tex_transform = tex_transform;
        self
    }
}

/// Producer side of the external frame feed.
///
/// Cheap to clone and safe to use from any thread. Each push replaces any
/// frame the renderer has not consumed yet and asks the host for a redraw.
#[derive(Clone)]
pub struct FrameSink {
    slot: Arc<PendingSlot<ExternalFrame>>,
    waker: Arc<Mutex<Option<Waker>>>,
    superseded: Arc<AtomicU64>,
}

impl FrameSink {
    pub fn push(&self, frame: ExternalFrame) {
        if self.slot.offer(frame).is_some() {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
        let waker = self.waker.lock().clone();
        if let Some(wake) = waker {
            wake();
        }
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSink")
            .field("pending", &self.slot.is_pending())
            .field("superseded", &self.superseded.load(Ordering::Relaxed))
            .finish()
    }
}

/// Thread-safe handle for steering a [`LutPipeline`] and reaching its frame
/// feed.
pub struct LutControls {
    params: ParamSlot<LutParameters>,
    category: ParamSlot<String>,
    catalog: LutCatalog,
    frames: Arc<PendingSlot<ExternalFrame>>,
    waker: Arc<Mutex<Option<Waker>>>,
    sink: ReadySignal<FrameSink>,
    dropped: AtomicU64,
    superseded: Arc<AtomicU64>,
}

impl LutControls {
    pub fn new(catalog: LutCatalog, params: LutParameters) -> Self {
        let selected = params.selected.min(catalog.len().saturating_sub(1));
        Self {
            params: ParamSlot::new(LutParameters::new(selected, params.intensity())),
            category: ParamSlot::new(ALL_CATEGORY.to_string()),
            catalog,
            frames: Arc::new(PendingSlot::new()),
            waker: Arc::new(Mutex::new(None)),
            sink: ReadySignal::new(),
            dropped: AtomicU64::new(0),
            superseded: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn catalog(&self) -> &LutCatalog {
        &self.catalog
    }

    pub fn parameters(&self) -> LutParameters {
        self.params.get()
    }

    pub fn selected(&self) -> Option<&LutEntry> {
        self.catalog.get(self.params.get().selected)
    }

    /// Selects table `index`. Out-of-range indices are ignored.
    pub fn select(&self, index: usize) -> bool {
        if index >= self.catalog.len() {
            tracing::debug!(index, tables = self.catalog.len(), "ignoring out-of-range LUT");
            return false;
        }
        self.params.update(|params| params.with_selected(index));
        true
    }

    pub fn select_name(&self, name: &str) -> bool {
        match self.catalog.position(name) {
            Some(index) => self.select(index),
            None => false,
        }
    }

    pub fn category(&self) -> String {
        self.category.get()
    }

    /// Restricts next/previous to `category` and jumps to its first table.
    pub fn set_category(&self, category: &str) -> Option<usize> {
        let first = self.catalog.first_in(category)?;
        self.category.set(category.to_string());
        self.select(first);
        Some(first)
    }

    pub fn next(&self) -> Option<usize> {
        let current = self.params.get().selected;
        let next = self.catalog.next(current, &self.category.get())?;
        self.select(next);
        Some(next)
    }

    pub fn previous(&self) -> Option<usize> {
        let current = self.params.get().selected;
        let previous = self.catalog.previous(current, &self.category.get())?;
        self.select(previous);
        Some(previous)
    }

    pub fn set_intensity(&self, intensity: f32) -> f32 {
        self.params
            .update(|params| params.with_intensity(intensity))
            .intensity()
    }

    pub fn nudge_intensity(&self, delta: f32) -> f32 {
        self.params
            .update(|params| params.with_intensity(params.intensity() + delta))
            .intensity()
    }

    /// Blocks until the renderer has created its external texture, then
    /// returns the sink frames should be pushed into.
    pub fn frame_sink(&self, timeout: Duration) -> Option<FrameSink> {
        self.sink.wait(timeout)
    }

    pub fn try_frame_sink(&self) -> Option<FrameSink> {
        self.sink.try_get()
    }

    /// Frames the renderer could not use.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames replaced by a newer push before the renderer consumed them.
    pub fn superseded_frames(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    /// Queues `frame` directly, without waiting for the sink to be
    /// published. The renderer consumes it on its first frame after init.
    pub fn submit(&self, frame: ExternalFrame) {
        self.sink().push(frame);
    }

    fn sink(&self) -> FrameSink {
        FrameSink {
            slot: Arc::clone(&self.frames),
            waker: Arc::clone(&self.waker),
            superseded: Arc::clone(&self.superseded),
        }
    }

    fn publish_sink(&self) {
        self.sink.set(self.sink());
    }
}

impl Default for LutControls {
    fn default() -> Self {
        Self::new(LutCatalog::default(), LutParameters::default())
    }
}

struct LutResources {
    program: ShaderProgram,
    quad: QuadBuffer,
    frame: ImageTexture,
    tables: Vec<ImageTexture>,
    transform: Mat4,
    has_frame: bool,
    last_selected: Option<usize>,
}

/// Colour-grades an externally fed frame through the selected lookup table.
pub struct LutPipeline {
    controls: Arc<LutControls>,
    library: Arc<ShaderLibrary>,
    resources: Option<LutResources>,
}

impl LutPipeline {
    pub fn new(controls: Arc<LutControls>, library: Arc<ShaderLibrary>) -> Self {
        Self {
            controls,
            library,
            resources: None,
        }
    }

    pub fn controls(&self) -> Arc<LutControls> {
        Arc::clone(&self.controls)
    }

    fn load_tables(&self, gpu: &Gpu) -> Result<Vec<ImageTexture>, RenderError> {
        let mut tables = Vec::with_capacity(self.controls.catalog.len());
        for entry in self.controls.catalog.entries() {
            let image = entry.load().unwrap_or_else(|err| {
                tracing::warn!(
                    lut = %entry.name,
                    error = %err,
                    "failed to load LUT; using identity table"
                );
                identity_lut()
            });
            tables.push(ImageTexture::from_image(gpu, &format!("lut {}", entry.name), &image)?);
        }
        Ok(tables)
    }

    fn drop_frame(&self, reason: &RenderError) {
        let dropped = self.controls.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(error = %reason, dropped, "external frame dropped");
    }
}

impl Renderer for LutPipeline {
    fn on_init(&mut self, gpu: &Gpu, target: TargetInfo) -> Result<(), RenderError> {
        self.release();
        let program = ShaderProgram::new(gpu, &self.library, &ProgramSpec::LUT, target.format)?;
        let tables = self.load_tables(gpu)?;
        let frame = ImageTexture::placeholder(gpu, "external frame")?;
        self.resources = Some(LutResources {
            program,
            quad: QuadBuffer::for_rows(gpu, RowOrder::TopDown),
            frame,
            tables,
            transform: Mat4::IDENTITY,
            has_frame: false,
            last_selected: None,
        });
        self.controls.publish_sink();
        tracing::info!(
            tables = self.controls.catalog.len(),
            width = target.width,
            height = target.height,
            "LUT pipeline ready"
        );
        Ok(())
    }

    fn on_resize(&mut self, _gpu: &Gpu, _width: u32, _height: u32) -> Result<(), RenderError> {
        // Single pass straight to the surface: nothing is sized to it.
        self.resources
            .as_ref()
            .map(|_| ())
            .ok_or(RenderError::NotInitialized)
    }

    fn on_frame(&mut self, gpu: &Gpu, frame: &FrameTarget<'_>) -> Result<FrameOutcome, RenderError> {
        if self.resources.is_none() {
            return Err(RenderError::NotInitialized);
        }

        if let Some(incoming) = self.controls.frames.take() {
            let resources = self.resources.as_mut().ok_or(RenderError::NotInitialized)?;
            match resources.frame.update(gpu, "external frame", &incoming.image) {
                Ok(_) => {
                    resources.transform = incoming.tex_transform;
                    resources.has_frame = true;
                }
                Err(err) => {
                    self.drop_frame(&err);
                    return Ok(FrameOutcome::Skipped);
                }
            }
        }

        let resources = self.resources.as_mut().ok_or(RenderError::NotInitialized)?;
        if !resources.has_frame {
            clear_frame(gpu, frame, wgpu::Color::BLACK);
            return Ok(FrameOutcome::Waiting);
        }

        let params = self.controls.params.get();
        let selected = params.selected.min(resources.tables.len().saturating_sub(1));
        if resources.last_selected != Some(selected) {
            if let Some(entry) = self.controls.catalog.get(selected) {
                tracing::debug!(lut = %entry.name, category = %entry.category, "LUT selected");
            }
            resources.last_selected = Some(selected);
        }
        let table = resources
            .tables
            .get(selected)
            .ok_or(RenderError::NotInitialized)?;

        resources
            .program
            .set_uniform("u_tex_transform", resources.transform);
        resources
            .program
            .set_uniform("u_intensity", params.intensity());
        resources.program.flush(&gpu.queue);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lut encoder"),
            });
        {
            let mut pass = crate::gpu::begin_clear_pass(
                &mut encoder,
                "lut pass",
                frame.view,
                wgpu::Color::BLACK,
            );
            resources.program.draw(
                gpu,
                &mut pass,
                &resources.quad,
                &[resources.frame.binding(), table.binding()],
            )?;
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(FrameOutcome::Drawn)
    }

    fn release(&mut self) {
        self.controls.sink.reset();
        if let Some(resources) = self.resources.take() {
            resources.frame.destroy();
            for table in &resources.tables {
                table.destroy();
            }
            tracing::debug!("LUT pipeline released");
        }
    }

    fn set_waker(&mut self, waker: Waker) {
        *self.controls.waker.lock() = Some(waker);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn controls() -> LutControls {
        LutControls::new(
            LutCatalog::new(vec![
                LutEntry::identity(),
                LutEntry::file("warm", "portrait", PathBuf::from("warm.png")),
                LutEntry::file("noir", "film", PathBuf::from("noir.png")),
            ]),
            LutParameters::default(),
        )
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let controls = controls();
        assert!(controls.select(2));
        assert!(!controls.select(3));
        assert_eq!(controls.parameters().selected, 2);
    }

    #[test]
    fn selecting_a_table_keeps_intensity() {
        let controls = controls();
        controls.set_intensity(0.4);
        assert!(controls.select_name("noir"));
        let params = controls.parameters();
        assert_eq!(params.selected, 2);
        assert_eq!(params.intensity(), 0.4);
    }

    #[test]
    fn navigation_wraps_in_current_category() {
        let controls = controls();
        assert_eq!(controls.next(), Some(1));
        assert_eq!(controls.next(), Some(2));
        assert_eq!(controls.next(), Some(0));
        assert_eq!(controls.previous(), Some(2));

        assert_eq!(controls.set_category("portrait"), Some(1));
        assert_eq!(controls.next(), Some(1));
        assert_eq!(controls.set_category("missing"), None);
        assert_eq!(controls.category(), "portrait");
    }

    #[test]
    fn intensity_is_clamped() {
        let controls = controls();
        assert_eq!(controls.set_intensity(1.5), 1.0);
        assert_eq!(controls.nudge_intensity(-0.5), 0.5);
        assert_eq!(controls.set_intensity(-1.0), 0.0);
    }

    #[test]
    fn initial_selection_is_clamped_to_catalog() {
        let controls = LutControls::new(LutCatalog::default(), LutParameters::new(9, 0.5));
        assert_eq!(controls.parameters().selected, 0);
        assert_eq!(controls.parameters().intensity(), 0.5);
    }

    #[test]
    fn sink_is_unavailable_until_published() {
        let controls = controls();
        assert!(controls.try_frame_sink().is_none());
        assert!(controls.frame_sink(Duration::from_millis(5)).is_none());
        controls.publish_sink();
        assert!(controls.frame_sink(Duration::from_millis(5)).is_some());
    }

    #[test]
    fn pushes_wake_the_host_and_count_superseded_frames() {
        let controls = controls();
        controls.publish_sink();
        let wakes = Arc::new(AtomicUsize::new(0));
        {
            let wakes = Arc::clone(&wakes);
            *controls.waker.lock() = Some(Arc::new(move || {
                wakes.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let sink = controls.try_frame_sink().unwrap();
        sink.push(ExternalFrame::new(RgbaImage::new(2, 2)));
        sink.clone().push(ExternalFrame::new(RgbaImage::new(4, 4)));

        assert_eq!(wakes.load(Ordering::SeqCst), 2);
        assert_eq!(controls.superseded_frames(), 1);
        let frame = controls.frames.take().unwrap();
        assert_eq!(frame.image.dimensions(), (4, 4));
        assert_eq!(frame.tex_transform, Mat4::IDENTITY);
    }
}
