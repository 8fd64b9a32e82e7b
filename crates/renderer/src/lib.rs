//! GPU image-filter renderer for filterlab.
//!
//! The crate turns GLSL programs from a [`ShaderLibrary`] into wgpu render
//! pipelines and strings them into a handful of renderers:
//!
//! ```text
//!   image / camera frames ─▶ *Controls (ParamSlot / PendingSlot)
//!                                   │ read once per frame
//!                                   ▼
//!   host (window | headless) ─▶ Renderer::on_frame
//!                                   │
//!        capture pass ─▶ OffscreenTarget ─▶ filter / blend pass ─▶ visible target
//! ```
//!
//! Hosts own the [`Gpu`] and the visible target; a renderer only touches GPU
//! objects inside its `Renderer` methods. Every piece of per-pixel math also
//! exists on the CPU in [`reference`], which backs the `--cpu` path and acts
//! as the oracle in tests.

pub mod compile;
pub mod error;
pub mod gpu;
pub mod host;
pub mod library;
pub mod lut;
pub mod params;
pub mod pipelines;
pub mod reference;
pub mod stats;
pub mod sync;
pub mod types;

pub use error::{RenderError, StageKind};
pub use gpu::{Gpu, GpuOptions, OffscreenTarget, ShaderProgram};
pub use host::{HeadlessFrame, HeadlessHost, HostKey, WindowHost, WindowOptions};
pub use library::{ProgramSpec, ShaderLibrary};
pub use lut::{LutCatalog, LutEntry};
pub use params::{BlendParameters, ClearColor, FilterParameters, LutParameters};
pub use pipelines::{
    BlendControls, BlendPipeline, ClearControls, ClearRenderer, ExternalFrame, FilterControls,
    FilterPipeline, FrameOutcome, FrameSink, FrameTarget, LutControls, LutPipeline, Renderer,
    SpinControls, SpinRenderer, TargetInfo, Waker,
};
pub use types::{AdapterProfile, BlendMode, FilterKind, GpuPowerPreference, RenderMode, RowOrder};
