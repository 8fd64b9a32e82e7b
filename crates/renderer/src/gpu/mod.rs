//! GPU building blocks shared by every renderer.
//!
//! - `context` owns the wgpu instance, adapter, device and queue.
//! - `program` turns a library vertex/fragment pair into a render pipeline
//!   and stages uniform writes by reflected name.
//! - `uniforms` holds the CPU-side uniform block.
//! - `offscreen` is the render-to-texture target used between passes.
//! - `quad` carries the two row-order variants of the full-screen quad.
//! - `texture` uploads decoded images.
//! - `readback` copies a rendered texture back into an `RgbaImage`.

mod context;
mod offscreen;
mod program;
mod quad;
mod readback;
mod texture;
mod uniforms;

pub use context::{Gpu, GpuOptions};
pub use offscreen::OffscreenTarget;
pub use program::ShaderProgram;
pub use quad::{quad_vertices, scaled, QuadBuffer, QuadVertex, BOTTOM_UP, TOP_DOWN};
pub use readback::read_texture;
pub use texture::{ImageTexture, TextureBinding, IMAGE_FORMAT};
pub use uniforms::UniformValue;

pub(crate) use context::create_instance;
pub(crate) use offscreen::begin_clear_pass;
