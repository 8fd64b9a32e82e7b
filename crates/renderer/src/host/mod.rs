//! Hosts own the GPU and the visible target and drive a single
//! [`Renderer`](crate::pipelines::Renderer).

mod headless;
mod window;

pub use headless::{HeadlessFrame, HeadlessHost};
pub use window::{HostKey, WindowHost, WindowOptions};
