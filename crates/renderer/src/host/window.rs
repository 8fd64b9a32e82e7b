use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use tracing::{error, info, warn};

use crate::gpu::{create_instance, Gpu, GpuOptions};
use crate::pipelines::{FrameOutcome, FrameTarget, Renderer, TargetInfo, Waker};
use crate::types::RenderMode;

#[derive(Clone, Debug)]
pub struct WindowOptions {
    pub title: String,
    pub size: (u32, u32),
    pub render_mode: RenderMode,
    pub gpu: GpuOptions,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "filterlab".to_string(),
            size: (1280, 720),
            render_mode: RenderMode::Continuous,
            gpu: GpuOptions::default(),
        }
    }
}

/// Keys forwarded to the caller's key handler. Space and Escape are handled
/// by the host itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKey {
    Char(char),
    Left,
    Right,
    Up,
    Down,
    Enter,
    Tab,
    Backspace,
}

#[derive(Debug, Clone, Copy)]
enum HostEvent {
    Redraw,
}

enum KeyAction {
    ToggleMode,
    Exit,
    Forward(HostKey),
}

fn key_action(key: &Key) -> Option<KeyAction> {
    let action = match key {
        Key::Named(NamedKey::Space) => KeyAction::ToggleMode,
        Key::Named(NamedKey::Escape) => KeyAction::Exit,
        Key::Named(NamedKey::ArrowLeft) => KeyAction::Forward(HostKey::Left),
        Key::Named(NamedKey::ArrowRight) => KeyAction::Forward(HostKey::Right),
        Key::Named(NamedKey::ArrowUp) => KeyAction::Forward(HostKey::Up),
        Key::Named(NamedKey::ArrowDown) => KeyAction::Forward(HostKey::Down),
        Key::Named(NamedKey::Enter) => KeyAction::Forward(HostKey::Enter),
        Key::Named(NamedKey::Tab) => KeyAction::Forward(HostKey::Tab),
        Key::Named(NamedKey::Backspace) => KeyAction::Forward(HostKey::Backspace),
        Key::Character(value) => {
            let mut chars = value.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            if ch == ' ' {
                KeyAction::ToggleMode
            } else {
                KeyAction::Forward(HostKey::Char(ch.to_ascii_lowercase()))
            }
        }
        _ => return None,
    };
    Some(action)
}

/// Window, surface and device for the interactive path.
///
/// Field order matters: the surface must drop before the window it was
/// created from.
struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    gpu: Gpu,
    window: Arc<Window>,
}

impl SurfaceState {
    fn new(window: Arc<Window>, options: &GpuOptions) -> Result<Self> {
        let instance = create_instance();
        let window_handle = window
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = window
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;
        let raw_window_handle = window_handle.as_raw();
        let raw_display_handle = display_handle.as_raw();
        // SAFETY: the window outlives the surface; see the field order above.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle,
                raw_window_handle,
            })
        }
        .context("failed to create rendering surface")?;

        let gpu = Gpu::from_instance(instance, Some(&surface), options)
            .context("failed to initialise GPU for window")?;

        let size = window.inner_size();
        let max_dimension = gpu.max_texture_dimension();
        let width = size.width.clamp(1, max_dimension);
        let height = size.height.clamp(1, max_dimension);

        let caps = surface.get_capabilities(gpu.adapter());
        // Filters write final byte values; an sRGB surface would re-encode them.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);
        info!(
            adapter = %gpu.profile().name,
            backend = ?gpu.profile().backend,
            ?format,
            width,
            height,
            "window surface configured"
        );

        Ok(Self {
            surface,
            config,
            gpu,
            window,
        })
    }

    fn target_info(&self) -> TargetInfo {
        TargetInfo {
            format: self.config.format,
            width: self.config.width,
            height: self.config.height,
        }
    }

    /// Returns false when the size was rejected and the surface kept its
    /// previous configuration.
    fn resize(&mut self, new_size: PhysicalSize<u32>) -> bool {
        if new_size.width == 0 || new_size.height == 0 {
            return false;
        }
        let max_dimension = self.gpu.max_texture_dimension();
        if new_size.width > max_dimension || new_size.height > max_dimension {
            warn!(
                new_width = new_size.width,
                new_height = new_size.height,
                max_dimension,
                "requested resize exceeds GPU limits; keeping previous size"
            );
            return false;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.reconfigure();
        true
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.gpu.device, &self.config);
    }
}

enum FrameError {
    Surface(wgpu::SurfaceError),
    Render(crate::error::RenderError),
}

fn render_frame(
    state: &SurfaceState,
    renderer: &mut dyn Renderer,
    mode: RenderMode,
) -> std::result::Result<FrameOutcome, FrameError> {
    let frame = state
        .surface
        .get_current_texture()
        .map_err(FrameError::Surface)?;
    let view = frame
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());
    let outcome = renderer
        .on_frame(
            &state.gpu,
            &FrameTarget {
                view: &view,
                width: state.config.width,
                height: state.config.height,
                mode,
            },
        )
        .map_err(FrameError::Render)?;
    if should_present(outcome) {
        state.window.pre_present_notify();
        frame.present();
    }
    // an unpresented surface texture is discarded on drop
    Ok(outcome)
}

/// A skipped frame may have left the target partly written, so it is
/// never shown.
fn should_present(outcome: FrameOutcome) -> bool {
    outcome != FrameOutcome::Skipped
}

/// Interactive host: one winit window whose surface the renderer draws into.
pub struct WindowHost {
    options: WindowOptions,
}

impl WindowHost {
    pub fn new(options: WindowOptions) -> Self {
        Self { options }
    }

    /// Runs the event loop until the window closes.
    ///
    /// `on_ready` receives a waker once the renderer is initialised; any
    /// thread may call it to request a redraw. `on_key` sees every forwarded
    /// key press and returns whether the frame should be redrawn.
    pub fn run<R, K, S>(self, mut renderer: R, mut on_key: K, on_ready: S) -> Result<()>
    where
        R: Renderer,
        K: FnMut(HostKey) -> bool,
        S: FnOnce(Waker),
    {
        let event_loop = EventLoopBuilder::<HostEvent>::with_user_event()
            .build()
            .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
        let proxy = Mutex::new(event_loop.create_proxy());
        let waker: Waker = Arc::new(move || {
            let _ = proxy.lock().send_event(HostEvent::Redraw);
        });

        let (width, height) = self.options.size;
        let window = WindowBuilder::new()
            .with_title(self.options.title.as_str())
            .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create window: {err}"))?;
        let window = Arc::new(window);

        let mut state = SurfaceState::new(window, &self.options.gpu)?;
        renderer
            .on_init(&state.gpu, state.target_info())
            .context("failed to initialise renderer")?;
        renderer.set_waker(Arc::clone(&waker));
        on_ready(waker);

        let mut mode = self.options.render_mode;
        let mut failure: Option<anyhow::Error> = None;
        info!(?mode, "window host running");
        state.window.request_redraw();

        let run_result = event_loop.run(|event, elwt| match event {
            Event::UserEvent(HostEvent::Redraw) => {
                state.window.request_redraw();
            }
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                logical_key,
                                state: ElementState::Pressed,
                                repeat: false,
                                ..
                            },
                        ..
                    } => match key_action(&logical_key) {
                        Some(KeyAction::ToggleMode) => {
                            mode = mode.toggled();
                            info!(?mode, "render mode changed");
                            state.window.request_redraw();
                        }
                        Some(KeyAction::Exit) => elwt.exit(),
                        Some(KeyAction::Forward(key)) => {
                            if on_key(key) {
                                state.window.request_redraw();
                            }
                        }
                        None => {}
                    },
                    WindowEvent::Resized(new_size) => {
                        if state.resize(new_size) {
                            if let Err(err) =
                                renderer.on_resize(&state.gpu, new_size.width, new_size.height)
                            {
                                error!(error = %err, "renderer failed to resize");
                                failure = Some(anyhow!(err).context("renderer failed to resize"));
                                elwt.exit();
                                return;
                            }
                            state.window.request_redraw();
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        match render_frame(&state, &mut renderer, mode) {
                            Ok(FrameOutcome::Skipped) => {
                                // The next frame retries whatever was dropped.
                                state.window.request_redraw();
                            }
                            Ok(_) => {}
                            Err(FrameError::Surface(surface_err)) => match surface_err {
                                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                                    state.reconfigure();
                                    state.window.request_redraw();
                                }
                                wgpu::SurfaceError::OutOfMemory => {
                                    error!("surface out of memory; closing window");
                                    failure = Some(anyhow!("surface out of memory"));
                                    elwt.exit();
                                }
                                wgpu::SurfaceError::Timeout => {
                                    warn!("surface timeout; retrying next frame");
                                }
                                other => {
                                    warn!(error = ?other, "surface error; retrying next frame");
                                }
                            },
                            Err(FrameError::Render(err)) => {
                                error!(error = %err, "renderer failed to draw frame");
                                failure = Some(anyhow!(err).context("renderer failed to draw frame"));
                                elwt.exit();
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                if mode == RenderMode::Continuous {
                    state.window.request_redraw();
                }
                elwt.set_control_flow(ControlFlow::Wait);
            }
            _ => {}
        });

        renderer.release();
        if let Err(err) = run_result {
            return Err(anyhow!("window event loop error: {err}"));
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
