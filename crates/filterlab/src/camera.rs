//! Synthetic frame producer standing in for a live camera feed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use image::{Rgba, RgbaImage};
use renderer::{ExternalFrame, LutControls};

pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 240;

#[derive(Clone, Debug)]
pub struct CameraOptions {
    pub frame_interval: Duration,
    pub ready_timeout: Duration,
    pub mirror: bool,
}

/// Handle to the producer thread; dropping it stops the thread.
pub struct SyntheticCamera {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyntheticCamera {
    pub fn spawn(controls: Arc<LutControls>, options: CameraOptions) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("filterlab-camera".to_string())
            .spawn(move || produce(controls, options, thread_stop))
            .context("failed to spawn camera thread")?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("camera thread panicked");
            }
        }
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn produce(controls: Arc<LutControls>, options: CameraOptions, stop: Arc<AtomicBool>) {
    let Some(sink) = controls.frame_sink(options.ready_timeout) else {
        tracing::warn!(
            timeout = ?options.ready_timeout,
            "LUT renderer never became ready; camera not started"
        );
        return;
    };
    tracing::info!(interval = ?options.frame_interval, mirror = options.mirror, "camera started");

    let transform = if options.mirror {
        mirror_transform()
    } else {
        Mat4::IDENTITY
    };
    let started = Instant::now();
    let mut produced = 0u64;
    while !stop.load(Ordering::Acquire) {
        let phase = started.elapsed().as_secs_f32();
        sink.push(ExternalFrame::new(synthetic_frame(FRAME_WIDTH, FRAME_HEIGHT, phase))
            .with_transform(transform));
        produced += 1;
        thread::sleep(options.frame_interval);
    }
    tracing::info!(
        produced,
        dropped = controls.dropped_frames(),
        superseded = controls.superseded_frames(),
        "camera stopped"
    );
}

/// Texture transform flipping u, as front cameras deliver mirrored frames.
pub fn mirror_transform() -> Mat4 {
    Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0))
}

/// Moving colour field: a hue sweep with a bright bar travelling across it.
pub fn synthetic_frame(width: u32, height: u32, phase: f32) -> RgbaImage {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    let bar = (phase * 0.25).fract() * w;
    RgbaImage::from_fn(width, height, |x, y| {
        let u = x as f32 / w;
        let v = y as f32 / h;
        let r = 0.5 + 0.5 * (std::f32::consts::TAU * (u + phase * 0.1)).sin();
        let g = v;
        let b = 0.5 + 0.5 * (std::f32::consts::TAU * (v - phase * 0.05)).cos();
        let lift = if (x as f32 - bar).abs() < w * 0.02 { 0.35 } else { 0.0 };
        Rgba([
            to_byte(r + lift),
            to_byte(g + lift),
            to_byte(b + lift),
            255,
        ])
    })
}

/// Static card used when no image was supplied: quadrants of primary
/// colours over a grey ramp.
pub fn test_card(width: u32, height: u32) -> RgbaImage {
    let half_w = width / 2;
    let half_h = height / 2;
    RgbaImage::from_fn(width, height, |x, y| {
        let ramp = to_byte(x as f32 / width.max(1) as f32);
        match (x < half_w, y < half_h) {
            (true, true) => Rgba([255, ramp / 4, ramp / 4, 255]),
            (false, true) => Rgba([ramp / 4, 255, ramp / 4, 255]),
            (true, false) => Rgba([ramp / 4, ramp / 4, 255, 255]),
            (false, false) => Rgba([ramp, ramp, ramp, 255]),
        }
    })
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
