//! Parameter snapshots handed from control threads to the render thread.
//!
//! Every numeric knob is sanitised on the way in: values are clamped to their
//! valid range and NaN collapses to zero, so a renderer never sees an
//! out-of-range factor.

use crate::types::{BlendMode, FilterKind};

/// Clamps `value` to `[0, 1]`, mapping NaN to `0`.
pub fn unit_interval(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Maps a 0-100 slider position onto `[0, 1]`.
pub fn slider_to_unit(progress: i32) -> f32 {
    unit_interval(progress as f32 / 100.0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FilterParameters {
    pub kind: FilterKind,
}

impl FilterParameters {
    pub fn new(kind: FilterKind) -> Self {
        Self { kind }
    }

    /// Reciprocal texel size used by the kernel filters.
    pub fn texel_size(width: u32, height: u32) -> [f32; 2] {
        [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendParameters {
    mode: BlendMode,
    alpha: f32,
}

impl BlendParameters {
    pub const DEFAULT_ALPHA: f32 = 0.5;

    pub fn new(mode: BlendMode, alpha: f32) -> Self {
        Self {
            mode,
            alpha: unit_interval(alpha),
        }
    }

    pub fn mode(&self) -> BlendMode {
        self.mode
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn with_mode(self, mode: BlendMode) -> Self {
        Self { mode, ..self }
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self::new(self.mode, alpha)
    }
}

impl Default for BlendParameters {
    fn default() -> Self {
        Self::new(BlendMode::Alpha, Self::DEFAULT_ALPHA)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LutParameters {
    pub selected: usize,
    intensity: f32,
}

impl LutParameters {
    pub fn new(selected: usize, intensity: f32) -> Self {
        Self {
            selected,
            intensity: unit_interval(intensity),
        }
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn with_intensity(self, intensity: f32) -> Self {
        Self::new(self.selected, intensity)
    }

    pub fn with_selected(self, selected: usize) -> Self {
        Self { selected, ..self }
    }
}

impl Default for LutParameters {
    fn default() -> Self {
        Self::new(0, 1.0)
    }
}

/// Clear colour with every component clamped to `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearColor {
    rgba: [f32; 4],
}

impl ClearColor {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            rgba: [
                unit_interval(r),
                unit_interval(g),
                unit_interval(b),
                unit_interval(a),
            ],
        }
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn components(&self) -> [f32; 4] {
        self.rgba
    }

    pub(crate) fn to_wgpu(self) -> wgpu::Color {
        let [r, g, b, a] = self.rgba;
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        }
    }
}

impl Default for ClearColor {
    fn default() -> Self {
        Self::rgb(0.2, 0.3, 0.5)
    }
}
