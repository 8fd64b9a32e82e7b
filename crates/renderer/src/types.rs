use std::fmt;
use std::str::FromStr;

/// Per-pixel filters available to the filter pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterKind {
    #[default]
    Identity,
    Grayscale,
    Invert,
    BoxBlur,
    Edge,
}

impl FilterKind {
    pub const ALL: [FilterKind; 5] = [
        FilterKind::Identity,
        FilterKind::Grayscale,
        FilterKind::Invert,
        FilterKind::BoxBlur,
        FilterKind::Edge,
    ];

    /// Selector value understood by `filter.frag`.
    pub fn shader_index(self) -> i32 {
        match self {
            FilterKind::Identity => 0,
            FilterKind::Grayscale => 1,
            FilterKind::Invert => 2,
            FilterKind::BoxBlur => 3,
            FilterKind::Edge => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Identity => "identity",
            FilterKind::Grayscale => "grayscale",
            FilterKind::Invert => "invert",
            FilterKind::BoxBlur => "blur",
            FilterKind::Edge => "edge",
        }
    }

    /// Cycles through the filters in display order, wrapping at the end.
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|kind| *kind == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" | "none" | "original" => Ok(FilterKind::Identity),
            "grayscale" | "greyscale" | "gray" | "grey" => Ok(FilterKind::Grayscale),
            "invert" | "negative" => Ok(FilterKind::Invert),
            "blur" | "box-blur" => Ok(FilterKind::BoxBlur),
            "edge" | "sobel" | "edges" => Ok(FilterKind::Edge),
            other => Err(format!(
                "unknown filter '{other}'; expected identity, grayscale, invert, blur, or edge"
            )),
        }
    }
}

/// Two-image blend modes. Every mode is mixed with the base image by the
/// blend factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    Alpha,
    Add,
    Multiply,
    Screen,
    Overlay,
    SoftLight,
}

impl BlendMode {
    pub const ALL: [BlendMode; 6] = [
        BlendMode::Alpha,
        BlendMode::Add,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::SoftLight,
    ];

    /// Selector value understood by `blend.frag`.
    pub fn shader_index(self) -> i32 {
        match self {
            BlendMode::Alpha => 0,
            BlendMode::Add => 1,
            BlendMode::Multiply => 2,
            BlendMode::Screen => 3,
            BlendMode::Overlay => 4,
            BlendMode::SoftLight => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Alpha => "alpha",
            BlendMode::Add => "add",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::SoftLight => "soft-light",
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|mode| *mode == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlendMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alpha" | "mix" | "normal" => Ok(BlendMode::Alpha),
            "add" | "additive" => Ok(BlendMode::Add),
            "multiply" => Ok(BlendMode::Multiply),
            "screen" => Ok(BlendMode::Screen),
            "overlay" => Ok(BlendMode::Overlay),
            "soft-light" | "softlight" | "soft_light" => Ok(BlendMode::SoftLight),
            other => Err(format!(
                "unknown blend mode '{other}'; expected alpha, add, multiply, screen, overlay, or soft-light"
            )),
        }
    }
}

/// Which picture row the first texel row of a source image holds.
///
/// Decoded images and wgpu render targets are `TopDown`; buffers produced by
/// GL-style readbacks are `BottomUp` and must be flipped by the capture pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RowOrder {
    #[default]
    TopDown,
    BottomUp,
}

/// How a windowed host schedules redraws.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Redraw as fast as presentation allows.
    #[default]
    Continuous,
    /// Redraw only when a control or an external frame asks for it.
    OnDemand,
}

impl RenderMode {
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Continuous => RenderMode::OnDemand,
            RenderMode::OnDemand => RenderMode::Continuous,
        }
    }
}

/// Adapter selection hint passed through to wgpu.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Summary of the adapter a [`crate::Gpu`] was created on.
#[derive(Clone, Debug)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub driver: String,
    pub max_texture_dimension_2d: u32,
}

impl AdapterProfile {
    pub(crate) fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            driver: info.driver.clone(),
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
            || self.name.to_ascii_lowercase().contains("llvmpipe")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_kind_parses_aliases() {
        assert_eq!("gray".parse::<FilterKind>().unwrap(), FilterKind::Grayscale);
        assert_eq!("Sobel".parse::<FilterKind>().unwrap(), FilterKind::Edge);
        assert_eq!(" blur ".parse::<FilterKind>().unwrap(), FilterKind::BoxBlur);
        assert!("sepia".parse::<FilterKind>().is_err());
    }

    #[test]
    fn filter_kind_cycles_through_all_filters() {
        let mut kind = FilterKind::Identity;
        for _ in 0..FilterKind::ALL.len() {
            kind = kind.next();
        }
        assert_eq!(kind, FilterKind::Identity);
    }

    #[test]
    fn shader_indices_are_stable() {
        let filters: Vec<i32> = FilterKind::ALL.iter().map(|k| k.shader_index()).collect();
        assert_eq!(filters, vec![0, 1, 2, 3, 4]);
        let blends: Vec<i32> = BlendMode::ALL.iter().map(|m| m.shader_index()).collect();
        assert_eq!(blends, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn blend_mode_round_trips_through_names() {
        for mode in BlendMode::ALL {
            assert_eq!(mode.name().parse::<BlendMode>().unwrap(), mode);
        }
    }

    #[test]
    fn render_mode_toggles() {
        assert_eq!(RenderMode::Continuous.toggled(), RenderMode::OnDemand);
        assert_eq!(RenderMode::OnDemand.toggled(), RenderMode::Continuous);
    }
}
