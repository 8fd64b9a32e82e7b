//! Keyboard bindings for the interactive demos.
//!
//! Every handler returns whether the key changed something worth a redraw.

use std::sync::Arc;

use renderer::lut::ALL_CATEGORY;
use renderer::params::slider_to_unit;
use renderer::{
    BlendControls, ClearColor, ClearControls, FilterControls, FilterKind, HostKey, LutControls,
    SpinControls,
};

pub const SLIDER_STEP: i32 = 10;

/// 0-100 slider moved in steps of [`SLIDER_STEP`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slider {
    progress: i32,
}

impl Slider {
    pub fn from_unit(value: f32) -> Self {
        let progress = (value.clamp(0.0, 1.0) * 100.0).round() as i32;
        Self { progress }
    }


    pub fn value(&self) -> f32 {
        slider_to_unit(self.progress)
    }

    pub fn increase(&mut self) -> f32 {
        self.progress = (self.progress + SLIDER_STEP).min(100);
        self.value()
    }

    pub fn decrease(&mut self) -> f32 {
        self.progress = (self.progress - SLIDER_STEP).max(0);
        self.value()
    }
}

pub fn filter_keys(controls: Arc<FilterControls>) -> impl FnMut(HostKey) -> bool {
    move |key| match key {
        HostKey::Char('f') | HostKey::Char('n') | HostKey::Right | HostKey::Tab => {
            let kind = controls.cycle();
            tracing::info!(filter = %kind, "filter selected");
            true
        }
        HostKey::Char(digit @ '1'..='5') => {
            let index = digit as usize - '1' as usize;
            let kind = FilterKind::ALL[index];
            let changed = controls.select(kind);
            if changed {
                tracing::info!(filter = %kind, "filter selected");
            }
            changed
        }
        _ => false,
    }
}

pub fn blend_keys(controls: Arc<BlendControls>) -> impl FnMut(HostKey) -> bool {
    let mut slider = Slider::from_unit(controls.parameters().alpha());
    move |key| match key {
        HostKey::Char('m') | HostKey::Tab => {
            let mode = controls.cycle_mode();
            tracing::info!(mode = %mode, "blend mode selected");
            true
        }
        HostKey::Up | HostKey::Right => {
            let alpha = controls.set_alpha(slider.increase());
            tracing::info!(alpha, "blend factor");
            true
        }
        HostKey::Down | HostKey::Left => {
            let alpha = controls.set_alpha(slider.decrease());
            tracing::info!(alpha, "blend factor");
            true
        }
        _ => false,
    }
}

pub fn lut_keys(controls: Arc<LutControls>) -> impl FnMut(HostKey) -> bool {
    let mut slider = Slider::from_unit(controls.parameters().intensity());
    move |key| match key {
        HostKey::Right | HostKey::Char('n') => {
            controls.next();
            log_selection(&controls);
            true
        }
        HostKey::Left | HostKey::Char('p') => {
            controls.previous();
            log_selection(&controls);
            true
        }
        HostKey::Up => {
            let intensity = controls.set_intensity(slider.increase());
            tracing::info!(intensity, "LUT intensity");
            true
        }
        HostKey::Down => {
            let intensity = controls.set_intensity(slider.decrease());
            tracing::info!(intensity, "LUT intensity");
            true
        }
        HostKey::Char('c') => {
            let category = next_category(&controls);
            controls.set_category(&category);
            tracing::info!(category = %category, "LUT category");
            log_selection(&controls);
            true
        }
        _ => false,
    }
}

/// Category after the current one, cycling through `all` and then each
/// category in catalog order.
fn next_category(controls: &LutControls) -> String {
    let mut cycle = vec![ALL_CATEGORY];
    cycle.extend(controls.catalog().categories());
    let current = controls.category();
    let position = cycle.iter().position(|category| *category == current);
    let next = match position {
        Some(index) => cycle[(index + 1) % cycle.len()],
        None => ALL_CATEGORY,
    };
    next.to_string()
}

fn log_selection(controls: &LutControls) {
    if let Some(entry) = controls.selected() {
        tracing::info!(lut = %entry.name, category = %entry.category, "LUT selected");
    }
}

pub fn spin_keys(controls: Arc<SpinControls>, step: f32) -> impl FnMut(HostKey) -> bool {
    move |key| match key {
        HostKey::Right | HostKey::Enter => {
            let rotation = controls.step(step);
            tracing::debug!(rotation, "rotated");
            true
        }
        HostKey::Left => {
            let rotation = controls.step(-step);
            tracing::debug!(rotation, "rotated");
            true
        }
        HostKey::Char('r') => {
            controls.reset();
            true
        }
        HostKey::Char('s') => {
            tracing::info!(fps = controls.fps(), rotation = controls.rotation(), "spin stats");
            false
        }
        _ => false,
    }
}

/// Colours `c` cycles through after the configured one.
pub const PALETTE: [[f32; 3]; 4] = [
    [0.9, 0.2, 0.2],
    [0.2, 0.8, 0.3],
    [0.2, 0.3, 0.9],
    [0.1, 0.1, 0.1],
];

pub fn clear_keys(controls: Arc<ClearControls>) -> impl FnMut(HostKey) -> bool {
    let initial = controls.color();
    let mut index = 0usize;
    move |key| match key {
        HostKey::Char('c') => {
            index = (index + 1) % (PALETTE.len() + 1);
            let color = match index {
                0 => initial,
                n => {
                    let [r, g, b] = PALETTE[n - 1];
                    ClearColor::rgb(r, g, b)
                }
            };
            controls.set_color(color);
            tracing::info!(color = ?color.components(), "clear colour");
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{BlendMode, BlendParameters, LutCatalog, LutEntry, LutParameters};
    use std::path::PathBuf;

    #[test]
    fn slider_moves_in_tens_and_saturates() {
        let mut slider = Slider::from_unit(0.85);
        assert_eq!(slider.value(), 0.85);
        assert_eq!(slider.increase(), 0.95);
        assert_eq!(slider.increase(), 1.0);
        assert_eq!(slider.increase(), 1.0);
        assert_eq!(slider.value(), 1.0);

        let mut low = Slider::from_unit(0.05);
        assert_eq!(low.decrease(), 0.0);
    }

    #[test]
    fn filter_keys_cycle_and_select() {
        let controls = Arc::new(FilterControls::new(FilterKind::Identity));
        let mut keys = filter_keys(Arc::clone(&controls));
        assert!(keys(HostKey::Char('f')));
        assert_eq!(controls.filter(), FilterKind::Grayscale);
        assert!(keys(HostKey::Char('5')));
        assert_eq!(controls.filter(), FilterKind::Edge);
        // picking the current filter again asks for no redraw
        assert!(!keys(HostKey::Char('5')));
        assert!(!keys(HostKey::Char('z')));
    }

    #[test]
    fn blend_keys_move_alpha_in_slider_steps() {
        let controls = Arc::new(BlendControls::new(BlendParameters::new(BlendMode::Alpha, 0.5)));
        let mut keys = blend_keys(Arc::clone(&controls));
        keys(HostKey::Up);
        assert!((controls.parameters().alpha() - 0.6).abs() < 1e-6);
        for _ in 0..10 {
            keys(HostKey::Down);
        }
        assert_eq!(controls.parameters().alpha(), 0.0);
        keys(HostKey::Char('m'));
        assert_eq!(controls.parameters().mode(), BlendMode::Add);
    }

    fn catalog() -> LutCatalog {
        LutCatalog::new(vec![
            LutEntry::identity(),
            LutEntry::file("warm", "portrait", PathBuf::from("warm.png")),
            LutEntry::file("noir", "film", PathBuf::from("noir.png")),
            LutEntry::file("fade", "film", PathBuf::from("fade.png")),
        ])
    }

    #[test]
    fn lut_keys_navigate_within_category() {
        let controls = Arc::new(LutControls::new(catalog(), LutParameters::new(0, 1.0)));
        let mut keys = lut_keys(Arc::clone(&controls));

        keys(HostKey::Right);
        assert_eq!(controls.parameters().selected, 1);
        keys(HostKey::Left);
        keys(HostKey::Left);
        assert_eq!(controls.parameters().selected, 3);

        // all -> basic -> portrait -> film
        keys(HostKey::Char('c'));
        keys(HostKey::Char('c'));
        keys(HostKey::Char('c'));
        assert_eq!(controls.category(), "film");
        assert_eq!(controls.parameters().selected, 2);
        keys(HostKey::Right);
        keys(HostKey::Right);
        assert_eq!(controls.parameters().selected, 2);

        keys(HostKey::Char('c'));
        assert_eq!(controls.category(), ALL_CATEGORY);
    }

    #[test]
    fn lut_keys_adjust_intensity() {
        let controls = Arc::new(LutControls::new(catalog(), LutParameters::new(0, 1.0)));
        let mut keys = lut_keys(Arc::clone(&controls));
        keys(HostKey::Down);
        keys(HostKey::Down);
        assert!((controls.parameters().intensity() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn spin_keys_step_both_ways() {
        let controls = Arc::new(SpinControls::new());
        let mut keys = spin_keys(Arc::clone(&controls), 15.0);
        keys(HostKey::Left);
        assert_eq!(controls.rotation(), 345.0);
        keys(HostKey::Right);
        keys(HostKey::Right);
        assert_eq!(controls.rotation(), 15.0);
        keys(HostKey::Char('r'));
        assert_eq!(controls.rotation(), 0.0);
    }

    #[test]
    fn clear_keys_cycle_back_to_initial_colour() {
        let initial = ClearColor::rgb(0.2, 0.3, 0.5);
        let controls = Arc::new(ClearControls::new(initial));
        let mut keys = clear_keys(Arc::clone(&controls));
        keys(HostKey::Char('c'));
        assert_eq!(controls.color(), ClearColor::rgb(0.9, 0.2, 0.2));
        for _ in 0..PALETTE.len() {
            keys(HostKey::Char('c'));
        }
        assert_eq!(controls.color(), initial);
    }
}
