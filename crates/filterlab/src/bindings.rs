use presets::{
    BlendSetting, FilterSetting, PowerSetting, PresetConfig, RenderModeSetting, RowOrderSetting,
};
use renderer::lut::ALL_CATEGORY;
use renderer::{
    BlendMode, ClearColor, FilterKind, GpuPowerPreference, LutCatalog, LutEntry, LutParameters,
    RenderMode, RowOrder,
};

pub fn filter_kind(setting: FilterSetting) -> FilterKind {
    match setting {
        FilterSetting::Identity => FilterKind::Identity,
        FilterSetting::Grayscale => FilterKind::Grayscale,
        FilterSetting::Invert => FilterKind::Invert,
        FilterSetting::Blur => FilterKind::BoxBlur,
        FilterSetting::Edge => FilterKind::Edge,
    }
}

pub fn blend_mode(setting: BlendSetting) -> BlendMode {
    match setting {
        BlendSetting::Alpha => BlendMode::Alpha,
        BlendSetting::Add => BlendMode::Add,
        BlendSetting::Multiply => BlendMode::Multiply,
        BlendSetting::Screen => BlendMode::Screen,
        BlendSetting::Overlay => BlendMode::Overlay,
        BlendSetting::SoftLight => BlendMode::SoftLight,
    }
}

pub fn row_order(setting: RowOrderSetting) -> RowOrder {
    match setting {
        RowOrderSetting::TopDown => RowOrder::TopDown,
        RowOrderSetting::BottomUp => RowOrder::BottomUp,
    }
}

pub fn render_mode(setting: RenderModeSetting) -> RenderMode {
    match setting {
        RenderModeSetting::Continuous => RenderMode::Continuous,
        RenderModeSetting::OnDemand => RenderMode::OnDemand,
    }
}

pub fn power_preference(setting: PowerSetting) -> GpuPowerPreference {
    match setting {
        PowerSetting::Low => GpuPowerPreference::Low,
        PowerSetting::High => GpuPowerPreference::High,
    }
}

pub fn clear_color(config: &PresetConfig) -> ClearColor {
    let [r, g, b, a] = config.clear.color;
    ClearColor::new(r, g, b, a)
}

pub fn lut_catalog(config: &PresetConfig) -> LutCatalog {
    let original = config.lut.include_original.then(LutEntry::identity);
    let tables = config
        .lut
        .tables
        .iter()
        .map(|table| LutEntry::file(&table.name, &table.category, table.file.clone()));
    LutCatalog::new(original.into_iter().chain(tables).collect())
}

/// Starting selection: the explicit `name`, then the configured default,
/// then the first table of the configured category.
pub fn lut_parameters(
    config: &PresetConfig,
    catalog: &LutCatalog,
    name: Option<&str>,
    intensity: Option<f32>,
) -> LutParameters {
    let by_name = |name: &str| {
        let index = catalog.position(name);
        if index.is_none() {
            tracing::warn!(lut = name, "unknown LUT requested; ignoring");
        }
        index
    };
    let category = config.lut.category.as_deref().unwrap_or(ALL_CATEGORY);
    let selected = name
        .and_then(by_name)
        .or_else(|| config.lut.default.as_deref().and_then(by_name))
        .or_else(|| catalog.first_in(category))
        .unwrap_or(0);
    LutParameters::new(selected, intensity.unwrap_or(config.lut.intensity))
}
