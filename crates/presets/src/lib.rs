use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Name the built-in identity table is listed under.
pub const ORIGINAL_LUT: &str = "original";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderModeSetting {
    #[default]
    Continuous,
    #[serde(alias = "ondemand", alias = "when-dirty")]
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSetting {
    #[default]
    #[serde(alias = "none")]
    Identity,
    #[serde(alias = "gray")]
    Grayscale,
    Invert,
    #[serde(alias = "box-blur")]
    Blur,
    #[serde(alias = "sobel")]
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendSetting {
    #[default]
    Alpha,
    Add,
    Multiply,
    Screen,
    Overlay,
    #[serde(alias = "softlight")]
    SoftLight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowOrderSetting {
    #[default]
    TopDown,
    BottomUp,
}

/// Whole-file configuration. Every section is optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresetConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub blend: BlendSection,
    #[serde(default)]
    pub lut: LutSection,
    #[serde(default)]
    pub clear: ClearSection,
    #[serde(default)]
    pub spin: SpinSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSection {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default)]
    pub render_mode: RenderModeSetting,
    #[serde(default)]
    pub power: PowerSetting,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            size: default_size(),
            render_mode: RenderModeSetting::default(),
            power: PowerSetting::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterSection {
    #[serde(default)]
    pub kind: FilterSetting,
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub row_order: RowOrderSetting,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlendSection {
    #[serde(default)]
    pub mode: BlendSetting,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    pub base: Option<PathBuf>,
    pub overlay: Option<PathBuf>,
}

impl Default for BlendSection {
    fn default() -> Self {
        Self {
            mode: BlendSetting::default(),
            alpha: default_alpha(),
            base: None,
            overlay: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LutSection {
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Pacing of the synthetic frame source.
    #[serde(
        default = "default_frame_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub frame_interval: Duration,
    /// How long a producer waits for the renderer to publish its frame sink.
    #[serde(
        default = "default_ready_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub ready_timeout: Duration,
    pub default: Option<String>,
    pub category: Option<String>,
    /// Lists the identity table first under the name `original`.
    #[serde(default = "default_true")]
    pub include_original: bool,
    #[serde(default)]
    pub tables: Vec<LutTable>,
}

impl Default for LutSection {
    fn default() -> Self {
        Self {
            intensity: default_intensity(),
            frame_interval: default_frame_interval(),
            ready_timeout: default_ready_timeout(),
            default: None,
            category: None,
            include_original: true,
            tables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LutTable {
    pub name: String,
    pub file: PathBuf,
    #[serde(default = "default_category")]
    pub category: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClearSection {
    #[serde(default = "default_clear_color")]
    pub color: [f32; 4],
}

impl Default for ClearSection {
    fn default() -> Self {
        Self {
            color: default_clear_color(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpinSection {
    pub image: Option<PathBuf>,
    /// Degrees per key press in on-demand mode.
    #[serde(default = "default_step")]
    pub step: f32,
}

impl Default for SpinSection {
    fn default() -> Self {
        Self {
            image: None,
            step: default_step(),
        }
    }
}

fn default_title() -> String {
    "filterlab".to_string()
}

fn default_size() -> String {
    "1280x720".to_string()
}

fn default_alpha() -> f32 {
    0.5
}

fn default_intensity() -> f32 {
    1.0
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(33)
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "custom".to_string()
}

fn default_clear_color() -> [f32; 4] {
    [0.2, 0.3, 0.5, 1.0]
}

fn default_step() -> f32 {
    15.0
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

/// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
pub fn parse_size(raw: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::Invalid(format!("size '{raw}' must look like WIDTHxHEIGHT"));
    let (width, height) = raw
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(ConfigError::Invalid(format!(
            "size '{raw}' must have positive dimensions"
        )));
    }
    Ok((width, height))
}

/// Clamps `value` into `[0, 1]`, warning when it had to move. NaN is an error.
fn clamp_unit(name: &str, value: &mut f32) -> Result<(), ConfigError> {
    if value.is_nan() {
        return Err(ConfigError::Invalid(format!("{name} must be a number")));
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != *value {
        tracing::warn!(key = name, value = *value, clamped, "value outside [0, 1]; clamping");
        *value = clamped;
    }
    Ok(())
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            version: 1,
            window: WindowSection::default(),
            filter: FilterSection::default(),
            blend: BlendSection::default(),
            lut: LutSection::default(),
            clear: ClearSection::default(),
            spin: SpinSection::default(),
        }
    }
}

impl PresetConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let mut raw: PresetConfig = toml::from_str(input)?;
        raw.clamp_units()?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`. Relative image and table paths are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        for path in [
            self.filter.image.as_mut(),
            self.blend.base.as_mut(),
            self.blend.overlay.as_mut(),
            self.spin.image.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
        for table in &mut self.lut.tables {
            resolve(&mut table.file);
        }
    }

    pub fn window_size(&self) -> Result<(u32, u32), ConfigError> {
        parse_size(&self.window.size)
    }

    /// Pulls the unit-range knobs (blend alpha, LUT intensity, clear colour)
    /// into `[0, 1]`.
    pub fn clamp_units(&mut self) -> Result<(), ConfigError> {
        clamp_unit("blend.alpha", &mut self.blend.alpha)?;
        clamp_unit("lut.intensity", &mut self.lut.intensity)?;
        for (channel, value) in ["r", "g", "b", "a"].iter().zip(self.clear.color.iter_mut()) {
            clamp_unit(&format!("clear.color.{channel}"), value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        self.window_size()?;
        if self.window.title.trim().is_empty() {
            return Err(ConfigError::Invalid("window.title may not be empty".into()));
        }

        let units = [self.blend.alpha, self.lut.intensity]
            .into_iter()
            .chain(self.clear.color);
        if units.into_iter().any(|value| !(0.0..=1.0).contains(&value)) {
            return Err(ConfigError::Invalid(
                "blend.alpha, lut.intensity and clear.color must be within [0, 1]".into(),
            ));
        }
        if !self.spin.step.is_finite() {
            return Err(ConfigError::Invalid("spin.step must be finite".into()));
        }

        if self.lut.frame_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "lut.frame_interval must be greater than zero".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        if self.lut.include_original {
            seen.insert(ORIGINAL_LUT);
        }
        for table in &self.lut.tables {
            let name = table.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid(
                    "lut.tables contains a table with an empty name".into(),
                ));
            }
            if table.category.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "lut table '{name}' has an empty category"
                )));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!(
                    "lut table '{name}' is defined more than once"
                )));
            }
        }
        if seen.is_empty() {
            return Err(ConfigError::Invalid(
                "lut.include_original is false but no tables are defined".into(),
            ));
        }

        if let Some(default) = &self.lut.default {
            if !seen.contains(default.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "lut.default references unknown table '{default}'"
                )));
            }
        }

        Ok(())
    }
}
