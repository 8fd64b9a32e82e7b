use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use renderer::params::unit_interval;
use renderer::{BlendMode, FilterKind, RowOrder};

#[derive(Parser, Debug)]
#[command(
    name = "filterlab",
    author,
    version,
    about = "GPU image filters, blends and LUT colour grading",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Configuration file; defaults to `filterlab.toml` in the config directory.
    #[arg(long, global = true, env = "FILTERLAB_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory whose `.vert`/`.frag` files replace the built-in shaders.
    #[arg(long, global = true, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Prefer wgpu's software adapter.
    #[arg(long, global = true)]
    pub fallback_adapter: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open an interactive window running one of the demos.
    Window(WindowArgs),
    /// Apply a filter to an image and write the result.
    Render(RenderArgs),
    /// Composite an overlay image onto a base image.
    Blend(BlendArgs),
    /// Colour-grade an image through a lookup table.
    Grade(GradeArgs),
    /// Inspect the shader library.
    Shaders(ShadersCommand),
    /// Inspect the configured lookup tables.
    Luts(LutsCommand),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    Clear,
    Spin,
    Filter,
    Blend,
    Lut,
}

#[derive(Args, Debug)]
pub struct WindowArgs {
    #[arg(value_enum)]
    pub demo: Demo,

    /// Window size, e.g. `1280x720`.
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Redraw only when something changes (toggle at runtime with Space).
    #[arg(long)]
    pub on_demand: bool,

    /// Source image for the filter and spin demos.
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,

    #[arg(long, value_parser = parse_filter)]
    pub filter: Option<FilterKind>,

    #[arg(long, value_name = "PATH")]
    pub base: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub overlay: Option<PathBuf>,

    #[arg(long, value_parser = parse_blend_mode)]
    pub mode: Option<BlendMode>,

    #[arg(long, value_parser = parse_unit)]
    pub alpha: Option<f32>,

    /// Initial lookup table by name.
    #[arg(long, value_name = "NAME")]
    pub lut: Option<String>,

    #[arg(long, value_parser = parse_unit)]
    pub intensity: Option<f32>,

    /// Mirror the synthetic camera horizontally, like a front camera.
    #[arg(long)]
    pub mirror: bool,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[arg(long, short, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    #[arg(long, short, value_parser = parse_filter)]
    pub filter: Option<FilterKind>,

    /// Row order of the input's pixel data.
    #[arg(long, value_parser = parse_row_order)]
    pub row_order: Option<RowOrder>,

    /// Use the CPU reference implementation instead of the GPU.
    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct BlendArgs {
    #[arg(long, value_name = "PATH")]
    pub base: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub overlay: PathBuf,

    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    #[arg(long, value_parser = parse_blend_mode)]
    pub mode: Option<BlendMode>,

    #[arg(long, value_parser = parse_unit)]
    pub alpha: Option<f32>,

    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct GradeArgs {
    #[arg(long, short, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    /// Table name from the configuration, or a path to a 512x512 LUT image.
    #[arg(long, value_name = "NAME|PATH")]
    pub lut: Option<String>,

    #[arg(long, value_parser = parse_unit)]
    pub intensity: Option<f32>,

    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct ShadersCommand {
    #[command(subcommand)]
    pub action: ShadersAction,
}

#[derive(Subcommand, Debug)]
pub enum ShadersAction {
    /// Parse, validate and link every program; `--gpu` also builds pipelines.
    Check {
        #[arg(long)]
        gpu: bool,
    },
    /// List library entries and where they come from.
    List,
}

#[derive(Args, Debug)]
pub struct LutsCommand {
    #[command(subcommand)]
    pub action: LutsAction,
}

#[derive(Subcommand, Debug)]
pub enum LutsAction {
    /// List tables with their category and whether they load.
    List,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_filter(value: &str) -> Result<FilterKind, String> {
    value.parse()
}

pub fn parse_blend_mode(value: &str) -> Result<BlendMode, String> {
    value.parse()
}

pub fn parse_row_order(value: &str) -> Result<RowOrder, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "top-down" | "topdown" | "top" => Ok(RowOrder::TopDown),
        "bottom-up" | "bottomup" | "bottom" | "gl" => Ok(RowOrder::BottomUp),
        other => Err(format!(
            "unknown row order '{other}'; expected top-down or bottom-up"
        )),
    }
}

/// Accepts a number or a slider-style percentage such as `40%`. Values
/// outside `0.0..=1.0` are clamped with a warning.
pub fn parse_unit(value: &str) -> Result<f32, String> {
    let trimmed = value.trim();
    let parsed = if let Some(percent) = trimmed.strip_suffix('%') {
        let progress: i32 = percent
            .trim()
            .parse()
            .map_err(|_| format!("invalid percentage '{trimmed}'"))?;
        progress as f32 / 100.0
    } else {
        trimmed
            .parse::<f32>()
            .map_err(|_| format!("invalid number '{trimmed}'"))?
    };
    if parsed.is_nan() {
        return Err(format!("'{trimmed}' is not a number"));
    }
    let clamped = unit_interval(parsed);
    if clamped != parsed {
        tracing::warn!(value = trimmed, clamped, "value outside [0, 1]; clamping");
    }
    Ok(clamped)
}
