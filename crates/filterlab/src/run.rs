use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use presets::PresetConfig;
use renderer::{GpuOptions, ShaderLibrary};
use tracing_subscriber::EnvFilter;

use crate::bindings::power_preference;
use crate::cli::{Cli, Command, GlobalArgs, LutsAction, ShadersAction};
use crate::paths::AppPaths;
use crate::{interactive, offline};

/// Everything a command needs after configuration has been resolved.
pub struct Session {
    pub config: PresetConfig,
    pub library: Arc<ShaderLibrary>,
    pub gpu: GpuOptions,
}

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved filterlab paths");
    let session = prepare(&cli.global, &paths)?;

    match cli.command {
        Command::Window(args) => interactive::run_window(&session, args),
        Command::Render(args) => offline::render(&session, args),
        Command::Blend(args) => offline::blend(&session, args),
        Command::Grade(args) => offline::grade(&session, args),
        Command::Shaders(command) => match command.action {
            ShadersAction::Check { gpu } => offline::check_shaders(&session, gpu),
            ShadersAction::List => offline::list_shaders(&session),
        },
        Command::Luts(command) => match command.action {
            LutsAction::List => offline::list_luts(&session),
        },
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn prepare(global: &GlobalArgs, paths: &AppPaths) -> Result<Session> {
    let config = load_config(global.config.as_ref(), paths)?;
    let library = load_library(global.shader_dir.as_ref(), paths)?;
    let gpu = GpuOptions {
        power: power_preference(config.window.power),
        force_fallback_adapter: global.fallback_adapter,
    };
    Ok(Session {
        config,
        library: Arc::new(library),
        gpu,
    })
}

/// An explicit `--config` must exist; the default location is optional.
fn load_config(explicit: Option<&PathBuf>, paths: &AppPaths) -> Result<PresetConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("configuration file {} does not exist", path.display());
        }
        let config = PresetConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded configuration");
        return Ok(config);
    }

    let default_path = paths.config_file();
    if default_path.is_file() {
        let config = PresetConfig::load(&default_path)
            .with_context(|| format!("failed to load configuration {}", default_path.display()))?;
        tracing::info!(path = %default_path.display(), "loaded configuration");
        return Ok(config);
    }

    tracing::debug!(path = %default_path.display(), "no configuration file; using defaults");
    Ok(PresetConfig::default())
}

fn load_library(explicit: Option<&PathBuf>, paths: &AppPaths) -> Result<ShaderLibrary> {
    let library = ShaderLibrary::builtin();
    if let Some(dir) = explicit {
        return library
            .with_overrides(dir)
            .with_context(|| format!("failed to read shader overrides from {}", dir.display()));
    }
    let dir = paths.shader_dir();
    if dir.is_dir() {
        return library
            .with_overrides(&dir)
            .with_context(|| format!("failed to read shader overrides from {}", dir.display()));
    }
    Ok(library)
}
