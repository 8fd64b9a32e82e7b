//! One-shot commands: render, blend and grade to image files, plus the
//! shader and LUT inspection commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use image::imageops;
use image::RgbaImage;
use renderer::gpu::IMAGE_FORMAT;
use renderer::library::ShaderOrigin;
use renderer::lut::{load_rgba, LutSource};
use renderer::{
    compile, reference, BlendControls, BlendParameters, BlendPipeline, ExternalFrame,
    FilterControls, FilterPipeline, FrameOutcome, HeadlessHost, LutCatalog, LutControls,
    LutEntry, LutParameters, LutPipeline, ProgramSpec, RowOrder, ShaderProgram,
};

use crate::bindings::{blend_mode, filter_kind, lut_catalog, lut_parameters, row_order};
use crate::cli::{BlendArgs, GradeArgs, RenderArgs};
use crate::run::Session;

/// Name given to a table passed to `grade --lut` as a file path.
const PATH_LUT_NAME: &str = "custom";

pub fn render(session: &Session, args: RenderArgs) -> Result<()> {
    let image = load_rgba(&args.input)?;
    let kind = args
        .filter
        .unwrap_or_else(|| filter_kind(session.config.filter.kind));
    let rows = args
        .row_order
        .unwrap_or_else(|| row_order(session.config.filter.row_order));
    tracing::info!(input = %args.input.display(), filter = %kind, ?rows, "rendering");

    let output = match gpu_host(session, args.cpu)? {
        Some(host) => {
            let (width, height) = image.dimensions();
            let controls = Arc::new(FilterControls::new(kind));
            controls.load_image(image);
            let mut pipeline =
                FilterPipeline::new(controls, Arc::clone(&session.library)).with_row_order(rows);
            let frame = host
                .render(&mut pipeline, width, height, 1)
                .context("filter render failed")?;
            expect_drawn(frame.outcome)?;
            frame.image
        }
        None => reference::apply_filter(&oriented(image, rows), kind),
    };
    save(&output, &args.output)
}

pub fn blend(session: &Session, args: BlendArgs) -> Result<()> {
    let base = load_rgba(&args.base)?;
    let overlay = load_rgba(&args.overlay)?;
    let mode = args
        .mode
        .unwrap_or_else(|| blend_mode(session.config.blend.mode));
    let params = BlendParameters::new(mode, args.alpha.unwrap_or(session.config.blend.alpha));
    if base.dimensions() != overlay.dimensions() {
        tracing::warn!(
            base = ?base.dimensions(),
            overlay = ?overlay.dimensions(),
            "overlay size differs from base; it will be resampled"
        );
    }
    tracing::info!(mode = %params.mode(), alpha = params.alpha(), "blending");

    let output = match gpu_host(session, args.cpu)? {
        Some(host) => {
            let (width, height) = base.dimensions();
            let controls = Arc::new(BlendControls::new(params));
            controls.load_base(base);
            controls.load_overlay(overlay);
            let mut pipeline = BlendPipeline::new(controls, Arc::clone(&session.library));
            let frame = host
                .render(&mut pipeline, width, height, 1)
                .context("blend render failed")?;
            expect_drawn(frame.outcome)?;
            frame.image
        }
        None => reference::blend_images(&base, &overlay, params),
    };
    save(&output, &args.output)
}

pub fn grade(session: &Session, args: GradeArgs) -> Result<()> {
    let image = load_rgba(&args.input)?;
    let configured = lut_catalog(&session.config);
    let (catalog, params) = match args.lut.as_deref() {
        Some(name) if configured.position(name).is_none() => {
            let path = Path::new(name);
            if !path.is_file() {
                bail!("'{name}' is neither a configured LUT nor an existing file");
            }
            let catalog = LutCatalog::new(vec![LutEntry::file(
                PATH_LUT_NAME,
                PATH_LUT_NAME,
                path.to_path_buf(),
            )]);
            let intensity = args.intensity.unwrap_or(session.config.lut.intensity);
            (catalog, LutParameters::new(0, intensity))
        }
        name => {
            let params = lut_parameters(&session.config, &configured, name, args.intensity);
            (configured, params)
        }
    };
    let entry = catalog
        .get(params.selected)
        .context("no lookup table is configured")?
        .clone();
    let table = entry
        .load()
        .with_context(|| format!("failed to load LUT '{}'", entry.name))?;
    tracing::info!(lut = %entry.name, intensity = params.intensity(), "grading");

    let output = match gpu_host(session, args.cpu)? {
        Some(host) => {
            let (width, height) = image.dimensions();
            let controls = Arc::new(LutControls::new(catalog, params));
            controls.submit(ExternalFrame::new(image));
            let mut pipeline = LutPipeline::new(controls, Arc::clone(&session.library));
            let frame = host
                .render(&mut pipeline, width, height, 1)
                .context("LUT render failed")?;
            expect_drawn(frame.outcome)?;
            frame.image
        }
        None => reference::grade_image(&image, &table, params.intensity()),
    };
    save(&output, &args.output)
}

pub fn check_shaders(session: &Session, gpu: bool) -> Result<()> {
    let mut failures = 0usize;
    for (spec, result) in compile::check_library(&session.library) {
        match result {
            Ok(interface) => println!(
                "ok     {:<12} uniform block {} bytes",
                spec.label,
                interface.uniform_buffer_size()
            ),
            Err(err) => {
                failures += 1;
                println!("error  {:<12} {err}", spec.label);
            }
        }
    }
    if failures == 0 && gpu {
        failures += build_pipelines(session)?;
    }
    if failures > 0 {
        bail!("{failures} shader program(s) failed validation");
    }
    Ok(())
}

fn build_pipelines(session: &Session) -> Result<usize> {
    let Some(host) = gpu_host(session, false)? else {
        println!("skipped GPU pipeline check: no adapter");
        return Ok(0);
    };
    let mut failures = 0;
    for spec in ProgramSpec::ALL {
        match ShaderProgram::new(host.gpu(), &session.library, &spec, IMAGE_FORMAT) {
            Ok(program) => println!("linked {:<12} on {}", program.label(), host.gpu().profile().name),
            Err(err) => {
                failures += 1;
                println!("error  {:<12} {err}", spec.label);
            }
        }
    }
    Ok(failures)
}

pub fn list_shaders(session: &Session) -> Result<()> {
    for asset in session.library.assets() {
        let origin = match &asset.origin {
            ShaderOrigin::Builtin { revision } => format!("builtin r{revision}"),
            ShaderOrigin::Override { path } => path.display().to_string(),
        };
        println!("{:<18} {:<9} {origin}", asset.name, asset.stage.to_string());
    }
    Ok(())
}

pub fn list_luts(session: &Session) -> Result<()> {
    let catalog = lut_catalog(&session.config);
    for entry in catalog.entries() {
        let source = match &entry.source {
            LutSource::Identity => "identity".to_string(),
            LutSource::File(path) => path.display().to_string(),
        };
        let status = match entry.load() {
            Ok(_) => "ok".to_string(),
            Err(err) => format!("unavailable ({err})"),
        };
        println!("{:<16} {:<12} {source}  {status}", entry.name, entry.category);
    }
    Ok(())
}

/// Headless GPU host, or `None` when the CPU path should be used.
fn gpu_host(session: &Session, cpu: bool) -> Result<Option<HeadlessHost>> {
    if cpu {
        return Ok(None);
    }
    match HeadlessHost::new(&session.gpu) {
        Ok(host) => Ok(Some(host)),
        Err(err) if err.is_unavailable() => {
            tracing::warn!(error = %err, "no usable GPU; falling back to the CPU renderer");
            Ok(None)
        }
        Err(err) => Err(err).context("failed to set up the GPU"),
    }
}

fn expect_drawn(outcome: FrameOutcome) -> Result<()> {
    match outcome {
        FrameOutcome::Drawn => Ok(()),
        other => bail!("renderer did not produce a frame ({other:?})"),
    }
}

/// Puts the image in the orientation the GPU path would display it in.
fn oriented(image: RgbaImage, rows: RowOrder) -> RgbaImage {
    match rows {
        RowOrder::TopDown => image,
        RowOrder::BottomUp => imageops::flip_vertical(&image),
    }
}

fn save(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), width = image.width(), height = image.height(), "wrote image");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn bottom_up_sources_are_flipped_for_the_cpu_path() {
        let image = RgbaImage::from_fn(1, 2, |_, y| {
            if y == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let flipped = oriented(image.clone(), RowOrder::BottomUp);
        assert_eq!(flipped.get_pixel(0, 0), image.get_pixel(0, 1));
        assert_eq!(oriented(image.clone(), RowOrder::TopDown), image);
    }

    #[test]
    fn only_drawn_frames_are_written() {
        assert!(expect_drawn(FrameOutcome::Drawn).is_ok());
        assert!(expect_drawn(FrameOutcome::Waiting).is_err());
        assert!(expect_drawn(FrameOutcome::Skipped).is_err());
    }
}
