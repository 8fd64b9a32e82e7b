use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;
use presets::parse_size;
use renderer::lut::load_rgba;
use renderer::{
    BlendControls, BlendParameters, BlendPipeline, ClearControls, ClearRenderer, FilterControls,
    FilterPipeline, LutControls, LutPipeline, RenderMode, SpinControls, SpinRenderer, WindowHost,
    WindowOptions,
};

use crate::bindings::{
    blend_mode, clear_color, filter_kind, lut_catalog, lut_parameters, render_mode, row_order,
};
use crate::camera::{synthetic_frame, test_card, CameraOptions, SyntheticCamera};
use crate::cli::{Demo, WindowArgs};
use crate::controls::{blend_keys, clear_keys, filter_keys, lut_keys, spin_keys};
use crate::run::Session;

const CARD_WIDTH: u32 = 640;
const CARD_HEIGHT: u32 = 480;

pub fn run_window(session: &Session, args: WindowArgs) -> Result<()> {
    let options = window_options(session, &args)?;
    tracing::info!(
        demo = demo_name(args.demo),
        size = ?options.size,
        mode = ?options.render_mode,
        "opening window"
    );
    let host = WindowHost::new(options);
    match args.demo {
        Demo::Clear => run_clear(session, host),
        Demo::Spin => run_spin(session, host, &args),
        Demo::Filter => run_filter(session, host, &args),
        Demo::Blend => run_blend(session, host, &args),
        Demo::Lut => run_lut(session, host, &args),
    }
}

fn window_options(session: &Session, args: &WindowArgs) -> Result<WindowOptions> {
    let config = &session.config;
    let size = match args.size.as_deref() {
        Some(raw) => parse_size(raw)?,
        None => config.window_size()?,
    };
    let render_mode = if args.on_demand {
        RenderMode::OnDemand
    } else {
        render_mode(config.window.render_mode)
    };
    Ok(WindowOptions {
        title: format!("{} - {}", config.window.title, demo_name(args.demo)),
        size,
        render_mode,
        gpu: session.gpu.clone(),
    })
}

fn demo_name(demo: Demo) -> &'static str {
    match demo {
        Demo::Clear => "clear",
        Demo::Spin => "spin",
        Demo::Filter => "filter",
        Demo::Blend => "blend",
        Demo::Lut => "lut",
    }
}

/// First of `candidates` that is set, decoded; `None` when none is set.
fn load_first(candidates: &[Option<&PathBuf>]) -> Result<Option<RgbaImage>> {
    let Some(path) = candidates.iter().flatten().next() else {
        return Ok(None);
    };
    load_image(path).map(Some)
}

fn load_image(path: &Path) -> Result<RgbaImage> {
    let image = load_rgba(path).with_context(|| format!("failed to load {}", path.display()))?;
    tracing::info!(path = %path.display(), width = image.width(), height = image.height(), "loaded image");
    Ok(image)
}

fn run_clear(session: &Session, host: WindowHost) -> Result<()> {
    let controls = Arc::new(ClearControls::new(clear_color(&session.config)));
    let renderer = ClearRenderer::new(Arc::clone(&controls));
    host.run(renderer, clear_keys(controls), |_| {})
}

fn run_spin(session: &Session, host: WindowHost, args: &WindowArgs) -> Result<()> {
    let config = &session.config;
    let controls = Arc::new(SpinControls::new());
    if let Some(image) = load_first(&[args.image.as_ref(), config.spin.image.as_ref()])? {
        controls.load_image(image);
    }
    let renderer = SpinRenderer::new(Arc::clone(&controls), Arc::clone(&session.library))
        .with_background(clear_color(config));
    host.run(renderer, spin_keys(controls, config.spin.step), |_| {})
}

fn run_filter(session: &Session, host: WindowHost, args: &WindowArgs) -> Result<()> {
    let config = &session.config;
    let kind = args.filter.unwrap_or_else(|| filter_kind(config.filter.kind));
    let controls = Arc::new(FilterControls::new(kind));
    let image = load_first(&[args.image.as_ref(), config.filter.image.as_ref()])?
        .unwrap_or_else(|| test_card(CARD_WIDTH, CARD_HEIGHT));
    controls.load_image(image);
    let renderer = FilterPipeline::new(Arc::clone(&controls), Arc::clone(&session.library))
        .with_row_order(row_order(config.filter.row_order));
    host.run(renderer, filter_keys(controls), |_| {})
}

fn run_blend(session: &Session, host: WindowHost, args: &WindowArgs) -> Result<()> {
    let config = &session.config;
    let mode = args.mode.unwrap_or_else(|| blend_mode(config.blend.mode));
    let alpha = args.alpha.unwrap_or(config.blend.alpha);
    let controls = Arc::new(BlendControls::new(BlendParameters::new(mode, alpha)));
    let base = load_first(&[args.base.as_ref(), config.blend.base.as_ref()])?
        .unwrap_or_else(|| test_card(CARD_WIDTH, CARD_HEIGHT));
    let overlay = load_first(&[args.overlay.as_ref(), config.blend.overlay.as_ref()])?
        .unwrap_or_else(|| synthetic_frame(CARD_WIDTH, CARD_HEIGHT, 0.0));
    controls.load_base(base);
    controls.load_overlay(overlay);
    let renderer = BlendPipeline::new(Arc::clone(&controls), Arc::clone(&session.library));
    host.run(renderer, blend_keys(controls), |_| {})
}

fn run_lut(session: &Session, host: WindowHost, args: &WindowArgs) -> Result<()> {
    let config = &session.config;
    let catalog = lut_catalog(config);
    let params = lut_parameters(config, &catalog, args.lut.as_deref(), args.intensity);
    let controls = Arc::new(LutControls::new(catalog, params));
    if let Some(category) = config.lut.category.as_deref() {
        if controls.set_category(category).is_none() {
            tracing::warn!(category, "configured LUT category has no tables");
        }
        // an explicit --lut wins over the category's first table
        if let Some(name) = args.lut.as_deref() {
            controls.select_name(name);
        }
    }
    let camera_options = CameraOptions {
        frame_interval: config.lut.frame_interval,
        ready_timeout: config.lut.ready_timeout,
        mirror: args.mirror,
    };

    let mut camera = None;
    let renderer = LutPipeline::new(Arc::clone(&controls), Arc::clone(&session.library));
    let result = host.run(renderer, lut_keys(Arc::clone(&controls)), |_| {
        match SyntheticCamera::spawn(Arc::clone(&controls), camera_options) {
            Ok(spawned) => camera = Some(spawned),
            Err(err) => tracing::error!(error = %err, "camera unavailable"),
        }
    });
    if let Some(camera) = camera {
        camera.stop();
    }
    tracing::info!(
        dropped = controls.dropped_frames(),
        superseded = controls.superseded_frames(),
        "LUT session finished"
    );
    result
}
