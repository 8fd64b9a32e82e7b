use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use renderer::gpu::{OffscreenTarget, IMAGE_FORMAT};
use renderer::lut::identity_lut;
use renderer::reference;
use renderer::{
    BlendControls, BlendMode, BlendParameters, BlendPipeline, ClearColor, ClearControls,
    ClearRenderer, ExternalFrame, FilterControls, FilterKind, FilterPipeline, FrameOutcome,
    GpuOptions, HeadlessHost, LutCatalog, LutControls, LutParameters, LutPipeline, Renderer,
    RenderError, ShaderLibrary,
};

/// Returns None (and the test passes vacuously) on machines without any
/// wgpu adapter, software rasterisers included.
fn host() -> Option<HeadlessHost> {
    match HeadlessHost::new(&GpuOptions::default()) {
        Ok(host) => Some(host),
        Err(err) if err.is_unavailable() => {
            eprintln!("skipping GPU test: {err}");
            None
        }
        Err(err) => panic!("unexpected GPU setup failure: {err}"),
    }
}

fn library() -> Arc<ShaderLibrary> {
    Arc::new(ShaderLibrary::builtin())
}

fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / (width - 1)) as u8,
            (y * 255 / (height - 1)) as u8,
            ((x + y) * 17 % 256) as u8,
            255,
        ])
    })
}

fn assert_close(actual: &RgbaImage, expected: &RgbaImage, tolerance: u8) {
    assert_eq!(actual.dimensions(), expected.dimensions());
    for (x, y, pixel) in actual.enumerate_pixels() {
        let want = expected.get_pixel(x, y);
        for channel in 0..4 {
            let diff = pixel[channel].abs_diff(want[channel]);
            assert!(
                diff <= tolerance,
                "pixel ({x}, {y}) channel {channel}: got {:?}, want {:?}",
                pixel,
                want
            );
        }
    }
}

fn run_filter(host: &HeadlessHost, image: RgbaImage, kind: FilterKind) -> RgbaImage {
    let (width, height) = image.dimensions();
    let controls = Arc::new(FilterControls::new(kind));
    controls.load_image(image);
    let mut pipeline = FilterPipeline::new(controls, library());
    let frame = host
        .render(&mut pipeline, width, height, 1)
        .expect("filter frame");
    assert_eq!(frame.outcome, FrameOutcome::Drawn);
    frame.image
}

#[test]
fn grayscale_of_red_is_luma_weight() {
    let Some(host) = host() else { return };
    let output = run_filter(&host, solid(4, 4, [255, 0, 0, 255]), FilterKind::Grayscale);
    for pixel in output.pixels() {
        for channel in 0..3 {
            assert!(pixel[channel].abs_diff(76) <= 1, "got {pixel:?}");
        }
        assert_eq!(pixel[3], 255);
    }
}

#[test]
fn identity_keeps_rows_top_down() {
    let Some(host) = host() else { return };
    let image = RgbaImage::from_fn(4, 4, |_, y| {
        if y < 2 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    let output = run_filter(&host, image.clone(), FilterKind::Identity);
    assert_close(&output, &image, 1);
}

#[test]
fn blur_of_uniform_image_is_unchanged() {
    let Some(host) = host() else { return };
    let image = solid(8, 8, [90, 140, 200, 255]);
    let output = run_filter(&host, image.clone(), FilterKind::BoxBlur);
    assert_close(&output, &image, 1);
}

#[test]
fn reselecting_the_current_filter_renders_the_same_frame() {
    let Some(host) = host() else { return };
    let image = gradient(8, 8);
    let controls = Arc::new(FilterControls::new(FilterKind::Identity));
    let mut pipeline = FilterPipeline::new(Arc::clone(&controls), library());

    assert!(controls.select(FilterKind::Edge));
    controls.load_image(image.clone());
    let first = host.render(&mut pipeline, 8, 8, 1).expect("first frame");

    assert!(!controls.select(FilterKind::Edge));
    controls.load_image(image);
    let second = host.render(&mut pipeline, 8, 8, 1).expect("second frame");

    assert_eq!(first.outcome, FrameOutcome::Drawn);
    assert_eq!(second.outcome, FrameOutcome::Drawn);
    assert_eq!(first.image, second.image);
}

#[test]
fn kernel_filters_match_cpu_reference() {
    let Some(host) = host() else { return };
    let image = gradient(16, 12);
    for kind in [FilterKind::Invert, FilterKind::BoxBlur, FilterKind::Edge] {
        let output = run_filter(&host, image.clone(), kind);
        assert_close(&output, &reference::apply_filter(&image, kind), 2);
    }
}

#[test]
fn filter_without_source_waits_on_black() {
    let Some(host) = host() else { return };
    let mut pipeline = FilterPipeline::new(Arc::new(FilterControls::default()), library());
    let frame = host.render(&mut pipeline, 4, 4, 2).expect("frame");
    assert_eq!(frame.outcome, FrameOutcome::Waiting);
    assert!(frame.image.pixels().all(|pixel| pixel.0 == [0, 0, 0, 255]));
}

#[test]
fn half_alpha_blend_mixes_base_and_overlay() {
    let Some(host) = host() else { return };
    let controls = Arc::new(BlendControls::new(BlendParameters::new(BlendMode::Alpha, 0.5)));
    controls.load_base(solid(4, 4, [255, 0, 0, 255]));
    controls.load_overlay(solid(4, 4, [0, 0, 255, 255]));
    let mut pipeline = BlendPipeline::new(Arc::clone(&controls), library());
    let frame = host.render(&mut pipeline, 4, 4, 1).expect("blend frame");
    assert_eq!(frame.outcome, FrameOutcome::Drawn);
    for pixel in frame.image.pixels() {
        assert!(pixel[0].abs_diff(128) <= 1, "got {pixel:?}");
        assert_eq!(pixel[1], 0);
        assert!(pixel[2].abs_diff(128) <= 1, "got {pixel:?}");
        assert_eq!(pixel[3], 255);
    }
}

#[test]
fn blend_modes_match_cpu_reference() {
    let Some(host) = host() else { return };
    let base = gradient(8, 8);
    let overlay = RgbaImage::from_fn(8, 8, |x, y| Rgba([200, (x * 30) as u8, (y * 30) as u8, 255]));
    for mode in BlendMode::ALL {
        let params = BlendParameters::new(mode, 0.7);
        let controls = Arc::new(BlendControls::new(params));
        controls.load_base(base.clone());
        controls.load_overlay(overlay.clone());
        let mut pipeline = BlendPipeline::new(controls, library());
        let frame = host.render(&mut pipeline, 8, 8, 1).expect("blend frame");
        assert_close(&frame.image, &reference::blend_images(&base, &overlay, params), 2);
    }
}

#[test]
fn clear_renderer_fills_with_colour() {
    let Some(host) = host() else { return };
    let controls = Arc::new(ClearControls::new(ClearColor::rgb(1.0, 0.0, 0.0)));
    let mut renderer = ClearRenderer::new(controls);
    let frame = host.render(&mut renderer, 3, 3, 1).expect("clear frame");
    assert!(frame.image.pixels().all(|pixel| pixel.0 == [255, 0, 0, 255]));
}

#[test]
fn lut_pipeline_grades_pushed_frames() {
    let Some(host) = host() else { return };
    let controls = Arc::new(LutControls::new(
        LutCatalog::default(),
        LutParameters::new(0, 1.0),
    ));
    let mut pipeline = LutPipeline::new(Arc::clone(&controls), library());
    let target = renderer::TargetInfo {
        format: IMAGE_FORMAT,
        width: 4,
        height: 4,
    };
    pipeline.on_init(host.gpu(), target).expect("init");
    let sink = controls
        .frame_sink(Duration::from_secs(1))
        .expect("sink published by on_init");

    let image = RgbaImage::from_fn(4, 4, |x, y| {
        Rgba([(x * 60) as u8, (y * 80) as u8, if x > 1 { 255 } else { 0 }, 255])
    });
    let mut out = OffscreenTarget::new(host.gpu(), "lut test", IMAGE_FORMAT);
    out.resize(host.gpu(), 4, 4).expect("target");
    let view = out.binding().expect("allocated").view;
    let frame_target = renderer::FrameTarget {
        view,
        width: 4,
        height: 4,
        mode: renderer::RenderMode::Continuous,
    };
    assert_eq!(
        pipeline.on_frame(host.gpu(), &frame_target).expect("frame"),
        FrameOutcome::Waiting
    );

    sink.push(ExternalFrame::new(image.clone()));
    assert_eq!(
        pipeline.on_frame(host.gpu(), &frame_target).expect("frame"),
        FrameOutcome::Drawn
    );
    let texture = out.texture().expect("allocated");
    let graded = renderer::gpu::read_texture(host.gpu(), texture, 4, 4).expect("readback");
    assert_close(&graded, &reference::grade_image(&image, &identity_lut(), 1.0), 3);

    sink.push(ExternalFrame::new(RgbaImage::new(0, 0)));
    assert_eq!(
        pipeline.on_frame(host.gpu(), &frame_target).expect("frame"),
        FrameOutcome::Skipped
    );
    assert_eq!(controls.dropped_frames(), 1);

    pipeline.release();
    assert!(controls.try_frame_sink().is_none());
}

#[test]
fn offscreen_resize_is_idempotent() {
    let Some(host) = host() else { return };
    let mut target = OffscreenTarget::new(host.gpu(), "resize test", IMAGE_FORMAT);
    assert!(target.resize(host.gpu(), 16, 8).expect("first allocation"));
    assert!(!target.resize(host.gpu(), 16, 8).expect("same size"));
    assert_eq!(target.generation(), 1);
    assert!(target.resize(host.gpu(), 8, 8).expect("new size"));
    assert_eq!(target.generation(), 2);
    assert_eq!(target.size(), Some((8, 8)));
}

#[test]
fn zero_sized_target_is_incomplete() {
    let Some(host) = host() else { return };
    let mut target = OffscreenTarget::new(host.gpu(), "zero", IMAGE_FORMAT);
    let err = target.resize(host.gpu(), 0, 4).unwrap_err();
    assert!(matches!(err, RenderError::IncompleteTarget { .. }));
    assert!(target.binding().is_none());
}

#[test]
fn every_builtin_program_links() {
    let Some(host) = host() else { return };
    let library = ShaderLibrary::builtin();
    for spec in renderer::ProgramSpec::ALL {
        let program = renderer::ShaderProgram::new(host.gpu(), &library, &spec, IMAGE_FORMAT)
            .unwrap_or_else(|err| panic!("{}: {err}", spec.label));
        assert_eq!(program.attribute_location("a_position"), Some(0));
        assert_eq!(program.uniform_location("u_does_not_exist"), None);
    }
}

#[test]
fn renderers_release_twice_safely() {
    let Some(host) = host() else { return };
    let mut renderer = ClearRenderer::new(Arc::new(ClearControls::default()));
    host.render(&mut renderer, 2, 2, 1).expect("frame");
    renderer.release();
    renderer.release();
}
