use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

fn filterlab(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_filterlab"))
        .env("FILTERLAB_CONFIG_DIR", config_dir)
        .env_remove("FILTERLAB_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run filterlab")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "filterlab failed:\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write_solid(path: &Path, color: [u8; 4]) {
    RgbaImage::from_pixel(4, 4, Rgba(color)).save(path).unwrap();
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

#[test]
fn cpu_grayscale_of_red_uses_luma_weights() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("red.png");
    let output = root.path().join("out/gray.png");
    write_solid(&input, [255, 0, 0, 255]);

    let result = filterlab(
        root.path(),
        &[
            "render",
            "--cpu",
            "--input",
            path_str(&input),
            "--output",
            path_str(&output),
            "--filter",
            "grayscale",
        ],
    );
    assert_success(&result);

    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (4, 4));
    assert!(image.pixels().all(|pixel| pixel.0 == [76, 76, 76, 255]));
}

#[test]
fn cpu_invert_keeps_alpha() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("in.png");
    let output = root.path().join("inverted.png");
    write_solid(&input, [10, 200, 255, 255]);

    let result = filterlab(
        root.path(),
        &[
            "render",
            "--cpu",
            "-i",
            path_str(&input),
            "-o",
            path_str(&output),
            "-f",
            "invert",
        ],
    );
    assert_success(&result);
    let image = image::open(&output).unwrap().to_rgba8();
    assert!(image.pixels().all(|pixel| pixel.0 == [245, 55, 0, 255]));
}

#[test]
fn cpu_blend_mixes_at_half_alpha() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("base.png");
    let overlay = root.path().join("overlay.png");
    let output = root.path().join("blend.png");
    write_solid(&base, [255, 0, 0, 255]);
    write_solid(&overlay, [0, 0, 255, 255]);

    let result = filterlab(
        root.path(),
        &[
            "blend",
            "--cpu",
            "--base",
            path_str(&base),
            "--overlay",
            path_str(&overlay),
            "--output",
            path_str(&output),
            "--mode",
            "alpha",
            "--alpha",
            "50%",
        ],
    );
    assert_success(&result);
    let image = image::open(&output).unwrap().to_rgba8();
    for pixel in image.pixels() {
        assert!(pixel[0].abs_diff(128) <= 1, "got {pixel:?}");
        assert_eq!(pixel[1], 0);
        assert!(pixel[2].abs_diff(128) <= 1, "got {pixel:?}");
    }
}

#[test]
fn cpu_grade_with_original_table_keeps_colours() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("in.png");
    let output = root.path().join("graded.png");
    write_solid(&input, [200, 100, 255, 255]);

    let result = filterlab(
        root.path(),
        &[
            "grade",
            "--cpu",
            "-i",
            path_str(&input),
            "-o",
            path_str(&output),
            "--lut",
            "original",
        ],
    );
    assert_success(&result);
    let image = image::open(&output).unwrap().to_rgba8();
    for pixel in image.pixels() {
        assert!(pixel[0].abs_diff(200) <= 3, "got {pixel:?}");
        assert!(pixel[1].abs_diff(100) <= 3, "got {pixel:?}");
        assert!(pixel[2].abs_diff(255) <= 3, "got {pixel:?}");
    }
}

#[test]
fn grade_rejects_unknown_table() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("in.png");
    write_solid(&input, [1, 2, 3, 255]);
    let result = filterlab(
        root.path(),
        &[
            "grade",
            "--cpu",
            "-i",
            path_str(&input),
            "-o",
            path_str(&root.path().join("x.png")),
            "--lut",
            "no-such-table",
        ],
    );
    assert!(!result.status.success());
}

#[test]
fn shader_check_passes_for_builtin_library() {
    let root = TempDir::new().unwrap();
    let result = filterlab(root.path(), &["shaders", "check"]);
    assert_success(&result);
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("filter"), "stdout: {stdout}");
    assert!(!stdout.contains("error"), "stdout: {stdout}");
}

#[test]
fn shader_check_reports_broken_override() {
    let root = TempDir::new().unwrap();
    let shaders = root.path().join("shaders");
    fs::create_dir_all(&shaders).unwrap();
    fs::write(shaders.join("filter.frag"), "#version 450\nvoid main( {\n").unwrap();

    let result = filterlab(root.path(), &["shaders", "check"]);
    assert!(!result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("error"), "stdout: {stdout}");
}

#[test]
fn lut_listing_flags_missing_tables() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("filterlab.toml"),
        r#"
version = 1

[[lut.tables]]
name = "ghost"
file = "missing.png"
category = "film"
"#,
    )
    .unwrap();

    let result = filterlab(root.path(), &["luts", "list"]);
    assert_success(&result);
    let stdout = String::from_utf8_lossy(&result.stdout);
    let ghost = stdout
        .lines()
        .find(|line| line.starts_with("ghost"))
        .expect("ghost table listed");
    assert!(ghost.contains("unavailable"), "line: {ghost}");
    assert!(stdout.lines().any(|line| line.starts_with("original")));
}

#[test]
fn invalid_configuration_is_fatal() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("filterlab.toml"), "version = 7\n").unwrap();
    let result = filterlab(root.path(), &["luts", "list"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("configuration"));
}

#[test]
fn out_of_range_alpha_is_clamped() {
    let root = TempDir::new().unwrap();
    let base = root.path().join("base.png");
    let overlay = root.path().join("overlay.png");
    let output = root.path().join("blend.png");
    write_solid(&base, [255, 0, 0, 255]);
    write_solid(&overlay, [0, 0, 255, 255]);

    let result = filterlab(
        root.path(),
        &[
            "blend",
            "--cpu",
            "--base",
            path_str(&base),
            "--overlay",
            path_str(&overlay),
            "--output",
            path_str(&output),
            "--mode",
            "alpha",
            "--alpha",
            "1.5",
        ],
    );
    assert_success(&result);
    let image = image::open(&output).unwrap().to_rgba8();
    assert!(image.pixels().all(|pixel| pixel.0 == [0, 0, 255, 255]));
}
