//! CPU implementation of the filter, blend and LUT math.
//!
//! Mirrors the fragment shaders texel for texel: neighbours are read with
//! clamp-to-edge addressing and lookup tables are sampled bilinearly. It is
//! the fallback backend when no GPU adapter exists and the oracle the GPU
//! tests compare against.

use image::{Rgba, RgbaImage};

use crate::lut::lut_coordinate;
use crate::params::{unit_interval, BlendParameters};
use crate::types::{BlendMode, FilterKind};

const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

pub fn to_unit(pixel: Rgba<u8>) -> [f32; 4] {
    pixel.0.map(|channel| channel as f32 / 255.0)
}

pub fn from_unit(color: [f32; 4]) -> Rgba<u8> {
    Rgba(color.map(|channel| (unit_interval(channel) * 255.0).round() as u8))
}

pub fn luma(color: [f32; 4]) -> f32 {
    color[0] * LUMA[0] + color[1] * LUMA[1] + color[2] * LUMA[2]
}

/// Clamp-to-edge read. An empty image reads as transparent black.
fn texel(image: &RgbaImage, x: i64, y: i64) -> [f32; 4] {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return [0.0; 4];
    }
    let x = x.clamp(0, i64::from(width) - 1) as u32;
    let y = y.clamp(0, i64::from(height) - 1) as u32;
    to_unit(*image.get_pixel(x, y))
}

/// Applies `kind` to every pixel of `image`.
pub fn apply_filter(image: &RgbaImage, kind: FilterKind) -> RgbaImage {
    let (width, height) = image.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        let (x, y) = (i64::from(x), i64::from(y));
        let at = |dx: i64, dy: i64| texel(image, x + dx, y + dy);
        let center = at(0, 0);
        let color = match kind {
            FilterKind::Identity => center,
            FilterKind::Grayscale => {
                let value = luma(center);
                [value, value, value, center[3]]
            }
            FilterKind::Invert => [1.0 - center[0], 1.0 - center[1], 1.0 - center[2], center[3]],
            FilterKind::BoxBlur => {
                let mut sum = [0.0f32; 4];
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let sample = at(dx, dy);
                        for (total, value) in sum.iter_mut().zip(sample) {
                            *total += value;
                        }
                    }
                }
                sum.map(|total| total / 9.0)
            }
            FilterKind::Edge => {
                let l = |dx: i64, dy: i64| luma(at(dx, dy));
                let gx = -l(-1, -1) + l(1, -1) - 2.0 * l(-1, 0) + 2.0 * l(1, 0) - l(-1, 1)
                    + l(1, 1);
                let gy = l(-1, -1) + 2.0 * l(0, -1) + l(1, -1)
                    - l(-1, 1)
                    - 2.0 * l(0, 1)
                    - l(1, 1);
                let edge = (gx * gx + gy * gy).sqrt();
                [edge, edge, edge, 1.0]
            }
        };
        from_unit(color)
    })
}

/// Blends one overlay colour onto one base colour.
pub fn blend_pixel(base: [f32; 3], overlay: [f32; 3], mode: BlendMode, alpha: f32) -> [f32; 3] {
    let alpha = unit_interval(alpha);
    let mix = |a: f32, b: f32| a + (b - a) * alpha;
    let mut out = [0.0; 3];
    for channel in 0..3 {
        let (b, o) = (base[channel], overlay[channel]);
        out[channel] = match mode {
            BlendMode::Alpha => mix(b, o),
            BlendMode::Add => (b + o * alpha).min(1.0),
            BlendMode::Multiply => mix(b, b * o),
            BlendMode::Screen => mix(b, 1.0 - (1.0 - b) * (1.0 - o)),
            BlendMode::Overlay => {
                let blended = if b < 0.5 {
                    2.0 * b * o
                } else {
                    1.0 - 2.0 * (1.0 - b) * (1.0 - o)
                };
                mix(b, blended)
            }
            BlendMode::SoftLight => {
                let blended = if o < 0.5 {
                    2.0 * b * o + b * b * (1.0 - 2.0 * o)
                } else {
                    b.sqrt() * (2.0 * o - 1.0) + 2.0 * b * (1.0 - o)
                };
                mix(b, blended)
            }
        };
    }
    out
}

/// Blends `overlay` onto `base`. The overlay is resampled to the base size.
pub fn blend_images(base: &RgbaImage, overlay: &RgbaImage, params: BlendParameters) -> RgbaImage {
    let (width, height) = base.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        let b = to_unit(*base.get_pixel(x, y));
        let u = (x as f32 + 0.5) / width as f32;
        let v = (y as f32 + 0.5) / height as f32;
        let o = sample_bilinear(overlay, u, v);
        let [r, g, bl] = blend_pixel(
            [b[0], b[1], b[2]],
            [o[0], o[1], o[2]],
            params.mode(),
            params.alpha(),
        );
        from_unit([r, g, bl, 1.0])
    })
}

/// Bilinear sample at normalised coordinates with clamp-to-edge addressing.
pub fn sample_bilinear(image: &RgbaImage, u: f32, v: f32) -> [f32; 4] {
    let (width, height) = image.dimensions();
    let x = u * width as f32 - 0.5;
    let y = v * height as f32 - 0.5;
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let top_left = texel(image, x0, y0);
    let top_right = texel(image, x0 + 1, y0);
    let bottom_left = texel(image, x0, y0 + 1);
    let bottom_right = texel(image, x0 + 1, y0 + 1);

    let mut out = [0.0; 4];
    for channel in 0..4 {
        let top = top_left[channel] + (top_right[channel] - top_left[channel]) * fx;
        let bottom = bottom_left[channel] + (bottom_right[channel] - bottom_left[channel]) * fx;
        out[channel] = top + (bottom - top) * fy;
    }
    out
}

/// Grades one colour through `lut`, mixed with the original by `intensity`.
/// An empty table leaves the colour as it is.
pub fn grade_pixel(color: [f32; 4], lut: &RgbaImage, intensity: f32) -> [f32; 4] {
    if lut.width() == 0 || lut.height() == 0 {
        return color;
    }
    let intensity = unit_interval(intensity);
    let [u, v] = lut_coordinate([color[0], color[1], color[2]]);
    let graded = sample_bilinear(lut, u, v);
    let mut out = [0.0; 4];
    for channel in 0..4 {
        out[channel] = color[channel] + (graded[channel] - color[channel]) * intensity;
    }
    out
}

pub fn grade_image(image: &RgbaImage, lut: &RgbaImage, intensity: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        from_unit(grade_pixel(to_unit(*image.get_pixel(x, y)), lut, intensity))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::identity_lut;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) * 40 % 256) as u8,
                255,
            ])
        })
    }

    fn max_channel_delta(a: &RgbaImage, b: &RgbaImage) -> u8 {
        a.pixels()
            .zip(b.pixels())
            .flat_map(|(p, q)| p.0.into_iter().zip(q.0).map(|(x, y)| x.abs_diff(y)))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn empty_images_do_not_panic() {
        let empty = RgbaImage::new(0, 0);
        assert_eq!(sample_bilinear(&empty, 0.5, 0.5), [0.0; 4]);
        assert_eq!(apply_filter(&empty, FilterKind::Edge).dimensions(), (0, 0));

        let base = solid(2, 2, [100, 150, 200, 255]);
        let blended = blend_images(&base, &empty, BlendParameters::new(BlendMode::Alpha, 0.0));
        assert_eq!(blended, base);

        let graded = grade_image(&base, &RgbaImage::new(0, 4), 1.0);
        assert_eq!(graded, base);
        assert_eq!(grade_image(&empty, &identity_lut(), 1.0).dimensions(), (0, 0));
    }

    #[test]
    fn grayscale_of_solid_red_is_red_luma() {
        let output = apply_filter(&solid(4, 4, [255, 0, 0, 255]), FilterKind::Grayscale);
        for pixel in output.pixels() {
            assert_eq!(pixel.0, [76, 76, 76, 255]);
        }
    }

    #[test]
    fn blur_of_constant_field_is_identity() {
        let input = solid(5, 3, [30, 140, 220, 255]);
        let output = apply_filter(&input, FilterKind::BoxBlur);
        assert_eq!(max_channel_delta(&input, &output), 0);
    }

    #[test]
    fn invert_twice_restores_input() {
        let input = gradient(16, 9);
        let once = apply_filter(&input, FilterKind::Invert);
        let twice = apply_filter(&once, FilterKind::Invert);
        assert_eq!(max_channel_delta(&input, &twice), 0);
        assert_ne!(max_channel_delta(&input, &once), 0);
    }

    #[test]
    fn invert_keeps_alpha() {
        let output = apply_filter(&solid(1, 1, [10, 20, 30, 77]), FilterKind::Invert);
        assert_eq!(output.get_pixel(0, 0).0, [245, 235, 225, 77]);
    }

    #[test]
    fn selecting_the_same_filter_twice_is_stable() {
        let input = gradient(8, 8);
        let first = apply_filter(&input, FilterKind::Edge);
        let second = apply_filter(&input, FilterKind::Edge);
        assert_eq!(first, second);
    }

    #[test]
    fn edge_filter_is_dark_on_flat_regions_and_bright_on_steps() {
        let flat = apply_filter(&solid(6, 6, [90, 90, 90, 255]), FilterKind::Edge);
        assert!(flat.pixels().all(|p| p.0 == [0, 0, 0, 255]));

        let step = RgbaImage::from_fn(6, 6, |x, _| {
            if x < 3 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let edges = apply_filter(&step, FilterKind::Edge);
        assert_eq!(edges.get_pixel(2, 3).0[0], 255);
        assert_eq!(edges.get_pixel(0, 3).0[0], 0);
    }

    #[test]
    fn blend_modes_match_closed_forms() {
        let base = [0.25, 0.75, 0.5];
        let overlay = [0.5, 0.5, 1.0];
        let close = |a: [f32; 3], b: [f32; 3]| a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6);

        assert!(close(blend_pixel(base, overlay, BlendMode::Alpha, 0.0), base));
        assert!(close(blend_pixel(base, overlay, BlendMode::Alpha, 1.0), overlay));
        assert!(close(
            blend_pixel(base, overlay, BlendMode::Add, 1.0),
            [0.75, 1.0, 1.0]
        ));
        assert!(close(
            blend_pixel(base, overlay, BlendMode::Multiply, 1.0),
            [0.125, 0.375, 0.5]
        ));
        assert!(close(
            blend_pixel(base, overlay, BlendMode::Screen, 1.0),
            [0.625, 0.875, 1.0]
        ));
        assert!(close(
            blend_pixel(base, overlay, BlendMode::Overlay, 1.0),
            [0.25, 0.75, 1.0]
        ));
        let soft = blend_pixel(base, overlay, BlendMode::SoftLight, 1.0);
        assert!((soft[2] - (0.5f32.sqrt())).abs() < 1e-6);
    }

    #[test]
    fn blend_alpha_outside_unit_range_is_clamped() {
        let base = [0.2, 0.4, 0.6];
        let overlay = [1.0, 1.0, 1.0];
        for mode in BlendMode::ALL {
            assert_eq!(
                blend_pixel(base, overlay, mode, 7.0),
                blend_pixel(base, overlay, mode, 1.0)
            );
            assert_eq!(
                blend_pixel(base, overlay, mode, -3.0),
                blend_pixel(base, overlay, mode, 0.0)
            );
        }
    }

    #[test]
    fn blending_images_forces_opaque_output() {
        let base = solid(3, 3, [100, 100, 100, 10]);
        let overlay = solid(7, 2, [200, 200, 200, 0]);
        let output = blend_images(&base, &overlay, BlendParameters::new(BlendMode::Alpha, 0.5));
        assert_eq!(output.dimensions(), (3, 3));
        assert!(output.pixels().all(|p| p.0 == [150, 150, 150, 255]));
    }

    #[test]
    fn identity_lut_preserves_colours() {
        let input = gradient(32, 32);
        let graded = grade_image(&input, &identity_lut(), 1.0);
        assert!(max_channel_delta(&input, &graded) <= 5);
    }

    #[test]
    fn grading_with_zero_intensity_is_a_no_op() {
        let input = gradient(8, 8);
        let inverted = apply_filter(&identity_lut(), FilterKind::Invert);
        let graded = grade_image(&input, &inverted, 0.0);
        assert_eq!(max_channel_delta(&input, &graded), 0);
    }

    #[test]
    fn quantised_levels_hit_identity_texels_exactly() {
        let lut = identity_lut();
        for level in [0u32, 1, 17, 40, 63] {
            let value = level as f32 / 63.0;
            let graded = grade_pixel([value, value, value, 1.0], &lut, 1.0);
            let expected = lut.get_pixel(level, level).0[0] as f32 / 255.0;
            assert!((graded[0] - expected).abs() < 1e-4, "level {level}");
        }
    }

    #[test]
    fn bilinear_sampling_interpolates_between_texels() {
        let image = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let mid = sample_bilinear(&image, 0.5, 0.5);
        assert!((mid[0] - 0.5).abs() < 1e-6);
        assert_eq!(sample_bilinear(&image, 0.0, 0.5)[0], 0.0);
        assert_eq!(sample_bilinear(&image, 1.0, 0.5)[0], 1.0);
    }
}
