//! 2D-tiled colour lookup tables.
//!
//! A table is a 512x512 image split into an 8x8 grid of 64x64 tiles. The blue
//! channel (quantised to 64 levels) picks the tile; red and green address the
//! texel inside it.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::RenderError;

pub const LUT_SIZE: u32 = 512;
pub const LUT_TILE: u32 = 64;
pub const LUT_TILES_PER_ROW: u32 = 8;
const LEVEL_MAX: f32 = (LUT_TILE - 1) as f32;

/// Category matching every table.
pub const ALL_CATEGORY: &str = "all";

/// Texture coordinate in the lookup table for a colour.
///
/// Channels are clamped to `[0, 1]` first, so the result always lies inside
/// the unit square.
pub fn lut_coordinate(rgb: [f32; 3]) -> [f32; 2] {
    let scale = |value: f32| crate::params::unit_interval(value) * LEVEL_MAX;
    let (red, green, blue) = (scale(rgb[0]), scale(rgb[1]), scale(rgb[2]));

    let blue_index = blue.floor();
    let tile_row = (blue_index / LUT_TILES_PER_ROW as f32).floor();
    let x_offset = (blue_index - tile_row * LUT_TILES_PER_ROW as f32) / LUT_TILES_PER_ROW as f32;
    let y_offset = tile_row / LUT_TILES_PER_ROW as f32;

    [
        x_offset + (red + 0.5) / LUT_SIZE as f32,
        y_offset + (green + 0.5) / LUT_SIZE as f32,
    ]
}

/// Builds the table that maps every colour onto itself (up to quantisation).
pub fn identity_lut() -> RgbaImage {
    RgbaImage::from_fn(LUT_SIZE, LUT_SIZE, |x, y| {
        let tile = (y / LUT_TILE) * LUT_TILES_PER_ROW + x / LUT_TILE;
        let level = |index: u32| ((index * 255 + (LUT_TILE - 1) / 2) / (LUT_TILE - 1)) as u8;
        image::Rgba([level(x % LUT_TILE), level(y % LUT_TILE), level(tile), 255])
    })
}

pub fn validate_lut(image: &RgbaImage) -> Result<(), RenderError> {
    let (width, height) = image.dimensions();
    if width != LUT_SIZE || height != LUT_SIZE {
        return Err(RenderError::InvalidLut { width, height });
    }
    Ok(())
}

pub fn load_lut(path: &Path) -> Result<RgbaImage, RenderError> {
    let image = load_rgba(path)?;
    validate_lut(&image)?;
    Ok(image)
}

/// Decodes any supported image file into RGBA8.
pub fn load_rgba(path: &Path) -> Result<RgbaImage, RenderError> {
    let reader = image::ImageReader::open(path)
        .map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let decoded = reader.decode().map_err(|source| RenderError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoded.to_rgba8())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LutSource {
    Identity,
    File(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LutEntry {
    pub name: String,
    pub category: String,
    pub source: LutSource,
}

impl LutEntry {
    pub fn identity() -> Self {
        Self {
            name: "original".to_string(),
            category: "basic".to_string(),
            source: LutSource::Identity,
        }
    }

    pub fn file(name: impl Into<String>, category: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            source: LutSource::File(path),
        }
    }

    /// Decodes the table. Files that are missing or malformed yield an error
    /// the caller can downgrade to the identity table.
    pub fn load(&self) -> Result<RgbaImage, RenderError> {
        match &self.source {
            LutSource::Identity => Ok(identity_lut()),
            LutSource::File(path) => load_lut(path),
        }
    }
}

/// Ordered list of named tables with category filtering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LutCatalog {
    entries: Vec<LutEntry>,
}

impl LutCatalog {
    /// A catalog is never empty; an empty list becomes the identity table.
    pub fn new(entries: Vec<LutEntry>) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LutEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[LutEntry] {
        &self.entries
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !categories.contains(&entry.category.as_str()) {
                categories.push(&entry.category);
            }
        }
        categories
    }

    /// Indices of the tables in `category`; [`ALL_CATEGORY`] matches all.
    pub fn in_category(&self, category: &str) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| category == ALL_CATEGORY || entry.category == category)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn first_in(&self, category: &str) -> Option<usize> {
        self.in_category(category).first().copied()
    }

    /// Next table after `current` within `category`, wrapping at the end.
    /// When `current` is outside the category the first member is returned.
    pub fn next(&self, current: usize, category: &str) -> Option<usize> {
        let members = self.in_category(category);
        match members.iter().position(|&index| index == current) {
            Some(position) => Some(members[(position + 1) % members.len()]),
            None => members.first().copied(),
        }
    }

    /// Previous table before `current` within `category`, wrapping at the
    /// start.
    pub fn previous(&self, current: usize, category: &str) -> Option<usize> {
        let members = self.in_category(category);
        match members.iter().position(|&index| index == current) {
            Some(0) => members.last().copied(),
            Some(position) => Some(members[position - 1]),
            None => members.first().copied(),
        }
    }
}

impl Default for LutCatalog {
    fn default() -> Self {
        Self {
            entries: vec![LutEntry::identity()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> LutCatalog {
        LutCatalog::new(vec![
            LutEntry::identity(),
            LutEntry::file("warm", "portrait", PathBuf::from("warm.png")),
            LutEntry::file("noir", "film", PathBuf::from("noir.png")),
            LutEntry::file("soft", "portrait", PathBuf::from("soft.png")),
        ])
    }

    #[test]
    fn black_maps_to_first_cell_of_first_tile() {
        let [x, y] = lut_coordinate([0.0, 0.0, 0.0]);
        assert!((x - 0.5 / 512.0).abs() < 1e-6);
        assert!((y - 0.5 / 512.0).abs() < 1e-6);
    }

    #[test]
    fn white_maps_to_last_cell_of_last_tile() {
        let [x, y] = lut_coordinate([1.0, 1.0, 1.0]);
        let expected = 7.0 / 8.0 + 63.5 / 512.0;
        assert!((x - expected).abs() < 1e-6);
        assert!((y - expected).abs() < 1e-6);
        assert!(x < 1.0 && y < 1.0);
    }

    #[test]
    fn coordinates_stay_in_unit_square() {
        let samples = [-2.0, -0.01, 0.0, 0.13, 0.5, 0.77, 0.999, 1.0, 1.5, f32::NAN];
        for r in samples {
            for g in samples {
                for b in samples {
                    let [x, y] = lut_coordinate([r, g, b]);
                    assert!((0.0..=1.0).contains(&x), "x={x} for {r},{g},{b}");
                    assert!((0.0..=1.0).contains(&y), "y={y} for {r},{g},{b}");
                }
            }
        }
    }

    #[test]
    fn blue_selects_tile_row_major() {
        // blue level 9 is tile (1, 1)
        let [x, y] = lut_coordinate([0.0, 0.0, 9.0 / 63.0]);
        assert!((x - (0.125 + 0.5 / 512.0)).abs() < 1e-6);
        assert!((y - (0.125 + 0.5 / 512.0)).abs() < 1e-6);
    }

    #[test]
    fn identity_table_encodes_its_own_coordinates() {
        let lut = identity_lut();
        assert_eq!(lut.dimensions(), (512, 512));
        assert_eq!(lut.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(lut.get_pixel(511, 511).0, [255, 255, 255, 255]);
        // tile (1, 0) holds blue level 1
        assert_eq!(lut.get_pixel(64, 0).0[2], 4);
        assert!(validate_lut(&lut).is_ok());
    }

    #[test]
    fn wrong_sized_tables_are_rejected() {
        let err = validate_lut(&RgbaImage::new(256, 16)).unwrap_err();
        assert!(matches!(err, RenderError::InvalidLut { width: 256, height: 16 }));
    }

    #[test]
    fn navigation_wraps_within_category() {
        let catalog = catalog();
        assert_eq!(catalog.in_category("portrait"), vec![1, 3]);
        assert_eq!(catalog.next(1, "portrait"), Some(3));
        assert_eq!(catalog.next(3, "portrait"), Some(1));
        assert_eq!(catalog.previous(1, "portrait"), Some(3));
        assert_eq!(catalog.next(3, ALL_CATEGORY), Some(0));
        assert_eq!(catalog.previous(0, ALL_CATEGORY), Some(3));
    }

    #[test]
    fn navigation_from_outside_category_starts_at_first_member() {
        let catalog = catalog();
        assert_eq!(catalog.next(0, "film"), Some(2));
        assert_eq!(catalog.previous(0, "portrait"), Some(1));
        assert_eq!(catalog.next(0, "missing"), None);
    }

    #[test]
    fn categories_keep_first_seen_order() {
        assert_eq!(catalog().categories(), vec!["basic", "portrait", "film"]);
    }

    #[test]
    fn empty_catalog_falls_back_to_identity() {
        let catalog = LutCatalog::new(Vec::new());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(0).unwrap().source, LutSource::Identity);
    }

    #[test]
    fn missing_files_fail_to_load() {
        let entry = LutEntry::file("ghost", "film", PathBuf::from("/nonexistent/ghost.png"));
        assert!(matches!(entry.load(), Err(RenderError::Io { .. })));
    }
}
