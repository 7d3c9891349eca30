//! Texture Atlas Slicing
//!
//! Splits an atlas image into equally sized tiles and writes each tile as its
//! own PNG. Tiles are written independently: one failed write is reported and
//! the rest still go out.

use std::path::{Path, PathBuf};

use image::{imageops, RgbaImage};
use tracing::{debug, warn};

use crate::graphics::{
    png::{save_png, PngOptions},
    upscale::upscale,
};

/// Tile size of the model texture atlas grid.
pub const MODEL_TILE_SIZE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tiling {
    /// Square tiles stacked top to bottom in a single column.
    Vertical { tile_size: u32 },
    /// Fixed-size tiles in row-major order.
    Grid { tile_width: u32, tile_height: u32 },
}

impl Tiling {
    pub fn model_grid() -> Self {
        Tiling::Grid {
            tile_width: MODEL_TILE_SIZE,
            tile_height: MODEL_TILE_SIZE,
        }
    }

    /// `(x, y, width, height)` of every whole tile, in output order.
    pub fn tile_rects(&self, width: u32, height: u32) -> Vec<(u32, u32, u32, u32)> {
        match *self {
            Tiling::Vertical { tile_size } if tile_size > 0 && width >= tile_size => {
                let count = height / tile_size;
                (0..count)
                    .map(|i| (0, i * tile_size, tile_size, tile_size))
                    .collect()
            }
            Tiling::Grid {
                tile_width,
                tile_height,
            } if tile_width > 0 && tile_height > 0 => {
                let cols = width / tile_width;
                let rows = height / tile_height;
                (0..rows)
                    .flat_map(|row| {
                        (0..cols).map(move |col| {
                            (col * tile_width, row * tile_height, tile_width, tile_height)
                        })
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Naming and scaling of sliced tiles
#[derive(Debug, Clone)]
pub struct SliceOptions {
    pub prefix: String,
    pub digits: usize,
    pub extension: String,
    pub upscale: u32,
    pub png: PngOptions,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            prefix: "tile_".to_string(),
            digits: 3,
            extension: "png".to_string(),
            upscale: 1,
            png: PngOptions::default(),
        }
    }
}

impl SliceOptions {
    pub fn tile_path(&self, output_dir: &Path, index: usize) -> PathBuf {
        output_dir.join(format!(
            "{}{:0width$}.{}",
            self.prefix,
            index,
            self.extension,
            width = self.digits
        ))
    }
}

#[derive(Debug, Default)]
pub struct SliceReport {
    pub written: Vec<PathBuf>,
    /// `(tile index, reason)` of tiles that could not be written.
    pub failed: Vec<(usize, String)>,
}

pub fn slice_atlas(
    atlas: &RgbaImage,
    tiling: Tiling,
    output_dir: &Path,
    options: &SliceOptions,
) -> SliceReport {
    let mut report = SliceReport::default();
    let rects = tiling.tile_rects(atlas.width(), atlas.height());
    if rects.is_empty() {
        warn!(
            "Atlas of {}x{} holds no whole {:?} tiles",
            atlas.width(),
            atlas.height(),
            tiling
        );
        return report;
    }

    for (index, (x, y, w, h)) in rects.into_iter().enumerate() {
        let tile = imageops::crop_imm(atlas, x, y, w, h).to_image();
        let tile = upscale(&tile, options.upscale);
        let path = options.tile_path(output_dir, index);

        match save_png(&tile, &path, &options.png) {
            Ok(()) => {
                debug!("  -> {}", path.display());
                report.written.push(path);
            }
            Err(e) => {
                warn!("  -> tile {} failed: {}", index, e);
                report.failed.push((index, e.to_string()));
            }
        }
    }

    report
}
