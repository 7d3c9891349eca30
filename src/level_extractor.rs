use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::ExtractConfig,
    containers::load_source,
    error::Result,
    graphics::atlas::{slice_atlas, SliceOptions, Tiling},
    manifest::{write_asset, write_json},
    picture_extractor::{load_raw_image, save_picture},
};

#[derive(Debug, Serialize)]
struct LevelSidecar<'a> {
    level: u32,
    source: &'a str,
    size: usize,
    xxhash64: String,
}

pub struct LevelExtractor<'a> {
    config: &'a ExtractConfig,
}

impl<'a> LevelExtractor<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        LevelExtractor { config }
    }

    fn level_dir(&self, level: u32) -> PathBuf {
        self.config.output_root.join(format!("level{}", level))
    }

    /// Terrain blocks are a single column of square tiles.
    pub fn extract_terrain_textures(&self) -> Result<usize> {
        let mut written = 0;
        for source in &self.config.layout.terrain_textures {
            let palette = self.config.palette(source.palette.as_deref())?;
            let atlas = load_raw_image(&self.config.source(&source.file), source.tile_size, None)?;

            let options = SliceOptions {
                upscale: self.config.upscale,
                png: self.config.png,
                ..SliceOptions::default()
            };
            let dir = self
                .config
                .output_root
                .join("textures")
                .join(format!("level{}", source.level));
            let report = slice_atlas(
                &atlas.to_rgba(&palette),
                Tiling::Vertical {
                    tile_size: source.tile_size,
                },
                &dir,
                &options,
            );

            if !report.failed.is_empty() {
                warn!(
                    "Level {} terrain: {} tiles could not be written",
                    source.level,
                    report.failed.len()
                );
            }
            info!("Level {} terrain: {} tiles", source.level, report.written.len());
            written += report.written.len();
        }
        Ok(written)
    }

    /// Level files are unpacked and stored as-is with a JSON sidecar.
    pub fn extract_levels(&self) -> Result<usize> {
        for source in &self.config.layout.levels {
            let data = load_source(&self.config.source(&source.file))?;
            let dir = self.level_dir(source.level);
            let record = write_asset(&dir, "level.dat", &data)?;
            write_json(
                &dir.join("level.json"),
                &LevelSidecar {
                    level: source.level,
                    source: &source.file,
                    size: record.size,
                    xxhash64: record.xxhash64,
                },
            )?;
            info!("Level {}: {} bytes", source.level, data.len());
        }
        Ok(self.config.layout.levels.len())
    }

    pub fn extract_minimaps(&self) -> Result<usize> {
        let palette = self.config.palette(None)?;
        for source in &self.config.layout.minimaps {
            let image = load_raw_image(&self.config.source(&source.file), source.width, None)?;
            let path = self.level_dir(source.level).join("minimap.png");
            save_picture(&image.to_rgba(&palette), &path, self.config)?;
            info!("Level {} minimap ({}x{})", source.level, image.width, image.height);
        }
        Ok(self.config.layout.minimaps.len())
    }
}
