use std::path::Path;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::{
    config::{ArchiveSource, ExtractConfig, RawImageSource},
    containers::{
        archive::{ArchiveBlob, ArchiveIndex, SentinelMode},
        load_source,
    },
    error::{ExtractError, Result},
    formats::picture::{decode_archive, ArchiveDecode, DecodedImage},
    graphics::{font::FontGlyph, png::save_png, upscale::upscale},
};

/// Upscales by the configured factor and writes a PNG.
pub fn save_picture(image: &RgbaImage, path: &Path, config: &ExtractConfig) -> Result<()> {
    save_png(&upscale(image, config.upscale), path, &config.png)?;
    debug!("  -> {}", path.display());
    Ok(())
}

/// Reads a plain index array, deriving the height from the file when needed.
pub fn load_raw_image(path: &Path, width: u32, height: Option<u32>) -> Result<DecodedImage> {
    let data = load_source(path)?;
    let decoded = match height {
        Some(height) => DecodedImage::from_raw(width as usize, height as usize, &data),
        None => DecodedImage::from_raw_rows(width as usize, &data),
    };
    decoded.map_err(|e| match e {
        ExtractError::Format { message, .. } => {
            ExtractError::format(path.display().to_string(), message)
        }
        other => other,
    })
}

/// Decodes a whole TAB/DAT archive and logs what did not decode cleanly.
pub fn decode_archive_source(config: &ExtractConfig, source: &ArchiveSource) -> Result<ArchiveDecode> {
    let index = ArchiveIndex::read(&config.source(&source.tab), SentinelMode::Skip)?;
    let blob = ArchiveBlob::read(&config.source(&source.dat))?;
    let decoded = decode_archive(&index, &blob);

    debug!(
        "{}: {} entries, {} decoded, count hint {}",
        source.name,
        index.len(),
        decoded.pictures.len(),
        blob.picture_count_hint
    );
    if decoded.skipped > 0 {
        warn!("{}: skipped {} undecodable entries", source.name, decoded.skipped);
    }
    if !decoded.anomalies.is_clean() {
        warn!(
            "{}: {} colour leaks, {} truncated pictures",
            source.name, decoded.anomalies.colour_leaks, decoded.anomalies.end_of_buffer
        );
    }
    if decoded.coverage.unused_bytes > 0 || decoded.coverage.overlapping_bytes > 0 {
        warn!(
            "{}: {} DAT bytes unused, {} read more than once",
            source.name, decoded.coverage.unused_bytes, decoded.coverage.overlapping_bytes
        );
    }
    Ok(decoded)
}

pub struct PictureExtractor<'a> {
    config: &'a ExtractConfig,
}

impl<'a> PictureExtractor<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        PictureExtractor { config }
    }

    fn output(&self, relative: &str) -> std::path::PathBuf {
        self.config.output_root.join(relative)
    }

    fn extract_raw(&self, sources: &[RawImageSource], dir: &str) -> Result<usize> {
        for source in sources {
            let palette = self.config.palette(source.palette.as_deref())?;
            let image = load_raw_image(&self.config.source(&source.file), source.width, source.height)?;
            let path = self.output(dir).join(format!("{}.png", source.name));
            save_picture(&image.to_rgba(&palette), &path, self.config)?;
            info!("{} ({}x{})", path.display(), image.width, image.height);
        }
        Ok(sources.len())
    }

    /// Writes every picture of every archive; `name` maps (archive, picture
    /// number) to a path below the output root.
    fn extract_archives(
        &self,
        sources: &[ArchiveSource],
        name: impl Fn(&ArchiveSource, usize) -> String,
    ) -> Result<usize> {
        let mut written = 0;
        for source in sources {
            let palette = self.config.palette(source.palette.as_deref())?;
            let decoded = decode_archive_source(self.config, source)?;
            for (number, image) in &decoded.pictures {
                let path = self.output(&name(source, *number));
                save_picture(&image.to_rgba(&palette), &path, self.config)?;
                written += 1;
            }
            info!("{}: {} pictures", source.name, decoded.pictures.len());
        }
        Ok(written)
    }

    pub fn extract_screens(&self) -> Result<usize> {
        self.extract_raw(&self.config.layout.screens, "images")
    }

    pub fn extract_skies(&self) -> Result<usize> {
        self.extract_raw(&self.config.layout.skies, "sky")
    }

    pub fn extract_hud(&self) -> Result<usize> {
        self.extract_archives(&self.config.layout.hud, |source, n| {
            format!("hud/{}_{:03}.png", source.name, n)
        })
    }

    pub fn extract_sprites(&self) -> Result<usize> {
        self.extract_archives(&self.config.layout.sprites, |source, n| {
            format!("sprites/{}/{:04}.png", source.name, n)
        })
    }

    pub fn extract_misc(&self) -> Result<usize> {
        self.extract_archives(&self.config.layout.misc, |source, n| {
            format!("images/misc/{}_{:03}.png", source.name, n)
        })
    }

    /// Glyphs go through background detection, outlining and trimming before
    /// they are written.
    pub fn extract_fonts(&self) -> Result<usize> {
        let mut written = 0;
        for source in &self.config.layout.fonts {
            let palette = self.config.palette(source.palette.as_deref())?;
            let outline = self
                .config
                .outline_colour
                .map(|index| palette.colour(index).to_rgba(255));
            let decoded = decode_archive_source(self.config, source)?;

            for (number, image) in &decoded.pictures {
                let glyph = FontGlyph::process(image.to_rgba(&palette), outline);
                let path = self
                    .output("fonts")
                    .join(&source.name)
                    .join(format!("glyph_{:03}.png", number));
                save_picture(&glyph.to_sprite(), &path, self.config)?;
                written += 1;
            }
            info!("Font {}: {} glyphs", source.name, decoded.pictures.len());
        }
        Ok(written)
    }
}
