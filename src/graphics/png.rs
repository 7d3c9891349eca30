use std::{fs, io, path::Path};

use image::RgbaImage;
use tracing::warn;

use crate::error::{ExtractError, Result};

/// Options for PNG output
#[derive(Debug, Clone, Copy)]
pub struct PngOptions {
    /// Re-encode through oxipng with bit depth and palette reduction.
    pub optimise: bool,
    pub preset: u8,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            optimise: false,
            preset: 2,
        }
    }
}

/// Save an image as PNG, creating parent directories as needed.
pub fn save_png(image: &RgbaImage, path: &Path, options: &PngOptions) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExtractError::write(parent, e))?;
    }

    if !options.optimise {
        return image
            .save(path)
            .map_err(|e| ExtractError::write(path, io::Error::new(io::ErrorKind::Other, e)));
    }

    let temp_path = path.with_extension("temp.png");
    image
        .save(&temp_path)
        .map_err(|e| ExtractError::write(&temp_path, io::Error::new(io::ErrorKind::Other, e)))?;

    let mut oxi = oxipng::Options::from_preset(options.preset);
    oxi.bit_depth_reduction = true;
    oxi.palette_reduction = true;

    let optimised = oxipng::optimize(
        &oxipng::InFile::Path(temp_path.clone()),
        &oxipng::OutFile::Path(Some(path.to_path_buf())),
        &oxi,
    );

    // The scratch file never outlives this call, whatever oxipng did.
    let cleanup = fs::remove_file(&temp_path);

    match optimised {
        Ok(()) => {
            if let Err(e) = cleanup {
                warn!("Failed to remove {}: {}", temp_path.display(), e);
            }
            Ok(())
        }
        Err(e) => {
            warn!(
                "PNG optimisation failed for {}: {}. Saving unoptimised.",
                path.display(),
                e
            );
            image
                .save(path)
                .map_err(|e| ExtractError::write(path, io::Error::new(io::ErrorKind::Other, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn writes_png_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tile.png");
        let image = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        save_png(&image, &path, &PngOptions::default()).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded, image);
    }

    #[test]
    fn optimised_write_leaves_no_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glyph.png");
        let image = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let options = PngOptions {
            optimise: true,
            ..PngOptions::default()
        };
        save_png(&image, &path, &options).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("temp.png").exists());
        assert_eq!(image::open(&path).unwrap().to_rgba8(), image);
    }
}
