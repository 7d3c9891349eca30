use std::{fs, path::PathBuf};

use tracing::{debug, info, warn};

use crate::{
    config::{ExtractConfig, ModelSource},
    containers::{
        archive::{ArchiveIndex, SentinelMode},
        load_source,
    },
    error::{ExtractError, Result},
    formats::object::{build_mesh, parse_object, AtlasGeometry},
    graphics::{
        atlas::{slice_atlas, SliceOptions, Tiling},
        mesh::{write_mtl, write_obj, Material},
        png::save_png,
    },
    picture_extractor::load_raw_image,
};

const ATLAS_FILE: &str = "atlas.png";

pub struct ModelExtractor<'a> {
    config: &'a ExtractConfig,
}

impl<'a> ModelExtractor<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        ModelExtractor { config }
    }

    /// Object files in the source directory, sorted by name.
    fn object_files(&self, source: &ModelSource) -> Result<Vec<PathBuf>> {
        let dir = self.config.source(&source.objects_dir);
        let entries = fs::read_dir(&dir).map_err(|e| ExtractError::open(&dir, e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(&source.extension))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn extract_models(&self) -> Result<usize> {
        let Some(source) = &self.config.layout.models else {
            info!("No model sources configured");
            return Ok(0);
        };

        let models_dir = self.config.output_root.join("models");
        let textures_dir = models_dir.join("textures");

        // Slot zero of the model atlas is a real texture.
        let regions = ArchiveIndex::read(&self.config.source(&source.atlas_tab), SentinelMode::Keep)?;
        let atlas = load_raw_image(&self.config.source(&source.atlas_data), source.atlas_width, None)?;
        let geometry = AtlasGeometry {
            width: atlas.width as u32,
            height: atlas.height as u32,
        };

        let palette = self.config.palette(None)?;
        let atlas_rgba = atlas.to_rgba(&palette);
        save_png(&atlas_rgba, &textures_dir.join(ATLAS_FILE), &self.config.png)?;

        let options = SliceOptions {
            upscale: self.config.upscale,
            png: self.config.png,
            ..SliceOptions::default()
        };
        let report = slice_atlas(&atlas_rgba, Tiling::model_grid(), &textures_dir, &options);
        if !report.failed.is_empty() {
            warn!("{} model texture tiles could not be written", report.failed.len());
        }
        info!(
            "Model atlas {}x{}: {} regions, {} tiles",
            geometry.width,
            geometry.height,
            regions.len(),
            report.written.len()
        );

        let files = self.object_files(source)?;
        for path in &files {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            let object = parse_object(&load_source(path)?, &name)?;
            let mesh = build_mesh(&object, &regions.entries, geometry, &name)?;
            let material = Material {
                name: name.clone(),
                texture: format!("textures/{}", ATLAS_FILE),
            };

            let mtl_file = format!("{}.mtl", name);
            write_mtl(&models_dir.join(&mtl_file), &material)?;
            write_obj(&mesh, &models_dir.join(format!("{}.obj", name)), &mtl_file, &material)?;
            debug!(
                "  {} ({:?}): {} vertices, {} triangles",
                name,
                object.kind,
                object.vertices.len(),
                object.triangles.len()
            );
        }
        info!("{} models", files.len());
        Ok(files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{formats::object::OBJECT_MAGIC, test_fixtures::fixture_config};

    fn textured_triangle() -> Vec<u8> {
        let mut data = vec![0u8; 58];
        data[..20].copy_from_slice(OBJECT_MAGIC);
        data[38..40].copy_from_slice(&14u16.to_le_bytes());
        data[42..44].copy_from_slice(&18u16.to_le_bytes());
        data[50] = 5;
        data[51] = 1;
        data[52..54].copy_from_slice(&1u16.to_le_bytes());
        data[54..56].copy_from_slice(&3u16.to_le_bytes());
        for v in [0i16, 0, 0, 1024, 0, 0, 0, 1024, 0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.push(5);
        for i in [0u16, 1, 2] {
            data.extend_from_slice(&i.to_le_bytes());
        }
        data.push(0);
        data.extend_from_slice(&[0, 0, 63, 0, 0, 63]);
        data
    }

    #[test]
    fn objects_become_obj_with_shared_atlas() {
        let (game, out, mut config) = fixture_config();
        let mut tab = 0u32.to_le_bytes().to_vec();
        tab.extend_from_slice(&[64, 64]);
        fs::write(game.path().join("TMAPS.TAB"), tab).unwrap();
        fs::write(game.path().join("TMAPS.DAT"), vec![4u8; 128 * 64]).unwrap();
        fs::create_dir(game.path().join("3D")).unwrap();
        fs::write(game.path().join("3D/TREE.DAT"), textured_triangle()).unwrap();
        fs::write(game.path().join("3D/README.TXT"), b"not a model").unwrap();

        config.layout.models = Some(ModelSource {
            objects_dir: "3D".to_string(),
            extension: "dat".to_string(),
            atlas_tab: "TMAPS.TAB".to_string(),
            atlas_data: "TMAPS.DAT".to_string(),
            atlas_width: 128,
        });

        assert_eq!(ModelExtractor::new(&config).extract_models().unwrap(), 1);

        let models = out.path().join("models");
        assert!(models.join("textures/atlas.png").exists());
        assert!(models.join("textures/tile_001.png").exists());
        assert!(models.join("tree.mtl").exists());

        let obj = fs::read_to_string(models.join("tree.obj")).unwrap();
        assert!(obj.contains("vt 0.000000 0.015625\n"));
        assert!(obj.contains("f 1/1/1 2/2/1 3/3/1"));
    }

    #[test]
    fn missing_object_directory_is_an_open_error() {
        let (game, _out, mut config) = fixture_config();
        fs::write(game.path().join("T.TAB"), [0u8; 6]).unwrap();
        fs::write(game.path().join("T.DAT"), [0u8; 64]).unwrap();
        config.layout.models = Some(ModelSource {
            objects_dir: "NOPE".to_string(),
            extension: "DAT".to_string(),
            atlas_tab: "T.TAB".to_string(),
            atlas_data: "T.DAT".to_string(),
            atlas_width: 8,
        });
        let err = ModelExtractor::new(&config).extract_models().unwrap_err();
        assert!(matches!(err, ExtractError::ArchiveOpen { .. }));
    }
}
