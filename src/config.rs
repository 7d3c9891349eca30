//! Runtime options and the game's file layout.
//!
//! [`GameLayout`] says which source file feeds which pipeline step. The
//! built-in default matches the standard install; a JSON file can override any
//! part of it (missing keys keep their defaults).

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ExtractError, Result},
    formats::palette::Palette,
    graphics::png::PngOptions,
};

/// Plain `width × height` index array. Height is derived from the file size
/// when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImageSource {
    pub name: String,
    pub file: String,
    pub width: u32,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub palette: Option<String>,
}

/// A TAB/DAT pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSource {
    pub name: String,
    pub tab: String,
    pub dat: String,
    #[serde(default)]
    pub palette: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainSource {
    pub level: u32,
    pub file: String,
    pub tile_size: u32,
    #[serde(default)]
    pub palette: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSource {
    pub level: u32,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimapSource {
    pub level: u32,
    pub file: String,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSource {
    /// Directory scanned for object files.
    pub objects_dir: String,
    pub extension: String,
    pub atlas_tab: String,
    /// Raw indexed atlas image addressed by `atlas_tab`.
    pub atlas_data: String,
    pub atlas_width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLayout {
    pub palette: String,
    pub screens: Vec<RawImageSource>,
    pub fonts: Vec<ArchiveSource>,
    pub hud: Vec<ArchiveSource>,
    pub skies: Vec<RawImageSource>,
    pub sprites: Vec<ArchiveSource>,
    pub terrain_textures: Vec<TerrainSource>,
    pub levels: Vec<LevelSource>,
    pub minimaps: Vec<MinimapSource>,
    pub misc: Vec<ArchiveSource>,
    pub models: Option<ModelSource>,
    pub intro: Vec<String>,
    pub sound: Vec<String>,
    pub music: Vec<String>,
}

fn archive(name: &str, stem: &str) -> ArchiveSource {
    ArchiveSource {
        name: name.to_string(),
        tab: format!("DATA/{}.TAB", stem),
        dat: format!("DATA/{}.DAT", stem),
        palette: None,
    }
}

const LEVEL_COUNT: u32 = 25;

impl Default for GameLayout {
    fn default() -> Self {
        GameLayout {
            palette: "DATA/PAL0-0.DAT".to_string(),
            screens: vec![RawImageSource {
                name: "title".to_string(),
                file: "DATA/SCREEN.DAT".to_string(),
                width: 320,
                height: Some(200),
                palette: Some("DATA/SCREEN.PAL".to_string()),
            }],
            fonts: vec![
                archive("small", "FONT0-0"),
                archive("large", "FONT1-0"),
                archive("hires", "HFONT3"),
            ],
            hud: vec![archive("panel", "HSPR0-0")],
            skies: vec![RawImageSource {
                name: "sky".to_string(),
                file: "DATA/SKY.DAT".to_string(),
                width: 256,
                height: None,
                palette: None,
            }],
            sprites: vec![archive("world", "SPRITES0-0"), archive("pointers", "POINTERS")],
            terrain_textures: (0..LEVEL_COUNT)
                .map(|level| TerrainSource {
                    level,
                    file: format!("DATA/BLOCK{}-0.DAT", level),
                    tile_size: 32,
                    palette: None,
                })
                .collect(),
            levels: (0..LEVEL_COUNT)
                .map(|level| LevelSource {
                    level,
                    file: format!("LEVELS/LEV{:04}.DAT", level),
                })
                .collect(),
            minimaps: (0..LEVEL_COUNT)
                .map(|level| MinimapSource {
                    level,
                    file: format!("LEVELS/MAP{:04}.DAT", level),
                    width: 256,
                })
                .collect(),
            misc: vec![archive("icons", "ICONS0-0"), archive("buttons", "BUTTONS")],
            models: Some(ModelSource {
                objects_dir: "3D".to_string(),
                extension: "DAT".to_string(),
                atlas_tab: "DATA/TMAPS0-0.TAB".to_string(),
                atlas_data: "DATA/TMAPS0-0.DAT".to_string(),
                atlas_width: 256,
            }),
            intro: vec!["INTRO/INTRO.FLI".to_string(), "INTRO/BULLFROG.FLI".to_string()],
            sound: vec!["SOUND/SOUND-0.DAT".to_string()],
            music: vec!["SOUND/MUSIC0-0.DAT".to_string()],
        }
    }
}

impl GameLayout {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ExtractError::Layout {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ExtractError::Layout {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Palette index drawn around glyphs unless overridden. Index 0 is what the
/// picture decoder leaves in unwritten pixels, so it would match the background.
pub const DEFAULT_OUTLINE_COLOUR: u8 = 1;

/// Options shared by every pipeline step.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub game_dir: PathBuf,
    pub output_root: PathBuf,
    pub layout: GameLayout,
    pub upscale: u32,
    /// Palette index drawn around font glyphs, `None` to leave them bare.
    pub outline_colour: Option<u8>,
    pub png: PngOptions,
    pub progress_path: Option<PathBuf>,
}

impl ExtractConfig {
    pub fn new(game_dir: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        ExtractConfig {
            game_dir: game_dir.into(),
            output_root: output_root.into(),
            layout: GameLayout::default(),
            upscale: 1,
            outline_colour: Some(DEFAULT_OUTLINE_COLOUR),
            png: PngOptions::default(),
            progress_path: None,
        }
    }

    /// Resolves a layout path against the game directory.
    pub fn source(&self, relative: &str) -> PathBuf {
        self.game_dir.join(relative)
    }

    /// Loads `override_path` when given, the layout's main palette otherwise.
    pub fn palette(&self, override_path: Option<&str>) -> Result<Palette> {
        let relative = override_path.unwrap_or(&self.layout.palette);
        Palette::load(&self.source(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(&path, r#"{ "palette": "PAL.DAT", "intro": [] }"#).unwrap();

        let layout = GameLayout::load(&path).unwrap();
        assert_eq!(layout.palette, "PAL.DAT");
        assert!(layout.intro.is_empty());
        assert_eq!(layout.fonts, GameLayout::default().fonts);
    }

    #[test]
    fn bad_json_is_a_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            GameLayout::load(&path),
            Err(ExtractError::Layout { .. })
        ));
        assert!(matches!(
            GameLayout::load(&dir.path().join("missing.json")),
            Err(ExtractError::Layout { .. })
        ));
    }
}
