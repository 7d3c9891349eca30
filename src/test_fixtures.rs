//! Small game directories for extractor and pipeline tests.

use std::{fs, path::Path};

use tempfile::TempDir;

use crate::config::{ExtractConfig, GameLayout};

/// Palette where index `i` has 6-bit channels `(i % 64, (i / 4) % 64, 0)`.
pub fn write_palette(dir: &Path, name: &str) {
    let data: Vec<u8> = (0..256u32)
        .flat_map(|i| [(i % 64) as u8, ((i / 4) % 64) as u8, 0])
        .collect();
    fs::write(dir.join(name), data).unwrap();
}

/// `<stem>.TAB`/`<stem>.DAT` holding one 3x2 picture whose right column is
/// never written.
pub fn write_sample_archive(dir: &Path, stem: &str) {
    let mut tab = vec![0u8; 6];
    tab.extend_from_slice(&2u32.to_le_bytes());
    tab.extend_from_slice(&[3, 2]);
    fs::write(dir.join(format!("{}.TAB", stem)), tab).unwrap();

    let dat = [1u8, 0, 2, 5, 6, 0, 2, 7, 8, 0];
    fs::write(dir.join(format!("{}.DAT", stem)), dat).unwrap();
}

pub fn empty_layout() -> GameLayout {
    GameLayout {
        palette: "PAL.DAT".to_string(),
        screens: Vec::new(),
        fonts: Vec::new(),
        hud: Vec::new(),
        skies: Vec::new(),
        sprites: Vec::new(),
        terrain_textures: Vec::new(),
        levels: Vec::new(),
        minimaps: Vec::new(),
        misc: Vec::new(),
        models: None,
        intro: Vec::new(),
        sound: Vec::new(),
        music: Vec::new(),
    }
}

/// Game directory with a palette, an empty output directory and a config
/// whose layout lists nothing.
pub fn fixture_config() -> (TempDir, TempDir, ExtractConfig) {
    let game = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_palette(game.path(), "PAL.DAT");

    let mut config = ExtractConfig::new(game.path(), out.path());
    config.layout = empty_layout();
    (game, out, config)
}
