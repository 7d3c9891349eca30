use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    config::ExtractConfig,
    containers::sound_bank::{music_sets, sound_sets, unpack_bank, CarvedSet},
    error::{ExtractError, Result},
    manifest::{write_asset, write_json, FileRecord},
};

const MANIFEST_FILE: &str = "manifest.json";

pub struct AudioExtractor<'a> {
    config: &'a ExtractConfig,
}

impl<'a> AudioExtractor<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        AudioExtractor { config }
    }

    pub fn extract_sound(&self) -> Result<usize> {
        self.extract_banks(&self.config.layout.sound, "sound", sound_sets)
    }

    pub fn extract_music(&self) -> Result<usize> {
        self.extract_banks(&self.config.layout.music, "music", music_sets)
    }

    /// Bank files are read as-is: each one is a run of RNC members, not a
    /// single container.
    fn extract_banks(
        &self,
        files: &[String],
        kind: &str,
        carve: fn(&[Vec<u8>]) -> Result<Vec<CarvedSet>>,
    ) -> Result<usize> {
        let mut written = 0;
        for file in files {
            let path = self.config.source(file);
            let blob = fs::read(&path).map_err(|e| ExtractError::open(&path, e))?;
            let members = unpack_bank(&blob).map_err(|e| match e {
                ExtractError::Decompress { context, message } => {
                    ExtractError::decompress(format!("{} {}", path.display(), context), message)
                }
                other => other,
            })?;
            let sets = carve(&members)?;

            let dir = self.config.output_root.join(kind).join(bank_name(&path));
            let records = write_sets(&dir, &sets)?;
            write_json(&dir.join(MANIFEST_FILE), &records)?;

            info!(
                "{}: {} members, {} files",
                path.display(),
                members.len(),
                records.len()
            );
            written += records.len();
        }
        Ok(written)
    }
}

fn bank_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Names come from the bank's directory records. Anything that could leave the
/// output directory is replaced by a numbered name.
fn output_name(name: &str, number: usize) -> String {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| matches!(c, '/' | '\\' | ':') || c.is_control());
    if plain {
        name.to_string()
    } else {
        let fallback = format!("file_{:02}.raw", number);
        warn!("Unusable file name {:?}, writing {}", name, fallback);
        fallback
    }
}

/// Writes carved files below `dir`. With more than one set, each set gets a
/// numbered subdirectory. Repeated names within a set are suffixed.
pub fn write_sets(dir: &Path, sets: &[CarvedSet]) -> Result<Vec<FileRecord>> {
    let mut records = Vec::new();
    for set in sets {
        let prefix = if sets.len() > 1 {
            PathBuf::from(format!("{:02}", set.index))
        } else {
            PathBuf::new()
        };

        let mut seen = HashSet::new();
        for (n, file) in set.files.iter().enumerate() {
            let mut name = output_name(&file.name, n);
            if !seen.insert(name.clone()) {
                warn!("Duplicate name {} in set {}", name, set.index);
                name = format!("{}_{}", name, n);
            }
            let relative = prefix.join(&name);
            records.push(write_asset(dir, &relative.to_string_lossy(), &file.data)?);
        }
    }
    Ok(records)
}
