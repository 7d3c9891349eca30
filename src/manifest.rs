//! Raw asset output with xxHash64 fingerprints.

use std::{
    fs::{self, File},
    hash::Hasher,
    io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use twox_hash::XxHash64;

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Path relative to the manifest's directory.
    pub path: String,
    pub size: usize,
    pub xxhash64: String,
}

pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::default();
    hasher.write(data);
    hasher.finish()
}

/// Writes `data` to `dir/relative` and returns its manifest record.
pub fn write_asset(dir: &Path, relative: &str, data: &[u8]) -> Result<FileRecord> {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExtractError::write(parent, e))?;
    }
    fs::write(&path, data).map_err(|e| ExtractError::write(&path, e))?;

    Ok(FileRecord {
        path: relative.to_string(),
        size: data.len(),
        xxhash64: format!("{:016x}", hash_bytes(data)),
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExtractError::write(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ExtractError::write(path, e))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| ExtractError::write(path, io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(path.to_path_buf())
}
