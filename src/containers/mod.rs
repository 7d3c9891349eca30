pub mod archive;
pub mod compression;
pub mod sound_bank;

use std::{fs, path::Path};

use tracing::debug;

use crate::{
    containers::compression::rnc::RncContainer,
    error::{ExtractError, Result},
};

pub trait CompressionContainer {
    fn decompress(&self) -> Result<Vec<u8>>;
}

pub trait ContainerHandler {
    fn magic_word() -> &'static [u8];
    fn matches(data: &[u8]) -> bool {
        data.starts_with(Self::magic_word())
    }
    fn deserialise(data: &[u8]) -> Result<Box<dyn CompressionContainer>>;
}

/// Reads a source file, unpacking it first when it is an RNC container.
pub fn load_source(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).map_err(|e| ExtractError::open(path, e))?;
    if !RncContainer::matches(&data) {
        return Ok(data);
    }

    let unpacked = RncContainer::deserialise(&data)
        .and_then(|container| container.decompress())
        .map_err(|e| match e {
            ExtractError::Decompress { message, .. } | ExtractError::Format { message, .. } => {
                ExtractError::decompress(path.display().to_string(), message)
            }
            other => other,
        })?;
    debug!(
        "Unpacked {} ({} -> {} bytes)",
        path.display(),
        data.len(),
        unpacked.len()
    );
    Ok(unpacked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_files_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PLAIN.DAT");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        assert_eq!(load_source(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(&dir.path().join("NOPE.DAT")).unwrap_err();
        assert!(matches!(err, ExtractError::ArchiveOpen { .. }));
    }
}
