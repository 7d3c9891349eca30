//! # TAB/DAT picture archives
//!
//! A TAB file is a table of 6-byte records (offset, width, height) addressing
//! run-length encoded pictures packed in the sibling DAT file. The first TAB
//! record is normally a sentinel; the model texture atlas is the exception and
//! stores a real texture in slot zero.

use std::path::Path;

use crate::{
    binary_utils::{Field, FieldKind, RecordLayout},
    containers::load_source,
    error::Result,
};

pub const TAB_RECORD_SIZE: usize = 6;

static TAB_RECORD: RecordLayout = RecordLayout::new("TAB record", TAB_RECORD_SIZE);
const ENTRY_OFFSET: Field = Field::new("offset", 0, FieldKind::U32Le);
const ENTRY_WIDTH: Field = Field::new("width", 4, FieldKind::U8);
const ENTRY_HEIGHT: Field = Field::new("height", 5, FieldKind::U8);

static DAT_HEADER: RecordLayout = RecordLayout::new("DAT header", 2);
const PICTURE_COUNT: Field = Field::new("picture_count", 0, FieldKind::I16Le);

/// Whether the leading TAB record is a sentinel to drop or a real entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SentinelMode {
    #[default]
    Skip,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveIndexEntry {
    pub offset: u32,
    pub width: u8,
    pub height: u8,
}

impl ArchiveIndexEntry {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Entries pointing outside the blob or with an empty area are skipped.
    pub fn is_decodable(&self, blob_len: usize) -> bool {
        (self.offset as usize) < blob_len && self.pixel_count() > 0
    }

    /// Top-left pixel `(col, row)` of this entry when its offset addresses a
    /// linear atlas `atlas_width` pixels wide.
    pub fn atlas_origin(&self, atlas_width: u32) -> (u32, u32) {
        let row = self.offset / atlas_width;
        let col = self.offset - row * atlas_width;
        (col, row)
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveIndex {
    pub entries: Vec<ArchiveIndexEntry>,
    pub source_len: usize,
}

impl ArchiveIndex {
    pub fn read(path: &Path, mode: SentinelMode) -> Result<Self> {
        let data = load_source(path)?;
        Self::from_bytes(&data, mode)
    }

    pub fn from_bytes(data: &[u8], mode: SentinelMode) -> Result<Self> {
        let skip = match mode {
            SentinelMode::Skip => 1,
            SentinelMode::Keep => 0,
        };

        let entries = TAB_RECORD
            .iter(data)
            .skip(skip)
            .map(|record| {
                Ok(ArchiveIndexEntry {
                    offset: record.u32(&ENTRY_OFFSET)?,
                    width: record.u8(&ENTRY_WIDTH)?,
                    height: record.u8(&ENTRY_HEIGHT)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ArchiveIndex {
            entries,
            source_len: data.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// DAT payload. Offsets in the TAB address the whole file, header included.
#[derive(Debug, Clone)]
pub struct ArchiveBlob {
    /// Informational only; never used for bounds checks.
    pub picture_count_hint: i16,
    pub bytes: Vec<u8>,
}

impl ArchiveBlob {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = load_source(path)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let picture_count_hint = match DAT_HEADER.at(&bytes, 0) {
            Ok(header) => header.i16(&PICTURE_COUNT)?,
            Err(_) => 0,
        };
        Ok(ArchiveBlob {
            picture_count_hint,
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tab_bytes(records: &[(u32, u8, u8)]) -> Vec<u8> {
        let mut data = Vec::new();
        for &(offset, width, height) in records {
            data.extend_from_slice(&offset.to_le_bytes());
            data.push(width);
            data.push(height);
        }
        data
    }

    #[test]
    fn sentinel_is_dropped_by_default() {
        let data = tab_bytes(&[(0, 0, 0), (2, 4, 4), (18, 8, 2), (40, 1, 1), (41, 3, 3)]);
        let index = ArchiveIndex::from_bytes(&data, SentinelMode::Skip).unwrap();
        assert_eq!(index.len(), data.len() / TAB_RECORD_SIZE - 1);
        assert_eq!(
            index.entries[0],
            ArchiveIndexEntry {
                offset: 2,
                width: 4,
                height: 4
            }
        );
        assert_eq!(index.source_len, 30);
    }

    #[test]
    fn sentinel_is_kept_for_the_model_atlas() {
        let data = tab_bytes(&[(0, 64, 64), (64, 32, 32)]);
        let index = ArchiveIndex::from_bytes(&data, SentinelMode::Keep).unwrap();
        assert_eq!(index.len(), data.len() / TAB_RECORD_SIZE);
        assert_eq!(index.entries[0].width, 64);
    }

    #[test]
    fn trailing_partial_record_is_ignored() {
        let mut data = tab_bytes(&[(0, 0, 0), (2, 4, 4)]);
        data.extend_from_slice(&[1, 2, 3]);
        let index = ArchiveIndex::from_bytes(&data, SentinelMode::Skip).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn empty_tab_has_no_entries() {
        let index = ArchiveIndex::from_bytes(&[], SentinelMode::Skip).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn decodable_requires_offset_in_range_and_area() {
        let entry = ArchiveIndexEntry {
            offset: 10,
            width: 2,
            height: 2,
        };
        assert!(entry.is_decodable(11));
        assert!(!entry.is_decodable(10));
        let flat = ArchiveIndexEntry { width: 0, ..entry };
        assert!(!flat.is_decodable(100));
    }

    #[test]
    fn atlas_origin_splits_linear_offset() {
        let entry = ArchiveIndexEntry {
            offset: 256 * 64 + 128,
            width: 64,
            height: 64,
        };
        assert_eq!(entry.atlas_origin(256), (128, 64));
    }

    #[test]
    fn blob_reads_count_hint_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FONT0-0.DAT");
        fs::write(&path, [0x03, 0x00, 0xAA, 0xBB]).unwrap();
        let blob = ArchiveBlob::read(&path).unwrap();
        assert_eq!(blob.picture_count_hint, 3);
        assert_eq!(blob.len(), 4);
    }

    #[test]
    fn short_blob_has_zero_hint() {
        let blob = ArchiveBlob::from_bytes(vec![9]).unwrap();
        assert_eq!(blob.picture_count_hint, 0);
    }
}
