//! # Sound and music banks
//!
//! Both kinds of bank are a run of RNC members concatenated into one file.
//! Sound files pair a directory member with a data member. Music members are
//! self-contained banks: the last four bytes point at a table of 16-byte
//! records, each naming a directory and a data area for one set of tunes.
//!
//! Directory records are 32 bytes: name[12], six bytes of padding,
//! `offset_tune` at 18, four bytes of padding, `tune_len_bytes` at 26 and an
//! unused i16 at 30.

use tracing::{debug, warn};

use crate::{
    binary_utils::{fixed_str, Field, FieldKind, RecordLayout},
    containers::{
        compression::rnc::{RncContainer, RNC_HEADER_SIZE, RNC_SIGNATURE},
        ContainerHandler,
    },
    error::{ExtractError, Result},
};

pub const DIRECTORY_RECORD_SIZE: usize = 32;
pub const MUSIC_TABLE_RECORD_SIZE: usize = 16;
const MUSIC_TRAILER_SIZE: usize = 4;
const NO_FILE: &str = "NO FILE";

static DIRECTORY_RECORD: RecordLayout = RecordLayout::new("sound directory record", DIRECTORY_RECORD_SIZE);
const NAME: Field = Field::new("filename", 0, FieldKind::Bytes(12));
const OFFSET_TUNE: Field = Field::new("offset_tune", 18, FieldKind::U32Le);
const TUNE_LEN: Field = Field::new("tune_len_bytes", 26, FieldKind::U32Le);
const UNKNOWN: Field = Field::new("unknown", 30, FieldKind::I16Le);

static MUSIC_TABLE_RECORD: RecordLayout = RecordLayout::new("music table record", MUSIC_TABLE_RECORD_SIZE);
const OFFSET_TUNES: Field = Field::new("offset_tunes", 0, FieldKind::U32Le);
const OFFSET_TUNE1: Field = Field::new("offset_tune1", 4, FieldKind::U32Le);
const TABLE_UNKNOWN: Field = Field::new("unknown", 8, FieldKind::U32Le);
const ALL_TUNES_LEN: Field = Field::new("all_tunes_len_bytes", 12, FieldKind::U32Le);

static MUSIC_TRAILER: RecordLayout = RecordLayout::new("music bank trailer", MUSIC_TRAILER_SIZE);
const TABLE_OFFSET: Field = Field::new("table_offset", 0, FieldKind::U32Le);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundArchiveEntry {
    pub filename: String,
    pub offset_tune: u32,
    pub tune_len_bytes: u32,
    pub unknown: i16,
}

impl SoundArchiveEntry {
    /// Empty names and the `NO FILE` sentinel mark unused slots.
    pub fn is_placeholder(&self) -> bool {
        self.filename.is_empty() || self.filename == NO_FILE
    }

    fn slice<'a>(&self, data: &'a [u8], base: usize) -> Result<&'a [u8]> {
        let start = base + self.offset_tune as usize;
        let end = start + self.tune_len_bytes as usize;
        data.get(start..end).ok_or_else(|| {
            ExtractError::format(
                "sound directory record",
                format!(
                    "{:?} spans {}..{}, data has {} bytes",
                    self.filename,
                    start,
                    end,
                    data.len()
                ),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicTableEntry {
    pub offset_tunes: u32,
    pub offset_tune1: u32,
    pub unknown: u32,
    pub all_tunes_len_bytes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarvedFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Files carved from one directory.
#[derive(Debug, Clone)]
pub struct CarvedSet {
    pub index: usize,
    pub files: Vec<CarvedFile>,
}

fn find_signature(blob: &[u8], from: usize) -> Option<usize> {
    blob.get(from..)?
        .windows(RNC_SIGNATURE.len())
        .position(|window| window == RNC_SIGNATURE)
        .map(|p| p + from)
}

/// Splits a bank into its RNC members. Bytes before the first signature are
/// ignored. A member whose header is unreadable runs to the next signature.
pub fn split_members(blob: &[u8]) -> Vec<&[u8]> {
    let mut members = Vec::new();
    let mut position = find_signature(blob, 0);

    while let Some(start) = position {
        let end = match RncContainer::container_len(&blob[start..]) {
            Ok(len) if len >= RNC_HEADER_SIZE && start + len <= blob.len() => start + len,
            _ => find_signature(blob, start + RNC_SIGNATURE.len()).unwrap_or(blob.len()),
        };
        members.push(&blob[start..end]);
        position = find_signature(blob, end);
    }

    members
}

pub fn unpack_member(member: &[u8], index: usize) -> Result<Vec<u8>> {
    RncContainer::deserialise(member)
        .and_then(|container| container.decompress())
        .map_err(|e| match e {
            ExtractError::Format { message, .. } | ExtractError::Decompress { message, .. } => {
                ExtractError::decompress(format!("bank member {}", index), message)
            }
            other => other,
        })
}

/// Splits and decompresses every member of a bank.
pub fn unpack_bank(blob: &[u8]) -> Result<Vec<Vec<u8>>> {
    split_members(blob)
        .into_iter()
        .enumerate()
        .map(|(index, member)| unpack_member(member, index))
        .collect()
}

pub fn read_directory(directory: &[u8]) -> Result<Vec<SoundArchiveEntry>> {
    DIRECTORY_RECORD.iter(directory).map(|record| read_entry(record.bytes())).collect()
}

fn read_entry(bytes: &[u8]) -> Result<SoundArchiveEntry> {
    let record = DIRECTORY_RECORD.at(bytes, 0)?;
    Ok(SoundArchiveEntry {
        filename: fixed_str(record.raw(&NAME)?),
        offset_tune: record.u32(&OFFSET_TUNE)?,
        tune_len_bytes: record.u32(&TUNE_LEN)?,
        unknown: record.i16(&UNKNOWN)?,
    })
}

/// Carves every named entry of `directory` out of `data`.
pub fn carve_sounds(directory: &[u8], data: &[u8]) -> Result<Vec<CarvedFile>> {
    let mut files = Vec::new();
    for entry in read_directory(directory)? {
        if entry.is_placeholder() {
            continue;
        }
        let bytes = entry.slice(data, 0)?;
        debug!("  {} ({} bytes)", entry.filename, bytes.len());
        files.push(CarvedFile {
            name: entry.filename,
            data: bytes.to_vec(),
        });
    }
    Ok(files)
}

/// Sound members come in (directory, data) pairs.
pub fn sound_sets(members: &[Vec<u8>]) -> Result<Vec<CarvedSet>> {
    if members.len() % 2 != 0 {
        warn!(
            "Sound bank has {} members; ignoring the unpaired last one",
            members.len()
        );
    }
    members
        .chunks_exact(2)
        .enumerate()
        .map(|(index, pair)| {
            Ok(CarvedSet {
                index,
                files: carve_sounds(&pair[0], &pair[1])?,
            })
        })
        .collect()
}

pub fn read_music_table(bank: &[u8]) -> Result<Vec<MusicTableEntry>> {
    let trailer_at = bank.len().checked_sub(MUSIC_TRAILER_SIZE).ok_or_else(|| {
        ExtractError::format("music bank", format!("bank of {} bytes has no trailer", bank.len()))
    })?;
    let table_offset = MUSIC_TRAILER.at(bank, trailer_at)?.u32(&TABLE_OFFSET)? as usize;
    let table = bank.get(table_offset..trailer_at).ok_or_else(|| {
        ExtractError::format(
            "music bank",
            format!("field table_offset is {}, trailer is at {}", table_offset, trailer_at),
        )
    })?;

    MUSIC_TABLE_RECORD
        .iter(table)
        .map(|record| {
            Ok(MusicTableEntry {
                offset_tunes: record.u32(&OFFSET_TUNES)?,
                offset_tune1: record.u32(&OFFSET_TUNE1)?,
                unknown: record.u32(&TABLE_UNKNOWN)?,
                all_tunes_len_bytes: record.u32(&ALL_TUNES_LEN)?,
            })
        })
        .collect()
}

/// Tunes of one table entry, read until their lengths add up to
/// `all_tunes_len_bytes`. Unnamed tunes are numbered by position.
pub fn carve_music_set(bank: &[u8], entry: &MusicTableEntry) -> Result<Vec<CarvedFile>> {
    let mut files = Vec::new();
    let mut total = 0usize;
    let mut position = entry.offset_tunes as usize;
    let wanted = entry.all_tunes_len_bytes as usize;

    while total < wanted {
        let tune = read_entry(bank.get(position..).unwrap_or_default()).map_err(|_| {
            ExtractError::format(
                "music directory",
                format!(
                    "ran out of records at offset {} with {} of {} bytes found",
                    position, total, wanted
                ),
            )
        })?;
        total += tune.tune_len_bytes as usize;
        position += DIRECTORY_RECORD_SIZE;

        if tune.filename == NO_FILE {
            continue;
        }
        let data = tune.slice(bank, entry.offset_tune1 as usize)?;
        let name = if tune.filename.is_empty() {
            format!("tune_{:02}.raw", files.len())
        } else {
            tune.filename
        };
        files.push(CarvedFile {
            name,
            data: data.to_vec(),
        });
    }
    Ok(files)
}

/// Every non-empty tune set of every music bank, numbered in file order.
pub fn music_sets(members: &[Vec<u8>]) -> Result<Vec<CarvedSet>> {
    let mut sets = Vec::new();
    for bank in members {
        for entry in read_music_table(bank)? {
            if entry.all_tunes_len_bytes == 0 {
                continue;
            }
            sets.push(CarvedSet {
                index: sets.len(),
                files: carve_music_set(bank, &entry)?,
            });
        }
    }
    Ok(sets)
}
