//! # Indexed Pictures
//!
//! Run-length encoded pictures addressed by TAB entries, and plain
//! `width × height` index arrays used for full-screen art, skies and atlases.
//!
//! ## Run-length stream
//! Each control byte `g` is read as signed:
//! - `g < 0`: skip `-g` transparent columns.
//! - `g == 0`: end of row.
//! - `g > 0`: the next `g` bytes are opaque palette indices.

use std::ops::AddAssign;

use image::RgbaImage;

use crate::{
    containers::archive::{ArchiveBlob, ArchiveIndex, ArchiveIndexEntry},
    error::{ExtractError, Result},
    formats::palette::Palette,
};

/// Mask value of a pixel written by the decoder.
pub const ALPHA_OPAQUE: u8 = 0;
/// Mask value of a pixel never written.
pub const ALPHA_BACKGROUND: u8 = 255;

/// Non-fatal conditions hit while decoding. Output is still produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeAnomalies {
    /// Pixel bytes dropped because they fell outside the picture bounds.
    pub colour_leaks: usize,
    /// Times the source ran out before the picture was complete.
    pub end_of_buffer: usize,
}

impl DecodeAnomalies {
    pub fn is_clean(&self) -> bool {
        self.colour_leaks == 0 && self.end_of_buffer == 0
    }
}

impl AddAssign for DecodeAnomalies {
    fn add_assign(&mut self, other: Self) {
        self.colour_leaks += other.colour_leaks;
        self.end_of_buffer += other.end_of_buffer;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: usize,
    pub height: usize,
    pub indices: Vec<u8>,
    pub alpha: Vec<u8>,
}

impl DecodedImage {
    /// Index 0 everywhere, every pixel background.
    pub fn new(width: usize, height: usize) -> Self {
        DecodedImage {
            width,
            height,
            indices: vec![0; width * height],
            alpha: vec![ALPHA_BACKGROUND; width * height],
        }
    }

    /// Wraps a plain index array; every pixel is opaque.
    pub fn from_raw(width: usize, height: usize, data: &[u8]) -> Result<Self> {
        let needed = width * height;
        if width == 0 || height == 0 || data.len() < needed {
            return Err(ExtractError::format(
                "raw picture",
                format!(
                    "{}x{} needs {} bytes, found {}",
                    width,
                    height,
                    needed,
                    data.len()
                ),
            ));
        }
        Ok(DecodedImage {
            width,
            height,
            indices: data[..needed].to_vec(),
            alpha: vec![ALPHA_OPAQUE; needed],
        })
    }

    /// Like [`DecodedImage::from_raw`], taking as many whole rows as the
    /// data holds.
    pub fn from_raw_rows(width: usize, data: &[u8]) -> Result<Self> {
        let height = if width == 0 { 0 } else { data.len() / width };
        Self::from_raw(width, height, data)
    }

    /// Resolves indices through `palette`. Background pixels keep their
    /// palette colour but become fully transparent.
    pub fn to_rgba(&self, palette: &Palette) -> RgbaImage {
        let mut img = RgbaImage::new(self.width as u32, self.height as u32);
        for (i, pixel) in img.pixels_mut().enumerate() {
            let alpha = if self.alpha[i] == ALPHA_OPAQUE { 255 } else { 0 };
            *pixel = palette.colour(self.indices[i]).to_rgba(alpha);
        }
        img
    }
}

#[derive(Debug, Clone)]
pub struct PictureDecode {
    pub image: DecodedImage,
    /// Source bytes read, control bytes included.
    pub consumed: usize,
    pub anomalies: DecodeAnomalies,
}

/// Decodes one run-length picture starting at `entry.offset` in `blob`.
pub fn decode_picture(blob: &[u8], entry: &ArchiveIndexEntry) -> PictureDecode {
    let width = entry.width as usize;
    let height = entry.height as usize;
    let start = entry.offset as usize;

    let mut image = DecodedImage::new(width, height);
    let mut anomalies = DecodeAnomalies::default();
    let mut pos = start;
    let mut row = 0usize;
    let mut col = 0usize;

    'rows: while row < height {
        let Some(&control) = blob.get(pos) else {
            anomalies.end_of_buffer += 1;
            break;
        };
        pos += 1;

        let g = control as i8;
        if g < 0 {
            col += g.unsigned_abs() as usize;
        } else if g == 0 {
            row += 1;
            col = 0;
        } else {
            for _ in 0..g {
                let Some(&index) = blob.get(pos) else {
                    anomalies.end_of_buffer += 1;
                    break 'rows;
                };
                pos += 1;
                if col < width && row < height {
                    let i = row * width + col;
                    image.indices[i] = index;
                    image.alpha[i] = ALPHA_OPAQUE;
                } else {
                    anomalies.colour_leaks += 1;
                }
                col += 1;
            }
        }
    }

    PictureDecode {
        image,
        consumed: pos.saturating_sub(start),
        anomalies,
    }
}

/// How well the TAB entries cover the DAT payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobCoverage {
    /// Payload bytes no decoded entry read.
    pub unused_bytes: usize,
    /// Payload bytes read by more than one entry.
    pub overlapping_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ArchiveDecode {
    /// `(picture number, image)` in TAB order.
    pub pictures: Vec<(usize, DecodedImage)>,
    pub skipped: usize,
    pub anomalies: DecodeAnomalies,
    pub coverage: BlobCoverage,
}

const DAT_HEADER_LEN: usize = 2;

/// Decodes every entry of an archive, skipping entries that cannot be decoded.
pub fn decode_archive(index: &ArchiveIndex, blob: &ArchiveBlob) -> ArchiveDecode {
    let mut pictures = Vec::with_capacity(index.len());
    let mut skipped = 0;
    let mut anomalies = DecodeAnomalies::default();
    let mut usage = vec![0u8; blob.len()];

    for (number, entry) in index.entries.iter().enumerate() {
        if !entry.is_decodable(blob.len()) {
            skipped += 1;
            continue;
        }

        let decoded = decode_picture(&blob.bytes, entry);
        let start = entry.offset as usize;
        let end = (start + decoded.consumed).min(usage.len());
        for used in &mut usage[start..end] {
            *used = used.saturating_add(1);
        }
        anomalies += decoded.anomalies;
        pictures.push((number, decoded.image));
    }

    let payload = usage.get(DAT_HEADER_LEN..).unwrap_or(&[]);
    let coverage = BlobCoverage {
        unused_bytes: payload.iter().filter(|&&u| u == 0).count(),
        overlapping_bytes: payload.iter().filter(|&&u| u > 1).count(),
    };

    ArchiveDecode {
        pictures,
        skipped,
        anomalies,
        coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::archive::SentinelMode;

    fn entry(offset: u32, width: u8, height: u8) -> ArchiveIndexEntry {
        ArchiveIndexEntry {
            offset,
            width,
            height,
        }
    }

    #[test]
    fn two_by_two_picture_decodes_opaque() {
        let blob = [2u8, 10, 11, 0, 2, 12, 13, 0];
        let decoded = decode_picture(&blob, &entry(0, 2, 2));
        assert_eq!(decoded.image.indices, vec![10, 11, 12, 13]);
        assert_eq!(decoded.image.alpha, vec![0, 0, 0, 0]);
        assert_eq!(decoded.consumed, blob.len());
        assert!(decoded.anomalies.is_clean());
    }

    #[test]
    fn row_separators_only_yield_background() {
        let (width, height) = (7u8, 5u8);
        let blob = vec![0u8; height as usize];
        let decoded = decode_picture(&blob, &entry(0, width, height));
        assert_eq!(decoded.image.width * decoded.image.height, 35);
        assert!(decoded.image.alpha.iter().all(|&a| a == ALPHA_BACKGROUND));
        assert!(decoded.image.indices.iter().all(|&i| i == 0));
        assert_eq!(decoded.consumed, 5);
    }

    #[test]
    fn negative_control_skips_columns() {
        // skip 2, copy 1, end row
        let blob = [0xFEu8, 1, 42, 0];
        let decoded = decode_picture(&blob, &entry(0, 4, 1));
        assert_eq!(decoded.image.indices, vec![0, 0, 42, 0]);
        assert_eq!(decoded.image.alpha, vec![255, 255, 0, 255]);
    }

    #[test]
    fn overflowing_run_counts_colour_leaks() {
        let blob = [3u8, 1, 2, 3, 0];
        let decoded = decode_picture(&blob, &entry(0, 2, 1));
        assert_eq!(decoded.image.indices, vec![1, 2]);
        assert_eq!(decoded.anomalies.colour_leaks, 1);
        assert_eq!(decoded.anomalies.end_of_buffer, 0);
    }

    #[test]
    fn truncated_stream_reports_end_of_buffer() {
        let blob = [2u8, 5];
        let decoded = decode_picture(&blob, &entry(0, 2, 2));
        assert_eq!(decoded.image.indices, vec![5, 0, 0, 0]);
        assert_eq!(decoded.image.alpha, vec![0, 255, 255, 255]);
        assert_eq!(decoded.anomalies.end_of_buffer, 1);
        assert_eq!(decoded.consumed, 2);
    }

    #[test]
    fn archive_skips_zero_width_entry() {
        let blob = ArchiveBlob::from_bytes(vec![2, 0, 1, 7, 0, 1, 8, 0]).unwrap();
        let mut tab = vec![0u8; 6];
        for (offset, width, height) in [(2u32, 1u8, 1u8), (5, 0, 1), (5, 1, 1)] {
            tab.extend_from_slice(&offset.to_le_bytes());
            tab.push(width);
            tab.push(height);
        }
        let index = ArchiveIndex::from_bytes(&tab, SentinelMode::Skip).unwrap();

        let result = decode_archive(&index, &blob);
        assert_eq!(result.skipped, 1);
        let numbers: Vec<usize> = result.pictures.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![0, 2]);
        assert_eq!(result.pictures[1].1.indices, vec![8]);
        assert_eq!(result.coverage.unused_bytes, 0);
    }

    #[test]
    fn archive_skips_offsets_past_the_blob() {
        let blob = ArchiveBlob::from_bytes(vec![1, 0, 0]).unwrap();
        let index = ArchiveIndex {
            entries: vec![entry(3, 1, 1), entry(400, 2, 2)],
            source_len: 18,
        };
        let result = decode_archive(&index, &blob);
        assert_eq!(result.skipped, 2);
        assert!(result.pictures.is_empty());
        assert_eq!(result.coverage.unused_bytes, 1);
    }

    #[test]
    fn coverage_reports_overlap() {
        let blob = ArchiveBlob::from_bytes(vec![2, 0, 1, 9, 0, 0xFF]).unwrap();
        let index = ArchiveIndex {
            entries: vec![entry(2, 1, 1), entry(2, 1, 1)],
            source_len: 12,
        };
        let result = decode_archive(&index, &blob);
        assert_eq!(result.coverage.overlapping_bytes, 3);
        assert_eq!(result.coverage.unused_bytes, 1);
    }

    #[test]
    fn raw_rows_derive_height() {
        let image = DecodedImage::from_raw_rows(4, &[1u8; 10]).unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert!(image.alpha.iter().all(|&a| a == ALPHA_OPAQUE));
        assert!(DecodedImage::from_raw(4, 4, &[0u8; 8]).is_err());
    }
}
