//! # FLIC animations
//!
//! Autodesk FLI/FLC playback into a single indexed framebuffer. Frames are
//! deltas against the previous frame, so they can only be decoded in order;
//! the caller owns the [`FlicFrame`] and the decoder mutates it in place.
//!
//! Supported chunks: colour (64 and 256 level), black, copy, byte run, line
//! compression and word delta. Postage stamps and prefix frames are skipped.

use std::io::{self, Cursor};

use image::RgbaImage;
use tracing::debug;

use crate::{
    binary_utils::{read_bytes, read_i8, read_u16_le, read_u8, Field, FieldKind, RecordLayout},
    error::{ExtractError, Result},
    formats::palette::{widen_6bit, Rgb, PALETTE_COLOURS},
};

pub const FLIC_HEADER_SIZE: usize = 128;
pub const FLI_MAGIC: u16 = 0xAF11;
pub const FLC_MAGIC: u16 = 0xAF12;

const FRAME_MAGIC: u16 = 0xF1FA;
const PREFIX_MAGIC: u16 = 0xF100;
const FRAME_HEADER_SIZE: usize = 16;
const CHUNK_HEADER_SIZE: usize = 6;

const CHUNK_DELTA_WORD: u16 = 7;
const CHUNK_COLOUR_256: u16 = 4;
const CHUNK_COLOUR_64: u16 = 11;
const CHUNK_DELTA_LINE: u16 = 12;
const CHUNK_BLACK: u16 = 13;
const CHUNK_BYTE_RUN: u16 = 15;
const CHUNK_COPY: u16 = 16;
const CHUNK_POSTAGE_STAMP: u16 = 18;

static FLIC_HEADER: RecordLayout = RecordLayout::new("FLIC header", FLIC_HEADER_SIZE);
const FILE_SIZE: Field = Field::new("size", 0, FieldKind::U32Le);
const MAGIC: Field = Field::new("magic", 4, FieldKind::U16Le);
const FRAMES: Field = Field::new("frames", 6, FieldKind::U16Le);
const WIDTH: Field = Field::new("width", 8, FieldKind::U16Le);
const HEIGHT: Field = Field::new("height", 10, FieldKind::U16Le);
const DEPTH: Field = Field::new("depth", 12, FieldKind::U16Le);
const FLAGS: Field = Field::new("flags", 14, FieldKind::U16Le);
/// FLI stores a 16-bit jiffy count followed by a reserved word.
const FLI_SPEED: Field = Field::new("speed", 16, FieldKind::U16Le);
const SPEED: Field = Field::new("speed", 16, FieldKind::U32Le);
const FIRST_FRAME: Field = Field::new("oframe1", 80, FieldKind::U32Le);

static FRAME_HEADER: RecordLayout = RecordLayout::new("FLIC frame", FRAME_HEADER_SIZE);
const FRAME_SIZE: Field = Field::new("size", 0, FieldKind::U32Le);
const FRAME_TYPE: Field = Field::new("type", 4, FieldKind::U16Le);
const FRAME_CHUNKS: Field = Field::new("chunks", 6, FieldKind::U16Le);

static CHUNK_HEADER: RecordLayout = RecordLayout::new("FLIC chunk", CHUNK_HEADER_SIZE);
const CHUNK_SIZE: Field = Field::new("size", 0, FieldKind::U32Le);
const CHUNK_TYPE: Field = Field::new("type", 4, FieldKind::U16Le);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlicKind {
    Fli,
    Flc,
}

#[derive(Debug, Clone)]
pub struct FlicHeader {
    pub size: u32,
    pub kind: FlicKind,
    pub frames: u16,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub flags: u16,
    /// Jiffies (1/70 s) for FLI, milliseconds for FLC.
    pub speed: u32,
    pub first_frame_offset: usize,
}

impl FlicHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let record = FLIC_HEADER.at(data, 0)?;
        let kind = match record.u16(&MAGIC)? {
            FLI_MAGIC => FlicKind::Fli,
            FLC_MAGIC => FlicKind::Flc,
            other => {
                return Err(ExtractError::format(
                    "FLIC header",
                    format!("field magic is 0x{:04X}, expected 0xAF11 or 0xAF12", other),
                ))
            }
        };

        let speed = match kind {
            FlicKind::Fli => record.u16(&FLI_SPEED)? as u32,
            FlicKind::Flc => record.u32(&SPEED)?,
        };

        let first_frame_offset = match kind {
            FlicKind::Fli => FLIC_HEADER_SIZE,
            FlicKind::Flc => match record.u32(&FIRST_FRAME)? as usize {
                0 => FLIC_HEADER_SIZE,
                offset => offset,
            },
        };

        Ok(FlicHeader {
            size: record.u32(&FILE_SIZE)?,
            kind,
            frames: record.u16(&FRAMES)?,
            width: record.nonzero_u16(&WIDTH)?,
            height: record.nonzero_u16(&HEIGHT)?,
            depth: record.u16(&DEPTH)?,
            flags: record.u16(&FLAGS)?,
            speed,
            first_frame_offset,
        })
    }

    pub fn frame_delay_ms(&self) -> u64 {
        match self.kind {
            FlicKind::Fli => self.speed as u64 * 1000 / 70,
            FlicKind::Flc => self.speed as u64,
        }
    }
}

/// Indexed framebuffer and colormap, overwritten frame by frame.
#[derive(Debug, Clone)]
pub struct FlicFrame {
    pub width: usize,
    pub height: usize,
    pub rowstride: usize,
    pub pixels: Vec<u8>,
    pub colormap: [Rgb; PALETTE_COLOURS],
}

impl FlicFrame {
    pub fn new(width: usize, height: usize) -> Self {
        FlicFrame {
            width,
            height,
            rowstride: width,
            pixels: vec![0; width * height],
            colormap: [Rgb::default(); PALETTE_COLOURS],
        }
    }

    fn put(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.pixels[y * self.rowstride + x] = value;
        }
    }

    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let index = self.pixels[y as usize * self.rowstride + x as usize];
            self.colormap[index as usize].to_rgba(255)
        })
    }
}

pub struct FlicDecoder {
    data: Vec<u8>,
    header: FlicHeader,
    position: usize,
    decoded: usize,
}

impl FlicDecoder {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let header = FlicHeader::parse(&data)?;
        debug!(
            "FLIC {:?} {}x{}, {} frames, {} ms per frame",
            header.kind,
            header.width,
            header.height,
            header.frames,
            header.frame_delay_ms()
        );
        Ok(FlicDecoder {
            position: header.first_frame_offset,
            data,
            header,
            decoded: 0,
        })
    }

    pub fn header(&self) -> &FlicHeader {
        &self.header
    }

    /// A blank framebuffer sized for this animation.
    pub fn new_frame(&self) -> FlicFrame {
        FlicFrame::new(self.header.width as usize, self.header.height as usize)
    }

    pub fn rewind(&mut self) {
        self.position = self.header.first_frame_offset;
        self.decoded = 0;
    }

    /// Applies the next frame to `frame`. Returns `false` once every frame has
    /// been decoded; the trailing loop frame is never applied.
    pub fn decode_next(&mut self, frame: &mut FlicFrame) -> Result<bool> {
        loop {
            if self.decoded >= self.header.frames as usize {
                return Ok(false);
            }

            let record = FRAME_HEADER.at(&self.data, self.position)?;
            let size = record.u32(&FRAME_SIZE)? as usize;
            let end = self.position + size;
            if size < CHUNK_HEADER_SIZE || end > self.data.len() {
                return Err(ExtractError::format(
                    "FLIC frame",
                    format!(
                        "frame at offset {} claims {} bytes, file has {}",
                        self.position,
                        size,
                        self.data.len()
                    ),
                ));
            }

            match record.u16(&FRAME_TYPE)? {
                PREFIX_MAGIC => {
                    debug!("Skipping FLIC prefix chunk at {}", self.position);
                    self.position = end;
                }
                FRAME_MAGIC if size >= FRAME_HEADER_SIZE => {
                    let chunks = record.u16(&FRAME_CHUNKS)?;
                    apply_chunks(
                        &self.data[self.position + FRAME_HEADER_SIZE..end],
                        chunks,
                        frame,
                    )?;
                    self.position = end;
                    self.decoded += 1;
                    return Ok(true);
                }
                other => {
                    return Err(ExtractError::format(
                        "FLIC frame",
                        format!(
                            "bad frame type 0x{:04X} or size {} at offset {}",
                            other, size, self.position
                        ),
                    ))
                }
            }
        }
    }

    /// Sequential iterator rendering every frame to RGBA.
    pub fn frames(&mut self) -> FlicFrames<'_> {
        let frame = self.new_frame();
        FlicFrames {
            decoder: self,
            frame,
            failed: false,
        }
    }
}

pub struct FlicFrames<'a> {
    decoder: &'a mut FlicDecoder,
    frame: FlicFrame,
    failed: bool,
}

impl Iterator for FlicFrames<'_> {
    type Item = Result<(usize, RgbaImage)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let index = self.decoder.decoded;
        match self.decoder.decode_next(&mut self.frame) {
            Ok(true) => Some(Ok((index, self.frame.to_image()))),
            Ok(false) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn apply_chunks(body: &[u8], count: u16, frame: &mut FlicFrame) -> Result<()> {
    let mut position = 0;
    for _ in 0..count {
        let record = CHUNK_HEADER.at(body, position)?;
        let size = record.u32(&CHUNK_SIZE)? as usize;
        let kind = record.u16(&CHUNK_TYPE)?;
        let end = position + size;
        if size < CHUNK_HEADER_SIZE || end > body.len() {
            return Err(ExtractError::format(
                "FLIC chunk",
                format!("chunk type {} claims {} bytes, frame has {}", kind, size, body.len() - position),
            ));
        }

        let data = &body[position + CHUNK_HEADER_SIZE..end];
        let mut cursor = Cursor::new(data);
        let applied = match kind {
            CHUNK_COLOUR_256 => decode_colour(&mut cursor, frame, false),
            CHUNK_COLOUR_64 => decode_colour(&mut cursor, frame, true),
            CHUNK_BLACK => {
                frame.pixels.fill(0);
                Ok(())
            }
            CHUNK_COPY => decode_copy(&mut cursor, frame),
            CHUNK_BYTE_RUN => decode_byte_run(&mut cursor, frame),
            CHUNK_DELTA_LINE => decode_delta_line(&mut cursor, frame),
            CHUNK_DELTA_WORD => decode_delta_word(&mut cursor, frame),
            CHUNK_POSTAGE_STAMP => Ok(()),
            other => {
                debug!("Ignoring FLIC chunk type {}", other);
                Ok(())
            }
        };
        applied.map_err(|e| {
            ExtractError::format("FLIC chunk", format!("chunk type {}: {}", kind, e))
        })?;

        position = end;
    }
    Ok(())
}

fn decode_colour(cursor: &mut Cursor<&[u8]>, frame: &mut FlicFrame, six_bit: bool) -> io::Result<()> {
    let packets = read_u16_le(cursor)?;
    let mut index = 0usize;
    for _ in 0..packets {
        index += read_u8(cursor)? as usize;
        let count = match read_u8(cursor)? {
            0 => 256,
            n => n as usize,
        };
        for _ in 0..count {
            let rgb = read_bytes(cursor, 3)?;
            let channel = |v: u8| if six_bit { widen_6bit(v) } else { v };
            if index < PALETTE_COLOURS {
                frame.colormap[index] = Rgb::new(channel(rgb[0]), channel(rgb[1]), channel(rgb[2]));
            }
            index += 1;
        }
    }
    Ok(())
}

fn decode_copy(cursor: &mut Cursor<&[u8]>, frame: &mut FlicFrame) -> io::Result<()> {
    for y in 0..frame.height {
        let row = read_bytes(cursor, frame.width)?;
        let start = y * frame.rowstride;
        frame.pixels[start..start + frame.width].copy_from_slice(&row);
    }
    Ok(())
}

fn decode_byte_run(cursor: &mut Cursor<&[u8]>, frame: &mut FlicFrame) -> io::Result<()> {
    for y in 0..frame.height {
        // Packet count is unreliable for wide frames; the row width ends the line.
        let _packets = read_u8(cursor)?;
        let mut x = 0;
        while x < frame.width {
            let count = read_i8(cursor)?;
            if count < 0 {
                for _ in 0..count.unsigned_abs() {
                    let value = read_u8(cursor)?;
                    frame.put(x, y, value);
                    x += 1;
                }
            } else {
                let value = read_u8(cursor)?;
                for _ in 0..count {
                    frame.put(x, y, value);
                    x += 1;
                }
            }
            if count == 0 {
                break;
            }
        }
    }
    Ok(())
}

fn decode_delta_line(cursor: &mut Cursor<&[u8]>, frame: &mut FlicFrame) -> io::Result<()> {
    let first = read_u16_le(cursor)? as usize;
    let lines = read_u16_le(cursor)? as usize;
    for y in first..first + lines {
        let packets = read_u8(cursor)?;
        let mut x = 0;
        for _ in 0..packets {
            x += read_u8(cursor)? as usize;
            let count = read_i8(cursor)?;
            if count > 0 {
                for _ in 0..count {
                    let value = read_u8(cursor)?;
                    frame.put(x, y, value);
                    x += 1;
                }
            } else if count < 0 {
                let value = read_u8(cursor)?;
                for _ in 0..count.unsigned_abs() {
                    frame.put(x, y, value);
                    x += 1;
                }
            }
        }
    }
    Ok(())
}

fn decode_delta_word(cursor: &mut Cursor<&[u8]>, frame: &mut FlicFrame) -> io::Result<()> {
    let mut lines = read_u16_le(cursor)?;
    let mut y = 0usize;

    while lines > 0 {
        let word = read_u16_le(cursor)?;
        let packets = match word & 0xC000 {
            0xC000 => {
                y += (word as i16).unsigned_abs() as usize;
                continue;
            }
            0x8000 => {
                let last = frame.width.saturating_sub(1);
                frame.put(last, y, (word & 0xFF) as u8);
                continue;
            }
            0x0000 => word,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("undefined opcode word 0x{:04X}", word),
                ))
            }
        };

        let mut x = 0;
        for _ in 0..packets {
            x += read_u8(cursor)? as usize;
            let count = read_i8(cursor)?;
            if count > 0 {
                for _ in 0..count {
                    let lo = read_u8(cursor)?;
                    let hi = read_u8(cursor)?;
                    frame.put(x, y, lo);
                    frame.put(x + 1, y, hi);
                    x += 2;
                }
            } else if count < 0 {
                let lo = read_u8(cursor)?;
                let hi = read_u8(cursor)?;
                for _ in 0..count.unsigned_abs() {
                    frame.put(x, y, lo);
                    frame.put(x + 1, y, hi);
                    x += 2;
                }
            }
        }
        y += 1;
        lines -= 1;
    }
    Ok(())
}
