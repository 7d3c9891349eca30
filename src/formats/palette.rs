//! # VGA Palette
//!
//! 256 RGB triplets with 6-bit channels, as uploaded to the VGA DAC. Channels
//! are widened to 8 bits on load.

use std::{
    io::Cursor,
    path::Path,
};

use image::Rgba;

use crate::{
    binary_utils::read_u8,
    containers::load_source,
    error::{ExtractError, Result},
};

pub const PALETTE_COLOURS: usize = 256;
pub const PALETTE_FILE_SIZE: usize = PALETTE_COLOURS * 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn to_rgba(self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colours: [Rgb; PALETTE_COLOURS],
}

impl Palette {
    pub fn load(path: &Path) -> Result<Self> {
        let data = load_source(path)?;
        Self::from_bytes(&data).map_err(|e| match e {
            ExtractError::Format { message, .. } => {
                ExtractError::format(format!("palette {}", path.display()), message)
            }
            other => other,
        })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < PALETTE_FILE_SIZE {
            return Err(ExtractError::format(
                "palette",
                format!("{} bytes, expected {}", data.len(), PALETTE_FILE_SIZE),
            ));
        }

        let mut cursor = Cursor::new(data);
        let mut colours = [Rgb::default(); PALETTE_COLOURS];
        for colour in &mut colours {
            let mut channel = || -> Result<u8> {
                read_u8(&mut cursor)
                    .map(widen_6bit)
                    .map_err(|e| ExtractError::format("palette", e.to_string()))
            };
            *colour = Rgb {
                r: channel()?,
                g: channel()?,
                b: channel()?,
            };
        }

        Ok(Palette { colours })
    }

    pub fn colour(&self, index: u8) -> Rgb {
        self.colours[index as usize]
    }
}

pub fn widen_6bit(value: u8) -> u8 {
    (value.min(63) as u16 * 255 / 63) as u8
}
