//! # Font Glyph Preprocessing
//!
//! Turns a decoded glyph bitmap into a standalone sprite in four passes:
//!
//! 1. Infer the background colour from the four corners.
//! 2. Collect the ink colours (anything that is not background).
//! 3. Optionally draw a 1-pixel outline around the ink.
//! 4. Trim empty columns, keeping one column of margin on each side.
//!
//! Colour comparisons ignore alpha throughout.

use std::collections::HashSet;

use image::{imageops, Rgba, RgbaImage};
use tracing::warn;

use crate::formats::palette::Rgb;

/// Horizontal crop of a glyph; the full height is always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphRect {
    pub x: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct FontGlyph {
    pub image: RgbaImage,
    pub transparent: Rgb,
    pub ink: HashSet<Rgb>,
    pub trimmed: GlyphRect,
}

impl FontGlyph {
    pub fn process(mut image: RgbaImage, outline: Option<Rgba<u8>>) -> Self {
        let transparent = detect_transparent_colour(&image);
        let ink = detect_ink_colours(&image, transparent);
        match outline {
            // An outline in the background colour would be trimmed and cleared.
            Some(colour) if rgb(&colour) == transparent => {
                warn!(
                    "Outline colour {:?} matches the glyph background, skipping outline",
                    transparent
                );
            }
            Some(colour) => add_outline(&mut image, transparent, &ink, colour),
            None => {}
        }
        let trimmed = trim_rect(&image, transparent);

        FontGlyph {
            image,
            transparent,
            ink,
            trimmed,
        }
    }

    /// The trimmed glyph with background pixels made fully transparent.
    pub fn to_sprite(&self) -> RgbaImage {
        let rect = self.trimmed;
        let mut sprite = imageops::crop_imm(&self.image, rect.x, 0, rect.width, rect.height).to_image();
        for pixel in sprite.pixels_mut() {
            pixel[3] = if rgb(pixel) == self.transparent { 0 } else { 255 };
        }
        sprite
    }
}

fn rgb(pixel: &Rgba<u8>) -> Rgb {
    Rgb::new(pixel[0], pixel[1], pixel[2])
}

/// Most frequent corner colour. Ties go to the colour seen first in the order
/// top-left, top-right, bottom-left, bottom-right.
pub fn detect_transparent_colour(image: &RgbaImage) -> Rgb {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Rgb::default();
    }
    let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)];

    let mut tally: Vec<(Rgb, usize)> = Vec::with_capacity(4);
    for (x, y) in corners {
        let colour = rgb(image.get_pixel(x, y));
        match tally.iter_mut().find(|(c, _)| *c == colour) {
            Some((_, count)) => *count += 1,
            None => tally.push((colour, 1)),
        }
    }
    // Stable: equal counts keep first-seen order.
    tally.sort_by(|a, b| b.1.cmp(&a.1));
    tally[0].0
}

pub fn detect_ink_colours(image: &RgbaImage, transparent: Rgb) -> HashSet<Rgb> {
    image
        .pixels()
        .map(rgb)
        .filter(|&colour| colour != transparent)
        .collect()
}

/// Recolours every non-ink pixel that touches a non-background pixel. Reads
/// neighbours from a snapshot so fresh outline pixels never seed more outline.
pub fn add_outline(
    image: &mut RgbaImage,
    transparent: Rgb,
    ink: &HashSet<Rgb>,
    outline: Rgba<u8>,
) {
    let snapshot = image.clone();
    let (w, h) = snapshot.dimensions();

    for y in 0..h {
        for x in 0..w {
            if ink.contains(&rgb(snapshot.get_pixel(x, y))) {
                continue;
            }
            if touches_ink(&snapshot, x, y, transparent) {
                image.put_pixel(x, y, outline);
            }
        }
    }
}

fn touches_ink(snapshot: &RgbaImage, x: u32, y: u32, transparent: Rgb) -> bool {
    let (w, h) = snapshot.dimensions();
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                continue;
            }
            if rgb(snapshot.get_pixel(nx as u32, ny as u32)) != transparent {
                return true;
            }
        }
    }
    false
}

pub fn trim_rect(image: &RgbaImage, transparent: Rgb) -> GlyphRect {
    let (w, h) = image.dimensions();
    let column_empty =
        |x: u32| (0..h).all(|y| rgb(image.get_pixel(x, y)) == transparent);

    let first = (0..w).find(|&x| !column_empty(x));
    let last = (0..w).rev().find(|&x| !column_empty(x));

    match (first, last) {
        (Some(first), Some(last)) => {
            let start = first.saturating_sub(1);
            let end = (last + 1).min(w - 1);
            GlyphRect {
                x: start,
                width: end - start + 1,
                height: h,
            }
        }
        _ => GlyphRect {
            x: 0,
            width: w,
            height: h,
        },
    }
}
