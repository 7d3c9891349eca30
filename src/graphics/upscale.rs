//! Integer upscaling for pixel art.
//!
//! Factors 2 and 3 use the edge-aware Scale2x/Scale3x rules, 4 is Scale2x
//! applied twice, anything else falls back to nearest neighbour.

use image::{imageops, imageops::FilterType, Rgba, RgbaImage};

pub fn upscale(image: &RgbaImage, factor: u32) -> RgbaImage {
    match factor {
        0 | 1 => image.clone(),
        2 => scale2x(image),
        3 => scale3x(image),
        4 => scale2x(&scale2x(image)),
        n => imageops::resize(
            image,
            image.width() * n,
            image.height() * n,
            FilterType::Nearest,
        ),
    }
}

/// 3×3 neighbourhood with edge pixels clamped.
struct Neighbourhood {
    a: Rgba<u8>,
    b: Rgba<u8>,
    c: Rgba<u8>,
    d: Rgba<u8>,
    e: Rgba<u8>,
    f: Rgba<u8>,
    g: Rgba<u8>,
    h: Rgba<u8>,
    i: Rgba<u8>,
}

impl Neighbourhood {
    fn around(image: &RgbaImage, x: u32, y: u32) -> Self {
        let (w, h) = image.dimensions();
        let left = x.saturating_sub(1);
        let right = (x + 1).min(w - 1);
        let up = y.saturating_sub(1);
        let down = (y + 1).min(h - 1);
        let at = |px: u32, py: u32| *image.get_pixel(px, py);
        Neighbourhood {
            a: at(left, up),
            b: at(x, up),
            c: at(right, up),
            d: at(left, y),
            e: at(x, y),
            f: at(right, y),
            g: at(left, down),
            h: at(x, down),
            i: at(right, down),
        }
    }
}

fn scale2x(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let mut out = RgbaImage::new(w * 2, h * 2);
    for y in 0..h {
        for x in 0..w {
            let Neighbourhood { b, d, e, f, h: hh, .. } = Neighbourhood::around(image, x, y);
            let e0 = if d == b && b != f && d != hh { d } else { e };
            let e1 = if b == f && b != d && f != hh { f } else { e };
            let e2 = if d == hh && d != b && hh != f { d } else { e };
            let e3 = if hh == f && d != hh && b != f { f } else { e };
            out.put_pixel(x * 2, y * 2, e0);
            out.put_pixel(x * 2 + 1, y * 2, e1);
            out.put_pixel(x * 2, y * 2 + 1, e2);
            out.put_pixel(x * 2 + 1, y * 2 + 1, e3);
        }
    }
    out
}

fn scale3x(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let mut out = RgbaImage::new(w * 3, h * 3);
    for y in 0..h {
        for x in 0..w {
            let n = Neighbourhood::around(image, x, y);
            let (a, b, c, d, e, f, g, hh, i) = (n.a, n.b, n.c, n.d, n.e, n.f, n.g, n.h, n.i);

            let db = d == b && b != f && d != hh;
            let bf = b == f && b != d && f != hh;
            let dh = d == hh && d != b && hh != f;
            let hf = hh == f && d != hh && b != f;

            let block = [
                if db { d } else { e },
                if (db && e != c) || (bf && e != a) { b } else { e },
                if bf { f } else { e },
                if (db && e != g) || (dh && e != a) { d } else { e },
                e,
                if (bf && e != i) || (hf && e != c) { f } else { e },
                if dh { d } else { e },
                if (dh && e != i) || (hf && e != g) { hh } else { e },
                if hf { f } else { e },
            ];
            for (k, pixel) in block.into_iter().enumerate() {
                out.put_pixel(x * 3 + (k as u32 % 3), y * 3 + (k as u32 / 3), pixel);
            }
        }
    }
    out
}
