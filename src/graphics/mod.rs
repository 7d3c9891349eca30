//! Image processing and output: tiling, glyph cleanup, upscaling, PNG and
//! mesh writers.

pub mod atlas;
pub mod font;
pub mod mesh;
pub mod png;
pub mod upscale;
