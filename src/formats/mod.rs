//! Decoders for the game's picture, model and animation formats.

pub mod flic;
pub mod object;
pub mod palette;
pub mod picture;
