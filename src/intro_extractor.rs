use std::path::Path;

use tracing::info;

use crate::{
    config::ExtractConfig,
    containers::load_source,
    error::Result,
    formats::flic::FlicDecoder,
    picture_extractor::save_picture,
};

pub struct IntroExtractor<'a> {
    config: &'a ExtractConfig,
}

impl<'a> IntroExtractor<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        IntroExtractor { config }
    }

    /// Every frame of every animation, as `intro/<name>/frame_NNNN.png`.
    pub fn extract_intro(&self) -> Result<usize> {
        let mut written = 0;
        for file in &self.config.layout.intro {
            let path = self.config.source(file);
            let name = animation_name(&path);
            let mut decoder = FlicDecoder::new(load_source(&path)?)?;
            let dir = self.config.output_root.join("intro").join(&name);

            let mut frames = 0;
            for frame in decoder.frames() {
                let (index, image) = frame?;
                save_picture(&image, &dir.join(format!("frame_{:04}.png", index)), self.config)?;
                frames += 1;
            }
            info!("Intro {}: {} frames", name, frames);
            written += frames;
        }
        Ok(written)
    }
}

fn animation_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "intro".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::fixture_config;
    use std::fs;

    /// 2x1 FLI with two frames: palette + copy, then black.
    fn small_fli() -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data[4..6].copy_from_slice(&0xAF11u16.to_le_bytes());
        data[6..8].copy_from_slice(&2u16.to_le_bytes());
        data[8..10].copy_from_slice(&2u16.to_le_bytes());
        data[10..12].copy_from_slice(&1u16.to_le_bytes());

        let chunk = |kind: u16, body: &[u8]| {
            let mut out = ((6 + body.len()) as u32).to_le_bytes().to_vec();
            out.extend_from_slice(&kind.to_le_bytes());
            out.extend_from_slice(body);
            out
        };
        let frame = |chunks: Vec<Vec<u8>>| {
            let body = chunks.concat();
            let mut out = ((16 + body.len()) as u32).to_le_bytes().to_vec();
            out.extend_from_slice(&0xF1FAu16.to_le_bytes());
            out.extend_from_slice(&(chunks.len() as u16).to_le_bytes());
            out.extend_from_slice(&[0; 8]);
            out.extend_from_slice(&body);
            out
        };

        data.extend(frame(vec![
            chunk(4, &[1, 0, 0, 2, 0, 0, 0, 250, 10, 10]),
            chunk(16, &[1, 0]),
        ]));
        data.extend(frame(vec![chunk(13, &[])]));
        data
    }

    #[test]
    fn every_frame_is_written_in_order() {
        let (game, out, mut config) = fixture_config();
        fs::create_dir(game.path().join("INTRO")).unwrap();
        fs::write(game.path().join("INTRO/LOGO.FLI"), small_fli()).unwrap();
        config.layout.intro = vec!["INTRO/LOGO.FLI".to_string()];

        assert_eq!(IntroExtractor::new(&config).extract_intro().unwrap(), 2);

        let dir = out.path().join("intro/logo");
        let first = image::open(dir.join("frame_0000.png")).unwrap().to_rgba8();
        assert_eq!(*first.get_pixel(0, 0), image::Rgba([250, 10, 10, 255]));
        let second = image::open(dir.join("frame_0001.png")).unwrap().to_rgba8();
        assert_eq!(*second.get_pixel(0, 0), image::Rgba([0, 0, 0, 255]));
    }
}
